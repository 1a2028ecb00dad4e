mod clock;
mod daylight;
mod error;
mod lunar;
mod phase;
mod solar;
mod types;

pub use clock::{Clock, SystemClock};
#[cfg(test)]
pub use clock::FixedClock;
pub use daylight::{
    daylight_info, daytime_by_clock, format_time, golden_hour, is_daytime, DaylightInfo,
    DisplayZone, GoldenHour, Season, SunEvent, NOT_AVAILABLE,
};
pub use error::CalculationError;
pub use lunar::{moon_phase, moon_position, FALLBACK_PHASE};
pub use phase::{classify, PhaseInfo, PhaseName};
pub use solar::sun_position;
pub use types::{Coordinates, MoonPosition, SunPosition};
