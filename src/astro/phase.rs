use serde::{Deserialize, Serialize};
use strum_macros::Display;
use utoipa::ToSchema;

use crate::astro::types::round_to;

/// The eight conventional names of the lunar cycle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize, ToSchema,
)]
pub enum PhaseName {
    #[strum(serialize = "New Moon")]
    #[serde(rename = "New Moon")]
    NewMoon,
    #[strum(serialize = "Waxing Crescent")]
    #[serde(rename = "Waxing Crescent")]
    WaxingCrescent,
    #[strum(serialize = "First Quarter")]
    #[serde(rename = "First Quarter")]
    FirstQuarter,
    #[strum(serialize = "Waxing Gibbous")]
    #[serde(rename = "Waxing Gibbous")]
    WaxingGibbous,
    #[strum(serialize = "Full Moon")]
    #[serde(rename = "Full Moon")]
    FullMoon,
    #[strum(serialize = "Waning Gibbous")]
    #[serde(rename = "Waning Gibbous")]
    WaningGibbous,
    #[strum(serialize = "Last Quarter")]
    #[serde(rename = "Last Quarter")]
    LastQuarter,
    #[strum(serialize = "Waning Crescent")]
    #[serde(rename = "Waning Crescent")]
    WaningCrescent,
}

const CYCLE: [PhaseName; 8] = [
    PhaseName::NewMoon,
    PhaseName::WaxingCrescent,
    PhaseName::FirstQuarter,
    PhaseName::WaxingGibbous,
    PhaseName::FullMoon,
    PhaseName::WaningGibbous,
    PhaseName::LastQuarter,
    PhaseName::WaningCrescent,
];

impl PhaseName {
    /// Buckets are eighths of the cycle centred on each canonical point, so
    /// New Moon covers [0.9375, 1) and [0, 0.0625).
    pub fn from_phase(phase: f64) -> Self {
        let phase = normalize(phase);
        let bucket = ((phase + 1.0 / 16.0) * 8.0).floor() as usize % CYCLE.len();
        CYCLE[bucket]
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            PhaseName::NewMoon => "🌑",
            PhaseName::WaxingCrescent => "🌒",
            PhaseName::FirstQuarter => "🌓",
            PhaseName::WaxingGibbous => "🌔",
            PhaseName::FullMoon => "🌕",
            PhaseName::WaningGibbous => "🌖",
            PhaseName::LastQuarter => "🌗",
            PhaseName::WaningCrescent => "🌘",
        }
    }
}

/// Illuminated share of the lunar disc in percent, as a triangle wave that
/// peaks at full moon.
pub fn illumination(phase: f64) -> f64 {
    if !phase.is_finite() {
        return 50.0;
    }
    let phase = normalize(phase);
    let lit = if phase <= 0.5 {
        phase * 2.0
    } else {
        2.0 - phase * 2.0
    };
    round_to(lit * 100.0, 1)
}

/// Everything a display needs about the moon's phase.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PhaseInfo {
    pub phase: f64,
    pub name: PhaseName,
    pub symbol: String,
    pub illumination: f64,
}

pub fn classify(phase: f64) -> PhaseInfo {
    let name = PhaseName::from_phase(phase);
    PhaseInfo {
        phase,
        name,
        symbol: name.symbol().to_string(),
        illumination: illumination(phase),
    }
}

fn normalize(phase: f64) -> f64 {
    if phase.is_finite() {
        phase.rem_euclid(1.0)
    } else {
        0.25
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_points_get_their_names() {
        assert_eq!(PhaseName::from_phase(0.0), PhaseName::NewMoon);
        assert_eq!(PhaseName::from_phase(0.125), PhaseName::WaxingCrescent);
        assert_eq!(PhaseName::from_phase(0.25), PhaseName::FirstQuarter);
        assert_eq!(PhaseName::from_phase(0.375), PhaseName::WaxingGibbous);
        assert_eq!(PhaseName::from_phase(0.5), PhaseName::FullMoon);
        assert_eq!(PhaseName::from_phase(0.625), PhaseName::WaningGibbous);
        assert_eq!(PhaseName::from_phase(0.75), PhaseName::LastQuarter);
        assert_eq!(PhaseName::from_phase(0.875), PhaseName::WaningCrescent);
        assert_eq!(PhaseName::from_phase(0.99), PhaseName::NewMoon);
    }

    #[test]
    fn bucket_edges_belong_to_the_upper_bucket() {
        assert_eq!(PhaseName::from_phase(0.0625), PhaseName::WaxingCrescent);
        assert_eq!(PhaseName::from_phase(0.062_499), PhaseName::NewMoon);
        assert_eq!(PhaseName::from_phase(0.4375), PhaseName::FullMoon);
        assert_eq!(PhaseName::from_phase(0.5625), PhaseName::WaningGibbous);
        assert_eq!(PhaseName::from_phase(0.8125), PhaseName::WaningCrescent);
        assert_eq!(PhaseName::from_phase(0.9375), PhaseName::NewMoon);
        assert_eq!(PhaseName::from_phase(0.937_499), PhaseName::WaningCrescent);
    }

    #[test]
    fn buckets_partition_the_cycle_contiguously() {
        let steps = 16_000;
        let mut changes = Vec::new();
        let mut previous = PhaseName::from_phase(0.0);
        for i in 1..steps {
            let phase = i as f64 / steps as f64;
            let name = PhaseName::from_phase(phase);
            if name != previous {
                changes.push((phase, name));
                previous = name;
            }
        }
        // Seven transitions inside [0, 1) plus the wrap back to New Moon.
        assert_eq!(changes.len(), 8);
        let names: Vec<_> = changes.iter().map(|(_, n)| *n).collect();
        assert_eq!(&names[..7], &CYCLE[1..]);
        assert_eq!(names[7], PhaseName::NewMoon);
        for (k, (phase, _)) in changes.iter().enumerate() {
            let expected = 0.0625 + k as f64 * 0.125;
            assert!((phase - expected).abs() < 1e-9, "edge {k} at {phase}");
        }
    }

    #[test]
    fn illumination_is_a_symmetric_triangle() {
        assert_eq!(illumination(0.0), 0.0);
        assert_eq!(illumination(0.5), 100.0);
        assert_eq!(illumination(0.25), 50.0);
        for i in 1..100 {
            let phase = i as f64 / 100.0;
            let a = illumination(phase);
            let b = illumination(1.0 - phase);
            assert!((a - b).abs() <= 0.1 + 1e-9, "{phase}: {a} vs {b}");
        }
    }

    #[test]
    fn classify_bundles_name_symbol_and_light() {
        let info = classify(0.5);
        assert_eq!(info.name, PhaseName::FullMoon);
        assert_eq!(info.symbol, "🌕");
        assert_eq!(info.illumination, 100.0);
        assert_eq!(info.name.to_string(), "Full Moon");
    }

    #[test]
    fn non_finite_phase_does_not_panic() {
        assert_eq!(illumination(f64::NAN), 50.0);
        assert_eq!(PhaseName::from_phase(f64::NAN), PhaseName::FirstQuarter);
    }
}
