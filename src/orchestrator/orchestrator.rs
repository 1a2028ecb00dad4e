use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};

use super::cache::{normalize_key, CityState, SnapshotCache};
use super::error::OrchestratorError;
use crate::astro::{
    self, Clock, DaylightInfo, DisplayZone, GoldenHour, PhaseInfo, SunPosition,
};
use crate::config::{Config, ConfigError};
use crate::fetch::{AstronomicalSnapshot, FetchError, SnapshotSource};

/// Consecutive failures for one city before the log level goes up to warn.
const FAILURE_WARN_THRESHOLD: u32 = 3;
const UPDATE_CAPACITY: usize = 16;

type Slot = Option<Arc<AstronomicalSnapshot>>;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub ttl: Duration,
    pub failure_ttl: Duration,
    pub default_city: String,
    pub zone: DisplayZone,
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            ttl: config.cache.ttl,
            failure_ttl: config.cache.failure_ttl,
            default_city: config.refresh.default_city.clone(),
            zone: config.display_zone()?,
        })
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        let config = Config::default();
        Self {
            ttl: config.cache.ttl,
            failure_ttl: config.cache.failure_ttl,
            default_city: config.refresh.default_city,
            zone: DisplayZone::Local,
        }
    }
}

/// Result of a [`RefreshOrchestrator::request`].
#[derive(Debug, Clone)]
pub struct Lookup {
    pub snapshot: Arc<AstronomicalSnapshot>,
    /// Served from the cache rather than a fetch made for this call.
    pub from_cache: bool,
    /// The cached copy was stale and a background fetch is running.
    pub refreshing: bool,
}

/// A fetch that has been started or joined. Resolves to the snapshot it
/// produced, or a fallback if the fetch was cancelled.
pub struct PendingFetch {
    city: String,
    rx: watch::Receiver<Slot>,
    clock: Arc<dyn Clock>,
    zone: DisplayZone,
}

impl PendingFetch {
    pub fn city(&self) -> &str {
        &self.city
    }

    pub async fn wait(mut self) -> Arc<AstronomicalSnapshot> {
        let received = match self.rx.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        received.unwrap_or_else(|| {
            let err = FetchError::Task("fetch was cancelled".to_string());
            Arc::new(AstronomicalSnapshot::fallback(
                &self.city,
                &err,
                self.clock.now(),
                &self.zone,
            ))
        })
    }
}

struct InFlight {
    id: u64,
    rx: watch::Receiver<Slot>,
    abort: AbortHandle,
}

struct State {
    cache: SnapshotCache,
    in_flight: HashMap<String, InFlight>,
    callbacks: HashMap<u64, AbortHandle>,
    failures: HashMap<String, u32>,
    current_city: String,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

struct Inner<F> {
    source: F,
    clock: Arc<dyn Clock>,
    zone: DisplayZone,
    runtime: Handle,
    state: StdMutex<State>,
    updates: broadcast::Sender<Arc<AstronomicalSnapshot>>,
}

/// Clears the in-flight marker of fetch `id` when its task ends, however it ends.
struct InFlightGuard<'a, F> {
    inner: &'a Inner<F>,
    key: &'a str,
    id: u64,
}

impl<F> Drop for InFlightGuard<'_, F> {
    fn drop(&mut self) {
        let mut state = self.inner.state();
        if state.in_flight.get(self.key).is_some_and(|f| f.id == self.id) {
            state.in_flight.remove(self.key);
        }
    }
}

impl<F> Inner<F> {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_city(&self) -> String {
        self.state().current_city.clone()
    }

    fn current(&self) -> Option<Arc<AstronomicalSnapshot>> {
        let state = self.state();
        let key = normalize_key(&state.current_city);
        state.cache.get(&key).map(|entry| Arc::clone(&entry.snapshot))
    }

    fn pending(&self, city: &str, rx: watch::Receiver<Slot>) -> PendingFetch {
        PendingFetch {
            city: city.trim().to_string(),
            rx,
            clock: Arc::clone(&self.clock),
            zone: self.zone,
        }
    }
}

impl<F: SnapshotSource> Inner<F> {
    async fn request(self: &Arc<Self>, city: &str) -> Lookup {
        let key = normalize_key(city);
        let pending = {
            let mut state = self.state();
            if !key.is_empty() {
                state.current_city = city.trim().to_string();
            }
            match state.cache.lookup(&key, Instant::now()) {
                Some((snapshot, true)) => {
                    return Lookup {
                        snapshot,
                        from_cache: true,
                        refreshing: false,
                    };
                }
                Some((snapshot, false)) => {
                    self.ensure_fetch(&mut state, &key, city);
                    return Lookup {
                        snapshot,
                        from_cache: true,
                        refreshing: true,
                    };
                }
                None => self.ensure_fetch(&mut state, &key, city),
            }
        };

        Lookup {
            snapshot: pending.wait().await,
            from_cache: false,
            refreshing: false,
        }
    }

    fn refresh(self: &Arc<Self>, city: &str) -> PendingFetch {
        let key = normalize_key(city);
        let mut state = self.state();
        state.cache.invalidate(&key);
        self.ensure_fetch(&mut state, &key, city)
    }

    /// Joins the fetch already running for `key`, or starts one.
    fn ensure_fetch(self: &Arc<Self>, state: &mut State, key: &str, city: &str) -> PendingFetch {
        if let Some(flight) = state.in_flight.get(key) {
            log::debug!("Joining in-flight fetch for {}", key);
            return self.pending(city, flight.rx.clone());
        }

        let id = state.next_id();
        let (tx, rx) = watch::channel(None);
        let task_inner = Arc::clone(self);
        let task_key = key.to_string();
        let task_city = city.trim().to_string();
        log::debug!("Starting fetch #{} for {}", id, task_city);
        let join = self.runtime.spawn(async move {
            task_inner.run_fetch(id, task_key, task_city, tx).await;
        });

        state.in_flight.insert(
            key.to_string(),
            InFlight {
                id,
                rx: rx.clone(),
                abort: join.abort_handle(),
            },
        );
        self.pending(city, rx)
    }

    async fn run_fetch(
        self: Arc<Self>,
        id: u64,
        key: String,
        city: String,
        tx: watch::Sender<Slot>,
    ) {
        let _guard = InFlightGuard {
            inner: self.as_ref(),
            key: &key,
            id,
        };

        let snapshot = match self.source.fetch_snapshot(&city).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::debug!("Fetch #{} for {} failed: {}", id, city, e);
                AstronomicalSnapshot::fallback(&city, &e, self.clock.now(), &self.zone)
            }
        };
        let snapshot = Arc::new(snapshot);

        self.complete(id, &key, &snapshot);
        tx.send_replace(Some(Arc::clone(&snapshot)));
        // No subscribers is fine.
        let _ = self.updates.send(snapshot);
    }

    /// Publishes a finished fetch into the cache.
    fn complete(&self, id: u64, key: &str, snapshot: &Arc<AstronomicalSnapshot>) {
        let now = Instant::now();
        let mut state = self.state();

        match &snapshot.error {
            None => {
                state.failures.remove(key);
                log::info!("Fetched sky snapshot for {}", snapshot.city);
            }
            Some(error) => {
                let count = state.failures.entry(key.to_string()).or_insert(0);
                *count += 1;
                if *count >= FAILURE_WARN_THRESHOLD {
                    log::warn!(
                        "Snapshot for {} failed {} times in a row ({}): {}",
                        snapshot.city,
                        count,
                        error.kind,
                        error.message
                    );
                } else {
                    log::info!(
                        "Snapshot for {} failed ({}): {}",
                        snapshot.city,
                        error.kind,
                        error.message
                    );
                }
            }
        }

        state.cache.insert(key, Arc::clone(snapshot), now);
        if state.in_flight.get(key).is_some_and(|f| f.id == id) {
            state.in_flight.remove(key);
        }

        let keep = normalize_key(&state.current_city);
        let max_age = state.cache.ttl() * 2;
        let evicted = state.cache.evict_older_than(now, max_age, &keep);
        if evicted > 0 {
            log::debug!("Evicted {} expired snapshot(s)", evicted);
        }

        // Failure counts live only as long as their city's entry.
        let State {
            cache,
            in_flight,
            failures,
            ..
        } = &mut *state;
        failures.retain(|key, _| cache.get(key).is_some() || in_flight.contains_key(key));
    }
}

#[derive(Debug)]
struct AutoRefresh {
    stop_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
    interval: Duration,
}

/// Serves sky snapshots per city from a TTL cache, running at most one
/// fetch per city at a time, and optionally refreshing the current city on
/// a timer.
///
/// Callers may be on any thread. Fetches run on the tokio runtime that was
/// current when the orchestrator was created. Dropping the orchestrator stops
/// the timer and cancels every outstanding fetch and callback.
pub struct RefreshOrchestrator<F> {
    inner: Arc<Inner<F>>,
    auto_refresh: StdMutex<Option<AutoRefresh>>,
}

impl<F: SnapshotSource> RefreshOrchestrator<F> {
    /// Must be called from within a tokio runtime.
    pub fn new(
        source: F,
        options: OrchestratorOptions,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, OrchestratorError> {
        let runtime = Handle::try_current()?;
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        let state = State {
            cache: SnapshotCache::new(options.ttl, options.failure_ttl),
            in_flight: HashMap::new(),
            callbacks: HashMap::new(),
            failures: HashMap::new(),
            current_city: options.default_city.trim().to_string(),
            next_id: 0,
        };

        Ok(Self {
            inner: Arc::new(Inner {
                source,
                clock,
                zone: options.zone,
                runtime,
                state: StdMutex::new(state),
                updates,
            }),
            auto_refresh: StdMutex::new(None),
        })
    }

    /// The snapshot for `city`, fetching it if nothing is cached.
    ///
    /// A fresh entry comes straight from the cache. A stale one is returned
    /// immediately while a background fetch replaces it. Concurrent calls for
    /// the same city share one fetch. `city` becomes the current city.
    pub async fn request(&self, city: &str) -> Lookup {
        self.inner.request(city).await
    }

    /// Blocking form of [`request`](Self::request) for threads outside the
    /// runtime. Panics if called from inside an async context.
    pub fn request_blocking(&self, city: &str) -> Lookup {
        self.inner.runtime.block_on(self.inner.request(city))
    }

    /// Runs `on_result` with the outcome once it is known. Use a
    /// [`Postman`](super::handoff::Postman) to land it on a specific thread.
    pub fn request_async<C>(&self, city: &str, on_result: C)
    where
        C: FnOnce(Lookup) + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let city = city.to_string();
        let mut state = self.inner.state();
        let id = state.next_id();
        let join = self.inner.runtime.spawn(async move {
            let lookup = inner.request(&city).await;
            inner.state().callbacks.remove(&id);
            on_result(lookup);
        });
        // The task cannot reach its own removal before this insert: it needs the lock.
        state.callbacks.insert(id, join.abort_handle());
    }

    /// Invalidates `city` and fetches it again, joining a fetch already in
    /// flight. The stale snapshot stays readable until the new one lands.
    pub fn refresh(&self, city: &str) -> PendingFetch {
        self.inner.refresh(city)
    }

    /// Starts refreshing the current city every `interval`. Returns false if a
    /// timer is already running; the existing one is left untouched.
    pub fn start_auto_refresh(&self, interval: Duration) -> Result<bool, OrchestratorError> {
        if interval.is_zero() {
            return Err(OrchestratorError::InvalidInterval);
        }
        let mut slot = self.auto_refresh.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|timer| !timer.join.is_finished()) {
            return Ok(false);
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let join = self
            .inner
            .runtime
            .spawn(run_auto_refresh(inner, interval, stop_rx));
        *slot = Some(AutoRefresh {
            stop_tx,
            join,
            interval,
        });
        log::info!("Auto-refresh every {}", humantime::format_duration(interval));
        Ok(true)
    }
}

impl<F> RefreshOrchestrator<F> {
    /// Cached snapshot for `city`, fresh or stale, without fetching.
    pub fn get_cached(&self, city: &str) -> Option<Arc<AstronomicalSnapshot>> {
        let key = normalize_key(city);
        self.inner
            .state()
            .cache
            .get(&key)
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    pub fn state_of(&self, city: &str) -> CityState {
        let key = normalize_key(city);
        let state = self.inner.state();
        if state.in_flight.contains_key(&key) {
            return CityState::Fetching;
        }
        match state.cache.lookup(&key, Instant::now()) {
            Some((_, true)) => CityState::CachedFresh,
            Some((_, false)) => CityState::CachedStale,
            None => CityState::Idle,
        }
    }

    pub fn consecutive_failures(&self, city: &str) -> u32 {
        let key = normalize_key(city);
        self.inner.state().failures.get(&key).copied().unwrap_or(0)
    }

    /// Stops the timer. Returns false if none was running.
    pub fn stop_auto_refresh(&self) -> bool {
        let timer = self
            .auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match timer {
            Some(timer) => {
                let _ = timer.stop_tx.send(());
                timer.join.abort();
                log::info!("Auto-refresh stopped");
                true
            }
            None => false,
        }
    }

    pub fn auto_refresh_interval(&self) -> Option<Duration> {
        self.auto_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|timer| timer.interval)
    }

    /// Every snapshot produced by a fetch, in completion order.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AstronomicalSnapshot>> {
        self.inner.updates.subscribe()
    }

    pub fn zone(&self) -> DisplayZone {
        self.inner.zone
    }

    pub fn current_city(&self) -> String {
        self.inner.current_city()
    }

    pub fn current_snapshot(&self) -> Option<Arc<AstronomicalSnapshot>> {
        self.inner.current()
    }

    /// True once the current city has a snapshot without an error.
    pub fn is_data_available(&self) -> bool {
        self.good_snapshot().is_some()
    }

    pub fn sun_position(&self) -> Option<SunPosition> {
        self.good_snapshot().map(|s| s.sun_position)
    }

    pub fn moon_phase(&self) -> Option<PhaseInfo> {
        self.good_snapshot().map(|s| s.phase_info())
    }

    /// Falls back to the 06:00-18:00 clock rule unless the current city has
    /// a good snapshot.
    pub fn is_daytime(&self) -> bool {
        match self.good_snapshot() {
            Some(snapshot) => snapshot.is_daytime,
            None => astro::daytime_by_clock(self.inner.clock.now(), &self.inner.zone),
        }
    }

    pub fn golden_hour_info(&self) -> Option<GoldenHour> {
        self.good_snapshot().map(|s| s.golden_hour(&self.inner.zone))
    }

    pub fn daylight_info(&self) -> Option<DaylightInfo> {
        let snapshot = self.good_snapshot()?;
        match snapshot.daylight_info(self.inner.clock.now(), &self.inner.zone) {
            Ok(info) => Some(info),
            Err(e) => {
                log::debug!("No daylight info for {}: {}", snapshot.city, e);
                None
            }
        }
    }

    /// Flat record of the current snapshot; empty when there is none.
    pub fn export_snapshot(&self) -> BTreeMap<String, String> {
        self.current_snapshot()
            .map(|s| s.export(&self.inner.zone))
            .unwrap_or_default()
    }

    /// Stops the timer and cancels outstanding fetches and callbacks.
    pub fn shutdown(&self) {
        self.stop_auto_refresh();
        let handles: Vec<AbortHandle> = {
            let mut state = self.inner.state();
            let mut handles: Vec<_> = state.in_flight.drain().map(|(_, f)| f.abort).collect();
            handles.extend(state.callbacks.drain().map(|(_, h)| h));
            handles
        };
        for handle in handles {
            handle.abort();
        }
    }

    fn good_snapshot(&self) -> Option<Arc<AstronomicalSnapshot>> {
        self.current_snapshot().filter(|s| s.is_ok())
    }
}

impl<F> Drop for RefreshOrchestrator<F> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_auto_refresh<F: SnapshotSource>(
    inner: Arc<Inner<F>>,
    period: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let should_stop = tokio::select! {
            _ = ticker.tick() => false,
            _ = &mut stop_rx => true,
        };
        if should_stop {
            return;
        }

        let city = inner.current_city();
        log::debug!("Auto-refresh tick for {}", city);
        // The fetch runs as its own task; a failure there cannot end the timer.
        let _ = inner.refresh(&city);
    }
}
