use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{config::SimulationConfig, store::ConfigStore};

/// Destination of the two signals produced on every iteration.
pub trait ObservationSink: Send + Sync {
    fn observe_duration(&self, seconds: f64);
    fn observe_error(&self);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub duration: f64,
    pub failed: bool,
}

/// Draws synthetic request outcomes.
pub struct Simulator<R = StdRng> {
    rng: R,
}

impl Simulator<StdRng> {
    /// Uses `seed` when given; otherwise seeds from the wall clock so restarts
    /// do not replay the same sequence.
    pub fn from_seed_or_clock(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(clock_seed);
        debug!("simulator seeded with {}", seed);
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Simulator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// One iteration: latency in `[0, max_duration)`, failure with
    /// probability `error_rate`. Both are recorded on `sink`.
    pub fn step(&mut self, config: &SimulationConfig, sink: &dyn ObservationSink) -> Observation {
        let duration = self.rng.gen_range(0.0..config.max_duration);
        sink.observe_duration(duration);

        let failed = self.rng.gen_bool(config.error_rate);
        if failed {
            sink.observe_error();
        }

        Observation { duration, failed }
    }
}

/// Delay between two iterations, `1 / request_rate` seconds.
pub fn pacing_delay(config: &SimulationConfig) -> Duration {
    Duration::try_from_secs_f64(config.request_rate.recip()).unwrap_or(Duration::MAX)
}

/// How far the schedule may fall behind before it is reset to now.
pub const MAX_BACKLOG: Duration = Duration::from_secs(1);

// Deadline used when `next + delay` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Accumulated deadline schedule for the driver loop.
///
/// Deadlines advance by the pacing delay from the previous deadline, not
/// from the wake-up time, so timer granularity and step time do not lower
/// the average rate. A deadline already in the past makes the next sleep
/// return at once.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    next: Instant,
}

impl Pacer {
    pub fn new(start: Instant) -> Self {
        Self { next: start }
    }

    /// Deadline of the next iteration.
    pub fn advance(&mut self, delay: Duration, now: Instant) -> Instant {
        if now.saturating_duration_since(self.next) > MAX_BACKLOG {
            self.next = now;
        }

        self.next = self
            .next
            .checked_add(delay)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.next
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// Drives the simulation until `shutdown` fires.
///
/// Each iteration reads a fresh snapshot, so an update is picked up no later
/// than the next iteration. The pacing sleep is the only await point; it is
/// scheduled by [`Pacer`] so the average rate follows `request_rate`.
pub async fn run<R: Rng>(
    mut simulator: Simulator<R>,
    store: ConfigStore,
    sink: Arc<dyn ObservationSink>,
    shutdown: CancellationToken,
) {
    info!("simulation driver started");
    let mut pacer = Pacer::new(Instant::now());

    loop {
        let config = store.snapshot();
        simulator.step(&config, sink.as_ref());

        let deadline = pacer.advance(pacing_delay(&config), Instant::now());
        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    info!("simulation driver stopped");
}

pub fn spawn(
    simulator: Simulator<StdRng>,
    store: ConfigStore,
    sink: Arc<dyn ObservationSink>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(run(simulator, store, sink, shutdown))
}
