//! The evaluation engine.
//!
//! A self-rescheduling polling loop: each cycle refreshes every probe
//! concurrently, waits for all refreshes to settle, ANDs the verdicts,
//! applies the transition rule, notifies subscribers on change, and
//! re-arms itself after the interval of the post-transition state.
//!
//! # Design Decisions
//!
//! - One loop task per run; exactly one cycle is ever in flight.
//! - The cadence is re-derived from the current state every cycle, so a
//!   fixed-period timer would be wrong; the loop sleeps anew each round.
//! - `stop` takes effect at the next scheduling decision: a cycle that is
//!   already computing finishes (its transition commits) but does not
//!   re-arm.

use crate::breaker::config::{BreakerConfig, EvaluateIntervals, DEFAULT_STABILIZE_AFTER_N_SUCCESSES};
use crate::breaker::state::{transition, BreakerState};
use crate::core::{BoxedProbe, BreakerError, BreakerResult, Probe};
use crate::probes::build_probe;

use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, watch};

const STATE_EVENT_CAPACITY: usize = 16;

/// The committed aggregate: state plus stabilizing progress.
#[derive(Debug, Clone, Copy)]
struct Aggregate {
    state: BreakerState,
    counter: u32,
}

impl Aggregate {
    fn nominal() -> Self {
        Self {
            state: BreakerState::Nominal,
            counter: 0,
        }
    }
}

#[derive(Debug)]
struct Shared {
    probes: Vec<BoxedProbe>,
    intervals: EvaluateIntervals,
    stabilize_threshold: u32,
    aggregate: RwLock<Aggregate>,
    events: broadcast::Sender<BreakerState>,
    // Bumped by every start(); a superseded run must not commit.
    generation: AtomicU64,
}

impl Shared {
    fn current_state(&self) -> BreakerState {
        self.aggregate
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .state
    }

    /// Fans out `check` on every probe and waits for all to settle.
    ///
    /// Even a probe whose verdict is already known-false is refreshed, so
    /// its observation stays fresh for the next cycle.
    async fn refresh_probes(&self) {
        join_all(self.probes.iter().map(|probe| probe.check())).await;
    }

    /// Applies this cycle's transition and notifies on change.
    fn commit_cycle(&self, run: u64) {
        let all_ok = self.probes.iter().all(|probe| probe.value());

        let (entered, next) = {
            let mut aggregate = self
                .aggregate
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if self.generation.load(Ordering::Acquire) != run {
                return;
            }
            let entered = aggregate.state;
            let (state, counter) = transition(
                aggregate.state,
                aggregate.counter,
                all_ok,
                self.stabilize_threshold,
            );
            *aggregate = Aggregate { state, counter };
            (entered, state)
        };

        if next != entered {
            tracing::info!(from = %entered, to = %next, all_ok, "aggregate state changed");
            let _ = self.events.send(next);
        }
    }
}

async fn run_loop(shared: Arc<Shared>, run: u64, mut stop_rx: watch::Receiver<bool>) {
    loop {
        let delay = shared.intervals.for_state(shared.current_state());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop_rx.changed() => return,
        }

        shared.refresh_probes().await;
        shared.commit_cycle(run);

        // Re-read armed-ness after the work, not before: a stop issued
        // mid-cycle is honored here, at the scheduling decision.
        if *stop_rx.borrow() || shared.generation.load(Ordering::Acquire) != run {
            return;
        }
    }
}

#[derive(Debug)]
struct RunHandle {
    stop_tx: watch::Sender<bool>,
}

/// Builder for hand-assembled probe sets.
///
/// Configuration-driven construction goes through
/// [`CircuitBreaker::new`]; the builder exists for callers (and tests)
/// that construct probes directly.
#[derive(Debug, Default)]
pub struct CircuitBreakerBuilder {
    probes: Vec<BoxedProbe>,
    intervals: EvaluateIntervals,
    stabilize_threshold: Option<u32>,
}

impl CircuitBreakerBuilder {
    /// Creates a new builder with default cadence and no probes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a probe; evaluation order follows insertion order.
    pub fn add_probe<P: Probe + 'static>(self, probe: P) -> Self {
        self.add_boxed_probe(Box::new(probe))
    }

    /// Adds an already-boxed probe.
    pub fn add_boxed_probe(mut self, probe: BoxedProbe) -> Self {
        self.probes.push(probe);
        self
    }

    /// Sets the per-state polling cadence.
    pub fn with_intervals(mut self, intervals: EvaluateIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Sets the number of consecutive successes required to stabilize.
    pub fn with_stabilize_threshold(mut self, threshold: u32) -> Self {
        self.stabilize_threshold = Some(threshold);
        self
    }

    /// Builds the breaker.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the stabilize threshold is zero.
    pub fn build(self) -> BreakerResult<CircuitBreaker> {
        let stabilize_threshold = self
            .stabilize_threshold
            .unwrap_or(DEFAULT_STABILIZE_AFTER_N_SUCCESSES);
        if stabilize_threshold == 0 {
            return Err(BreakerError::configuration(
                "stabilize threshold must be at least 1",
            ));
        }

        let (events, _) = broadcast::channel(STATE_EVENT_CAPACITY);
        Ok(CircuitBreaker {
            shared: Arc::new(Shared {
                probes: self.probes,
                intervals: self.intervals,
                stabilize_threshold,
                aggregate: RwLock::new(Aggregate::nominal()),
                events,
                generation: AtomicU64::new(0),
            }),
            runner: Mutex::new(None),
        })
    }
}

/// The health-aggregation circuit breaker.
///
/// Owns an ordered set of probes and periodically folds their verdicts
/// into a tri-state aggregate with hysteresis: any failing probe trips
/// the breaker within one cycle, while recovery requires a configured
/// number of consecutive fully-passing cycles.
///
/// # Example
///
/// ```rust,ignore
/// use breakwatch::CircuitBreaker;
/// use serde_json::json;
///
/// let breaker = CircuitBreaker::from_value(json!({
///     "probes": [
///         {
///             "type": "kafkaConsumerLag",
///             "consumerGroupName": "replication",
///             "wantTotalLagLessThan": 1000,
///             "prometheus": { "endpoint": "http://prom:9090" },
///         },
///     ],
///     "trippedEvaluateIntervalMs": 10_000,
/// }))?;
///
/// let mut events = breaker.subscribe();
/// breaker.start();
/// ```
#[derive(Debug)]
pub struct CircuitBreaker {
    shared: Arc<Shared>,
    // Present iff the engine expects to evaluate again.
    runner: Mutex<Option<RunHandle>>,
}

impl CircuitBreaker {
    /// Creates a breaker from a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails fast on invalid configuration or probe construction failure;
    /// a broken breaker is never handed out.
    pub fn new(config: BreakerConfig) -> BreakerResult<Self> {
        config.validate()?;

        let mut builder = Self::builder()
            .with_intervals(EvaluateIntervals::from(&config))
            .with_stabilize_threshold(config.stabilize_after_n_successes);
        for probe_config in &config.probes {
            builder = builder.add_boxed_probe(build_probe(probe_config)?);
        }
        builder.build()
    }

    /// Creates a breaker from untyped configuration input.
    pub fn from_value(value: serde_json::Value) -> BreakerResult<Self> {
        Self::new(BreakerConfig::from_value(value)?)
    }

    /// Returns a builder for hand-assembled probe sets.
    pub fn builder() -> CircuitBreakerBuilder {
        CircuitBreakerBuilder::new()
    }

    /// Returns the last fully-committed aggregate state.
    pub fn state(&self) -> BreakerState {
        self.shared.current_state()
    }

    /// Returns `true` while the engine is armed to evaluate again.
    pub fn is_started(&self) -> bool {
        self.runner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }

    /// Returns the probe names in evaluation order.
    pub fn probe_names(&self) -> Vec<&str> {
        self.shared.probes.iter().map(|probe| probe.name()).collect()
    }

    /// Subscribes to aggregate state changes.
    ///
    /// An event carries the new state and fires at most once per cycle,
    /// only when the state actually changed. A receiver that falls more
    /// than a few transitions behind observes a lag error and resumes
    /// with the newest events.
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerState> {
        self.shared.events.subscribe()
    }

    /// Starts (or restarts) periodic evaluation.
    ///
    /// Resets the aggregate to `Nominal` and arms the first cycle after
    /// the nominal-state interval. A previous run, if any, is superseded:
    /// its in-flight cycle finishes without effect and does not re-arm.
    ///
    /// Must be called within a tokio runtime.
    pub fn start(&self) {
        let mut runner = self
            .runner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = runner.take() {
            let _ = previous.stop_tx.send(true);
        }

        let run = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
        *self
            .shared
            .aggregate
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Aggregate::nominal();

        let (stop_tx, stop_rx) = watch::channel(false);
        tokio::spawn(run_loop(Arc::clone(&self.shared), run, stop_rx));
        *runner = Some(RunHandle { stop_tx });

        tracing::info!(probes = self.shared.probes.len(), "circuit breaker started");
    }

    /// Stops periodic evaluation.
    ///
    /// Idempotent and safe to call at any time, including from a
    /// state-change notification handler and when never started. A cycle
    /// already in flight finishes but will not re-arm.
    pub fn stop(&self) {
        let handle = self
            .runner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(true);
            tracing::info!("circuit breaker stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::{MockProbe, NoopProbe};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::broadcast::error::TryRecvError;
    use tokio::time::advance;

    /// Yields enough times for the loop task to reach its next await.
    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    /// Lets one pending cycle fire and complete.
    async fn tick(interval: Duration) {
        settle().await;
        advance(interval).await;
        settle().await;
    }

    fn fast_intervals() -> EvaluateIntervals {
        EvaluateIntervals::new()
            .with_nominal(Duration::from_millis(100))
            .with_stabilizing(Duration::from_millis(100))
            .with_tripped(Duration::from_millis(100))
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_passing_probe_stays_nominal() {
        let breaker = CircuitBreaker::from_value(json!({
            "probes": [ { "type": "noop", "returnConstantValue": true } ],
        }))
        .unwrap();
        let mut events = breaker.subscribe();

        breaker.start();
        tick(Duration::from_millis(60_001)).await;

        assert_eq!(breaker.state(), BreakerState::Nominal);
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
        breaker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failing_probe_among_many_trips() {
        let breaker = CircuitBreaker::from_value(json!({
            "probes": [
                { "type": "noop", "returnConstantValue": false },
                { "type": "noop", "returnConstantValue": true },
            ],
        }))
        .unwrap();
        let mut events = breaker.subscribe();

        breaker.start();
        tick(Duration::from_millis(60_001)).await;

        assert_eq!(breaker.state(), BreakerState::Tripped);
        assert_eq!(events.try_recv().unwrap(), BreakerState::Tripped);
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
        breaker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_probes_always_nominal() {
        let breaker = CircuitBreaker::new(BreakerConfig::default()).unwrap();
        breaker.start();
        tick(Duration::from_millis(60_001)).await;
        assert_eq!(breaker.state(), BreakerState::Nominal);
        breaker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_requires_consecutive_successes() {
        let probe = MockProbe::failing();
        let handle = probe.handle();
        let breaker = CircuitBreaker::builder()
            .add_probe(probe)
            .with_intervals(fast_intervals())
            .with_stabilize_threshold(2)
            .build()
            .unwrap();
        let mut events = breaker.subscribe();
        let interval = Duration::from_millis(100);

        breaker.start();
        tick(interval).await;
        assert_eq!(breaker.state(), BreakerState::Tripped);

        handle.set_value(true);
        tick(interval).await;
        assert_eq!(breaker.state(), BreakerState::Stabilizing);

        tick(interval).await;
        assert_eq!(breaker.state(), BreakerState::Nominal);

        assert_eq!(events.try_recv().unwrap(), BreakerState::Tripped);
        assert_eq!(events.try_recv().unwrap(), BreakerState::Stabilizing);
        assert_eq!(events.try_recv().unwrap(), BreakerState::Nominal);
        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
        breaker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_during_stabilizing_resets_progress() {
        let probe = MockProbe::failing();
        let handle = probe.handle();
        let breaker = CircuitBreaker::builder()
            .add_probe(probe)
            .with_intervals(fast_intervals())
            .with_stabilize_threshold(3)
            .build()
            .unwrap();
        let interval = Duration::from_millis(100);

        breaker.start();
        tick(interval).await;
        assert_eq!(breaker.state(), BreakerState::Tripped);

        handle.set_value(true);
        tick(interval).await;
        tick(interval).await;
        assert_eq!(breaker.state(), BreakerState::Stabilizing);

        // One bad cycle tears recovery all the way down.
        handle.set_value(false);
        tick(interval).await;
        assert_eq!(breaker.state(), BreakerState::Tripped);

        // Recovery starts over from zero.
        handle.set_value(true);
        tick(interval).await;
        tick(interval).await;
        assert_eq!(breaker.state(), BreakerState::Stabilizing);
        tick(interval).await;
        assert_eq!(breaker.state(), BreakerState::Nominal);
        breaker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_resets_to_nominal() {
        let breaker = CircuitBreaker::builder()
            .add_probe(NoopProbe::failing())
            .with_intervals(fast_intervals())
            .build()
            .unwrap();

        breaker.start();
        tick(Duration::from_millis(100)).await;
        assert_eq!(breaker.state(), BreakerState::Tripped);

        breaker.start();
        assert_eq!(breaker.state(), BreakerState::Nominal);
        breaker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_evaluation() {
        let probe = MockProbe::passing();
        let handle = probe.handle();
        let breaker = CircuitBreaker::builder()
            .add_probe(probe)
            .with_intervals(fast_intervals())
            .build()
            .unwrap();

        breaker.start();
        tick(Duration::from_millis(100)).await;
        assert_eq!(handle.check_count(), 1);

        breaker.stop();
        assert!(!breaker.is_started());

        // Arbitrary amounts of time pass; no further cycles occur.
        tick(Duration::from_secs(3600)).await;
        assert_eq!(handle.check_count(), 1);
        assert_eq!(breaker.state(), BreakerState::Nominal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_safe_unstarted() {
        let breaker = CircuitBreaker::builder().build().unwrap();
        breaker.stop();
        breaker.stop();
        assert!(!breaker.is_started());

        breaker.start();
        assert!(breaker.is_started());
        breaker.stop();
        breaker.stop();
        assert!(!breaker.is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tripped_interval_adopted_after_transition() {
        let probe = MockProbe::failing();
        let handle = probe.handle();
        let breaker = CircuitBreaker::builder()
            .add_probe(probe)
            .with_intervals(
                EvaluateIntervals::new()
                    .with_nominal(Duration::from_millis(100))
                    .with_tripped(Duration::from_millis(200)),
            )
            .build()
            .unwrap();

        breaker.start();

        // First tick fires on the nominal cadence; the cycle trips.
        tick(Duration::from_millis(100)).await;
        assert_eq!(handle.check_count(), 1);
        assert_eq!(breaker.state(), BreakerState::Tripped);

        // The nominal interval elapses again: nothing fires, the loop is
        // now on the longer tripped cadence.
        advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(handle.check_count(), 1);

        advance(Duration::from_millis(100)).await;
        settle().await;
        assert_eq!(handle.check_count(), 2);
        breaker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_cycle_commits_but_does_not_rearm() {
        let probe = MockProbe::failing().with_latency(Duration::from_millis(50));
        let handle = probe.handle();
        let breaker = CircuitBreaker::builder()
            .add_probe(probe)
            .with_intervals(fast_intervals())
            .build()
            .unwrap();

        breaker.start();
        settle().await;
        advance(Duration::from_millis(100)).await;
        settle().await; // cycle underway, probe check sleeping

        breaker.stop();
        advance(Duration::from_millis(50)).await;
        settle().await;

        // The in-flight cycle finished and its transition committed.
        assert_eq!(handle.check_count(), 1);
        assert_eq!(breaker.state(), BreakerState::Tripped);

        // But no further cycle was armed.
        tick(Duration::from_secs(3600)).await;
        assert_eq!(handle.check_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_notification_handler() {
        let breaker = Arc::new(
            CircuitBreaker::builder()
                .add_probe(NoopProbe::failing())
                .with_intervals(fast_intervals())
                .build()
                .unwrap(),
        );
        let mut events = breaker.subscribe();

        let observer = {
            let breaker = Arc::clone(&breaker);
            tokio::spawn(async move {
                let state = events.recv().await.unwrap();
                breaker.stop();
                state
            })
        };

        breaker.start();
        tick(Duration::from_millis(100)).await;

        assert_eq!(observer.await.unwrap(), BreakerState::Tripped);
        assert!(!breaker.is_started());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_event_without_state_change() {
        let breaker = CircuitBreaker::builder()
            .add_probe(NoopProbe::passing())
            .with_intervals(fast_intervals())
            .build()
            .unwrap();
        let mut events = breaker.subscribe();

        breaker.start();
        tick(Duration::from_millis(100)).await;
        tick(Duration::from_millis(100)).await;
        tick(Duration::from_millis(100)).await;

        assert_eq!(events.try_recv().unwrap_err(), TryRecvError::Empty);
        breaker.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_probes_refresh_concurrently() {
        // Two probes of 80ms latency each must settle within one 100ms
        // cycle window if, and only if, they run concurrently.
        let first = MockProbe::passing().with_latency(Duration::from_millis(80));
        let second = MockProbe::passing().with_latency(Duration::from_millis(80));
        let (h1, h2) = (first.handle(), second.handle());
        let breaker = CircuitBreaker::builder()
            .add_probe(first)
            .add_probe(second)
            .with_intervals(fast_intervals())
            .build()
            .unwrap();

        breaker.start();
        settle().await;
        advance(Duration::from_millis(100)).await;
        settle().await;
        advance(Duration::from_millis(80)).await;
        settle().await;

        assert_eq!(h1.check_count(), 1);
        assert_eq!(h2.check_count(), 1);
        breaker.stop();
    }

    #[tokio::test]
    async fn test_probe_names_preserve_order() {
        let breaker = CircuitBreaker::builder()
            .add_probe(MockProbe::passing().with_name("first"))
            .add_probe(MockProbe::passing().with_name("second"))
            .add_probe(NoopProbe::passing())
            .build()
            .unwrap();
        assert_eq!(breaker.probe_names(), vec!["first", "second", "noop"]);
    }

    #[tokio::test]
    async fn test_builder_rejects_zero_stabilize_threshold() {
        let result = CircuitBreaker::builder().with_stabilize_threshold(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_construction_rejects_invalid_config() {
        let result = CircuitBreaker::from_value(json!({
            "probes": [ { "type": "pingHost" } ],
        }));
        assert!(result.is_err());
    }
}
