use std::{any::Any, fmt};

use crate::{
    assertion::{AnyAssertion, Assertion},
    clock::{ClockHandle, VirtualClock},
    config::HarnessConfig,
    outcome::{AssertionResult, Location},
    source::{Sink, Source},
    Element, Error, Recorded, Result, VirtualTime, ANY_TIME,
};

/// Virtual-time test harness for reactive streams.
///
/// A harness collects three kinds of declarations, executing none of them
/// until its single run phase:
///
/// - **Inputs** ([`input`](Self::input)): timestamped events to feed a sink,
///   materialized as hot emissions on the clock.
/// - **Observations** ([`expect`](Self::expect)): sources to record, each
///   paired with a filterable comparison.
/// - **Retained values** ([`retain`](Self::retain)): anything the test graph
///   needs kept alive for the harness's lifetime.
///
/// The run phase wires every recording, schedules every input, advances the
/// clock until all scheduled activity has settled, then resolves every
/// comparison in declaration order.
///
/// # Running
///
/// Call [`run`](Self::run) to report through the default sink (panics
/// listing every failure), or [`run_with`](Self::run_with) to receive the
/// raw results. If neither was called, **dropping the harness runs it**:
/// release of the handle is the guaranteed trigger, so a test cannot forget
/// to execute its declarations. The trigger is idempotent; after an explicit
/// run the drop is a no-op. (If the thread is already panicking, the drop
/// does nothing rather than piling a second panic on top.)
///
/// # Example
///
/// ```ignore
/// let mut h = Harness::new();
/// let queries = Subject::<String>::new();
/// let results = search_stage(&queries, h.clock_handle());
///
/// h.input(&queries, vec![next(100, "rust".into()), next(200, "tokio".into())])?;
/// h.expect(&results).filter_next().count(2);
/// h.run();
/// ```
pub struct Harness {
    clock: VirtualClock,
    config: HarnessConfig,
    inputs: Vec<Box<dyn AnyInput>>,
    assertions: Vec<Box<dyn AnyAssertion>>,
    retained: Vec<Box<dyn Any>>,
    created_at: Location,
    ran: bool,
}

impl Harness {
    /// Create a harness with the default configuration.
    #[track_caller]
    pub fn new() -> Self {
        Harness::with_config(HarnessConfig::default())
    }

    /// Create a harness with an explicit configuration.
    #[track_caller]
    pub fn with_config(config: HarnessConfig) -> Self {
        Harness {
            clock: VirtualClock::new(),
            config,
            inputs: Vec::new(),
            assertions: Vec::new(),
            retained: Vec::new(),
            created_at: Location::caller(),
            ran: false,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// A handle to this harness's clock, for graph stages that schedule
    /// their own virtual-time activity.
    pub fn clock_handle(&self) -> ClockHandle {
        self.clock.handle()
    }

    // ==================== Declarations ====================

    /// Declare timestamped input events for `target`.
    ///
    /// Nothing is delivered yet: the events are materialized as hot
    /// emissions on the clock when the run phase begins, so sources wired
    /// lazily inside the test body are already subscribed before anything
    /// fires.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WildcardInput`] if any event carries
    /// [`ANY_TIME`]; inputs must be scheduled at concrete ticks. Nothing is
    /// registered in that case.
    pub fn input<T, S>(&mut self, target: &S, events: Vec<Recorded<T>>) -> Result
    where
        T: Element,
        S: Sink<T> + Clone + Send + 'static,
    {
        if let Some(index) = events.iter().position(|event| event.time == ANY_TIME) {
            return Err(Error::WildcardInput { index });
        }
        self.inputs.push(Box::new(InputSpec {
            target: target.clone(),
            events,
        }));
        Ok(())
    }

    /// Declare an observation of `source`.
    ///
    /// The source is recorded for the whole run; configure the returned
    /// [`Assertion`] with filters and exactly one terminal operation. Each
    /// call records independently: declaring two expectations against the
    /// same source is fine and they resolve in declaration order.
    #[track_caller]
    pub fn expect<T, S>(&mut self, source: &S) -> Assertion<T>
    where
        T: Element,
        S: Source<T> + Clone + Send + 'static,
    {
        let assertion = Assertion::new(Box::new(source.clone()), Location::caller());
        self.assertions.push(assertion.erased());
        assertion
    }

    /// Keep `value` alive until the harness is discarded.
    ///
    /// Useful for relay subscriptions and other graph plumbing that would
    /// otherwise be dropped (and torn down) before the run phase.
    pub fn retain<V: 'static>(&mut self, value: V) {
        self.retained.push(Box::new(value));
    }

    // ==================== Run Phase ====================

    /// Run and report through the default sink.
    ///
    /// Every assertion is evaluated; if any failed, panics with all failures
    /// listed (after logging each via `tracing::error!`), so one mismatch
    /// never hides another. A no-op if the harness already ran.
    pub fn run(&mut self) {
        if let Some(results) = self.execute() {
            let failures: Vec<String> = results
                .iter()
                .filter(|result| result.is_failure())
                .map(ToString::to_string)
                .collect();
            if failures.is_empty() {
                return;
            }
            for failure in &failures {
                tracing::error!(%failure, "assertion failed");
            }
            panic!(
                "{} of {} assertion(s) failed:\n{}",
                failures.len(),
                results.len(),
                failures.join("\n")
            );
        }
    }

    /// Run and hand the ordered results to `handler` instead of the default
    /// sink.
    ///
    /// Results arrive in declaration order. A harness-level failure (the
    /// quiescence watchdog expiring) is prepended, attributed to the
    /// harness's creation site. A no-op if the harness already ran; the
    /// handler is not called in that case.
    pub fn run_with(&mut self, handler: impl FnOnce(&[AssertionResult])) {
        if let Some(results) = self.execute() {
            handler(&results);
        }
    }

    /// The run phase proper. Returns `None` if the harness already ran.
    fn execute(&mut self) -> Option<Vec<AssertionResult>> {
        if self.ran {
            return None;
        }
        self.ran = true;

        tracing::debug!(
            inputs = self.inputs.len(),
            assertions = self.assertions.len(),
            "run phase starting"
        );

        // Wire recordings first so inputs scheduled below are observed from
        // the first tick.
        let mut keep_alive = Vec::new();
        for assertion in &self.assertions {
            assertion.wire(&self.clock, &mut keep_alive);
        }

        let mut horizon: VirtualTime = 0;
        for input in &self.inputs {
            horizon = horizon.max(input.latest_time());
        }
        for assertion in &self.assertions {
            horizon = horizon.max(assertion.latest_declared_time());
        }
        for input in self.inputs.drain(..) {
            input.materialize(&self.clock);
        }

        let horizon = horizon.saturating_add(self.config.settle_margin());
        tracing::debug!(horizon, "advancing virtual clock");
        let settled = self
            .clock
            .advance_until_quiescent(horizon, self.config.watchdog());

        let mut results = Vec::with_capacity(self.assertions.len() + 1);
        if let Err(err) = settled {
            tracing::warn!(%err, "run phase did not settle");
            results.push(AssertionResult::Failure {
                message: err.to_string(),
                location: self.created_at,
            });
        }
        for assertion in &self.assertions {
            results.push(assertion.evaluate());
        }
        drop(keep_alive);

        tracing::debug!(
            total = results.len(),
            failures = results.iter().filter(|r| r.is_failure()).count(),
            "run phase reported"
        );
        Some(results)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Harness::new()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if !self.ran && !std::thread::panicking() {
            self.run();
        }
    }
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("inputs", &self.inputs.len())
            .field("assertions", &self.assertions.len())
            .field("ran", &self.ran)
            .finish_non_exhaustive()
    }
}

/// One declared input: a target sink plus its event script, consumed exactly
/// once when the run phase materializes it on the clock.
trait AnyInput: Send {
    fn latest_time(&self) -> VirtualTime;
    fn materialize(self: Box<Self>, clock: &VirtualClock);
}

struct InputSpec<T, S> {
    target: S,
    events: Vec<Recorded<T>>,
}

impl<T, S> AnyInput for InputSpec<T, S>
where
    T: Element,
    S: Sink<T> + Clone + Send + 'static,
{
    fn latest_time(&self) -> VirtualTime {
        self.events
            .iter()
            .map(|event| event.time)
            .max()
            .unwrap_or(VirtualTime::MIN)
    }

    fn materialize(self: Box<Self>, clock: &VirtualClock) {
        let InputSpec { target, events } = *self;
        for event in events {
            let target = target.clone();
            clock.schedule_at(event.time, move || target.accept(event.event));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        any, completed, next, ColdSource, OpGuard, StreamEvent, Subject, Variable,
    };
    use std::sync::{mpsc, Arc, Mutex};
    use std::time::Duration;

    fn init_tracing() {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        });
    }

    #[test]
    fn records_inputs_and_matches_with_wildcard_times() {
        init_tracing();
        let mut h = Harness::new();
        let source = Subject::<&str>::new();
        h.input(&source, vec![next(100, "A"), next(200, "B"), completed(300)])
            .unwrap();
        h.expect(&source).filter_next().equal_values(vec!["A", "B"]);
        h.expect(&source)
            .equal(vec![next(100, "A"), next(200, "B"), completed(300)]);
        h.run();
    }

    #[test]
    fn results_arrive_in_declaration_order() {
        let mut h = Harness::new();
        let source = Subject::<i32>::new();
        h.input(&source, vec![next(100, 1)]).unwrap();
        h.expect(&source).equal(vec![next(100, 1)]); // passes
        h.expect(&source).equal(vec![next(100, 2)]); // fails

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        h.run_with(move |results| {
            sink.lock()
                .unwrap()
                .extend(results.iter().map(AssertionResult::is_success));
        });
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn wildcard_input_is_rejected_before_scheduling() {
        let mut h = Harness::new();
        let source = Subject::<i32>::new();
        let result = h.input(&source, vec![next(100, 1), any(2)]);
        assert_eq!(result, Err(Error::WildcardInput { index: 1 }));

        // The rejected declaration left nothing behind: the run sees no
        // inputs and the observation stays empty.
        h.expect(&source).is_empty();
        h.run();
    }

    #[test]
    fn dropping_an_unrun_harness_triggers_the_run() {
        let source = Subject::<i32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let probe = {
            let seen = Arc::clone(&seen);
            source.subscribe(Box::new(move |event| {
                if let StreamEvent::Next(value) = event {
                    seen.lock().unwrap().push(value);
                }
            }))
        };

        let mut h = Harness::new();
        h.input(&source, vec![next(100, 7)]).unwrap();
        h.expect(&source).count(1);
        drop(h);

        assert_eq!(*seen.lock().unwrap(), vec![7]);
        probe.dispose();
    }

    #[test]
    fn dropping_a_failing_harness_panics_with_the_failure() {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut h = Harness::new();
            let source = Subject::<i32>::new();
            h.input(&source, vec![next(100, 1)]).unwrap();
            h.expect(&source).equal(vec![next(100, 2)]);
        }));
        let panic = result.unwrap_err();
        let message = panic
            .downcast_ref::<String>()
            .cloned()
            .unwrap_or_default();
        assert!(message.contains("1 of 1 assertion(s) failed"), "{message}");
    }

    #[test]
    fn run_is_idempotent() {
        let mut h = Harness::new();
        let source = Subject::<i32>::new();
        h.input(&source, vec![next(100, 1)]).unwrap();
        h.expect(&source).count(1);

        let calls = Arc::new(Mutex::new(0));
        let first = Arc::clone(&calls);
        h.run_with(move |_| *first.lock().unwrap() += 1);
        let second = Arc::clone(&calls);
        h.run_with(move |_| *second.lock().unwrap() += 1);
        drop(h); // the implicit trigger is also a no-op now

        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn variable_replays_its_initial_value_at_tick_zero() {
        let mut h = Harness::new();
        let variable = Variable::new(0);
        h.input(&variable, vec![next(300, 1), next(400, 2), next(500, 3)])
            .unwrap();
        h.expect(&variable)
            .equal(vec![next(0, 0), next(300, 1), next(400, 2), next(500, 3)]);
        h.run();
    }

    #[test]
    fn merged_sources_interleave_by_virtual_time() {
        let mut h = Harness::new();
        let feeds: Vec<Subject<&str>> = (0..3).map(|_| Subject::new()).collect();
        let merged = Subject::<&str>::new();
        for feed in &feeds {
            let out = merged.clone();
            let relay = feed.subscribe(Box::new(move |event| {
                if event.is_next() {
                    out.accept(event);
                }
            }));
            h.retain(relay);
        }

        h.input(&feeds[0], vec![next(500, "A")]).unwrap();
        h.input(&feeds[1], vec![next(300, "B")]).unwrap();
        h.input(&feeds[2], vec![next(100, "C"), next(600, "D")])
            .unwrap();
        h.expect(&merged).equal_values(vec!["C", "B", "A", "D"]);
        h.run();
    }

    #[test]
    fn retained_values_live_until_the_harness_is_discarded() {
        let marker = Arc::new(());
        let weak = Arc::downgrade(&marker);

        let mut h = Harness::new();
        h.retain(marker);
        h.run();
        assert!(weak.upgrade().is_some());

        drop(h);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn observes_a_cold_source_from_subscription_time() {
        let mut h = Harness::new();
        let cold = ColdSource::new(
            h.clock_handle(),
            vec![next(10, 1), next(20, 2), completed(30)],
        )
        .unwrap();
        h.expect(&cold)
            .equal(vec![next(10, 1), next(20, 2), completed(30)]);
        h.run();
    }

    #[test]
    fn cross_thread_stage_keeps_virtual_timestamps() {
        init_tracing();
        let mut h = Harness::new();
        let input = Subject::<i32>::new();
        let output = Subject::<i32>::new();
        let handle = h.clock_handle();

        // Worker thread doubles each value and schedules the emission back
        // onto the clock at the tick the value was observed at.
        let (tx, rx) = mpsc::channel::<(VirtualTime, i32, OpGuard)>();
        let worker_out = output.clone();
        let worker_handle = handle.clone();
        let worker = std::thread::spawn(move || {
            while let Ok((time, value, guard)) = rx.recv() {
                let out = worker_out.clone();
                worker_handle.schedule_at(time, move || out.accept(StreamEvent::Next(value * 2)));
                drop(guard);
            }
        });

        let bridge_handle = handle.clone();
        let bridge = input.subscribe(Box::new(move |event| {
            if let StreamEvent::Next(value) = event {
                let guard = bridge_handle.begin_op();
                tx.send((bridge_handle.now(), value, guard)).unwrap();
            }
        }));
        h.retain(bridge);

        h.input(&input, vec![next(100, 1), next(200, 2), next(300, 3)])
            .unwrap();
        h.expect(&output)
            .equal(vec![next(100, 2), next(200, 4), next(300, 6)]);
        h.run();

        drop(h); // releases the bridge subscription, ending the worker loop
        worker.join().unwrap();
    }

    #[test]
    fn stuck_cross_thread_work_fails_as_a_harness_level_result() {
        let mut h =
            Harness::with_config(HarnessConfig::default().with_watchdog(Duration::from_millis(30)));
        let source = Subject::<i32>::new();
        h.input(&source, vec![next(100, 1)]).unwrap();
        h.expect(&source).count(1);

        // An operation that never completes.
        std::mem::forget(h.clock_handle().begin_op());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        h.run_with(move |results| {
            sink.lock()
                .unwrap()
                .extend(results.iter().map(|r| r.message().map(String::from)));
        });

        let results = seen.lock().unwrap();
        // Harness-level failure first, then the (unmet) per-assertion result.
        assert_eq!(results.len(), 2);
        assert!(results[0].as_deref().unwrap().contains("failed to settle"));
    }

    #[test]
    fn empty_harness_runs_cleanly() {
        let mut h = Harness::new();
        h.run();
        assert!(format!("{h:?}").contains("ran: true"));
    }
}
