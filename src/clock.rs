use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    fmt,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use crate::{Error, Result, VirtualTime};

type Action = Box<dyn FnOnce() + Send>;

/// A deterministic virtual scheduler.
///
/// The clock holds a queue of actions ordered by `(due_time, scheduling
/// order)`, so two actions due at the same tick always run in the order they
/// were scheduled. Each harness owns its own clock; there is no process-wide
/// scheduler state, which keeps parallel tests isolated.
///
/// Virtual time only moves while the harness drains the queue during its run
/// phase. Actions scheduled in the past run at the current time.
///
/// Cross-thread stages participate through a [`ClockHandle`]: a stage opens
/// an [`OpGuard`] before handing work to another thread, and the clock
/// refuses to advance time or declare quiescence while any guard is open,
/// blocking (bounded by the run watchdog) until the remote side schedules
/// its follow-up and drops the guard.
pub struct VirtualClock {
    core: Arc<ClockCore>,
}

/// A cheap, cloneable, thread-safe handle to a [`VirtualClock`].
///
/// Handles are how test graph stages talk to the clock: read the current
/// virtual time, schedule follow-up actions, and bracket cross-thread work
/// with [`begin_op`](ClockHandle::begin_op).
#[derive(Clone)]
pub struct ClockHandle {
    core: Arc<ClockCore>,
}

/// RAII token for in-flight cross-thread work.
///
/// While any guard is open the clock treats the schedule as incomplete: it
/// will not advance virtual time past the current tick and will not declare
/// quiescence. Drop the guard once the remote side has scheduled whatever it
/// is going to schedule (or decided to schedule nothing).
pub struct OpGuard {
    core: Arc<ClockCore>,
}

struct ClockCore {
    state: Mutex<ClockState>,
    activity: Condvar,
}

struct ClockState {
    now: VirtualTime,
    queue: BinaryHeap<Scheduled>,
    next_seq: u64,
    open_ops: usize,
}

struct Scheduled {
    due: VirtualTime,
    seq: u64,
    action: Action,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // Reversed so the max-heap pops the earliest (due, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl ClockCore {
    fn state(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().expect("clock state poisoned")
    }

    fn now(&self) -> VirtualTime {
        self.state().now
    }

    fn schedule_at(&self, time: VirtualTime, action: Action) {
        let mut state = self.state();
        let due = time.max(state.now);
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Scheduled { due, seq, action });
        self.activity.notify_all();
    }
}

impl VirtualClock {
    /// Create a clock at tick 0.
    pub fn new() -> Self {
        VirtualClock {
            core: Arc::new(ClockCore {
                state: Mutex::new(ClockState {
                    now: 0,
                    queue: BinaryHeap::new(),
                    next_seq: 0,
                    open_ops: 0,
                }),
                activity: Condvar::new(),
            }),
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.core.now()
    }

    /// Schedule `action` to run at virtual time `time` (clamped to the
    /// current time if already past).
    pub fn schedule_at(&self, time: VirtualTime, action: impl FnOnce() + Send + 'static) {
        self.core.schedule_at(time, Box::new(action));
    }

    /// A shareable handle to this clock.
    pub fn handle(&self) -> ClockHandle {
        ClockHandle {
            core: Arc::clone(&self.core),
        }
    }

    /// Drain every action due at or before `horizon`, advancing virtual time
    /// as actions run, until the schedule is quiescent; then set the time to
    /// `horizon`.
    ///
    /// Time never advances while a cross-thread operation is open: the clock
    /// first waits for the remote side to schedule its follow-up, so same-tick
    /// work injected from another thread still runs at the tick that caused
    /// it. The wall-clock `watchdog` bounds the whole drain; expiry yields
    /// [`Error::SettleTimeout`] whether the clock was blocked on a stuck
    /// operation or busy with a runaway schedule.
    pub(crate) fn advance_until_quiescent(
        &self,
        horizon: VirtualTime,
        watchdog: Duration,
    ) -> Result {
        let deadline = Instant::now() + watchdog;
        loop {
            match self.next_action(horizon, deadline, watchdog)? {
                Some(action) => action(),
                None => return Ok(()),
            }
        }
    }

    /// Pop the next runnable action, block for open operations, or declare
    /// quiescence (`None`).
    fn next_action(
        &self,
        horizon: VirtualTime,
        deadline: Instant,
        watchdog: Duration,
    ) -> Result<Option<Action>> {
        let mut state = self.core.state();
        loop {
            let due_at_current = state
                .queue
                .peek()
                .is_some_and(|scheduled| scheduled.due <= state.now);
            if due_at_current {
                if Instant::now() >= deadline {
                    let pending = state.queue.len() + state.open_ops;
                    return Err(Error::SettleTimeout(watchdog, pending));
                }
                let scheduled = state.queue.pop().expect("peeked entry vanished");
                return Ok(Some(scheduled.action));
            }

            if state.open_ops == 0 {
                // Nothing runnable at the current tick and no one can inject
                // more: step to the next due action, or finish.
                if let Some(scheduled) = state.queue.peek() {
                    if scheduled.due <= horizon {
                        if Instant::now() >= deadline {
                            let pending = state.queue.len();
                            return Err(Error::SettleTimeout(watchdog, pending));
                        }
                        let scheduled = state.queue.pop().expect("peeked entry vanished");
                        state.now = scheduled.due;
                        return Ok(Some(scheduled.action));
                    }
                }
                if state.now < horizon {
                    state.now = horizon;
                }
                return Ok(None);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(Error::SettleTimeout(watchdog, state.open_ops));
            }
            let (guard, _timed_out) = self
                .core
                .activity
                .wait_timeout(state, remaining)
                .expect("clock state poisoned");
            state = guard;
        }
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        VirtualClock::new()
    }
}

impl fmt::Debug for VirtualClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.core.state();
        f.debug_struct("VirtualClock")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .field("open_ops", &state.open_ops)
            .finish()
    }
}

impl ClockHandle {
    /// The current virtual time.
    pub fn now(&self) -> VirtualTime {
        self.core.now()
    }

    /// Schedule `action` to run at virtual time `time` (clamped to the
    /// current time if already past). Safe to call from any thread.
    pub fn schedule_at(&self, time: VirtualTime, action: impl FnOnce() + Send + 'static) {
        self.core.schedule_at(time, Box::new(action));
    }

    /// Open a cross-thread operation bracket.
    ///
    /// Call this *before* handing work to another thread; drop the returned
    /// guard from that thread once its follow-up has been scheduled.
    pub fn begin_op(&self) -> OpGuard {
        let mut state = self.core.state();
        state.open_ops += 1;
        OpGuard {
            core: Arc::clone(&self.core),
        }
    }
}

impl fmt::Debug for ClockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockHandle")
            .field("now", &self.now())
            .finish_non_exhaustive()
    }
}

impl Drop for OpGuard {
    fn drop(&mut self) {
        let mut state = self.core.state();
        state.open_ops -= 1;
        drop(state);
        self.core.activity.notify_all();
    }
}

impl fmt::Debug for OpGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpGuard").finish_non_exhaustive()
    }
}
