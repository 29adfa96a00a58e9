/// Logical clock ticks.
///
/// All timing in metronome is virtual: a test declares events at integer
/// tick offsets and the [`VirtualClock`](crate::VirtualClock) delivers them
/// in tick order, instantly in wall-clock terms. Signed so that arithmetic
/// on offsets never wraps in user code.
pub type VirtualTime = i64;

/// Sentinel time meaning "match any timestamp".
///
/// Only meaningful in *expected* events (see [`any`](crate::any)). Using it
/// in an input event is a declaration error and is rejected by
/// [`Harness::input`](crate::Harness::input) before anything is scheduled.
///
/// `ANY_TIME` is outside of time: it survives every time-window filter and
/// compares equal to every concrete time under [`times_equal`].
pub const ANY_TIME: VirtualTime = VirtualTime::MIN;

/// Wildcard-aware time equality.
///
/// Two times are equal when they are the same tick, or when either side is
/// [`ANY_TIME`]. Symmetric by construction.
pub fn times_equal(lhs: VirtualTime, rhs: VirtualTime) -> bool {
    lhs == rhs || lhs == ANY_TIME || rhs == ANY_TIME
}

/// Renders a time for diagnostics, with the wildcard shown as `any`.
pub(crate) fn display_time(time: VirtualTime) -> String {
    if time == ANY_TIME {
        "any".to_string()
    } else {
        time.to_string()
    }
}
