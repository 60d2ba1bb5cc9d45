//! Environment abstraction for deterministic testing.
//!
//! Decouples the synchronization state machines from wall-clock time. The
//! state machines never read the clock themselves: every time-dependent
//! method takes `now` from the caller, which gets it from an [`Environment`].
//! Production uses real time; tests pass hand-built instants.

use std::{future::Future, ops::Sub, time::Duration};

/// Bound shared by every instant type the state machines accept.
pub trait Timestamp: Copy + Ord + Send + Sync + Sub<Output = Duration> {}

impl<T> Timestamp for T where T: Copy + Ord + Send + Sync + Sub<Output = Duration> {}

/// Abstract environment providing time and async sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards within one execution context
pub trait Environment: Clone + Send + Sync + 'static {
    /// The specific instant type used by this environment.
    ///
    /// Production environments use `std::time::Instant`; simulations may use
    /// virtual time.
    type Instant: Timestamp;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Sleeps for the specified duration.
    ///
    /// Only driver code awaits this. State machines are synchronous.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}
