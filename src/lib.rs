//! Deadline-scheduling primitives for single-threaded event loops.
//!
//! A [`timer::TimerDriver`] tracks any number of one-shot or repeating
//! timers, tells the loop how long it may block waiting for I/O before the
//! next deadline ([`timer::TimerDriver::wait_budget`]), and fires everything
//! due at the loop's current time snapshot
//! ([`timer::TimerDriver::run_expired`]). Timers are totally ordered by
//! (deadline, start sequence id), so two timers armed for the same instant
//! fire in the order they were started. Time is an opaque monotonically
//! non-decreasing `u64` owned by the loop; this crate never reads a clock.

use thiserror::Error;

pub mod heap;
pub mod timer;

/// Error type for scheduler operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("handle is closing and can no longer be scheduled")]
    ClosingHandle,
    #[error("timer has no callback set")]
    MissingCallback,
    #[error("timer has no repeat interval to rearm with")]
    RepeatNotSet,
}
