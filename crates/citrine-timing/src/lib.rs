//! Emulated-time bookkeeping for the multi-core scheduler.
//!
//! Every emulated CPU core owns a [`CoreTimer`]: a local tick counter plus the budget ("downcount")
//! of the slice it is currently allowed to run. The [`Timing`] hub owns the single global clock
//! that all cores are reconciled against, the per-core timers, and the registry of timed event
//! types.
//!
//! Timed events use **event delivery** rather than callbacks stored inside the timer: advancing a
//! timer returns the events that became due, and [`Timing::advance_timer`] dispatches them to
//! handlers only after the timer borrow has been released. Handlers are therefore free to
//! schedule follow-up events on any core (including the one being advanced).
#![forbid(unsafe_code)]

mod event;
mod timer;
mod timing;
mod units;

pub use event::{EventTypeId, TimerEvent};
pub use timer::CoreTimer;
pub use timing::{SharedCoreTimer, Timing, TimingError};
pub use units::{
    cycles_to_us, ms_to_cycles, ns_to_cycles, us_to_cycles, BASE_CLOCK_RATE_ARM11,
};

/// Upper bound on the length of a single scheduling slice, in CPU ticks.
///
/// A timer with no pending events reports this value from [`CoreTimer::max_slice_length`].
pub const MAX_SLICE_LENGTH: u64 = 20_000;
