//! Cooperative round scheduler for the application cores.
//!
//! All cores are expected to sit at the global clock at the start of a round. A core can fall
//! behind when it stops early (a reschedule was prepared mid-slice). Each round first pulls lagging
//! cores forward by granting them the missing ticks; if one lags by more than
//! [`SchedulerConfig::catch_up_threshold`], only that core runs this round. Otherwise every core
//! runs the same synchronized slice, bounded by the nearest pending timed event on any core, and
//! the global clock moves by exactly that slice.

use std::rc::Rc;

use citrine_timing::Timing;
use tracing::trace;

use crate::collab::{CoreId, CpuCore, SharedKernel};
use crate::config::SchedulerConfig;
use crate::reschedule::RescheduleHandle;

/// What a round did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundKind {
    /// Only `core` ran, to work off a lag of `delay` ticks.
    CatchUp { core: CoreId, delay: u64 },
    /// Every core ran `slice` ticks and the global clock advanced by the same amount.
    Synchronized { slice: u64 },
}

#[derive(Debug, Clone, Default)]
pub struct CoreScheduler {
    config: SchedulerConfig,
}

impl CoreScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs one scheduling round over `cores`.
    pub fn run_round(
        &self,
        timing: &Timing,
        kernel: &SharedKernel,
        cores: &[Rc<dyn CpuCore>],
        reschedule: &RescheduleHandle,
    ) -> RoundKind {
        let global = timing.global_ticks();
        let mut max_delay = 0;
        let mut lagging = None;
        for core in cores {
            let delay = global.saturating_sub(core.timer().borrow().ticks());
            if delay > 0 {
                timing.advance_timer(core.timer(), delay);
                // Strictly greater: the lowest id wins ties.
                if delay > max_delay {
                    max_delay = delay;
                    lagging = Some(core);
                }
            }
        }

        if max_delay > self.config.catch_up_threshold {
            if let Some(core) = lagging {
                trace!(core = core.id(), delay = max_delay, "catch-up round");
                execute(core, kernel, reschedule);
                return RoundKind::CatchUp {
                    core: core.id(),
                    delay: max_delay,
                };
            }
        }

        let slice = cores
            .iter()
            .map(|core| core.timer().borrow().max_slice_length())
            .fold(self.config.max_slice_length, u64::min);
        for core in cores {
            timing.advance_timer(core.timer(), slice);
        }
        for core in cores {
            execute(core, kernel, reschedule);
        }
        timing.add_to_global_ticks(slice);
        RoundKind::Synchronized { slice }
    }

    /// Lets the kernel pick new threads on every core if a reschedule was requested.
    ///
    /// Returns whether anything was rescheduled.
    pub fn apply_reschedule(
        &self,
        kernel: &SharedKernel,
        cores: &[Rc<dyn CpuCore>],
        reschedule: &RescheduleHandle,
    ) -> bool {
        if !reschedule.take_pending() {
            return false;
        }
        for core in cores {
            trace!(core = core.id(), "reschedule core");
            kernel.borrow_mut().reschedule(core.id());
        }
        true
    }
}

fn execute(core: &Rc<dyn CpuCore>, kernel: &SharedKernel, reschedule: &RescheduleHandle) {
    reschedule.set_running_core(Rc::clone(core));
    kernel.borrow_mut().set_running_core(core.id());

    // The kernel borrow must not outlive this check: the core calls back into the kernel while it
    // runs.
    let has_thread = kernel.borrow().has_current_thread();
    if has_thread {
        core.run();
    } else {
        // Nothing to run: skip to the end of the slice and let the kernel find a thread.
        trace!(core = core.id(), "core idling");
        core.timer().borrow_mut().idle();
        reschedule.prepare_reschedule();
    }
}
