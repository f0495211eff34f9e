use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::collab::CpuCore;

#[derive(Default)]
struct RescheduleState {
    pending: Cell<bool>,
    running_core: RefCell<Option<Rc<dyn CpuCore>>>,
}

/// Deferred reschedule request shared by the scheduler and the kernel.
///
/// Requesting a reschedule only stops the running core and latches a flag; the kernel picks new
/// threads once the round is over.
#[derive(Clone, Default)]
pub struct RescheduleHandle {
    state: Rc<RescheduleState>,
}

impl std::fmt::Debug for RescheduleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RescheduleHandle")
            .field("pending", &self.state.pending.get())
            .field("running_core", &self.running_core().map(|core| core.id()))
            .finish()
    }
}

impl RescheduleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops the running core at its next opportunity and marks a reschedule as pending.
    pub fn prepare_reschedule(&self) {
        // Clone out of the cell: the core may call back into this handle.
        let core = self.state.running_core.borrow().clone();
        if let Some(core) = core {
            core.prepare_reschedule();
        }
        self.state.pending.set(true);
    }

    pub fn is_pending(&self) -> bool {
        self.state.pending.get()
    }

    /// Takes and clears the pending flag.
    pub fn take_pending(&self) -> bool {
        self.state.pending.replace(false)
    }

    pub fn running_core(&self) -> Option<Rc<dyn CpuCore>> {
        self.state.running_core.borrow().clone()
    }

    pub fn set_running_core(&self, core: Rc<dyn CpuCore>) {
        *self.state.running_core.borrow_mut() = Some(core);
    }

    /// Forgets the running core and any pending request.
    pub fn clear(&self) {
        self.state.running_core.borrow_mut().take();
        self.state.pending.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{CoreId, CpuEngine};
    use citrine_timing::{CoreTimer, SharedCoreTimer};

    struct CountingCore {
        timer: SharedCoreTimer,
        stops: Cell<u32>,
    }

    impl CpuCore for CountingCore {
        fn id(&self) -> CoreId {
            3
        }

        fn engine(&self) -> CpuEngine {
            CpuEngine::Interpreter
        }

        fn timer(&self) -> &SharedCoreTimer {
            &self.timer
        }

        fn run(&self) {}

        fn prepare_reschedule(&self) {
            self.stops.set(self.stops.get() + 1);
        }
    }

    #[test]
    fn prepare_signals_the_running_core_and_latches() {
        let handle = RescheduleHandle::new();
        handle.prepare_reschedule();
        assert!(handle.take_pending());

        let core = Rc::new(CountingCore {
            timer: Rc::new(RefCell::new(CoreTimer::new(3))),
            stops: Cell::new(0),
        });
        handle.set_running_core(core.clone());
        handle.clone().prepare_reschedule();

        assert_eq!(core.stops.get(), 1);
        assert!(handle.is_pending());
        assert!(handle.take_pending());
        assert!(!handle.take_pending());

        handle.clear();
        assert!(handle.running_core().is_none());
    }
}
