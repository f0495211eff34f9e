use std::cell::Cell;
use std::rc::Rc;

use citrine_timing::{SharedCoreTimer, Timing};
use tracing::trace;

use super::{HeadlessState, JournalGuard, Subsystem};
use crate::collab::{CoreId, CpuCore, CpuEngine, Kernel, KernelConfig, Process, SharedMemory};
use crate::reschedule::RescheduleHandle;

/// A core with no instruction set: every run retires the remaining slice budget (or the state's
/// run budget, whichever is smaller).
#[derive(Debug)]
pub struct HeadlessCore {
    id: CoreId,
    engine: CpuEngine,
    timer: SharedCoreTimer,
    reschedule_requested: Cell<bool>,
    state: Rc<HeadlessState>,
    _guard: JournalGuard,
}

impl HeadlessCore {
    pub(crate) fn new(
        id: CoreId,
        engine: CpuEngine,
        timer: SharedCoreTimer,
        state: &Rc<HeadlessState>,
    ) -> Self {
        Self {
            id,
            engine,
            timer,
            reschedule_requested: Cell::new(false),
            state: Rc::clone(state),
            _guard: JournalGuard::new(state, Subsystem::CpuCore(id)),
        }
    }
}

impl HeadlessCore {
    /// Whether a reschedule was prepared since the core last started running.
    pub fn reschedule_requested(&self) -> bool {
        self.reschedule_requested.get()
    }
}

impl CpuCore for HeadlessCore {
    fn id(&self) -> CoreId {
        self.id
    }

    fn engine(&self) -> CpuEngine {
        self.engine
    }

    fn timer(&self) -> &SharedCoreTimer {
        &self.timer
    }

    fn run(&self) {
        self.reschedule_requested.set(false);
        self.state.core_runs.borrow_mut().push(self.id);

        let mut timer = self.timer.borrow_mut();
        let remaining = u64::try_from(timer.downcount()).unwrap_or(0);
        let retired = match self.state.run_budget() {
            Some(budget) => remaining.min(budget),
            None => remaining,
        };
        timer.add_ticks(retired);
        trace!(core = self.id, retired, "headless core ran");
    }

    fn prepare_reschedule(&self) {
        self.reschedule_requested.set(true);
    }
}

/// Kernel stand-in: every core has a runnable thread once a process is loaded, unless the state
/// marks it idle.
pub struct HeadlessKernel {
    cores: Vec<Rc<dyn CpuCore>>,
    running_core: CoreId,
    process: Option<Process>,
    system_mode: u32,
    n3ds_mode: u8,
    reschedule: RescheduleHandle,
    state: Rc<HeadlessState>,
    _memory: SharedMemory,
    _timing: Rc<Timing>,
    _guard: JournalGuard,
}

impl HeadlessKernel {
    pub(crate) fn new(config: KernelConfig, state: &Rc<HeadlessState>) -> Self {
        Self {
            cores: Vec::with_capacity(config.num_cores),
            running_core: 0,
            process: None,
            system_mode: config.system_mode,
            n3ds_mode: config.n3ds_mode,
            reschedule: config.reschedule,
            state: Rc::clone(state),
            _memory: config.memory,
            _timing: config.timing,
            _guard: JournalGuard::new(state, Subsystem::Kernel),
        }
    }

    pub fn system_mode(&self) -> u32 {
        self.system_mode
    }

    pub fn n3ds_mode(&self) -> u8 {
        self.n3ds_mode
    }

    pub fn process(&self) -> Option<&Process> {
        self.process.as_ref()
    }
}

impl Kernel for HeadlessKernel {
    fn set_cpus(&mut self, cores: Vec<Rc<dyn CpuCore>>) {
        self.cores = cores;
    }

    fn set_running_core(&mut self, core: CoreId) {
        debug_assert!(self.cores.is_empty() || core < self.cores.len());
        self.running_core = core;
    }

    fn has_current_thread(&self) -> bool {
        self.process.is_some() && !self.state.is_core_idle(self.running_core)
    }

    fn reschedule(&mut self, core: CoreId) {
        self.state.reschedules.borrow_mut().push(core);
    }

    fn set_current_process(&mut self, process: Process) {
        self.state.processes.borrow_mut().push(process.clone());
        self.process = Some(process);
        // The main thread just became runnable.
        self.reschedule.prepare_reschedule();
    }
}
