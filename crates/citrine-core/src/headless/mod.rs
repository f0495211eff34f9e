//! Headless backend: minimal collaborators for running a [`crate::System`] without a real CPU
//! engine, OS or renderer.
//!
//! Cores burn their whole budget per run, the kernel treats every core as runnable unless told
//! otherwise, and every subsystem records its construction and destruction in a shared
//! [`HeadlessState`], which makes the lifecycle observable from the outside.

mod cpu;
mod devices;
mod loader;

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use citrine_audio::{AudioCoreKind, DspHle};
use citrine_timing::SharedCoreTimer;
use tracing::debug;

use crate::collab::{
    ArchiveManager, Backend, CheatEngine, CoreId, CpuCore, CpuEngine, CustomTexCache, DebugStub,
    GameInfo, HardwareBlock, KernelConfig, Loader, Process, Renderer, RoomMember, RpcServer,
    ServiceManager, SharedDsp, SharedKernel, SharedMemory, TelemetrySession,
};
use crate::status::ResultStatus;
use crate::telemetry::Field;

pub use cpu::{HeadlessCore, HeadlessKernel};
pub use devices::{system_save_data_path, HeadlessWindow};
pub use loader::{HeadlessImage, HeadlessLoader, IMAGE_HEADER_LEN, IMAGE_MAGIC};

use devices::{
    HeadlessArchiveManager, HeadlessCheatEngine, HeadlessDebugStub, HeadlessHardware,
    HeadlessMemory, HeadlessRenderer, HeadlessRoomMember, HeadlessRpcServer,
    HeadlessServiceManager, HeadlessTexCache, RecordingTelemetry,
};

/// Subsystems whose lifetime the headless backend tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Loader,
    Memory,
    Kernel,
    CpuCore(CoreId),
    Dsp,
    Telemetry,
    RpcServer,
    ServiceManager,
    ArchiveManager,
    Hardware,
    DebugStub,
    Renderer,
    CheatEngine,
    CustomTexCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalEntry {
    Created(Subsystem),
    Dropped(Subsystem),
}

/// Records a subsystem's creation when built and its destruction when dropped.
#[derive(Debug)]
pub(crate) struct JournalGuard {
    subsystem: Subsystem,
    state: Rc<HeadlessState>,
}

impl JournalGuard {
    pub(crate) fn new(state: &Rc<HeadlessState>, subsystem: Subsystem) -> Self {
        state.journal.borrow_mut().push(JournalEntry::Created(subsystem));
        Self {
            subsystem,
            state: Rc::clone(state),
        }
    }
}

impl Drop for JournalGuard {
    fn drop(&mut self) {
        self.state
            .journal
            .borrow_mut()
            .push(JournalEntry::Dropped(self.subsystem));
    }
}

/// Construction-time behaviour of a [`HeadlessBackend`].
#[derive(Debug, Clone, Default)]
pub struct HeadlessOptions {
    /// Report JIT support, so `use_cpu_jit` yields JIT-flavoured cores.
    pub jit_available: bool,
    /// Make renderer initialization fail with this status.
    pub renderer_failure: Option<ResultStatus>,
    /// Attach a multiplayer room member.
    pub room_member: bool,
    /// Host directory for save data and custom textures. Nothing is written when unset.
    pub user_dir: Option<PathBuf>,
}

/// Observable state shared by every headless collaborator.
///
/// The knobs ([`HeadlessState::set_core_idle`], [`HeadlessState::set_run_budget`]) may be changed
/// between rounds.
#[derive(Debug, Default)]
pub struct HeadlessState {
    journal: RefCell<Vec<JournalEntry>>,
    telemetry: RefCell<Vec<Field>>,
    game_info: RefCell<Vec<GameInfo>>,
    processes: RefCell<Vec<Process>>,
    core_runs: RefCell<Vec<CoreId>>,
    reschedules: RefCell<Vec<CoreId>>,
    save_data: RefCell<Vec<u64>>,
    texture_scans: RefCell<Vec<u64>>,
    cheats_loaded: RefCell<Vec<u64>>,
    textures_preloaded: Cell<bool>,
    hardware_updates: Cell<u64>,
    dsp_interrupts: Cell<u64>,
    idle_cores: RefCell<BTreeSet<CoreId>>,
    run_budget: Cell<Option<u64>>,
}

impl HeadlessState {
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.borrow().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.borrow_mut().clear();
    }

    /// Subsystems in the order they were dropped.
    pub fn dropped(&self) -> Vec<Subsystem> {
        self.journal
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Dropped(subsystem) => Some(*subsystem),
                JournalEntry::Created(_) => None,
            })
            .collect()
    }

    /// Subsystems created and not yet dropped.
    pub fn live(&self) -> Vec<Subsystem> {
        let mut live = Vec::new();
        for entry in self.journal.borrow().iter() {
            match entry {
                JournalEntry::Created(subsystem) => live.push(*subsystem),
                JournalEntry::Dropped(subsystem) => {
                    if let Some(pos) = live.iter().position(|s| s == subsystem) {
                        live.remove(pos);
                    }
                }
            }
        }
        live
    }

    pub fn telemetry(&self) -> Vec<Field> {
        self.telemetry.borrow().clone()
    }

    pub fn game_info(&self) -> Vec<GameInfo> {
        self.game_info.borrow().clone()
    }

    pub fn processes(&self) -> Vec<Process> {
        self.processes.borrow().clone()
    }

    pub fn core_runs(&self) -> Vec<CoreId> {
        self.core_runs.borrow().clone()
    }

    pub fn take_core_runs(&self) -> Vec<CoreId> {
        self.core_runs.take()
    }

    pub fn reschedules(&self) -> Vec<CoreId> {
        self.reschedules.borrow().clone()
    }

    pub fn save_data(&self) -> Vec<u64> {
        self.save_data.borrow().clone()
    }

    pub fn texture_scans(&self) -> Vec<u64> {
        self.texture_scans.borrow().clone()
    }

    pub fn textures_preloaded(&self) -> bool {
        self.textures_preloaded.get()
    }

    pub fn cheats_loaded(&self) -> Vec<u64> {
        self.cheats_loaded.borrow().clone()
    }

    pub fn hardware_updates(&self) -> u64 {
        self.hardware_updates.get()
    }

    pub fn dsp_interrupts(&self) -> u64 {
        self.dsp_interrupts.get()
    }

    /// Marks `core` as having no runnable thread.
    pub fn set_core_idle(&self, core: CoreId, idle: bool) {
        let mut idle_cores = self.idle_cores.borrow_mut();
        if idle {
            idle_cores.insert(core);
        } else {
            idle_cores.remove(&core);
        }
    }

    pub fn is_core_idle(&self, core: CoreId) -> bool {
        self.idle_cores.borrow().contains(&core)
    }

    /// Limits how many ticks a core retires per run. `None` lets cores use their whole slice.
    pub fn set_run_budget(&self, budget: Option<u64>) {
        self.run_budget.set(budget);
    }

    pub fn run_budget(&self) -> Option<u64> {
        self.run_budget.get()
    }
}

pub struct HeadlessBackend {
    options: HeadlessOptions,
    state: Rc<HeadlessState>,
    room_member: Option<Rc<HeadlessRoomMember>>,
}

impl HeadlessBackend {
    pub fn new(options: HeadlessOptions) -> Self {
        let state = Rc::new(HeadlessState::default());
        let room_member = options
            .room_member
            .then(|| Rc::new(HeadlessRoomMember::new(&state)));
        Self {
            options,
            state,
            room_member,
        }
    }

    pub fn state(&self) -> Rc<HeadlessState> {
        Rc::clone(&self.state)
    }

    pub fn options(&self) -> &HeadlessOptions {
        &self.options
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessOptions::default())
    }
}

impl Backend for HeadlessBackend {
    fn get_loader(&self, path: &Path) -> Option<Box<dyn Loader>> {
        let loader = HeadlessLoader::open(path, &self.state)?;
        Some(Box::new(loader))
    }

    fn create_memory(&self) -> SharedMemory {
        Rc::new(RefCell::new(HeadlessMemory::new(&self.state)))
    }

    fn create_kernel(&self, config: KernelConfig) -> SharedKernel {
        Rc::new(RefCell::new(HeadlessKernel::new(config, &self.state)))
    }

    fn supports_jit(&self) -> bool {
        self.options.jit_available
    }

    fn create_cpu_core(
        &self,
        engine: CpuEngine,
        id: CoreId,
        _memory: &SharedMemory,
        timer: SharedCoreTimer,
    ) -> Rc<dyn CpuCore> {
        Rc::new(HeadlessCore::new(id, engine, timer, &self.state))
    }

    fn create_dsp(&self, kind: AudioCoreKind, _memory: &SharedMemory) -> SharedDsp {
        if let AudioCoreKind::Lle { multithread } = kind {
            debug!(multithread, "headless backend serves the LLE audio core with the HLE model");
        }
        Rc::new(RefCell::new(devices::HeadlessDsp::new(DspHle::new(), &self.state)))
    }

    fn create_telemetry(&self) -> Box<dyn TelemetrySession> {
        Box::new(RecordingTelemetry::new(&self.state))
    }

    fn create_rpc_server(&self) -> Box<dyn RpcServer> {
        Box::new(HeadlessRpcServer::new(&self.state))
    }

    fn create_service_manager(&self) -> Box<dyn ServiceManager> {
        Box::new(HeadlessServiceManager::new(&self.state))
    }

    fn create_archive_manager(&self) -> Box<dyn ArchiveManager> {
        Box::new(HeadlessArchiveManager::new(
            &self.state,
            self.options.user_dir.clone(),
        ))
    }

    fn create_hardware(&self) -> Box<dyn HardwareBlock> {
        Box::new(HeadlessHardware::new(&self.state))
    }

    fn create_debug_stub(&self) -> Box<dyn DebugStub> {
        Box::new(HeadlessDebugStub::new(&self.state))
    }

    fn create_renderer(&self) -> Box<dyn Renderer> {
        Box::new(HeadlessRenderer::new(&self.state, self.options.renderer_failure))
    }

    fn create_cheat_engine(&self) -> Box<dyn CheatEngine> {
        Box::new(HeadlessCheatEngine::new(&self.state))
    }

    fn create_custom_tex_cache(&self) -> Box<dyn CustomTexCache> {
        Box::new(HeadlessTexCache::new(
            &self.state,
            self.options.user_dir.clone(),
        ))
    }

    fn room_member(&self) -> Option<Weak<dyn RoomMember>> {
        let member: Rc<dyn RoomMember> = self.room_member.clone()?;
        Some(Rc::downgrade(&member))
    }
}
