//! Interfaces of the subsystems a [`crate::System`] drives but does not implement.
//!
//! A [`Backend`] builds each collaborator when the lifecycle reaches it. Everything here is
//! single-threaded: collaborators are shared through `Rc`, and a core's kernel callbacks may
//! re-enter the scheduler (see [`crate::RescheduleHandle`]) while the core is running.

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::path::Path;
use std::rc::{Rc, Weak};

use citrine_audio::{AudioCoreKind, DspInterface};
use citrine_timing::{SharedCoreTimer, Timing};
use thiserror::Error;

use crate::reschedule::RescheduleHandle;
use crate::status::ResultStatus;
use crate::telemetry::{FieldType, FieldValue};

pub type CoreId = usize;

pub type SharedMemory = Rc<RefCell<dyn Memory>>;
pub type SharedKernel = Rc<RefCell<dyn Kernel>>;
pub type SharedDsp = Rc<RefCell<dyn DspInterface>>;

/// CPU execution engine backing a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuEngine {
    Jit,
    Interpreter,
}

/// An emulated application core.
///
/// All methods take `&self`: the kernel may call [`CpuCore::prepare_reschedule`] on the core that
/// is currently inside [`CpuCore::run`].
pub trait CpuCore {
    fn id(&self) -> CoreId;

    fn engine(&self) -> CpuEngine;

    fn timer(&self) -> &SharedCoreTimer;

    /// Executes until the timer's downcount is exhausted or a reschedule is prepared.
    fn run(&self);

    /// Makes the current [`CpuCore::run`] return at the next opportunity.
    fn prepare_reschedule(&self);
}

impl fmt::Debug for dyn CpuCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CpuCore")
            .field("id", &self.id())
            .field("engine", &self.engine())
            .finish_non_exhaustive()
    }
}

pub trait Memory {
    /// Attaches the audio core whose RAM is mapped into the address space.
    fn set_dsp(&mut self, dsp: Weak<RefCell<dyn DspInterface>>);

    /// The attached audio core, if it is still alive.
    fn dsp(&self) -> Option<SharedDsp>;
}

/// A process materialised by a [`Loader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub name: String,
    pub program_id: u64,
}

/// Parameters the kernel is built with.
pub struct KernelConfig {
    pub memory: SharedMemory,
    pub timing: Rc<Timing>,
    /// Lets kernel code paths request a reschedule of the running core.
    pub reschedule: RescheduleHandle,
    pub system_mode: u32,
    pub num_cores: usize,
    pub n3ds_mode: u8,
}

pub trait Kernel {
    fn set_cpus(&mut self, cores: Vec<Rc<dyn CpuCore>>);

    fn set_running_core(&mut self, core: CoreId);

    /// Whether the running core's thread manager has a thread to execute.
    fn has_current_thread(&self) -> bool;

    /// Picks the next thread to run on `core`.
    fn reschedule(&mut self, core: CoreId);

    fn set_current_process(&mut self, process: Process);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    #[error("file is encrypted")]
    Encrypted,

    #[error("file has an invalid format")]
    InvalidFormat,

    #[error("loader error {0}")]
    Other(u32),
}

/// Format-specific executable loader.
pub trait Loader {
    fn file_type(&self) -> &str;

    /// Kernel memory layout the program needs. `Ok(None)` breaks the loader contract.
    fn load_kernel_system_mode(&mut self) -> Result<Option<u32>, LoaderError>;

    /// New-hardware mode the program needs. `Ok(None)` breaks the loader contract.
    fn load_kernel_n3ds_mode(&mut self) -> Result<Option<u8>, LoaderError>;

    fn load(&mut self) -> Result<Process, LoaderError>;

    fn read_program_id(&self) -> Result<u64, LoaderError>;
}

pub trait TelemetrySession {
    fn add_field(&mut self, kind: FieldType, name: &str, value: FieldValue);

    /// Records what is known about the program before it is loaded.
    fn add_initial_info(&mut self, loader: &dyn Loader) {
        self.add_field(FieldType::App, "Loader_FileType", loader.file_type().into());
        if let Ok(program_id) = loader.read_program_id() {
            self.add_field(
                FieldType::App,
                "Loader_ProgramId",
                format!("{program_id:016X}").into(),
            );
        }
    }
}

pub trait EmuWindow {
    fn make_current(&self);

    fn done_current(&self);
}

pub trait Renderer {
    fn init(&mut self, window: &dyn EmuWindow, memory: &SharedMemory) -> ResultStatus;
}

/// Memory-mapped hardware outside the cores (GPU registers, LCD, ...).
pub trait HardwareBlock {
    fn init(&mut self, memory: &SharedMemory);

    /// Called once after every scheduling round.
    fn update(&mut self);
}

pub trait ServiceManager {
    /// Installs the HLE services. The DSP service registers itself with `dsp` for interrupts.
    fn init_services(&mut self, kernel: &SharedKernel, dsp: &SharedDsp);
}

pub trait ArchiveManager {
    /// Creates an empty `SystemData.bin` save file for `program_id` if it does not exist.
    fn ensure_system_save_data(&mut self, program_id: u64) -> io::Result<()>;
}

pub trait RpcServer {
    fn is_listening(&self) -> bool;
}

pub trait DebugStub {
    fn init(&mut self);
}

pub trait CheatEngine {
    fn load_cheats(&mut self, program_id: u64);
}

pub trait CustomTexCache {
    fn find_custom_textures(&mut self, program_id: u64);

    fn preload_textures(&mut self);
}

/// What a multiplayer room is told about the running game.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameInfo {
    pub name: String,
    pub id: u64,
}

pub trait RoomMember {
    fn send_game_info(&self, info: GameInfo);
}

/// Frontend dialog that lets the user pick a Mii for the running program.
pub trait MiiSelector {
    /// Index of the chosen Mii, or `None` when the user cancelled.
    fn select(&self, title: &str) -> Option<u32>;
}

/// Frontend text entry shown when the program opens the software keyboard.
pub trait SoftwareKeyboard {
    fn input_text(&self, hint: &str, max_len: usize) -> Option<String>;
}

/// Host image codec used by applets that read or write pictures.
pub trait ImageInterface {
    /// Writes `rgba` (`width * height` pixels) as a PNG file.
    fn encode_png(&self, path: &Path, width: u32, height: u32, rgba: &[u8]) -> io::Result<()>;

    /// Returns `(width, height, rgba)`.
    fn decode_png(&self, path: &Path) -> io::Result<(u32, u32, Vec<u8>)>;
}

/// Factory for every collaborator of a session.
pub trait Backend {
    /// Loader for `path`, or `None` when no loader recognises the file.
    fn get_loader(&self, path: &Path) -> Option<Box<dyn Loader>>;

    fn create_memory(&self) -> SharedMemory;

    fn create_kernel(&self, config: KernelConfig) -> SharedKernel;

    /// Whether [`CpuEngine::Jit`] cores can be built on this host.
    fn supports_jit(&self) -> bool;

    fn create_cpu_core(
        &self,
        engine: CpuEngine,
        id: CoreId,
        memory: &SharedMemory,
        timer: SharedCoreTimer,
    ) -> Rc<dyn CpuCore>;

    fn create_dsp(&self, kind: AudioCoreKind, memory: &SharedMemory) -> SharedDsp;

    fn create_telemetry(&self) -> Box<dyn TelemetrySession>;

    fn create_rpc_server(&self) -> Box<dyn RpcServer>;

    fn create_service_manager(&self) -> Box<dyn ServiceManager>;

    fn create_archive_manager(&self) -> Box<dyn ArchiveManager>;

    fn create_hardware(&self) -> Box<dyn HardwareBlock>;

    fn create_debug_stub(&self) -> Box<dyn DebugStub>;

    fn create_renderer(&self) -> Box<dyn Renderer>;

    fn create_cheat_engine(&self) -> Box<dyn CheatEngine>;

    fn create_custom_tex_cache(&self) -> Box<dyn CustomTexCache>;

    fn room_member(&self) -> Option<Weak<dyn RoomMember>>;
}
