use std::cell::{Cell, RefCell};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use citrine_audio::{DspHle, DspInterface, DspInterruptSink, DspPipe, InterruptType};
use tracing::{debug, warn};

use super::{HeadlessState, JournalGuard, Subsystem};
use crate::collab::{
    ArchiveManager, CheatEngine, CustomTexCache, DebugStub, EmuWindow, GameInfo, HardwareBlock,
    Memory, Renderer, RoomMember, RpcServer, ServiceManager, SharedDsp, SharedKernel,
    SharedMemory, TelemetrySession,
};
use crate::status::ResultStatus;
use crate::telemetry::{Field, FieldType, FieldValue};

pub(crate) struct HeadlessMemory {
    dsp: Option<Weak<RefCell<dyn DspInterface>>>,
    _guard: JournalGuard,
}

impl HeadlessMemory {
    pub(crate) fn new(state: &Rc<HeadlessState>) -> Self {
        Self {
            dsp: None,
            _guard: JournalGuard::new(state, Subsystem::Memory),
        }
    }
}

impl Memory for HeadlessMemory {
    fn set_dsp(&mut self, dsp: Weak<RefCell<dyn DspInterface>>) {
        self.dsp = Some(dsp);
    }

    fn dsp(&self) -> Option<SharedDsp> {
        self.dsp.as_ref()?.upgrade()
    }
}

/// [`DspHle`] with lifetime tracking.
pub(crate) struct HeadlessDsp {
    hle: DspHle,
    _guard: JournalGuard,
}

impl HeadlessDsp {
    pub(crate) fn new(hle: DspHle, state: &Rc<HeadlessState>) -> Self {
        Self {
            hle,
            _guard: JournalGuard::new(state, Subsystem::Dsp),
        }
    }
}

impl DspInterface for HeadlessDsp {
    fn recv_data(&mut self, register_number: u32) -> u16 {
        self.hle.recv_data(register_number)
    }

    fn recv_data_is_ready(&self, register_number: u32) -> bool {
        self.hle.recv_data_is_ready(register_number)
    }

    fn set_semaphore(&mut self, semaphore_value: u16) {
        self.hle.set_semaphore(semaphore_value);
    }

    fn pipe_read(&mut self, pipe: DspPipe, length: usize) -> Vec<u8> {
        self.hle.pipe_read(pipe, length)
    }

    fn pipe_readable_size(&self, pipe: DspPipe) -> usize {
        self.hle.pipe_readable_size(pipe)
    }

    fn pipe_write(&mut self, pipe: DspPipe, buffer: &[u8]) {
        self.hle.pipe_write(pipe, buffer);
    }

    fn dsp_memory(&mut self) -> &mut [u8] {
        self.hle.dsp_memory()
    }

    fn set_service_to_interrupt(&mut self, service: Weak<dyn DspInterruptSink>) {
        self.hle.set_service_to_interrupt(service);
    }

    fn load_component(&mut self, component: &[u8]) {
        self.hle.load_component(component);
    }

    fn unload_component(&mut self) {
        self.hle.unload_component();
    }

    fn set_sink(&mut self, sink_id: &str, device_id: &str) {
        self.hle.set_sink(sink_id, device_id);
    }

    fn enable_stretching(&mut self, enable: bool) {
        self.hle.enable_stretching(enable);
    }
}

pub(crate) struct RecordingTelemetry {
    state: Rc<HeadlessState>,
    _guard: JournalGuard,
}

impl RecordingTelemetry {
    pub(crate) fn new(state: &Rc<HeadlessState>) -> Self {
        Self {
            state: Rc::clone(state),
            _guard: JournalGuard::new(state, Subsystem::Telemetry),
        }
    }
}

impl TelemetrySession for RecordingTelemetry {
    fn add_field(&mut self, kind: FieldType, name: &str, value: FieldValue) {
        self.state
            .telemetry
            .borrow_mut()
            .push(Field::new(kind, name, value));
    }
}

pub(crate) struct HeadlessRpcServer {
    _guard: JournalGuard,
}

impl HeadlessRpcServer {
    pub(crate) fn new(state: &Rc<HeadlessState>) -> Self {
        Self {
            _guard: JournalGuard::new(state, Subsystem::RpcServer),
        }
    }
}

impl RpcServer for HeadlessRpcServer {
    fn is_listening(&self) -> bool {
        false
    }
}

/// The DSP service: counts the interrupts the audio core raises.
struct DspService {
    state: Rc<HeadlessState>,
}

impl DspInterruptSink for DspService {
    fn signal_interrupt(&self, kind: InterruptType, pipe: DspPipe) {
        debug!(?kind, ?pipe, "DSP interrupt");
        let count = self.state.dsp_interrupts.get();
        self.state.dsp_interrupts.set(count + 1);
    }
}

pub(crate) struct HeadlessServiceManager {
    state: Rc<HeadlessState>,
    _dsp_service: Option<Rc<DspService>>,
    _guard: JournalGuard,
}

impl HeadlessServiceManager {
    pub(crate) fn new(state: &Rc<HeadlessState>) -> Self {
        Self {
            state: Rc::clone(state),
            _dsp_service: None,
            _guard: JournalGuard::new(state, Subsystem::ServiceManager),
        }
    }
}

impl ServiceManager for HeadlessServiceManager {
    fn init_services(&mut self, _kernel: &SharedKernel, dsp: &SharedDsp) {
        let service = Rc::new(DspService {
            state: Rc::clone(&self.state),
        });
        let sink: Rc<dyn DspInterruptSink> = service.clone();
        dsp.borrow_mut().set_service_to_interrupt(Rc::downgrade(&sink));
        self._dsp_service = Some(service);
    }
}

pub(crate) struct HeadlessArchiveManager {
    state: Rc<HeadlessState>,
    user_dir: Option<PathBuf>,
    _guard: JournalGuard,
}

impl HeadlessArchiveManager {
    pub(crate) fn new(state: &Rc<HeadlessState>, user_dir: Option<PathBuf>) -> Self {
        Self {
            state: Rc::clone(state),
            user_dir,
            _guard: JournalGuard::new(state, Subsystem::ArchiveManager),
        }
    }
}

/// Location of a title's `SystemData.bin` under the SD card root.
pub fn system_save_data_path(user_dir: &Path, program_id: u64) -> PathBuf {
    let high = (program_id >> 32) as u32;
    let low = program_id as u32;
    user_dir
        .join("sdmc")
        .join("title")
        .join(format!("{high:08x}"))
        .join(format!("{low:08x}"))
        .join("data")
        .join("SystemData.bin")
}

impl ArchiveManager for HeadlessArchiveManager {
    fn ensure_system_save_data(&mut self, program_id: u64) -> io::Result<()> {
        self.state.save_data.borrow_mut().push(program_id);
        let Some(user_dir) = self.user_dir.as_deref() else {
            return Ok(());
        };
        let path = system_save_data_path(user_dir, program_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().write(true).create(true).open(&path)?;
        debug!(path = %path.display(), "system save data ready");
        Ok(())
    }
}

pub(crate) struct HeadlessHardware {
    state: Rc<HeadlessState>,
    initialized: bool,
    _guard: JournalGuard,
}

impl HeadlessHardware {
    pub(crate) fn new(state: &Rc<HeadlessState>) -> Self {
        Self {
            state: Rc::clone(state),
            initialized: false,
            _guard: JournalGuard::new(state, Subsystem::Hardware),
        }
    }
}

impl HardwareBlock for HeadlessHardware {
    fn init(&mut self, _memory: &SharedMemory) {
        self.initialized = true;
    }

    fn update(&mut self) {
        if !self.initialized {
            warn!("hardware update before init");
            return;
        }
        let updates = self.state.hardware_updates.get();
        self.state.hardware_updates.set(updates + 1);
    }
}

pub(crate) struct HeadlessDebugStub {
    _guard: JournalGuard,
}

impl HeadlessDebugStub {
    pub(crate) fn new(state: &Rc<HeadlessState>) -> Self {
        Self {
            _guard: JournalGuard::new(state, Subsystem::DebugStub),
        }
    }
}

impl DebugStub for HeadlessDebugStub {
    fn init(&mut self) {
        debug!("debug stub disabled in headless mode");
    }
}

pub(crate) struct HeadlessRenderer {
    failure: Option<ResultStatus>,
    _guard: JournalGuard,
}

impl HeadlessRenderer {
    pub(crate) fn new(state: &Rc<HeadlessState>, failure: Option<ResultStatus>) -> Self {
        Self {
            failure,
            _guard: JournalGuard::new(state, Subsystem::Renderer),
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn init(&mut self, window: &dyn EmuWindow, _memory: &SharedMemory) -> ResultStatus {
        if let Some(failure) = self.failure {
            return failure;
        }
        window.make_current();
        window.done_current();
        ResultStatus::Success
    }
}

pub(crate) struct HeadlessCheatEngine {
    state: Rc<HeadlessState>,
    _guard: JournalGuard,
}

impl HeadlessCheatEngine {
    pub(crate) fn new(state: &Rc<HeadlessState>) -> Self {
        Self {
            state: Rc::clone(state),
            _guard: JournalGuard::new(state, Subsystem::CheatEngine),
        }
    }
}

impl CheatEngine for HeadlessCheatEngine {
    fn load_cheats(&mut self, program_id: u64) {
        self.state.cheats_loaded.borrow_mut().push(program_id);
    }
}

pub(crate) struct HeadlessTexCache {
    state: Rc<HeadlessState>,
    user_dir: Option<PathBuf>,
    _guard: JournalGuard,
}

impl HeadlessTexCache {
    pub(crate) fn new(state: &Rc<HeadlessState>, user_dir: Option<PathBuf>) -> Self {
        Self {
            state: Rc::clone(state),
            user_dir,
            _guard: JournalGuard::new(state, Subsystem::CustomTexCache),
        }
    }
}

impl CustomTexCache for HeadlessTexCache {
    fn find_custom_textures(&mut self, program_id: u64) {
        self.state.texture_scans.borrow_mut().push(program_id);
        if let Some(user_dir) = self.user_dir.as_deref() {
            let dir = user_dir
                .join("load")
                .join("textures")
                .join(format!("{program_id:016X}"));
            if let Err(err) = fs::create_dir_all(&dir) {
                warn!(dir = %dir.display(), %err, "cannot create custom texture directory");
            }
        }
    }

    fn preload_textures(&mut self) {
        self.state.textures_preloaded.set(true);
    }
}

pub(crate) struct HeadlessRoomMember {
    state: Rc<HeadlessState>,
}

impl HeadlessRoomMember {
    pub(crate) fn new(state: &Rc<HeadlessState>) -> Self {
        Self {
            state: Rc::clone(state),
        }
    }
}

impl RoomMember for HeadlessRoomMember {
    fn send_game_info(&self, info: GameInfo) {
        self.state.game_info.borrow_mut().push(info);
    }
}

/// Window stand-in that counts context switches.
#[derive(Debug, Default)]
pub struct HeadlessWindow {
    current: Cell<u32>,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a graphics context was made current on this window.
    pub fn make_current_calls(&self) -> u32 {
        self.current.get()
    }
}

impl EmuWindow for HeadlessWindow {
    fn make_current(&self) {
        self.current.set(self.current.get() + 1);
    }

    fn done_current(&self) {}
}
