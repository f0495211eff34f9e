use std::path::{Path, PathBuf};
use std::rc::Rc;

use citrine_audio::AudioCoreKind;
use citrine_timing::Timing;
use tracing::{debug, error, info, trace, warn};

use crate::collab::{
    ArchiveManager, Backend, CheatEngine, CpuCore, CpuEngine, CustomTexCache, DebugStub,
    EmuWindow, GameInfo, HardwareBlock, ImageInterface, KernelConfig, Loader, MiiSelector,
    Renderer, RpcServer, ServiceManager, SharedDsp, SharedKernel, SharedMemory,
    SoftwareKeyboard, TelemetrySession,
};
use crate::config::{SchedulerConfig, SchedulerConfigError};
use crate::perf_stats::{PerfResults, PerfStats};
use crate::requests::SessionRequests;
use crate::reschedule::RescheduleHandle;
use crate::scheduler::{CoreScheduler, RoundKind};
use crate::settings::Settings;
use crate::status::ResultStatus;
use crate::telemetry::{
    FieldType, MEAN_FRAMETIME_MS, MEAN_FRAMETIME_MS_VALUE, SHUTDOWN_EMULATION_SPEED,
    SHUTDOWN_FRAMERATE, SHUTDOWN_FRAMETIME,
};
use crate::title_overrides::{apply_title_overrides, TitleOverride};

/// Where a [`System`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    /// Subsystems are built but no program is loaded yet.
    Initialized,
    Running,
    /// A shutdown request was returned from [`System::run_loop`]; the caller should shut down.
    ShutdownRequested,
    Shutdown,
}

/// One emulation session.
///
/// Owns every subsystem of the emulated machine, builds them in dependency order on
/// [`System::load`] and releases them in the reverse order on [`System::shutdown`]. Each subsystem
/// slot is independently optional so a partially built session can always be torn down.
pub struct System {
    backend: Box<dyn Backend>,
    /// Settings as supplied by the user; each session starts from a copy.
    base_settings: Settings,
    settings: Settings,
    scheduler: CoreScheduler,
    requests: SessionRequests,
    reschedule: RescheduleHandle,
    status: ResultStatus,
    state: SessionState,
    last_round: Option<RoundKind>,

    memory: Option<SharedMemory>,
    timing: Option<Rc<Timing>>,
    kernel: Option<SharedKernel>,
    cpu_cores: Vec<Rc<dyn CpuCore>>,
    dsp: Option<SharedDsp>,
    telemetry: Option<Box<dyn TelemetrySession>>,
    rpc_server: Option<Box<dyn RpcServer>>,
    service_manager: Option<Box<dyn ServiceManager>>,
    archive_manager: Option<Box<dyn ArchiveManager>>,
    hardware: Option<Box<dyn HardwareBlock>>,
    debug_stub: Option<Box<dyn DebugStub>>,
    renderer: Option<Box<dyn Renderer>>,
    cheat_engine: Option<Box<dyn CheatEngine>>,
    perf_stats: Option<PerfStats>,
    app_loader: Option<Box<dyn Loader>>,
    custom_tex_cache: Option<Box<dyn CustomTexCache>>,

    window: Option<Rc<dyn EmuWindow>>,
    filepath: Option<PathBuf>,
    program_id: Option<u64>,
    title_override: Option<&'static TitleOverride>,

    // Registered by the frontend; kept across sessions.
    mii_selector: Option<Rc<dyn MiiSelector>>,
    software_keyboard: Option<Rc<dyn SoftwareKeyboard>>,
    image_interface: Option<Rc<dyn ImageInterface>>,
}

impl System {
    pub fn new(backend: Box<dyn Backend>, settings: Settings) -> Self {
        Self {
            backend,
            base_settings: settings.clone(),
            settings,
            scheduler: CoreScheduler::default(),
            requests: SessionRequests::new(),
            reschedule: RescheduleHandle::new(),
            status: ResultStatus::ErrorNotInitialized,
            state: SessionState::Uninitialized,
            last_round: None,
            memory: None,
            timing: None,
            kernel: None,
            cpu_cores: Vec::new(),
            dsp: None,
            telemetry: None,
            rpc_server: None,
            service_manager: None,
            archive_manager: None,
            hardware: None,
            debug_stub: None,
            renderer: None,
            cheat_engine: None,
            perf_stats: None,
            app_loader: None,
            custom_tex_cache: None,
            window: None,
            filepath: None,
            program_id: None,
            title_override: None,
            mii_selector: None,
            software_keyboard: None,
            image_interface: None,
        }
    }

    pub fn with_scheduler_config(
        mut self,
        config: SchedulerConfig,
    ) -> Result<Self, SchedulerConfigError> {
        config.validate()?;
        self.scheduler = CoreScheduler::new(config);
        Ok(self)
    }

    /// Runs one scheduling round.
    ///
    /// Returns the session status, or [`ResultStatus::ShutdownRequested`] when a shutdown was
    /// requested during the round. A session that is not running is left untouched.
    pub fn run_loop(&mut self, _tight_loop: bool) -> ResultStatus {
        if !self.status.is_success() {
            return self.status;
        }
        let (Some(timing), Some(kernel)) = (self.timing.clone(), self.kernel.clone()) else {
            return ResultStatus::ErrorNotInitialized;
        };

        let round = self
            .scheduler
            .run_round(&timing, &kernel, &self.cpu_cores, &self.reschedule);
        self.last_round = Some(round);

        if let Some(hardware) = self.hardware.as_mut() {
            hardware.update();
        }
        self.scheduler
            .apply_reschedule(&kernel, &self.cpu_cores, &self.reschedule);

        if self.requests.take_reset() {
            return self.reset();
        }
        if self.requests.take_shutdown() {
            self.state = SessionState::ShutdownRequested;
            return ResultStatus::ShutdownRequested;
        }
        self.status
    }

    pub fn single_step(&mut self) -> ResultStatus {
        self.run_loop(false)
    }

    /// Loads the program at `path` and builds the session around it.
    ///
    /// On any failure the session has already been shut down when this returns.
    pub fn load(&mut self, window: Rc<dyn EmuWindow>, path: impl AsRef<Path>) -> ResultStatus {
        let path = path.as_ref();
        if self.has_live_state() {
            self.shutdown();
        }
        let Some(loader) = self.backend.get_loader(path) else {
            error!(path = %path.display(), "failed to obtain loader");
            return self.fail(ResultStatus::ErrorGetLoader);
        };
        let loader = self.app_loader.insert(loader);

        let system_mode = match loader.load_kernel_system_mode() {
            Ok(mode) => mode.unwrap_or_else(|| panic!("loader reported no system mode")),
            Err(err) => {
                error!(%err, "failed to determine system mode");
                return self.fail(ResultStatus::from_system_mode_error(&err));
            }
        };
        let n3ds_mode = match loader.load_kernel_n3ds_mode() {
            Ok(mode) => mode.unwrap_or_else(|| panic!("loader reported no new-hardware mode")),
            Err(err) => {
                error!(%err, "failed to determine new-hardware mode");
                return self.fail(ResultStatus::from_system_mode_error(&err));
            }
        };

        let init_result = self.init(&*window, system_mode, n3ds_mode);
        if !init_result.is_success() {
            error!(status = %init_result, "failed to initialize system");
            return self.fail(init_result);
        }

        let Some(kernel) = self.kernel.clone() else {
            return self.fail(ResultStatus::ErrorNotInitialized);
        };
        let Some(loader) = self.app_loader.as_mut() else {
            return self.fail(ResultStatus::ErrorNotInitialized);
        };
        if let Some(telemetry) = self.telemetry.as_mut() {
            telemetry.add_initial_info(&**loader);
        }
        match loader.load() {
            Ok(process) => kernel.borrow_mut().set_current_process(process),
            Err(err) => {
                error!(%err, "failed to load program");
                return self.fail(ResultStatus::from_load_error(&err));
            }
        }

        let program_id = match loader.read_program_id() {
            Ok(program_id) => Some(program_id),
            Err(err) => {
                error!(%err, "failed to find the program id");
                None
            }
        };
        let mut cheat_engine = self.backend.create_cheat_engine();
        if let Some(program_id) = program_id {
            cheat_engine.load_cheats(program_id);
        }
        self.cheat_engine = Some(cheat_engine);
        self.program_id = program_id;
        self.perf_stats = Some(PerfStats::new());

        let mut custom_tex_cache = self.backend.create_custom_tex_cache();
        if self.settings.custom_textures {
            custom_tex_cache.find_custom_textures(program_id.unwrap_or(0));
        }
        if self.settings.preload_textures {
            custom_tex_cache.preload_textures();
        }
        self.custom_tex_cache = Some(custom_tex_cache);

        self.title_override =
            program_id.and_then(|id| apply_title_overrides(&mut self.settings, id));
        if let (Some(program_id), Some(entry)) = (program_id, self.title_override) {
            if entry.ensure_system_save_data {
                if let Some(archive_manager) = self.archive_manager.as_mut() {
                    if let Err(err) = archive_manager.ensure_system_save_data(program_id) {
                        warn!(%err, "failed to create system save data");
                    }
                }
            }
        }

        self.status = ResultStatus::Success;
        self.state = SessionState::Running;
        self.window = Some(window);
        self.filepath = Some(path.to_path_buf());

        // Start measuring from the first frame.
        let system_us = self
            .timing
            .as_ref()
            .map_or(0, |timing| timing.global_time_us());
        if let Some(perf_stats) = self.perf_stats.as_mut() {
            perf_stats.reset(system_us);
            perf_stats.begin_system_frame();
        }
        info!(path = %path.display(), "loaded program");
        self.status
    }

    fn init(&mut self, window: &dyn EmuWindow, system_mode: u32, n3ds_mode: u8) -> ResultStatus {
        let num_cores = self.settings.num_cores();

        let memory = self.backend.create_memory();
        self.memory = Some(Rc::clone(&memory));

        let timing = Rc::new(Timing::new(num_cores));
        self.timing = Some(Rc::clone(&timing));

        let kernel = self.backend.create_kernel(KernelConfig {
            memory: Rc::clone(&memory),
            timing: Rc::clone(&timing),
            reschedule: self.reschedule.clone(),
            system_mode,
            num_cores,
            n3ds_mode,
        });
        self.kernel = Some(Rc::clone(&kernel));

        let engine = if !self.settings.use_cpu_jit {
            CpuEngine::Interpreter
        } else if self.backend.supports_jit() {
            CpuEngine::Jit
        } else {
            warn!("CPU JIT requested, but no JIT is available on this host");
            CpuEngine::Interpreter
        };
        self.cpu_cores = timing
            .timers()
            .iter()
            .enumerate()
            .map(|(id, timer)| {
                self.backend
                    .create_cpu_core(engine, id, &memory, Rc::clone(timer))
            })
            .collect();
        if let Some(first) = self.cpu_cores.first() {
            self.reschedule.set_running_core(Rc::clone(first));
        }
        {
            let mut kernel = kernel.borrow_mut();
            kernel.set_cpus(self.cpu_cores.clone());
            kernel.set_running_core(0);
        }

        let audio_kind = AudioCoreKind::from_settings(
            self.settings.enable_dsp_lle,
            self.settings.enable_dsp_lle_multithread,
        );
        let dsp = self.backend.create_dsp(audio_kind, &memory);
        memory.borrow_mut().set_dsp(Rc::downgrade(&dsp));
        {
            let mut dsp = dsp.borrow_mut();
            dsp.set_sink(&self.settings.sink_id, &self.settings.audio_device_id);
            dsp.enable_stretching(self.settings.enable_audio_stretching);
        }
        self.dsp = Some(Rc::clone(&dsp));

        self.telemetry = Some(self.backend.create_telemetry());
        self.rpc_server = Some(self.backend.create_rpc_server());
        let service_manager = self.service_manager.insert(self.backend.create_service_manager());
        self.archive_manager = Some(self.backend.create_archive_manager());

        self.hardware
            .insert(self.backend.create_hardware())
            .init(&memory);
        service_manager.init_services(&kernel, &dsp);
        self.debug_stub.insert(self.backend.create_debug_stub()).init();

        let result = self
            .renderer
            .insert(self.backend.create_renderer())
            .init(window, &memory);
        if !result.is_success() {
            return result;
        }

        debug!(num_cores, ?engine, ?audio_kind, "initialized OK");
        self.state = SessionState::Initialized;
        ResultStatus::Success
    }

    /// Tears the session down in reverse construction order.
    ///
    /// Safe on a partially built session and idempotent: a second call finds nothing to release
    /// and has no side effects.
    pub fn shutdown(&mut self) {
        let was_live = self.has_live_state();

        if let Some(results) = self.get_and_reset_perf_stats() {
            if let Some(telemetry) = self.telemetry.as_mut() {
                record_shutdown_stats(telemetry.as_mut(), &results);
            }
        }

        self.debug_stub = None;
        self.renderer = None;
        self.hardware = None;
        self.telemetry = None;
        self.perf_stats = None;
        self.rpc_server = None;
        self.cheat_engine = None;
        self.archive_manager = None;
        self.service_manager = None;
        self.dsp = None;
        // The kernel and the reschedule handle share the cores; detach them so the cores go now.
        if let Some(kernel) = self.kernel.as_ref() {
            kernel.borrow_mut().set_cpus(Vec::new());
        }
        self.reschedule.clear();
        self.cpu_cores.clear();
        self.kernel = None;
        self.timing = None;
        self.memory = None;
        self.app_loader = None;
        self.custom_tex_cache = None;

        // Title overrides only last for the session that applied them.
        self.settings = self.base_settings.clone();
        self.title_override = None;

        self.status = ResultStatus::ErrorNotInitialized;
        self.state = SessionState::Shutdown;
        self.last_round = None;

        if was_live {
            if let Some(room_member) = self.backend.room_member().and_then(|weak| weak.upgrade()) {
                room_member.send_game_info(GameInfo::default());
            }
            debug!("shutdown OK");
        }
    }

    /// Shuts down and loads the same program again with the same window.
    ///
    /// This rebuilds the whole session rather than resetting it in place.
    pub fn reset(&mut self) -> ResultStatus {
        let (window, filepath) = (self.window.clone(), self.filepath.clone());
        self.shutdown();
        match (window, filepath) {
            (Some(window), Some(filepath)) => {
                info!(path = %filepath.display(), "resetting");
                self.load(window, filepath)
            }
            _ => self.status,
        }
    }

    /// Requests a reschedule of the running core.
    pub fn prepare_reschedule(&self) {
        self.reschedule.prepare_reschedule();
    }

    /// Statistics since the previous call, or `None` when no program is loaded.
    pub fn get_and_reset_perf_stats(&mut self) -> Option<PerfResults> {
        let system_us = self.timing.as_ref()?.global_time_us();
        Some(self.perf_stats.as_mut()?.get_and_reset_stats(system_us))
    }

    fn fail(&mut self, status: ResultStatus) -> ResultStatus {
        self.shutdown();
        self.status = status;
        status
    }

    fn has_live_state(&self) -> bool {
        self.memory.is_some()
            || self.timing.is_some()
            || self.kernel.is_some()
            || !self.cpu_cores.is_empty()
            || self.dsp.is_some()
            || self.telemetry.is_some()
            || self.rpc_server.is_some()
            || self.service_manager.is_some()
            || self.archive_manager.is_some()
            || self.hardware.is_some()
            || self.debug_stub.is_some()
            || self.renderer.is_some()
            || self.cheat_engine.is_some()
            || self.perf_stats.is_some()
            || self.custom_tex_cache.is_some()
    }

    pub fn status(&self) -> ResultStatus {
        self.status
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_powered_on(&self) -> bool {
        self.status.is_success()
    }

    /// Settings of the current session, title overrides included.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn base_settings(&self) -> &Settings {
        &self.base_settings
    }

    pub fn scheduler_config(&self) -> &SchedulerConfig {
        self.scheduler.config()
    }

    /// Handle for requesting a reset or shutdown from another thread.
    pub fn requests(&self) -> SessionRequests {
        self.requests.clone()
    }

    pub fn reschedule_handle(&self) -> RescheduleHandle {
        self.reschedule.clone()
    }

    pub fn last_round(&self) -> Option<RoundKind> {
        self.last_round
    }

    pub fn timing(&self) -> Option<&Rc<Timing>> {
        self.timing.as_ref()
    }

    pub fn kernel(&self) -> Option<&SharedKernel> {
        self.kernel.as_ref()
    }

    pub fn memory(&self) -> Option<&SharedMemory> {
        self.memory.as_ref()
    }

    pub fn dsp(&self) -> Option<&SharedDsp> {
        self.dsp.as_ref()
    }

    pub fn cpu_cores(&self) -> &[Rc<dyn CpuCore>] {
        &self.cpu_cores
    }

    pub fn running_core(&self) -> Option<Rc<dyn CpuCore>> {
        self.reschedule.running_core()
    }

    pub fn perf_stats_mut(&mut self) -> Option<&mut PerfStats> {
        self.perf_stats.as_mut()
    }

    pub fn program_id(&self) -> Option<u64> {
        self.program_id
    }

    pub fn title_override(&self) -> Option<&'static TitleOverride> {
        self.title_override
    }

    pub fn filepath(&self) -> Option<&Path> {
        self.filepath.as_deref()
    }

    pub fn register_mii_selector(&mut self, mii_selector: Rc<dyn MiiSelector>) {
        self.mii_selector = Some(mii_selector);
    }

    pub fn register_software_keyboard(&mut self, keyboard: Rc<dyn SoftwareKeyboard>) {
        self.software_keyboard = Some(keyboard);
    }

    pub fn register_image_interface(&mut self, image_interface: Rc<dyn ImageInterface>) {
        self.image_interface = Some(image_interface);
    }

    pub fn mii_selector(&self) -> Option<Rc<dyn MiiSelector>> {
        self.mii_selector.clone()
    }

    pub fn software_keyboard(&self) -> Option<Rc<dyn SoftwareKeyboard>> {
        self.software_keyboard.clone()
    }

    pub fn image_interface(&self) -> Option<Rc<dyn ImageInterface>> {
        self.image_interface.clone()
    }
}

impl Drop for System {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn record_shutdown_stats(telemetry: &mut dyn TelemetrySession, results: &PerfResults) {
    trace!(?results, "final performance statistics");
    telemetry.add_field(
        FieldType::Performance,
        SHUTDOWN_EMULATION_SPEED,
        (results.emulation_speed * 100.0).into(),
    );
    telemetry.add_field(
        FieldType::Performance,
        SHUTDOWN_FRAMERATE,
        results.game_fps.into(),
    );
    telemetry.add_field(
        FieldType::Performance,
        SHUTDOWN_FRAMETIME,
        (results.frametime * 1000.0).into(),
    );
    telemetry.add_field(
        FieldType::Performance,
        MEAN_FRAMETIME_MS,
        MEAN_FRAMETIME_MS_VALUE.into(),
    );
}
