//! Session core of the emulator: the round scheduler that keeps the application cores in step,
//! the reschedule coordinator and the lifecycle of every subsystem a session owns.
//!
//! A [`System`] is one session. It is driven from a single thread: the caller invokes
//! [`System::run_loop`] once per slice and inspects the returned [`ResultStatus`]. Other threads
//! may only ask for a reset or shutdown through a [`SessionRequests`] handle.
//!
//! The subsystems themselves (CPU engines, kernel, renderer, ...) are supplied by a
//! [`collab::Backend`]. [`headless`] provides one that needs no guest code and no host devices.
#![forbid(unsafe_code)]

pub mod collab;
pub mod config;
pub mod headless;
pub mod perf_stats;
pub mod requests;
pub mod reschedule;
pub mod scheduler;
pub mod settings;
pub mod status;
pub mod system;
pub mod telemetry;
pub mod title_overrides;

pub use collab::{Backend, CoreId, CpuCore, CpuEngine, LoaderError};
pub use config::{SchedulerConfig, SchedulerConfigError, CATCH_UP_THRESHOLD};
pub use perf_stats::{PerfResults, PerfStats};
pub use requests::SessionRequests;
pub use reschedule::RescheduleHandle;
pub use scheduler::{CoreScheduler, RoundKind};
pub use settings::{Settings, SettingsError};
pub use status::ResultStatus;
pub use system::{SessionState, System};
pub use title_overrides::{apply_title_overrides, TitleOverride, TITLE_OVERRIDES};
