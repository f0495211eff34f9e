use std::rc::Weak;

use crate::pipe::{DspPipe, InterruptType};

/// Receiver of DSP interrupts, normally the DSP service of the emulated OS.
///
/// The DSP only keeps a [`Weak`] reference to it: the service is owned by the service manager
/// and may be torn down first.
pub trait DspInterruptSink {
    fn signal_interrupt(&self, kind: InterruptType, pipe: DspPipe);
}

/// Which audio core a session builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCoreKind {
    Hle,
    Lle { multithread: bool },
}

impl AudioCoreKind {
    pub fn from_settings(enable_dsp_lle: bool, enable_dsp_lle_multithread: bool) -> Self {
        if enable_dsp_lle {
            AudioCoreKind::Lle {
                multithread: enable_dsp_lle_multithread,
            }
        } else {
            AudioCoreKind::Hle
        }
    }
}

/// Host output routing of the audio core.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SinkConfig {
    pub sink_id: String,
    pub device_id: String,
}

pub trait DspInterface {
    /// Reads a DSP data register.
    fn recv_data(&mut self, register_number: u32) -> u16;

    fn recv_data_is_ready(&self, register_number: u32) -> bool;

    fn set_semaphore(&mut self, semaphore_value: u16);

    /// Reads up to `length` bytes from `pipe`. Fewer bytes are returned when the pipe holds less.
    fn pipe_read(&mut self, pipe: DspPipe, length: usize) -> Vec<u8>;

    fn pipe_readable_size(&self, pipe: DspPipe) -> usize;

    fn pipe_write(&mut self, pipe: DspPipe, buffer: &[u8]);

    fn dsp_memory(&mut self) -> &mut [u8];

    fn set_service_to_interrupt(&mut self, service: Weak<dyn DspInterruptSink>);

    fn load_component(&mut self, component: &[u8]);

    fn unload_component(&mut self);

    fn set_sink(&mut self, sink_id: &str, device_id: &str);

    fn enable_stretching(&mut self, enable: bool);
}
