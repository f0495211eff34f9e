use std::collections::VecDeque;
use std::rc::Weak;

use tracing::{debug, error, trace, warn};

use crate::interface::{DspInterface, DspInterruptSink, SinkConfig};
use crate::pipe::{DspPipe, DspState, InterruptType, StateChange};
use crate::DSP_RAM_SIZE;

/// DSP word addresses of the fifteen shared-memory structures, in the order the audio pipe
/// reports them after an initialize or wakeup request.
pub const STRUCT_ADDRESSES: [u16; 15] = [
    0x8000, // frame counter
    0x8001, // source configurations
    0x8c81, // source statuses
    0x8d01, // adpcm coefficients
    0x8d61, // dsp configuration
    0x8d8f, // dsp status
    0x8d9f, // final samples
    0x8f4f, // intermediate mix samples
    0x9f4f, // compressor
    0x9ff7, // dsp debug
    0xa0f7, // unknown
    0xa0f8, // unknown
    0xa0f9, // unknown
    0xa0fa, // unknown
    0xa0fb, // unknown
];

/// High-level DSP model.
///
/// Only the parts of the pipe protocol an application needs to bring the audio pipeline up and
/// down are modelled; no audio is produced.
pub struct DspHle {
    state: DspState,
    pipes: [VecDeque<u8>; 4],
    semaphore: u16,
    memory: Box<[u8]>,
    service: Option<Weak<dyn DspInterruptSink>>,
    component_loaded: bool,
    sink: SinkConfig,
    stretching: bool,
}

impl Default for DspHle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DspHle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DspHle")
            .field("state", &self.state)
            .field("semaphore", &self.semaphore)
            .field("component_loaded", &self.component_loaded)
            .field("sink", &self.sink)
            .field("stretching", &self.stretching)
            .finish_non_exhaustive()
    }
}

impl DspHle {
    pub fn new() -> Self {
        Self {
            state: DspState::Off,
            pipes: Default::default(),
            semaphore: 0,
            memory: vec![0; DSP_RAM_SIZE].into_boxed_slice(),
            service: None,
            component_loaded: false,
            sink: SinkConfig::default(),
            stretching: false,
        }
    }

    pub fn state(&self) -> DspState {
        self.state
    }

    pub fn semaphore(&self) -> u16 {
        self.semaphore
    }

    pub fn component_loaded(&self) -> bool {
        self.component_loaded
    }

    pub fn sink(&self) -> &SinkConfig {
        &self.sink
    }

    pub fn stretching_enabled(&self) -> bool {
        self.stretching
    }

    fn reset_pipes(&mut self) {
        for pipe in &mut self.pipes {
            pipe.clear();
        }
        self.state = DspState::Off;
    }

    fn write_struct_addresses(&mut self) {
        let audio = &mut self.pipes[DspPipe::Audio.index()];
        audio.extend((STRUCT_ADDRESSES.len() as u16).to_le_bytes());
        for address in STRUCT_ADDRESSES {
            audio.extend(address.to_le_bytes());
        }
        self.signal(InterruptType::Pipe, DspPipe::Audio);
    }

    fn signal(&self, kind: InterruptType, pipe: DspPipe) {
        match self.service.as_ref().and_then(Weak::upgrade) {
            Some(service) => service.signal_interrupt(kind, pipe),
            None => trace!(?kind, ?pipe, "no DSP service to interrupt"),
        }
    }

    fn change_state(&mut self, buffer: &[u8]) {
        let Ok(raw) = <[u8; 4]>::try_from(buffer) else {
            error!(len = buffer.len(), "audio pipe state change must be 4 bytes");
            return;
        };
        match StateChange::try_from(u32::from_le_bytes(raw)) {
            Ok(StateChange::Initialize) => {
                debug!("DSP initialize");
                self.reset_pipes();
                self.write_struct_addresses();
                self.state = DspState::On;
            }
            Ok(StateChange::Shutdown) => {
                debug!("DSP shutdown");
                self.state = DspState::Off;
            }
            Ok(StateChange::Wakeup) => {
                debug!("DSP wakeup");
                self.write_struct_addresses();
                self.state = DspState::On;
            }
            Ok(StateChange::Sleep) => {
                debug!("DSP sleep");
                self.state = DspState::Sleeping;
            }
            Err(err) => {
                error!(%err, "turning DSP off");
                self.state = DspState::Off;
            }
        }
    }
}

impl DspInterface for DspHle {
    fn recv_data(&mut self, register_number: u32) -> u16 {
        if register_number != 0 {
            warn!(register_number, "unexpected DSP data register");
        }
        // Applications poll this after a shutdown/sleep request to confirm the DSP went down.
        match self.state {
            DspState::On => 0,
            DspState::Off | DspState::Sleeping => 1,
        }
    }

    fn recv_data_is_ready(&self, register_number: u32) -> bool {
        if register_number != 0 {
            warn!(register_number, "unexpected DSP data register");
        }
        true
    }

    fn set_semaphore(&mut self, semaphore_value: u16) {
        self.semaphore = semaphore_value;
    }

    fn pipe_read(&mut self, pipe: DspPipe, length: usize) -> Vec<u8> {
        let data = &mut self.pipes[pipe.index()];
        if length > data.len() {
            error!(
                ?pipe,
                length,
                available = data.len(),
                "pipe read past the readable size"
            );
        }
        let take = length.min(data.len());
        data.drain(..take).collect()
    }

    fn pipe_readable_size(&self, pipe: DspPipe) -> usize {
        self.pipes[pipe.index()].len()
    }

    fn pipe_write(&mut self, pipe: DspPipe, buffer: &[u8]) {
        match pipe {
            DspPipe::Audio => self.change_state(buffer),
            DspPipe::Binary => {
                self.pipes[DspPipe::Binary.index()].extend(buffer.iter().copied());
                self.signal(InterruptType::Pipe, DspPipe::Binary);
            }
            DspPipe::Debug | DspPipe::Dma => {
                error!(?pipe, len = buffer.len(), "write to unimplemented DSP pipe dropped");
            }
        }
    }

    fn dsp_memory(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    fn set_service_to_interrupt(&mut self, service: Weak<dyn DspInterruptSink>) {
        self.service = Some(service);
    }

    fn load_component(&mut self, component: &[u8]) {
        // The HLE model does not run DSP code; the component is only acknowledged.
        debug!(len = component.len(), "DSP component loaded");
        self.component_loaded = true;
    }

    fn unload_component(&mut self) {
        self.component_loaded = false;
    }

    fn set_sink(&mut self, sink_id: &str, device_id: &str) {
        self.sink = SinkConfig {
            sink_id: sink_id.to_owned(),
            device_id: device_id.to_owned(),
        };
    }

    fn enable_stretching(&mut self, enable: bool) {
        self.stretching = enable;
    }
}
