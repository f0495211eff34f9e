use std::cell::RefCell;
use std::rc::{Rc, Weak};

use citrine_audio::{
    DspHle, DspInterface, DspInterruptSink, DspPipe, DspState, InterruptType, DSP_RAM_SIZE,
    STRUCT_ADDRESSES,
};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct RecordingService {
    interrupts: RefCell<Vec<(InterruptType, DspPipe)>>,
}

impl DspInterruptSink for RecordingService {
    fn signal_interrupt(&self, kind: InterruptType, pipe: DspPipe) {
        self.interrupts.borrow_mut().push((kind, pipe));
    }
}

fn with_service() -> (DspHle, Rc<RecordingService>) {
    let service = Rc::new(RecordingService::default());
    let mut dsp = DspHle::new();
    let weak: Weak<RecordingService> = Rc::downgrade(&service);
    dsp.set_service_to_interrupt(weak);
    (dsp, service)
}

fn read_u16s(dsp: &mut DspHle, pipe: DspPipe) -> Vec<u16> {
    let len = dsp.pipe_readable_size(pipe);
    dsp.pipe_read(pipe, len)
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[test]
fn initialize_publishes_structure_addresses_and_interrupts() {
    let (mut dsp, service) = with_service();
    assert_eq!(dsp.recv_data(0), 1);

    dsp.pipe_write(DspPipe::Audio, &0u32.to_le_bytes());
    assert_eq!(dsp.state(), DspState::On);
    assert_eq!(dsp.recv_data(0), 0);
    assert_eq!(dsp.pipe_readable_size(DspPipe::Audio), 2 * (1 + STRUCT_ADDRESSES.len()));

    let words = read_u16s(&mut dsp, DspPipe::Audio);
    assert_eq!(words[0], 15);
    assert_eq!(&words[1..], &STRUCT_ADDRESSES[..]);
    assert_eq!(
        *service.interrupts.borrow(),
        vec![(InterruptType::Pipe, DspPipe::Audio)]
    );
}

#[test]
fn shutdown_and_sleep_are_visible_through_register_zero() {
    let (mut dsp, _service) = with_service();
    dsp.pipe_write(DspPipe::Audio, &0u32.to_le_bytes());
    dsp.pipe_write(DspPipe::Audio, &3u32.to_le_bytes());
    assert_eq!(dsp.state(), DspState::Sleeping);
    assert_eq!(dsp.recv_data(0), 1);

    dsp.pipe_write(DspPipe::Audio, &2u32.to_le_bytes());
    assert_eq!(dsp.state(), DspState::On);

    dsp.pipe_write(DspPipe::Audio, &1u32.to_le_bytes());
    assert_eq!(dsp.state(), DspState::Off);
    assert!(dsp.recv_data_is_ready(0));
}

#[test]
fn malformed_state_change_is_ignored_and_unknown_request_turns_dsp_off() {
    let (mut dsp, service) = with_service();
    dsp.pipe_write(DspPipe::Audio, &0u32.to_le_bytes());

    dsp.pipe_write(DspPipe::Audio, &[0, 0]);
    assert_eq!(dsp.state(), DspState::On);

    dsp.pipe_write(DspPipe::Audio, &9u32.to_le_bytes());
    assert_eq!(dsp.state(), DspState::Off);
    assert_eq!(service.interrupts.borrow().len(), 1);
}

#[test]
fn dropped_service_is_not_signalled() {
    let (mut dsp, service) = with_service();
    drop(service);
    dsp.pipe_write(DspPipe::Audio, &0u32.to_le_bytes());
    assert_eq!(dsp.state(), DspState::On);
}

#[test]
fn binary_pipe_queues_bytes_and_short_reads_return_what_is_there() {
    let (mut dsp, service) = with_service();
    dsp.pipe_write(DspPipe::Binary, &[1, 2, 3]);
    dsp.pipe_write(DspPipe::Binary, &[4]);
    assert_eq!(dsp.pipe_readable_size(DspPipe::Binary), 4);

    assert_eq!(dsp.pipe_read(DspPipe::Binary, 2), vec![1, 2]);
    assert_eq!(dsp.pipe_read(DspPipe::Binary, 10), vec![3, 4]);
    assert_eq!(dsp.pipe_readable_size(DspPipe::Binary), 0);
    assert_eq!(service.interrupts.borrow().len(), 2);

    dsp.pipe_write(DspPipe::Debug, &[9]);
    assert_eq!(dsp.pipe_readable_size(DspPipe::Debug), 0);
}

#[test]
fn memory_components_and_routing() {
    let mut dsp = DspHle::new();
    assert_eq!(dsp.dsp_memory().len(), DSP_RAM_SIZE);
    dsp.dsp_memory()[0x100] = 0xaa;
    assert_eq!(dsp.dsp_memory()[0x100], 0xaa);

    dsp.load_component(&[0u8; 64]);
    assert!(dsp.component_loaded());
    dsp.unload_component();
    assert!(!dsp.component_loaded());

    dsp.set_semaphore(0x1234);
    assert_eq!(dsp.semaphore(), 0x1234);

    dsp.set_sink("null", "default");
    dsp.enable_stretching(true);
    assert_eq!(dsp.sink().sink_id, "null");
    assert_eq!(dsp.sink().device_id, "default");
    assert!(dsp.stretching_enabled());
}
