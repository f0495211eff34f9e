//! Audio coprocessor (DSP) facade.
//!
//! The system core only ever talks to the DSP through [`DspInterface`]: register reads, the pipe
//! byte queues, the shared DSP RAM and component (firmware) loading. Which implementation backs
//! the facade is chosen once per session through [`AudioCoreKind`]. [`DspHle`] is the high-level
//! model; it answers the pipe protocol directly without running any DSP code.
#![forbid(unsafe_code)]

mod hle;
mod interface;
mod pipe;

pub use hle::{DspHle, STRUCT_ADDRESSES};
pub use interface::{AudioCoreKind, DspInterface, DspInterruptSink, SinkConfig};
pub use pipe::{DspError, DspPipe, DspState, InterruptType};

/// Size of the DSP's shared RAM region, in bytes.
pub const DSP_RAM_SIZE: usize = 0x80000;
