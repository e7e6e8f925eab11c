//! Software synthesis, scheduling, and device output.

pub mod engine;
pub mod output;
pub mod synth;
pub mod transport;

pub use engine::{Engine, SharedEngine, DEFAULT_SAMPLE_RATE};
pub use synth::{Envelope, PolySynth, SynthConfig, Waveform};
pub use transport::{ScheduleId, ScheduledNote, Transport, TransportState};
