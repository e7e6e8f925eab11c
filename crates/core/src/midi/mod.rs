//! MIDI decoding.

pub mod parser;
pub mod pitch;

pub use parser::{parse_midi, parse_midi_file, MidiDocument, Note, TimeSignature, Track};
