//! Core library for amg: submit a seed MIDI file to a generation service and
//! play the result through a built-in synthesizer.

pub mod audio;
pub mod decor;
pub mod error;
pub mod generate;
pub mod input;
pub mod midi;
pub mod resource;
pub mod session;
pub mod studio;

pub use error::UserError;
pub use studio::Studio;
