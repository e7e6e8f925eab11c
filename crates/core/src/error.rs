//! User-visible error taxonomy.
//!
//! Every variant is recoverable: the interface shows the `Display` text and
//! the user may retry by re-selecting a file or resubmitting.

use thiserror::Error;

/// Message shown when the generation service rejects a request without a
/// usable error payload.
pub const FALLBACK_GENERATION_MESSAGE: &str = "Failed to generate music";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error("Please select a valid MIDI file")]
    InvalidFileType,

    /// The service answered with a non-success status.
    #[error("{0}")]
    Rejected(String),

    /// The request never produced a response.
    #[error("{0}")]
    Network(String),

    #[error("Failed to read the generated music")]
    MalformedResponse,

    /// Fetching, decoding, or scheduling the generated file failed.
    #[error("Error playing MIDI file")]
    Playback,
}
