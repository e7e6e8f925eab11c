//! File selection and declared-type validation.

use std::path::Path;

use anyhow::{Context, Result};

use crate::error::UserError;

/// MIME types accepted as MIDI input.
pub const ACCEPTED_MIME_TYPES: [&str; 2] = ["audio/midi", "audio/mid"];

/// File extensions offered by file dialogs.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["midi", "mid"];

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// A user-selected file waiting to be submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFile {
    pub name: String,
    /// Media type as reported at selection time, not sniffed from content.
    pub mime_type: String,
    pub contents: Vec<u8>,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            contents,
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read(path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, mime_for_path(path), contents))
    }

    pub fn is_midi(&self) -> bool {
        is_midi_type(&self.mime_type)
    }
}

/// Declared media type for a path, derived from its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        ACCEPTED_MIME_TYPES[0]
    } else {
        FALLBACK_MIME_TYPE
    }
}

pub fn is_midi_type(mime: &str) -> bool {
    ACCEPTED_MIME_TYPES.contains(&mime)
}

/// Holds at most one pending file.
#[derive(Debug, Default)]
pub struct FilePicker {
    pending: Option<PendingFile>,
}

impl FilePicker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `file` if its declared type is MIDI.
    ///
    /// A rejected selection also clears whatever was pending before.
    pub fn select(&mut self, file: PendingFile) -> Result<&PendingFile, UserError> {
        if !file.is_midi() {
            log::warn!(
                "Rejected '{}': declared type '{}' is not MIDI",
                file.name,
                file.mime_type
            );
            self.pending = None;
            return Err(UserError::InvalidFileType);
        }
        log::debug!("Selected '{}' ({} bytes)", file.name, file.contents.len());
        Ok(&*self.pending.insert(file))
    }

    pub fn pending(&self) -> Option<&PendingFile> {
        self.pending.as_ref()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn midi_file(name: &str) -> PendingFile {
        PendingFile::new(name, "audio/midi", vec![0x4d, 0x54, 0x68, 0x64])
    }

    #[test]
    fn test_accepts_both_midi_types() {
        let mut picker = FilePicker::new();
        assert!(picker.select(midi_file("a.mid")).is_ok());
        let alt = PendingFile::new("b.mid", "audio/mid", vec![]);
        assert_eq!(picker.select(alt).unwrap().name, "b.mid");
    }

    #[test]
    fn test_invalid_type_clears_pending() {
        let mut picker = FilePicker::new();
        picker.select(midi_file("a.mid")).unwrap();

        let wav = PendingFile::new("song.wav", "audio/wav", vec![1, 2, 3]);
        assert_eq!(picker.select(wav), Err(UserError::InvalidFileType));
        assert!(picker.pending().is_none());
    }

    #[test]
    fn test_content_is_not_validated() {
        let mut picker = FilePicker::new();
        let garbage = PendingFile::new("x.mid", "audio/midi", b"not midi at all".to_vec());
        assert!(picker.select(garbage).is_ok());
    }

    #[test]
    fn test_mime_for_path() {
        assert_eq!(mime_for_path(Path::new("song.mid")), "audio/midi");
        assert_eq!(mime_for_path(Path::new("SONG.MIDI")), "audio/midi");
        assert_eq!(mime_for_path(Path::new("song.mp3")), "application/octet-stream");
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.midi");
        std::fs::write(&path, b"MThd").unwrap();

        let file = PendingFile::from_path(&path).unwrap();
        assert_eq!(file.name, "seed.midi");
        assert_eq!(file.mime_type, "audio/midi");
        assert_eq!(file.contents, b"MThd");
    }

    #[test]
    fn test_from_path_missing() {
        assert!(PendingFile::from_path(Path::new("/nonexistent/seed.mid")).is_err());
    }
}
