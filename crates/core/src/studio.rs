//! Interface state shared by the front ends.
//!
//! A [`Studio`] is the single owner of everything one interface instance
//! needs: the file picker, the generated resource, the playback session, and
//! the message shown to the user.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::decor::{generate_glyphs, NoteGlyph, PointerTracker};
use crate::error::UserError;
use crate::generate::GenerationService;
use crate::input::{FilePicker, PendingFile};
use crate::resource::{ResourceHandle, ResourceStore};
use crate::session::{PlaybackSession, PlaybackState, PlaybackSummary, SessionConfig};

pub struct Studio {
    picker: FilePicker,
    loading: bool,
    resources: ResourceStore,
    generated: Option<ResourceHandle>,
    error: Option<String>,
    session: PlaybackSession,
    glyphs: Vec<NoteGlyph>,
    pub pointer: PointerTracker,
}

impl Studio {
    pub fn new(session: SessionConfig) -> Self {
        Self::with_session(PlaybackSession::new(session))
    }

    pub fn with_session(session: PlaybackSession) -> Self {
        Self {
            picker: FilePicker::new(),
            loading: false,
            resources: ResourceStore::new(),
            generated: None,
            error: None,
            session,
            glyphs: generate_glyphs(&mut rand::thread_rng()),
            pointer: PointerTracker::default(),
        }
    }

    // --- File picker ---

    /// Offer a file as the next submission input.
    pub fn select_file(&mut self, file: PendingFile) -> Result<(), UserError> {
        match self.picker.select(file) {
            Ok(_) => {
                self.error = None;
                Ok(())
            }
            Err(e) => {
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Load `path` from disk and select it.
    pub fn select_path(&mut self, path: &Path) -> Result<(), UserError> {
        match PendingFile::from_path(path) {
            Ok(file) => self.select_file(file),
            Err(e) => {
                log::error!("{:#}", e);
                self.picker.clear();
                self.error = Some(UserError::InvalidFileType.to_string());
                Err(UserError::InvalidFileType)
            }
        }
    }

    pub fn pending(&self) -> Option<&PendingFile> {
        self.picker.pending()
    }

    // --- Submission ---

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the submit control is enabled.
    pub fn can_submit(&self) -> bool {
        self.picker.pending().is_some() && !self.loading
    }

    /// Enter the loading state and hand out the file to submit.
    ///
    /// Returns `None`, changing nothing, when submission is not possible.
    pub fn begin_submission(&mut self) -> Option<PendingFile> {
        if !self.can_submit() {
            return None;
        }
        self.loading = true;
        self.error = None;
        self.picker.pending().cloned()
    }

    /// Apply the outcome of a submission started with [`begin_submission`](Self::begin_submission).
    pub fn complete_submission(&mut self, outcome: Result<Vec<u8>, UserError>) {
        self.loading = false;
        match outcome {
            Ok(bytes) => {
                let handle = self.resources.create(bytes);
                if let Some(previous) = self.generated.replace(handle) {
                    self.resources.revoke(&previous);
                }
                self.session.stop();
                log::info!("Generated music available at {}", handle);
            }
            Err(e) => {
                log::error!("Error generating music: {}", e);
                self.error = Some(e.to_string());
            }
        }
    }

    /// Submit the pending file through `service`, blocking until it answers.
    ///
    /// Returns false without doing anything if there is nothing to submit.
    pub fn submit(&mut self, service: &dyn GenerationService) -> bool {
        let Some(file) = self.begin_submission() else {
            return false;
        };
        let outcome = service.generate(&file);
        self.complete_submission(outcome);
        true
    }

    pub fn generated(&self) -> Option<&ResourceHandle> {
        self.generated.as_ref()
    }

    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// Save the generated file into `dir` under its download name.
    pub fn download_to(&self, dir: &Path) -> Result<Option<PathBuf>> {
        match &self.generated {
            Some(handle) => Ok(Some(self.resources.save_to_dir(handle, dir)?)),
            None => Ok(None),
        }
    }

    /// Save the generated file to an explicit path.
    pub fn download_as(&self, target: &Path) -> Result<bool> {
        match &self.generated {
            Some(handle) => {
                self.resources.save_as(handle, target)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // --- Playback ---

    /// Play the generated file. Does nothing without one.
    pub fn play(&mut self) -> Option<PlaybackSummary> {
        let handle = self.generated?;
        match self.session.play(&self.resources, &handle) {
            Ok(summary) => Some(summary),
            Err(e) => {
                self.error = Some(e.to_string());
                None
            }
        }
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    /// Play when idle, stop when playing.
    pub fn toggle_playback(&mut self) {
        if self.session.is_playing() {
            self.stop();
        } else {
            self.play();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_playing()
    }

    /// Poll playback and the audio device; call once per UI frame.
    pub fn refresh(&mut self) -> PlaybackState {
        if let Some(err) = self.session.take_device_error() {
            self.error = Some(err);
        }
        self.session.refresh()
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut PlaybackSession {
        &mut self.session
    }

    // --- Presentation ---

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn glyphs(&self) -> &[NoteGlyph] {
        &self.glyphs
    }

    /// Dispose playback and revoke every resource.
    pub fn teardown(&mut self) {
        self.session.dispose();
        self.generated = None;
        self.resources.revoke_all();
    }
}

impl Drop for Studio {
    fn drop(&mut self) {
        self.teardown();
    }
}
