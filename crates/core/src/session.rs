//! Playback session: one clock, one synthesizer, at most one schedule.
//!
//! All playback state lives here so that every transition, and teardown,
//! disposes the previous schedule before anything new is scheduled.

use std::time::Duration;

use anyhow::{bail, Result};

use crate::audio::engine::{lock_engine, Engine, SharedEngine, DEFAULT_SAMPLE_RATE};
use crate::audio::output::AudioOutput;
use crate::audio::synth::SynthConfig;
use crate::audio::transport::{ScheduleId, ScheduledNote};
use crate::error::UserError;
use crate::midi::{parse_midi, MidiDocument};
use crate::resource::{ResourceHandle, ResourceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioBackend {
    /// Render to the default output device.
    Device,
    /// No device; the caller drives rendering through [`PlaybackSession::engine`].
    Offline,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub synth: SynthConfig,
    pub sample_rate: u32,
    pub backend: AudioBackend,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            synth: SynthConfig::default(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            backend: AudioBackend::Device,
        }
    }
}

/// What was scheduled by a successful play request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSummary {
    pub bpm: f64,
    pub time_signature: Option<(u8, u32)>,
    pub notes: usize,
    pub duration: f64,
}

pub struct PlaybackSession {
    engine: SharedEngine,
    output: Option<AudioOutput>,
    state: PlaybackState,
    current: Option<ScheduleId>,
}

impl PlaybackSession {
    pub fn new(config: SessionConfig) -> Self {
        let engine = Engine::shared(config.synth, config.sample_rate);
        let output = match config.backend {
            AudioBackend::Device => Some(AudioOutput::start(engine.clone())),
            AudioBackend::Offline => None,
        };
        Self {
            engine,
            output,
            state: PlaybackState::Idle,
            current: None,
        }
    }

    pub fn offline() -> Self {
        Self::new(SessionConfig {
            backend: AudioBackend::Offline,
            ..SessionConfig::default()
        })
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Fetch `handle` from `store`, decode it, and play it from the top.
    pub fn play(
        &mut self,
        store: &ResourceStore,
        handle: &ResourceHandle,
    ) -> Result<PlaybackSummary, UserError> {
        match store.fetch(handle) {
            Ok(bytes) => self.play_bytes(&bytes),
            Err(e) => Err(self.fail(e)),
        }
    }

    pub fn play_bytes(&mut self, data: &[u8]) -> Result<PlaybackSummary, UserError> {
        match parse_midi(data) {
            Ok(doc) => Ok(self.play_document(&doc)),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Replace whatever is scheduled with `doc` and start the clock at zero.
    pub fn play_document(&mut self, doc: &MidiDocument) -> PlaybackSummary {
        let notes = doc.all_notes();
        let time_signature = doc
            .initial_time_signature()
            .map(|ts| (ts.numerator, ts.denominator));

        let mut engine = lock_engine(&self.engine);
        engine.transport.stop();
        if let Some(previous) = self.current.take() {
            engine.transport.unschedule(previous);
        }
        engine.transport.cancel();
        engine.synth.release_all();

        engine.transport.set_bpm(doc.initial_bpm());
        let (num, den) = time_signature.unwrap_or((4, 4));
        engine.transport.set_time_signature(num, den);
        let events: Vec<ScheduledNote> = notes.iter().map(ScheduledNote::from).collect();
        self.current = Some(engine.transport.schedule(events));
        engine.transport.start();
        let bpm = engine.transport.bpm();
        drop(engine);

        self.state = PlaybackState::Playing;
        log::info!(
            "Playing {} note(s) at {:.1} BPM ({:.2}s)",
            notes.len(),
            bpm,
            doc.duration
        );

        PlaybackSummary {
            bpm,
            time_signature,
            notes: notes.len(),
            duration: doc.duration,
        }
    }

    /// Silence all notes, halt and rewind the clock, and drop the schedule.
    pub fn stop(&mut self) {
        let mut engine = lock_engine(&self.engine);
        engine.synth.release_all();
        engine.transport.stop();
        engine.transport.cancel();
        drop(engine);

        if self.current.take().is_some() {
            log::debug!("Playback stopped");
        }
        self.state = PlaybackState::Idle;
    }

    fn fail(&mut self, err: anyhow::Error) -> UserError {
        log::error!("Error playing MIDI: {:#}", err);
        self.stop();
        UserError::Playback
    }

    /// Return to Idle once every note has fired and faded out.
    pub fn refresh(&mut self) -> PlaybackState {
        if self.state == PlaybackState::Playing && lock_engine(&self.engine).is_done() {
            log::debug!("Playback finished");
            self.stop();
        }
        self.state
    }

    /// Take the last audio device error, if any.
    pub fn take_device_error(&self) -> Option<String> {
        self.output.as_ref().and_then(AudioOutput::take_error)
    }

    /// Block until playback finishes on the output device.
    pub fn wait_until_idle(&mut self, poll: Duration) -> Result<()> {
        if self.output.is_none() {
            bail!("No audio output attached to this session");
        }
        while self.refresh() == PlaybackState::Playing {
            if let Some(err) = self.take_device_error() {
                self.stop();
                bail!("{}", err);
            }
            std::thread::sleep(poll);
        }
        Ok(())
    }

    pub fn active_schedules(&self) -> usize {
        lock_engine(&self.engine).transport.active_schedules()
    }

    pub fn clock_running(&self) -> bool {
        lock_engine(&self.engine).transport.is_started()
    }

    /// Transport position as "bars:beats:sixteenths".
    pub fn position_bbs(&self) -> String {
        lock_engine(&self.engine).transport.position_bbs()
    }

    /// Stop playback and release the audio device.
    pub fn dispose(&mut self) {
        self.stop();
        if let Some(mut output) = self.output.take() {
            output.shutdown();
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::parser::tests::two_note_song;

    fn render(session: &PlaybackSession, seconds: f64) {
        let mut engine = lock_engine(session.engine());
        let n = (seconds * engine.sample_rate() as f64) as usize;
        let mut buf = vec![0.0f32; n];
        engine.render(&mut buf);
    }

    #[test]
    fn test_play_schedules_and_starts_clock() {
        let mut session = PlaybackSession::offline();
        let summary = session.play_bytes(&two_note_song()).unwrap();
        assert_eq!(summary.notes, 2);
        assert_eq!(summary.bpm, 120.0);
        assert_eq!(summary.time_signature, None);
        assert_eq!(session.state(), PlaybackState::Playing);
        assert_eq!(session.active_schedules(), 1);
        assert!(session.clock_running());
    }

    #[test]
    fn test_play_twice_keeps_one_schedule() {
        let mut session = PlaybackSession::offline();
        session.play_bytes(&two_note_song()).unwrap();
        render(&session, 0.6);
        session.play_bytes(&two_note_song()).unwrap();

        assert_eq!(session.active_schedules(), 1);
        assert!(session.clock_running());
        let engine = lock_engine(session.engine());
        assert_eq!(engine.transport.position(), 0.0);
        // Voices from the first run were released
        assert!(engine.synth.sounding_pitches().is_empty());
    }

    #[test]
    fn test_replay_does_not_inherit_previous_tempo() {
        use crate::midi::parser::tests::{meta, note_off, note_on, write_smf};
        use crate::midi::parser::DEFAULT_BPM;
        use midly::num::u24;
        use midly::MetaMessage;

        let slow = write_smf(vec![vec![
            meta(0, MetaMessage::Tempo(u24::new(1_000_000))),
            meta(0, MetaMessage::TimeSignature(3, 2, 24, 8)),
            note_on(0, 0, 60, 100),
            note_off(480, 0, 60),
        ]]);
        let zero_tempo = write_smf(vec![vec![
            meta(0, MetaMessage::Tempo(u24::new(0))),
            note_on(0, 0, 62, 100),
            note_off(480, 0, 62),
        ]]);

        let mut session = PlaybackSession::offline();
        assert_eq!(session.play_bytes(&slow).unwrap().bpm, 60.0);
        let summary = session.play_bytes(&zero_tempo).unwrap();
        assert_eq!(summary.bpm, DEFAULT_BPM);
        let engine = lock_engine(session.engine());
        assert_eq!(engine.transport.time_signature(), (4, 4));
    }

    #[test]
    fn test_stop_silences_and_goes_idle() {
        let mut session = PlaybackSession::offline();
        session.play_bytes(&two_note_song()).unwrap();
        render(&session, 0.1);
        assert_eq!(lock_engine(session.engine()).synth.sounding_pitches(), vec![60]);

        session.stop();
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.active_schedules(), 0);
        assert!(!session.clock_running());
        assert!(lock_engine(session.engine()).synth.sounding_pitches().is_empty());
    }

    #[test]
    fn test_decode_failure_leaves_idle() {
        let mut session = PlaybackSession::offline();
        session.play_bytes(&two_note_song()).unwrap();

        let err = session.play_bytes(b"garbage").unwrap_err();
        assert_eq!(err, UserError::Playback);
        assert_eq!(session.state(), PlaybackState::Idle);
        assert_eq!(session.active_schedules(), 0);
    }

    #[test]
    fn test_revoked_resource_fails_playback() {
        let mut store = ResourceStore::new();
        let handle = store.create(two_note_song());
        store.revoke(&handle);

        let mut session = PlaybackSession::offline();
        assert_eq!(session.play(&store, &handle), Err(UserError::Playback));
        assert_eq!(session.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_refresh_returns_to_idle_at_end() {
        let mut session = PlaybackSession::offline();
        session.play_bytes(&two_note_song()).unwrap();
        render(&session, 0.5);
        assert_eq!(session.refresh(), PlaybackState::Playing);
        // 1s of notes + 1s release
        render(&session, 1.6);
        assert_eq!(session.refresh(), PlaybackState::Idle);
    }

    #[test]
    fn test_wait_requires_output() {
        let mut session = PlaybackSession::offline();
        assert!(session.wait_until_idle(Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let mut session = PlaybackSession::offline();
        session.play_bytes(&two_note_song()).unwrap();
        session.dispose();
        session.dispose();
        assert_eq!(session.state(), PlaybackState::Idle);
    }
}
