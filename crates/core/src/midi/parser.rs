//! Parse Standard MIDI Files into a document of timed notes.
//!
//! Tick positions are converted to seconds through the file's tempo map,
//! which is merged from tempo events on every track.

use std::collections::{HashMap, VecDeque};
use std::path::Path;

use anyhow::{Context, Result};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use serde::Serialize;

use super::pitch::note_name;

/// Tempo assumed when a file carries no tempo event.
pub const DEFAULT_BPM: f64 = 120.0;

const DEFAULT_US_PER_BEAT: f64 = 500_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tempo {
    pub ticks: u64,
    /// Start time in seconds
    pub time: f64,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    pub ticks: u64,
    pub numerator: u8,
    pub denominator: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Header {
    pub name: Option<String>,
    /// Ticks per quarter note; `None` for SMPTE timecode files.
    pub ppq: Option<u16>,
    pub tempos: Vec<Tempo>,
    pub time_signatures: Vec<TimeSignature>,
}

/// A single MIDI note.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    /// MIDI pitch (0-127)
    pub midi: u8,
    /// Scientific pitch name, e.g. "C4"
    pub name: String,
    pub ticks: u64,
    pub duration_ticks: u64,
    /// Start time in seconds
    pub time: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Velocity normalized to 0.0-1.0
    pub velocity: f32,
    pub channel: u8,
}

impl Note {
    pub fn end(&self) -> f64 {
        self.time + self.duration
    }

}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Track {
    pub name: Option<String>,
    /// First channel used by a channel event on this track
    pub channel: Option<u8>,
    pub program: u8,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MidiDocument {
    pub header: Header,
    pub tracks: Vec<Track>,
    /// End of the last note in seconds
    pub duration: f64,
}

impl MidiDocument {
    /// Initial tempo in BPM, falling back to [`DEFAULT_BPM`] when the file
    /// has no tempo event or its first one is unusable (zero microseconds per
    /// beat).
    pub fn initial_bpm(&self) -> f64 {
        self.header
            .tempos
            .first()
            .map(|t| t.bpm)
            .filter(|bpm| bpm.is_finite() && *bpm > 0.0)
            .unwrap_or(DEFAULT_BPM)
    }

    pub fn initial_time_signature(&self) -> Option<TimeSignature> {
        self.header.time_signatures.first().copied()
    }

    /// Every note of every track, ordered by start time.
    pub fn all_notes(&self) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .tracks
            .iter()
            .flat_map(|t| t.notes.iter().cloned())
            .collect();
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        notes
    }

    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(|t| t.notes.len()).sum()
    }
}

/// Read and parse a MIDI file from disk.
pub fn parse_midi_file(path: &Path) -> Result<MidiDocument> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read MIDI file: {}", path.display()))?;
    parse_midi(&data).with_context(|| format!("Failed to decode {}", path.display()))
}

/// Parse MIDI bytes into a [`MidiDocument`].
pub fn parse_midi(data: &[u8]) -> Result<MidiDocument> {
    let smf = Smf::parse(data).map_err(|e| anyhow::anyhow!("Failed to parse MIDI: {}", e))?;

    let (ppq, clock) = match smf.header.timing {
        Timing::Metrical(tpb) => (Some(tpb.as_int()), Clock::Metrical(tpb.as_int().max(1) as f64)),
        Timing::Timecode(fps, sub) => {
            let frames_per_sec = match fps {
                midly::Fps::Fps24 => 24.0,
                midly::Fps::Fps25 => 25.0,
                midly::Fps::Fps29 => 29.97,
                midly::Fps::Fps30 => 30.0,
            };
            (None, Clock::Timecode(frames_per_sec * (sub.max(1)) as f64))
        }
    };

    // First pass: meta events that apply to the whole file.
    let mut tempo_events: Vec<(u64, f64)> = Vec::new();
    let mut time_signatures: Vec<TimeSignature> = Vec::new();
    let mut name = None;

    for (track_index, track) in smf.tracks.iter().enumerate() {
        let mut ticks = 0u64;
        for event in track {
            ticks += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    tempo_events.push((ticks, t.as_int() as f64));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(num, denom_pow, _, _)) => {
                    time_signatures.push(TimeSignature {
                        ticks,
                        numerator: num,
                        denominator: 1u32 << denom_pow.min(31),
                    });
                }
                TrackEventKind::Meta(MetaMessage::TrackName(raw))
                    if track_index == 0 && name.is_none() =>
                {
                    name = Some(String::from_utf8_lossy(raw).into_owned());
                }
                _ => {}
            }
        }
    }

    tempo_events.sort_by_key(|(ticks, _)| *ticks);
    time_signatures.sort_by_key(|ts| ts.ticks);

    let tempo_map = TempoMap::new(clock, &tempo_events);
    let tempos = tempo_events
        .iter()
        .map(|&(ticks, us)| Tempo {
            ticks,
            time: tempo_map.seconds(ticks),
            bpm: 60_000_000.0 / us,
        })
        .collect();

    // Second pass: pair note-on/note-off per track.
    let mut tracks = Vec::with_capacity(smf.tracks.len());
    let mut duration = 0.0f64;

    for track in &smf.tracks {
        let mut out = Track::default();
        let mut ticks = 0u64;
        // (channel, pitch) -> queue of (start_ticks, velocity)
        let mut active: HashMap<(u8, u8), VecDeque<(u64, u8)>> = HashMap::new();

        for event in track {
            ticks += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::TrackName(raw)) if out.name.is_none() => {
                    out.name = Some(String::from_utf8_lossy(raw).into_owned());
                }
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    out.channel.get_or_insert(channel);
                    match message {
                        MidiMessage::ProgramChange { program } => {
                            out.program = program.as_int();
                        }
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            active
                                .entry((channel, key.as_int()))
                                .or_default()
                                .push_back((ticks, vel.as_int()));
                        }
                        // Note-on with velocity 0 = note-off
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            let started = active
                                .get_mut(&(channel, key.as_int()))
                                .and_then(|q| q.pop_front());
                            if let Some((start, velocity)) = started {
                                out.notes.push(make_note(
                                    &tempo_map, channel, key.as_int(), start, ticks, velocity,
                                ));
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        // Close any notes still held at the end of the track
        for ((channel, pitch), queue) in active {
            for (start, velocity) in queue {
                out.notes
                    .push(make_note(&tempo_map, channel, pitch, start, ticks, velocity));
            }
        }

        out.notes
            .sort_by(|a, b| a.ticks.cmp(&b.ticks).then(a.midi.cmp(&b.midi)));
        if let Some(end) = out.notes.iter().map(Note::end).reduce(f64::max) {
            duration = duration.max(end);
        }
        tracks.push(out);
    }

    log::debug!(
        "Parsed MIDI: {} track(s), {} tempo event(s), {:.2}s",
        tracks.len(),
        tempo_events.len(),
        duration
    );

    Ok(MidiDocument {
        header: Header {
            name,
            ppq,
            tempos,
            time_signatures,
        },
        tracks,
        duration,
    })
}

fn make_note(
    tempo_map: &TempoMap,
    channel: u8,
    pitch: u8,
    start: u64,
    end: u64,
    velocity: u8,
) -> Note {
    let time = tempo_map.seconds(start);
    Note {
        midi: pitch,
        name: note_name(pitch),
        ticks: start,
        duration_ticks: end - start,
        time,
        duration: tempo_map.seconds(end) - time,
        velocity: velocity as f32 / 127.0,
        channel,
    }
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    /// Ticks per quarter note
    Metrical(f64),
    /// Ticks per second, tempo-independent
    Timecode(f64),
}

/// Piecewise-linear tick -> seconds mapping.
struct TempoMap {
    clock: Clock,
    /// (ticks, seconds, microseconds per beat), sorted by ticks
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    fn new(clock: Clock, tempo_events: &[(u64, f64)]) -> Self {
        let mut segments = vec![(0u64, 0.0f64, DEFAULT_US_PER_BEAT)];
        if let Clock::Metrical(ppq) = clock {
            for &(ticks, us) in tempo_events {
                let (prev_ticks, prev_secs, prev_us) = segments[segments.len() - 1];
                let secs = prev_secs + (ticks - prev_ticks) as f64 / ppq * prev_us / 1_000_000.0;
                if ticks == prev_ticks {
                    segments.pop();
                }
                segments.push((ticks, secs, us));
            }
        }
        Self { clock, segments }
    }

    fn seconds(&self, ticks: u64) -> f64 {
        match self.clock {
            Clock::Timecode(ticks_per_second) => ticks as f64 / ticks_per_second,
            Clock::Metrical(ppq) => {
                let idx = self.segments.partition_point(|s| s.0 <= ticks).saturating_sub(1);
                let (seg_ticks, seg_secs, us) = self.segments[idx];
                seg_secs + (ticks - seg_ticks) as f64 / ppq * us / 1_000_000.0
            }
        }
    }
}
