//! Polyphonic oscillator synthesizer with ADSR envelopes.
//!
//! The synth keeps its own sample clock. Triggers are addressed in seconds on
//! that clock, so a note can start mid-block.

use std::f64::consts::PI;

use crate::midi::pitch::midi_to_hz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// One sample at `phase` in [0, 1).
    fn sample(self, phase: f64) -> f64 {
        match self {
            Self::Sine => (2.0 * PI * phase).sin(),
            Self::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Self::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Self::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// Envelope times in seconds; `sustain` is a level in 0.0-1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.005,
            decay: 0.1,
            sustain: 0.3,
            release: 1.0,
        }
    }
}

impl Envelope {
    /// Attack/decay/sustain level `t` seconds after onset.
    fn held_level(&self, t: f64) -> f64 {
        if t < self.attack {
            t / self.attack
        } else if t < self.attack + self.decay {
            1.0 - (1.0 - self.sustain) * (t - self.attack) / self.decay
        } else {
            self.sustain
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub waveform: Waveform,
    pub envelope: Envelope,
    /// Oldest voice is stolen beyond this many.
    pub max_polyphony: usize,
    /// Per-voice gain applied on top of velocity.
    pub volume: f32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            waveform: Waveform::Triangle,
            envelope: Envelope::default(),
            max_polyphony: 32,
            volume: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
struct Voice {
    pitch: u8,
    freq: f64,
    phase: f64,
    velocity: f64,
    /// Absolute sample index of note-on
    onset: u64,
    /// Absolute sample index where release begins
    release_at: u64,
}

impl Voice {
    /// A voice whose onset is the next sample to render has not started.
    fn has_started(&self, clock: u64) -> bool {
        self.onset < clock
    }
}

pub struct PolySynth {
    config: SynthConfig,
    sample_rate: u32,
    clock: u64,
    release_samples: u64,
    voices: Vec<Voice>,
}

impl PolySynth {
    pub fn new(config: SynthConfig, sample_rate: u32) -> Self {
        let release_samples = (config.envelope.release * sample_rate as f64).round() as u64;
        Self {
            config,
            sample_rate,
            clock: 0,
            release_samples,
            voices: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Seconds rendered so far.
    pub fn now(&self) -> f64 {
        self.clock as f64 / self.sample_rate as f64
    }

    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    /// Start `pitch` at `time` (synth clock seconds) and release it after
    /// `duration` seconds. Times in the past start immediately.
    pub fn trigger_attack_release(&mut self, pitch: u8, duration: f64, time: f64, velocity: f32) {
        let onset = self.to_samples(time).max(self.clock);
        let release_at = onset + self.to_samples(duration);

        if self.voices.len() >= self.config.max_polyphony.max(1) {
            if let Some(idx) = self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| (v.release_at, v.onset))
                .map(|(i, _)| i)
            {
                log::trace!("Stealing voice for pitch {}", self.voices[idx].pitch);
                self.voices.swap_remove(idx);
            }
        }

        self.voices.push(Voice {
            pitch,
            freq: midi_to_hz(pitch),
            phase: 0.0,
            velocity: velocity.clamp(0.0, 1.0) as f64,
            onset,
            release_at,
        });
    }

    /// Move every sounding voice into its release stage and drop voices that
    /// have not started yet.
    pub fn release_all(&mut self) {
        let now = self.clock;
        self.voices.retain(|v| v.has_started(now));
        for voice in &mut self.voices {
            voice.release_at = voice.release_at.min(now);
        }
    }

    /// Voices that have rendered at least one sample and are not yet silent.
    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.has_started(self.clock)).count()
    }

    /// Pitches currently held (started and not released).
    pub fn sounding_pitches(&self) -> Vec<u8> {
        self.voices
            .iter()
            .filter(|v| v.has_started(self.clock) && v.release_at > self.clock)
            .map(|v| v.pitch)
            .collect()
    }

    /// True when nothing is sounding or waiting to sound.
    pub fn is_idle(&self) -> bool {
        self.voices.is_empty()
    }

    fn envelope_level(&self, voice: &Voice, n: u64) -> f64 {
        let env = &self.config.envelope;
        let sr = self.sample_rate as f64;
        if n < voice.release_at {
            return env.held_level((n - voice.onset) as f64 / sr);
        }
        let start_level = env.held_level((voice.release_at - voice.onset) as f64 / sr);
        if self.release_samples == 0 {
            return 0.0;
        }
        let progress = (n - voice.release_at) as f64 / self.release_samples as f64;
        (start_level * (1.0 - progress)).max(0.0)
    }

    /// Render mono samples into `out`, advancing the synth clock.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let sr = self.sample_rate as f64;
        let gain = self.config.volume as f64;
        let waveform = self.config.waveform;

        for idx in 0..self.voices.len() {
            for (i, slot) in out.iter_mut().enumerate() {
                let n = self.clock + i as u64;
                let voice = &self.voices[idx];
                if n < voice.onset {
                    continue;
                }
                let level = self.envelope_level(voice, n);
                let sample = waveform.sample(voice.phase) * level * voice.velocity * gain;
                *slot += sample as f32;

                let voice = &mut self.voices[idx];
                voice.phase = (voice.phase + voice.freq / sr).fract();
            }
        }

        self.clock += out.len() as u64;
        let now = self.clock;
        let release = self.release_samples;
        self.voices.retain(|v| now < v.release_at + release);
    }
}
