//! Transport + synthesizer rendered together.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use super::synth::{PolySynth, SynthConfig};
use super::transport::{ScheduledNote, Transport};
use crate::midi::MidiDocument;

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Samples rendered per transport step.
const BLOCK_SIZE: usize = 256;

/// Upper bound on offline renders, in seconds past the last note.
const MAX_TAIL_SECONDS: f64 = 10.0;

pub struct Engine {
    pub transport: Transport,
    pub synth: PolySynth,
}

pub type SharedEngine = Arc<Mutex<Engine>>;

/// Lock the engine, recovering the guard if a render thread panicked.
pub fn lock_engine(engine: &SharedEngine) -> MutexGuard<'_, Engine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Engine {
    pub fn new(config: SynthConfig, sample_rate: u32) -> Self {
        Self {
            transport: Transport::new(),
            synth: PolySynth::new(config, sample_rate),
        }
    }

    pub fn shared(config: SynthConfig, sample_rate: u32) -> SharedEngine {
        Arc::new(Mutex::new(Self::new(config, sample_rate)))
    }

    pub fn sample_rate(&self) -> u32 {
        self.synth.sample_rate()
    }

    /// Render mono samples, firing transport events at their sample offsets.
    pub fn render(&mut self, out: &mut [f32]) {
        let sr = self.sample_rate() as f64;
        for chunk in out.chunks_mut(BLOCK_SIZE) {
            let base = self.synth.now();
            let due = self.transport.advance(chunk.len() as f64 / sr);
            for event in due {
                self.synth.trigger_attack_release(
                    event.note.pitch,
                    event.note.duration,
                    base + event.offset,
                    event.note.velocity,
                );
            }
            self.synth.render(chunk);
        }
    }

    /// Every event fired and the last voice has faded out.
    pub fn is_done(&self) -> bool {
        self.transport.is_finished() && self.synth.is_idle()
    }
}

/// Render a whole document offline through a fresh engine.
pub fn render_document(doc: &MidiDocument, config: SynthConfig, sample_rate: u32) -> Vec<f32> {
    let mut engine = Engine::new(config, sample_rate);
    engine.transport.set_bpm(doc.initial_bpm());
    let events: Vec<ScheduledNote> = doc.all_notes().iter().map(ScheduledNote::from).collect();
    engine.transport.schedule(events);
    engine.transport.start();

    let max_samples = ((doc.duration + MAX_TAIL_SECONDS) * sample_rate as f64) as usize;
    let mut samples = Vec::new();
    let mut block = vec![0.0f32; BLOCK_SIZE];
    while samples.len() < max_samples {
        engine.render(&mut block);
        samples.extend_from_slice(&block);
        if engine.is_done() {
            break;
        }
    }
    log::debug!(
        "Rendered {:.2}s of audio",
        samples.len() as f64 / sample_rate as f64
    );
    samples
}

/// Write mono samples as a 16-bit PCM WAV file.
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in samples {
        let clipped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clipped * 32767.0) as i16)?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}
