//! Audio device output for the shared engine.
//!
//! A dedicated thread owns the rodio stream (it is not `Send`) and pulls
//! samples from the engine until the output is dropped.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rodio::{OutputStream, Sink, Source};

use super::engine::{lock_engine, SharedEngine};

/// Samples rendered per engine lock.
const PULL_SIZE: usize = 512;

/// rodio source that renders from a [`SharedEngine`] forever.
pub struct EngineSource {
    engine: SharedEngine,
    sample_rate: u32,
    buffer: Vec<f32>,
    position: usize,
}

impl EngineSource {
    pub fn new(engine: SharedEngine) -> Self {
        let sample_rate = lock_engine(&engine).sample_rate();
        Self {
            engine,
            sample_rate,
            buffer: vec![0.0; PULL_SIZE],
            position: PULL_SIZE,
        }
    }
}

impl Iterator for EngineSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.position >= self.buffer.len() {
            lock_engine(&self.engine).render(&mut self.buffer);
            self.position = 0;
        }
        let sample = self.buffer[self.position];
        self.position += 1;
        Some(sample)
    }
}

impl Source for EngineSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Handle to the running output thread. Dropping it closes the device.
pub struct AudioOutput {
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    last_error: Arc<Mutex<Option<String>>>,
}

impl AudioOutput {
    /// Open the default output device on a new thread.
    ///
    /// Device failures are logged and kept for [`take_error`](Self::take_error);
    /// the engine keeps working without sound.
    pub fn start(engine: SharedEngine) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let last_error = Arc::new(Mutex::new(None));
        let thread_error = Arc::clone(&last_error);

        let thread = std::thread::Builder::new()
            .name("audio-output".into())
            .spawn(move || output_thread(engine, shutdown_rx, thread_error));

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("Failed to spawn audio thread: {}", e);
                *lock_error(&last_error) = Some(format!("Audio thread: {}", e));
                None
            }
        };

        Self {
            shutdown_tx: Some(shutdown_tx),
            thread,
            last_error,
        }
    }

    /// Take the last device error, clearing it.
    pub fn take_error(&self) -> Option<String> {
        lock_error(&self.last_error).take()
    }

    /// Close the device and join the thread.
    pub fn shutdown(&mut self) {
        drop(self.shutdown_tx.take());
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Audio output thread panicked");
            }
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock_error(slot: &Mutex<Option<String>>) -> std::sync::MutexGuard<'_, Option<String>> {
    slot.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn output_thread(
    engine: SharedEngine,
    shutdown_rx: mpsc::Receiver<()>,
    last_error: Arc<Mutex<Option<String>>>,
) {
    // OutputStream must stay alive for the entire thread lifetime.
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            log::error!("Failed to open audio output: {}", e);
            *lock_error(&last_error) = Some(format!("Audio device: {}", e));
            return;
        }
    };
    let sink = match Sink::try_new(&handle) {
        Ok(sink) => sink,
        Err(e) => {
            log::error!("Failed to create audio sink: {}", e);
            *lock_error(&last_error) = Some(format!("Audio sink: {}", e));
            return;
        }
    };

    log::info!("Audio output opened");
    sink.append(EngineSource::new(engine));
    sink.play();

    // Blocks until the sender is dropped
    let _ = shutdown_rx.recv();
    sink.stop();
    log::debug!("Audio output closed");
}
