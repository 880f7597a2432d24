//! Speaker output for narration clips.
//!
//! A cpal stream cannot leave the thread that built it, so every clip gets its own
//! playback thread owning the stream. The thread reports whether the device opened,
//! then waits for either the release signal or the ring buffer to drain.

use crate::{audio, device};
use cpal::traits::{DeviceTrait, StreamTrait};
use globo_core::types::{AudioClip, VoiceProfile};
use globo_core::{AudioError, AudioOutput, AudioResource};
use ringbuf::traits::{Consumer, Producer, Split};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const MIN_PLAYBACK_RATE: f32 = 0.25;

/// Plays clips on a local output device.
pub struct CpalOutput {
    device_name: Option<String>,
}

impl CpalOutput {
    /// `None` selects the host's default output device.
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

struct CpalPlayback {
    stop: Option<mpsc::Sender<()>>,
}

impl AudioResource for CpalPlayback {
    fn release(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl AudioOutput for CpalOutput {
    fn open(
        &self,
        clip: AudioClip,
        voice: &VoiceProfile,
        finished: oneshot::Sender<()>,
    ) -> Result<Box<dyn AudioResource>, AudioError> {
        let mut samples = audio::pcm16_to_f32(&clip.bytes);
        audio::apply_volume(&mut samples, voice.volume);
        // Pretending the clip was recorded at a scaled rate stretches it on resampling.
        let source_rate =
            f64::from(clip.sample_rate()) * f64::from(voice.playback_rate.max(MIN_PLAYBACK_RATE));

        let device_name = self.device_name.clone();
        let (stop_tx, stop_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();
        thread::Builder::new()
            .name("globo-playback".to_string())
            .spawn(move || {
                play_blocking(
                    device_name.as_deref(),
                    &samples,
                    source_rate,
                    stop_rx,
                    ready_tx,
                    finished,
                )
            })
            .map_err(|e| AudioError::Device(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalPlayback {
                stop: Some(stop_tx),
            })),
            Ok(Err(message)) => Err(AudioError::Device(message)),
            Err(_) => Err(AudioError::Device("playback thread exited".to_string())),
        }
    }
}

fn play_blocking(
    device_name: Option<&str>,
    samples: &[f32],
    source_rate: f64,
    stop: mpsc::Receiver<()>,
    ready: mpsc::Sender<Result<(), String>>,
    finished: oneshot::Sender<()>,
) {
    let (_stream, drained) = match start_stream(device_name, samples, source_rate) {
        Ok(started) => started,
        Err(e) => {
            tracing::error!("Failed to start output stream: {:?}", e);
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    loop {
        match stop.recv_timeout(POLL_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("Playback released before the end of the clip");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
        if drained.load(Ordering::Acquire) {
            let _ = finished.send(());
            return;
        }
    }
}

fn start_stream(
    device_name: Option<&str>,
    samples: &[f32],
    source_rate: f64,
) -> anyhow::Result<(cpal::Stream, Arc<AtomicBool>)> {
    let output = device::get_or_default_output(device_name)?;
    let config = output.default_output_config()?.config();
    let channels = usize::from(config.channels).max(1);
    let device_rate = f64::from(config.sample_rate.0);
    tracing::debug!("Output stream config: {:?}", &config);

    let resampled = audio::resample_all(samples, source_rate, device_rate)?;
    let (mut audio_out_tx, mut audio_out_rx) =
        audio::shared_buffer(resampled.len().max(1)).split();
    audio_out_tx.push_slice(&resampled);

    let drained = Arc::new(AtomicBool::new(false));
    let drained_flag = drained.clone();
    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        for frame in data.chunks_mut(channels) {
            let sample = match audio_out_rx.try_pop() {
                Some(sample) => sample,
                None => {
                    drained_flag.store(true, Ordering::Release);
                    0.0
                }
            };
            frame.fill(sample);
        }
    };

    let stream = output.build_output_stream(
        &config,
        output_data_fn,
        move |err| tracing::error!("An error occurred on output stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok((stream, drained))
}
