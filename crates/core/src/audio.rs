//! Narration playback with at most one clip audible at a time.
//!
//! Every `play` or `stop` bumps a generation counter. A fetch that completes under a
//! stale generation is discarded instead of being played, so a late clip can never
//! talk over a newer one. Releasing an audible clip arms a short settle barrier that
//! the next playback waits out before it opens the output.

use crate::backend::Narration;
use crate::error::AudioError;
use globo_types::{AudioClip, VoiceProfile};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::time::Instant;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

const EVENT_CAPACITY: usize = 32;

/// A clip that is currently held by the output. Releasing it must be idempotent.
pub trait AudioResource: Send {
    fn release(&mut self);
}

/// Where decoded clips are sent to be heard.
pub trait AudioOutput: Send + Sync {
    /// Starts playing `clip`. `finished` is signalled once the clip played to the end;
    /// it is dropped without a signal when the resource is released early.
    /// May block until the stream runs; it is called on the blocking pool.
    fn open(
        &self,
        clip: AudioClip,
        voice: &VoiceProfile,
        finished: oneshot::Sender<()>,
    ) -> Result<Box<dyn AudioResource>, AudioError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started { generation: u64 },
    Finished { generation: u64 },
    Stopped { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
}

struct AudioHandle {
    generation: u64,
    text: String,
    resource: Box<dyn AudioResource>,
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        self.resource.release();
    }
}

#[derive(Default)]
struct PlaybackInner {
    generation: u64,
    handle: Option<AudioHandle>,
    settle_until: Option<Instant>,
}

fn lock(inner: &Mutex<PlaybackInner>) -> MutexGuard<'_, PlaybackInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct AudioPlaybackController {
    narration: Arc<dyn Narration>,
    output: Arc<dyn AudioOutput>,
    settle_delay: Duration,
    inner: Arc<Mutex<PlaybackInner>>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl AudioPlaybackController {
    pub fn new(narration: Arc<dyn Narration>, output: Arc<dyn AudioOutput>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            narration,
            output,
            settle_delay: DEFAULT_SETTLE_DELAY,
            inner: Arc::new(Mutex::new(PlaybackInner::default())),
            events,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        match lock(&self.inner).handle {
            Some(_) => PlaybackState::Playing,
            None => PlaybackState::Idle,
        }
    }

    /// Text of the clip currently audible, if any.
    pub fn now_playing(&self) -> Option<String> {
        lock(&self.inner).handle.as_ref().map(|h| h.text.clone())
    }

    /// Narrates `text` and starts playing it, replacing whatever was playing.
    ///
    /// Returns once playback has started. Blank text is rejected before any state
    /// change or network call. If another `play` or a `stop` happens while the clip is
    /// being fetched, the clip is dropped and `AudioError::Superseded` is returned.
    pub async fn play(&self, text: &str, voice: &VoiceProfile) -> Result<(), AudioError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AudioError::EmptyInput);
        }

        let (generation, settle_until, released) = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            let released = inner.handle.take();
            if released.is_some() {
                inner.settle_until = Some(Instant::now() + self.settle_delay);
            }
            (inner.generation, inner.settle_until, released)
        };
        if let Some(handle) = released {
            self.release(handle);
        }

        if let Some(deadline) = settle_until {
            tokio::time::sleep_until(deadline).await;
        }
        if !self.is_current(generation) {
            return Err(AudioError::Superseded);
        }

        tracing::debug!("Fetching narration for generation {}", generation);
        let clip = match self.narration.narrate(text, voice).await {
            Ok(clip) => clip,
            Err(_) if !self.is_current(generation) => return Err(AudioError::Superseded),
            Err(e) => return Err(e.into()),
        };
        if clip.is_empty() {
            return Err(AudioError::Service(
                "narration service returned no audio".to_string(),
            ));
        }

        if !self.is_current(generation) {
            tracing::debug!("Discarding narration for superseded generation {}", generation);
            return Err(AudioError::Superseded);
        }

        // `open` may block until the stream runs: no lock held, off the executor.
        let (finished_tx, finished_rx) = oneshot::channel();
        let output = self.output.clone();
        let opening_voice = voice.clone();
        let resource = tokio::task::spawn_blocking(move || {
            output.open(clip, &opening_voice, finished_tx)
        })
        .await
        .map_err(|e| AudioError::Device(format!("audio output task failed: {e}")))??;

        let handle = AudioHandle {
            generation,
            text: text.to_string(),
            resource,
        };
        {
            let mut inner = lock(&self.inner);
            if inner.generation == generation {
                inner.handle = Some(handle);
            } else {
                drop(inner);
                tracing::debug!("Releasing output opened for superseded generation {}", generation);
                drop(handle);
                return Err(AudioError::Superseded);
            }
        }
        let _ = self.events.send(PlaybackEvent::Started { generation });
        self.watch_completion(generation, finished_rx);
        Ok(())
    }

    /// Stops the audible clip and invalidates in-flight fetches.
    /// Returns `false` when nothing was playing; calling it again is harmless.
    pub fn stop(&self) -> bool {
        let released = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            let released = inner.handle.take();
            if released.is_some() {
                inner.settle_until = Some(Instant::now() + self.settle_delay);
            }
            released
        };
        match released {
            Some(handle) => {
                self.release(handle);
                true
            }
            None => false,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.inner).generation == generation
    }

    fn release(&self, handle: AudioHandle) {
        let generation = handle.generation;
        drop(handle);
        tracing::debug!("Stopped playback of generation {}", generation);
        let _ = self.events.send(PlaybackEvent::Stopped { generation });
    }

    fn watch_completion(&self, generation: u64, finished: oneshot::Receiver<()>) {
        let inner = Arc::downgrade(&self.inner);
        let events = self.events.clone();
        tokio::spawn(async move {
            if finished.await.is_err() {
                return;
            }
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let done = {
                let mut inner = lock(&inner);
                match inner.handle.as_ref() {
                    Some(handle) if handle.generation == generation => inner.handle.take(),
                    _ => None,
                }
            };
            if done.is_some() {
                drop(done);
                let _ = events.send(PlaybackEvent::Finished { generation });
            }
        });
    }
}
