use serde::{Deserialize, Serialize};

/// Sample rate of the PCM stream requested from the narration service.
pub const NARRATION_PCM16_SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// Mono, little-endian signed 16-bit samples.
    Pcm16 { sample_rate: u32 },
}

/// Synthesized speech returned by the narration collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioClip {
    pub fn pcm16(bytes: Vec<u8>, sample_rate: u32) -> Self {
        Self {
            bytes,
            format: AudioFormat::Pcm16 { sample_rate },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        match self.format {
            AudioFormat::Pcm16 { sample_rate } => sample_rate,
        }
    }
}

/// Voice identity plus synthesis and playback tuning for one locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub voice_id: String,
    pub stability: f32,
    pub similarity_boost: f32,
    pub playback_rate: f32,
    pub volume: f32,
}
