//! HTTP adapters for the services a tutoring session talks to.
//!
//! - [`OpenAiChat`]: chat and vision completions, model listing and the credential check.
//! - [`WolframVisualizer`]: renders a visualization query into an image reference.
//! - [`ElevenLabsNarrator`]: turns reply text into a PCM clip.

mod config;
pub mod consts;
mod elevenlabs;
mod openai;
mod stats;
mod wolfram;

#[cfg(test)]
mod testing;

pub use config::{Config, ConfigBuilder};
pub use elevenlabs::ElevenLabsNarrator;
pub use openai::{OpenAiChat, PromptSet};
pub use stats::Stats;
pub use wolfram::WolframVisualizer;
