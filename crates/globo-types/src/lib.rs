pub mod audio;
pub mod mode;
mod content;
mod reply;

pub use audio::{AudioClip, AudioFormat, VoiceProfile};
pub use content::message::*;
pub use content::parts::{IMAGE_MARKER, MessageContent};
pub use mode::{Locale, Mode, ParseModeError};
pub use reply::{ChatReply, ContextEntry};
