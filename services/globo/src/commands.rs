use anyhow::{Context, Result};
use base64::Engine;
use globo_core::types::{IMAGE_MARKER, MessageId, Mode};
use std::fs;
use std::path::{Path, PathBuf};

/// One line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Submit(String),
    Photo(PathBuf),
    Play(MessageId),
    Stop,
    SwitchMode(Mode),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: /{0}")]
    Unknown(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid argument for /{0}: {1}")]
    InvalidArgument(&'static str, String),
}

pub const HELP: &str = "\
/photo <path>       send a photo of an exercise
/play <id>          read a message aloud
/stop               stop reading
/mode <standard|developer>
/help               show this help
/quit               leave";

impl ReplCommand {
    /// Parses a prompt line. Lines not starting with `/` are submitted as they are.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let Some(command) = line.trim().strip_prefix('/') else {
            return Ok(Self::Submit(line.to_string()));
        };
        let (name, arg) = match command.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (command, ""),
        };

        match name {
            "photo" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument("photo"));
                }
                Ok(Self::Photo(PathBuf::from(arg)))
            }
            "play" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument("play"));
                }
                arg.parse::<MessageId>()
                    .map(Self::Play)
                    .map_err(|_| CommandError::InvalidArgument("play", arg.to_string()))
            }
            "mode" => {
                if arg.is_empty() {
                    return Err(CommandError::MissingArgument("mode"));
                }
                arg.parse::<Mode>()
                    .map(Self::SwitchMode)
                    .map_err(|_| CommandError::InvalidArgument("mode", arg.to_string()))
            }
            "stop" => Ok(Self::Stop),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

/// Reads an image file into the marked data URL the session accepts.
pub fn photo_submission(path: &Path) -> Result<String> {
    let mime = image_mime(path)
        .with_context(|| format!("{} is not a PNG, JPEG, GIF or WebP image", path.display()))?;
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    Ok(format!("{IMAGE_MARKER}data:{mime};base64,{encoded}"))
}
