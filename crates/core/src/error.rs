use globo_types::MessageId;
use thiserror::Error;

/// Longest plain-text message accepted from the user, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;
/// Largest decoded image accepted as a photographed exercise.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Input rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("message cannot be empty")]
    Empty,
    #[error("message is too long: {len} characters, the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("image is too large: {bytes} bytes, the limit is {max}")]
    ImageTooLarge { bytes: usize, max: usize },
    #[error("attachment is not an image")]
    NotAnImage,
}

/// Failure outcomes of the chat, visualization and diagnostic collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("backend unavailable: {0}")]
    Transient(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarrationError {
    #[error("narration text is empty")]
    EmptyInput,
    #[error("narration service error: {0}")]
    Service(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    #[error("narration text is empty")]
    EmptyInput,
    #[error("narration service error: {0}")]
    Service(String),
    #[error("audio output error: {0}")]
    Device(String),
    #[error("playback request was superseded by a newer one")]
    Superseded,
    #[error("narration is not configured")]
    Unavailable,
}

impl From<NarrationError> for AudioError {
    fn from(err: NarrationError) -> Self {
        match err {
            NarrationError::EmptyInput => AudioError::EmptyInput,
            NarrationError::Service(message) => AudioError::Service(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a request is already in flight")]
    Busy,
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("the conversation was reset before the reply arrived")]
    Stale,
    #[error("no message with id {0}")]
    UnknownMessage(MessageId),
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// Coarse classification used to pick the user-facing wording of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InputInvalid,
    BackendUnavailable,
    RateLimited,
    InvalidCredential,
    Audio,
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Input(_) => ErrorKind::InputInvalid,
            SessionError::Backend(BackendError::RateLimited) => ErrorKind::RateLimited,
            SessionError::Backend(BackendError::InvalidCredential(_)) => {
                ErrorKind::InvalidCredential
            }
            SessionError::Backend(_) | SessionError::Busy | SessionError::Stale => {
                ErrorKind::BackendUnavailable
            }
            SessionError::UnknownMessage(_) | SessionError::Audio(_) => ErrorKind::Audio,
        }
    }
}

/// The user-visible error recorded on the session after a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorNotice {
    pub kind: ErrorKind,
    pub message: String,
}
