pub mod assembler;
pub mod audio;
pub mod backend;
pub mod error;
pub mod history;
pub mod locale;
pub mod session;

pub use globo_types as types;

pub use assembler::{AssembledReply, ResponseAssembler};
pub use audio::{
    AudioOutput, AudioPlaybackController, AudioResource, PlaybackEvent, PlaybackState,
};
pub use backend::{
    ChatCompletion, CredentialCheck, CredentialStatus, ModelCatalog, Narration, Visualization,
};
pub use error::{
    AudioError, BackendError, ErrorKind, ErrorNotice, InputError, NarrationError, SessionError,
};
pub use history::{ConversationHistoryStore, HistoryCache, MemoryHistoryCache};
pub use locale::VoiceCatalog;
pub use session::{SessionBuilder, SessionController, validate_input};
