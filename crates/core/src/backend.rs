//! Contracts of the external services the session talks to.
//!
//! The session only depends on these traits. HTTP implementations live in the
//! providers crate; tests use `mockall` mocks or hand-written fakes.

use crate::error::{BackendError, NarrationError};
use async_trait::async_trait;
use globo_types::{
    AudioClip, ChatReply, ContextEntry, MessageContent, Mode, VisualizationImage, VoiceProfile,
};
#[cfg(test)]
use mockall::automock;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Sends one user turn, primed with the recent context, and returns the raw reply.
    async fn complete(
        &self,
        content: &MessageContent,
        mode: Mode,
        context: &[ContextEntry],
    ) -> Result<ChatReply, BackendError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Visualization: Send + Sync {
    async fn visualize(&self, query: &str) -> Result<VisualizationImage, BackendError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Narration: Send + Sync {
    async fn narrate(&self, text: &str, voice: &VoiceProfile) -> Result<AudioClip, NarrationError>;
}

/// Diagnostic listing of the chat models available to the configured credential.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn list_models(&self) -> Result<Vec<String>, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStatus {
    pub valid: bool,
    pub message: String,
}

/// Diagnostic check of the configured chat credential.
#[async_trait]
pub trait CredentialCheck: Send + Sync {
    async fn check_credential(&self) -> Result<CredentialStatus, BackendError>;
}
