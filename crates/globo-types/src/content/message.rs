use crate::content::parts::MessageContent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque message identity. Allocated monotonically by the history store and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u64>().map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One numbered step of a worked solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "step_number")]
    pub number: u32,
    #[serde(rename = "content")]
    pub text: String,
}

impl Step {
    pub fn new(number: u32, text: &str) -> Self {
        Self {
            number,
            text: text.to_string(),
        }
    }
}

/// A rendered math visualization attached to an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationImage {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// A chat message as stored in the conversation history.
///
/// Messages are created by the history store from a [`MessageDraft`]. Once appended,
/// every field is fixed except the visualization slot, which may be filled exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    steps: Option<Vec<Step>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    visualization: Option<VisualizationImage>,
    #[serde(default)]
    auto_narrate: bool,
    timestamp_ms: u64,
}

impl Message {
    pub fn from_draft(id: MessageId, timestamp_ms: u64, draft: MessageDraft) -> Self {
        Self {
            id,
            role: draft.role,
            content: draft.content,
            steps: draft.steps,
            visualization: draft.visualization,
            auto_narrate: draft.auto_narrate,
            timestamp_ms,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn steps(&self) -> Option<&[Step]> {
        self.steps.as_deref()
    }

    pub fn visualization(&self) -> Option<&VisualizationImage> {
        self.visualization.as_ref()
    }

    pub fn auto_narrate(&self) -> bool {
        self.auto_narrate
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Single-string form used for narration and prompt context.
    pub fn flat_text(&self) -> String {
        self.content.as_context()
    }

    /// Fills the visualization slot. Returns `false` if it was already filled.
    pub fn attach_visualization(&mut self, image: VisualizationImage) -> bool {
        if self.visualization.is_some() {
            return false;
        }
        self.visualization = Some(image);
        true
    }
}

/// A message that has not been appended yet.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    role: Role,
    content: MessageContent,
    steps: Option<Vec<Step>>,
    visualization: Option<VisualizationImage>,
    auto_narrate: bool,
}

impl MessageDraft {
    pub fn new(role: Role, content: MessageContent) -> Self {
        Self {
            role,
            content,
            steps: None,
            visualization: None,
            auto_narrate: false,
        }
    }

    pub fn user(content: MessageContent) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(text: &str) -> Self {
        Self::new(Role::Assistant, MessageContent::text(text))
    }

    pub fn with_steps(mut self, steps: Vec<Step>) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn with_visualization(mut self, image: VisualizationImage) -> Self {
        self.visualization = Some(image);
        self
    }

    pub fn with_auto_narrate(mut self, auto_narrate: bool) -> Self {
        self.auto_narrate = auto_narrate;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &MessageContent {
        &self.content
    }

    pub fn steps(&self) -> Option<&[Step]> {
        self.steps.as_deref()
    }

    pub fn auto_narrate(&self) -> bool {
        self.auto_narrate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visualization_slot_is_write_once() {
        let draft = MessageDraft::assistant("area = 12");
        let mut message = Message::from_draft(MessageId::new(3), 0, draft);
        let first = VisualizationImage {
            url: "https://example.test/a.gif".to_string(),
            alt: None,
        };
        let second = VisualizationImage {
            url: "https://example.test/b.gif".to_string(),
            alt: None,
        };

        assert!(message.attach_visualization(first.clone()));
        assert!(!message.attach_visualization(second));
        assert_eq!(message.visualization(), Some(&first));
    }

    #[test]
    fn step_uses_the_backend_field_names() {
        let step = Step::new(1, "multiply the sides");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"step_number": 1, "content": "multiply the sides"})
        );
    }
}
