use crate::content::message::{Role, Step};
use serde::{Deserialize, Serialize};

/// What the chat-completion collaborator hands back.
///
/// `content` is the model's raw text. It may itself be a JSON document carrying
/// `steps`, which the response assembler unpacks. Both the camelCase field names and
/// the backend's snake_case names are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<Step>>,
    #[serde(
        default,
        rename = "visualizationQuery",
        alias = "wolfram_query",
        skip_serializing_if = "Option::is_none"
    )]
    pub visualization_query: Option<String>,
    #[serde(
        default,
        rename = "autoNarrate",
        alias = "send_to_voice",
        skip_serializing_if = "Option::is_none"
    )]
    pub auto_narrate: Option<bool>,
}

impl ChatReply {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ..Default::default()
        }
    }
}

/// One entry of the recent context window sent to prime the next completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub role: Role,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_backend_field_aliases() {
        let reply: ChatReply = serde_json::from_str(
            r#"{"content":"x","wolfram_query":"plot y=x^2","send_to_voice":true}"#,
        )
        .unwrap();
        assert_eq!(reply.visualization_query.as_deref(), Some("plot y=x^2"));
        assert_eq!(reply.auto_narrate, Some(true));
        assert!(reply.steps.is_none());
    }
}
