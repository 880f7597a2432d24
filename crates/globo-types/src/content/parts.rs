use serde::{Deserialize, Serialize};

/// Prefix the front end puts in front of a data URL to mark a photographed exercise.
pub const IMAGE_MARKER: &str = "[PHOTO]";

/// The body of a chat message: either plain text or an encoded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MessageContent {
    Text(String),
    /// A `data:image/...;base64,...` URL.
    Image(String),
}

impl MessageContent {
    pub fn text(text: &str) -> Self {
        Self::Text(text.to_string())
    }

    pub fn image(data_url: &str) -> Self {
        Self::Image(data_url.to_string())
    }

    /// Parses the raw string submitted by the front end, recognising the image marker.
    /// Whitespace before the marker is ignored.
    pub fn parse(raw: &str) -> Self {
        match raw.trim_start().strip_prefix(IMAGE_MARKER) {
            Some(payload) => Self::Image(payload.trim().to_string()),
            None => Self::Text(raw.to_string()),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image(_) => None,
        }
    }

    /// The string form sent over the wire, with the marker restored for images.
    pub fn to_wire(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Image(url) => format!("{IMAGE_MARKER}{url}"),
        }
    }

    /// What this content contributes to a prompt context: images collapse to the bare marker.
    pub fn as_context(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Image(_) => IMAGE_MARKER.to_string(),
        }
    }
}
