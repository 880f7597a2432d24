//! Normalizes chat replies into assistant messages.
//!
//! Replies come in two shapes: a structured document carrying a `steps` list, or
//! free text in which steps are marked by `1)`, `2.` or `Step 3:` at the start of a
//! line. Anything that claims to be structured but cannot be read as such falls
//! back to the free-text path; normalization itself never fails.

use crate::locale;
use globo_types::{ChatReply, MessageDraft, Mode, Step};
use serde::Deserialize;
use serde_json::Value;

/// A normalized reply plus the dependent work it asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledReply {
    pub draft: MessageDraft,
    pub visualization_query: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseAssembler;

/// Loose reading of a structured reply embedded in the reply text.
#[derive(Debug, Deserialize)]
struct StructuredPayload {
    #[serde(default)]
    steps: Option<Vec<Value>>,
    #[serde(default, alias = "visualizationQuery")]
    wolfram_query: Option<String>,
    #[serde(default, alias = "autoNarrate")]
    send_to_voice: Option<bool>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: ChatReply) -> AssembledReply {
        let ChatReply {
            content,
            steps,
            mut visualization_query,
            mut auto_narrate,
        } = raw;

        let steps = match steps.filter(|s| !s.is_empty()) {
            Some(steps) => trim_steps(steps),
            None => match parse_structured(&content) {
                Some(payload) => {
                    visualization_query = visualization_query.or(payload.query);
                    auto_narrate = auto_narrate.or(payload.auto_narrate);
                    payload.steps
                }
                None => split_steps(&content),
            },
        };

        let flat = steps
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let mut draft =
            MessageDraft::assistant(&flat).with_auto_narrate(auto_narrate.unwrap_or(false));
        if !steps.is_empty() {
            draft = draft.with_steps(steps);
        }

        AssembledReply {
            draft,
            visualization_query: visualization_query.filter(|q| !q.trim().is_empty()),
        }
    }

    /// The locale-specific greeting that seeds every conversation. It is always narrated.
    pub fn welcome(&self, mode: Mode) -> MessageDraft {
        MessageDraft::assistant(locale::welcome_message(mode)).with_auto_narrate(true)
    }
}

struct ParsedStructure {
    steps: Vec<Step>,
    query: Option<String>,
    auto_narrate: Option<bool>,
}

/// Reads the reply text as a structured document. `None` when it is not JSON, not an
/// object, or has no usable `steps`.
fn parse_structured(content: &str) -> Option<ParsedStructure> {
    let body = strip_code_fence(content.trim());
    if !body.starts_with('{') {
        return None;
    }
    let payload: StructuredPayload = match serde_json::from_str(body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!("Reply is not a structured document ({}), splitting text", e);
            return None;
        }
    };

    let steps: Vec<Step> = payload
        .steps
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| step_from_value(idx, value))
        .collect();
    if steps.is_empty() {
        tracing::debug!("Structured reply carries no steps, splitting text");
        return None;
    }

    Some(ParsedStructure {
        steps,
        query: payload.wolfram_query,
        auto_narrate: payload.send_to_voice,
    })
}

fn step_from_value(idx: usize, value: &Value) -> Option<Step> {
    let fallback_number = idx as u32 + 1;
    let (number, text) = match value {
        Value::String(text) => (fallback_number, text.clone()),
        Value::Object(fields) => {
            let text = ["content", "text", "explanation", "description", "step"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))?
                .to_string();
            let number = ["step_number", "number"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_u64))
                .map(|n| n as u32)
                .unwrap_or(fallback_number);
            (number, text)
        }
        _ => return None,
    };
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(Step::new(number, text))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Splits free text into steps at lines that start with a step marker.
fn split_steps(text: &str) -> Vec<Step> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for line in text.lines() {
        match strip_step_marker(line) {
            Some(rest) => {
                if let Some(chunk) = current.take() {
                    chunks.push(chunk);
                }
                current = Some(rest.to_string());
            }
            None => match current.as_mut() {
                Some(chunk) => {
                    chunk.push('\n');
                    chunk.push_str(line);
                }
                None => current = Some(line.to_string()),
            },
        }
    }
    if let Some(chunk) = current {
        chunks.push(chunk);
    }

    let steps: Vec<&str> = chunks
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    steps
        .into_iter()
        .enumerate()
        .map(|(idx, text)| Step::new(idx as u32 + 1, text))
        .collect()
}

/// Returns the rest of the line when it opens with `<digits>)`, `<digits>.` or `Step <digits>:`.
fn strip_step_marker(line: &str) -> Option<&str> {
    let line = line.trim_start();

    let digits = leading_digits(line);
    if digits > 0 {
        let rest = &line[digits..];
        return rest.strip_prefix(')').or_else(|| rest.strip_prefix('.'));
    }

    let rest = line.strip_prefix("Step ")?;
    let digits = leading_digits(rest);
    if digits == 0 {
        return None;
    }
    rest[digits..].strip_prefix(':')
}

fn leading_digits(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_digit).count()
}

fn trim_steps(steps: Vec<Step>) -> Vec<Step> {
    steps
        .into_iter()
        .map(|s| Step {
            text: s.text.trim().to_string(),
            ..s
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(reply: &AssembledReply) -> Vec<String> {
        reply
            .draft
            .steps()
            .unwrap_or_default()
            .iter()
            .map(|s| s.text.clone())
            .collect()
    }

    #[test]
    fn splits_numbered_text_and_strips_markers() {
        let reply = ResponseAssembler::new().normalize(ChatReply::text("1) first step\n2) second step"));

        assert_eq!(texts(&reply), vec!["first step", "second step"]);
        let numbers: Vec<u32> = reply.draft.steps().unwrap().iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(reply.draft.content().as_text(), Some("first step\nsecond step"));
    }

    #[test]
    fn recognises_dot_and_step_label_markers() {
        let text = "Vamos a resolverlo.\n1. Suma 3 + 4\nStep 2: Multiplica por 2\ncontinúa aquí";
        let reply = ResponseAssembler::new().normalize(ChatReply::text(text));

        assert_eq!(
            texts(&reply),
            vec![
                "Vamos a resolverlo.",
                "Suma 3 + 4",
                "Multiplica por 2\ncontinúa aquí"
            ]
        );
    }

    #[test]
    fn unmarked_text_becomes_a_single_step() {
        let reply = ResponseAssembler::new().normalize(ChatReply::text("  The answer is 12.  "));

        assert_eq!(texts(&reply), vec!["The answer is 12."]);
        assert!(!reply.draft.auto_narrate());
    }

    #[test]
    fn structured_steps_on_the_reply_win() {
        let raw = ChatReply {
            content: "ignored".to_string(),
            steps: Some(vec![Step::new(1, "Draw the square"), Step::new(2, "Count the sides")]),
            visualization_query: Some("square".to_string()),
            auto_narrate: Some(true),
        };
        let reply = ResponseAssembler::new().normalize(raw);

        assert_eq!(texts(&reply), vec!["Draw the square", "Count the sides"]);
        assert_eq!(reply.draft.content().as_text(), Some("Draw the square\nCount the sides"));
        assert_eq!(reply.visualization_query.as_deref(), Some("square"));
        assert!(reply.draft.auto_narrate());
    }

    #[test]
    fn structured_document_in_the_text_is_unpacked() {
        let content = r#"```json
{"lesson_summary":"fracciones","steps":[{"step_number":1,"content":"Divide la pizza"},"Cuenta las partes"],"wolfram_query":"1/4 pie chart","send_to_voice":true}
```"#;
        let reply = ResponseAssembler::new().normalize(ChatReply::text(content));

        assert_eq!(texts(&reply), vec!["Divide la pizza", "Cuenta las partes"]);
        assert_eq!(reply.visualization_query.as_deref(), Some("1/4 pie chart"));
        assert!(reply.draft.auto_narrate());
    }

    #[test]
    fn json_without_steps_falls_back_to_text_splitting() {
        let content = r#"{"lesson_summary": "area"}"#;
        let reply = ResponseAssembler::new().normalize(ChatReply::text(content));

        assert_eq!(texts(&reply), vec![content]);
    }

    #[test]
    fn broken_json_falls_back_to_text_splitting() {
        let content = "{\"steps\": [\n1) half a document";
        let reply = ResponseAssembler::new().normalize(ChatReply::text(content));

        assert_eq!(texts(&reply), vec!["{\"steps\": [", "half a document"]);
    }

    #[test]
    fn blank_visualization_queries_are_dropped() {
        let raw = ChatReply {
            visualization_query: Some("   ".to_string()),
            ..ChatReply::text("ok")
        };
        assert!(ResponseAssembler::new().normalize(raw).visualization_query.is_none());
    }

    #[test]
    fn welcome_is_always_narrated() {
        let draft = ResponseAssembler::new().welcome(Mode::Developer);
        assert!(draft.auto_narrate());
        assert!(draft.content().as_text().unwrap().contains("Developer Mode"));
    }
}
