use globo_core::ErrorNotice;
use globo_core::types::{Message, MessageContent, Mode, Role};
use std::fmt::Write;

/// Terminal rendering of one message: a header line, then the steps as a numbered list.
pub fn render_message(message: &Message, mode: Mode) -> String {
    let speaker = match (message.role(), mode) {
        (Role::User, Mode::Standard) => "Tú",
        (Role::User, Mode::Developer) => "You",
        (Role::Assistant, _) => "Gloria",
    };
    let mut out = format!("[{}] {}:", message.id(), speaker);

    match (message.content(), message.steps()) {
        (MessageContent::Image(_), _) => out.push_str(" (foto)"),
        (_, Some(steps)) if steps.len() > 1 => {
            for step in steps {
                let _ = write!(out, "\n  {}. {}", step.number, step.text.replace('\n', "\n     "));
            }
        }
        (MessageContent::Text(text), _) => {
            let _ = write!(out, " {text}");
        }
    }

    if let Some(image) = message.visualization() {
        let _ = write!(out, "\n  ↳ {}", image.url);
    }
    out
}

pub fn render_error(notice: &ErrorNotice) -> String {
    format!("! {}", notice.message)
}
