use crate::domain::{MediaContent, MessageRef};

/// Inbound event surface produced by the gateway adapter.
///
/// Gateway-specific update shapes stay in the adapter; the engine only sees
/// this union. Static keyboard labels are translated to `Command` by the
/// adapter, custom button labels arrive as `Text` and are resolved against
/// the dynamic lookup table by the engine.
#[derive(Clone, Debug)]
pub enum Event {
    Command { name: String, args: String },
    Text { text: String, origin: MessageRef },
    Media { media: MediaContent, origin: MessageRef },
    Cancel,
}

/// Reply keyboard: rows of plain labels shown under the input field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
}

impl ReplyKeyboard {
    pub fn new(rows: Vec<Vec<&str>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }
}

/// Inline button that opens a URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineLink {
    pub label: String,
    pub url: String,
}

/// Markup attached to an outgoing message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Markup {
    /// Remove any previously shown reply keyboard.
    Remove,
    Keyboard(ReplyKeyboard),
    Links(Vec<InlineLink>),
}
