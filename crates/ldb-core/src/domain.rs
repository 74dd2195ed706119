use serde::{Deserialize, Serialize};

/// Platform-assigned identity of an interacting principal (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Chat the conversation happens in (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Message id within a chat (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a delivered message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Store-assigned account id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

/// Store-assigned custom button id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonId(pub i64);

/// Account record as seen by the engine.
///
/// The password is stored as an opaque digest; verification happens by
/// comparing digests, never by reading back a secret.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub login: String,
    pub password_hash: String,
    pub identity: Option<UserId>,
    pub link: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomButton {
    pub id: ButtonId,
    pub name: String,
    pub url: String,
    pub active: bool,
    pub sort_order: i64,
}

/// Kind tag for the channel directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    /// Channel that receives link-update announcements.
    Links,
    /// Channel that receives relayed user messages.
    Feedback,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Links => "links",
            ChannelKind::Feedback => "feedback",
        }
    }
}

/// Outbound recipient: a numeric chat or a public @handle.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChatRef {
    Id(i64),
    Handle(String),
}

impl ChatRef {
    /// Parse operator input like `-1001234567890` or `@mychannel`.
    pub fn parse(raw: &str) -> Option<ChatRef> {
        let raw = raw.trim();
        if let Some(rest) = raw.strip_prefix('@') {
            if rest.is_empty() {
                return None;
            }
            return Some(ChatRef::Handle(format!("@{rest}")));
        }
        raw.parse::<i64>().ok().map(ChatRef::Id)
    }
}

impl std::fmt::Display for ChatRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRef::Id(n) => write!(f, "{n}"),
            ChatRef::Handle(h) => write!(f, "{h}"),
        }
    }
}

impl From<ChatId> for ChatRef {
    fn from(c: ChatId) -> Self {
        ChatRef::Id(c.0)
    }
}

impl From<UserId> for ChatRef {
    fn from(u: UserId) -> Self {
        ChatRef::Id(u.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Animation,
}

/// Opaque media reference plus kind tag, as handed over by the gateway.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaContent {
    pub kind: MediaKind,
    pub file_ref: String,
    pub caption: Option<String>,
}

/// Payload a broadcast delivers; one dispatch point in the fan-out loop.
#[derive(Clone, Debug, PartialEq)]
pub enum Content {
    Text(String),
    Media(MediaContent),
}

/// The interacting principal as seen by the gateway for one inbound event.
#[derive(Clone, Debug)]
pub struct Subject {
    pub id: UserId,
    pub chat: ChatId,
    pub display_name: Option<String>,
}
