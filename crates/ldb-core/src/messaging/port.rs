use async_trait::async_trait;

use crate::{
    domain::{ChatRef, MediaContent, MessageRef},
    messaging::types::Markup,
    Result,
};

/// Cross-messenger gateway port.
///
/// Telegram is the first implementation; the shape is narrow enough that
/// other transports can fit behind it. Every call may fail with
/// `Error::Transport`; how that is handled depends on the caller (counted in
/// a broadcast batch, fatal for a single operation).
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    async fn send_text(&self, to: ChatRef, text: &str) -> Result<MessageRef>;

    async fn send_keyboard(&self, to: ChatRef, text: &str, markup: Markup) -> Result<MessageRef>;

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()>;

    async fn send_media(&self, to: ChatRef, media: &MediaContent) -> Result<MessageRef>;

    /// Verify the bot can post to a channel: send a probe message and retract
    /// it immediately.
    async fn probe(&self, channel: &ChatRef) -> Result<()>;

    /// Re-deliver an existing message to another chat as a copy.
    async fn relay_copy(&self, to: ChatRef, origin: MessageRef) -> Result<()>;
}
