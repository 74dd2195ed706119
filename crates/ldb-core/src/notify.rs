//! Best-effort staff notifications for domain events.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::{
    domain::{ChannelKind, ChatRef, UserId},
    messaging::port::MessagingGateway,
    store::CredentialStore,
};

/// Domain events staff are told about.
#[derive(Clone, Debug)]
pub enum StaffEvent {
    LoginSucceeded { login: String, identity: UserId },
    Registered { login: String, identity: UserId },
    LinkUpdated { login: String, link: String },
}

/// Fire-and-forget dispatcher: one attempt per recipient, errors logged and
/// swallowed so the triggering flow's outcome is never affected.
pub struct Notifier {
    store: Arc<dyn CredentialStore>,
    gateway: Arc<dyn MessagingGateway>,
    admin_chats: Vec<i64>,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        gateway: Arc<dyn MessagingGateway>,
        admin_chats: Vec<i64>,
    ) -> Self {
        Self {
            store,
            gateway,
            admin_chats,
        }
    }

    pub async fn notify(&self, event: StaffEvent) {
        let text = render(&event);

        // Link updates are announced on the links channel when one is
        // configured; everything else (and the fallback) goes to admins.
        if let StaffEvent::LinkUpdated { .. } = &event {
            match self.store.get_channel(ChannelKind::Links).await {
                Ok(Some(raw)) => {
                    if let Some(channel) = ChatRef::parse(&raw) {
                        if let Err(err) = self.gateway.send_text(channel, &text).await {
                            warn!(%err, "links channel notification failed");
                        } else {
                            return;
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(%err, "channel lookup failed during notification"),
            }
        }

        for &chat in &self.admin_chats {
            if let Err(err) = self.gateway.send_text(ChatRef::Id(chat), &text).await {
                warn!(chat, %err, "staff notification failed");
            }
        }
    }
}

fn render(event: &StaffEvent) -> String {
    let body = match event {
        StaffEvent::LoginSucceeded { login, identity } => {
            format!("🔑 {login} signed in (chat {}).", identity.0)
        }
        StaffEvent::Registered { login, identity } => {
            format!("🆕 New account: {login} (chat {}).", identity.0)
        }
        StaffEvent::LinkUpdated { login, link } => {
            format!("📢 {login} updated their link:\n🔗 {link}")
        }
    };
    format!("{body}\n{}", Utc::now().format("%Y-%m-%d %H:%M UTC"))
}
