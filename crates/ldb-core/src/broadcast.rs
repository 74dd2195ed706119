//! Fan-out delivery engine: one message to many recipients, sequentially,
//! with pacing and partial-failure accounting.

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::warn;

use crate::{
    domain::{Content, MessageRef, UserId},
    messaging::port::MessagingGateway,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct BroadcastConfig {
    /// Fixed pause after every delivery attempt. A throttle for the
    /// transport's rate limits, not a correctness mechanism.
    pub pace: Duration,
    /// Update the in-flight progress indicator every this many recipients.
    pub progress_every: usize,
}

/// Final tally of one broadcast run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

pub struct Broadcaster {
    gateway: Arc<dyn MessagingGateway>,
    cfg: BroadcastConfig,
}

impl Broadcaster {
    pub fn new(gateway: Arc<dyn MessagingGateway>, cfg: BroadcastConfig) -> Self {
        Self { gateway, cfg }
    }

    /// Deliver `content` to every recipient in order.
    ///
    /// Delivery errors are logged and counted, never abort the batch. Once
    /// started the run goes to completion over its recipient snapshot; there
    /// is no mid-flight cancellation. `progress` is an operator-visible
    /// message edited in place, best-effort.
    pub async fn run(
        &self,
        content: &Content,
        recipients: &[UserId],
        progress: Option<MessageRef>,
    ) -> DeliveryReport {
        let total = recipients.len();
        let mut report = DeliveryReport::default();

        for (i, recipient) in recipients.iter().enumerate() {
            match self.deliver(*recipient, content).await {
                Ok(()) => report.sent += 1,
                Err(err) => {
                    warn!(recipient = recipient.0, %err, "broadcast delivery failed");
                    report.failed += 1;
                }
            }

            sleep(self.cfg.pace).await;

            let done = i + 1;
            if done < total && done % self.cfg.progress_every == 0 {
                if let Some(msg) = progress {
                    let _ = self
                        .gateway
                        .edit_text(msg, &format!("📢 Sending… {done}/{total}"))
                        .await;
                }
            }
        }

        report
    }

    async fn deliver(&self, to: UserId, content: &Content) -> Result<()> {
        match content {
            Content::Text(text) => self.gateway.send_text(to.into(), text).await.map(|_| ()),
            Content::Media(media) => self.gateway.send_media(to.into(), media).await.map(|_| ()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, ChatRef, MediaContent, MessageId};
    use crate::messaging::types::Markup;
    use crate::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGateway {
        sends: Mutex<Vec<(ChatRef, String)>>,
        edits: Mutex<Vec<String>>,
        fail_for: Vec<i64>,
    }

    impl FakeGateway {
        fn msg_ref() -> MessageRef {
            MessageRef {
                chat_id: ChatId(1),
                message_id: MessageId(1),
            }
        }
    }

    #[async_trait]
    impl MessagingGateway for FakeGateway {
        async fn send_text(&self, to: ChatRef, text: &str) -> Result<MessageRef> {
            if let ChatRef::Id(n) = &to {
                if self.fail_for.contains(n) {
                    return Err(Error::Transport("blocked by recipient".to_string()));
                }
            }
            self.sends.lock().unwrap().push((to, text.to_string()));
            Ok(Self::msg_ref())
        }

        async fn send_keyboard(
            &self,
            to: ChatRef,
            text: &str,
            _markup: Markup,
        ) -> Result<MessageRef> {
            self.sends.lock().unwrap().push((to, text.to_string()));
            Ok(Self::msg_ref())
        }

        async fn edit_text(&self, _msg: MessageRef, text: &str) -> Result<()> {
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_media(&self, to: ChatRef, media: &MediaContent) -> Result<MessageRef> {
            if let ChatRef::Id(n) = &to {
                if self.fail_for.contains(n) {
                    return Err(Error::Transport("blocked by recipient".to_string()));
                }
            }
            self.sends
                .lock()
                .unwrap()
                .push((to, format!("media:{}", media.file_ref)));
            Ok(Self::msg_ref())
        }

        async fn probe(&self, _channel: &ChatRef) -> Result<()> {
            Ok(())
        }

        async fn relay_copy(&self, to: ChatRef, _origin: MessageRef) -> Result<()> {
            self.sends.lock().unwrap().push((to, "copy".to_string()));
            Ok(())
        }
    }

    fn broadcaster(gateway: Arc<FakeGateway>) -> Broadcaster {
        Broadcaster::new(
            gateway,
            BroadcastConfig {
                pace: Duration::from_millis(0),
                progress_every: 2,
            },
        )
    }

    #[tokio::test]
    async fn tally_accounts_for_every_recipient() {
        let gateway = Arc::new(FakeGateway {
            fail_for: vec![2],
            ..FakeGateway::default()
        });
        let b = broadcaster(gateway.clone());

        let recipients = [UserId(1), UserId(2), UserId(3)];
        let report = b
            .run(&Content::Text("hello".to_string()), &recipients, None)
            .await;

        assert_eq!(report, DeliveryReport { sent: 2, failed: 1 });
        assert_eq!(report.sent + report.failed, recipients.len());
        // The failing recipient did not abort the rest of the batch.
        let sends = gateway.sends.lock().unwrap();
        assert!(sends.iter().any(|(to, _)| *to == ChatRef::Id(3)));
    }

    #[tokio::test]
    async fn progress_is_edited_periodically() {
        let gateway = Arc::new(FakeGateway::default());
        let b = broadcaster(gateway.clone());

        let recipients: Vec<UserId> = (1..=5).map(UserId).collect();
        let progress = FakeGateway::msg_ref();
        b.run(&Content::Text("x".to_string()), &recipients, Some(progress))
            .await;

        let edits = gateway.edits.lock().unwrap();
        assert_eq!(edits.as_slice(), ["📢 Sending… 2/5", "📢 Sending… 4/5"]);
    }

    #[tokio::test]
    async fn media_content_uses_the_media_primitive() {
        let gateway = Arc::new(FakeGateway::default());
        let b = broadcaster(gateway.clone());

        let content = Content::Media(MediaContent {
            kind: crate::domain::MediaKind::Photo,
            file_ref: "file-1".to_string(),
            caption: Some("c".to_string()),
        });
        let report = b.run(&content, &[UserId(9)], None).await;

        assert_eq!(report.sent, 1);
        let sends = gateway.sends.lock().unwrap();
        assert_eq!(sends[0].1, "media:file-1");
    }
}
