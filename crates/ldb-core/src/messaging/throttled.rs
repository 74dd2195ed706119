use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatRef, MediaContent, MessageRef},
    messaging::{port::MessagingGateway, types::Markup},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* gateway calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingGateway decorator that rate-limits outbound calls.
///
/// Best-effort defense against transport flood-control errors in interactive
/// flows. The broadcast engine applies its own pacing on top of this.
pub struct ThrottledGateway {
    inner: Arc<dyn MessagingGateway>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<ChatRef, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledGateway {
    pub fn new(inner: Arc<dyn MessagingGateway>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat: &ChatRef) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat: &ChatRef) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if wait > Duration::from_millis(0) {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl MessagingGateway for ThrottledGateway {
    async fn send_text(&self, to: ChatRef, text: &str) -> Result<MessageRef> {
        self.throttle_chat(&to).await;
        self.inner.send_text(to, text).await
    }

    async fn send_keyboard(&self, to: ChatRef, text: &str, markup: Markup) -> Result<MessageRef> {
        self.throttle_chat(&to).await;
        self.inner.send_keyboard(to, text, markup).await
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.throttle_chat(&ChatRef::Id(msg.chat_id.0)).await;
        self.inner.edit_text(msg, text).await
    }

    async fn send_media(&self, to: ChatRef, media: &MediaContent) -> Result<MessageRef> {
        self.throttle_chat(&to).await;
        self.inner.send_media(to, media).await
    }

    async fn probe(&self, channel: &ChatRef) -> Result<()> {
        self.throttle_chat(channel).await;
        self.inner.probe(channel).await
    }

    async fn relay_copy(&self, to: ChatRef, origin: MessageRef) -> Result<()> {
        self.throttle_chat(&to).await;
        self.inner.relay_copy(to, origin).await
    }
}
