//! Telegram adapter (teloxide).
//!
//! This crate implements the `ldb-core` MessagingGateway over the Telegram
//! Bot API and translates teloxide updates into core events.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        InlineKeyboardButton, InlineKeyboardMarkup, InputFile, KeyboardButton, KeyboardMarkup,
        KeyboardRemove, Recipient, ReplyMarkup,
    },
};

use tokio::time::sleep;

pub mod router;

use ldb_core::{
    domain::{ChatRef, MediaContent, MediaKind, MessageId, MessageRef},
    errors::Error,
    messaging::{port::MessagingGateway, types::Markup},
    Result,
};

#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
}

impl TelegramGateway {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn recipient(to: &ChatRef) -> Recipient {
        match to {
            ChatRef::Id(n) => Recipient::Id(teloxide::types::ChatId(*n)),
            ChatRef::Handle(h) => Recipient::ChannelUsername(h.clone()),
        }
    }

    fn msg_ref(msg: &Message) -> MessageRef {
        MessageRef {
            chat_id: ldb_core::domain::ChatId(msg.chat.id.0),
            message_id: MessageId(msg.id.0),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    fn reply_markup(markup: Markup) -> ReplyMarkup {
        match markup {
            Markup::Remove => ReplyMarkup::KeyboardRemove(KeyboardRemove::new()),
            Markup::Keyboard(kb) => {
                let rows: Vec<Vec<KeyboardButton>> = kb
                    .rows
                    .into_iter()
                    .map(|row| row.into_iter().map(KeyboardButton::new).collect())
                    .collect();
                ReplyMarkup::Keyboard(KeyboardMarkup::new(rows).resize_keyboard(true))
            }
            Markup::Links(links) => {
                let rows: Vec<Vec<InlineKeyboardButton>> = links
                    .into_iter()
                    .filter_map(|link| {
                        let url = url::Url::parse(&link.url).ok()?;
                        Some(vec![InlineKeyboardButton::url(link.label, url)])
                    })
                    .collect();
                ReplyMarkup::InlineKeyboard(InlineKeyboardMarkup::new(rows))
            }
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingGateway for TelegramGateway {
    async fn send_text(&self, to: ChatRef, text: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::recipient(&to), text.to_string())
            })
            .await?;
        Ok(Self::msg_ref(&msg))
    }

    async fn send_keyboard(&self, to: ChatRef, text: &str, markup: Markup) -> Result<MessageRef> {
        let tg_markup = Self::reply_markup(markup);
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::recipient(&to), text.to_string())
                    .reply_markup(tg_markup.clone())
            })
            .await?;
        Ok(Self::msg_ref(&msg))
    }

    async fn edit_text(&self, msg: MessageRef, text: &str) -> Result<()> {
        self.with_retry(|| {
            self.bot.edit_message_text(
                teloxide::types::ChatId(msg.chat_id.0),
                teloxide::types::MessageId(msg.message_id.0),
                text.to_string(),
            )
        })
        .await?;
        Ok(())
    }

    async fn send_media(&self, to: ChatRef, media: &MediaContent) -> Result<MessageRef> {
        let recipient = Self::recipient(&to);
        let file = InputFile::file_id(media.file_ref.clone());
        let caption = media.caption.clone();

        let msg = match media.kind {
            MediaKind::Photo => {
                self.with_retry(|| {
                    let mut req = self.bot.send_photo(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Video => {
                self.with_retry(|| {
                    let mut req = self.bot.send_video(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Document => {
                self.with_retry(|| {
                    let mut req = self.bot.send_document(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Audio => {
                self.with_retry(|| {
                    let mut req = self.bot.send_audio(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Voice => {
                self.with_retry(|| {
                    let mut req = self.bot.send_voice(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
            MediaKind::Animation => {
                self.with_retry(|| {
                    let mut req = self.bot.send_animation(recipient.clone(), file.clone());
                    if let Some(c) = &caption {
                        req = req.caption(c.clone());
                    }
                    req
                })
                .await?
            }
        };

        Ok(Self::msg_ref(&msg))
    }

    async fn probe(&self, channel: &ChatRef) -> Result<()> {
        let recipient = Self::recipient(channel);
        let msg = self
            .with_retry(|| self.bot.send_message(recipient.clone(), "·".to_string()))
            .await?;
        self.with_retry(|| self.bot.delete_message(msg.chat.id, msg.id))
            .await?;
        Ok(())
    }

    async fn relay_copy(&self, to: ChatRef, origin: MessageRef) -> Result<()> {
        self.with_retry(|| {
            self.bot.copy_message(
                Self::recipient(&to),
                teloxide::types::ChatId(origin.chat_id.0),
                teloxide::types::MessageId(origin.message_id.0),
            )
        })
        .await?;
        Ok(())
    }
}
