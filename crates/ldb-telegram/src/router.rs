//! Update routing: teloxide updates → core events → the conversation engine.

use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{error, info};

use ldb_core::{
    config::Config,
    domain::{ChatId, MediaContent, MediaKind, MessageId, MessageRef, Subject, UserId},
    engine::{cmd, Engine},
    keyboards as kb,
    messaging::{
        port::MessagingGateway,
        throttled::{ThrottleConfig, ThrottledGateway},
        types::Event,
    },
    store::CredentialStore,
};

use crate::TelegramGateway;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub async fn run_polling(cfg: Arc<Config>, store: Arc<dyn CredentialStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!(username = me.username(), "bot started");
    }
    info!(admins = cfg.admin_ids.len(), "configuration loaded");

    // The raw gateway keeps a RetryAfter retry; the throttle decorator spaces
    // calls out so that retry rarely fires.
    let raw: Arc<dyn MessagingGateway> = Arc::new(TelegramGateway::new(bot.clone()));
    let gateway: Arc<dyn MessagingGateway> =
        Arc::new(ThrottledGateway::new(raw, ThrottleConfig::default()));

    let engine = Arc::new(Engine::new(cfg, store, gateway));
    let state = Arc::new(AppState { engine });

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    if user.is_bot {
        return Ok(());
    }

    let subject = Subject {
        id: UserId(user.id.0 as i64),
        chat: ChatId(msg.chat.id.0),
        display_name: Some(user.full_name()).filter(|s| !s.is_empty()),
    };

    let Some(event) = event_for_message(&msg) else {
        return Ok(());
    };

    if let Err(err) = state.engine.handle(&subject, event).await {
        error!(subject = subject.id.0, %err, "event handling failed");
    }
    Ok(())
}

fn msg_ref(msg: &Message) -> MessageRef {
    MessageRef {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
    }
}

/// Map a Telegram message onto the engine's event surface.
fn event_for_message(msg: &Message) -> Option<Event> {
    if let Some(text) = msg.text() {
        return Some(event_for_text(text, msg_ref(msg)));
    }

    let origin = msg_ref(msg);
    let caption = msg.caption().map(|s| s.to_string());

    let media = if let Some(photos) = msg.photo() {
        // Telegram lists sizes ascending; take the largest rendition.
        let best = photos.last()?;
        MediaContent {
            kind: MediaKind::Photo,
            file_ref: best.file.id.clone(),
            caption,
        }
    } else if let Some(video) = msg.video() {
        MediaContent {
            kind: MediaKind::Video,
            file_ref: video.file.id.clone(),
            caption,
        }
    } else if let Some(doc) = msg.document() {
        MediaContent {
            kind: MediaKind::Document,
            file_ref: doc.file.id.clone(),
            caption,
        }
    } else if let Some(audio) = msg.audio() {
        MediaContent {
            kind: MediaKind::Audio,
            file_ref: audio.file.id.clone(),
            caption,
        }
    } else if let Some(voice) = msg.voice() {
        MediaContent {
            kind: MediaKind::Voice,
            file_ref: voice.file.id.clone(),
            caption,
        }
    } else if let Some(animation) = msg.animation() {
        MediaContent {
            kind: MediaKind::Animation,
            file_ref: animation.file.id.clone(),
            caption,
        }
    } else {
        return None;
    };

    Some(Event::Media { media, origin })
}

fn event_for_text(text: &str, origin: MessageRef) -> Event {
    let trimmed = text.trim();

    if trimmed == kb::CANCEL {
        return Event::Cancel;
    }

    if trimmed.starts_with('/') {
        let (name, args) = parse_command(trimmed);
        if name == "cancel" {
            return Event::Cancel;
        }
        return Event::Command { name, args };
    }

    if let Some(name) = command_for_label(trimmed) {
        return Event::Command {
            name: name.to_string(),
            args: String::new(),
        };
    }

    Event::Text {
        text: text.to_string(),
        origin,
    }
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn command_for_label(text: &str) -> Option<&'static str> {
    match text {
        kb::LOGIN => Some(cmd::LOGIN),
        kb::REGISTER => Some(cmd::REGISTER),
        kb::MY_LINK => Some(cmd::MY_LINK),
        kb::SET_LINK => Some(cmd::SET_LINK),
        kb::FEEDBACK => Some(cmd::FEEDBACK),
        kb::LOGOUT => Some(cmd::LOGOUT),
        kb::ADMIN_USERS => Some(cmd::USERS),
        kb::ADMIN_ADD => Some(cmd::ADD_USER),
        kb::ADMIN_EDIT => Some(cmd::EDIT_USER),
        kb::ADMIN_DELETE => Some(cmd::DELETE_USER),
        kb::ADMIN_BROADCAST => Some(cmd::BROADCAST),
        kb::ADMIN_DIRECT => Some(cmd::DIRECT),
        kb::ADMIN_LINKS_CHANNEL => Some(cmd::LINKS_CHANNEL),
        kb::ADMIN_FEEDBACK_CHANNEL => Some(cmd::FEEDBACK_CHANNEL),
        kb::ADMIN_BUTTONS => Some(cmd::BUTTONS),
        kb::BTN_ADD => Some(cmd::ADD_BUTTON),
        kb::BTN_LIST => Some(cmd::LIST_BUTTONS),
        kb::BTN_EDIT => Some(cmd::EDIT_BUTTON),
        kb::BTN_DELETE => Some(cmd::DELETE_BUTTON),
        kb::BTN_TOGGLE => Some(cmd::TOGGLE_BUTTON),
        kb::BTN_BACK => Some(cmd::ADMIN),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> MessageRef {
        MessageRef {
            chat_id: ChatId(1),
            message_id: MessageId(1),
        }
    }

    #[test]
    fn slash_commands_are_parsed_with_bot_suffix() {
        let ev = event_for_text("/Login@MyBot", origin());
        let Event::Command { name, args } = ev else {
            panic!("expected command");
        };
        assert_eq!(name, "login");
        assert_eq!(args, "");
    }

    #[test]
    fn cancel_label_and_command_both_cancel() {
        assert!(matches!(event_for_text(kb::CANCEL, origin()), Event::Cancel));
        assert!(matches!(event_for_text("/cancel", origin()), Event::Cancel));
    }

    #[test]
    fn static_labels_map_to_commands() {
        let ev = event_for_text(kb::ADMIN_BROADCAST, origin());
        let Event::Command { name, .. } = ev else {
            panic!("expected command");
        };
        assert_eq!(name, cmd::BROADCAST);
    }

    #[test]
    fn other_text_stays_text() {
        let ev = event_for_text("Shop", origin());
        assert!(matches!(ev, Event::Text { .. }));
    }
}
