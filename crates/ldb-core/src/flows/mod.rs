//! Step handlers for every dialog flow, grouped by area. The engine owns
//! dispatch; these functions own validation, context updates and finalize
//! effects.

pub mod admin;
pub mod auth;
pub mod buttons;
pub mod delivery;
pub mod link;

use sha2::{Digest, Sha256};

use crate::{
    domain::{Content, MessageRef, Subject},
    engine::Engine,
    keyboards,
    messaging::types::{Event, InlineLink, Markup},
    urls, Error, Result,
};

/// Extract trimmed text from an event; anything else is a validation failure.
pub(crate) fn text_input(event: &Event) -> Result<String> {
    let Event::Text { text, .. } = event else {
        return Err(Error::Validation("Please reply with text.".to_string()));
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::Validation(
            "The value cannot be empty. Try again.".to_string(),
        ));
    }
    Ok(text.to_string())
}

/// Extract deliverable content (text or media) from an event.
pub(crate) fn content_of(event: &Event) -> Result<Content> {
    match event {
        Event::Text { text, .. } => {
            let text = text.trim();
            if text.is_empty() {
                return Err(Error::Validation(
                    "The message cannot be empty. Try again.".to_string(),
                ));
            }
            Ok(Content::Text(text.to_string()))
        }
        Event::Media { media, .. } => Ok(Content::Media(media.clone())),
        _ => Err(Error::Validation(
            "Send a text or media message.".to_string(),
        )),
    }
}

pub(crate) fn origin_of(event: &Event) -> Option<MessageRef> {
    match event {
        Event::Text { origin, .. } | Event::Media { origin, .. } => Some(*origin),
        _ => None,
    }
}

/// Universal cancel: unconditionally back to idle, context dropped.
pub(crate) async fn cancel(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.sessions.clear(subject.id).await;
    let markup = home_markup(eng, subject).await;
    eng.say_kb(subject, "Action cancelled.", markup).await
}

/// Keyboard matching the subject's role; best-effort on store errors.
pub(crate) async fn home_markup(eng: &Engine, subject: &Subject) -> Markup {
    if eng.cfg.is_admin(subject.id.0) {
        return keyboards::admin();
    }
    match eng.store.find_by_identity(subject.id).await {
        Ok(Some(_)) => {
            let buttons = eng.store.list_buttons(true).await.unwrap_or_default();
            keyboards::main(&buttons)
        }
        _ => keyboards::start(),
    }
}

/// Idle free text: consult the dynamic custom-button table before giving up.
pub(crate) async fn custom_button_reply(eng: &Engine, subject: &Subject, text: &str) -> Result<()> {
    let buttons = eng.store.list_buttons(true).await?;
    if let Some(button) = buttons.iter().find(|b| b.name == text) {
        let links = vec![InlineLink {
            label: urls::display_name(&button.url),
            url: button.url.clone(),
        }];
        return eng.say_kb(subject, &button.name, Markup::Links(links)).await;
    }

    eng.say(
        subject,
        "I didn't understand that. Use the keyboard buttons, or /start.",
    )
    .await
}

/// Digest used for stored secrets; verification compares digests.
pub(crate) fn hash_password(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}
