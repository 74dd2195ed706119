//! Administrator flows for the custom navigation buttons.
//!
//! Edit, toggle and delete share the target-id state; the `action` context
//! tag tells them apart.

use crate::{
    domain::{ButtonId, CustomButton, Subject},
    engine::Engine,
    flows, keyboards,
    messaging::types::Event,
    session::FlowState,
    urls, Error, Result,
};

pub(crate) async fn panel(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;
    eng.say_kb(
        subject,
        "Custom button management.",
        keyboards::button_management(),
    )
    .await
}

pub(crate) async fn list(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;

    let buttons = eng.store.list_buttons(false).await?;
    if buttons.is_empty() {
        return eng.say(subject, "No custom buttons yet.").await;
    }

    let text = buttons
        .iter()
        .map(format_button)
        .collect::<Vec<_>>()
        .join("\n");
    eng.say(subject, &text).await
}

fn format_button(button: &CustomButton) -> String {
    let marker = if button.active { "✅" } else { "🚫" };
    format!("🆔 {}: {} {marker}\n   {}", button.id.0, button.name, button.url)
}

// ============== Creation ==============

pub(crate) async fn begin_create(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;
    eng.sessions.begin(subject.id, FlowState::ButtonName).await;
    eng.say_kb(
        subject,
        "Enter a name for the new button:",
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn button_name(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let name = flows::text_input(event)?;
    eng.sessions.put(subject.id, "name", name.as_str()).await;
    eng.sessions.advance(subject.id, FlowState::ButtonUrl).await;
    eng.say(subject, "Now send the button URL:").await
}

pub(crate) async fn button_url(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let url = normalized_url(&flows::text_input(event)?)?;
    let name = eng
        .sessions
        .get(subject.id, "name")
        .await
        .unwrap_or_default();

    // Name collisions surface here as a store conflict, ending the flow.
    eng.store.create_button(&name, &url).await?;

    eng.sessions.clear(subject.id).await;
    eng.say_kb(
        subject,
        &format!("✅ Button '{name}' added ({url})."),
        keyboards::button_management(),
    )
    .await
}

// ============== Edit / toggle / delete ==============

pub(crate) async fn begin_action(eng: &Engine, subject: &Subject, action: &str) -> Result<()> {
    eng.require_admin(subject)?;
    eng.sessions.begin(subject.id, FlowState::ButtonTarget).await;
    eng.sessions.put(subject.id, "action", action).await;
    eng.say_kb(
        subject,
        &format!("Send the button id to {action} (see 📋 List buttons):"),
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn button_target(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let id = parse_button_id(&flows::text_input(event)?)?;
    let Some(button) = eng.store.get_button(id).await? else {
        return Err(Error::NotFound(format!("no button with id {}", id.0)));
    };

    let action = eng
        .sessions
        .get(subject.id, "action")
        .await
        .unwrap_or_default();

    match action.as_str() {
        "toggle" => {
            eng.store.toggle_button(id).await?;
            eng.sessions.clear(subject.id).await;
            let now = if button.active { "disabled" } else { "enabled" };
            eng.say_kb(
                subject,
                &format!("✅ Button '{}' is now {now}.", button.name),
                keyboards::button_management(),
            )
            .await
        }
        "delete" => {
            eng.store.delete_button(id).await?;
            eng.sessions.clear(subject.id).await;
            eng.say_kb(
                subject,
                &format!("🗑 Button '{}' deleted.", button.name),
                keyboards::button_management(),
            )
            .await
        }
        "edit" => {
            eng.sessions.put(subject.id, "button", id.0.to_string()).await;
            eng.sessions
                .advance(subject.id, FlowState::ButtonEditChoice)
                .await;
            eng.say_kb(
                subject,
                &format!("Editing '{}'. What should change?", button.name),
                keyboards::button_edit_choice(),
            )
            .await
        }
        other => Err(Error::Store(format!(
            "unknown button action '{other}' in the session"
        ))),
    }
}

pub(crate) async fn button_edit_choice(
    eng: &Engine,
    subject: &Subject,
    event: &Event,
) -> Result<()> {
    let choice = flows::text_input(event)?;
    match choice.as_str() {
        keyboards::CHOICE_NAME => {
            eng.sessions
                .advance(subject.id, FlowState::ButtonEditName)
                .await;
            eng.say(subject, "Enter the new name:").await
        }
        keyboards::CHOICE_URL => {
            eng.sessions
                .advance(subject.id, FlowState::ButtonEditUrl)
                .await;
            eng.say(subject, "Send the new URL:").await
        }
        _ => Err(Error::Validation(
            "Choose one of the options on the keyboard.".to_string(),
        )),
    }
}

pub(crate) async fn button_edit_name(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let name = flows::text_input(event)?;
    let id = ctx_button(eng, subject).await?;

    if !eng.store.update_button(id, Some(&name), None).await? {
        return Err(Error::NotFound("the button no longer exists".to_string()));
    }

    eng.sessions.clear(subject.id).await;
    eng.say_kb(
        subject,
        &format!("✅ Button renamed to '{name}'."),
        keyboards::button_management(),
    )
    .await
}

pub(crate) async fn button_edit_url(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let url = normalized_url(&flows::text_input(event)?)?;
    let id = ctx_button(eng, subject).await?;

    if !eng.store.update_button(id, None, Some(&url)).await? {
        return Err(Error::NotFound("the button no longer exists".to_string()));
    }

    eng.sessions.clear(subject.id).await;
    eng.say_kb(
        subject,
        &format!("✅ Button URL updated: {url}"),
        keyboards::button_management(),
    )
    .await
}

fn normalized_url(raw: &str) -> Result<String> {
    let url = urls::normalize(raw);
    if !urls::is_valid(&url) {
        return Err(Error::Validation(
            "That doesn't look like a URL. Send something like example.com or @channel:"
                .to_string(),
        ));
    }
    Ok(url)
}

fn parse_button_id(raw: &str) -> Result<ButtonId> {
    raw.parse::<i64>()
        .map(ButtonId)
        .map_err(|_| Error::Validation("Send a numeric button id.".to_string()))
}

async fn ctx_button(eng: &Engine, subject: &Subject) -> Result<ButtonId> {
    eng.sessions
        .get(subject.id, "button")
        .await
        .and_then(|v| v.parse::<i64>().ok())
        .map(ButtonId)
        .ok_or_else(|| Error::Store("the button id is missing from the session".to_string()))
}
