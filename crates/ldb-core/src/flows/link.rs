//! Authenticated user flows: the personal link record and messages to staff.

use crate::{
    domain::{Account, ChannelKind, ChatRef, Subject},
    engine::Engine,
    flows, keyboards,
    messaging::types::Event,
    notify::StaffEvent,
    session::FlowState,
    urls, Error, Result,
};

async fn signed_in(eng: &Engine, subject: &Subject) -> Result<Option<Account>> {
    eng.store.find_by_identity(subject.id).await
}

pub(crate) async fn my_link(eng: &Engine, subject: &Subject) -> Result<()> {
    let Some(account) = signed_in(eng, subject).await? else {
        return not_signed_in(eng, subject).await;
    };

    match account.link {
        Some(link) => eng.say(subject, &format!("🔗 Your current link: {link}")).await,
        None => {
            eng.say(
                subject,
                "You have no saved link yet. Use 🔄 Update link to add one.",
            )
            .await
        }
    }
}

pub(crate) async fn begin_set_link(eng: &Engine, subject: &Subject) -> Result<()> {
    if signed_in(eng, subject).await?.is_none() {
        return not_signed_in(eng, subject).await;
    }

    eng.sessions.begin(subject.id, FlowState::SetLink).await;
    eng.say_kb(
        subject,
        "Send your new link or text.\nA service name, a domain or any other text works.",
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn set_link(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let raw = flows::text_input(event)?;
    // Free text is stored as-is; only address-looking values are normalized.
    let value = if urls::looks_urlish(&raw) {
        urls::normalize(&raw)
    } else {
        raw
    };

    let Some(account) = signed_in(eng, subject).await? else {
        return Err(Error::Authorization("you are no longer signed in".to_string()));
    };

    eng.store.update_link(account.id, &value).await?;
    eng.sessions.clear(subject.id).await;

    let markup = flows::home_markup(eng, subject).await;
    eng.say_kb(subject, &format!("✅ Your link was updated: {value}"), markup)
        .await?;

    eng.notifier
        .notify(StaffEvent::LinkUpdated {
            login: account.login,
            link: value,
        })
        .await;
    Ok(())
}

pub(crate) async fn begin_feedback(eng: &Engine, subject: &Subject) -> Result<()> {
    if signed_in(eng, subject).await?.is_none() {
        return not_signed_in(eng, subject).await;
    }

    eng.sessions.begin(subject.id, FlowState::Feedback).await;
    eng.say_kb(
        subject,
        "Write your message to staff. Text or media both work.",
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn feedback(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let Some(origin) = flows::origin_of(event) else {
        return Err(Error::Validation("Please send a message to relay.".to_string()));
    };
    let Some(account) = signed_in(eng, subject).await? else {
        return Err(Error::Authorization("you are no longer signed in".to_string()));
    };

    let channel = eng
        .store
        .get_channel(ChannelKind::Feedback)
        .await?
        .as_deref()
        .and_then(ChatRef::parse)
        .ok_or_else(|| Error::NotFound("the staff inbox is not configured yet".to_string()))?;

    // The header is informational; the relayed copy is what must arrive.
    let _ = eng
        .gateway
        .send_text(channel.clone(), &format!("✉️ Message from {}:", account.login))
        .await;
    eng.gateway.relay_copy(channel, origin).await?;

    eng.sessions.clear(subject.id).await;
    let markup = flows::home_markup(eng, subject).await;
    eng.say_kb(subject, "✅ Your message was passed to staff.", markup)
        .await
}

async fn not_signed_in(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.say_kb(
        subject,
        "❌ You are not signed in. Press Sign in first.",
        keyboards::start(),
    )
    .await
}
