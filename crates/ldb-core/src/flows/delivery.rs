//! Administrator delivery flows: broadcast to all linked accounts, or a
//! direct message to one account. Both hand the payload to the broadcast
//! engine; the flow owns recipient resolution and the final tally report.

use crate::{
    domain::{AccountId, Subject, UserId},
    engine::Engine,
    flows, keyboards,
    messaging::types::Event,
    session::FlowState,
    Error, Result,
};

// ============== Broadcast to all ==============

pub(crate) async fn begin_broadcast(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;
    eng.sessions
        .begin(subject.id, FlowState::BroadcastContent)
        .await;
    eng.say_kb(
        subject,
        "Send the content to broadcast to every linked account.\nText or media.",
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn broadcast_content(
    eng: &Engine,
    subject: &Subject,
    event: &Event,
) -> Result<()> {
    let content = flows::content_of(event)?;

    // Snapshot the recipient set now: every bound identity except the
    // initiator. The run completes over this snapshot.
    let recipients: Vec<UserId> = eng
        .store
        .list_all()
        .await?
        .into_iter()
        .filter_map(|a| a.identity)
        .filter(|id| *id != subject.id)
        .collect();

    eng.sessions.clear(subject.id).await;

    if recipients.is_empty() {
        return eng
            .say_kb(
                subject,
                "Nobody to deliver to: no other linked accounts.",
                keyboards::admin(),
            )
            .await;
    }

    let progress = eng
        .gateway
        .send_text(
            subject.chat.into(),
            &format!("📢 Sending… 0/{}", recipients.len()),
        )
        .await
        .ok();

    let report = eng.broadcaster.run(&content, &recipients, progress).await;

    eng.say_kb(
        subject,
        &format!(
            "📢 Broadcast finished.\n✅ Delivered: {}\n❌ Failed: {}",
            report.sent, report.failed
        ),
        keyboards::admin(),
    )
    .await
}

// ============== Direct message ==============

pub(crate) async fn begin_direct(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;
    eng.sessions.begin(subject.id, FlowState::DirectTarget).await;
    eng.say_kb(
        subject,
        "Send the account id of the recipient:",
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn direct_target(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let raw = flows::text_input(event)?;
    let id = raw
        .parse::<i64>()
        .map(AccountId)
        .map_err(|_| Error::Validation("Send a numeric account id.".to_string()))?;

    let Some(account) = eng.store.find_by_id(id).await? else {
        return Err(Error::NotFound(format!("no account with id {}", id.0)));
    };

    eng.sessions.put(subject.id, "target", id.0.to_string()).await;
    eng.sessions.advance(subject.id, FlowState::DirectContent).await;
    eng.say(
        subject,
        &format!("Send the message for '{}'. Text or media.", account.login),
    )
    .await
}

pub(crate) async fn direct_content(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let content = flows::content_of(event)?;
    let target = eng
        .sessions
        .get(subject.id, "target")
        .await
        .and_then(|v| v.parse::<i64>().ok())
        .map(AccountId)
        .ok_or_else(|| Error::Store("the recipient is missing from the session".to_string()))?;

    let Some(account) = eng.store.find_by_id(target).await? else {
        return Err(Error::NotFound("the account no longer exists".to_string()));
    };

    eng.sessions.clear(subject.id).await;

    // A target without a linked chat is a reported failure, not a delivery
    // attempt.
    let Some(identity) = account.identity else {
        return eng
            .say_kb(
                subject,
                &format!(
                    "📩 Delivery report for '{}':\n✅ Delivered: 0\n❌ Failed: 1 (no linked chat)",
                    account.login
                ),
                keyboards::admin(),
            )
            .await;
    };

    let report = eng.broadcaster.run(&content, &[identity], None).await;
    eng.say_kb(
        subject,
        &format!(
            "📩 Delivery report for '{}':\n✅ Delivered: {}\n❌ Failed: {}",
            account.login, report.sent, report.failed
        ),
        keyboards::admin(),
    )
    .await
}
