//! Administrator flows: account CRUD and channel directory binding.

use tracing::warn;

use crate::{
    domain::{Account, AccountId, ChannelKind, ChatRef, Subject},
    engine::Engine,
    flows, keyboards,
    messaging::types::Event,
    session::FlowState,
    Error, Result,
};

const USER_LIST_CHUNK: usize = 20;

pub(crate) async fn panel(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;
    eng.say_kb(subject, "Admin panel. Choose an action.", keyboards::admin())
        .await
}

// ============== User listing ==============

pub(crate) async fn list_users(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;

    let accounts = eng.store.list_all().await?;
    if accounts.is_empty() {
        return eng.say(subject, "No accounts yet.").await;
    }

    eng.say(subject, &format!("📊 Accounts: {}", accounts.len()))
        .await?;
    for chunk in accounts.chunks(USER_LIST_CHUNK) {
        let text = chunk
            .iter()
            .map(format_account)
            .collect::<Vec<_>>()
            .join("\n");
        eng.say(subject, &text).await?;
    }
    Ok(())
}

fn format_account(account: &Account) -> String {
    let display = match account.display_name.as_deref() {
        Some(name) if !name.trim().is_empty() => format!("{name} ({})", account.login),
        _ => account.login.clone(),
    };
    let bound = if account.identity.is_some() { "✅" } else { "❌" };
    let link = account.link.as_deref().unwrap_or("—");
    format!("🆔 {}: {display} {bound}\n   🔗 {link}", account.id.0)
}

// ============== Add user ==============

pub(crate) async fn begin_add_user(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;
    eng.sessions.begin(subject.id, FlowState::AddUserLogin).await;
    eng.say_kb(
        subject,
        "Enter a login for the new account:",
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn add_user_login(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let login = flows::text_input(event)?;
    if login.chars().count() < eng.cfg.min_login_length {
        return Err(Error::Validation(format!(
            "The login must be at least {} characters. Try another:",
            eng.cfg.min_login_length
        )));
    }
    if eng.store.find_by_login(&login).await?.is_some() {
        return Err(Error::Validation(format!(
            "An account with the login '{login}' already exists. Try another:"
        )));
    }

    eng.sessions.put(subject.id, "login", login.as_str()).await;
    eng.sessions
        .advance(subject.id, FlowState::AddUserPassword)
        .await;
    eng.say(subject, "Now enter a password for the new account:")
        .await
}

pub(crate) async fn add_user_password(
    eng: &Engine,
    subject: &Subject,
    event: &Event,
) -> Result<()> {
    let password = flows::text_input(event)?;
    if password.chars().count() < eng.cfg.min_password_length {
        return Err(Error::Validation(format!(
            "The password must be at least {} characters. Try another:",
            eng.cfg.min_password_length
        )));
    }

    let login = eng
        .sessions
        .get(subject.id, "login")
        .await
        .unwrap_or_default();

    if !eng
        .store
        .create(&login, &flows::hash_password(&password), None)
        .await?
    {
        return Err(Error::Conflict(format!(
            "the login '{login}' is already taken"
        )));
    }

    eng.sessions.clear(subject.id).await;
    eng.say_kb(
        subject,
        &format!("✅ Account created.\nLogin: {login}\nPassword: {password}"),
        keyboards::admin(),
    )
    .await
}

// ============== Edit user ==============

pub(crate) async fn begin_edit_user(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;
    eng.sessions.begin(subject.id, FlowState::EditUserTarget).await;
    eng.say_kb(
        subject,
        "Send the account id to edit (see 👥 Users):",
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn edit_user_target(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let id = parse_account_id(&flows::text_input(event)?)?;
    let Some(account) = eng.store.find_by_id(id).await? else {
        return Err(Error::NotFound(format!("no account with id {}", id.0)));
    };

    eng.sessions.put(subject.id, "target", id.0.to_string()).await;
    eng.sessions.advance(subject.id, FlowState::EditUserAction).await;
    eng.say_kb(
        subject,
        &format!("Editing '{}'. What should change?", account.login),
        keyboards::account_action(),
    )
    .await
}

pub(crate) async fn edit_user_action(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let choice = flows::text_input(event)?;
    match choice.as_str() {
        keyboards::CHOICE_LOGIN => {
            eng.sessions.advance(subject.id, FlowState::EditUserLogin).await;
            eng.say(subject, "Enter the new login:").await
        }
        keyboards::CHOICE_PASSWORD => {
            eng.sessions
                .advance(subject.id, FlowState::EditUserPassword)
                .await;
            eng.say(subject, "Enter the new password:").await
        }
        _ => Err(Error::Validation(
            "Choose one of the options on the keyboard.".to_string(),
        )),
    }
}

pub(crate) async fn edit_user_login(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let login = flows::text_input(event)?;
    if login.chars().count() < eng.cfg.min_login_length {
        return Err(Error::Validation(format!(
            "The login must be at least {} characters. Try another:",
            eng.cfg.min_login_length
        )));
    }

    let target = ctx_target(eng, subject).await?;
    if !eng.store.update_login(target, &login).await? {
        return Err(Error::Conflict(format!(
            "the login '{login}' is already taken"
        )));
    }

    eng.sessions.clear(subject.id).await;
    eng.say_kb(subject, "✅ Login updated.", keyboards::admin()).await
}

pub(crate) async fn edit_user_password(
    eng: &Engine,
    subject: &Subject,
    event: &Event,
) -> Result<()> {
    let password = flows::text_input(event)?;
    if password.chars().count() < eng.cfg.min_password_length {
        return Err(Error::Validation(format!(
            "The password must be at least {} characters. Try another:",
            eng.cfg.min_password_length
        )));
    }

    let target = ctx_target(eng, subject).await?;
    if !eng
        .store
        .update_password(target, &flows::hash_password(&password))
        .await?
    {
        return Err(Error::NotFound("the account no longer exists".to_string()));
    }

    eng.sessions.clear(subject.id).await;
    eng.say_kb(subject, "✅ Password updated.", keyboards::admin())
        .await
}

// ============== Delete user ==============

pub(crate) async fn begin_delete_user(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.require_admin(subject)?;
    eng.sessions
        .begin(subject.id, FlowState::DeleteUserTarget)
        .await;
    eng.say_kb(
        subject,
        "Send the account id to delete:",
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn delete_user_target(
    eng: &Engine,
    subject: &Subject,
    event: &Event,
) -> Result<()> {
    let id = parse_account_id(&flows::text_input(event)?)?;
    if !eng.store.delete(id).await? {
        return Err(Error::NotFound(format!("no account with id {}", id.0)));
    }

    eng.sessions.clear(subject.id).await;
    eng.say_kb(subject, "✅ Account deleted.", keyboards::admin())
        .await
}

// ============== Channel binding ==============

pub(crate) async fn begin_set_channel(
    eng: &Engine,
    subject: &Subject,
    kind: ChannelKind,
) -> Result<()> {
    eng.require_admin(subject)?;
    eng.sessions.begin(subject.id, FlowState::ChannelId).await;
    eng.sessions.put(subject.id, "kind", kind.as_str()).await;
    eng.say_kb(
        subject,
        &format!(
            "Send the {} channel: a numeric chat id or an @handle.\n\
             The bot must be able to post there.",
            kind.as_str()
        ),
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn channel_id(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let raw = flows::text_input(event)?;
    let Some(target) = ChatRef::parse(&raw) else {
        return Err(Error::Validation(
            "Send a numeric chat id or an @handle.".to_string(),
        ));
    };

    let kind = match eng.sessions.get(subject.id, "kind").await.as_deref() {
        Some("feedback") => ChannelKind::Feedback,
        _ => ChannelKind::Links,
    };

    // The only transition gated on an external round trip: post and retract.
    if let Err(err) = eng.gateway.probe(&target).await {
        warn!(channel = %target, %err, "channel probe failed");
        return Err(Error::Transport(
            "the bot could not post to that channel; add it as an administrator and try again"
                .to_string(),
        ));
    }

    if !eng.store.set_channel(kind, &target.to_string()).await? {
        return Err(Error::Store("the channel could not be saved".to_string()));
    }

    eng.sessions.clear(subject.id).await;
    eng.say_kb(
        subject,
        &format!("✅ The {} channel is now {target}.", kind.as_str()),
        keyboards::admin(),
    )
    .await
}

fn parse_account_id(raw: &str) -> Result<AccountId> {
    raw.parse::<i64>()
        .map(AccountId)
        .map_err(|_| Error::Validation("Send a numeric account id.".to_string()))
}

async fn ctx_target(eng: &Engine, subject: &Subject) -> Result<AccountId> {
    eng.sessions
        .get(subject.id, "target")
        .await
        .and_then(|v| v.parse::<i64>().ok())
        .map(AccountId)
        .ok_or_else(|| Error::Store("the edit target is missing from the session".to_string()))
}
