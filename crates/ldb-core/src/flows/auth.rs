//! Sign-in (with captcha gate), self-registration and sign-out.

use crate::{
    captcha,
    domain::Subject,
    engine::Engine,
    flows, keyboards,
    messaging::types::Event,
    notify::StaffEvent,
    session::FlowState,
    Error, Result,
};

pub(crate) async fn start(eng: &Engine, subject: &Subject) -> Result<()> {
    let markup = flows::home_markup(eng, subject).await;
    match eng.store.find_by_identity(subject.id).await? {
        Some(account) => {
            eng.say_kb(
                subject,
                &format!("👋 Welcome back, {}!", account.login),
                markup,
            )
            .await
        }
        None => {
            eng.say_kb(
                subject,
                "👋 Welcome! This bot manages your personal link.\n\n\
                 Sign in with your credentials, or register a new account.",
                markup,
            )
            .await
        }
    }
}

// ============== Sign-in ==============

pub(crate) async fn begin_login(eng: &Engine, subject: &Subject) -> Result<()> {
    // A fresh code per attempt; the previous one is discarded with the session.
    let code = captcha::challenge(eng.cfg.captcha_length);
    eng.sessions.begin(subject.id, FlowState::LoginCaptcha).await;
    eng.sessions.put(subject.id, "captcha", code.as_str()).await;

    eng.say_kb(
        subject,
        &format!(
            "🔐 First, type this code back (without the spaces):\n\n{}",
            captcha::spaced(&code)
        ),
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn login_captcha(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let input = flows::text_input(event)?;
    let expected = eng
        .sessions
        .get(subject.id, "captcha")
        .await
        .unwrap_or_default();

    if !captcha::matches(&expected, &input) {
        eng.sessions.clear(subject.id).await;
        return eng
            .say_kb(
                subject,
                "❌ The code didn't match. Press Sign in to get a new one.",
                keyboards::start(),
            )
            .await;
    }

    eng.sessions.advance(subject.id, FlowState::LoginUsername).await;
    eng.say(subject, "Enter your login:").await
}

pub(crate) async fn login_username(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let login = flows::text_input(event)?;
    eng.sessions.put(subject.id, "login", login.as_str()).await;
    eng.sessions.advance(subject.id, FlowState::LoginPassword).await;
    eng.say(subject, "Now enter your password:").await
}

pub(crate) async fn login_password(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let password = flows::text_input(event)?;
    let login = eng
        .sessions
        .get(subject.id, "login")
        .await
        .unwrap_or_default();

    let account = match eng.store.find_by_login(&login).await? {
        Some(account) if account.password_hash == flows::hash_password(&password) => account,
        _ => return failed_login(eng, subject).await,
    };

    // Rebinding moves the identity here even if it was bound elsewhere.
    eng.store
        .bind_identity(account.id, subject.id, subject.display_name.as_deref())
        .await?;
    eng.sessions.clear(subject.id).await;

    let markup = flows::home_markup(eng, subject).await;
    eng.say_kb(
        subject,
        &format!(
            "✅ Signed in as {}.\nYou can now update your link and message staff.",
            account.login
        ),
        markup,
    )
    .await?;

    eng.notifier
        .notify(StaffEvent::LoginSucceeded {
            login: account.login,
            identity: subject.id,
        })
        .await;
    Ok(())
}

async fn failed_login(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.sessions.clear(subject.id).await;
    eng.say_kb(
        subject,
        "❌ Invalid login or password. Press Sign in to try again.",
        keyboards::start(),
    )
    .await
}

// ============== Registration ==============

pub(crate) async fn begin_register(eng: &Engine, subject: &Subject) -> Result<()> {
    eng.sessions
        .begin(subject.id, FlowState::RegisterUsername)
        .await;
    eng.say_kb(
        subject,
        &format!(
            "Choose a login (at least {} characters):",
            eng.cfg.min_login_length
        ),
        keyboards::cancel_only(),
    )
    .await
}

pub(crate) async fn register_username(
    eng: &Engine,
    subject: &Subject,
    event: &Event,
) -> Result<()> {
    let login = flows::text_input(event)?;
    if login.chars().count() < eng.cfg.min_login_length {
        return Err(Error::Validation(format!(
            "The login must be at least {} characters. Try another:",
            eng.cfg.min_login_length
        )));
    }
    if eng.store.find_by_login(&login).await?.is_some() {
        return Err(Error::Validation(format!(
            "The login '{login}' is taken. Try another:"
        )));
    }

    eng.sessions.put(subject.id, "login", login.as_str()).await;
    eng.sessions
        .advance(subject.id, FlowState::RegisterPassword)
        .await;
    eng.say(
        subject,
        &format!(
            "Choose a password (at least {} characters):",
            eng.cfg.min_password_length
        ),
    )
    .await
}

pub(crate) async fn register_password(
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

    // Only the digest crosses steps; the raw secret is not kept around.
    eng.sessions
        .put(subject.id, "password", flows::hash_password(&password))
        .await;
    eng.sessions
        .advance(subject.id, FlowState::RegisterConfirm)
        .await;
    eng.say(subject, "Repeat the password:").await
}

pub(crate) async fn register_confirm(eng: &Engine, subject: &Subject, event: &Event) -> Result<()> {
    let repeat = flows::text_input(event)?;
    let expected = eng
        .sessions
        .get(subject.id, "password")
        .await
        .unwrap_or_default();

    if flows::hash_password(&repeat) != expected {
        // The one controlled back-edge: retry the password, keep the login.
        eng.sessions
            .advance(subject.id, FlowState::RegisterPassword)
            .await;
        return eng
            .say(subject, "❌ The passwords didn't match. Enter the password again:")
            .await;
    }

    let login = eng
        .sessions
        .get(subject.id, "login")
        .await
        .unwrap_or_default();

    if !eng
        .store
        .create(&login, &expected, subject.display_name.as_deref())
        .await?
    {
        return Err(Error::Conflict(format!(
            "the login '{login}' is already taken"
        )));
    }
    let Some(account) = eng.store.find_by_login(&login).await? else {
        return Err(Error::Store(
            "account vanished right after creation".to_string(),
        ));
    };
    eng.store
        .bind_identity(account.id, subject.id, subject.display_name.as_deref())
        .await?;
    eng.sessions.clear(subject.id).await;

    let markup = flows::home_markup(eng, subject).await;
    eng.say_kb(
        subject,
        &format!("✅ Account '{login}' created. You are signed in."),
        markup,
    )
    .await?;

    eng.notifier
        .notify(StaffEvent::Registered {
            login,
            identity: subject.id,
        })
        .await;
    Ok(())
}

// ============== Sign-out ==============

pub(crate) async fn logout(eng: &Engine, subject: &Subject) -> Result<()> {
    match eng.store.find_by_identity(subject.id).await? {
        None => {
            eng.say_kb(subject, "You are not signed in.", keyboards::start())
                .await
        }
        Some(account) => {
            eng.store.unbind_identity(account.id).await?;
            eng.say_kb(subject, "You have signed out.", keyboards::start())
                .await
        }
    }
}
