//! The conversation engine: per-subject dispatch of inbound events onto flow
//! step handlers, with the failure policy applied in one place.

use std::sync::Arc;

use tracing::warn;

use crate::{
    broadcast::{BroadcastConfig, Broadcaster},
    config::Config,
    domain::{ChannelKind, Subject},
    flows,
    messaging::{
        port::MessagingGateway,
        types::{Event, Markup},
    },
    notify::Notifier,
    session::{FlowState, SessionStore},
    store::CredentialStore,
    Error, Result,
};

/// Command names the idle dispatcher understands. The gateway adapter maps
/// slash commands and static keyboard labels onto these.
pub mod cmd {
    pub const START: &str = "start";
    pub const LOGIN: &str = "login";
    pub const REGISTER: &str = "register";
    pub const LOGOUT: &str = "logout";
    pub const MY_LINK: &str = "mylink";
    pub const SET_LINK: &str = "setlink";
    pub const FEEDBACK: &str = "feedback";
    pub const ADMIN: &str = "admin";
    pub const USERS: &str = "users";
    pub const ADD_USER: &str = "adduser";
    pub const EDIT_USER: &str = "edituser";
    pub const DELETE_USER: &str = "deluser";
    pub const BROADCAST: &str = "broadcast";
    pub const DIRECT: &str = "direct";
    pub const LINKS_CHANNEL: &str = "linkschannel";
    pub const FEEDBACK_CHANNEL: &str = "feedbackchannel";
    pub const BUTTONS: &str = "buttons";
    pub const ADD_BUTTON: &str = "addbutton";
    pub const LIST_BUTTONS: &str = "listbuttons";
    pub const EDIT_BUTTON: &str = "editbutton";
    pub const DELETE_BUTTON: &str = "delbutton";
    pub const TOGGLE_BUTTON: &str = "togglebutton";
}

pub struct Engine {
    pub(crate) cfg: Arc<Config>,
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) gateway: Arc<dyn MessagingGateway>,
    pub(crate) sessions: SessionStore,
    pub(crate) notifier: Notifier,
    pub(crate) broadcaster: Broadcaster,
}

impl Engine {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<dyn CredentialStore>,
        gateway: Arc<dyn MessagingGateway>,
    ) -> Self {
        let sessions = SessionStore::new(cfg.session_timeout);
        let notifier = Notifier::new(store.clone(), gateway.clone(), cfg.admin_ids.clone());
        let broadcaster = Broadcaster::new(
            gateway.clone(),
            BroadcastConfig {
                pace: cfg.broadcast_pace,
                progress_every: cfg.broadcast_progress_every,
            },
        );
        Self {
            cfg,
            store,
            gateway,
            sessions,
            notifier,
            broadcaster,
        }
    }

    /// Handle one inbound event for one subject.
    ///
    /// The subject's lock is held for the whole step: no two steps of the
    /// same subject's flow run concurrently, while distinct subjects proceed
    /// independently.
    pub async fn handle(&self, subject: &Subject, event: Event) -> Result<()> {
        let _guard = self.sessions.lock_subject(subject.id).await;

        // Cancel wins over everything, before any state-specific validation.
        if matches!(event, Event::Cancel) {
            return flows::cancel(self, subject).await;
        }

        match self.sessions.state(subject.id).await {
            Some(state) => self.dispatch_step(subject, state, event).await,
            None => self.dispatch_idle(subject, event).await,
        }
    }

    async fn dispatch_step(
        &self,
        subject: &Subject,
        state: FlowState,
        event: Event,
    ) -> Result<()> {
        // No step handler matches a command: fall through to idle-level
        // dispatch, replacing the abandoned flow.
        if let Event::Command { .. } = &event {
            self.sessions.clear(subject.id).await;
            return self.dispatch_idle(subject, event).await;
        }

        let outcome = match state {
            FlowState::LoginCaptcha => flows::auth::login_captcha(self, subject, &event).await,
            FlowState::LoginUsername => flows::auth::login_username(self, subject, &event).await,
            FlowState::LoginPassword => flows::auth::login_password(self, subject, &event).await,
            FlowState::RegisterUsername => {
                flows::auth::register_username(self, subject, &event).await
            }
            FlowState::RegisterPassword => {
                flows::auth::register_password(self, subject, &event).await
            }
            FlowState::RegisterConfirm => flows::auth::register_confirm(self, subject, &event).await,
            FlowState::SetLink => flows::link::set_link(self, subject, &event).await,
            FlowState::Feedback => flows::link::feedback(self, subject, &event).await,
            FlowState::AddUserLogin => flows::admin::add_user_login(self, subject, &event).await,
            FlowState::AddUserPassword => {
                flows::admin::add_user_password(self, subject, &event).await
            }
            FlowState::EditUserTarget => flows::admin::edit_user_target(self, subject, &event).await,
            FlowState::EditUserAction => flows::admin::edit_user_action(self, subject, &event).await,
            FlowState::EditUserLogin => flows::admin::edit_user_login(self, subject, &event).await,
            FlowState::EditUserPassword => {
                flows::admin::edit_user_password(self, subject, &event).await
            }
            FlowState::DeleteUserTarget => {
                flows::admin::delete_user_target(self, subject, &event).await
            }
            FlowState::BroadcastContent => {
                flows::delivery::broadcast_content(self, subject, &event).await
            }
            FlowState::DirectTarget => flows::delivery::direct_target(self, subject, &event).await,
            FlowState::DirectContent => flows::delivery::direct_content(self, subject, &event).await,
            FlowState::ChannelId => flows::admin::channel_id(self, subject, &event).await,
            FlowState::ButtonName => flows::buttons::button_name(self, subject, &event).await,
            FlowState::ButtonUrl => flows::buttons::button_url(self, subject, &event).await,
            FlowState::ButtonTarget => flows::buttons::button_target(self, subject, &event).await,
            FlowState::ButtonEditChoice => {
                flows::buttons::button_edit_choice(self, subject, &event).await
            }
            FlowState::ButtonEditName => {
                flows::buttons::button_edit_name(self, subject, &event).await
            }
            FlowState::ButtonEditUrl => flows::buttons::button_edit_url(self, subject, &event).await,
        };

        self.settle(subject, outcome).await
    }

    async fn dispatch_idle(&self, subject: &Subject, event: Event) -> Result<()> {
        let outcome = match event {
            Event::Command { name, args } => self.dispatch_command(subject, &name, &args).await,
            Event::Text { text, .. } => {
                flows::custom_button_reply(self, subject, text.trim()).await
            }
            Event::Media { .. } => {
                self.say(subject, "Send a text message, or use the keyboard buttons.")
                    .await
            }
            Event::Cancel => flows::cancel(self, subject).await,
        };
        self.settle(subject, outcome).await
    }

    async fn dispatch_command(&self, subject: &Subject, name: &str, args: &str) -> Result<()> {
        let _ = args; // no command takes inline arguments yet
        match name {
            cmd::START => flows::auth::start(self, subject).await,
            cmd::LOGIN => flows::auth::begin_login(self, subject).await,
            cmd::REGISTER => flows::auth::begin_register(self, subject).await,
            cmd::LOGOUT => flows::auth::logout(self, subject).await,
            cmd::MY_LINK => flows::link::my_link(self, subject).await,
            cmd::SET_LINK => flows::link::begin_set_link(self, subject).await,
            cmd::FEEDBACK => flows::link::begin_feedback(self, subject).await,
            cmd::ADMIN => flows::admin::panel(self, subject).await,
            cmd::USERS => flows::admin::list_users(self, subject).await,
            cmd::ADD_USER => flows::admin::begin_add_user(self, subject).await,
            cmd::EDIT_USER => flows::admin::begin_edit_user(self, subject).await,
            cmd::DELETE_USER => flows::admin::begin_delete_user(self, subject).await,
            cmd::BROADCAST => flows::delivery::begin_broadcast(self, subject).await,
            cmd::DIRECT => flows::delivery::begin_direct(self, subject).await,
            cmd::LINKS_CHANNEL => {
                flows::admin::begin_set_channel(self, subject, ChannelKind::Links).await
            }
            cmd::FEEDBACK_CHANNEL => {
                flows::admin::begin_set_channel(self, subject, ChannelKind::Feedback).await
            }
            cmd::BUTTONS => flows::buttons::panel(self, subject).await,
            cmd::ADD_BUTTON => flows::buttons::begin_create(self, subject).await,
            cmd::LIST_BUTTONS => flows::buttons::list(self, subject).await,
            cmd::EDIT_BUTTON => flows::buttons::begin_action(self, subject, "edit").await,
            cmd::DELETE_BUTTON => flows::buttons::begin_action(self, subject, "delete").await,
            cmd::TOGGLE_BUTTON => flows::buttons::begin_action(self, subject, "toggle").await,
            _ => {
                self.say(subject, "Unknown command. Use the keyboard buttons.")
                    .await
            }
        }
    }

    /// Apply the failure policy to a step outcome: validation failures
    /// re-prompt in place; everything else terminates the flow with one
    /// human-readable message and no automatic retry.
    async fn settle(&self, subject: &Subject, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => Ok(()),
            Err(Error::Validation(msg)) => self.say(subject, &msg).await,
            Err(err) => {
                self.sessions.clear(subject.id).await;
                warn!(subject = subject.id.0, %err, "flow terminated");
                let markup = flows::home_markup(self, subject).await;
                self.say_kb(subject, &describe_failure(&err), markup).await
            }
        }
    }

    // ============== Helpers shared with flows ==============

    pub(crate) async fn say(&self, subject: &Subject, text: &str) -> Result<()> {
        self.gateway
            .send_text(subject.chat.into(), text)
            .await
            .map(|_| ())
    }

    pub(crate) async fn say_kb(&self, subject: &Subject, text: &str, markup: Markup) -> Result<()> {
        self.gateway
            .send_keyboard(subject.chat.into(), text, markup)
            .await
            .map(|_| ())
    }

    pub(crate) fn require_admin(&self, subject: &Subject) -> Result<()> {
        if self.cfg.is_admin(subject.id.0) {
            Ok(())
        } else {
            Err(Error::Authorization(
                "this action is restricted to administrators".to_string(),
            ))
        }
    }
}

fn describe_failure(err: &Error) -> String {
    match err {
        Error::Authorization(msg) => format!("⛔ Sorry, {msg}."),
        Error::NotFound(msg) => format!("❌ {msg}. The operation was aborted."),
        Error::Conflict(msg) => format!("❌ {msg}. Start over with a different value."),
        Error::Transport(msg) => format!("❌ {msg}."),
        _ => "❌ Something went wrong. The operation was aborted.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::domain::{
        AccountId, ChatId, ChatRef, MediaContent, MessageId, MessageRef, UserId,
    };
    use crate::flows::hash_password;
    use crate::store::{memory::MemoryStore, CredentialStore as _};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const ADMIN: i64 = 1000;

    #[derive(Default)]
    struct FakeGateway {
        /// Chronological log of every outgoing text, keyboard and media send.
        log: Mutex<Vec<(ChatRef, String)>>,
        keyboards: Mutex<Vec<(ChatRef, String, Markup)>>,
        copies: Mutex<Vec<(ChatRef, MessageRef)>>,
        probes: Mutex<Vec<ChatRef>>,
        fail_probe: bool,
    }

    impl FakeGateway {
        fn msg_ref() -> MessageRef {
            MessageRef {
                chat_id: ChatId(0),
                message_id: MessageId(0),
            }
        }

        fn all_texts(&self) -> Vec<(ChatRef, String)> {
            self.log.lock().unwrap().clone()
        }

        fn last_text(&self) -> String {
            self.all_texts()
                .last()
                .map(|(_, t)| t.clone())
                .unwrap_or_default()
        }

        fn sent_to(&self, chat: i64) -> Vec<String> {
            self.all_texts()
                .into_iter()
                .filter(|(to, _)| *to == ChatRef::Id(chat))
                .map(|(_, t)| t)
                .collect()
        }
    }

    #[async_trait]
    impl MessagingGateway for FakeGateway {
        async fn send_text(&self, to: ChatRef, text: &str) -> Result<MessageRef> {
            self.log.lock().unwrap().push((to, text.to_string()));
            Ok(Self::msg_ref())
        }

        async fn send_keyboard(
            &self,
            to: ChatRef,
            text: &str,
            markup: Markup,
        ) -> Result<MessageRef> {
            self.log
                .lock()
                .unwrap()
                .push((to.clone(), text.to_string()));
            self.keyboards
                .lock()
                .unwrap()
                .push((to, text.to_string(), markup));
            Ok(Self::msg_ref())
        }

        async fn edit_text(&self, _msg: MessageRef, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_media(&self, to: ChatRef, media: &MediaContent) -> Result<MessageRef> {
            self.log
                .lock()
                .unwrap()
                .push((to, format!("media:{}", media.file_ref)));
            Ok(Self::msg_ref())
        }

        async fn probe(&self, channel: &ChatRef) -> Result<()> {
            if self.fail_probe {
                return Err(Error::Transport("no posting rights".to_string()));
            }
            self.probes.lock().unwrap().push(channel.clone());
            Ok(())
        }

        async fn relay_copy(&self, to: ChatRef, origin: MessageRef) -> Result<()> {
            self.copies.lock().unwrap().push((to, origin));
            Ok(())
        }
    }

    struct Harness {
        engine: Engine,
        gateway: Arc<FakeGateway>,
        store: Arc<MemoryStore>,
    }

    fn harness() -> Harness {
        harness_with(FakeGateway::default())
    }

    fn harness_with(gateway: FakeGateway) -> Harness {
        let cfg = Arc::new(config::test_config());
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(gateway);
        let engine = Engine::new(cfg, store.clone(), gateway.clone());
        Harness {
            engine,
            gateway,
            store,
        }
    }

    fn subject(id: i64) -> Subject {
        Subject {
            id: UserId(id),
            chat: ChatId(id),
            display_name: None,
        }
    }

    fn text(t: &str) -> Event {
        Event::Text {
            text: t.to_string(),
            origin: MessageRef {
                chat_id: ChatId(1),
                message_id: MessageId(99),
            },
        }
    }

    fn command(name: &str) -> Event {
        Event::Command {
            name: name.to_string(),
            args: String::new(),
        }
    }

    async fn seed_account(h: &Harness, login: &str, password: &str) -> AccountId {
        assert!(h
            .store
            .create(login, &hash_password(password), None)
            .await
            .unwrap());
        h.store.find_by_login(login).await.unwrap().unwrap().id
    }

    async fn stored_captcha(h: &Harness, sub: &Subject) -> String {
        h.engine.sessions.get(sub.id, "captcha").await.unwrap()
    }

    // ============== Session invariants ==============

    #[tokio::test]
    async fn idle_event_leaves_context_empty() {
        let h = harness();
        let sub = subject(7);

        h.engine.handle(&sub, text("hello there")).await.unwrap();

        assert_eq!(h.engine.sessions.state(sub.id).await, None);
        assert!(h.engine.sessions.context(sub.id).await.is_empty());
        assert!(!h.gateway.all_texts().is_empty());
    }

    #[tokio::test]
    async fn cancel_from_any_state_clears_to_idle() {
        let h = harness();
        let admin = subject(ADMIN);
        let target = seed_account(&h, "alice", "pw12345").await;

        // Walk deep into the edit flow, then cancel from awaiting-new-password.
        h.engine.handle(&admin, command(cmd::EDIT_USER)).await.unwrap();
        h.engine
            .handle(&admin, text(&target.0.to_string()))
            .await
            .unwrap();
        h.engine
            .handle(&admin, text(crate::keyboards::CHOICE_PASSWORD))
            .await
            .unwrap();
        assert_eq!(
            h.engine.sessions.state(admin.id).await,
            Some(FlowState::EditUserPassword)
        );

        h.engine.handle(&admin, Event::Cancel).await.unwrap();
        assert_eq!(h.engine.sessions.state(admin.id).await, None);
        assert!(h.engine.sessions.context(admin.id).await.is_empty());
        assert!(h.gateway.last_text().contains("cancelled"));
    }

    #[tokio::test]
    async fn command_mid_flow_replaces_the_abandoned_flow() {
        let h = harness();
        let sub = subject(7);

        h.engine.handle(&sub, command(cmd::LOGIN)).await.unwrap();
        assert_eq!(
            h.engine.sessions.state(sub.id).await,
            Some(FlowState::LoginCaptcha)
        );

        h.engine.handle(&sub, command(cmd::REGISTER)).await.unwrap();
        assert_eq!(
            h.engine.sessions.state(sub.id).await,
            Some(FlowState::RegisterUsername)
        );
        assert!(h.engine.sessions.context(sub.id).await.is_empty());
    }

    // ============== Sign-in ==============

    #[tokio::test]
    async fn login_flow_rebinds_identity_from_previous_holder() {
        let h = harness();
        let account = seed_account(&h, "alice", "pw12345").await;
        h.store
            .bind_identity(account, UserId(42), None)
            .await
            .unwrap();

        let sub = subject(7);
        h.engine.handle(&sub, command(cmd::LOGIN)).await.unwrap();
        let code = stored_captcha(&h, &sub).await;
        h.engine.handle(&sub, text(&code)).await.unwrap();
        h.engine.handle(&sub, text("alice")).await.unwrap();
        h.engine.handle(&sub, text("pw12345")).await.unwrap();

        assert_eq!(h.engine.sessions.state(sub.id).await, None);
        let account = h.store.find_by_login("alice").await.unwrap().unwrap();
        assert_eq!(account.identity, Some(UserId(7)));
        assert_eq!(h.store.find_by_identity(UserId(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn wrong_captcha_forces_idle() {
        let h = harness();
        let sub = subject(7);

        h.engine.handle(&sub, command(cmd::LOGIN)).await.unwrap();
        h.engine.handle(&sub, text("definitely-wrong")).await.unwrap();

        assert_eq!(h.engine.sessions.state(sub.id).await, None);
        assert!(h.engine.sessions.context(sub.id).await.is_empty());
        assert!(h.gateway.last_text().contains("didn't match"));
    }

    #[tokio::test]
    async fn wrong_password_forces_idle_with_retry_hint() {
        let h = harness();
        seed_account(&h, "alice", "pw12345").await;

        let sub = subject(7);
        h.engine.handle(&sub, command(cmd::LOGIN)).await.unwrap();
        let code = stored_captcha(&h, &sub).await;
        h.engine.handle(&sub, text(&code)).await.unwrap();
        h.engine.handle(&sub, text("alice")).await.unwrap();
        h.engine.handle(&sub, text("nope")).await.unwrap();

        assert_eq!(h.engine.sessions.state(sub.id).await, None);
        assert!(h.gateway.last_text().contains("Invalid login or password"));
        let account = h.store.find_by_login("alice").await.unwrap().unwrap();
        assert_eq!(account.identity, None);
    }

    // ============== Registration ==============

    #[tokio::test]
    async fn registration_mismatch_returns_to_password_step() {
        let h = harness();
        let sub = subject(7);

        h.engine.handle(&sub, command(cmd::REGISTER)).await.unwrap();
        h.engine.handle(&sub, text("carol")).await.unwrap();
        h.engine.handle(&sub, text("secret1")).await.unwrap();
        h.engine.handle(&sub, text("different")).await.unwrap();

        // Back to the password step, username preserved.
        assert_eq!(
            h.engine.sessions.state(sub.id).await,
            Some(FlowState::RegisterPassword)
        );
        assert_eq!(
            h.engine.sessions.get(sub.id, "login").await.as_deref(),
            Some("carol")
        );

        h.engine.handle(&sub, text("secret2")).await.unwrap();
        h.engine.handle(&sub, text("secret2")).await.unwrap();

        assert_eq!(h.engine.sessions.state(sub.id).await, None);
        let account = h.store.find_by_login("carol").await.unwrap().unwrap();
        assert_eq!(account.identity, Some(UserId(7)));
    }

    #[tokio::test]
    async fn registration_validates_username_in_place() {
        let h = harness();
        seed_account(&h, "taken", "pw12345").await;
        let sub = subject(7);

        h.engine.handle(&sub, command(cmd::REGISTER)).await.unwrap();

        h.engine.handle(&sub, text("ab")).await.unwrap();
        assert_eq!(
            h.engine.sessions.state(sub.id).await,
            Some(FlowState::RegisterUsername)
        );
        assert!(h.gateway.last_text().contains("at least 3"));

        h.engine.handle(&sub, text("taken")).await.unwrap();
        assert_eq!(
            h.engine.sessions.state(sub.id).await,
            Some(FlowState::RegisterUsername)
        );
        assert!(h.gateway.last_text().contains("taken"));
    }

    // ============== Authorization ==============

    #[tokio::test]
    async fn admin_flows_are_gated() {
        let h = harness();
        let sub = subject(7);

        h.engine.handle(&sub, command(cmd::ADD_USER)).await.unwrap();

        assert_eq!(h.engine.sessions.state(sub.id).await, None);
        assert!(h.gateway.last_text().contains("restricted"));
    }

    // ============== Admin edit ==============

    #[tokio::test]
    async fn edit_with_missing_target_reports_not_found_and_idles() {
        let h = harness();
        let admin = subject(ADMIN);

        h.engine.handle(&admin, command(cmd::EDIT_USER)).await.unwrap();
        h.engine.handle(&admin, text("7")).await.unwrap();

        assert_eq!(h.engine.sessions.state(admin.id).await, None);
        assert!(h.gateway.last_text().contains("no account with id 7"));
    }

    #[tokio::test]
    async fn edit_login_conflict_is_fatal_and_reported() {
        let h = harness();
        let admin = subject(ADMIN);
        let target = seed_account(&h, "alice", "pw12345").await;
        seed_account(&h, "bob", "pw12345").await;

        h.engine.handle(&admin, command(cmd::EDIT_USER)).await.unwrap();
        h.engine
            .handle(&admin, text(&target.0.to_string()))
            .await
            .unwrap();
        h.engine
            .handle(&admin, text(crate::keyboards::CHOICE_LOGIN))
            .await
            .unwrap();
        h.engine.handle(&admin, text("bob")).await.unwrap();

        assert_eq!(h.engine.sessions.state(admin.id).await, None);
        assert!(h.gateway.last_text().contains("already taken"));
        // The original login is untouched.
        assert!(h.store.find_by_login("alice").await.unwrap().is_some());
    }

    // ============== Custom buttons ==============

    #[tokio::test]
    async fn button_creation_normalizes_url_and_assigns_order() {
        let h = harness();
        let admin = subject(ADMIN);

        h.engine.handle(&admin, command(cmd::ADD_BUTTON)).await.unwrap();
        h.engine.handle(&admin, text("Shop")).await.unwrap();
        h.engine.handle(&admin, text("example.com")).await.unwrap();

        let buttons = h.store.list_buttons(false).await.unwrap();
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].url, "https://example.com");
        assert_eq!(buttons[0].sort_order, 1);

        h.engine.handle(&admin, command(cmd::ADD_BUTTON)).await.unwrap();
        h.engine.handle(&admin, text("News")).await.unwrap();
        h.engine.handle(&admin, text("@newsfeed")).await.unwrap();

        let buttons = h.store.list_buttons(false).await.unwrap();
        assert_eq!(buttons[1].url, "https://t.me/newsfeed");
        assert_eq!(buttons[1].sort_order, 2);
    }

    #[tokio::test]
    async fn custom_button_label_answers_with_its_link() {
        let h = harness();
        let admin = subject(ADMIN);
        h.engine.handle(&admin, command(cmd::ADD_BUTTON)).await.unwrap();
        h.engine.handle(&admin, text("Shop")).await.unwrap();
        h.engine.handle(&admin, text("example.com")).await.unwrap();

        let sub = subject(7);
        h.engine.handle(&sub, text("Shop")).await.unwrap();

        let keyboards = h.gateway.keyboards.lock().unwrap();
        let (_, _, markup) = keyboards.last().unwrap();
        let Markup::Links(links) = markup else {
            panic!("expected an inline link, got {markup:?}");
        };
        assert_eq!(links[0].url, "https://example.com");
    }

    // ============== Delivery ==============

    #[tokio::test]
    async fn broadcast_all_excludes_initiator_and_unbound_accounts() {
        let h = harness();
        let admin = subject(ADMIN);

        let a = seed_account(&h, "admin", "pw12345").await;
        h.store.bind_identity(a, UserId(ADMIN), None).await.unwrap();
        let b = seed_account(&h, "bob", "pw12345").await;
        h.store.bind_identity(b, UserId(1), None).await.unwrap();
        let c = seed_account(&h, "carol", "pw12345").await;
        h.store.bind_identity(c, UserId(2), None).await.unwrap();
        seed_account(&h, "dave", "pw12345").await; // never signed in

        h.engine.handle(&admin, command(cmd::BROADCAST)).await.unwrap();
        h.engine.handle(&admin, text("hello everyone")).await.unwrap();

        let deliveries: Vec<i64> = h
            .gateway
            .all_texts()
            .into_iter()
            .filter(|(_, t)| t == "hello everyone")
            .map(|(to, _)| match to {
                ChatRef::Id(n) => n,
                ChatRef::Handle(_) => panic!("unexpected handle recipient"),
            })
            .collect();
        assert_eq!(deliveries, vec![1, 2]);

        let report = h.gateway.last_text();
        assert!(report.contains("Delivered: 2"));
        assert!(report.contains("Failed: 0"));
        assert_eq!(h.engine.sessions.state(admin.id).await, None);
    }

    #[tokio::test]
    async fn direct_to_unbound_account_reports_failure_without_delivery() {
        let h = harness();
        let admin = subject(ADMIN);
        let target = seed_account(&h, "carol", "pw12345").await;

        h.engine.handle(&admin, command(cmd::DIRECT)).await.unwrap();
        h.engine
            .handle(&admin, text(&target.0.to_string()))
            .await
            .unwrap();
        h.engine.handle(&admin, text("are you there?")).await.unwrap();

        // The payload never reached the gateway.
        assert!(h
            .gateway
            .all_texts()
            .iter()
            .all(|(_, t)| t != "are you there?"));
        let report = h.gateway.last_text();
        assert!(report.contains("Delivered: 0"));
        assert!(report.contains("Failed: 1"));
        assert_eq!(h.engine.sessions.state(admin.id).await, None);
    }

    #[tokio::test]
    async fn direct_delivers_media_to_bound_account() {
        let h = harness();
        let admin = subject(ADMIN);
        let target = seed_account(&h, "bob", "pw12345").await;
        h.store.bind_identity(target, UserId(5), None).await.unwrap();

        h.engine.handle(&admin, command(cmd::DIRECT)).await.unwrap();
        h.engine
            .handle(&admin, text(&target.0.to_string()))
            .await
            .unwrap();
        h.engine
            .handle(
                &admin,
                Event::Media {
                    media: MediaContent {
                        kind: crate::domain::MediaKind::Photo,
                        file_ref: "photo-1".to_string(),
                        caption: None,
                    },
                    origin: MessageRef {
                        chat_id: ChatId(ADMIN),
                        message_id: MessageId(5),
                    },
                },
            )
            .await
            .unwrap();

        assert_eq!(h.gateway.sent_to(5), vec!["media:photo-1".to_string()]);
        assert!(h.gateway.last_text().contains("Delivered: 1"));
    }

    // ============== Links & feedback ==============

    #[tokio::test]
    async fn set_link_normalizes_and_notifies_staff() {
        let h = harness();
        let account = seed_account(&h, "alice", "pw12345").await;
        h.store.bind_identity(account, UserId(7), None).await.unwrap();

        let sub = subject(7);
        h.engine.handle(&sub, command(cmd::SET_LINK)).await.unwrap();
        h.engine.handle(&sub, text("example.com/alice")).await.unwrap();

        let stored = h.store.find_by_login("alice").await.unwrap().unwrap();
        assert_eq!(stored.link.as_deref(), Some("https://example.com/alice"));

        // No links channel configured: the announcement falls back to admins.
        assert!(h
            .gateway
            .sent_to(ADMIN)
            .iter()
            .any(|t| t.contains("updated their link")));
    }

    #[tokio::test]
    async fn feedback_is_relayed_to_the_configured_channel() {
        let h = harness();
        h.store
            .set_channel(ChannelKind::Feedback, "@staffdesk")
            .await
            .unwrap();
        let account = seed_account(&h, "alice", "pw12345").await;
        h.store.bind_identity(account, UserId(7), None).await.unwrap();

        let sub = subject(7);
        h.engine.handle(&sub, command(cmd::FEEDBACK)).await.unwrap();
        h.engine.handle(&sub, text("please help")).await.unwrap();

        let copies = h.gateway.copies.lock().unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].0, ChatRef::Handle("@staffdesk".to_string()));
        assert_eq!(h.engine.sessions.state(sub.id).await, None);
    }

    // ============== Channel binding ==============

    #[tokio::test]
    async fn channel_binding_persists_after_successful_probe() {
        let h = harness();
        let admin = subject(ADMIN);

        h.engine
            .handle(&admin, command(cmd::LINKS_CHANNEL))
            .await
            .unwrap();
        h.engine.handle(&admin, text("@announcements")).await.unwrap();

        assert_eq!(
            h.store.get_channel(ChannelKind::Links).await.unwrap().as_deref(),
            Some("@announcements")
        );
        assert_eq!(
            h.gateway.probes.lock().unwrap().as_slice(),
            [ChatRef::Handle("@announcements".to_string())]
        );
    }

    #[tokio::test]
    async fn channel_binding_probe_failure_is_fatal() {
        let h = harness_with(FakeGateway {
            fail_probe: true,
            ..FakeGateway::default()
        });
        let admin = subject(ADMIN);

        h.engine
            .handle(&admin, command(cmd::LINKS_CHANNEL))
            .await
            .unwrap();
        h.engine.handle(&admin, text("@announcements")).await.unwrap();

        assert_eq!(h.store.get_channel(ChannelKind::Links).await.unwrap(), None);
        assert_eq!(h.engine.sessions.state(admin.id).await, None);
        assert!(h.gateway.last_text().contains("could not post"));
    }
}
