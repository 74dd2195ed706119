use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::domain::UserId;

/// Closed set of dialog states. `None` in the session table means idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowState {
    // Sign-in
    LoginCaptcha,
    LoginUsername,
    LoginPassword,

    // Self-registration
    RegisterUsername,
    RegisterPassword,
    RegisterConfirm,

    // Authenticated user
    SetLink,
    Feedback,

    // Admin: account management
    AddUserLogin,
    AddUserPassword,
    EditUserTarget,
    EditUserAction,
    EditUserLogin,
    EditUserPassword,
    DeleteUserTarget,

    // Admin: delivery
    BroadcastContent,
    DirectTarget,
    DirectContent,

    // Admin: channel directory
    ChannelId,

    // Admin: custom buttons. `ButtonTarget` is shared by edit/toggle/delete
    // and disambiguated by the `action` context tag.
    ButtonName,
    ButtonUrl,
    ButtonTarget,
    ButtonEditChoice,
    ButtonEditName,
    ButtonEditUrl,
}

/// Insertion-ordered string map accumulated across the steps of one flow.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowContext {
    entries: Vec<(String, String)>,
}

impl FlowContext {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Merge a value in; an existing key is replaced in place.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug)]
struct SessionEntry {
    state: FlowState,
    context: FlowContext,
    touched: Instant,
}

/// Process-wide session table keyed by subject id.
///
/// The entry as a whole is the unit of consistency: clearing removes state
/// and context together under one lock, so no event can observe a cleared
/// state with stale context. Per-subject step ordering is enforced by
/// `lock_subject`, which every event handler holds for the full step.
pub struct SessionStore {
    inner: Mutex<HashMap<i64, SessionEntry>>,
    locks: SubjectLocks,
    timeout: Option<Duration>,
}

impl SessionStore {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            locks: SubjectLocks::default(),
            timeout,
        }
    }

    pub async fn lock_subject(&self, subject: UserId) -> OwnedMutexGuard<()> {
        self.locks.lock(subject.0).await
    }

    /// Current state, with lazy expiry of abandoned flows.
    pub async fn state(&self, subject: UserId) -> Option<FlowState> {
        let mut map = self.inner.lock().await;
        let entry = map.get(&subject.0)?;
        if let Some(timeout) = self.timeout {
            if entry.touched.elapsed() > timeout {
                map.remove(&subject.0);
                return None;
            }
        }
        Some(entry.state)
    }

    /// Enter the first state of a new flow with a fresh, empty context.
    pub async fn begin(&self, subject: UserId, state: FlowState) {
        let mut map = self.inner.lock().await;
        map.insert(
            subject.0,
            SessionEntry {
                state,
                context: FlowContext::default(),
                touched: Instant::now(),
            },
        );
    }

    /// Move an active flow to its successor state, keeping the context.
    pub async fn advance(&self, subject: UserId, state: FlowState) {
        let mut map = self.inner.lock().await;
        if let Some(entry) = map.get_mut(&subject.0) {
            entry.state = state;
            entry.touched = Instant::now();
        }
    }

    pub async fn put(&self, subject: UserId, key: &str, value: impl Into<String>) {
        let mut map = self.inner.lock().await;
        if let Some(entry) = map.get_mut(&subject.0) {
            entry.context.set(key, value);
        }
    }

    pub async fn get(&self, subject: UserId, key: &str) -> Option<String> {
        let map = self.inner.lock().await;
        map.get(&subject.0)
            .and_then(|e| e.context.get(key))
            .map(|v| v.to_string())
    }

    pub async fn context(&self, subject: UserId) -> FlowContext {
        let map = self.inner.lock().await;
        map.get(&subject.0)
            .map(|e| e.context.clone())
            .unwrap_or_default()
    }

    /// Terminal transition: drop state and context together.
    pub async fn clear(&self, subject: UserId) {
        let mut map = self.inner.lock().await;
        map.remove(&subject.0);
    }
}

/// Per-subject mutex map; guards one full engine step per subject.
#[derive(Default)]
pub struct SubjectLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SubjectLocks {
    pub async fn lock(&self, subject: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(subject)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
