use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    domain::{Account, AccountId, ButtonId, ChannelKind, CustomButton, UserId},
    store::{data::StoreData, port::CredentialStore},
    Error, Result,
};

/// In-memory credential store.
///
/// Process-lifetime only; the file-backed adapter in `ldb-store` is the one
/// wired into the binary. This one backs tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<StoreData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_identity(&self, identity: UserId) -> Result<Option<Account>> {
        Ok(self.inner.lock().await.find_by_identity(identity))
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        Ok(self.inner.lock().await.find_by_login(login))
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.inner.lock().await.find_by_id(id))
    }

    async fn create(
        &self,
        login: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .create(login, password_hash, display_name)
            .is_some())
    }

    async fn bind_identity(
        &self,
        id: AccountId,
        identity: UserId,
        display_name: Option<&str>,
    ) -> Result<()> {
        if self.inner.lock().await.bind_identity(id, identity, display_name) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("account {} does not exist", id.0)))
        }
    }

    async fn unbind_identity(&self, id: AccountId) -> Result<()> {
        self.inner.lock().await.unbind_identity(id);
        Ok(())
    }

    async fn update_link(&self, id: AccountId, link: &str) -> Result<()> {
        if self.inner.lock().await.update_link(id, link) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("account {} does not exist", id.0)))
        }
    }

    async fn update_login(&self, id: AccountId, new_login: &str) -> Result<bool> {
        Ok(self.inner.lock().await.update_login(id, new_login))
    }

    async fn update_password(&self, id: AccountId, new_hash: &str) -> Result<bool> {
        Ok(self.inner.lock().await.update_password(id, new_hash))
    }

    async fn delete(&self, id: AccountId) -> Result<bool> {
        Ok(self.inner.lock().await.delete(id))
    }

    async fn list_all(&self) -> Result<Vec<Account>> {
        Ok(self.inner.lock().await.list_all())
    }

    async fn get_channel(&self, kind: ChannelKind) -> Result<Option<String>> {
        Ok(self.inner.lock().await.get_channel(kind))
    }

    async fn set_channel(&self, kind: ChannelKind, channel: &str) -> Result<bool> {
        Ok(self.inner.lock().await.set_channel(kind, channel))
    }

    async fn create_button(&self, name: &str, url: &str) -> Result<ButtonId> {
        self.inner
            .lock()
            .await
            .create_button(name, url)
            .ok_or_else(|| Error::Conflict(format!("a button named '{name}' already exists")))
    }

    async fn list_buttons(&self, active_only: bool) -> Result<Vec<CustomButton>> {
        Ok(self.inner.lock().await.list_buttons(active_only))
    }

    async fn get_button(&self, id: ButtonId) -> Result<Option<CustomButton>> {
        Ok(self.inner.lock().await.get_button(id))
    }

    async fn update_button(
        &self,
        id: ButtonId,
        name: Option<&str>,
        url: Option<&str>,
    ) -> Result<bool> {
        Ok(self.inner.lock().await.update_button(id, name, url))
    }

    async fn toggle_button(&self, id: ButtonId) -> Result<bool> {
        Ok(self.inner.lock().await.toggle_button(id))
    }

    async fn delete_button(&self, id: ButtonId) -> Result<bool> {
        Ok(self.inner.lock().await.delete_button(id))
    }
}
