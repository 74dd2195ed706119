//! File-backed credential store adapter.
//!
//! State lives in memory behind a mutex and is snapshotted to a JSON file on
//! every mutation, so a restart loses nothing. All record invariants are
//! implemented by `ldb_core::store::data::StoreData`; this crate only adds
//! the persistence shell.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use ldb_core::{
    domain::{Account, AccountId, ButtonId, ChannelKind, CustomButton, UserId},
    store::{data::StoreData, port::CredentialStore},
    Error, Result,
};

pub struct FileStore {
    path: PathBuf,
    inner: Mutex<StoreData>,
}

impl FileStore {
    /// Load an existing snapshot, or start empty when the file is absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let data = load_snapshot(&path)?.unwrap_or_default();
        info!(path = %path.display(), accounts = data.list_all().len(), "store opened");
        Ok(Self {
            path,
            inner: Mutex::new(data),
        })
    }

    /// Run a mutation and persist the resulting state.
    async fn mutate<T>(&self, op: impl FnOnce(&mut StoreData) -> T) -> Result<T> {
        let mut data = self.inner.lock().await;
        let out = op(&mut data);
        save_snapshot(&self.path, &data)?;
        Ok(out)
    }

    async fn read<T>(&self, op: impl FnOnce(&StoreData) -> T) -> T {
        let data = self.inner.lock().await;
        op(&data)
    }
}

fn load_snapshot(path: &Path) -> Result<Option<StoreData>> {
    if !path.exists() {
        return Ok(None);
    }
    let txt = std::fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(None);
    }
    let data: StoreData = serde_json::from_str(&txt)?;
    Ok(Some(data))
}

fn save_snapshot(path: &Path, data: &StoreData) -> Result<()> {
    let txt = serde_json::to_string(data)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, txt)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn find_by_identity(&self, identity: UserId) -> Result<Option<Account>> {
        Ok(self.read(|d| d.find_by_identity(identity)).await)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        Ok(self.read(|d| d.find_by_login(login)).await)
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.read(|d| d.find_by_id(id)).await)
    }

    async fn create(
        &self,
        login: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> Result<bool> {
        self.mutate(|d| d.create(login, password_hash, display_name).is_some())
            .await
    }

    async fn bind_identity(
        &self,
        id: AccountId,
        identity: UserId,
        display_name: Option<&str>,
    ) -> Result<()> {
        let found = self
            .mutate(|d| d.bind_identity(id, identity, display_name))
            .await?;
        if found {
            Ok(())
        } else {
            Err(Error::NotFound(format!("account {} does not exist", id.0)))
        }
    }

    async fn unbind_identity(&self, id: AccountId) -> Result<()> {
        self.mutate(|d| d.unbind_identity(id)).await?;
        Ok(())
    }

    async fn update_link(&self, id: AccountId, link: &str) -> Result<()> {
        let found = self.mutate(|d| d.update_link(id, link)).await?;
        if found {
            Ok(())
        } else {
            Err(Error::NotFound(format!("account {} does not exist", id.0)))
        }
    }

    async fn update_login(&self, id: AccountId, new_login: &str) -> Result<bool> {
        self.mutate(|d| d.update_login(id, new_login)).await
    }

    async fn update_password(&self, id: AccountId, new_hash: &str) -> Result<bool> {
        self.mutate(|d| d.update_password(id, new_hash)).await
    }

    async fn delete(&self, id: AccountId) -> Result<bool> {
        self.mutate(|d| d.delete(id)).await
    }

    async fn list_all(&self) -> Result<Vec<Account>> {
        Ok(self.read(|d| d.list_all()).await)
    }

    async fn get_channel(&self, kind: ChannelKind) -> Result<Option<String>> {
        Ok(self.read(|d| d.get_channel(kind)).await)
    }

    async fn set_channel(&self, kind: ChannelKind, channel: &str) -> Result<bool> {
        self.mutate(|d| d.set_channel(kind, channel)).await
    }

    async fn create_button(&self, name: &str, url: &str) -> Result<ButtonId> {
        self.mutate(|d| d.create_button(name, url))
            .await?
            .ok_or_else(|| Error::Conflict(format!("a button named '{name}' already exists")))
    }

    async fn list_buttons(&self, active_only: bool) -> Result<Vec<CustomButton>> {
        Ok(self.read(|d| d.list_buttons(active_only)).await)
    }

    async fn get_button(&self, id: ButtonId) -> Result<Option<CustomButton>> {
        Ok(self.read(|d| d.get_button(id)).await)
    }

    async fn update_button(
        &self,
        id: ButtonId,
        name: Option<&str>,
        url: Option<&str>,
    ) -> Result<bool> {
        self.mutate(|d| d.update_button(id, name, url)).await
    }

    async fn toggle_button(&self, id: ButtonId) -> Result<bool> {
        self.mutate(|d| d.toggle_button(id)).await
    }

    async fn delete_button(&self, id: ButtonId) -> Result<bool> {
        self.mutate(|d| d.delete_button(id)).await
    }
}
