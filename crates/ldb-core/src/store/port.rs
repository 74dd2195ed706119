use async_trait::async_trait;

use crate::{
    domain::{Account, AccountId, ButtonId, ChannelKind, CustomButton, UserId},
    Result,
};

/// Credential store port: account records, the channel directory and the
/// custom button table.
///
/// Uniqueness-sensitive mutations (`create`, `update_login`) report a
/// violation as `Ok(false)` rather than an error so callers can surface it as
/// a user-facing conflict. Button name uniqueness is enforced here, not in
/// the engine.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_identity(&self, identity: UserId) -> Result<Option<Account>>;
    async fn find_by_login(&self, login: &str) -> Result<Option<Account>>;
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    async fn create(
        &self,
        login: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> Result<bool>;

    /// Bind a platform identity to an account. The identity is unbound from
    /// any other account first (overwrite semantics, never a merge).
    async fn bind_identity(
        &self,
        id: AccountId,
        identity: UserId,
        display_name: Option<&str>,
    ) -> Result<()>;

    async fn unbind_identity(&self, id: AccountId) -> Result<()>;

    async fn update_link(&self, id: AccountId, link: &str) -> Result<()>;
    async fn update_login(&self, id: AccountId, new_login: &str) -> Result<bool>;
    async fn update_password(&self, id: AccountId, new_hash: &str) -> Result<bool>;
    async fn delete(&self, id: AccountId) -> Result<bool>;
    async fn list_all(&self) -> Result<Vec<Account>>;

    async fn get_channel(&self, kind: ChannelKind) -> Result<Option<String>>;
    async fn set_channel(&self, kind: ChannelKind, channel: &str) -> Result<bool>;

    async fn create_button(&self, name: &str, url: &str) -> Result<ButtonId>;
    async fn list_buttons(&self, active_only: bool) -> Result<Vec<CustomButton>>;
    async fn get_button(&self, id: ButtonId) -> Result<Option<CustomButton>>;
    async fn update_button(
        &self,
        id: ButtonId,
        name: Option<&str>,
        url: Option<&str>,
    ) -> Result<bool>;
    async fn toggle_button(&self, id: ButtonId) -> Result<bool>;
    async fn delete_button(&self, id: ButtonId) -> Result<bool>;
}
