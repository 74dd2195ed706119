//! Plain-data store state shared by the in-memory adapter and the file-backed
//! adapter in `ldb-store`. All invariants (identity 1:1, button name
//! uniqueness, sort order assignment) live here so every adapter behaves the
//! same way.

use serde::{Deserialize, Serialize};

use crate::domain::{Account, AccountId, ButtonId, ChannelKind, CustomButton, UserId};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreData {
    accounts: Vec<Account>,
    next_account_id: i64,
    channels: Vec<(ChannelKind, String)>,
    buttons: Vec<CustomButton>,
    next_button_id: i64,
}

impl StoreData {
    // ============== Accounts ==============

    pub fn find_by_identity(&self, identity: UserId) -> Option<Account> {
        self.accounts
            .iter()
            .find(|a| a.identity == Some(identity))
            .cloned()
    }

    pub fn find_by_login(&self, login: &str) -> Option<Account> {
        self.accounts.iter().find(|a| a.login == login).cloned()
    }

    pub fn find_by_id(&self, id: AccountId) -> Option<Account> {
        self.accounts.iter().find(|a| a.id == id).cloned()
    }

    /// Returns the new account id, or `None` on a login collision.
    pub fn create(
        &mut self,
        login: &str,
        password_hash: &str,
        display_name: Option<&str>,
    ) -> Option<AccountId> {
        if self.accounts.iter().any(|a| a.login == login) {
            return None;
        }
        self.next_account_id += 1;
        let id = AccountId(self.next_account_id);
        self.accounts.push(Account {
            id,
            login: login.to_string(),
            password_hash: password_hash.to_string(),
            identity: None,
            link: None,
            display_name: display_name.map(|s| s.to_string()),
        });
        Some(id)
    }

    /// Bind `identity` to the account, unbinding it from any other account
    /// first. An identity maps to at most one account at any time.
    pub fn bind_identity(
        &mut self,
        id: AccountId,
        identity: UserId,
        display_name: Option<&str>,
    ) -> bool {
        for account in &mut self.accounts {
            if account.id != id && account.identity == Some(identity) {
                account.identity = None;
            }
        }
        let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        account.identity = Some(identity);
        if let Some(name) = display_name {
            account.display_name = Some(name.to_string());
        }
        true
    }

    pub fn unbind_identity(&mut self, id: AccountId) -> bool {
        let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        account.identity = None;
        true
    }

    pub fn update_link(&mut self, id: AccountId, link: &str) -> bool {
        let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        account.link = Some(link.to_string());
        true
    }

    /// Returns `false` on a login collision or a missing account.
    pub fn update_login(&mut self, id: AccountId, new_login: &str) -> bool {
        if self.accounts.iter().any(|a| a.id != id && a.login == new_login) {
            return false;
        }
        let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        account.login = new_login.to_string();
        true
    }

    pub fn update_password(&mut self, id: AccountId, new_hash: &str) -> bool {
        let Some(account) = self.accounts.iter_mut().find(|a| a.id == id) else {
            return false;
        };
        account.password_hash = new_hash.to_string();
        true
    }

    pub fn delete(&mut self, id: AccountId) -> bool {
        let before = self.accounts.len();
        self.accounts.retain(|a| a.id != id);
        self.accounts.len() != before
    }

    pub fn list_all(&self) -> Vec<Account> {
        self.accounts.clone()
    }

    // ============== Channel directory ==============

    pub fn get_channel(&self, kind: ChannelKind) -> Option<String> {
        self.channels
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
    }

    /// Upsert: at most one directory entry per kind.
    pub fn set_channel(&mut self, kind: ChannelKind, channel: &str) -> bool {
        match self.channels.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = channel.to_string(),
            None => self.channels.push((kind, channel.to_string())),
        }
        true
    }

    // ============== Custom buttons ==============

    /// Returns the new button id, or `None` on a name collision among all
    /// (active and inactive) buttons. Sort order is max+1.
    pub fn create_button(&mut self, name: &str, url: &str) -> Option<ButtonId> {
        if self.buttons.iter().any(|b| b.name == name) {
            return None;
        }
        let max_order = self.buttons.iter().map(|b| b.sort_order).max().unwrap_or(0);
        self.next_button_id += 1;
        let id = ButtonId(self.next_button_id);
        self.buttons.push(CustomButton {
            id,
            name: name.to_string(),
            url: url.to_string(),
            active: true,
            sort_order: max_order + 1,
        });
        Some(id)
    }

    pub fn list_buttons(&self, active_only: bool) -> Vec<CustomButton> {
        let mut out: Vec<CustomButton> = self
            .buttons
            .iter()
            .filter(|b| !active_only || b.active)
            .cloned()
            .collect();
        out.sort_by_key(|b| b.sort_order);
        out
    }

    pub fn get_button(&self, id: ButtonId) -> Option<CustomButton> {
        self.buttons.iter().find(|b| b.id == id).cloned()
    }

    pub fn update_button(&mut self, id: ButtonId, name: Option<&str>, url: Option<&str>) -> bool {
        let Some(button) = self.buttons.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        if let Some(name) = name {
            button.name = name.to_string();
        }
        if let Some(url) = url {
            button.url = url.to_string();
        }
        true
    }

    pub fn toggle_button(&mut self, id: ButtonId) -> bool {
        let Some(button) = self.buttons.iter_mut().find(|b| b.id == id) else {
            return false;
        };
        button.active = !button.active;
        true
    }

    pub fn delete_button(&mut self, id: ButtonId) -> bool {
        let before = self.buttons.len();
        self.buttons.retain(|b| b.id != id);
        self.buttons.len() != before
    }
}
