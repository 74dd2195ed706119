//! Reply-keyboard layouts and the static button labels the router recognizes.

use crate::domain::CustomButton;
use crate::messaging::types::{Markup, ReplyKeyboard};

// ============== Static labels ==============

pub const CANCEL: &str = "❌ Cancel";

pub const LOGIN: &str = "🔑 Sign in";
pub const REGISTER: &str = "📝 Register";

pub const MY_LINK: &str = "🔗 My link";
pub const SET_LINK: &str = "🔄 Update link";
pub const FEEDBACK: &str = "✉️ Message staff";
pub const LOGOUT: &str = "🚪 Sign out";

pub const ADMIN_USERS: &str = "👥 Users";
pub const ADMIN_ADD: &str = "➕ Add user";
pub const ADMIN_EDIT: &str = "✏️ Edit user";
pub const ADMIN_DELETE: &str = "🗑 Delete user";
pub const ADMIN_BROADCAST: &str = "📢 Broadcast";
pub const ADMIN_DIRECT: &str = "📩 Direct message";
pub const ADMIN_LINKS_CHANNEL: &str = "📋 Links channel";
pub const ADMIN_FEEDBACK_CHANNEL: &str = "💬 Feedback channel";
pub const ADMIN_BUTTONS: &str = "🔘 Manage buttons";

pub const BTN_ADD: &str = "➕ Add button";
pub const BTN_LIST: &str = "📋 List buttons";
pub const BTN_EDIT: &str = "✏️ Edit button";
pub const BTN_DELETE: &str = "🗑 Delete button";
pub const BTN_TOGGLE: &str = "🔄 Toggle button";
pub const BTN_BACK: &str = "↩️ Back";

pub const CHOICE_NAME: &str = "📝 Change name";
pub const CHOICE_URL: &str = "🔗 Change URL";
pub const CHOICE_LOGIN: &str = "Change login";
pub const CHOICE_PASSWORD: &str = "Change password";

// ============== Layouts ==============

/// Keyboard for unauthenticated subjects.
pub fn start() -> Markup {
    Markup::Keyboard(ReplyKeyboard::new(vec![vec![LOGIN, REGISTER]]))
}

/// Main keyboard for authenticated users, with active custom buttons mixed
/// in two per row between the base rows and the sign-out row.
pub fn main(custom: &[CustomButton]) -> Markup {
    let mut rows: Vec<Vec<String>> = vec![
        vec![MY_LINK.to_string(), SET_LINK.to_string()],
        vec![FEEDBACK.to_string()],
    ];

    let mut row: Vec<String> = Vec::new();
    for button in custom {
        row.push(button.name.clone());
        if row.len() == 2 {
            rows.push(std::mem::take(&mut row));
        }
    }
    if !row.is_empty() {
        rows.push(row);
    }

    rows.push(vec![LOGOUT.to_string()]);
    Markup::Keyboard(ReplyKeyboard { rows })
}

pub fn admin() -> Markup {
    Markup::Keyboard(ReplyKeyboard::new(vec![
        vec![ADMIN_USERS, ADMIN_ADD],
        vec![ADMIN_EDIT, ADMIN_DELETE],
        vec![ADMIN_BROADCAST, ADMIN_DIRECT],
        vec![ADMIN_LINKS_CHANNEL, ADMIN_FEEDBACK_CHANNEL],
        vec![ADMIN_BUTTONS],
    ]))
}

pub fn button_management() -> Markup {
    Markup::Keyboard(ReplyKeyboard::new(vec![
        vec![BTN_ADD, BTN_LIST],
        vec![BTN_EDIT, BTN_DELETE],
        vec![BTN_TOGGLE],
        vec![BTN_BACK],
    ]))
}

pub fn button_edit_choice() -> Markup {
    Markup::Keyboard(ReplyKeyboard::new(vec![
        vec![CHOICE_NAME, CHOICE_URL],
        vec![CANCEL],
    ]))
}

pub fn account_action() -> Markup {
    Markup::Keyboard(ReplyKeyboard::new(vec![
        vec![CHOICE_LOGIN, CHOICE_PASSWORD],
        vec![CANCEL],
    ]))
}

/// Keyboard shown while a flow waits for input: cancel only.
pub fn cancel_only() -> Markup {
    Markup::Keyboard(ReplyKeyboard::new(vec![vec![CANCEL]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ButtonId;

    fn button(name: &str) -> CustomButton {
        CustomButton {
            id: ButtonId(1),
            name: name.to_string(),
            url: "https://example.com".to_string(),
            active: true,
            sort_order: 1,
        }
    }

    #[test]
    fn main_keyboard_pairs_custom_buttons() {
        let custom = vec![button("A"), button("B"), button("C")];
        let Markup::Keyboard(kb) = main(&custom) else {
            panic!("expected a reply keyboard");
        };

        // base rows + two custom rows (2 + 1) + sign-out row
        assert_eq!(kb.rows.len(), 5);
        assert_eq!(kb.rows[2], vec!["A".to_string(), "B".to_string()]);
        assert_eq!(kb.rows[3], vec!["C".to_string()]);
        assert_eq!(kb.rows[4], vec![LOGOUT.to_string()]);
    }
}
