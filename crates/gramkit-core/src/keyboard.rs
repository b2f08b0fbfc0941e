//! Keyboard markup for outgoing messages.
//!
//! Two flavours exist: reply keyboards replace the user's on-screen keyboard,
//! inline keyboards attach buttons to a message. [`KeyboardBuilder`] assembles
//! either one row by row:
//!
//! ```rust
//! use gramkit_core::keyboard::{InlineKeyboardButton, KeyboardBuilder, ReplyMarkup};
//!
//! let markup = KeyboardBuilder::new()
//!     .button(InlineKeyboardButton::callback("Yes", "vote_yes"))
//!     .button(InlineKeyboardButton::callback("No", "vote_no"))
//!     .row()
//!     .button(InlineKeyboardButton::url("Docs", "https://core.telegram.org/bots"))
//!     .build();
//!
//! assert!(matches!(markup, ReplyMarkup::Inline(_)));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// Buttons
// =============================================================================

/// A button of a reply keyboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyboardButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub request_contact: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub request_location: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
}

impl KeyboardButton {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Pressing the button shares the user's phone number.
    pub fn request_contact(mut self) -> Self {
        self.request_contact = true;
        self
    }

    /// Pressing the button shares the user's current location.
    pub fn request_location(mut self) -> Self {
        self.request_location = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebAppInfo {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forward_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_username: Option<String>,
}

/// A button of an inline keyboard. Exactly one action field should be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_app: Option<WebAppInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_url: Option<LoginUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_inline_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub switch_inline_query_current_chat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_game: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pay: bool,
}

impl InlineKeyboardButton {
    /// Button that sends `data` back as a callback query.
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Button that opens a URL.
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Button that opens a Web App.
    pub fn web_app(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            web_app: Some(WebAppInfo { url: url.into() }),
            ..Default::default()
        }
    }

    /// Button that prompts the user to pick a chat for an inline query.
    pub fn switch_inline_query(text: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            switch_inline_query: Some(query.into()),
            ..Default::default()
        }
    }

    /// Pay button; must be the first button of an invoice message.
    pub fn pay(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            pay: true,
            ..Default::default()
        }
    }
}

// =============================================================================
// Markups
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyKeyboardMarkup {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    #[serde(default)]
    pub resize_keyboard: bool,
    #[serde(default)]
    pub one_time_keyboard: bool,
    #[serde(default)]
    pub selective: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_field_placeholder: Option<String>,
}

impl ReplyKeyboardMarkup {
    pub fn new(keyboard: Vec<Vec<KeyboardButton>>) -> Self {
        Self {
            keyboard,
            ..Default::default()
        }
    }

    pub fn resize(mut self) -> Self {
        self.resize_keyboard = true;
        self
    }

    pub fn one_time(mut self) -> Self {
        self.one_time_keyboard = true;
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.input_field_placeholder = Some(text.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

impl InlineKeyboardMarkup {
    pub fn new(inline_keyboard: Vec<Vec<InlineKeyboardButton>>) -> Self {
        Self { inline_keyboard }
    }

    /// All buttons in reading order.
    pub fn buttons(&self) -> impl Iterator<Item = &InlineKeyboardButton> {
        self.inline_keyboard.iter().flatten()
    }
}

/// Hides the current reply keyboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyKeyboardRemove {
    pub remove_keyboard: bool,
    #[serde(default)]
    pub selective: bool,
}

impl Default for ReplyKeyboardRemove {
    fn default() -> Self {
        Self {
            remove_keyboard: true,
            selective: false,
        }
    }
}

/// Any markup accepted in a `reply_markup` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReplyMarkup {
    Inline(InlineKeyboardMarkup),
    Reply(ReplyKeyboardMarkup),
    Remove(ReplyKeyboardRemove),
}

impl From<InlineKeyboardMarkup> for ReplyMarkup {
    fn from(markup: InlineKeyboardMarkup) -> Self {
        Self::Inline(markup)
    }
}

impl From<ReplyKeyboardMarkup> for ReplyMarkup {
    fn from(markup: ReplyKeyboardMarkup) -> Self {
        Self::Reply(markup)
    }
}

impl From<ReplyKeyboardRemove> for ReplyMarkup {
    fn from(markup: ReplyKeyboardRemove) -> Self {
        Self::Remove(markup)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Either kind of button, as accepted by [`KeyboardBuilder::button`].
#[derive(Debug, Clone, PartialEq)]
pub enum Button {
    Reply(KeyboardButton),
    Inline(InlineKeyboardButton),
}

impl From<KeyboardButton> for Button {
    fn from(button: KeyboardButton) -> Self {
        Self::Reply(button)
    }
}

impl From<InlineKeyboardButton> for Button {
    fn from(button: InlineKeyboardButton) -> Self {
        Self::Inline(button)
    }
}

impl From<&str> for Button {
    fn from(text: &str) -> Self {
        Self::Reply(KeyboardButton::new(text))
    }
}

/// Row-oriented keyboard builder.
///
/// Inline and reply buttons are collected on separate grids that share row
/// breaks. If any inline button was added the result is an inline keyboard
/// and reply buttons are left out; otherwise it is a reply keyboard.
/// Empty rows are dropped.
#[derive(Debug, Clone, Default)]
pub struct KeyboardBuilder {
    reply_rows: Vec<Vec<KeyboardButton>>,
    inline_rows: Vec<Vec<InlineKeyboardButton>>,
    resize: bool,
    one_time: bool,
}

impl KeyboardBuilder {
    pub fn new() -> Self {
        Self {
            reply_rows: vec![Vec::new()],
            inline_rows: vec![Vec::new()],
            ..Default::default()
        }
    }

    /// Appends a button to the current row.
    pub fn button(mut self, button: impl Into<Button>) -> Self {
        match button.into() {
            Button::Reply(b) => last_row(&mut self.reply_rows).push(b),
            Button::Inline(b) => last_row(&mut self.inline_rows).push(b),
        }
        self
    }

    /// Starts a new row.
    pub fn row(mut self) -> Self {
        self.reply_rows.push(Vec::new());
        self.inline_rows.push(Vec::new());
        self
    }

    /// Resize a resulting reply keyboard to fit its buttons.
    pub fn resize(mut self) -> Self {
        self.resize = true;
        self
    }

    /// Hide a resulting reply keyboard after one use.
    pub fn one_time(mut self) -> Self {
        self.one_time = true;
        self
    }

    pub fn build(self) -> ReplyMarkup {
        let inline: Vec<_> = self
            .inline_rows
            .into_iter()
            .filter(|row| !row.is_empty())
            .collect();
        if !inline.is_empty() {
            return InlineKeyboardMarkup::new(inline).into();
        }

        let reply: Vec<_> = self
            .reply_rows
            .into_iter()
            .filter(|row| !row.is_empty())
            .collect();
        ReplyKeyboardMarkup {
            keyboard: reply,
            resize_keyboard: self.resize,
            one_time_keyboard: self.one_time,
            ..Default::default()
        }
        .into()
    }

    /// Inline keyboard from ready-made rows.
    pub fn inline(rows: Vec<Vec<InlineKeyboardButton>>) -> InlineKeyboardMarkup {
        InlineKeyboardMarkup::new(rows)
    }

    /// Reply keyboard from ready-made rows.
    pub fn reply(rows: Vec<Vec<KeyboardButton>>) -> ReplyKeyboardMarkup {
        ReplyKeyboardMarkup::new(rows)
    }
}

fn last_row<T>(rows: &mut Vec<Vec<T>>) -> &mut Vec<T> {
    if rows.is_empty() {
        rows.push(Vec::new());
    }
    let last = rows.len() - 1;
    &mut rows[last]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_rows() {
        let markup = KeyboardBuilder::new()
            .button(InlineKeyboardButton::callback("A", "a"))
            .button(InlineKeyboardButton::callback("B", "b"))
            .row()
            .row()
            .button(InlineKeyboardButton::url("C", "https://example.com"))
            .build();

        let ReplyMarkup::Inline(inline) = markup else {
            panic!("expected inline markup");
        };
        assert_eq!(inline.inline_keyboard.len(), 2);
        assert_eq!(inline.inline_keyboard[0].len(), 2);
        assert_eq!(inline.inline_keyboard[1][0].text, "C");
    }

    #[test]
    fn test_builder_reply_keyboard() {
        let markup = KeyboardBuilder::new()
            .button("Yes")
            .button(KeyboardButton::new("Where am I?").request_location())
            .resize()
            .build();

        assert_eq!(
            serde_json::to_value(&markup).unwrap(),
            json!({
                "keyboard": [[{"text": "Yes"}, {"text": "Where am I?", "request_location": true}]],
                "resize_keyboard": true,
                "one_time_keyboard": false,
                "selective": false
            })
        );
    }

    #[test]
    fn test_inline_wins_over_reply_buttons() {
        let markup = KeyboardBuilder::new()
            .button("plain")
            .button(InlineKeyboardButton::callback("cb", "x"))
            .build();
        let ReplyMarkup::Inline(inline) = markup else {
            panic!("expected inline markup");
        };
        assert_eq!(inline.buttons().count(), 1);
    }

    #[test]
    fn test_inline_button_skips_unset_fields() {
        let value = serde_json::to_value(InlineKeyboardButton::callback("Go", "go")).unwrap();
        assert_eq!(value, json!({"text": "Go", "callback_data": "go"}));
    }
}
