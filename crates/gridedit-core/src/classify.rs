use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Phone-number separators: whitespace, parentheses, dashes and plus signs
static PHONE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s()\-+]").expect("valid separator pattern"));

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// External action a cell's content can trigger instead of editing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellAction {
    /// Dial the number (digits only, separators stripped)
    PhoneCall(String),
}

/// What activating a cell should do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellIntent {
    Editable,
    Actionable(CellAction),
}

impl CellIntent {
    pub fn is_editable(&self) -> bool {
        matches!(self, CellIntent::Editable)
    }
}

fn phone_digits(text: &str) -> Option<String> {
    let digits = PHONE_SEPARATORS.replace_all(text, "");
    let len = digits.len();

    if (MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&len)
        && digits.bytes().all(|b| b.is_ascii_digit())
    {
        Some(digits.into_owned())
    } else {
        None
    }
}

/// True when the text is a 7 to 15 digit number once separators are removed
pub fn is_phone_number(text: &str) -> bool {
    phone_digits(text).is_some()
}

/// Route a cell's content to editing or to an external action
pub fn classify(text: &str) -> CellIntent {
    match phone_digits(text) {
        Some(number) => CellIntent::Actionable(CellAction::PhoneCall(number)),
        None => CellIntent::Editable,
    }
}
