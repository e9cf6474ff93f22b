//! Input Validation
//!
//! Checks applied to free-text answers in the payout wizard and to admin
//! command arguments.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::{CoreError, CoreResult};

/// Two capitalized words, Latin or Cyrillic: the card holder's name.
fn holder_name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[А-ЯЁA-Z][а-яёa-z]+ [А-ЯЁA-Z][а-яёa-z]+").ok())
        .as_ref()
}

/// Whether payout details look like "card number + holder name".
///
/// The text must carry 12 to 20 digits in total and a capitalized
/// "Firstname Lastname" pair.
pub fn is_card_like(text: &str) -> bool {
    let digits = text.chars().filter(char::is_ascii_digit).count();
    if !(12..=20).contains(&digits) {
        return false;
    }
    holder_name_pattern().is_some_and(|re| re.is_match(text))
}

/// Whether `text` looks like a marketplace order number.
pub fn is_marketplace_order_no(text: &str) -> bool {
    text.len() >= 6
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Parse `DD.MM.YYYY` or `YYYY-MM-DD`.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .ok()
}

/// Parse a hyphen-joined date range, e.g. `01.08.2025-11.08.2025` or
/// `2025-08-01-2025-08-11`. Reversed ranges are swapped.
pub fn parse_date_range(text: &str) -> CoreResult<(NaiveDate, NaiveDate)> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    // ISO dates contain hyphens themselves, so try every split point.
    let found = compact
        .match_indices('-')
        .find_map(|(idx, _)| {
            let (left, right) = (&compact[..idx], &compact[idx + 1..]);
            Some((parse_date(left)?, parse_date(right)?))
        })
        .ok_or_else(|| CoreError::parse(format!("not a date range: {}", text.trim())))?;

    let (a, b) = found;
    Ok(if b < a { (b, a) } else { (a, b) })
}
