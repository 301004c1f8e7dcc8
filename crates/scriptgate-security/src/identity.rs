//! User id normalization.
//!
//! Assertions identify the verified human by phone number or email. Both the
//! assertion's `user_id` and the configured expected user go through
//! [`normalize_user_id`] before comparison.

/// Normalize a phone number or email for comparison.
///
/// - emails (anything containing `@`) are trimmed and lowercased
/// - phone-like strings (digits plus `+ - . ( )` and spaces) become
///   `+1XXXXXXXXXX` for 10 digits or 11 digits starting with `1`, and
///   `+<digits>` when they already carried a leading `+`
/// - everything else is trimmed and lowercased
pub fn normalize_user_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains('@') {
        return trimmed.to_lowercase();
    }

    let phone_like = !trimmed.is_empty()
        && trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | '(' | ')' | ' '));
    if phone_like {
        let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
        match digits.len() {
            10 => return format!("+1{digits}"),
            11 if digits.starts_with('1') => return format!("+{digits}"),
            n if n > 0 && trimmed.starts_with('+') => return format!("+{digits}"),
            _ => {}
        }
    }

    trimmed.to_lowercase()
}
