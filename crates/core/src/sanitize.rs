//! String sanitization.
//!
//! `sanitize` defuses a string before it is compared, stored or logged:
//! C0 control characters and DEL act as separators, every run of
//! separators and whitespace collapses to a single space, and the ends are
//! trimmed. The output contains no control characters and no whitespace
//! other than single interior spaces, so the transform is idempotent.

use crate::limits::MAX_LOGGED_VALUE_LEN;

/// Returns true for C0 control characters (U+0000..=U+001F) and DEL.
fn is_stripped_control(c: char) -> bool {
    c <= '\u{1f}' || c == '\u{7f}'
}

/// Sanitize a string for further use.
///
/// ```
/// use gate_core::sanitize::sanitize;
///
/// assert_eq!(sanitize(" a\u{7}b  c "), "a b c");
/// ```
pub fn sanitize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.chars() {
        if is_stripped_control(c) || c.is_whitespace() {
            pending_separator = true;
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push(' ');
        }
        pending_separator = false;
        out.push(c);
    }

    out
}

/// Sanitize and truncate a user-supplied value for a log line.
pub fn for_log(input: &str) -> String {
    let clean = sanitize(input);
    if clean.chars().count() <= MAX_LOGGED_VALUE_LEN {
        return clean;
    }
    let mut truncated: String = clean.chars().take(MAX_LOGGED_VALUE_LEN).collect();
    truncated.push('…');
    truncated
}
