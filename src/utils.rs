//! Small helpers shared by the pipeline and the notifier.

use chrono::{DateTime, Utc};

/// Truncate a string for logging purposes.
///
/// Strings longer than `max` bytes are cut at the last character boundary at
/// or before `max` and get `"…(+N bytes)"` appended. Announcements are in
/// Cyrillic, so the cut must never split a multi-byte character.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

/// Milliseconds elapsed since `start`, clamped at zero.
pub fn elapsed_ms(start: DateTime<Utc>) -> i64 {
    (Utc::now() - start).num_milliseconds().max(0)
}
