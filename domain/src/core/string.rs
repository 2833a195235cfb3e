//! String helpers

/// Cut `s` to at most `max_len` bytes, ending in `...` when shortened.
///
/// Never splits a UTF-8 character.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len.saturating_sub(3).min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// First line of `s`, for one-line log previews
pub fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
