//! Keeps multi-line display text (location descriptions, admin input) on one
//! log line by escaping control characters and capping the preview length.

const MAX_PREVIEW: usize = 160;

/// Escape a string for single-line logging. Newlines, carriage returns, tabs,
/// and backslashes become their escaped spellings; other control chars are
/// rendered in `\u{..}` form. Previews longer than the cap end in an ellipsis.
pub fn escape_log(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_PREVIEW));
    let mut chars = text.chars();
    for ch in chars.by_ref().take(MAX_PREVIEW) {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.extend(c.escape_unicode()),
            c => out.push(c),
        }
    }
    if chars.next().is_some() {
        out.push('…');
    }
    out
}
