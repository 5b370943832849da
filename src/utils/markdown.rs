/// Helpers for Telegram MarkdownV2 text.
///
/// Every user supplied string (titles, names, prize descriptions) must pass
/// through [`escape_markdown`] before it is interpolated into a post.
const SPECIAL_CHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Escapes markdown special characters for MarkdownV2 parsing mode
///
/// # Example
/// ```
/// use giveaway_bot::utils::markdown::escape_markdown;
///
/// let text = "Prize: 600 UC (x2)!";
/// assert_eq!(escape_markdown(text), "Prize: 600 UC \\(x2\\)\\!");
/// ```
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Bold, already escaped.
pub fn bold(text: &str) -> String {
    format!("*{}*", escape_markdown(text))
}

/// `@handle` mention, escaped; falls back to the plain name.
pub fn mention(name: &str, username: Option<&str>) -> String {
    match username.filter(|u| !u.is_empty()) {
        Some(handle) => escape_markdown(&format!("{name} (@{handle})")),
        None => escape_markdown(name),
    }
}
