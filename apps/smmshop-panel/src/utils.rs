/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Trims `input` and rejects it when empty or longer than `max` characters.
pub fn clean_text(input: &str, max: usize) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max {
        None
    } else {
        Some(trimmed.to_string())
    }
}
