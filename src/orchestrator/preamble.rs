/// Marker that opens a model's "thinking" block.
pub const THINKING_MARKER: &str = "⚙️ AI Thinking Process";

/// Remove a leading thinking block from a finished response.
///
/// The block is cut at the first blank line; failing that, at the first line
/// break past the marker; failing that, only the marker itself is removed.
/// Text that does not start with the marker is returned untouched.
pub fn strip_thinking_preamble(text: &str) -> String {
    if !text.starts_with(THINKING_MARKER) {
        return text.to_string();
    }

    if let Some(idx) = text.find("\n\n") {
        return text[idx + 2..].trim().to_string();
    }
    if let Some(idx) = text.find('\n') {
        if idx > THINKING_MARKER.len() {
            return text[idx + 1..].trim().to_string();
        }
    }
    text[THINKING_MARKER.len()..].trim().to_string()
}

/// Token-count proxy recorded with a finished message.
pub fn token_estimate(text: &str) -> u32 {
    u32::try_from(text.chars().count()).unwrap_or(u32::MAX)
}
