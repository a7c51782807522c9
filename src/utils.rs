//! Small string helpers shared across handlers, trends and prompts.

/// Truncates a string to at most `max_chars` characters, adding "..." if
/// truncated.
///
/// UTF-8 safe: counts characters, not bytes, so multi-byte content never
/// panics at a boundary.
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    // Fast path: byte length bounds char count from above.
    if s.len() <= max_chars {
        return s.to_string();
    }

    let char_count = s.chars().count();
    if char_count <= max_chars {
        return s.to_string();
    }

    let suffix = "...";
    let suffix_len = suffix.chars().count();
    if max_chars <= suffix_len {
        return suffix.chars().take(max_chars).collect();
    }

    let truncated: String = s.chars().take(max_chars - suffix_len).collect();
    format!("{}{}", truncated, suffix)
}

/// Truncates trimmed text for display previews, e.g. pending-item previews
/// and trend excerpts.
pub fn preview(s: &str, max_chars: usize) -> String {
    truncate_str(s.trim(), max_chars)
}

/// First line (or first 50 characters, whichever is shorter) of a raw text,
/// used as a note title when a human resolves a clarification.
pub fn title_from_text(s: &str) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate_str(first_line, 50)
}
