//! Filename sanitizing and excerpt helpers shared by exporters and scanners.

use crate::constants::{MAX_FILENAME_BYTES, MAX_FILENAME_CHARS, TRUNCATION_MARKER};

/// Characters that are not allowed in a filename on at least one platform.
const FORBIDDEN_FILENAME_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

const TRANSCRIPT_EXTENSION: &str = ".txt";

/// Replace filesystem-hostile characters with `_` and cap the result at
/// [`MAX_FILENAME_CHARS`] characters and [`MAX_FILENAME_BYTES`] bytes.
pub fn safe_filename(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .map(|c| {
            if FORBIDDEN_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .take(MAX_FILENAME_CHARS)
        .collect();
    truncate_to_bytes(&cleaned, MAX_FILENAME_BYTES).to_string()
}

/// Name of the per-account export folder, e.g. `alice@example.com_20260101_120000`.
pub fn account_folder_name(identifier: &str, timestamp: &str) -> String {
    let suffix = format!("_{}", timestamp);
    let budget = MAX_FILENAME_BYTES.saturating_sub(suffix.len());
    format!("{}{}", truncate_to_bytes(&safe_filename(identifier), budget), suffix)
}

/// File name of one exported conversation, at most [`MAX_FILENAME_BYTES`]
/// bytes long.
pub fn conversation_file_name(conversation_id: &str, display_title: &str) -> String {
    let stem = format!(
        "{}-{}",
        safe_filename(conversation_id),
        safe_filename(display_title)
    );
    let budget = MAX_FILENAME_BYTES - TRANSCRIPT_EXTENSION.len();
    format!("{}{}", truncate_to_bytes(&stem, budget), TRANSCRIPT_EXTENSION)
}

/// Longest prefix of `text` that fits in `max_bytes` without splitting a
/// character.
pub fn truncate_to_bytes(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

/// Keep the first `max_chars` characters of `text`, appending the
/// truncation marker when anything was cut.
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
