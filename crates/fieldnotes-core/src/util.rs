//! Shared utility functions used across multiple modules.

use std::hash::{Hash, Hasher};

/// Normalize optional text by trimming whitespace and removing empties.
///
/// Returns `None` when the input is `None` or the trimmed value is empty.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Stable, non-reversible fingerprint of an owner id for log fields.
pub fn owner_fingerprint(owner_id: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    owner_id.hash(&mut hasher);
    hasher.finish()
}
