//! Topic and channel name validation.
//!
//! Shared by the TCP commands and the HTTP admin endpoints. A name is 1-64
//! characters from `[.a-zA-Z0-9_-]`; channel names may additionally carry an
//! `#ephemeral` suffix, which marks the channel for removal when its last
//! producer unregisters.

/// Maximum length of a topic or channel name, excluding any suffix.
pub const MAX_NAME_LENGTH: usize = 64;

/// Suffix marking a channel as ephemeral.
pub const EPHEMERAL_SUFFIX: &str = "#ephemeral";

fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return false;
    }
    name.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b'_' || b == b'-')
}

/// Whether `name` is a valid topic name.
#[must_use]
pub fn is_valid_topic_name(name: &str) -> bool {
    is_valid_name(name)
}

/// Whether `name` is a valid channel name, with or without the ephemeral
/// suffix.
#[must_use]
pub fn is_valid_channel_name(name: &str) -> bool {
    let base = name.strip_suffix(EPHEMERAL_SUFFIX).unwrap_or(name);
    is_valid_name(base)
}

/// Whether a channel name carries the ephemeral suffix.
#[must_use]
pub fn is_ephemeral(name: &str) -> bool {
    name.ends_with(EPHEMERAL_SUFFIX)
}
