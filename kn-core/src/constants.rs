//! Application-wide constants.

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server API timeout in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 30_000;

/// Extended timeout multiplier for multipart media uploads.
pub const EXTENDED_TIMEOUT_MULTIPLIER: u64 = 12;

/// Base delay between reconnection attempts, in seconds.
pub const RECONNECT_BASE_DELAY_SECS: u64 = 5;

/// Maximum reconnection delay cap, in seconds.
pub const RECONNECT_MAX_DELAY_SECS: u64 = 60;

/// Maximum number of handled message ids kept for push deduplication.
pub const MAX_HANDLED_MESSAGE_HISTORY: usize = 100;

/// Prefix used for client-generated temporary message ids.
pub const TEMP_MESSAGE_PREFIX: &str = "temp-";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_prefix() {
        assert!(format!("{}abc", TEMP_MESSAGE_PREFIX).starts_with("temp-"));
    }
}
