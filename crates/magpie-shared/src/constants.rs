/// Application name
pub const APP_NAME: &str = "Magpie";

/// Separator between the two sorted handles of a conversation key.
/// Generated handles are lowercase alphanumeric, so the separator can never
/// occur inside one.
pub const KEY_SEPARATOR: char = '_';

/// Adjective pool for generated handles
pub const HANDLE_ADJECTIVES: &[&str] = &["Quick", "Lazy", "Happy", "Bright", "Brave"];

/// Noun pool for generated handles
pub const HANDLE_NOUNS: &[&str] = &["Lion", "Eagle", "Shark", "Panda", "Tiger"];

/// Exclusive upper bound for the numeric part of a generated handle
pub const HANDLE_NUMBER_SPAN: u32 = 1000;

/// Random bytes appended (hex-encoded) to a candidate when the regular pool
/// keeps colliding
pub const HANDLE_SUFFIX_BYTES: usize = 2;

/// Default number of uniqueness attempts before switching to a suffixed candidate
pub const DEFAULT_HANDLE_ATTEMPTS: u32 = 16;

/// Minimum accepted password length
pub const MIN_PASSWORD_LEN: usize = 6;

/// Maximum message text size in bytes (16 KiB)
pub const MAX_MESSAGE_TEXT: usize = 16_384;
