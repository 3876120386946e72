/// Longest service a business can define (8 hours).
pub const MAX_SERVICE_DURATION_MINUTES: u32 = 8 * 60;
pub const MAX_SERVICE_NAME_LEN: usize = 128;
pub const MAX_CLIENT_NAME_LEN: usize = 128;
/// Digits plus an optional leading `+`, after whitespace is stripped.
pub const MAX_PHONE_LEN: usize = 16;
pub const MIN_PHONE_DIGITS: usize = 6;
pub const MAX_UPCOMING_DAYS: u32 = 31;
