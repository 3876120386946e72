/// Country prefix assumed for numbers entered without one.
pub const DEFAULT_COUNTRY_PREFIX: &str = "+48";

fn strip_whitespace(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Storage form: no whitespace, always with a `+` country prefix.
pub fn normalize_phone(raw: &str) -> String {
    let cleaned = strip_whitespace(raw);
    if cleaned.starts_with('+') {
        cleaned
    } else {
        format!("{DEFAULT_COUNTRY_PREFIX}{cleaned}")
    }
}

/// `true` for a normalized number: `+` followed only by digits, within limits.
pub fn is_plausible(normalized: &str) -> bool {
    use crate::limits::{MAX_PHONE_LEN, MIN_PHONE_DIGITS};
    let Some(digits) = normalized.strip_prefix('+') else {
        return false;
    };
    normalized.len() <= MAX_PHONE_LEN
        && digits.len() >= MIN_PHONE_DIGITS
        && digits.chars().all(|c| c.is_ascii_digit())
}

fn group_by_three(digits: &str) -> String {
    let chars: Vec<char> = digits.chars().collect();
    chars
        .chunks(3)
        .map(|g| g.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display form: digits in groups of three, e.g. `+48 123 456 789`.
pub fn format_phone_display(raw: &str) -> String {
    let cleaned = strip_whitespace(raw);
    if cleaned.is_empty() {
        return String::new();
    }
    if let Some(local) = cleaned.strip_prefix(DEFAULT_COUNTRY_PREFIX) {
        return format!("{DEFAULT_COUNTRY_PREFIX} {}", group_by_three(local));
    }
    match cleaned.strip_prefix('+') {
        Some(digits) => format!("+{}", group_by_three(digits)),
        None => group_by_three(&cleaned),
    }
}
