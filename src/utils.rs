use std::time::Duration;

use crate::error::DupError;

const SIZE_SUFFIXES: [(&str, u32); 4] = [("GB", 3), ("MB", 2), ("KB", 1), ("B", 0)];

/// Parse a size string such as `64KB`, `96MB` or `4096` into bytes.
///
/// Suffixes are case-sensitive powers of 1024. A bare number is bytes.
pub fn parse_size(input: &str) -> Result<u64, DupError> {
    let text = input.trim();
    let (digits, exponent) = SIZE_SUFFIXES
        .iter()
        .find_map(|(suffix, exp)| text.strip_suffix(suffix).map(|rest| (rest.trim_end(), *exp)))
        .unwrap_or((text, 0));

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DupError::config(format!("invalid size '{input}'")));
    }
    let value: u64 = digits
        .parse()
        .map_err(|_| DupError::config(format!("size '{input}' is too large")))?;
    value
        .checked_mul(1024u64.pow(exponent))
        .ok_or_else(|| DupError::config(format!("size '{input}' is too large")))
}

pub fn format_human_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    if secs >= 3600 {
        format!("{}:{:02}:{:02}.{millis:03} (h:mm:ss.mmm)", secs / 3600, (secs % 3600) / 60, secs % 60)
    } else if secs >= 60 {
        format!("{}:{:02}.{millis:03} (m:ss.mmm)", secs / 60, secs % 60)
    } else {
        format!("{secs}.{millis:03} seconds")
    }
}
