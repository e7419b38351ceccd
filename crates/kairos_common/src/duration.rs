//! Time-duration strings parsed into femtoseconds.

/// Femtoseconds per picosecond.
pub const FS_PER_PS: u64 = 1_000;
/// Femtoseconds per nanosecond.
pub const FS_PER_NS: u64 = 1_000_000;
/// Femtoseconds per microsecond.
pub const FS_PER_US: u64 = 1_000_000_000;
/// Femtoseconds per millisecond.
pub const FS_PER_MS: u64 = 1_000_000_000_000;
/// Femtoseconds per second.
pub const FS_PER_S: u64 = 1_000_000_000_000_000;

/// Error returned when a duration string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration: '{input}'")]
pub struct ParseDurationError {
    /// The offending input.
    pub input: String,
}

/// Parses a duration like `"100ns"`, `"1.5us"`, or `"250 ps"` into
/// femtoseconds.
///
/// Accepted unit suffixes (case-insensitive): `fs`, `ps`, `ns`, `us`, `ms`,
/// `s`. A bare number is taken as femtoseconds. Fractional values are
/// rounded to the nearest femtosecond.
pub fn parse_fs(s: &str) -> Result<u64, ParseDurationError> {
    let trimmed = s.trim();
    let err = || ParseDurationError {
        input: trimmed.to_string(),
    };

    let lower = trimmed.to_ascii_lowercase();
    let unit_table: [(&str, u64); 5] = [
        ("fs", 1),
        ("ps", FS_PER_PS),
        ("ns", FS_PER_NS),
        ("us", FS_PER_US),
        ("ms", FS_PER_MS),
    ];
    for (suffix, scale) in unit_table {
        if let Some(num) = lower.strip_suffix(suffix) {
            let value: f64 = num.trim().parse().map_err(|_| err())?;
            return checked_scale(value, scale).ok_or_else(err);
        }
    }
    // "s" must come after "fs"/"ps"/... or it would shadow them.
    if let Some(num) = lower.strip_suffix('s') {
        let value: f64 = num.trim().parse().map_err(|_| err())?;
        return checked_scale(value, FS_PER_S).ok_or_else(err);
    }

    let value: f64 = lower.parse().map_err(|_| err())?;
    checked_scale(value, 1).ok_or_else(err)
}

fn checked_scale(value: f64, scale: u64) -> Option<u64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let fs = value * scale as f64;
    if fs > u64::MAX as f64 {
        return None;
    }
    Some(fs.round() as u64)
}
