//! Validation for stream identifiers and numeric settings

/// Longest stream name or shard id the remote service accepts
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// Validate a stream name: 1..=128 characters of `[A-Za-z0-9_.-]`
pub fn validate_stream_name(name: &str) -> Result<(), String> {
    validate_identifier("stream name", name)
}

/// Validate a shard id: 1..=128 characters of `[A-Za-z0-9_.-]`
pub fn validate_shard_id(shard: &str) -> Result<(), String> {
    validate_identifier("shard id", shard)
}

fn validate_identifier(kind: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} must not be empty", kind));
    }

    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(format!(
            "{} '{}' is longer than {} characters",
            kind, value, MAX_IDENTIFIER_LEN
        ));
    }

    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(format!(
            "{} '{}' contains invalid character '{}' (allowed: letters, digits, '_', '.', '-')",
            kind, value, bad
        ));
    }

    Ok(())
}

/// Validate that a count setting is at least 1
pub fn validate_positive(setting: &str, value: usize) -> Result<usize, String> {
    match value {
        0 => Err(format!("{} must be greater than 0", setting)),
        n => Ok(n),
    }
}
