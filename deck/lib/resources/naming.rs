use chrono::{DateTime, Utc};

use crate::{DeckError, DeckResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The stamp appended to Images entry names.
pub const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns `{base}-{yyyyMMdd-HHmm}`.
pub fn timestamped_name(base: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", base, now.format(NAME_TIMESTAMP_FORMAT))
}

/// The `n`-th candidate for `base`: `base` itself for 1, then `base-2`, `base-3`, ...
pub fn numbered_name(base: &str, n: u32) -> String {
    match n {
        0 | 1 => base.to_string(),
        n => format!("{}-{}", base, n),
    }
}

/// Checks that `name` can be used both as a directory name and as an engine image name.
///
/// Allowed: lowercase ascii letters, digits, `-`, `_` and `.`, starting with a letter or digit.
pub fn validate_name(name: &str) -> DeckResult<()> {
    let starts_well = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit());

    let chars_ok = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'));

    if !starts_well || !chars_ok || name.len() > 128 {
        return Err(DeckError::InvalidResourceName(name.to_string()));
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
