//! Artifact naming convention.
//!
//! Published images are named after the requester and the request's
//! arrival time so that every stored object can be traced back to the
//! person who asked for it.

use crate::types::Timestamp;

/// Extension given to every published artifact.
pub const ARTIFACT_EXTENSION: &str = "png";

/// Build the display name for a published artifact.
///
/// Convention: `{requester}_{YYYYmmdd_HHMMSS}.png`
///
/// Characters that would act as path separators in a storage key
/// (`/`, `\`) and whitespace are replaced with `_`.
///
/// # Examples
///
/// ```
/// use chrono::TimeZone;
/// use imagebot_core::naming::artifact_display_name;
///
/// let at = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
/// assert_eq!(artifact_display_name("alice", at), "alice_20240309_140507.png");
/// ```
pub fn artifact_display_name(requester_name: &str, arrived_at: Timestamp) -> String {
    let safe: String = requester_name
        .chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    format!(
        "{safe}_{}.{ARTIFACT_EXTENSION}",
        arrived_at.format("%Y%m%d_%H%M%S")
    )
}
