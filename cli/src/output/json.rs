//! JSON output helpers for `--json` code paths.

use anyhow::{Context, Result};
use serde::Serialize;

/// Format a JSON error object:
///
/// ```json
/// { "error": true, "message": "...", "code": "..." }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Pretty-print any serializable value.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_value<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("JSON serialization failed")
}

/// Stable machine-readable code for a command failure.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    use crate::domain::{ConfigError, PublishError};
    if err.downcast_ref::<ConfigError>().is_some() {
        "config_error"
    } else if let Some(publish) = err.downcast_ref::<PublishError>() {
        match publish {
            PublishError::DirtyTree { .. } => "dirty_tree",
            PublishError::NothingToPackage { .. } => "nothing_to_package",
        }
    } else {
        "error"
    }
}
