//! # Output Parsing
//!
//! The CLI is always asked for `-o tsv` (scalars and lists) or `-o json`
//! (documents). These helpers turn that text into typed values; none of them
//! interpret error text, which is the classifier's job.

use capd_core::{ExternalError, FailureKind, RegionId};
use serde::de::DeserializeOwned;

use crate::invocation::Invocation;

/// A trimmed scalar. Empty output (how `tsv` renders null) is `None`.
pub fn scalar(stdout: &str) -> Option<String> {
    let value = stdout.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Tab- or line-separated values, blanks dropped.
pub fn tsv_values(stdout: &str) -> Vec<String> {
    stdout
        .split(['\n', '\t'])
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a JSON document. Empty output parses as `T::default()`.
pub fn json<T: DeserializeOwned + Default>(stdout: &str) -> Result<T, serde_json::Error> {
    if stdout.trim().is_empty() {
        return Ok(T::default());
    }
    serde_json::from_str(stdout)
}

/// Normalize a location as the platform prints it into a region identifier.
///
/// Some resource types report display names (`"France Central"`) instead of
/// identifiers (`"francecentral"`); both map to the same region.
pub fn location_to_region(raw: &str) -> Option<RegionId> {
    RegionId::from_location(raw).ok()
}

/// A fatal error for output that succeeded but could not be understood.
pub(crate) fn unexpected(invocation: &Invocation, detail: impl std::fmt::Display) -> ExternalError {
    ExternalError {
        kind: FailureKind::Fatal,
        command: invocation.to_string(),
        status: None,
        stderr: format!("unexpected output: {detail}"),
    }
}
