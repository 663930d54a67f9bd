//! # Failure Classification
//!
//! The control plane reports refusals only as free text on standard error.
//! [`FailureClassifier`] turns that text into a [`FailureKind`] by
//! case-insensitive substring match. Policy patterns are checked before
//! transient ones, so a message matching both is a policy rejection.
//!
//! This is signal matching, not a contract with the provider. The pattern
//! lists are configuration and can be replaced at start-up.

use serde::Serialize;

/// How a failed external call should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The platform refused the action in this region. Try another region.
    PolicyRejection,
    /// The target is still being provisioned. Retry later.
    TransientNotReady,
    /// Anything else. Abort.
    Fatal,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PolicyRejection => "policy rejection",
            Self::TransientNotReady => "not ready",
            Self::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Error strings the provider is known to emit for region-policy refusals.
pub const DEFAULT_POLICY_PATTERNS: &[&str] = &[
    "RequestDisallowedByPolicy",
    "RequestDisallowedByAzure",
    "LocationNotAvailableForResourceType",
    "disallowed by policy",
    "is not available in location",
    "NoRegisteredProviderFound",
];

/// Error strings that indicate a resource is still settling.
pub const DEFAULT_TRANSIENT_PATTERNS: &[&str] = &[
    "AnotherOperationInProgress",
    "OperationInProgress",
    "is not ready",
    "still being provisioned",
    "ManagedEnvironmentNotReady",
    "TooManyRequests",
];

/// Pure classifier over an external tool's error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureClassifier {
    policy: Vec<String>,
    transient: Vec<String>,
}

impl Default for FailureClassifier {
    fn default() -> Self {
        Self::new(
            DEFAULT_POLICY_PATTERNS.iter().map(|s| s.to_string()),
            DEFAULT_TRANSIENT_PATTERNS.iter().map(|s| s.to_string()),
        )
    }
}

impl FailureClassifier {
    /// Build a classifier from explicit pattern lists. Empty patterns are
    /// dropped; matching is case-insensitive.
    pub fn new(
        policy: impl IntoIterator<Item = String>,
        transient: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            policy: normalize(policy),
            transient: normalize(transient),
        }
    }

    /// Classify a failure from its error text.
    pub fn classify(&self, stderr: &str) -> FailureKind {
        let haystack = stderr.to_lowercase();
        if self.policy.iter().any(|p| haystack.contains(p.as_str())) {
            FailureKind::PolicyRejection
        } else if self.transient.iter().any(|p| haystack.contains(p.as_str())) {
            FailureKind::TransientNotReady
        } else {
            FailureKind::Fatal
        }
    }

    /// The configured policy-rejection patterns, lower-cased.
    pub fn policy_patterns(&self) -> &[String] {
        &self.policy
    }

    /// The configured transient patterns, lower-cased.
    pub fn transient_patterns(&self) -> &[String] {
        &self.transient
    }
}

fn normalize(patterns: impl IntoIterator<Item = String>) -> Vec<String> {
    patterns
        .into_iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}
