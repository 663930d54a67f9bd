//! # Error Types
//!
//! All errors use `thiserror`. External failures keep the tool's raw error
//! text so the operator sees exactly what the control plane said.

use thiserror::Error;

use crate::classify::FailureKind;
use crate::region::RegionId;
use crate::resource::ResourceKind;

/// Top-level error type for the deployer.
#[derive(Error, Debug)]
pub enum CapdError {
    /// The allow-list is empty, so there is nothing to select from.
    #[error("no region available: the allowed-region set is empty")]
    NoRegionAvailable,

    /// Every candidate region rejected the creation on policy grounds.
    #[error(
        "{kind} creation exhausted every allowed region (tried: {}): {last}",
        join_regions(.tried)
    )]
    ResourceCreationExhausted {
        /// The kind of resource being created.
        kind: ResourceKind,
        /// Regions attempted, in attempt order.
        tried: Vec<RegionId>,
        /// The rejection returned by the final attempt.
        last: Box<ExternalError>,
    },

    /// A resource did not reach its ready state within the attempt budget.
    #[error("{what} not ready after {attempts} attempts")]
    ResourceNotReady {
        /// Human-readable name of what was polled.
        what: String,
        /// Number of polls performed.
        attempts: u32,
    },

    /// A region identifier failed validation.
    #[error("invalid region identifier {0:?}")]
    InvalidRegion(String),

    /// An external command failed and was not recovered.
    #[error(transparent)]
    External(#[from] ExternalError),
}

impl CapdError {
    /// Process exit code for this error.
    ///
    /// Unrecoverable external failures propagate the failing command's own
    /// exit status. Everything else, including fallback exhaustion, exits 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::External(e) => e.exit_code(),
            _ => 1,
        }
    }
}

/// A failed invocation of an external tool.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{command}` failed ({}, {kind}): {stderr}", describe_status(.status))]
pub struct ExternalError {
    /// Classification of the failure.
    pub kind: FailureKind,
    /// The rendered invocation, secrets redacted.
    pub command: String,
    /// Exit status, or `None` if the process could not be run or was killed.
    pub status: Option<i32>,
    /// The tool's raw error text, trimmed.
    pub stderr: String,
}

impl ExternalError {
    /// Whether the platform refused the action on governance grounds.
    pub fn is_policy_rejection(&self) -> bool {
        self.kind == FailureKind::PolicyRejection
    }

    /// Whether the target resource is still settling.
    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::TransientNotReady
    }

    /// The failing command's exit status if it fits a process exit code,
    /// otherwise 1.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            Some(code) if (1..=255).contains(&code) => code as u8,
            _ => 1,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit {code}"),
        None => "no exit status".to_string(),
    }
}

fn join_regions(regions: &[RegionId]) -> String {
    regions
        .iter()
        .map(RegionId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
