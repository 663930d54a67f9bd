//! # capd-core: Domain Core for the Container App Deployer
//!
//! Everything the deployer decides on its own lives here; everything else is
//! delegated to the cloud control plane through `capd-az`.
//!
//! ## What this crate owns
//!
//! 1. **Region identifiers.** `RegionId` is a validated, lower-case newtype.
//!    `AllowedRegions` keeps the allow-list in the order the platform reported
//!    it, without duplicates.
//!
//! 2. **Region selection.** [`select_region`] intersects the operator's
//!    preference list with the allow-list.
//!
//! 3. **Policy-rejection fallback.** [`create_with_fallback`] walks the
//!    allow-list when the platform refuses a region on governance grounds.
//!
//! 4. **Bounded polling.** [`wait_until_ready`] and [`retry`] replace ad hoc
//!    sleep loops with a fixed attempt budget.
//!
//! 5. **Failure classification.** [`FailureClassifier`] maps an external tool's
//!    error text onto [`FailureKind`]. Matching is best-effort; the pattern
//!    lists are configuration.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `capd-*` crates (this is the leaf of the DAG).
//! - No process spawning or network I/O. The only side effect is sleeping
//!   between polling attempts.
//! - No `.unwrap()` outside tests.

pub mod classify;
pub mod error;
pub mod fallback;
pub mod region;
pub mod resource;
pub mod retry;
pub mod select;

pub use classify::{FailureClassifier, FailureKind};
pub use error::{CapdError, ExternalError};
pub use fallback::create_with_fallback;
pub use region::{parse_region_list, AllowedRegions, RegionId};
pub use resource::{Provenance, ResourceDescriptor, ResourceKind};
pub use retry::{retry, wait_until_ready, RetryPolicy};
pub use select::select_region;
