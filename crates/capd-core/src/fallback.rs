//! # Policy-Rejection Fallback
//!
//! Creation is attempted in the initial region first, then in every other
//! allowed region in retrieval order. Only policy rejections move on to the
//! next candidate; any other failure is returned as-is. The first success
//! stops the walk.

use crate::error::{CapdError, ExternalError};
use crate::region::{AllowedRegions, RegionId};
use crate::resource::ResourceKind;

/// Create a resource, falling back across the allow-list on policy rejection.
///
/// `initial` does not have to be a member of `allowed` (a pinned region is
/// tried even if the policy query did not list it).
///
/// # Errors
///
/// - [`CapdError::External`] for the first non-policy failure.
/// - [`CapdError::ResourceCreationExhausted`] if every candidate was rejected.
pub fn create_with_fallback<T, F>(
    kind: ResourceKind,
    initial: &RegionId,
    allowed: &AllowedRegions,
    mut create: F,
) -> Result<(RegionId, T), CapdError>
where
    F: FnMut(&RegionId) -> Result<T, ExternalError>,
{
    let candidates = std::iter::once(initial).chain(allowed.iter().filter(|r| *r != initial));

    let mut tried: Vec<RegionId> = Vec::new();
    let mut last_rejection: Option<ExternalError> = None;

    for region in candidates {
        tried.push(region.clone());
        tracing::debug!(%kind, %region, attempt = tried.len(), "attempting creation");
        match create(region) {
            Ok(handle) => {
                if tried.len() > 1 {
                    tracing::info!(%kind, %region, "created after region fallback");
                }
                return Ok((region.clone(), handle));
            }
            Err(e) if e.is_policy_rejection() => {
                tracing::warn!(%kind, %region, "region rejected by policy, trying next allowed region");
                last_rejection = Some(e);
            }
            Err(e) => return Err(CapdError::External(e)),
        }
    }

    // The candidate iterator always yields `initial`, so a rejection was recorded.
    let last = last_rejection.map(Box::new).ok_or(CapdError::NoRegionAvailable)?;
    Err(CapdError::ResourceCreationExhausted { kind, tried, last })
}
