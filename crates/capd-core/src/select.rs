//! Region selection: preference list intersected with the allow-list.

use crate::error::CapdError;
use crate::region::{AllowedRegions, RegionId};

/// Pick the deployment region.
///
/// Returns the first entry of `preferences` that is allowed. If none is, falls
/// back to the first allowed region in the order the platform reported it.
///
/// # Errors
///
/// [`CapdError::NoRegionAvailable`] if `allowed` is empty.
pub fn select_region(
    preferences: &[RegionId],
    allowed: &AllowedRegions,
) -> Result<RegionId, CapdError> {
    if let Some(preferred) = preferences.iter().find(|r| allowed.contains(r)) {
        tracing::debug!(region = %preferred, "preferred region is allowed");
        return Ok(preferred.clone());
    }
    let fallback = allowed.first().ok_or(CapdError::NoRegionAvailable)?;
    tracing::info!(
        region = %fallback,
        "no preferred region is allowed; using the first allowed region"
    );
    Ok(fallback.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::parse_region_list;
    use proptest::prelude::*;

    fn regions(raw: &str) -> Vec<RegionId> {
        parse_region_list(raw).unwrap()
    }

    fn allowed(raw: &str) -> AllowedRegions {
        AllowedRegions::new(regions(raw))
    }

    #[test]
    fn first_allowed_preference_wins() {
        let got = select_region(
            &regions("westeurope francecentral"),
            &allowed("francecentral uksouth"),
        )
        .unwrap();
        assert_eq!(got.as_str(), "francecentral");
    }

    #[test]
    fn preference_order_beats_allow_list_order() {
        let got = select_region(
            &regions("uksouth francecentral"),
            &allowed("francecentral uksouth"),
        )
        .unwrap();
        assert_eq!(got.as_str(), "uksouth");
    }

    #[test]
    fn disjoint_preferences_take_first_allowed() {
        let got = select_region(&regions("westeurope"), &allowed("uksouth eastus")).unwrap();
        assert_eq!(got.as_str(), "uksouth");
    }

    #[test]
    fn empty_preferences_take_first_allowed() {
        let got = select_region(&[], &allowed("eastus uksouth")).unwrap();
        assert_eq!(got.as_str(), "eastus");
    }

    #[test]
    fn empty_allow_list_fails() {
        let err = select_region(&regions("westeurope"), &AllowedRegions::default()).unwrap_err();
        assert!(matches!(err, CapdError::NoRegionAvailable));
    }

    fn region_strategy() -> impl Strategy<Value = RegionId> {
        "[a-f]{1,3}".prop_map(|s| RegionId::parse(&s).unwrap())
    }

    proptest! {
        #[test]
        fn result_is_first_allowed_preference(
            prefs in prop::collection::vec(region_strategy(), 0..8),
            allow in prop::collection::vec(region_strategy(), 1..8),
        ) {
            let allowed = AllowedRegions::new(allow);
            let got = select_region(&prefs, &allowed).unwrap();
            match prefs.iter().find(|p| allowed.contains(p)) {
                Some(expected) => prop_assert_eq!(&got, expected),
                None => prop_assert_eq!(Some(&got), allowed.first()),
            }
        }

        #[test]
        fn result_is_always_allowed(
            prefs in prop::collection::vec(region_strategy(), 0..8),
            allow in prop::collection::vec(region_strategy(), 1..8),
        ) {
            let allowed = AllowedRegions::new(allow);
            let got = select_region(&prefs, &allowed).unwrap();
            prop_assert!(allowed.contains(&got));
        }
    }
}
