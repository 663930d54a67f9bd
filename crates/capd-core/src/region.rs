//! # Region Identifiers
//!
//! `RegionId` is the only way a region name travels through the deployer.
//! Parsing normalizes case and whitespace, so `" WestEurope "` and
//! `"westeurope"` are the same region.
//!
//! `AllowedRegions` preserves the order in which the platform reported the
//! regions. That order is the tie-breaker for selection and the iteration order
//! for fallback, so it is never sorted.

use serde::{Deserialize, Serialize};

use crate::error::CapdError;

/// A validated, lower-case region identifier (e.g. `francecentral`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RegionId(String);

impl RegionId {
    /// Parse a region identifier, trimming and lower-casing it.
    ///
    /// # Errors
    ///
    /// Returns [`CapdError::InvalidRegion`] if the result is empty or contains
    /// anything other than ASCII letters and digits.
    pub fn parse(raw: &str) -> Result<Self, CapdError> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized.is_empty()
            || !normalized
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(CapdError::InvalidRegion(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    /// Parse a location as the platform prints it. Display names such as
    /// `"France Central"` lose their inner whitespace and map to the same
    /// identifier as `"francecentral"`.
    pub fn from_location(raw: &str) -> Result<Self, CapdError> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        Self::parse(&compact).map_err(|_| CapdError::InvalidRegion(raw.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RegionId {
    type Err = CapdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RegionId {
    type Error = CapdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RegionId> for String {
    fn from(value: RegionId) -> Self {
        value.0
    }
}

/// Parse a whitespace- or comma-separated list of regions, keeping order.
///
/// Duplicates are kept; callers that need set semantics collect into
/// [`AllowedRegions`].
pub fn parse_region_list(raw: &str) -> Result<Vec<RegionId>, CapdError> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(RegionId::parse)
        .collect()
}

/// The set of regions in which creation is permitted, in retrieval order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedRegions {
    regions: Vec<RegionId>,
}

impl AllowedRegions {
    /// Build an allow-list, dropping repeated entries after their first
    /// occurrence.
    pub fn new(regions: impl IntoIterator<Item = RegionId>) -> Self {
        let mut out: Vec<RegionId> = Vec::new();
        for region in regions {
            if !out.contains(&region) {
                out.push(region);
            }
        }
        Self { regions: out }
    }

    /// Build an allow-list from raw platform output, accepting display names
    /// and skipping entries that are not locations.
    pub fn from_raw<'a>(raw: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(raw.into_iter().filter_map(|r| {
            RegionId::from_location(r)
                .map_err(|e| tracing::debug!("ignoring region entry: {e}"))
                .ok()
        }))
    }

    /// Whether `region` is allowed.
    pub fn contains(&self, region: &RegionId) -> bool {
        self.regions.contains(region)
    }

    /// The first region in retrieval order.
    pub fn first(&self) -> Option<&RegionId> {
        self.regions.first()
    }

    /// Iterate in retrieval order.
    pub fn iter(&self) -> std::slice::Iter<'_, RegionId> {
        self.regions.iter()
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl FromIterator<RegionId> for AllowedRegions {
    fn from_iter<T: IntoIterator<Item = RegionId>>(iter: T) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a AllowedRegions {
    type Item = &'a RegionId;
    type IntoIter = std::slice::Iter<'a, RegionId>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}

impl std::fmt::Display for AllowedRegions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.regions.iter().map(RegionId::as_str).collect();
        f.write_str(&names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_normalizes_case_and_whitespace() {
        let r = RegionId::parse("  WestEurope\n").unwrap();
        assert_eq!(r.as_str(), "westeurope");
        assert_eq!(r.to_string(), "westeurope");
    }

    #[test]
    fn parse_rejects_empty_and_punctuation() {
        assert!(RegionId::parse("").is_err());
        assert!(RegionId::parse("   ").is_err());
        assert!(RegionId::parse("west-europe").is_err());
        assert!(RegionId::parse("west europe").is_err());
    }

    #[test]
    fn parse_accepts_digits() {
        assert_eq!(RegionId::parse("eastus2").unwrap().as_str(), "eastus2");
    }

    #[test]
    fn region_list_splits_on_spaces_and_commas() {
        let list = parse_region_list("francecentral  westeurope,northeurope\tuksouth").unwrap();
        let names: Vec<&str> = list.iter().map(RegionId::as_str).collect();
        assert_eq!(names, ["francecentral", "westeurope", "northeurope", "uksouth"]);
    }

    #[test]
    fn region_list_empty_is_empty() {
        assert!(parse_region_list("  ").unwrap().is_empty());
    }

    #[test]
    fn region_list_propagates_invalid_entry() {
        assert!(parse_region_list("westeurope france-central").is_err());
    }

    #[test]
    fn allowed_regions_dedup_keeps_first_occurrence() {
        let allowed = AllowedRegions::from_raw(["uksouth", "eastus", "UKSOUTH", "westeurope"]);
        let names: Vec<&str> = allowed.iter().map(RegionId::as_str).collect();
        assert_eq!(names, ["uksouth", "eastus", "westeurope"]);
        assert_eq!(allowed.first().unwrap().as_str(), "uksouth");
    }

    #[test]
    fn allowed_regions_skip_garbage() {
        let allowed = AllowedRegions::from_raw(["", "  ", "uk-south", "eastus"]);
        assert_eq!(allowed.len(), 1);
        assert!(allowed.contains(&RegionId::parse("eastus").unwrap()));
    }

    #[test]
    fn allowed_regions_accept_display_names() {
        let allowed = AllowedRegions::from_raw(["France Central", "UK South", "francecentral"]);
        let names: Vec<&str> = allowed.iter().map(RegionId::as_str).collect();
        assert_eq!(names, ["francecentral", "uksouth"]);
    }

    #[test]
    fn location_keeps_original_text_in_error() {
        match RegionId::from_location("West-Europe") {
            Err(CapdError::InvalidRegion(raw)) => assert_eq!(raw, "West-Europe"),
            other => panic!("expected invalid region, got {other:?}"),
        }
    }

    #[test]
    fn allowed_regions_display_is_space_separated() {
        let allowed = AllowedRegions::from_raw(["uksouth", "eastus"]);
        assert_eq!(allowed.to_string(), "uksouth eastus");
    }

    proptest! {
        #[test]
        fn parse_is_idempotent(name in "[a-zA-Z][a-zA-Z0-9]{0,20}") {
            let once = RegionId::parse(&name).unwrap();
            let twice = RegionId::parse(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn allowed_regions_never_contain_duplicates(
            names in prop::collection::vec("[a-c]{1,2}", 0..12)
        ) {
            let allowed = AllowedRegions::from_raw(names.iter().map(String::as_str));
            let mut seen = std::collections::HashSet::new();
            for r in &allowed {
                prop_assert!(seen.insert(r.clone()));
            }
        }
    }
}
