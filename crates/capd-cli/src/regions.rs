//! # Region Planning
//!
//! Resolves the allow-list and picks the deployment region. Used by both
//! `capd deploy` (stages 2 and 3) and the read-only `capd regions`.

use serde::Serialize;

use capd_az::{AzCli, CommandRunner};
use capd_core::{select_region, AllowedRegions, CapdError, ExternalError, RegionId};

/// Where the allow-list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowListSource {
    /// Allowed-locations policy assignments.
    Policy,
    /// No policy restricts locations; every physical region is allowed.
    Physical,
}

impl std::fmt::Display for AllowListSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Policy => "policy assignments",
            Self::Physical => "physical regions",
        })
    }
}

/// How the deployment region was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionChoice {
    /// Pinned with `LOCATION`.
    Pinned,
    /// First preference present in the allow-list.
    Preferred,
    /// No preference matched; first allow-list entry.
    FirstAllowed,
}

/// Outcome of stages 2 and 3.
#[derive(Debug, Clone, Serialize)]
pub struct RegionPlan {
    pub allowed: AllowedRegions,
    pub source: AllowListSource,
    pub preferences: Vec<RegionId>,
    pub selected: RegionId,
    pub choice: RegionChoice,
}

impl RegionPlan {
    /// Human-readable rendering for `--output text`.
    pub fn render_text(&self) -> String {
        let prefs = self
            .preferences
            .iter()
            .map(RegionId::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let choice = match self.choice {
            RegionChoice::Pinned => "pinned by LOCATION",
            RegionChoice::Preferred => "first allowed preference",
            RegionChoice::FirstAllowed => "no preference allowed, first allowed region",
        };
        format!(
            "Allowed regions ({}): {}\nPreferred regions: {}\nSelected region: {} ({})\n",
            self.source,
            display_allowed(&self.allowed),
            prefs,
            self.selected,
            choice,
        )
    }
}

/// The allow-list for display; `<none>` when empty.
pub(crate) fn display_allowed(allowed: &AllowedRegions) -> String {
    if allowed.is_empty() {
        "<none>".to_string()
    } else {
        allowed.to_string()
    }
}

/// Allowed regions from policy, or every physical region if no policy
/// restricts locations.
pub fn resolve_allowed<R: CommandRunner>(
    az: &AzCli<R>,
) -> Result<(AllowedRegions, AllowListSource), ExternalError> {
    let policy = az.policy_allowed_locations()?;
    if !policy.is_empty() {
        tracing::info!(regions = %policy, "allow-list from policy assignments");
        return Ok((policy, AllowListSource::Policy));
    }
    let physical = az.physical_locations()?;
    tracing::info!(count = physical.len(), "no allowed-locations policy, using physical regions");
    Ok((physical, AllowListSource::Physical))
}

/// Pick the region: `pinned` if given, otherwise the first preference in the
/// allow-list, otherwise the first allowed region.
///
/// A pinned region outside a non-empty allow-list is still used; only a
/// warning is logged.
pub fn choose_region(
    pinned: Option<&RegionId>,
    preferences: &[RegionId],
    allowed: &AllowedRegions,
) -> Result<(RegionId, RegionChoice), CapdError> {
    if let Some(region) = pinned {
        if !allowed.is_empty() && !allowed.contains(region) {
            tracing::warn!(%region, allowed = %allowed, "LOCATION is not in the allow-list");
        }
        return Ok((region.clone(), RegionChoice::Pinned));
    }
    let selected = select_region(preferences, allowed)?;
    let choice = if preferences.contains(&selected) {
        RegionChoice::Preferred
    } else {
        RegionChoice::FirstAllowed
    };
    Ok((selected, choice))
}
