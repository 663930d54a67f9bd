//! # Region Selection and Fallback Scenarios
//!
//! End-to-end checks of the selector and the fallback walk through the public
//! API only, using the region names operators actually configure.

use capd_core::{
    create_with_fallback, parse_region_list, select_region, AllowedRegions, CapdError,
    ExternalError, FailureClassifier, FailureKind, RegionId, ResourceKind,
};

fn regions(raw: &str) -> Vec<RegionId> {
    parse_region_list(raw).expect("valid region list")
}

fn allowed(raw: &str) -> AllowedRegions {
    AllowedRegions::new(regions(raw))
}

/// Simulates the control plane refusing some regions with its real error text.
fn platform_create(
    denied: &[&str],
    region: &RegionId,
    classifier: &FailureClassifier,
) -> Result<String, ExternalError> {
    if denied.contains(&region.as_str()) {
        let stderr = format!(
            "ERROR: (RequestDisallowedByPolicy) Resource 'acrbankchurn' was disallowed by policy \
             in location '{region}'."
        );
        return Err(ExternalError {
            kind: classifier.classify(&stderr),
            command: format!("az acr create --location {region}"),
            status: Some(1),
            stderr,
        });
    }
    Ok(format!("/subscriptions/x/resourceGroups/rg/providers/acr@{region}"))
}

#[test]
fn preferred_region_inside_allow_list_is_selected() {
    let got = select_region(
        &regions("westeurope francecentral"),
        &allowed("francecentral uksouth"),
    )
    .unwrap();
    assert_eq!(got.as_str(), "francecentral");
}

#[test]
fn no_preferred_region_allowed_selects_first_reported() {
    let got = select_region(&regions("westeurope"), &allowed("uksouth eastus")).unwrap();
    assert_eq!(got.as_str(), "uksouth");
}

#[test]
fn empty_allow_list_has_no_region() {
    let err = select_region(&regions("westeurope"), &AllowedRegions::default()).unwrap_err();
    assert!(matches!(err, CapdError::NoRegionAvailable));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn rejected_initial_region_falls_back_to_second_candidate() {
    let classifier = FailureClassifier::default();
    let allow = allowed("westeurope francecentral uksouth");
    let initial = select_region(&regions("westeurope"), &allow).unwrap();

    let mut attempts = Vec::new();
    let (region, handle) = create_with_fallback(ResourceKind::Registry, &initial, &allow, |r| {
        attempts.push(r.to_string());
        platform_create(&["westeurope"], r, &classifier)
    })
    .unwrap();

    assert_eq!(region.as_str(), "francecentral");
    assert!(handle.ends_with("acr@francecentral"));
    assert_eq!(attempts, ["westeurope", "francecentral"]);
}

#[test]
fn every_region_denied_exhausts_with_exit_code_one() {
    let classifier = FailureClassifier::default();
    let allow = allowed("westeurope uksouth");
    let err = create_with_fallback(
        ResourceKind::Registry,
        &RegionId::parse("westeurope").unwrap(),
        &allow,
        |r| platform_create(&["westeurope", "uksouth"], r, &classifier),
    )
    .unwrap_err();

    assert_eq!(err.exit_code(), 1);
    match err {
        CapdError::ResourceCreationExhausted { tried, last, .. } => {
            assert_eq!(tried.len(), 2);
            assert_eq!(last.kind, FailureKind::PolicyRejection);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[test]
fn fatal_failure_keeps_the_tool_exit_status() {
    let allow = allowed("westeurope uksouth");
    let err = create_with_fallback(
        ResourceKind::LogWorkspace,
        &RegionId::parse("westeurope").unwrap(),
        &allow,
        |r| {
            Err::<(), _>(ExternalError {
                kind: FailureKind::Fatal,
                command: format!("az monitor log-analytics workspace create --location {r}"),
                status: Some(2),
                stderr: "ERROR: the following arguments are required: --workspace-name".into(),
            })
        },
    )
    .unwrap_err();
    assert_eq!(err.exit_code(), 2);
}
