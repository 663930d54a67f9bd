//! # Typed `az` Operations
//!
//! [`AzCli`] wraps one [`CommandRunner`] and one [`FailureClassifier`] and
//! exposes the handful of control-plane calls a deployment needs. Each method
//! builds a single invocation, runs it, and parses the `tsv`/`json` output.
//!
//! Conventions:
//!
//! - `*_location` methods are existence checks. A not-found failure or empty
//!   output is `Ok(None)`; anything else that fails is an error.
//! - `create_*` methods are not idempotent on their own; callers check
//!   existence first and route creation through `create_with_fallback`.
//! - Mutating calls use `-o none` so only errors produce output.

use capd_core::{AllowedRegions, ExternalError, FailureClassifier, RegionId};
use serde::Deserialize;

use crate::invocation::Invocation;
use crate::output::{self, location_to_region, scalar, tsv_values, unexpected};
use crate::runner::{execute, CommandRunner};

/// Error text meaning "the resource does not exist".
const NOT_FOUND_PATTERNS: &[&str] = &[
    "resourcenotfound",
    "resourcegroupnotfound",
    "could not be found",
    "was not found",
];

/// Error text that is harmless for registrations and extension installs.
const ALREADY_DONE_PATTERNS: &[&str] = &["already registered", "already installed", "already exists"];

/// Resource providers a container app deployment touches.
pub const REQUIRED_PROVIDERS: &[&str] = &[
    "Microsoft.App",
    "Microsoft.OperationalInsights",
    "Microsoft.ContainerRegistry",
    "Microsoft.Insights",
];

/// CLI extensions the container app and telemetry commands live in.
pub const REQUIRED_EXTENSIONS: &[&str] = &["containerapp", "application-insights"];

/// Registry pull credentials.
///
/// Custom `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Identifiers of a log workspace needed by dependent resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceIds {
    /// Full ARM resource id (telemetry components link to this).
    pub resource_id: String,
    /// Customer id (hosting environments link to this).
    pub customer_id: String,
}

/// Everything `containerapp create`/`update` needs.
#[derive(Debug, Clone)]
pub struct AppSpec {
    pub name: String,
    pub resource_group: String,
    pub environment: String,
    pub image: String,
    pub target_port: u16,
    pub registry: RegistryCredentials,
    pub cpu: String,
    pub memory: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Secret name/value pairs.
    pub secrets: Vec<(String, String)>,
    /// Plain environment variables (values may be `secretref:<name>`).
    pub env_vars: Vec<(String, String)>,
}

/// One policy assignment as listed by `az policy assignment list -o json`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolicyAssignment {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    parameters: Option<serde_json::Value>,
}

/// Extract `listOfAllowedLocations` values from a policy assignment listing.
///
/// Every assignment that carries the parameter contributes, in listing order,
/// which covers both built-in "Allowed locations" definitions and custom ones
/// reusing the parameter name.
pub fn allowed_locations_from_policies(json: &str) -> Result<Vec<String>, serde_json::Error> {
    let assignments: Vec<PolicyAssignment> = output::json(json)?;
    let mut locations = Vec::new();
    for assignment in assignments {
        let values = assignment
            .parameters
            .as_ref()
            .and_then(|p| p.get("listOfAllowedLocations"))
            .and_then(|p| p.get("value"))
            .and_then(serde_json::Value::as_array);
        if let Some(values) = values {
            tracing::debug!(
                assignment = assignment.display_name.as_deref().unwrap_or("<unnamed>"),
                count = values.len(),
                "allowed-locations policy assignment"
            );
            locations.extend(values.iter().filter_map(|v| v.as_str().map(str::to_string)));
        }
    }
    Ok(locations)
}

/// Typed front-end over the `az` command-line tool.
pub struct AzCli<R> {
    runner: R,
    classifier: FailureClassifier,
}

impl<R: CommandRunner> AzCli<R> {
    pub fn new(runner: R, classifier: FailureClassifier) -> Self {
        Self { runner, classifier }
    }

    pub fn classifier(&self) -> &FailureClassifier {
        &self.classifier
    }

    /// Run any invocation (not necessarily `az`) through this runner.
    pub fn run(&self, invocation: &Invocation) -> Result<String, ExternalError> {
        execute(&self.runner, invocation, &self.classifier)
    }

    /// Run an existence/scalar query; not-found and empty output are `None`.
    fn show(&self, invocation: &Invocation) -> Result<Option<String>, ExternalError> {
        match self.run(invocation) {
            Ok(stdout) => Ok(scalar(&stdout)),
            Err(e) if matches_any(&e.stderr, NOT_FOUND_PATTERNS) => {
                tracing::debug!(command = %invocation, "resource not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Run a scalar query whose result must be present.
    fn require(&self, invocation: &Invocation) -> Result<String, ExternalError> {
        scalar(&self.run(invocation)?).ok_or_else(|| unexpected(invocation, "empty result"))
    }

    fn show_location(&self, invocation: Invocation) -> Result<Option<RegionId>, ExternalError> {
        match self.show(&invocation)? {
            None => Ok(None),
            Some(raw) => location_to_region(&raw)
                .map(Some)
                .ok_or_else(|| unexpected(&invocation, format!("unrecognized location {raw:?}"))),
        }
    }

    /// Run a call whose "already done" failures are harmless.
    fn tolerant(&self, invocation: &Invocation) -> Result<(), ExternalError> {
        match self.run(invocation) {
            Ok(_) => Ok(()),
            Err(e) if matches_any(&e.stderr, ALREADY_DONE_PATTERNS) => {
                tracing::warn!(command = %invocation, "ignoring tolerated failure: {}", e.stderr);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // -- Account and platform ------------------------------------------------

    /// The active subscription id. Fails if the CLI is not logged in.
    pub fn subscription_id(&self) -> Result<String, ExternalError> {
        self.require(&Invocation::az(["account", "show"]).opt("--query", "id").opt("-o", "tsv"))
    }

    pub fn register_provider(&self, namespace: &str) -> Result<(), ExternalError> {
        self.tolerant(
            &Invocation::az(["provider", "register"])
                .opt("--namespace", namespace)
                .arg("--wait")
                .opt("-o", "none"),
        )
    }

    pub fn add_extension(&self, name: &str) -> Result<(), ExternalError> {
        self.tolerant(
            &Invocation::az(["extension", "add"])
                .opt("--name", name)
                .args(["--upgrade", "--yes", "--only-show-errors"]),
        )
    }

    /// Regions permitted by allowed-locations policy assignments, in listing
    /// order. Empty if no such policy is assigned.
    pub fn policy_allowed_locations(&self) -> Result<AllowedRegions, ExternalError> {
        let inv = Invocation::az(["policy", "assignment", "list"])
            .arg("--disable-scope-strict-match")
            .opt("-o", "json");
        let stdout = self.run(&inv)?;
        let raw = allowed_locations_from_policies(&stdout).map_err(|e| unexpected(&inv, e))?;
        Ok(AllowedRegions::from_raw(raw.iter().map(String::as_str)))
    }

    /// Every physical region the subscription can see, in platform order.
    pub fn physical_locations(&self) -> Result<AllowedRegions, ExternalError> {
        let stdout = self.run(
            &Invocation::az(["account", "list-locations"])
                .opt("--query", "[?metadata.regionType=='Physical'].name")
                .opt("-o", "tsv"),
        )?;
        let raw = tsv_values(&stdout);
        Ok(AllowedRegions::from_raw(raw.iter().map(String::as_str)))
    }

    // -- Resource group ------------------------------------------------------

    pub fn group_location(&self, group: &str) -> Result<Option<RegionId>, ExternalError> {
        self.show_location(
            Invocation::az(["group", "show"])
                .opt("--name", group)
                .opt("--query", "location")
                .opt("-o", "tsv"),
        )
    }

    pub fn create_group(&self, group: &str, region: &RegionId) -> Result<(), ExternalError> {
        self.run(
            &Invocation::az(["group", "create"])
                .opt("--name", group)
                .opt("--location", region.as_str())
                .opt("-o", "none"),
        )
        .map(drop)
    }

    // -- Registry ------------------------------------------------------------

    pub fn registry_location(
        &self,
        registry: &str,
        group: &str,
    ) -> Result<Option<RegionId>, ExternalError> {
        self.show_location(
            Invocation::az(["acr", "show"])
                .opt("--name", registry)
                .opt("--resource-group", group)
                .opt("--query", "location")
                .opt("-o", "tsv"),
        )
    }

    pub fn create_registry(
        &self,
        registry: &str,
        group: &str,
        sku: &str,
        region: &RegionId,
    ) -> Result<(), ExternalError> {
        self.run(
            &Invocation::az(["acr", "create"])
                .opt("--name", registry)
                .opt("--resource-group", group)
                .opt("--sku", sku)
                .opt("--location", region.as_str())
                .opt("--admin-enabled", "true")
                .opt("-o", "none"),
        )
        .map(drop)
    }

    pub fn enable_registry_admin(&self, registry: &str, group: &str) -> Result<(), ExternalError> {
        self.run(
            &Invocation::az(["acr", "update"])
                .opt("--name", registry)
                .opt("--resource-group", group)
                .opt("--admin-enabled", "true")
                .opt("-o", "none"),
        )
        .map(drop)
    }

    pub fn registry_login_server(&self, registry: &str, group: &str) -> Result<String, ExternalError> {
        self.require(
            &Invocation::az(["acr", "show"])
                .opt("--name", registry)
                .opt("--resource-group", group)
                .opt("--query", "loginServer")
                .opt("-o", "tsv"),
        )
    }

    /// Admin credentials; the registry must have the admin user enabled.
    pub fn registry_credentials(
        &self,
        registry: &str,
        group: &str,
        server: &str,
    ) -> Result<RegistryCredentials, ExternalError> {
        let inv = Invocation::az(["acr", "credential", "show"])
            .opt("--name", registry)
            .opt("--resource-group", group)
            .opt("--query", "[username, passwords[0].value]")
            .opt("-o", "tsv");
        let values = tsv_values(&self.run(&inv)?);
        match values.as_slice() {
            [username, password] => Ok(RegistryCredentials {
                server: server.to_string(),
                username: username.clone(),
                password: password.clone(),
            }),
            other => Err(unexpected(
                &inv,
                format!("expected username and password, got {} values", other.len()),
            )),
        }
    }

    // -- Log workspace -------------------------------------------------------

    pub fn workspace_location(
        &self,
        workspace: &str,
        group: &str,
    ) -> Result<Option<RegionId>, ExternalError> {
        self.show_location(
            Invocation::az(["monitor", "log-analytics", "workspace", "show"])
                .opt("--workspace-name", workspace)
                .opt("--resource-group", group)
                .opt("--query", "location")
                .opt("-o", "tsv"),
        )
    }

    pub fn create_workspace(
        &self,
        workspace: &str,
        group: &str,
        region: &RegionId,
    ) -> Result<(), ExternalError> {
        self.run(
            &Invocation::az(["monitor", "log-analytics", "workspace", "create"])
                .opt("--workspace-name", workspace)
                .opt("--resource-group", group)
                .opt("--location", region.as_str())
                .opt("-o", "none"),
        )
        .map(drop)
    }

    pub fn workspace_ids(&self, workspace: &str, group: &str) -> Result<WorkspaceIds, ExternalError> {
        let inv = Invocation::az(["monitor", "log-analytics", "workspace", "show"])
            .opt("--workspace-name", workspace)
            .opt("--resource-group", group)
            .opt("--query", "[id, customerId]")
            .opt("-o", "tsv");
        let values = tsv_values(&self.run(&inv)?);
        match values.as_slice() {
            [resource_id, customer_id] => Ok(WorkspaceIds {
                resource_id: resource_id.clone(),
                customer_id: customer_id.clone(),
            }),
            other => Err(unexpected(
                &inv,
                format!("expected id and customerId, got {} values", other.len()),
            )),
        }
    }

    pub fn workspace_shared_key(&self, workspace: &str, group: &str) -> Result<String, ExternalError> {
        self.require(
            &Invocation::az(["monitor", "log-analytics", "workspace", "get-shared-keys"])
                .opt("--workspace-name", workspace)
                .opt("--resource-group", group)
                .opt("--query", "primarySharedKey")
                .opt("-o", "tsv"),
        )
    }

    // -- Telemetry -----------------------------------------------------------

    pub fn telemetry_location(
        &self,
        component: &str,
        group: &str,
    ) -> Result<Option<RegionId>, ExternalError> {
        self.show_location(
            Invocation::az(["monitor", "app-insights", "component", "show"])
                .opt("--app", component)
                .opt("--resource-group", group)
                .opt("--query", "location")
                .opt("-o", "tsv"),
        )
    }

    pub fn create_telemetry(
        &self,
        component: &str,
        group: &str,
        region: &RegionId,
        workspace_resource_id: &str,
    ) -> Result<(), ExternalError> {
        self.run(
            &Invocation::az(["monitor", "app-insights", "component", "create"])
                .opt("--app", component)
                .opt("--resource-group", group)
                .opt("--location", region.as_str())
                .opt("--workspace", workspace_resource_id)
                .opt("--application-type", "web")
                .opt("-o", "none"),
        )
        .map(drop)
    }

    pub fn telemetry_connection_string(
        &self,
        component: &str,
        group: &str,
    ) -> Result<String, ExternalError> {
        self.require(
            &Invocation::az(["monitor", "app-insights", "component", "show"])
                .opt("--app", component)
                .opt("--resource-group", group)
                .opt("--query", "connectionString")
                .opt("-o", "tsv"),
        )
    }

    // -- Hosting environment -------------------------------------------------

    pub fn environment_location(
        &self,
        environment: &str,
        group: &str,
    ) -> Result<Option<RegionId>, ExternalError> {
        self.show_location(
            Invocation::az(["containerapp", "env", "show"])
                .opt("--name", environment)
                .opt("--resource-group", group)
                .opt("--query", "location")
                .opt("-o", "tsv"),
        )
    }

    /// Start environment creation without waiting for provisioning to finish.
    /// Policy refusals still surface synchronously.
    pub fn create_environment(
        &self,
        environment: &str,
        group: &str,
        region: &RegionId,
        workspace: &WorkspaceIds,
        shared_key: &str,
    ) -> Result<(), ExternalError> {
        self.run(
            &Invocation::az(["containerapp", "env", "create"])
                .opt("--name", environment)
                .opt("--resource-group", group)
                .opt("--location", region.as_str())
                .opt("--logs-workspace-id", workspace.customer_id.as_str())
                .opt("--logs-workspace-key", shared_key)
                .arg("--no-wait")
                .opt("-o", "none"),
        )
        .map(drop)
    }

    pub fn environment_state(
        &self,
        environment: &str,
        group: &str,
    ) -> Result<Option<String>, ExternalError> {
        self.show(
            &Invocation::az(["containerapp", "env", "show"])
                .opt("--name", environment)
                .opt("--resource-group", group)
                .opt("--query", "properties.provisioningState")
                .opt("-o", "tsv"),
        )
    }

    // -- Application ---------------------------------------------------------

    pub fn app_location(&self, app: &str, group: &str) -> Result<Option<RegionId>, ExternalError> {
        self.show_location(
            Invocation::az(["containerapp", "show"])
                .opt("--name", app)
                .opt("--resource-group", group)
                .opt("--query", "location")
                .opt("-o", "tsv"),
        )
    }

    /// Create the application; returns its ingress FQDN if one was assigned.
    pub fn create_app(&self, spec: &AppSpec) -> Result<Option<String>, ExternalError> {
        let mut inv = Invocation::az(["containerapp", "create"])
            .opt("--name", spec.name.as_str())
            .opt("--resource-group", spec.resource_group.as_str())
            .opt("--environment", spec.environment.as_str())
            .opt("--image", spec.image.as_str())
            .opt("--target-port", spec.target_port.to_string())
            .opt("--ingress", "external")
            .opt("--registry-server", spec.registry.server.as_str())
            .opt("--registry-username", spec.registry.username.as_str())
            .opt("--registry-password", spec.registry.password.as_str())
            .opt("--cpu", spec.cpu.as_str())
            .opt("--memory", spec.memory.as_str())
            .opt("--min-replicas", spec.min_replicas.to_string())
            .opt("--max-replicas", spec.max_replicas.to_string());
        if !spec.secrets.is_empty() {
            inv = inv.arg("--secrets").args(pairs(&spec.secrets));
        }
        if !spec.env_vars.is_empty() {
            inv = inv.arg("--env-vars").args(pairs(&spec.env_vars));
        }
        let inv = inv
            .opt("--query", "properties.configuration.ingress.fqdn")
            .opt("-o", "tsv");
        Ok(scalar(&self.run(&inv)?))
    }

    /// Roll an existing application to a new image and settings; returns its
    /// ingress FQDN.
    pub fn update_app(&self, spec: &AppSpec) -> Result<Option<String>, ExternalError> {
        self.run(
            &Invocation::az(["containerapp", "registry", "set"])
                .opt("--name", spec.name.as_str())
                .opt("--resource-group", spec.resource_group.as_str())
                .opt("--server", spec.registry.server.as_str())
                .opt("--username", spec.registry.username.as_str())
                .opt("--password", spec.registry.password.as_str())
                .opt("-o", "none"),
        )?;
        if !spec.secrets.is_empty() {
            self.run(
                &Invocation::az(["containerapp", "secret", "set"])
                    .opt("--name", spec.name.as_str())
                    .opt("--resource-group", spec.resource_group.as_str())
                    .arg("--secrets")
                    .args(pairs(&spec.secrets))
                    .opt("-o", "none"),
            )?;
        }
        let mut inv = Invocation::az(["containerapp", "update"])
            .opt("--name", spec.name.as_str())
            .opt("--resource-group", spec.resource_group.as_str())
            .opt("--image", spec.image.as_str())
            .opt("--cpu", spec.cpu.as_str())
            .opt("--memory", spec.memory.as_str())
            .opt("--min-replicas", spec.min_replicas.to_string())
            .opt("--max-replicas", spec.max_replicas.to_string());
        if !spec.env_vars.is_empty() {
            inv = inv.arg("--set-env-vars").args(pairs(&spec.env_vars));
        }
        let inv = inv
            .opt("--query", "properties.configuration.ingress.fqdn")
            .opt("-o", "tsv");
        Ok(scalar(&self.run(&inv)?))
    }

    pub fn app_state(&self, app: &str, group: &str) -> Result<Option<String>, ExternalError> {
        self.show(
            &Invocation::az(["containerapp", "show"])
                .opt("--name", app)
                .opt("--resource-group", group)
                .opt("--query", "properties.provisioningState")
                .opt("-o", "tsv"),
        )
    }

    pub fn app_fqdn(&self, app: &str, group: &str) -> Result<Option<String>, ExternalError> {
        self.show(
            &Invocation::az(["containerapp", "show"])
                .opt("--name", app)
                .opt("--resource-group", group)
                .opt("--query", "properties.configuration.ingress.fqdn")
                .opt("-o", "tsv"),
        )
    }
}

fn pairs(values: &[(String, String)]) -> impl Iterator<Item = String> + '_ {
    values.iter().map(|(k, v)| format!("{k}={v}"))
}

fn matches_any(text: &str, patterns: &[&str]) -> bool {
    let haystack = text.to_lowercase();
    patterns.iter().any(|p| haystack.contains(p))
}
