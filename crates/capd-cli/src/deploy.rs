//! # Deployment Pipeline
//!
//! [`Deployer`] runs the stages strictly in order, each one announced with a
//! banner. Every stage either reuses what already exists or creates it,
//! so re-running after a partial failure picks up where the last run stopped.
//!
//! ## Stages
//!
//! 1. Preflight: subscription, CLI extensions, provider registrations.
//! 2. Allowed regions (policy, else physical).
//! 3. Region (`LOCATION`, else preference/allow-list selection).
//! 4. Resource group.
//! 5. Registry.
//! 6. Log workspace.
//! 7. Telemetry component, starting in the workspace region.
//! 8. Hosting environment, starting in the workspace region, then wait for
//!    provisioning.
//! 9. Image build and push.
//! 10. Registry credentials.
//! 11. Application: update if it exists, else create in the environment's
//!     region.
//! 12. Application provisioning and health endpoint.
//! 13. Report.
//!
//! Creation of stages 4-8 and 11 goes through `create_with_fallback`, so a
//! policy rejection moves on to the next allowed region.

use anyhow::{Context, Result};

use capd_az::{
    health_url, AppSpec, AzCli, BuildRequest, CommandRunner, HealthProbe, ImageRef,
    REQUIRED_EXTENSIONS, REQUIRED_PROVIDERS,
};
use capd_core::{
    create_with_fallback, retry, wait_until_ready, AllowedRegions, ExternalError, FailureKind,
    RegionId, ResourceDescriptor, ResourceKind,
};

use crate::config::DeployConfig;
use crate::regions::{choose_region, display_allowed, resolve_allowed, RegionPlan};
use crate::report::DeploymentReport;

/// Total number of pipeline stages, for banners.
const STAGES: u8 = 13;

/// Provisioning state that ends a readiness wait successfully.
const SUCCEEDED: &str = "Succeeded";

/// Provisioning states that will not turn into `Succeeded` by waiting.
const TERMINAL_FAILURES: &[&str] = &["Failed", "Canceled"];

/// Secret holding the telemetry connection string inside the application.
const TELEMETRY_SECRET: &str = "appinsights-connection-string";

/// Variable the API reads its telemetry connection string from.
const TELEMETRY_ENV_VAR: &str = "APPLICATIONINSIGHTS_CONNECTION_STRING";

/// Where stage banners go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Banners {
    Stdout,
    /// Used with `--output json`.
    Stderr,
    Silent,
}

/// Drives one deployment against a command runner and a health probe.
pub struct Deployer<'a, R, P> {
    az: AzCli<R>,
    probe: P,
    config: &'a DeployConfig,
    banners: Banners,
}

impl<'a, R: CommandRunner, P: HealthProbe> Deployer<'a, R, P> {
    pub fn new(config: &'a DeployConfig, runner: R, probe: P) -> Self {
        Self {
            az: AzCli::new(runner, config.classifier.clone()),
            probe,
            config,
            banners: Banners::Stdout,
        }
    }

    pub fn with_banners(mut self, banners: Banners) -> Self {
        self.banners = banners;
        self
    }

    /// Stages 1-3: preflight and region planning. Mutates nothing except
    /// provider registrations and CLI extensions.
    ///
    /// Returns the subscription id and the region plan.
    pub fn plan(&self) -> Result<(String, RegionPlan)> {
        let cfg = self.config;

        self.stage(1, "Preflight");
        let subscription = self.preflight()?;

        self.stage(2, "Allowed regions");
        let (allowed, source) =
            resolve_allowed(&self.az).context("could not determine the allowed regions")?;
        self.detail(&format!("{} ({source})", display_allowed(&allowed)));

        self.stage(3, "Region");
        let (selected, choice) =
            choose_region(cfg.location.as_ref(), &cfg.preferred_regions, &allowed)?;
        self.detail(&format!("selected {selected}"));

        Ok((
            subscription,
            RegionPlan {
                allowed,
                source,
                preferences: cfg.preferred_regions.clone(),
                selected,
                choice,
            },
        ))
    }

    /// Run the whole pipeline.
    pub fn deploy(&self) -> Result<DeploymentReport> {
        let cfg = self.config;
        let az = &self.az;
        let group = cfg.resource_group.as_str();

        let (subscription, plan) = self.plan()?;
        let region = &plan.selected;
        let allowed = &plan.allowed;
        let mut resources = Vec::new();

        self.stage(4, "Resource group");
        let rg = self.ensure(
            ResourceKind::ResourceGroup,
            group,
            region,
            allowed,
            || az.group_location(group),
            |r| az.create_group(group, r),
        )?;
        resources.push(rg);

        self.stage(5, "Container registry");
        let registry = cfg.registry.as_str();
        let acr = self.ensure(
            ResourceKind::Registry,
            registry,
            region,
            allowed,
            || az.registry_location(registry, group),
            |r| az.create_registry(registry, group, &cfg.registry_sku, r),
        )?;
        resources.push(acr);

        self.stage(6, "Log workspace");
        let workspace = cfg.log_workspace.as_str();
        let law = self.ensure(
            ResourceKind::LogWorkspace,
            workspace,
            region,
            allowed,
            || az.workspace_location(workspace, group),
            |r| az.create_workspace(workspace, group, r),
        )?;
        let workspace_region = law.region.clone();
        resources.push(law);
        let workspace_ids = az
            .workspace_ids(workspace, group)
            .context("could not read log workspace identifiers")?;

        self.stage(7, "Telemetry component");
        let telemetry_connection = match cfg.telemetry.as_deref() {
            Some(component) => {
                let ai = self.ensure(
                    ResourceKind::Telemetry,
                    component,
                    &workspace_region,
                    allowed,
                    || az.telemetry_location(component, group),
                    |r| az.create_telemetry(component, group, r, &workspace_ids.resource_id),
                )?;
                resources.push(ai);
                let connection = retry(&cfg.ready, ExternalError::is_transient, || {
                    az.telemetry_connection_string(component, group)
                })
                .context("could not read the telemetry connection string")?;
                Some(connection)
            }
            None => {
                self.detail("disabled (APPINSIGHTS_ENABLED=false)");
                None
            }
        };

        self.stage(8, "Hosting environment");
        let environment = cfg.environment.as_str();
        let env = self.ensure(
            ResourceKind::Environment,
            environment,
            &workspace_region,
            allowed,
            || az.environment_location(environment, group),
            |r| {
                let key = az.workspace_shared_key(workspace, group)?;
                az.create_environment(environment, group, r, &workspace_ids, &key)
            },
        )?;
        let environment_region = env.region.clone();
        resources.push(env);
        let what = format!("{} {environment}", ResourceKind::Environment);
        wait_until_ready(&what, &cfg.ready, || {
            provisioned(&what, az.environment_state(environment, group)?)
        })?;

        self.stage(9, "Image");
        let login_server = az
            .registry_login_server(registry, group)
            .context("could not read the registry login server")?;
        let image = ImageRef {
            login_server: login_server.clone(),
            repository: cfg.image_name.clone(),
            tag: cfg.image_tag.clone(),
        };
        az.publish_image(&BuildRequest {
            mode: cfg.build_mode,
            registry,
            resource_group: group,
            image: &image,
            context: &cfg.build_context,
            dockerfile: &cfg.dockerfile,
        })
        .with_context(|| format!("could not publish {image}"))?;
        self.detail(&format!("pushed {image}"));

        self.stage(10, "Registry credentials");
        az.enable_registry_admin(registry, group)
            .context("could not enable the registry admin user")?;
        let credentials = retry(&cfg.ready, ExternalError::is_transient, || {
            az.registry_credentials(registry, group, &login_server)
        })
        .context("could not read registry credentials")?;

        self.stage(11, "Application");
        let (secrets, env_vars) = match telemetry_connection {
            Some(connection) => (
                vec![(TELEMETRY_SECRET.to_string(), connection)],
                vec![(
                    TELEMETRY_ENV_VAR.to_string(),
                    format!("secretref:{TELEMETRY_SECRET}"),
                )],
            ),
            None => (Vec::new(), Vec::new()),
        };
        let spec = AppSpec {
            name: cfg.app.clone(),
            resource_group: group.to_string(),
            environment: environment.to_string(),
            image: image.to_string(),
            target_port: cfg.target_port,
            registry: credentials,
            cpu: cfg.cpu.clone(),
            memory: cfg.memory.clone(),
            min_replicas: cfg.min_replicas,
            max_replicas: cfg.max_replicas,
            secrets,
            env_vars,
        };
        let (app, fqdn) = self.roll_out(&spec, &environment_region)?;
        self.detail(&app.to_string());
        resources.push(app);

        self.stage(12, "Readiness");
        let what = format!("{} {}", ResourceKind::Application, cfg.app);
        wait_until_ready(&what, &cfg.ready, || {
            provisioned(&what, az.app_state(&cfg.app, group)?)
        })?;
        let fqdn = match fqdn {
            Some(fqdn) => fqdn,
            None => az
                .app_fqdn(&cfg.app, group)?
                .context("the application has no external ingress address")?,
        };
        let url = health_url(&fqdn, &cfg.health_path)
            .with_context(|| format!("invalid health URL for {fqdn}"))?;
        self.detail(&format!("probing {url} for up to {:?}", cfg.health.budget()));
        wait_until_ready(&format!("health endpoint {url}"), &cfg.health, || {
            Ok(self.probe.is_healthy(&url))
        })?;

        self.stage(13, "Report");
        Ok(DeploymentReport {
            subscription,
            region: plan.selected.clone(),
            resources,
            image: image.to_string(),
            fqdn,
            health_url: url.to_string(),
            completed_at: chrono::Utc::now(),
        })
    }

    fn preflight(&self) -> Result<String> {
        let subscription = self
            .az
            .subscription_id()
            .context("no active subscription (run `az login`)")?;
        self.detail(&format!("subscription {subscription}"));
        for extension in REQUIRED_EXTENSIONS {
            self.az
                .add_extension(extension)
                .with_context(|| format!("could not install CLI extension {extension}"))?;
        }
        for namespace in REQUIRED_PROVIDERS {
            self.az
                .register_provider(namespace)
                .with_context(|| format!("could not register provider {namespace}"))?;
        }
        Ok(subscription)
    }

    /// Reuse the resource if `locate` finds it, otherwise create it with
    /// policy-rejection fallback starting at `initial`.
    fn ensure<L, C>(
        &self,
        kind: ResourceKind,
        name: &str,
        initial: &RegionId,
        candidates: &AllowedRegions,
        locate: L,
        create: C,
    ) -> Result<ResourceDescriptor>
    where
        L: FnOnce() -> Result<Option<RegionId>, ExternalError>,
        C: FnMut(&RegionId) -> Result<(), ExternalError>,
    {
        let existing = locate().with_context(|| format!("could not look up {kind} {name}"))?;
        let descriptor = match existing {
            Some(region) => {
                tracing::info!(%kind, name, %region, "reusing existing resource");
                ResourceDescriptor::reused(kind, name, region)
            }
            None => {
                let (region, ()) = create_with_fallback(kind, initial, candidates, create)
                    .with_context(|| format!("could not create {kind} {name}"))?;
                tracing::info!(%kind, name, %region, "created resource");
                ResourceDescriptor::created(kind, name, region)
            }
        };
        self.detail(&descriptor.to_string());
        Ok(descriptor)
    }

    /// Update the application in place, or create it pinned to the
    /// environment's region. Returns the descriptor and the ingress FQDN if
    /// the platform reported one.
    fn roll_out(
        &self,
        spec: &AppSpec,
        environment_region: &RegionId,
    ) -> Result<(ResourceDescriptor, Option<String>)> {
        let kind = ResourceKind::Application;
        let existing = self
            .az
            .app_location(&spec.name, &spec.resource_group)
            .with_context(|| format!("could not look up {kind} {}", spec.name))?;

        if let Some(region) = existing {
            tracing::info!(app = %spec.name, %region, "updating existing application");
            let fqdn = self
                .az
                .update_app(spec)
                .with_context(|| format!("could not update {kind} {}", spec.name))?;
            return Ok((ResourceDescriptor::reused(kind, &spec.name, region), fqdn));
        }

        // An application can only live where its environment is.
        let pinned = AllowedRegions::new([environment_region.clone()]);
        let (region, fqdn) = create_with_fallback(kind, environment_region, &pinned, |_| {
            retry(&self.config.ready, ExternalError::is_transient, || {
                self.az.create_app(spec)
            })
        })
        .with_context(|| format!("could not create {kind} {}", spec.name))?;
        Ok((ResourceDescriptor::created(kind, &spec.name, region), fqdn))
    }

    fn stage(&self, number: u8, title: &str) {
        tracing::info!(stage = number, "{title}");
        self.emit(&format!("==> [{number}/{STAGES}] {title}"));
    }

    fn detail(&self, line: &str) {
        self.emit(&format!("    {line}"));
    }

    fn emit(&self, line: &str) {
        match self.banners {
            Banners::Stdout => println!("{line}"),
            Banners::Stderr => eprintln!("{line}"),
            Banners::Silent => {}
        }
    }
}

/// Map a provisioning state onto a readiness poll result.
fn provisioned(what: &str, state: Option<String>) -> Result<bool, ExternalError> {
    match state.as_deref() {
        Some(SUCCEEDED) => Ok(true),
        Some(state) if TERMINAL_FAILURES.contains(&state) => Err(ExternalError {
            kind: FailureKind::Fatal,
            command: what.to_string(),
            status: None,
            stderr: format!("provisioning state is {state}"),
        }),
        state => {
            tracing::debug!(what, state = state.unwrap_or("<none>"), "still provisioning");
            Ok(false)
        }
    }
}
