//! # Deployment Configuration
//!
//! Every setting comes from the process environment and is read exactly once
//! at start-up into an immutable [`DeployConfig`]. The orchestrator only ever
//! sees a shared reference to it.
//!
//! [`DeployConfig::from_lookup`] takes the variable source as a closure so
//! tests can supply a map instead of mutating the process environment. Blank
//! values are treated as unset.

use std::path::PathBuf;
use std::time::Duration;

use capd_az::{BuildMode, ParseBuildModeError};
use capd_core::classify::{DEFAULT_POLICY_PATTERNS, DEFAULT_TRANSIENT_PATTERNS};
use capd_core::{parse_region_list, FailureClassifier, RegionId, RetryPolicy};

/// Preference order used when `PREFERRED_REGIONS` is unset.
pub const DEFAULT_PREFERRED_REGIONS: &str =
    "francecentral westeurope northeurope swedencentral uksouth";

/// Separator for the classification pattern variables.
const PATTERN_SEPARATOR: char = '|';

/// Immutable deployment settings.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    /// Pinned region (`LOCATION`). `None` means auto-selection.
    pub location: Option<RegionId>,
    pub preferred_regions: Vec<RegionId>,
    pub resource_group: String,
    pub registry: String,
    pub registry_sku: String,
    pub log_workspace: String,
    /// Telemetry component name; `None` when `APPINSIGHTS_ENABLED` is false.
    pub telemetry: Option<String>,
    pub environment: String,
    pub app: String,
    pub image_name: String,
    pub image_tag: String,
    pub build_context: PathBuf,
    pub dockerfile: PathBuf,
    pub build_mode: BuildMode,
    pub target_port: u16,
    pub health_path: String,
    pub cpu: String,
    pub memory: String,
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Polling budget for provisioning states and settle-time retries.
    pub ready: RetryPolicy,
    /// Polling budget for the health endpoint.
    pub health: RetryPolicy,
    pub classifier: FailureClassifier,
}

impl DeployConfig {
    /// Load configuration from the process environment.
    ///
    /// Variables (defaults in parentheses):
    /// - `LOCATION` (unset: auto-select)
    /// - `PREFERRED_REGIONS` (`francecentral westeurope northeurope swedencentral uksouth`)
    /// - `RESOURCE_GROUP` (`rg-bank-churn`), `ACR_NAME` (`acrbankchurn`), `ACR_SKU` (`Basic`)
    /// - `LOG_WORKSPACE` (`law-bank-churn`), `APPINSIGHTS_NAME` (`ai-bank-churn`),
    ///   `APPINSIGHTS_ENABLED` (`true`)
    /// - `CONTAINERAPP_ENV` (`env-bank-churn`), `APP_NAME` (`bank-churn-api`)
    /// - `IMAGE_NAME` (`bank-churn-api`), `IMAGE_TAG` (`latest`)
    /// - `BUILD_CONTEXT` (`.`), `DOCKERFILE` (`Dockerfile`), `BUILD_MODE` (`acr`)
    /// - `TARGET_PORT` (`8000`), `HEALTH_PATH` (`/health`)
    /// - `CPU` (`0.5`), `MEMORY` (`1.0Gi`), `MIN_REPLICAS` (`1`), `MAX_REPLICAS` (`3`)
    /// - `READY_MAX_ATTEMPTS` (`30`), `READY_INTERVAL_SECS` (`10`)
    /// - `HEALTH_MAX_ATTEMPTS` (`12`), `HEALTH_INTERVAL_SECS` (`10`)
    /// - `POLICY_REJECTION_PATTERNS`, `TRANSIENT_PATTERNS` (`|`-separated;
    ///   replace the built-in lists when set)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let location = env
            .get("LOCATION")
            .map(|raw| region("LOCATION", &raw))
            .transpose()?;
        let preferred_regions = {
            let raw = env.or("PREFERRED_REGIONS", DEFAULT_PREFERRED_REGIONS);
            parse_region_list(&raw).map_err(|_| ConfigError::InvalidRegion {
                var: "PREFERRED_REGIONS",
                value: raw,
            })?
        };

        let registry = env.or("ACR_NAME", "acrbankchurn");
        validate_registry_name(&registry)?;

        let telemetry = if env.flag("APPINSIGHTS_ENABLED", true)? {
            Some(env.or("APPINSIGHTS_NAME", "ai-bank-churn"))
        } else {
            None
        };

        let build_mode = env
            .or("BUILD_MODE", "acr")
            .parse()
            .map_err(ConfigError::BuildMode)?;

        let min_replicas = env.number("MIN_REPLICAS", 1u32)?;
        let max_replicas = env.number("MAX_REPLICAS", 3u32)?;
        if min_replicas > max_replicas {
            return Err(ConfigError::ReplicaBounds {
                min: min_replicas,
                max: max_replicas,
            });
        }

        let target_port = env.number("TARGET_PORT", 8000u16)?;
        if target_port == 0 {
            return Err(ConfigError::InvalidNumber {
                var: "TARGET_PORT",
                value: "0".to_string(),
            });
        }

        let ready = RetryPolicy::new(
            env.number("READY_MAX_ATTEMPTS", 30u32)?,
            Duration::from_secs(env.number("READY_INTERVAL_SECS", 10u64)?),
        );
        let health = RetryPolicy::new(
            env.number("HEALTH_MAX_ATTEMPTS", 12u32)?,
            Duration::from_secs(env.number("HEALTH_INTERVAL_SECS", 10u64)?),
        );

        let classifier = FailureClassifier::new(
            env.patterns("POLICY_REJECTION_PATTERNS", DEFAULT_POLICY_PATTERNS),
            env.patterns("TRANSIENT_PATTERNS", DEFAULT_TRANSIENT_PATTERNS),
        );

        Ok(Self {
            location,
            preferred_regions,
            resource_group: env.or("RESOURCE_GROUP", "rg-bank-churn"),
            registry,
            registry_sku: env.or("ACR_SKU", "Basic"),
            log_workspace: env.or("LOG_WORKSPACE", "law-bank-churn"),
            telemetry,
            environment: env.or("CONTAINERAPP_ENV", "env-bank-churn"),
            app: env.or("APP_NAME", "bank-churn-api"),
            image_name: env.or("IMAGE_NAME", "bank-churn-api"),
            image_tag: env.or("IMAGE_TAG", "latest"),
            build_context: PathBuf::from(env.or("BUILD_CONTEXT", ".")),
            dockerfile: PathBuf::from(env.or("DOCKERFILE", "Dockerfile")),
            build_mode,
            target_port,
            health_path: env.or("HEALTH_PATH", "/health"),
            cpu: env.or("CPU", "0.5"),
            memory: env.or("MEMORY", "1.0Gi"),
            min_replicas,
            max_replicas,
            ready,
            health,
            classifier,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} contains an invalid region identifier: {value:?}")]
    InvalidRegion { var: &'static str, value: String },

    #[error("{var} must be a non-negative integer in range, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be true or false, got {value:?}")]
    InvalidFlag { var: &'static str, value: String },

    #[error("ACR_NAME must be 5-50 alphanumeric characters, got {0:?}")]
    InvalidRegistryName(String),

    #[error("BUILD_MODE: {0}")]
    BuildMode(#[source] ParseBuildModeError),

    #[error("MIN_REPLICAS ({min}) exceeds MAX_REPLICAS ({max})")]
    ReplicaBounds { min: u32, max: u32 },
}

/// Variable source with blank-as-unset semantics.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or(&self, var: &str, default: &str) -> String {
        self.get(var).unwrap_or_else(|| default.to_string())
    }

    fn number<T: std::str::FromStr>(&self, var: &'static str, default: T) -> Result<T, ConfigError> {
        match self.get(var) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        }
    }

    fn flag(&self, var: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(var) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(true),
                "false" | "0" | "no" => Ok(false),
                _ => Err(ConfigError::InvalidFlag { var, value: raw }),
            },
        }
    }

    fn patterns(&self, var: &str, defaults: &[&str]) -> Vec<String> {
        match self.get(var) {
            Some(raw) => raw.split(PATTERN_SEPARATOR).map(str::to_string).collect(),
            None => defaults.iter().map(|p| p.to_string()).collect(),
        }
    }
}

fn region(var: &'static str, raw: &str) -> Result<RegionId, ConfigError> {
    RegionId::parse(raw).map_err(|_| ConfigError::InvalidRegion {
        var,
        value: raw.to_string(),
    })
}

fn validate_registry_name(name: &str) -> Result<(), ConfigError> {
    let valid = (5..=50).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidRegistryName(name.to_string()))
    }
}
