//! # Image Publication
//!
//! Builds the API image and gets it into the registry. Both modes delegate the
//! actual work to external tooling:
//!
//! - [`BuildMode::Acr`]: `az acr build` uploads the context and builds inside
//!   the registry. No local container engine needed.
//! - [`BuildMode::Docker`]: `az acr login`, then `docker build` and
//!   `docker push` on this machine.

use std::path::Path;

use capd_core::ExternalError;

use crate::az::AzCli;
use crate::invocation::Invocation;
use crate::runner::CommandRunner;

/// Where the image gets built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Acr,
    Docker,
}

/// Unknown `BUILD_MODE` value.
#[derive(Debug, thiserror::Error)]
#[error("unknown build mode {0:?} (expected \"acr\" or \"docker\")")]
pub struct ParseBuildModeError(String);

impl std::str::FromStr for BuildMode {
    type Err = ParseBuildModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acr" => Ok(Self::Acr),
            "docker" => Ok(Self::Docker),
            _ => Err(ParseBuildModeError(s.to_string())),
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Acr => "acr",
            Self::Docker => "docker",
        })
    }
}

/// A fully qualified image reference: `<login-server>/<repository>:<tag>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub login_server: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// `<repository>:<tag>`, as `az acr build --image` expects it.
    pub fn short(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}:{}", self.login_server, self.repository, self.tag)
    }
}

/// Inputs for one image publication.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub mode: BuildMode,
    pub registry: &'a str,
    pub resource_group: &'a str,
    pub image: &'a ImageRef,
    pub context: &'a Path,
    pub dockerfile: &'a Path,
}

impl<R: CommandRunner> AzCli<R> {
    /// Build the image and push it to the registry.
    pub fn publish_image(&self, request: &BuildRequest<'_>) -> Result<(), ExternalError> {
        let context = request.context.display().to_string();
        let dockerfile = request.dockerfile.display().to_string();
        tracing::info!(image = %request.image, mode = %request.mode, "publishing image");
        match request.mode {
            BuildMode::Acr => {
                self.run(
                    &Invocation::az(["acr", "build"])
                        .opt("--registry", request.registry)
                        .opt("--resource-group", request.resource_group)
                        .opt("--image", request.image.short())
                        .opt("--file", dockerfile)
                        .arg("--only-show-errors")
                        .arg(context),
                )?;
            }
            BuildMode::Docker => {
                self.run(&Invocation::az(["acr", "login"]).opt("--name", request.registry))?;
                self.run(
                    &Invocation::new("docker", ["build"])
                        .opt("--tag", request.image.to_string())
                        .opt("--file", dockerfile)
                        .arg(context),
                )?;
                self.run(&Invocation::new("docker", ["push"]).arg(request.image.to_string()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_mode_parses_case_insensitively() {
        assert_eq!("ACR".parse::<BuildMode>().unwrap(), BuildMode::Acr);
        assert_eq!(" docker ".parse::<BuildMode>().unwrap(), BuildMode::Docker);
        assert!("podman".parse::<BuildMode>().is_err());
    }

    #[test]
    fn image_ref_renders_full_and_short() {
        let image = ImageRef {
            login_server: "acrbankchurn.azurecr.io".into(),
            repository: "bank-churn-api".into(),
            tag: "v3".into(),
        };
        assert_eq!(image.to_string(), "acrbankchurn.azurecr.io/bank-churn-api:v3");
        assert_eq!(image.short(), "bank-churn-api:v3");
    }
}
