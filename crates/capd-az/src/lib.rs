//! # capd-az: External-Command Layer
//!
//! Everything that leaves the process goes through this crate: `az` and
//! `docker` invocations and the final HTTP health probe.
//!
//! ## Layers
//!
//! - [`runner`]: the [`CommandRunner`] seam and structured [`CommandOutput`].
//! - [`invocation`]: argument vectors with secret-redacting rendering.
//! - [`output`]: `tsv`/`json` parsing and location normalization.
//! - [`az`]: typed control-plane operations on [`AzCli`].
//! - [`image`]: image build and push.
//! - [`probe`]: HTTP health checks.
//!
//! Failures are returned as `capd_core::ExternalError`, already classified,
//! so callers decide between fallback, retry and abort without looking at
//! error text.

pub mod az;
pub mod image;
pub mod invocation;
pub mod output;
pub mod probe;
pub mod runner;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use az::{AppSpec, AzCli, RegistryCredentials, WorkspaceIds, REQUIRED_EXTENSIONS, REQUIRED_PROVIDERS};
pub use image::{BuildMode, BuildRequest, ImageRef, ParseBuildModeError};
pub use invocation::Invocation;
pub use probe::{health_url, HealthProbe, HttpProbe};
pub use runner::{execute, CommandOutput, CommandRunner, SystemRunner};
