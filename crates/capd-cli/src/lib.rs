//! # capd-cli: Container App Deployer
//!
//! Provides the `capd` command-line interface. Configuration is read from
//! the environment; running with no arguments deploys.
//!
//! ## Subcommands
//!
//! - `capd deploy` (default): provision everything, publish the image, roll
//!   out the application and verify its health endpoint.
//! - `capd regions`: preflight and region planning only; prints the
//!   allow-list, the preference list and the region a deployment would use.
//!
//! ```bash
//! LOCATION=westeurope capd -v
//! PREFERRED_REGIONS="swedencentral uksouth" capd regions --output json
//! ```
//!
//! ## Exit Codes
//!
//! `0` on success. An unrecoverable external command failure exits with that
//! command's own status. Everything else exits `1`.

pub mod config;
pub mod deploy;
pub mod regions;
pub mod report;

use capd_core::{CapdError, ExternalError};

/// Process exit code for a failed run.
///
/// Walks the error chain for the first domain or external error; anything
/// else (configuration, output rendering) exits 1.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CapdError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<ExternalError>() {
            return e.exit_code();
        }
    }
    1
}
