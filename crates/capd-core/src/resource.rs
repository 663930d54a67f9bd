//! Resource descriptors: what was provisioned, where, and whether this run
//! created it.

use serde::Serialize;

use crate::region::RegionId;

/// The kinds of resource a deployment provisions, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ResourceGroup,
    Registry,
    LogWorkspace,
    Telemetry,
    Environment,
    Application,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ResourceGroup => "resource group",
            Self::Registry => "registry",
            Self::LogWorkspace => "log workspace",
            Self::Telemetry => "telemetry component",
            Self::Environment => "hosting environment",
            Self::Application => "application",
        };
        f.write_str(s)
    }
}

/// Whether a resource was created by this run or already existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Created,
    Reused,
}

/// A provisioned resource: name plus the region it landed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub name: String,
    pub region: RegionId,
    pub provenance: Provenance,
}

impl ResourceDescriptor {
    pub fn created(kind: ResourceKind, name: impl Into<String>, region: RegionId) -> Self {
        Self {
            kind,
            name: name.into(),
            region,
            provenance: Provenance::Created,
        }
    }

    pub fn reused(kind: ResourceKind, name: impl Into<String>, region: RegionId) -> Self {
        Self {
            kind,
            name: name.into(),
            region,
            provenance: Provenance::Reused,
        }
    }
}

impl std::fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = match self.provenance {
            Provenance::Created => "created",
            Provenance::Reused => "reused",
        };
        write!(f, "{} {} in {} ({verb})", self.kind, self.name, self.region)
    }
}
