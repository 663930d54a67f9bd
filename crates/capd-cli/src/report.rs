//! Deployment report and output formats.

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use serde::Serialize;

use capd_core::{RegionId, ResourceDescriptor};

use crate::regions::RegionPlan;

/// How results are printed on standard output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Summary of a completed deployment.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub subscription: String,
    pub region: RegionId,
    pub resources: Vec<ResourceDescriptor>,
    pub image: String,
    pub fqdn: String,
    pub health_url: String,
    pub completed_at: DateTime<Utc>,
}

impl DeploymentReport {
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Deployment complete\n");
        out.push_str(&format!("  subscription: {}\n", self.subscription));
        out.push_str(&format!("  region:       {}\n", self.region));
        out.push_str(&format!("  image:        {}\n", self.image));
        out.push_str(&format!("  url:          https://{}\n", self.fqdn));
        out.push_str(&format!("  health:       {}\n", self.health_url));
        out.push_str(&format!(
            "  completed:    {}\n",
            self.completed_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        out.push_str("Resources:\n");
        for resource in &self.resources {
            out.push_str(&format!("  - {resource}\n"));
        }
        out
    }
}

/// Render anything serializable in the requested format.
pub fn render<T: Serialize>(
    value: &T,
    format: OutputFormat,
    text: impl FnOnce(&T) -> String,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(text(value)),
        OutputFormat::Json => serde_json::to_string_pretty(value).map(|s| s + "\n"),
    }
}

/// Render a region plan in the requested format.
pub fn render_plan(plan: &RegionPlan, format: OutputFormat) -> Result<String, serde_json::Error> {
    render(plan, format, RegionPlan::render_text)
}

/// Render a deployment report in the requested format.
pub fn render_report(
    report: &DeploymentReport,
    format: OutputFormat,
) -> Result<String, serde_json::Error> {
    render(report, format, DeploymentReport::render_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capd_core::ResourceKind;
    use chrono::TimeZone;

    fn report() -> DeploymentReport {
        let fc = RegionId::parse("francecentral").unwrap();
        DeploymentReport {
            subscription: "00000000-0000-0000-0000-000000000000".into(),
            region: fc.clone(),
            resources: vec![
                ResourceDescriptor::reused(ResourceKind::ResourceGroup, "rg-bank-churn", fc.clone()),
                ResourceDescriptor::created(ResourceKind::Application, "bank-churn-api", fc),
            ],
            image: "acrbankchurn.azurecr.io/bank-churn-api:latest".into(),
            fqdn: "bank-churn-api.example.francecentral.azurecontainerapps.io".into(),
            health_url: "https://bank-churn-api.example.francecentral.azurecontainerapps.io/health"
                .into(),
            completed_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn text_report_lists_resources() {
        let text = render_report(&report(), OutputFormat::Text).unwrap();
        assert!(text.contains("region:       francecentral"));
        assert!(text.contains("completed:    2026-03-01T12:00:00Z"));
        assert!(text.contains("  - resource group rg-bank-churn in francecentral (reused)"));
        assert!(text.contains("  - application bank-churn-api in francecentral (created)"));
    }

    #[test]
    fn json_report_is_structured() {
        let json = render_report(&report(), OutputFormat::Json).unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["region"], "francecentral");
        assert_eq!(v["resources"][0]["kind"], "resource_group");
        assert_eq!(v["resources"][0]["provenance"], "reused");
        assert_eq!(v["completed_at"], "2026-03-01T12:00:00Z");
    }
}
