//! HTTP health probing of the deployed application.

use std::time::Duration;

use url::Url;

/// Checks whether a deployed endpoint answers.
pub trait HealthProbe {
    /// `true` if `url` answered with a success status.
    fn is_healthy(&self, url: &Url) -> bool;
}

impl<T: HealthProbe + ?Sized> HealthProbe for &T {
    fn is_healthy(&self, url: &Url) -> bool {
        (**self).is_healthy(url)
    }
}

/// Blocking HTTP probe. Transport errors count as unhealthy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::blocking::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl HealthProbe for HttpProbe {
    fn is_healthy(&self, url: &Url) -> bool {
        match self.client.get(url.clone()).send() {
            Ok(resp) => {
                let status = resp.status();
                tracing::debug!(%url, %status, "health probe answered");
                status.is_success()
            }
            Err(e) => {
                tracing::debug!(%url, "health probe failed: {e}");
                false
            }
        }
    }
}

/// `https://<fqdn><path>`. A missing leading slash on `path` is added.
///
/// A blank `fqdn` is [`url::ParseError::EmptyHost`].
pub fn health_url(fqdn: &str, path: &str) -> Result<Url, url::ParseError> {
    let fqdn = fqdn.trim();
    if fqdn.is_empty() {
        return Err(url::ParseError::EmptyHost);
    }
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    Url::parse(&format!("https://{fqdn}{path}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_url_joins_fqdn_and_path() {
        let url = health_url(
            "bank-churn-api.happyhill-1234.francecentral.azurecontainerapps.io\n",
            "/health",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://bank-churn-api.happyhill-1234.francecentral.azurecontainerapps.io/health"
        );
    }

    #[test]
    fn health_url_adds_missing_slash() {
        let url = health_url("example.org", "healthz").unwrap();
        assert_eq!(url.as_str(), "https://example.org/healthz");
    }

    #[test]
    fn health_url_rejects_empty_host() {
        assert_eq!(health_url("", "/health"), Err(url::ParseError::EmptyHost));
        assert_eq!(health_url(" \n", "health"), Err(url::ParseError::EmptyHost));
    }

    #[test]
    fn unreachable_endpoint_is_unhealthy() {
        let probe = HttpProbe::new(Duration::from_millis(200)).unwrap();
        let url = Url::parse("http://127.0.0.1:1/health").unwrap();
        assert!(!probe.is_healthy(&url));
    }
}
