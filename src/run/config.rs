//! Run requests and their validation into an immutable [`RunConfig`].

use std::fmt;

use action_flow::SiteProfile;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Iterations used when a request does not say.
pub const DEFAULT_ITERATIONS: u32 = 5;
pub const MAX_ITERATIONS: u32 = 1000;
pub const DEFAULT_BASE_NAME: &str = "STORE";

/// Body of a start request. Every field is optional on the wire so that
/// validation, not deserialization, reports what is missing.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub project_url: Option<String>,
    #[serde(default)]
    pub base_name: Option<String>,
    #[serde(default)]
    pub remix_repeat_count: Option<i64>,
    #[serde(default)]
    pub headless: Option<bool>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRequest")
            .field("project_url", &self.project_url)
            .field("base_name", &self.base_name)
            .field("remix_repeat_count", &self.remix_repeat_count)
            .field("headless", &self.headless)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Defaults and bounds applied while validating a request.
#[derive(Clone, Debug)]
pub struct RunLimits {
    pub default_iterations: u32,
    pub max_iterations: u32,
    pub default_base_name: String,
    pub default_headless: bool,
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            default_iterations: DEFAULT_ITERATIONS,
            max_iterations: MAX_ITERATIONS,
            default_base_name: DEFAULT_BASE_NAME.to_string(),
            default_headless: false,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validated parameters of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub project_url: String,
    pub base_name: String,
    pub iterations: u32,
    pub headless: bool,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Project URL is required")]
    MissingProjectUrl,
    #[error("Project URL is not valid: {0}")]
    InvalidProjectUrl(String),
    #[error("Project URL must point to {expected}, got {host}")]
    ForeignDomain { expected: String, host: String },
    #[error("No expected project domain is configured")]
    NoExpectedDomain,
}

impl RunConfig {
    pub fn from_request(
        request: &RunRequest,
        limits: &RunLimits,
        site: &SiteProfile,
    ) -> Result<Self, ValidationError> {
        let email = non_blank(request.email.as_deref());
        // Passwords are used verbatim; only blank ones are rejected.
        let password = request
            .password
            .clone()
            .filter(|p| !p.trim().is_empty());
        let (email, password) = match (email, password) {
            (Some(email), Some(password)) => (email, password),
            _ => return Err(ValidationError::MissingCredentials),
        };

        let project_url =
            non_blank(request.project_url.as_deref()).ok_or(ValidationError::MissingProjectUrl)?;
        check_project_url(&project_url, &site.expected_domain)?;

        let base_name = non_blank(request.base_name.as_deref())
            .unwrap_or_else(|| limits.default_base_name.clone());

        Ok(Self {
            project_url,
            base_name,
            iterations: clamp_iterations(request.remix_repeat_count, limits),
            headless: request.headless.unwrap_or(limits.default_headless),
            credentials: Credentials { email, password },
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn clamp_iterations(requested: Option<i64>, limits: &RunLimits) -> u32 {
    let max = limits.max_iterations.max(1);
    match requested {
        None => limits.default_iterations.clamp(1, max),
        Some(n) => n.clamp(1, max as i64) as u32,
    }
}

fn check_project_url(raw: &str, expected_domain: &str) -> Result<(), ValidationError> {
    let url = Url::parse(raw).map_err(|err| ValidationError::InvalidProjectUrl(err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidProjectUrl(format!(
            "unsupported scheme {}",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| ValidationError::InvalidProjectUrl("missing host".to_string()))?
        .to_ascii_lowercase();
    let expected = expected_domain.trim().trim_start_matches('.').to_ascii_lowercase();
    if expected.is_empty() {
        return Err(ValidationError::NoExpectedDomain);
    }
    if host == expected || host.ends_with(&format!(".{expected}")) {
        Ok(())
    } else {
        Err(ValidationError::ForeignDomain { expected, host })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteProfile {
        SiteProfile {
            expected_domain: "example.test".into(),
            ..SiteProfile::default()
        }
    }

    fn request() -> RunRequest {
        RunRequest {
            project_url: Some("https://example.test/p/abc".into()),
            email: Some("user@example.test".into()),
            password: Some("secret".into()),
            ..RunRequest::default()
        }
    }

    #[test]
    fn fills_defaults() {
        let config = RunConfig::from_request(&request(), &RunLimits::default(), &site()).unwrap();
        assert_eq!(config.base_name, "STORE");
        assert_eq!(config.iterations, 5);
        assert!(!config.headless);
        assert_eq!(config.credentials.password, "secret");
    }

    #[test]
    fn clamps_repeat_count() {
        let limits = RunLimits::default();
        for (requested, expected) in [(0, 1), (-4, 1), (3, 3), (5000, 1000)] {
            let req = RunRequest {
                remix_repeat_count: Some(requested),
                ..request()
            };
            let config = RunConfig::from_request(&req, &limits, &site()).unwrap();
            assert_eq!(config.iterations, expected, "requested {requested}");
        }
    }

    #[test]
    fn blank_credentials_are_rejected() {
        let req = RunRequest {
            password: Some("   ".into()),
            ..request()
        };
        assert_eq!(
            RunConfig::from_request(&req, &RunLimits::default(), &site()),
            Err(ValidationError::MissingCredentials)
        );
    }

    #[test]
    fn project_url_must_be_on_expected_domain() {
        let limits = RunLimits::default();
        let missing = RunRequest {
            project_url: None,
            ..request()
        };
        assert_eq!(
            RunConfig::from_request(&missing, &limits, &site()),
            Err(ValidationError::MissingProjectUrl)
        );

        let foreign = RunRequest {
            project_url: Some("https://evil.test/p/abc".into()),
            ..request()
        };
        assert!(matches!(
            RunConfig::from_request(&foreign, &limits, &site()),
            Err(ValidationError::ForeignDomain { .. })
        ));

        let lookalike = RunRequest {
            project_url: Some("https://notexample.test/p/abc".into()),
            ..request()
        };
        assert!(RunConfig::from_request(&lookalike, &limits, &site()).is_err());

        let subdomain = RunRequest {
            project_url: Some("https://app.example.test/p/abc".into()),
            ..request()
        };
        assert!(RunConfig::from_request(&subdomain, &limits, &site()).is_ok());

        let ftp = RunRequest {
            project_url: Some("ftp://example.test/p/abc".into()),
            ..request()
        };
        assert!(matches!(
            RunConfig::from_request(&ftp, &limits, &site()),
            Err(ValidationError::InvalidProjectUrl(_))
        ));
    }

    #[test]
    fn request_debug_hides_password() {
        let rendered = format!("{:?}", request());
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn empty_expected_domain_refuses_every_url() {
        let open = SiteProfile {
            expected_domain: "  ".into(),
            ..SiteProfile::default()
        };
        assert_eq!(
            RunConfig::from_request(&request(), &RunLimits::default(), &open),
            Err(ValidationError::NoExpectedDomain)
        );
    }
}
