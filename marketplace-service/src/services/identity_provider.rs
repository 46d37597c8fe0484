//! External login provider.
//!
//! The provider answers a session-data lookup with loosely typed JSON. It is
//! narrowed to [`ProviderProfile`] right here; nothing else in the service
//! sees the raw payload.

use crate::services::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const SESSION_ID_HEADER: &str = "X-Session-ID";

/// Validated identity claims returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    /// Lower-cased and trimmed.
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProfile {
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

impl ProviderProfile {
    fn parse(raw: RawProfile) -> Option<Self> {
        let email = raw.email?.trim().to_lowercase();
        let name = raw.name?.trim().to_string();
        let valid_email = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
            .unwrap_or(false);
        if !valid_email || name.is_empty() {
            return None;
        }
        let picture = raw
            .picture
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Some(Self {
            email,
            name,
            picture,
        })
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn exchange(&self, provider_session_id: &str) -> Result<ProviderProfile, ServiceError>;
}

#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    endpoint: String,
}

impl HttpIdentityProvider {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Internal(e.into()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn exchange(&self, provider_session_id: &str) -> Result<ProviderProfile, ServiceError> {
        let response = self
            .client
            .get(&self.endpoint)
            .header(SESSION_ID_HEADER, provider_session_id)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, timeout = e.is_timeout(), "Identity provider unreachable");
                ServiceError::UpstreamAuthFailure
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Identity provider rejected session");
            return Err(ServiceError::UpstreamAuthFailure);
        }

        let raw: RawProfile = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Identity provider returned unreadable profile");
            ServiceError::UpstreamAuthFailure
        })?;

        ProviderProfile::parse(raw).ok_or_else(|| {
            tracing::warn!("Identity provider profile missing email or name");
            ServiceError::UpstreamAuthFailure
        })
    }
}

/// Provider double keyed by provider session id.
#[derive(Default)]
pub struct MockIdentityProvider {
    sessions: Mutex<HashMap<String, ProviderProfile>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, provider_session_id: &str, email: &str, name: &str) -> Self {
        self.add_session(provider_session_id, email, name);
        self
    }

    pub fn add_session(&self, provider_session_id: &str, email: &str, name: &str) {
        self.sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(
                provider_session_id.to_string(),
                ProviderProfile {
                    email: email.trim().to_lowercase(),
                    name: name.to_string(),
                    picture: None,
                },
            );
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn exchange(&self, provider_session_id: &str) -> Result<ProviderProfile, ServiceError> {
        self.sessions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(provider_session_id)
            .cloned()
            .ok_or(ServiceError::UpstreamAuthFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parse_normalizes_email() {
        let profile = ProviderProfile::parse(RawProfile {
            email: Some("  Asha.K@Thapar.EDU ".into()),
            name: Some("Asha".into()),
            picture: Some("".into()),
        })
        .unwrap();
        assert_eq!(profile.email, "asha.k@thapar.edu");
        assert_eq!(profile.picture, None);
    }

    #[test]
    fn parse_rejects_incomplete_profiles() {
        assert!(ProviderProfile::parse(RawProfile {
            email: Some("no-at-sign".into()),
            name: Some("X".into()),
            picture: None,
        })
        .is_none());
        assert!(ProviderProfile::parse(RawProfile {
            email: Some("x@y.z".into()),
            name: None,
            picture: None,
        })
        .is_none());
    }

    #[tokio::test]
    async fn http_provider_sends_session_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session-data"))
            .and(header(SESSION_ID_HEADER, "sess-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "email": "Ravi@thapar.edu",
                "name": "Ravi",
                "picture": "https://cdn.example/ravi.png",
                "unexpected": {"nested": true}
            })))
            .mount(&server)
            .await;

        let provider = HttpIdentityProvider::new(
            &format!("{}/session-data", server.uri()),
            Duration::from_secs(2),
        )
        .unwrap();
        let profile = provider.exchange("sess-1").await.unwrap();
        assert_eq!(profile.email, "ravi@thapar.edu");
        assert_eq!(profile.picture.as_deref(), Some("https://cdn.example/ravi.png"));
    }

    #[tokio::test]
    async fn http_provider_rejection_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider =
            HttpIdentityProvider::new(&server.uri(), Duration::from_secs(2)).unwrap();
        let err = provider.exchange("bad").await.unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamAuthFailure));
    }

    #[tokio::test]
    async fn http_provider_timeout_is_upstream_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(serde_json::json!({"email": "a@b.c", "name": "A"})),
            )
            .mount(&server)
            .await;

        let provider =
            HttpIdentityProvider::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = provider.exchange("slow").await.unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamAuthFailure));
    }
}
