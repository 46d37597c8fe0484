use crate::models::{Identity, Session};
use crate::services::clock::Clock;
use crate::services::identity_provider::IdentityProvider;
use crate::services::store::{IdentityStore, SessionStore};
use crate::services::ServiceError;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use service_core::utils::signature::sha256_hex;
use std::sync::Arc;

/// Opaque token handed to the client, with its absolute expiry.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues, resolves and revokes session tokens.
#[derive(Clone)]
pub struct SessionAuthenticator {
    identities: Arc<dyn IdentityStore>,
    sessions: Arc<dyn SessionStore>,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl SessionAuthenticator {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        sessions: Arc<dyn SessionStore>,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            identities,
            sessions,
            provider,
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Trades a provider session id for a local identity and a fresh session.
    ///
    /// First login creates a pending identity; it is never blocked on profile
    /// completeness.
    pub async fn exchange(
        &self,
        provider_session_id: &str,
    ) -> Result<(Identity, SessionToken), ServiceError> {
        if provider_session_id.trim().is_empty() {
            return Err(ServiceError::UpstreamAuthFailure);
        }

        let profile = self.provider.exchange(provider_session_id).await?;

        let identity = match self.identities.find_identity_by_email(&profile.email).await? {
            Some(identity) => identity,
            None => {
                let identity = Identity::pending(
                    profile.email.clone(),
                    profile.name.clone(),
                    profile.picture.clone(),
                    self.clock.now(),
                );
                match self.identities.insert_identity(&identity).await {
                    Ok(()) => {
                        tracing::info!(identity_id = %identity.id, "Created identity on first login");
                        identity
                    }
                    // A concurrent first login won the insert
                    Err(ServiceError::DuplicateIdentity) => self
                        .identities
                        .find_identity_by_email(&profile.email)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::Internal(anyhow::anyhow!(
                                "identity vanished after duplicate insert"
                            ))
                        })?,
                    Err(e) => return Err(e),
                }
            }
        };

        let token = self.issue(&identity).await?;
        Ok((identity, token))
    }

    async fn issue(&self, identity: &Identity) -> Result<SessionToken, ServiceError> {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let now = self.clock.now();
        let session = Session {
            token_hash: sha256_hex(&token),
            identity_id: identity.id.clone(),
            expires_at: now + self.ttl,
            created_at: now,
        };
        self.sessions.insert_session(&session).await?;

        tracing::info!(identity_id = %identity.id, expires_at = %session.expires_at, "Session issued");

        Ok(SessionToken {
            token,
            expires_at: session.expires_at,
        })
    }

    /// Identity owning `token`, if the session exists and is unexpired.
    pub async fn resolve(&self, token: Option<&str>) -> Result<Identity, ServiceError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ServiceError::Unauthenticated)?;

        let session = self
            .sessions
            .find_session(&sha256_hex(token))
            .await?
            .ok_or(ServiceError::Unauthenticated)?;

        if !session.is_valid_at(self.clock.now()) {
            tracing::debug!(identity_id = %session.identity_id, "Session expired");
            return Err(ServiceError::Unauthenticated);
        }

        self.identities
            .find_identity_by_id(&session.identity_id)
            .await?
            .ok_or(ServiceError::Unauthenticated)
    }

    /// Idempotent.
    pub async fn revoke(&self, token: &str) -> Result<(), ServiceError> {
        self.sessions.delete_session(&sha256_hex(token)).await
    }
}
