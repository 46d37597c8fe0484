use crate::models::Identity;
use crate::services::ledger::EntitlementLedger;
use crate::services::metrics::record_gate_rejection;
use crate::services::session::SessionAuthenticator;
use crate::services::ServiceError;

/// Progress of one listing-creation attempt through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStage {
    Unauthenticated,
    Authenticated,
    ProfileChecked,
    EntitlementClaimed,
}

impl GateStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateStage::Unauthenticated => "unauthenticated",
            GateStage::Authenticated => "authenticated",
            GateStage::ProfileChecked => "profile_checked",
            GateStage::EntitlementClaimed => "entitlement_claimed",
        }
    }
}

/// Successful gate outcome. The entitlement is already spent.
#[derive(Debug, Clone)]
pub struct Authorization {
    pub identity: Identity,
    pub entitlement_id: String,
}

/// Decides whether a session may create one listing, spending one
/// entitlement when it may.
#[derive(Clone)]
pub struct AuthorizationGate {
    sessions: SessionAuthenticator,
    ledger: EntitlementLedger,
}

impl AuthorizationGate {
    pub fn new(sessions: SessionAuthenticator, ledger: EntitlementLedger) -> Self {
        Self { sessions, ledger }
    }

    fn reject(stage: GateStage, err: ServiceError) -> ServiceError {
        let reason = match &err {
            ServiceError::Unauthenticated => "unauthenticated",
            ServiceError::ProfileIncomplete => "profile_incomplete",
            ServiceError::NoValidEntitlement => "payment_required",
            _ => "error",
        };
        record_gate_rejection(reason);
        tracing::info!(stage = stage.as_str(), reason, "Listing creation rejected");
        err
    }

    /// Must be called exactly once per listing attempt. A consumed
    /// entitlement is never returned, even if the caller later fails.
    pub async fn authorize_creation(
        &self,
        token: Option<&str>,
    ) -> Result<Authorization, ServiceError> {
        let mut stage = GateStage::Unauthenticated;

        let identity = self
            .sessions
            .resolve(token)
            .await
            .map_err(|e| Self::reject(stage, e))?;
        stage = GateStage::Authenticated;

        // Profile can change between purchase and use
        if !identity.has_phone() {
            return Err(Self::reject(stage, ServiceError::ProfileIncomplete));
        }
        stage = GateStage::ProfileChecked;

        let entitlement_id = self
            .ledger
            .claim_one(&identity.id)
            .await
            .map_err(|e| Self::reject(stage, e))?;
        stage = GateStage::EntitlementClaimed;

        tracing::info!(
            stage = stage.as_str(),
            identity_id = %identity.id,
            entitlement_id = %entitlement_id,
            "Listing creation authorized"
        );

        Ok(Authorization {
            identity,
            entitlement_id,
        })
    }
}
