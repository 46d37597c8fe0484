use crate::models::{Role, RoleProfile};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub provider_session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(max = 100, message = "firstName is too long"))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 100, message = "lastName is too long"))]
    pub last_name: String,
    pub email_local_part: String,
    pub phone: String,
    pub role: Role,
    pub branch: Option<String>,
    pub roll_number: Option<String>,
    pub cohort: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub identity_id: String,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserRequest {
    pub email_local_part: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckUserResponse {
    pub exists: bool,
    pub resolved_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_id: Option<String>,
}

/// Public shape of an identity.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub phone: String,
    pub bio: Option<String>,
    #[serde(flatten)]
    pub role: Option<RoleProfile>,
    pub registration_complete: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<crate::models::Identity> for IdentityView {
    fn from(identity: crate::models::Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
            name: identity.name,
            picture: identity.picture,
            phone: identity.phone,
            bio: identity.bio,
            role: identity.role,
            registration_complete: identity.registration_complete,
            created_at: identity.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub identity: IdentityView,
}
