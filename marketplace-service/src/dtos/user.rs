use crate::models::{Identity, RoleProfile};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileCompleteResponse {
    pub complete: bool,
    pub missing_fields: Vec<&'static str>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    pub phone: String,
    #[validate(length(max = 500, message = "bio must be at most 500 characters"))]
    pub bio: Option<String>,
    #[validate(url(message = "picture must be a URL"))]
    pub picture: Option<String>,
}

/// Identity as any visitor may see it. The phone stays private.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfileView {
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub bio: Option<String>,
    #[serde(flatten)]
    pub role: Option<RoleProfile>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Identity> for PublicProfileView {
    fn from(identity: Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email,
            name: identity.name,
            picture: identity.picture,
            bio: identity.bio,
            role: identity.role,
            created_at: identity.created_at,
        }
    }
}
