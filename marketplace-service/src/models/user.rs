use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
        }
    }
}

/// Role together with exactly the attributes that role requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum RoleProfile {
    #[serde(rename_all = "camelCase")]
    Student {
        branch: String,
        roll_number: String,
        cohort: String,
    },
    #[serde(rename_all = "camelCase")]
    Faculty { department: String },
}

impl RoleProfile {
    /// Names of role attributes that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields: Vec<(&'static str, &String)> = match self {
            RoleProfile::Student {
                branch,
                roll_number,
                cohort,
            } => vec![
                ("branch", branch),
                ("rollNumber", roll_number),
                ("cohort", cohort),
            ],
            RoleProfile::Faculty { department } => vec![("department", department)],
        };

        fields
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

/// Marketplace account.
///
/// An identity created from a provider login starts with an empty phone and no
/// role; it can browse but cannot buy or spend listing entitlements until a
/// phone is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    #[serde(default)]
    pub phone: String,
    pub bio: Option<String>,
    #[serde(default)]
    pub role: Option<RoleProfile>,
    pub registration_complete: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Identity minted on first provider login.
    pub fn pending(email: String, name: String, picture: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            name,
            picture,
            phone: String::new(),
            bio: None,
            role: None,
            registration_complete: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Identity created by explicit self-registration.
    pub fn registered(
        email: String,
        name: String,
        phone: String,
        role: RoleProfile,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
            name,
            picture: None,
            phone,
            bio: None,
            role: Some(role),
            registration_complete: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_phone(&self) -> bool {
        !self.phone.trim().is_empty()
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_phone() {
            missing.push("phone");
        }
        if let Some(role) = &self.role {
            missing.extend(role.missing_fields());
        }
        missing
    }
}

/// Profile fields an identity may change about itself.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub phone: String,
    pub bio: Option<String>,
    pub picture: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_identity_misses_phone_only() {
        let identity = Identity::pending(
            "asha@thapar.edu".into(),
            "Asha".into(),
            None,
            Utc::now(),
        );
        assert!(!identity.has_phone());
        assert_eq!(identity.missing_fields(), vec!["phone"]);
    }

    #[test]
    fn role_profile_serializes_with_tag() {
        let role = RoleProfile::Student {
            branch: "COE".into(),
            roll_number: "102103001".into(),
            cohort: "2021".into(),
        };
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(json["role"], "student");
        assert_eq!(json["rollNumber"], "102103001");
        assert!(json.get("department").is_none());
    }

    #[test]
    fn blank_role_fields_are_reported() {
        let role = RoleProfile::Faculty {
            department: "  ".into(),
        };
        assert_eq!(role.missing_fields(), vec!["department"]);
    }
}
