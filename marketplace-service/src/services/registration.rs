use crate::models::{Identity, ProfileUpdate, Role, RoleProfile};
use crate::services::clock::Clock;
use crate::services::store::IdentityStore;
use crate::services::ServiceError;
use std::sync::Arc;

/// Fixed-country phone format: `+<code>` followed by digits up to a fixed total length.
#[derive(Debug, Clone)]
pub struct PhoneRule {
    country_code: String,
    total_length: usize,
}

impl PhoneRule {
    pub fn new(country_code: &str, total_length: usize) -> Self {
        Self {
            country_code: country_code.to_string(),
            total_length,
        }
    }

    pub fn validate(&self, phone: &str) -> Result<String, ServiceError> {
        let phone = phone.trim();
        let digits_ok = phone
            .strip_prefix('+')
            .map(|rest| rest.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);

        if !phone.starts_with(&self.country_code)
            || phone.len() != self.total_length
            || !digits_ok
        {
            return Err(ServiceError::InvalidPhoneFormat);
        }
        Ok(phone.to_string())
    }
}

/// Raw self-registration request.
#[derive(Debug, Clone)]
pub struct RegistrationInput {
    pub first_name: String,
    pub last_name: String,
    pub email_local_part: String,
    pub phone: String,
    pub role: Role,
    pub branch: Option<String>,
    pub roll_number: Option<String>,
    pub cohort: Option<String>,
    pub department: Option<String>,
}

/// Registration that passed every rule, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRegistration {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: RoleProfile,
}

#[derive(Debug, Clone)]
pub struct UserLookup {
    pub exists: bool,
    pub resolved_email: String,
    pub identity_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProfileCompleteness {
    pub complete: bool,
    pub missing_fields: Vec<&'static str>,
}

#[derive(Clone)]
pub struct RegistrationValidator {
    identities: Arc<dyn IdentityStore>,
    clock: Arc<dyn Clock>,
    email_domain: String,
    phone_rule: PhoneRule,
}

fn required(value: Option<&String>, field: &'static str) -> Result<String, ServiceError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ServiceError::MissingRoleField(field))
}

impl RegistrationValidator {
    pub fn new(
        identities: Arc<dyn IdentityStore>,
        clock: Arc<dyn Clock>,
        email_domain: &str,
        phone_rule: PhoneRule,
    ) -> Self {
        Self {
            identities,
            clock,
            email_domain: email_domain.trim_start_matches('@').to_lowercase(),
            phone_rule,
        }
    }

    /// `<local>@<institution domain>`. The caller supplies the local part only.
    pub fn resolve_email(&self, local_part: &str) -> Result<String, ServiceError> {
        let local = local_part.trim();
        if local.is_empty() || local.contains('@') || local.chars().any(char::is_whitespace) {
            return Err(ServiceError::InvalidEmailFormat);
        }
        Ok(format!("{}@{}", local.to_lowercase(), self.email_domain))
    }

    pub fn validate(
        &self,
        input: &RegistrationInput,
    ) -> Result<ValidatedRegistration, ServiceError> {
        let email = self.resolve_email(&input.email_local_part)?;

        let first_name = input.first_name.trim();
        if first_name.is_empty() {
            return Err(ServiceError::InvalidInput("firstName is required".to_string()));
        }
        let name = match input.last_name.trim() {
            "" => first_name.to_string(),
            last => format!("{} {}", first_name, last),
        };

        let phone = self.phone_rule.validate(&input.phone)?;

        let role = match input.role {
            Role::Faculty => RoleProfile::Faculty {
                department: required(input.department.as_ref(), "department")?,
            },
            Role::Student => RoleProfile::Student {
                branch: required(input.branch.as_ref(), "branch")?,
                roll_number: required(input.roll_number.as_ref(), "rollNumber")?,
                cohort: required(input.cohort.as_ref(), "cohort")?,
            },
        };

        Ok(ValidatedRegistration {
            email,
            name,
            phone,
            role,
        })
    }

    /// Validates and persists a complete identity. The unique email index
    /// decides duplicates, so concurrent registrations cannot both succeed.
    pub async fn register(&self, input: &RegistrationInput) -> Result<Identity, ServiceError> {
        let valid = self.validate(input)?;
        let identity = Identity::registered(
            valid.email,
            valid.name,
            valid.phone,
            valid.role,
            self.clock.now(),
        );

        self.identities
            .insert_identity(&identity)
            .await
            .map_err(|e| {
                if matches!(e, ServiceError::DuplicateIdentity) {
                    tracing::info!("Registration rejected: identity already exists");
                }
                e
            })?;

        tracing::info!(
            identity_id = %identity.id,
            role = %input.role.as_str(),
            "Identity registered"
        );
        Ok(identity)
    }

    pub async fn check_user(&self, local_part: &str) -> Result<UserLookup, ServiceError> {
        let resolved_email = self.resolve_email(local_part)?;
        let identity = self.identities.find_identity_by_email(&resolved_email).await?;
        Ok(UserLookup {
            exists: identity.is_some(),
            resolved_email,
            identity_id: identity.map(|i| i.id),
        })
    }

    pub fn completeness(&self, identity: &Identity) -> ProfileCompleteness {
        let missing_fields = identity.missing_fields();
        ProfileCompleteness {
            complete: missing_fields.is_empty(),
            missing_fields,
        }
    }

    /// Owner-only profile edit. The phone must satisfy the registration rule.
    pub async fn update_profile(
        &self,
        identity: &Identity,
        phone: &str,
        bio: Option<String>,
        picture: Option<String>,
    ) -> Result<Identity, ServiceError> {
        let update = ProfileUpdate {
            phone: self.phone_rule.validate(phone)?,
            bio: bio.map(|b| b.trim().to_string()),
            picture: picture.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()),
        };

        let updated = self
            .identities
            .update_profile(&identity.id, &update, self.clock.now())
            .await?
            .ok_or(ServiceError::NotFound("Identity"))?;

        tracing::info!(identity_id = %updated.id, "Profile updated");
        Ok(updated)
    }
}
