use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub mongodb: MongoConfig,
    pub identity_provider: IdentityProviderConfig,
    pub razorpay: RazorpayConfig,
    pub listing_fee: ListingFeeConfig,
    pub session: SessionConfig,
    pub registration: RegistrationConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    /// `memory://` selects the in-process store.
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProviderConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: Secret<String>,
    pub api_base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingFeeConfig {
    /// Price of one listing in the currency's minor unit (paise for INR).
    pub amount_minor: i64,
    pub currency: String,
    pub entitlement_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_days: i64,
    pub cookie_name: String,
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    pub institution_email_domain: String,
    pub phone_country_code: String,
    pub phone_total_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub register_attempts: u32,
    pub register_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
    /// Key limits by the first `x-forwarded-for` hop. Enable only behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl MarketplaceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = MarketplaceConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("marketplace-service"), false)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            mongodb: MongoConfig {
                uri: get_env("MONGODB_URI", Some("memory://"), is_prod)?,
                database: get_env("MONGODB_DATABASE", Some("campus_marketplace"), is_prod)?,
            },
            identity_provider: IdentityProviderConfig {
                url: get_env(
                    "IDENTITY_PROVIDER_URL",
                    Some("http://localhost:9000/session-data"),
                    is_prod,
                )?,
                timeout_seconds: parse_env("IDENTITY_PROVIDER_TIMEOUT_SECONDS", "10", is_prod)?,
            },
            razorpay: RazorpayConfig {
                key_id: get_env("RAZORPAY_KEY_ID", Some(""), is_prod)?,
                key_secret: Secret::new(get_env("RAZORPAY_KEY_SECRET", Some(""), is_prod)?),
                api_base_url: get_env(
                    "RAZORPAY_API_BASE_URL",
                    Some("https://api.razorpay.com/v1"),
                    false,
                )?,
                timeout_seconds: parse_env("PAYMENT_GATEWAY_TIMEOUT_SECONDS", "10", false)?,
            },
            listing_fee: ListingFeeConfig {
                amount_minor: parse_env("LISTING_FEE_MINOR", "2000", false)?,
                currency: get_env("LISTING_FEE_CURRENCY", Some("INR"), false)?,
                entitlement_ttl_minutes: parse_env("ENTITLEMENT_TTL_MINUTES", "60", false)?,
            },
            session: SessionConfig {
                ttl_days: parse_env("SESSION_TTL_DAYS", "7", false)?,
                cookie_name: get_env("SESSION_COOKIE_NAME", Some("session_token"), false)?,
                cookie_secure: parse_env("SESSION_COOKIE_SECURE", "true", false)?,
            },
            registration: RegistrationConfig {
                institution_email_domain: get_env(
                    "INSTITUTION_EMAIL_DOMAIN",
                    Some("thapar.edu"),
                    false,
                )?,
                phone_country_code: get_env("PHONE_COUNTRY_CODE", Some("+91"), false)?,
                phone_total_length: parse_env("PHONE_TOTAL_LENGTH", "13", false)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            },
            rate_limit: RateLimitConfig {
                register_attempts: parse_env("RATE_LIMIT_REGISTER_ATTEMPTS", "5", false)?,
                register_window_seconds: parse_env(
                    "RATE_LIMIT_REGISTER_WINDOW_SECONDS",
                    "3600",
                    false,
                )?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "100", false)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    false,
                )?,
                trust_forwarded_for: parse_env(
                    "RATE_LIMIT_TRUST_FORWARDED_FOR",
                    "false",
                    false,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.listing_fee.amount_minor <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LISTING_FEE_MINOR must be positive"
            )));
        }

        if self.listing_fee.entitlement_ttl_minutes <= 0 || self.session.ttl_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "ENTITLEMENT_TTL_MINUTES and SESSION_TTL_DAYS must be positive"
            )));
        }

        let code = &self.registration.phone_country_code;
        if !code.starts_with('+')
            || code.len() < 2
            || !code[1..].chars().all(|c| c.is_ascii_digit())
            || self.registration.phone_total_length <= code.len()
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PHONE_COUNTRY_CODE must look like +<digits> and be shorter than PHONE_TOTAL_LENGTH"
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.mongodb.uri.starts_with("memory://") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "In-memory store is not allowed in production"
                )));
            }

            if !self.session.cookie_secure {
                tracing::error!("SESSION_COOKIE_SECURE is disabled in production");
            }
        }

        Ok(())
    }

    pub fn uses_memory_store(&self) -> bool {
        self.mongodb.uri.starts_with("memory://")
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn parse_env_uses_default_when_unset() {
        let value: u64 = parse_env("MARKETPLACE_TEST_UNSET_KNOB", "42", false).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn required_in_prod_fails_when_unset() {
        let err = get_env("MARKETPLACE_TEST_UNSET_SECRET", Some("x"), true).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
