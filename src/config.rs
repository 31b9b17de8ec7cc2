use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Lifetimes of the two OTP kinds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OtpConfig {
    pub verify_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            verify_ttl_minutes: 24 * 60,
            reset_ttl_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub sender: String,
    pub api_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` selects the in-memory user store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub mail: MailConfig,
    /// Production deployments get `Secure; SameSite=None` session cookies.
    pub production: bool,
    pub cors_origin: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "authgate".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authgate-users".into()),
            ttl_minutes: env_minutes("JWT_TTL_MINUTES").unwrap_or(7 * 24 * 60),
        };
        let defaults = OtpConfig::default();
        let otp = OtpConfig {
            verify_ttl_minutes: env_minutes("VERIFY_OTP_TTL_MINUTES")
                .unwrap_or(defaults.verify_ttl_minutes),
            reset_ttl_minutes: env_minutes("RESET_OTP_TTL_MINUTES")
                .unwrap_or(defaults.reset_ttl_minutes),
        };
        let mail = MailConfig {
            sender: std::env::var("SENDER_EMAIL").unwrap_or_else(|_| "no-reply@localhost".into()),
            api_url: std::env::var("MAIL_API_URL").ok().filter(|v| !v.is_empty()),
            api_key: std::env::var("MAIL_API_KEY").ok().filter(|v| !v.is_empty()),
        };
        let production = std::env::var("APP_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".into());

        Ok(Self {
            database_url,
            jwt,
            otp,
            mail,
            production,
            cors_origin,
        })
    }
}

fn env_minutes(key: &str) -> Option<i64> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
}
