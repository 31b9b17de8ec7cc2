use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::otp::PendingOtp;

/// User record as the service sees it.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String, // Argon2 PHC string, never the plaintext
    pub is_verified: bool,
    pub verify_otp: Option<PendingOtp>,
    pub reset_otp: Option<PendingOtp>,
    pub version: i64, // bumped by every successful save
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Flat row as stored in the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub verify_otp: Option<String>,
    pub verify_otp_expires_at: Option<OffsetDateTime>,
    pub reset_otp: Option<String>,
    pub reset_otp_expires_at: Option<OffsetDateTime>,
    pub version: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

fn pair(code: Option<String>, expires_at: Option<OffsetDateTime>) -> Option<PendingOtp> {
    match (code, expires_at) {
        (Some(code), Some(expires_at)) if !code.is_empty() => Some(PendingOtp { code, expires_at }),
        _ => None,
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            is_verified: row.is_verified,
            verify_otp: pair(row.verify_otp, row.verify_otp_expires_at),
            reset_otp: pair(row.reset_otp, row.reset_otp_expires_at),
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Lowercase and trim, applied before every email lookup or insert.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
