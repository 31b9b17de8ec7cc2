use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo_types::{normalize_email, User, UserRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("user not found")]
    NotFound,
    /// The record changed since it was read; re-read and retry.
    #[error("stale write: user record was modified concurrently")]
    StaleWrite,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Fields required to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Persistence for user records. Emails are matched case-insensitively.
///
/// `save` is a compare-and-swap on [`User::version`]: it only succeeds when
/// the stored record still has the version the caller read.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<User, StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError>;
    async fn save(&self, user: &User) -> Result<User, StoreError>;
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| &*code == "23505"),
        _ => false,
    }
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, is_verified,
                      verify_otp, verify_otp_expires_at, reset_otp, reset_otp_expires_at,
                      version, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(normalize_email(&new.email))
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(row.into())
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, is_verified,
                   verify_otp, verify_otp_expires_at, reset_otp, reset_otp_expires_at,
                   version, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.db)
        .await?;
        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, password_hash, is_verified,
                   verify_otp, verify_otp_expires_at, reset_otp, reset_otp_expires_at,
                   version, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(User::from).ok_or(StoreError::NotFound)
    }

    async fn save(&self, user: &User) -> Result<User, StoreError> {
        // Single statement, so readers never observe a partial update.
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
               SET name = $3,
                   password_hash = $4,
                   is_verified = $5,
                   verify_otp = $6,
                   verify_otp_expires_at = $7,
                   reset_otp = $8,
                   reset_otp_expires_at = $9,
                   version = version + 1,
                   updated_at = now()
             WHERE id = $1 AND version = $2
            RETURNING id, name, email, password_hash, is_verified,
                      verify_otp, verify_otp_expires_at, reset_otp, reset_otp_expires_at,
                      version, created_at, updated_at
            "#,
        )
        .bind(user.id)
        .bind(user.version)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(user.verify_otp.as_ref().map(|o| o.code.as_str()))
        .bind(user.verify_otp.as_ref().map(|o| o.expires_at))
        .bind(user.reset_otp.as_ref().map(|o| o.code.as_str()))
        .bind(user.reset_otp.as_ref().map(|o| o.expires_at))
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => {
                let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
                    .bind(user.id)
                    .fetch_optional(&self.db)
                    .await?;
                Err(if exists.is_some() {
                    StoreError::StaleWrite
                } else {
                    StoreError::NotFound
                })
            }
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    by_id: HashMap<Uuid, User>,
    by_email: HashMap<String, Uuid>,
}

/// In-process store for tests and local development.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let email = normalize_email(&new.email);
        let mut inner = self.inner.write().await;
        if inner.by_email.contains_key(&email) {
            return Err(StoreError::DuplicateEmail);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: email.clone(),
            password_hash: new.password_hash,
            is_verified: false,
            verify_otp: None,
            reset_otp: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        inner.by_email.insert(email, user.id);
        inner.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, StoreError> {
        let inner = self.inner.read().await;
        inner
            .by_email
            .get(&normalize_email(email))
            .and_then(|id| inner.by_id.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<User, StoreError> {
        let inner = self.inner.read().await;
        inner.by_id.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn save(&self, user: &User) -> Result<User, StoreError> {
        let mut inner = self.inner.write().await;
        let stored = inner.by_id.get_mut(&user.id).ok_or(StoreError::NotFound)?;
        if stored.version != user.version {
            return Err(StoreError::StaleWrite);
        }
        // Email and creation time are immutable.
        let mut next = user.clone();
        next.email = stored.email.clone();
        next.created_at = stored.created_at;
        next.version = stored.version + 1;
        next.updated_at = OffsetDateTime::now_utc();
        *stored = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::otp::PendingOtp;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ann".into(),
            email: email.into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
        }
    }

    #[tokio::test]
    async fn create_normalizes_email_and_rejects_duplicates() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("Ann@X.com")).await.unwrap();
        assert_eq!(user.email, "ann@x.com");
        assert!(!user.is_verified);
        assert_eq!(user.version, 0);

        let err = store.create(new_user("ann@x.COM")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn lookups_are_case_insensitive() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("ann@x.com")).await.unwrap();
        assert_eq!(store.find_by_email("ANN@x.com").await.unwrap().id, user.id);
        assert_eq!(store.find_by_id(user.id).await.unwrap().email, "ann@x.com");
        assert!(matches!(
            store.find_by_email("bob@x.com").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.find_by_id(Uuid::new_v4()).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn save_bumps_version_and_persists_fields() {
        let store = MemoryUserStore::new();
        let mut user = store.create(new_user("ann@x.com")).await.unwrap();
        user.verify_otp = Some(PendingOtp::issue(
            time::Duration::hours(24),
            OffsetDateTime::now_utc(),
        ));
        let saved = store.save(&user).await.unwrap();
        assert_eq!(saved.version, 1);

        let read = store.find_by_id(user.id).await.unwrap();
        assert_eq!(read.verify_otp, user.verify_otp);
        assert_eq!(read.version, 1);
    }

    #[tokio::test]
    async fn save_with_stale_version_is_rejected() {
        let store = MemoryUserStore::new();
        let user = store.create(new_user("ann@x.com")).await.unwrap();
        let mut first = user.clone();
        let mut second = user.clone();

        first.is_verified = true;
        store.save(&first).await.unwrap();

        second.name = "Other".into();
        assert!(matches!(
            store.save(&second).await,
            Err(StoreError::StaleWrite)
        ));
        let read = store.find_by_id(user.id).await.unwrap();
        assert!(read.is_verified);
        assert_eq!(read.name, "Ann");
    }

    #[tokio::test]
    async fn save_cannot_change_email() {
        let store = MemoryUserStore::new();
        let mut user = store.create(new_user("ann@x.com")).await.unwrap();
        user.email = "mallory@x.com".into();
        let saved = store.save(&user).await.unwrap();
        assert_eq!(saved.email, "ann@x.com");
        assert!(store.find_by_email("mallory@x.com").await.is_err());
    }

    #[tokio::test]
    #[ignore = "requires DATABASE_URL pointing at a migrated Postgres"]
    async fn pg_store_roundtrip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPool::connect(&url).await.unwrap();
        let store = PgUserStore::new(pool);
        let email = format!("{}@example.com", Uuid::new_v4());
        let user = store.create(new_user(&email)).await.unwrap();
        assert!(matches!(
            store.create(new_user(&email)).await,
            Err(StoreError::DuplicateEmail)
        ));
        let mut stale = user.clone();
        let mut fresh = store.find_by_email(&email.to_uppercase()).await.unwrap();
        fresh.is_verified = true;
        store.save(&fresh).await.unwrap();
        stale.name = "x".into();
        assert!(matches!(store.save(&stale).await, Err(StoreError::StaleWrite)));
    }
}
