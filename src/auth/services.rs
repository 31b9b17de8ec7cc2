use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    extractors::AuthUser,
    jwt::JwtKeys,
    otp::PendingOtp,
    password::{hash_password, verify_password},
    repo::{NewUser, StoreError, UserStore},
    repo_types::{normalize_email, User},
};
use crate::{config::OtpConfig, error::AppError, notify::templates, notify::Notifier, state::AppState};

/// Attempts at a read-modify-write before giving up on a contended record.
const MAX_WRITE_ATTEMPTS: usize = 5;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn required(value: &str) -> Option<&str> {
    (!value.trim().is_empty()).then_some(value)
}

/// A freshly authenticated session.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

enum Lookup<'a> {
    Id(Uuid),
    Email(&'a str),
}

/// Orchestrates the account flows over the user store, token issuer and
/// notifier. Cheap to clone; handlers build one per request from state.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    jwt: JwtKeys,
    otp: OtpConfig,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            state.notifier.clone(),
            state.jwt.clone(),
            state.config.otp,
        )
    }
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn Notifier>,
        jwt: JwtKeys,
        otp: OtpConfig,
    ) -> Self {
        Self {
            users,
            notifier,
            jwt,
            otp,
        }
    }

    /// Create the account and sign the user in.
    ///
    /// The welcome mail is best-effort: a delivery failure is logged and the
    /// registration still succeeds.
    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let (Some(name), Some(email), Some(password)) =
            (required(name), required(email), required(password))
        else {
            return Err(AppError::Validation("All fields are required.".into()));
        };
        let name = name.trim();
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(AppError::Validation("Invalid email.".into()));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create(NewUser {
                name: name.to_string(),
                email,
                password_hash,
            })
            .await?;
        let token = self.jwt.issue(user.id)?;
        info!(user_id = %user.id, "user registered");

        let mail = templates::welcome(&user.name);
        if let Err(e) = self.notifier.send(&user.email, mail.subject, &mail.body).await {
            warn!(user_id = %user.id, error = %e, "welcome mail not delivered");
        }

        Ok(Session { user, token })
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let (Some(email), Some(password)) = (required(email), required(password)) else {
            return Err(AppError::Validation(
                "Email and password are required.".into(),
            ));
        };

        let user = match self.users.find_by_email(email).await {
            Ok(u) => u,
            Err(StoreError::NotFound) => {
                warn!("login unknown email");
                return Err(AppError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::Unauthorized);
        }

        let token = self.jwt.issue(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(Session { user, token })
    }

    pub async fn user_data(&self, who: AuthUser) -> Result<User, AppError> {
        Ok(self.users.find_by_id(who.id()).await?)
    }

    /// Issue a verification OTP to the caller's own address, replacing any
    /// pending one.
    #[instrument(skip(self))]
    pub async fn request_email_verification(&self, who: AuthUser) -> Result<(), AppError> {
        let ttl = Duration::minutes(self.otp.verify_ttl_minutes);
        let mut issued = None;
        let user = self
            .modify(Lookup::Id(who.id()), |user| {
                let otp = PendingOtp::issue(ttl, OffsetDateTime::now_utc());
                issued = Some(otp.code.clone());
                user.verify_otp = Some(otp);
                Ok(())
            })
            .await?;
        debug!("verification otp stored");

        let code = issued.unwrap_or_default();
        let mail = templates::verify_otp(&user.email, &code, self.otp.verify_ttl_minutes);
        self.notifier
            .send(&user.email, mail.subject, &mail.body)
            .await?;
        info!("verification otp sent");
        Ok(())
    }

    #[instrument(skip(self, otp))]
    pub async fn confirm_email_verification(
        &self,
        who: AuthUser,
        otp: &str,
    ) -> Result<(), AppError> {
        let Some(otp) = required(otp).map(str::trim) else {
            return Err(AppError::Validation("OTP is required.".into()));
        };
        self.modify(Lookup::Id(who.id()), |user| {
            let accepted = user
                .verify_otp
                .as_ref()
                .is_some_and(|pending| pending.accepts(otp, OffsetDateTime::now_utc()));
            if !accepted {
                return Err(AppError::InvalidOrExpired);
            }
            user.is_verified = true;
            user.verify_otp = None;
            Ok(())
        })
        .await?;
        info!("email verified");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let Some(email) = required(email) else {
            return Err(AppError::Validation("Email is required.".into()));
        };
        let ttl = Duration::minutes(self.otp.reset_ttl_minutes);
        let mut issued = None;
        let user = self
            .modify(Lookup::Email(email), |user| {
                let otp = PendingOtp::issue(ttl, OffsetDateTime::now_utc());
                issued = Some(otp.code.clone());
                user.reset_otp = Some(otp);
                Ok(())
            })
            .await?;
        debug!(user_id = %user.id, "reset otp stored");

        let code = issued.unwrap_or_default();
        let mail = templates::reset_otp(&user.email, &code, self.otp.reset_ttl_minutes);
        self.notifier
            .send(&user.email, mail.subject, &mail.body)
            .await?;
        info!(user_id = %user.id, "reset otp sent");
        Ok(())
    }

    #[instrument(skip(self, otp, new_password))]
    pub async fn confirm_password_reset(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let (Some(email), Some(otp), Some(new_password)) =
            (required(email), required(otp), required(new_password))
        else {
            return Err(AppError::Validation(
                "Email, OTP, and new password are required.".into(),
            ));
        };
        let otp = otp.trim();

        let mut new_hash: Option<String> = None;
        let user = self
            .modify(Lookup::Email(email), |user| {
                let accepted = user
                    .reset_otp
                    .as_ref()
                    .is_some_and(|pending| pending.accepts(otp, OffsetDateTime::now_utc()));
                if !accepted {
                    return Err(AppError::InvalidOrExpired);
                }
                // Hash once even if the write has to be retried.
                let hash = match &new_hash {
                    Some(h) => h.clone(),
                    None => {
                        let h = hash_password(new_password)?;
                        new_hash = Some(h.clone());
                        h
                    }
                };
                user.password_hash = hash;
                user.reset_otp = None;
                Ok(())
            })
            .await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    async fn find(&self, key: &Lookup<'_>) -> Result<User, StoreError> {
        match key {
            Lookup::Id(id) => self.users.find_by_id(*id).await,
            Lookup::Email(email) => self.users.find_by_email(email).await,
        }
    }

    /// Read the record, apply `mutate`, and save it, re-reading on a
    /// concurrent write so no update is lost.
    async fn modify<F>(&self, key: Lookup<'_>, mut mutate: F) -> Result<User, AppError>
    where
        F: FnMut(&mut User) -> Result<(), AppError> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut user = self.find(&key).await?;
            mutate(&mut user)?;
            match self.users.save(&user).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::StaleWrite) => {
                    debug!(user_id = %user.id, attempt, "concurrent update; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Internal(anyhow::anyhow!(
            "user record still contended after {MAX_WRITE_ATTEMPTS} attempts"
        )))
    }
}
