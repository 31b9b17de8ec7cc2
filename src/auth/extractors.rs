use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{cookies::extract_session_token, jwt::JwtKeys};
use crate::error::AppError;

/// Identity established by the session guard.
///
/// Only the extractor constructs one, so a handler that takes `AuthUser`
/// can only ever act on the caller's own account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(Uuid);

impl AuthUser {
    pub(crate) fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn id(&self) -> Uuid {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_session_token(&parts.headers) else {
            debug!("no session token on request");
            return Err(AppError::Unauthenticated);
        };

        let keys = JwtKeys::from_ref(state);
        match keys.verify(&token) {
            Ok(user_id) => Ok(AuthUser::new(user_id)),
            Err(kind) => {
                warn!(reason = %kind, "session token rejected");
                Err(AppError::InvalidToken)
            }
        }
    }
}
