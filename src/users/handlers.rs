use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::dto::{UserData, UserDataResponse};
use crate::{
    auth::{AuthService, AuthUser},
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/user-data", get(user_data))
}

#[instrument(skip(auth))]
pub async fn user_data(
    State(auth): State<AuthService>,
    user: AuthUser,
) -> Result<Json<UserDataResponse>, AppError> {
    let record = auth.user_data(user).await?;
    Ok(Json(UserDataResponse {
        success: true,
        user_data: UserData::from(record),
    }))
}
