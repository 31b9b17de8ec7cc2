use serde::Serialize;

use crate::auth::repo_types::User;

/// Profile fields the frontend is allowed to see.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub name: String,
    pub email: String,
    pub is_account_verified: bool,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            name: user.name,
            email: user.email,
            is_account_verified: user.is_verified,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDataResponse {
    pub success: bool,
    pub user_data: UserData,
}
