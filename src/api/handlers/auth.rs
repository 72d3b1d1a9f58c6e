//! Handlers that sit at the end of the auth chain.

use crate::{
    api::error::ErrorResponse,
    auth::CurrentAccount,
    store::Account,
};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Public view of the logged-in account.
#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub developer_type: String,
    pub two_factor_auth_enabled: bool,
    pub current_avatar: Option<String>,
    pub fallback_avatar: Option<String>,
    pub tags: Vec<String>,
}

impl From<&Account> for CurrentUser {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            developer_type: account.developer_type.clone(),
            two_factor_auth_enabled: account.mfa_enabled,
            current_avatar: account.current_avatar_id.clone(),
            fallback_avatar: account.fallback_avatar_id.clone(),
            tags: account.tags.clone(),
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionToken {
    pub ok: bool,
    pub token: String,
}

#[utoipa::path(
    get,
    path = "/api/1/auth/user",
    params(
        ("apiKey" = String, Query, description = "Client application API key")
    ),
    responses(
        (status = 200, description = "Logged in; `auth` cookie set when Basic credentials were sent", body = CurrentUser),
        (status = 401, description = "Missing or invalid credentials, or second factor required", body = ErrorResponse),
        (status = 500, description = "Session could not be created", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn current_user(current: CurrentAccount) -> Json<CurrentUser> {
    Json(CurrentUser::from(current.account.as_ref()))
}

#[utoipa::path(
    get,
    path = "/api/1/auth",
    params(
        ("apiKey" = String, Query, description = "Client application API key")
    ),
    responses(
        (status = 200, description = "Session token in use", body = SessionToken),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn session_token(current: CurrentAccount) -> Json<SessionToken> {
    Json(SessionToken {
        ok: true,
        token: current.session_token,
    })
}
