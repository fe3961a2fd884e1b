use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chatline_auth::{Identity, IssuedToken};
use serde::{Deserialize, Serialize};

use crate::{ApiError, ApiJson, AppState};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<Identity> for UserResponse {
    fn from(value: Identity) -> Self {
        Self {
            id: value.user_id,
            email: value.email,
            name: value.name,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
}

impl From<IssuedToken> for SessionResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
            expires_at: issued.expires_at.to_rfc3339(),
            user: issued.identity.into(),
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let identity = state
        .authenticator()
        .register(&payload.email, &payload.password, payload.name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(identity.into())))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let issued = state
        .authenticator()
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(issued.into()))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let identity = state.authenticate_headers(&headers)?;
    let profile = state.authenticator().user_profile(identity.user_id).await?;

    Ok(Json(profile.into()))
}
