use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chatline_database::ChatMessage;
use serde::Deserialize;

use crate::{ApiError, ApiJson, AppState};

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchMessagesQuery {
    pub query: Option<String>,
    pub limit: Option<i64>,
}

/// Any other fields, such as a client-chosen author name, are ignored; the
/// author is always the authenticated identity.
#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub content: Option<String>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListMessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    state.authenticate_headers(&headers)?;
    let messages = state.hub().recent_messages(params.limit).await?;
    Ok(Json(messages))
}

pub async fn search_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchMessagesQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    state.authenticate_headers(&headers)?;
    let query = params.query.unwrap_or_default();
    let messages = state.hub().search_messages(&query, params.limit).await?;
    Ok(Json(messages))
}

pub async fn create_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<CreateMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessage>), ApiError> {
    let identity = state.authenticate_headers(&headers)?;
    let content = payload.content.unwrap_or_default();
    let message = state.hub().send_message(&content, &identity).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
