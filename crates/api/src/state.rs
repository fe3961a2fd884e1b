use std::sync::Arc;

use axum::http::HeaderMap;
use chatline_auth::{Authenticator, Identity};
use chatline_realtime::ChatHub;

use crate::util::require_bearer;
use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    authenticator: Authenticator,
    hub: Arc<ChatHub>,
}

impl AppState {
    pub fn new(authenticator: Authenticator, hub: Arc<ChatHub>) -> Self {
        Self { authenticator, hub }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn hub(&self) -> &Arc<ChatHub> {
        &self.hub
    }

    pub fn authenticate(&self, token: &str) -> Result<Identity, ApiError> {
        self.authenticator
            .verify_token(token)
            .map_err(ApiError::from)
    }

    /// Resolve the `Authorization: Bearer` header of a request.
    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let token = require_bearer(headers)?;
        self.authenticate(&token)
    }
}
