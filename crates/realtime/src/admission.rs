//! Connection admission: a credential is checked once, before a socket is
//! upgraded or registered.

use async_trait::async_trait;
use chatline_auth::{Authenticator, Identity};
use tracing::{info, warn};

use crate::error::{RealtimeError, RealtimeResult};

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify_credential(&self, token: &str) -> RealtimeResult<Identity>;
}

#[async_trait]
impl CredentialVerifier for Authenticator {
    async fn verify_credential(&self, token: &str) -> RealtimeResult<Identity> {
        self.verify_token(token)
            .map_err(|err| RealtimeError::InvalidCredential(err.to_string()))
    }
}

/// Admit a connection attempt carrying `credential`.
pub async fn admit<V>(verifier: &V, credential: Option<&str>) -> RealtimeResult<Identity>
where
    V: CredentialVerifier + ?Sized,
{
    let token = match credential.map(str::trim) {
        Some(token) if !token.is_empty() => token,
        _ => {
            warn!("connection rejected: missing credential");
            return Err(RealtimeError::MissingCredential);
        }
    };

    match verifier.verify_credential(token).await {
        Ok(identity) => {
            info!(user_id = identity.user_id, "connection admitted");
            Ok(identity)
        }
        Err(err) => {
            warn!(error = %err, "connection rejected: invalid credential");
            Err(err)
        }
    }
}
