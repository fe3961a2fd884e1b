//! Account registration, password login and bearer token verification.

use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, info};

use chatline_config::AuthConfig;

pub mod jwt;

pub use jwt::{Claims, TokenSigner};

/// Upper bound for token lifetimes so expiry arithmetic stays in range.
const MAX_TOKEN_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    tokens: TokenSigner,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("a valid email address is required")]
    InvalidEmail,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("token creation failed: {0}")]
    TokenCreation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
}

/// The verified user behind a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub name: Option<String>,
}

impl Identity {
    /// Name shown as a message author: the profile name, or the email.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub identity: Identity,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: AuthConfig) -> Self {
        let ttl_seconds = i64::try_from(config.token_ttl_seconds)
            .unwrap_or(MAX_TOKEN_TTL_SECONDS)
            .min(MAX_TOKEN_TTL_SECONDS);

        let tokens = TokenSigner::new(
            &config.jwt_secret,
            config.issuer,
            Duration::seconds(ttl_seconds),
        );

        Self { pool, tokens }
    }

    /// Create an account. Emails are stored trimmed and lowercased.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthError::EmptyPassword);
        }
        let name = name
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned);

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = hash_password(password)?;

        let result = sqlx::query(
            "INSERT INTO users (email, password_hash, name, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&email)
        .bind(&password_hash)
        .bind(name.as_deref())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if let sqlx::Error::Database(db) = &err {
                if db.is_unique_violation() {
                    return AuthError::UserExists;
                }
            }
            AuthError::Database(err)
        })?;

        tx.commit().await?;

        let identity = Identity {
            user_id: result.last_insert_rowid(),
            email,
            name,
        };
        info!(user_id = identity.user_id, "registered user");

        Ok(identity)
    }

    /// Check a password and sign a fresh bearer token.
    ///
    /// Unknown emails and wrong passwords both yield
    /// [`AuthError::InvalidCredentials`].
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedToken, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let row = sqlx::query("SELECT id, email, name, password_hash FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::InvalidCredentials);
        };

        let secret: String = row.try_get("password_hash")?;
        let stored_hash = PasswordHash::new(&secret)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let identity = Identity {
            user_id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
        };

        let (token, expires_at) = self.tokens.issue(&identity)?;
        debug!(user_id = identity.user_id, %expires_at, "issued bearer token");

        Ok(IssuedToken {
            token,
            expires_at,
            identity,
        })
    }

    /// Resolve a bearer token to its identity without touching the database.
    pub fn verify_token(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens.verify(token)
    }

    pub async fn user_profile(&self, user_id: i64) -> Result<Identity, AuthError> {
        let row = sqlx::query("SELECT id, email, name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(Identity {
            user_id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
        })
    }
}

fn normalize_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AuthError::InvalidEmail),
    }
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
    }

    #[test]
    fn normalize_email_requires_local_and_domain() {
        assert!(matches!(normalize_email("alice"), Err(AuthError::InvalidEmail)));
        assert!(matches!(normalize_email("@example.com"), Err(AuthError::InvalidEmail)));
        assert!(matches!(normalize_email("alice@"), Err(AuthError::InvalidEmail)));
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut identity = Identity {
            user_id: 1,
            email: "bob@example.com".into(),
            name: None,
        };
        assert_eq!(identity.display_name(), "bob@example.com");

        identity.name = Some("Bob".into());
        assert_eq!(identity.display_name(), "Bob");
    }
}
