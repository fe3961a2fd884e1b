use std::str::FromStr;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row, SqlitePool,
};
use chatline_auth::{AuthError, Authenticator, Claims};
use chatline_config::AuthConfig;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

const SECRET: &str = "integration-test-secret";

fn default_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: SECRET.into(),
        issuer: "chatline-tests".into(),
        token_ttl_seconds: 3_600,
    }
}

struct TestContext {
    pool: SqlitePool,
    authenticator: Authenticator,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new(config: AuthConfig) -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let db_path = temp_dir.path().join("auth.sqlite");
        let db_url = format!("sqlite://{}", db_path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;

        let authenticator = Authenticator::new(pool.clone(), config);

        Ok(Self {
            pool,
            authenticator,
            _temp_dir: temp_dir,
        })
    }

    async fn new_default() -> TestResult<Self> {
        Self::new(default_auth_config()).await
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

#[tokio::test]
async fn register_persists_user_with_hashed_password() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let identity = ctx
        .authenticator()
        .register(" Alice@Example.com ", "hunter2", Some("Alice"))
        .await?;

    assert_eq!(identity.email, "alice@example.com");
    assert_eq!(identity.name.as_deref(), Some("Alice"));

    let row = sqlx::query("SELECT email, password_hash FROM users WHERE id = ?")
        .bind(identity.user_id)
        .fetch_one(ctx.pool())
        .await?;

    let email: String = row.try_get("email")?;
    let hash: String = row.try_get("password_hash")?;
    assert_eq!(email, "alice@example.com");
    assert!(hash.starts_with("$argon2"));
    assert_ne!(hash, "hunter2");

    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_email_case_insensitively() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator()
        .register("bob@example.com", "password", None)
        .await?;

    let result = ctx
        .authenticator()
        .register("BOB@example.com", "other", None)
        .await;

    assert!(matches!(result, Err(AuthError::UserExists)));
    Ok(())
}

#[tokio::test]
async fn register_validates_input() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let bad_email = ctx.authenticator().register("not-an-email", "pw", None).await;
    assert!(matches!(bad_email, Err(AuthError::InvalidEmail)));

    let empty_password = ctx
        .authenticator()
        .register("carol@example.com", "", None)
        .await;
    assert!(matches!(empty_password, Err(AuthError::EmptyPassword)));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(count, 0);

    Ok(())
}

#[tokio::test]
async fn password_hashes_use_unique_salts() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator()
        .register("one@example.com", "same-password", None)
        .await?;
    ctx.authenticator()
        .register("two@example.com", "same-password", None)
        .await?;

    let hashes: Vec<String> = sqlx::query_scalar("SELECT password_hash FROM users ORDER BY id")
        .fetch_all(ctx.pool())
        .await?;

    assert_eq!(hashes.len(), 2);
    assert_ne!(hashes[0], hashes[1]);
    Ok(())
}

#[tokio::test]
async fn login_issues_token_that_verifies() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let registered = ctx
        .authenticator()
        .register("dana@example.com", "correct horse", Some("Dana"))
        .await?;

    let issued = ctx
        .authenticator()
        .login("DANA@example.com", "correct horse")
        .await?;

    assert_eq!(issued.identity, registered);
    assert!(issued.expires_at > Utc::now());
    assert!(issued.expires_at <= Utc::now() + chrono::Duration::seconds(3_600));

    let verified = ctx.authenticator().verify_token(&issued.token)?;
    assert_eq!(verified, registered);

    Ok(())
}

#[tokio::test]
async fn login_rejects_wrong_password_and_unknown_email() -> TestResult {
    let ctx = TestContext::new_default().await?;

    ctx.authenticator()
        .register("erin@example.com", "right", None)
        .await?;

    let wrong_password = ctx.authenticator().login("erin@example.com", "wrong").await;
    assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));

    let unknown = ctx.authenticator().login("nobody@example.com", "right").await;
    assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));

    Ok(())
}

#[tokio::test]
async fn verify_token_rejects_expired_token() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: "1".into(),
        user_id: 1,
        email: "old@example.com".into(),
        name: None,
        iat: now - 7_200,
        exp: now - 3_600,
        iss: "chatline-tests".into(),
        jti: "expired".into(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )?;

    let result = ctx.authenticator().verify_token(&token);
    assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    Ok(())
}

#[tokio::test]
async fn verify_token_rejects_token_from_other_secret() -> TestResult {
    let ctx = TestContext::new_default().await?;
    ctx.authenticator()
        .register("frank@example.com", "pw", None)
        .await?;

    let other = TestContext::new(AuthConfig {
        jwt_secret: "a-different-secret".into(),
        ..default_auth_config()
    })
    .await?;
    other
        .authenticator()
        .register("frank@example.com", "pw", None)
        .await?;
    let foreign = other.authenticator().login("frank@example.com", "pw").await?;

    let result = ctx.authenticator().verify_token(&foreign.token);
    assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    Ok(())
}

#[tokio::test]
async fn user_profile_returns_registered_identity() -> TestResult {
    let ctx = TestContext::new_default().await?;

    let identity = ctx
        .authenticator()
        .register("gina@example.com", "pw", Some("  Gina  "))
        .await?;
    assert_eq!(identity.name.as_deref(), Some("Gina"));

    let profile = ctx.authenticator().user_profile(identity.user_id).await?;
    assert_eq!(profile, identity);

    let missing = ctx.authenticator().user_profile(identity.user_id + 100).await;
    assert!(matches!(missing, Err(AuthError::UserNotFound)));
    Ok(())
}
