use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use sea_orm::{ConnectionTrait, DbErr};
use tracing::info;

use crate::db::entities::user;
use crate::db::services::user_service::{self, NewUser, ProfileChanges, UserServiceError};
use crate::server::config::ServerConfig;
use crate::web::models::{Claims, LoginRequest, ProfileUpdateRequest, RegisterRequest};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    User(#[from] UserServiceError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("This account has been disabled")]
    InactiveAccount,
    #[error("Administrator privileges required")]
    NotAdmin,
    #[error("Password hashing failed: {0}")]
    PasswordHashing(String),
    #[error("Token error: {0}")]
    Token(String),
}

impl From<DbErr> for AuthError {
    fn from(err: DbErr) -> Self {
        AuthError::User(UserServiceError::DbErr(err))
    }
}

/// A user together with a freshly issued token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: user::Model,
    pub token: String,
}

pub fn validate_username(username: &str) -> Result<(), AuthError> {
    let len = username.chars().count();
    let charset_ok = username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !(3..=50).contains(&len) || !charset_ok {
        return Err(AuthError::InvalidInput(
            "Username must be 3-50 characters of letters, digits or underscores".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let invalid = || AuthError::InvalidInput(format!("Invalid email address '{email}'"));
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    let ok = !local.is_empty()
        && !host.is_empty()
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@');
    if !ok {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if password.chars().count() < MIN_PASSWORD_LEN || !has_letter || !has_digit {
        return Err(AuthError::InvalidInput(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters and contain a letter and a digit"
        )));
    }
    Ok(())
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    hash(password, cost).map_err(|e| AuthError::PasswordHashing(e.to_string()))
}

pub fn create_jwt_for_user(user: &user::Model, config: &ServerConfig) -> Result<String, AuthError> {
    let expiration = (Utc::now() + Duration::hours(config.jwt_expiry_hours)).timestamp() as usize;
    let claims = Claims {
        sub: user.username.clone(),
        user_id: user.id,
        exp: expiration,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_ref()),
    )
    .map_err(|e| AuthError::Token(e.to_string()))
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_ref()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| AuthError::Token(e.to_string()))
}

async fn create_account<C>(
    conn: &C,
    config: &ServerConfig,
    req: RegisterRequest,
    is_admin: bool,
) -> Result<AuthSession, AuthError>
where
    C: ConnectionTrait,
{
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();
    validate_username(&username)?;
    validate_email(&email)?;
    validate_password(&req.password)?;

    let password_hash = hash_password(&req.password, config.bcrypt_cost)?;
    let user = user_service::create_user(
        conn,
        NewUser {
            username,
            email,
            password_hash,
            display_name: req.display_name.filter(|n| !n.trim().is_empty()),
            is_admin,
        },
    )
    .await?;
    let token = create_jwt_for_user(&user, config)?;
    info!(user_id = user.id, username = %user.username, is_admin, "User registered.");
    Ok(AuthSession { user, token })
}

pub async fn register_user<C>(conn: &C, config: &ServerConfig, req: RegisterRequest) -> Result<AuthSession, AuthError>
where
    C: ConnectionTrait,
{
    create_account(conn, config, req, false).await
}

/// Creates another administrator; the caller must already be one.
pub async fn register_admin<C>(
    conn: &C,
    config: &ServerConfig,
    caller_id: i32,
    req: RegisterRequest,
) -> Result<AuthSession, AuthError>
where
    C: ConnectionTrait,
{
    let caller = user_service::get_user_by_id(conn, caller_id)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if !caller.is_admin {
        return Err(AuthError::NotAdmin);
    }
    create_account(conn, config, req, true).await
}

/// Checks credentials given a username or email.
pub async fn login_user<C>(conn: &C, config: &ServerConfig, req: LoginRequest) -> Result<AuthSession, AuthError>
where
    C: ConnectionTrait,
{
    let login = req.username.trim();
    if login.is_empty() || req.password.is_empty() {
        return Err(AuthError::InvalidInput("Username and password are required".to_string()));
    }

    let user = user_service::get_user_by_login(conn, login)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    let valid_password =
        verify(&req.password, &user.password_hash).map_err(|e| AuthError::PasswordHashing(e.to_string()))?;
    if !valid_password {
        return Err(AuthError::InvalidCredentials);
    }
    if !user.is_active {
        return Err(AuthError::InactiveAccount);
    }

    let token = create_jwt_for_user(&user, config)?;
    info!(user_id = user.id, "User logged in.");
    Ok(AuthSession { user, token })
}

pub async fn admin_login<C>(conn: &C, config: &ServerConfig, req: LoginRequest) -> Result<AuthSession, AuthError>
where
    C: ConnectionTrait,
{
    let session = login_user(conn, config, req).await?;
    if !session.user.is_admin {
        return Err(AuthError::NotAdmin);
    }
    Ok(session)
}

pub async fn update_profile<C>(conn: &C, user_id: i32, req: ProfileUpdateRequest) -> Result<user::Model, AuthError>
where
    C: ConnectionTrait,
{
    if let Some(email) = req.email.as_deref() {
        validate_email(email.trim())?;
    }
    let changes = ProfileChanges {
        display_name: req.display_name,
        bio: req.bio,
        avatar_url: req.avatar_url,
        email: req.email,
    };
    Ok(user_service::update_profile(conn, user_id, changes).await?)
}

/// Creates the configured default administrator when it does not exist yet.
/// Returns whether an account was created.
pub async fn seed_admin<C>(conn: &C, config: &ServerConfig) -> Result<bool, AuthError>
where
    C: ConnectionTrait,
{
    let (Some(username), Some(password)) = (config.admin_username.as_deref(), config.admin_password.as_deref())
    else {
        return Ok(false);
    };
    if user_service::get_user_by_username(conn, username).await?.is_some() {
        return Ok(false);
    }

    let email = config
        .admin_email
        .clone()
        .unwrap_or_else(|| format!("{username}@localhost.local"));
    let password_hash = hash_password(password, config.bcrypt_cost)?;
    let admin = user_service::create_user(
        conn,
        NewUser {
            username: username.to_string(),
            email,
            password_hash,
            display_name: Some("Administrator".to_string()),
            is_admin: true,
        },
    )
    .await?;
    info!(user_id = admin.id, username = %admin.username, "Default administrator created.");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_db;

    fn test_config() -> ServerConfig {
        let mut config = ServerConfig::new("sqlite::memory:", "test-secret");
        config.bcrypt_cost = 4;
        config
    }

    fn register_request(username: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            display_name: None,
        }
    }

    #[test]
    fn test_input_validation() {
        assert!(validate_username("writer_01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());

        assert!(validate_email("me@example.com").is_ok());
        assert!(validate_email("me@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("me@example.c0m").is_err());

        assert!(validate_password("abcdefg1").is_ok());
        assert!(validate_password("abcdefgh").is_err());
        assert!(validate_password("12345678").is_err());
        assert!(validate_password("a1").is_err());
    }

    #[test]
    fn test_jwt_round_trip_and_wrong_secret() {
        let config = test_config();
        let now = Utc::now();
        let user = user::Model {
            id: 7,
            username: "writer".to_string(),
            email: "writer@example.com".to_string(),
            password_hash: String::new(),
            display_name: None,
            avatar_url: None,
            bio: None,
            is_active: true,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };

        let token = create_jwt_for_user(&user, &config).unwrap();
        let claims = decode_jwt(&token, &config.jwt_secret).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.sub, "writer");
        assert!(decode_jwt(&token, "other-secret").is_err());
    }

    #[tokio::test]
    async fn test_register_then_login_by_username_or_email() {
        let db = setup_db().await;
        let config = test_config();

        let session = register_user(&db, &config, register_request("writer", "Writer@Example.com", "password1"))
            .await
            .unwrap();
        assert_eq!(session.user.email, "writer@example.com");
        assert!(!session.user.is_admin);

        let by_name = LoginRequest {
            username: "writer".to_string(),
            password: "password1".to_string(),
        };
        assert!(login_user(&db, &config, by_name).await.is_ok());

        let by_email = LoginRequest {
            username: "writer@example.com".to_string(),
            password: "password1".to_string(),
        };
        assert!(login_user(&db, &config, by_email).await.is_ok());

        let wrong = LoginRequest {
            username: "writer".to_string(),
            password: "password2".to_string(),
        };
        assert!(matches!(login_user(&db, &config, wrong).await, Err(AuthError::InvalidCredentials)));

        let dup = register_user(&db, &config, register_request("writer", "new@example.com", "password1")).await;
        assert!(matches!(dup, Err(AuthError::User(UserServiceError::DuplicateUsername(_)))));
    }

    #[tokio::test]
    async fn test_admin_flows() {
        let db = setup_db().await;
        let mut config = test_config();
        config.admin_username = Some("root".to_string());
        config.admin_password = Some("rootpass1".to_string());

        assert!(seed_admin(&db, &config).await.unwrap());
        assert!(!seed_admin(&db, &config).await.unwrap());

        let admin = admin_login(
            &db,
            &config,
            LoginRequest {
                username: "root".to_string(),
                password: "rootpass1".to_string(),
            },
        )
        .await
        .unwrap();
        assert!(admin.user.is_admin);

        let regular = register_user(&db, &config, register_request("plain", "plain@example.com", "password1"))
            .await
            .unwrap();
        let denied = admin_login(
            &db,
            &config,
            LoginRequest {
                username: "plain".to_string(),
                password: "password1".to_string(),
            },
        )
        .await;
        assert!(matches!(denied, Err(AuthError::NotAdmin)));

        let escalate = register_admin(
            &db,
            &config,
            regular.user.id,
            register_request("sneaky", "sneaky@example.com", "password1"),
        )
        .await;
        assert!(matches!(escalate, Err(AuthError::NotAdmin)));

        let second = register_admin(
            &db,
            &config,
            admin.user.id,
            register_request("deputy", "deputy@example.com", "password1"),
        )
        .await
        .unwrap();
        assert!(second.user.is_admin);
    }

    #[tokio::test]
    async fn test_profile_update_validates_email() {
        let db = setup_db().await;
        let config = test_config();
        let session = register_user(&db, &config, register_request("writer", "writer@example.com", "password1"))
            .await
            .unwrap();

        let bad = ProfileUpdateRequest {
            email: Some("not-an-email".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            update_profile(&db, session.user.id, bad).await,
            Err(AuthError::InvalidInput(_))
        ));

        let good = ProfileUpdateRequest {
            display_name: Some("The Writer".to_string()),
            ..Default::default()
        };
        let updated = update_profile(&db, session.user.id, good).await.unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("The Writer"));
    }
}
