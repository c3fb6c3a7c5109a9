use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use std::collections::HashMap;

use crate::db::entities::{prelude::*, user};
use crate::db::models::UserProfile;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("User not found")]
    UserNotFound,
    #[error("Username '{0}' is already taken")]
    DuplicateUsername(String),
    #[error("Email '{0}' is already registered")]
    DuplicateEmail(String),
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub email: Option<String>,
}

pub async fn get_user_by_id<C>(conn: &C, user_id: i32) -> Result<Option<user::Model>, DbErr>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(conn).await
}

pub async fn get_user_by_username<C>(conn: &C, username: &str) -> Result<Option<user::Model>, DbErr>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Username.eq(username))
        .one(conn)
        .await
}

/// Looks a user up by username or by (case-insensitive) email.
pub async fn get_user_by_login<C>(conn: &C, login: &str) -> Result<Option<user::Model>, DbErr>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(login))
                .add(user::Column::Email.eq(login.to_lowercase())),
        )
        .one(conn)
        .await
}

/// Public profiles of the given users, keyed by id.
pub async fn profiles_by_ids<C>(conn: &C, ids: &[i32]) -> Result<HashMap<i32, UserProfile>, DbErr>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = User::find()
        .filter(user::Column::Id.is_in(ids.to_vec()))
        .all(conn)
        .await?;
    Ok(users.iter().map(|u| (u.id, UserProfile::public(u))).collect())
}

async fn ensure_unique<C>(
    conn: &C,
    username: Option<&str>,
    email: Option<&str>,
    except_user_id: Option<i32>,
) -> Result<(), UserServiceError>
where
    C: ConnectionTrait,
{
    if let Some(username) = username {
        let existing = get_user_by_username(conn, username).await?;
        if existing.is_some_and(|u| Some(u.id) != except_user_id) {
            return Err(UserServiceError::DuplicateUsername(username.to_string()));
        }
    }
    if let Some(email) = email {
        let existing = User::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await?;
        if existing.is_some_and(|u| Some(u.id) != except_user_id) {
            return Err(UserServiceError::DuplicateEmail(email.to_string()));
        }
    }
    Ok(())
}

fn unique_violation(err: DbErr, new_user_name: &str) -> UserServiceError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            UserServiceError::DuplicateUsername(new_user_name.to_string())
        }
        _ => UserServiceError::DbErr(err),
    }
}

/// Creates a user. The email is stored lower-cased.
pub async fn create_user<C>(conn: &C, new_user: NewUser) -> Result<user::Model, UserServiceError>
where
    C: ConnectionTrait,
{
    let email = new_user.email.trim().to_lowercase();
    ensure_unique(conn, Some(&new_user.username), Some(&email), None).await?;

    let now = Utc::now();
    user::ActiveModel {
        username: Set(new_user.username.clone()),
        email: Set(email),
        password_hash: Set(new_user.password_hash),
        display_name: Set(new_user.display_name.or_else(|| Some(new_user.username.clone()))),
        is_active: Set(true),
        is_admin: Set(new_user.is_admin),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(|e| unique_violation(e, &new_user.username))
}

pub async fn update_profile<C>(
    conn: &C,
    user_id: i32,
    changes: ProfileChanges,
) -> Result<user::Model, UserServiceError>
where
    C: ConnectionTrait,
{
    let existing = get_user_by_id(conn, user_id)
        .await?
        .ok_or(UserServiceError::UserNotFound)?;
    let username = existing.username.clone();
    let mut active: user::ActiveModel = existing.into();

    if let Some(email) = changes.email {
        let email = email.trim().to_lowercase();
        ensure_unique(conn, None, Some(&email), Some(user_id)).await?;
        active.email = Set(email);
    }
    if let Some(display_name) = changes.display_name {
        active.display_name = Set(Some(display_name));
    }
    if let Some(bio) = changes.bio {
        active.bio = Set(Some(bio));
    }
    if let Some(avatar_url) = changes.avatar_url {
        active.avatar_url = Set(Some(avatar_url));
    }
    active.updated_at = Set(Utc::now());

    active.update(conn).await.map_err(|e| unique_violation(e, &username))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{insert_user, setup_db};

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            display_name: None,
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_user_lowercases_email_and_rejects_duplicates() {
        let db = setup_db().await;
        let user = create_user(&db, new_user("carol", "Carol@Example.COM")).await.unwrap();
        assert_eq!(user.email, "carol@example.com");
        assert_eq!(user.display_name.as_deref(), Some("carol"));
        assert!(user.is_active);

        let same_name = create_user(&db, new_user("carol", "other@example.com")).await;
        assert!(matches!(same_name, Err(UserServiceError::DuplicateUsername(_))));

        let same_email = create_user(&db, new_user("dave", "CAROL@example.com")).await;
        assert!(matches!(same_email, Err(UserServiceError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_login_lookup_by_username_or_email() {
        let db = setup_db().await;
        let user = insert_user(&db, "erin").await;

        let by_name = get_user_by_login(&db, "erin").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        let by_email = get_user_by_login(&db, "ERIN@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, user.id);
        assert!(get_user_by_login(&db, "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_profile_keeps_email_unique() {
        let db = setup_db().await;
        let frank = insert_user(&db, "frank").await;
        insert_user(&db, "grace").await;

        let taken = ProfileChanges {
            email: Some("grace@example.com".to_string()),
            ..Default::default()
        };
        let result = update_profile(&db, frank.id, taken).await;
        assert!(matches!(result, Err(UserServiceError::DuplicateEmail(_))));

        let changes = ProfileChanges {
            bio: Some("Writes about tags".to_string()),
            email: Some("frank@example.com".to_string()),
            ..Default::default()
        };
        let updated = update_profile(&db, frank.id, changes).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("Writes about tags"));

        let profiles = profiles_by_ids(&db, &[frank.id]).await.unwrap();
        assert_eq!(profiles[&frank.id].email, None);
    }
}
