//! User accounts

use async_trait::async_trait;

use crate::{
    error::{AppError, AppResult},
    models::{
        user::{NewUser, UserRow},
        User, UserId,
    },
    repository::UserStore,
};

use super::{not_found, PgStore};

const USER_COLUMNS: &str = "id, username, password_hash, first_name, last_name, permissions";

#[async_trait]
impl UserStore for PgStore {
    async fn get_user(&self, id: UserId) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("User", id))?;

        Ok(row.into())
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let permissions: Vec<&str> = user.permissions.iter().map(|p| p.as_str()).collect();

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, password_hash, first_name, last_name, permissions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&permissions)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Username {} already exists", user.username))
            }
            _ => AppError::Database(e),
        })?;

        Ok(row.into())
    }
}
