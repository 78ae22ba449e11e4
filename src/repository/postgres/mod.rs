//! PostgreSQL catalog store

mod authors;
mod books;
mod genres;
mod instances;
mod languages;
mod users;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::error::{AppError, AppResult};

use super::CatalogStore;

/// Catalog store backed by a Postgres connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    /// Create a new store with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Turn a failed foreign key into a not-found on the referenced entity
fn map_fk_violation(e: sqlx::Error, what: &str) -> AppError {
    match e.as_database_error() {
        Some(db) if db.is_foreign_key_violation() => {
            AppError::NotFound(format!("Referenced {} not found", what))
        }
        _ => AppError::Database(e),
    }
}

fn not_found(entity: &str, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", entity, id))
}
