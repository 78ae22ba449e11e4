//! Authors table

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{author::AuthorInput, Author, PageRequest},
    repository::AuthorStore,
};

use super::{not_found, PgStore};

const AUTHOR_COLUMNS: &str = "id, first_name, last_name, date_of_birth, date_of_death";

#[async_trait]
impl AuthorStore for PgStore {
    async fn list_authors(&self, page: PageRequest) -> AppResult<(Vec<Author>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;

        let authors = sqlx::query_as::<_, Author>(&format!(
            "SELECT {} FROM authors ORDER BY id LIMIT $1 OFFSET $2",
            AUTHOR_COLUMNS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((authors, total))
    }

    async fn get_author(&self, id: i32) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(&format!("SELECT {} FROM authors WHERE id = $1", AUTHOR_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Author", id))
    }

    async fn create_author(&self, input: &AuthorInput) -> AppResult<Author> {
        let author = sqlx::query_as::<_, Author>(&format!(
            r#"
            INSERT INTO authors (first_name, last_name, date_of_birth, date_of_death)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            AUTHOR_COLUMNS
        ))
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(input.date_of_birth)
        .bind(input.date_of_death)
        .fetch_one(&self.pool)
        .await?;
        Ok(author)
    }

    async fn update_author(&self, id: i32, input: &AuthorInput) -> AppResult<Author> {
        sqlx::query_as::<_, Author>(&format!(
            r#"
            UPDATE authors
            SET first_name = $2, last_name = $3, date_of_birth = $4, date_of_death = $5
            WHERE id = $1
            RETURNING {}
            "#,
            AUTHOR_COLUMNS
        ))
        .bind(id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(input.date_of_birth)
        .bind(input.date_of_death)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Author", id))
    }

    async fn delete_author(&self, id: i32) -> AppResult<()> {
        // books.author_id is ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Author", id));
        }
        Ok(())
    }

    async fn count_authors(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM authors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
