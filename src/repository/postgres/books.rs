//! Books table and the book/genre link table

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use crate::{
    error::AppResult,
    models::{book::BookInput, Book, PageRequest},
    repository::BookStore,
};

use super::{map_fk_violation, not_found, PgStore};

/// Books with their genre ids folded into an array
const BOOK_SELECT: &str = r#"
    SELECT b.id, b.title, b.summary, b.isbn, b.author_id, b.language_id,
           COALESCE(ARRAY_AGG(bg.genre_id ORDER BY bg.genre_id)
                    FILTER (WHERE bg.genre_id IS NOT NULL), '{}') AS genre_ids
    FROM books b
    LEFT JOIN book_genres bg ON bg.book_id = b.id
"#;

impl PgStore {
    async fn replace_book_genres(
        tx: &mut Transaction<'_, Postgres>,
        book_id: i32,
        genre_ids: &[i32],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM book_genres WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut **tx)
            .await?;

        if !genre_ids.is_empty() {
            sqlx::query("INSERT INTO book_genres (book_id, genre_id) SELECT $1, UNNEST($2::int4[])")
                .bind(book_id)
                .bind(genre_ids)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_fk_violation(e, "genre"))?;
        }
        Ok(())
    }
}

#[async_trait]
impl BookStore for PgStore {
    async fn list_books(&self, page: PageRequest, title: Option<&str>) -> AppResult<(Vec<Book>, i64)> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM books
            WHERE $1::text IS NULL OR strpos(LOWER(title), LOWER($1)) > 0
            "#,
        )
        .bind(title)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, Book>(&format!(
            r#"
            {}
            WHERE $1::text IS NULL OR strpos(LOWER(b.title), LOWER($1)) > 0
            GROUP BY b.id
            ORDER BY b.id
            LIMIT $2 OFFSET $3
            "#,
            BOOK_SELECT
        ))
        .bind(title)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    async fn list_books_by_author(&self, author_id: i32) -> AppResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "{} WHERE b.author_id = $1 GROUP BY b.id ORDER BY b.id",
            BOOK_SELECT
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    async fn get_book(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("{} WHERE b.id = $1 GROUP BY b.id", BOOK_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Book", id))
    }

    async fn create_book(&self, input: &BookInput) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO books (title, summary, isbn, author_id, language_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&input.title)
        .bind(&input.summary)
        .bind(&input.isbn)
        .bind(input.author_id)
        .bind(input.language_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_fk_violation(e, "author or language"))?;

        Self::replace_book_genres(&mut tx, id, &input.normalized_genre_ids()).await?;
        tx.commit().await?;

        self.get_book(id).await
    }

    async fn update_book(&self, id: i32, input: &BookInput) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = $2, summary = $3, isbn = $4, author_id = $5, language_id = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&input.title)
        .bind(&input.summary)
        .bind(&input.isbn)
        .bind(input.author_id)
        .bind(input.language_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_fk_violation(e, "author or language"))?;

        if result.rows_affected() == 0 {
            return Err(not_found("Book", id));
        }

        Self::replace_book_genres(&mut tx, id, &input.normalized_genre_ids()).await?;
        tx.commit().await?;

        self.get_book(id).await
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        // Detached copies count as a write, so in-flight edits must reload
        sqlx::query(
            "UPDATE book_instances SET book_id = NULL, version = version + 1 WHERE book_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Book", id));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn count_books(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
