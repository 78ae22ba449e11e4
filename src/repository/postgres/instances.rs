//! Book instances (copies) and loan listings

use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book_instance::{BookInstanceRow, LoanStatusKind, TitledInstance},
        BookInstance, PageRequest, UserId,
    },
    repository::InstanceStore,
};

use super::{map_fk_violation, not_found, PgStore};

const INSTANCE_COLUMNS: &str = "id, book_id, imprint, status, borrower_id, due_back, version";

#[derive(Debug, FromRow)]
struct TitledInstanceRow {
    #[sqlx(flatten)]
    instance: BookInstanceRow,
    book_title: Option<String>,
}

impl TryFrom<TitledInstanceRow> for TitledInstance {
    type Error = AppError;

    fn try_from(row: TitledInstanceRow) -> Result<Self, Self::Error> {
        Ok(TitledInstance {
            instance: row.instance.try_into()?,
            book_title: row.book_title,
        })
    }
}

fn into_instances(rows: Vec<BookInstanceRow>) -> AppResult<Vec<BookInstance>> {
    rows.into_iter().map(BookInstance::try_from).collect()
}

fn into_titled(rows: Vec<TitledInstanceRow>) -> AppResult<Vec<TitledInstance>> {
    rows.into_iter().map(TitledInstance::try_from).collect()
}

#[async_trait]
impl InstanceStore for PgStore {
    async fn get_instance(&self, id: Uuid) -> AppResult<BookInstance> {
        let row = sqlx::query_as::<_, BookInstanceRow>(&format!(
            "SELECT {} FROM book_instances WHERE id = $1",
            INSTANCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Book instance", id))?;

        row.try_into()
    }

    async fn list_instances_for_book(&self, book_id: i32) -> AppResult<Vec<BookInstance>> {
        let rows = sqlx::query_as::<_, BookInstanceRow>(&format!(
            r#"
            SELECT {} FROM book_instances
            WHERE book_id = $1
            ORDER BY due_back ASC NULLS FIRST, id
            "#,
            INSTANCE_COLUMNS
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        into_instances(rows)
    }

    async fn insert_instance(&self, instance: &BookInstance) -> AppResult<BookInstance> {
        let row = sqlx::query_as::<_, BookInstanceRow>(&format!(
            r#"
            INSERT INTO book_instances (id, book_id, imprint, status, borrower_id, due_back, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            INSTANCE_COLUMNS
        ))
        .bind(instance.id)
        .bind(instance.book_id)
        .bind(&instance.imprint)
        .bind(instance.status.kind().code())
        .bind(instance.status.borrower())
        .bind(instance.status.due_back())
        .bind(instance.version)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_fk_violation(e, "book or borrower"))?;

        row.try_into()
    }

    async fn update_instance(&self, instance: &BookInstance) -> AppResult<BookInstance> {
        let row = sqlx::query_as::<_, BookInstanceRow>(&format!(
            r#"
            UPDATE book_instances
            SET book_id = $2, imprint = $3, status = $4, borrower_id = $5, due_back = $6,
                version = version + 1
            WHERE id = $1 AND version = $7
            RETURNING {}
            "#,
            INSTANCE_COLUMNS
        ))
        .bind(instance.id)
        .bind(instance.book_id)
        .bind(&instance.imprint)
        .bind(instance.status.kind().code())
        .bind(instance.status.borrower())
        .bind(instance.status.due_back())
        .bind(instance.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_fk_violation(e, "book or borrower"))?;

        match row {
            Some(row) => row.try_into(),
            None => {
                // Either the copy is gone or someone else wrote it first
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM book_instances WHERE id = $1)")
                        .bind(instance.id)
                        .fetch_one(&self.pool)
                        .await?;
                if exists {
                    Err(AppError::Conflict(format!(
                        "Book instance {} was modified concurrently, reload and retry",
                        instance.id
                    )))
                } else {
                    Err(not_found("Book instance", instance.id))
                }
            }
        }
    }

    async fn delete_instance(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM book_instances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Book instance", id));
        }
        Ok(())
    }

    async fn count_instances(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_instances")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_instances_with_status(&self, status: LoanStatusKind) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_instances WHERE status = $1")
            .bind(status.code())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_loans_for_user(
        &self,
        borrower: UserId,
        page: PageRequest,
    ) -> AppResult<(Vec<TitledInstance>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_instances WHERE status = 'o' AND borrower_id = $1",
        )
        .bind(borrower)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, TitledInstanceRow>(
            r#"
            SELECT i.id, i.book_id, i.imprint, i.status, i.borrower_id, i.due_back, i.version,
                   b.title AS book_title
            FROM book_instances i
            LEFT JOIN books b ON b.id = i.book_id
            WHERE i.status = 'o' AND i.borrower_id = $1
            ORDER BY i.due_back ASC, i.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(borrower)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((into_titled(rows)?, total))
    }

    async fn list_active_loans(&self, page: PageRequest) -> AppResult<(Vec<TitledInstance>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_instances WHERE status = 'o'")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, TitledInstanceRow>(
            r#"
            SELECT i.id, i.book_id, i.imprint, i.status, i.borrower_id, i.due_back, i.version,
                   b.title AS book_title
            FROM book_instances i
            LEFT JOIN books b ON b.id = i.book_id
            WHERE i.status = 'o'
            ORDER BY i.id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((into_titled(rows)?, total))
    }
}
