//! Store adapter tests.
//!
//! Every check runs against the in-memory store, and against Postgres when
//! a database is available. The Postgres variants need `DATABASE_URL` and
//! run with: cargo test --test store -- --ignored

use chrono::{Duration, NaiveDate};
use sqlx::PgPool;

use library_catalog::{
    error::AppError,
    models::{
        author::AuthorInput,
        book::BookInput,
        user::NewUser,
        BookInstance, LoanStatus, LoanStatusKind, PageRequest, UserId,
    },
    repository::{
        AuthorStore, BookStore, CatalogStore, GenreStore, InstanceStore, MemoryStore, PgStore,
        UserStore,
    },
};

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap() + Duration::days(offset)
}

fn book_input(title: &str, author_id: Option<i32>, genre_ids: Vec<i32>) -> BookInput {
    BookInput {
        title: title.to_string(),
        summary: String::new(),
        isbn: "9780000000001".to_string(),
        author_id,
        language_id: None,
        genre_ids,
    }
}

async fn user(store: &dyn CatalogStore, username: &str) -> UserId {
    store
        .create_user(&NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            permissions: Vec::new(),
        })
        .await
        .unwrap()
        .id
}

async fn lend(store: &dyn CatalogStore, book_id: i32, borrower: UserId, due_back: NaiveDate) -> BookInstance {
    let mut copy = BookInstance::new(Some(book_id), format!("due {}", due_back));
    copy.status = LoanStatus::OnLoan { borrower, due_back };
    store.insert_instance(&copy).await.unwrap()
}

fn first_page() -> PageRequest {
    PageRequest::new(Some(1), 10).unwrap()
}

async fn stale_version_conflicts(store: &dyn CatalogStore) {
    let book = store.create_book(&book_input("Copy", None, Vec::new())).await.unwrap();
    let copy = store
        .insert_instance(&BookInstance::new(Some(book.id), "First".to_string()))
        .await
        .unwrap();
    assert_eq!(copy.version, 0);

    let mut first = copy.clone();
    first.status = LoanStatus::Available;
    let stored = store.update_instance(&first).await.unwrap();
    assert_eq!(stored.version, 1);
    assert_eq!(stored.status, LoanStatus::Available);

    let mut second = copy.clone();
    second.status = LoanStatus::Reserved;
    assert!(matches!(
        store.update_instance(&second).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(store.get_instance(copy.id).await.unwrap().status, LoanStatus::Available);

    let missing = BookInstance::new(Some(book.id), "Missing".to_string());
    assert!(matches!(
        store.update_instance(&missing).await,
        Err(AppError::NotFound(_))
    ));
}

async fn loans_listed_by_due_date(store: &dyn CatalogStore) {
    let reader = user(store, "reader").await;
    let book = store.create_book(&book_input("Loaned", None, Vec::new())).await.unwrap();
    for offset in [5, 3, 1, 4, 2] {
        lend(store, book.id, reader, day(offset)).await;
    }

    let (loans, total) = store.list_loans_for_user(reader, first_page()).await.unwrap();
    assert_eq!(total, 5);
    let due: Vec<_> = loans.iter().map(|l| l.instance.status.due_back()).collect();
    assert_eq!(due, (1..=5).map(|d| Some(day(d))).collect::<Vec<_>>());
    assert!(loans.iter().all(|l| l.book_title.as_deref() == Some("Loaned")));
}

async fn loans_are_disjoint_per_user(store: &dyn CatalogStore) {
    let a = user(store, "alice").await;
    let b = user(store, "bob").await;
    let book = store.create_book(&book_input("Shared", None, Vec::new())).await.unwrap();
    for offset in 0..3 {
        lend(store, book.id, a, day(offset)).await;
    }
    for offset in 0..2 {
        lend(store, book.id, b, day(offset)).await;
    }
    let mut idle = BookInstance::new(Some(book.id), "idle".to_string());
    idle.status = LoanStatus::Available;
    store.insert_instance(&idle).await.unwrap();

    let (of_a, total_a) = store.list_loans_for_user(a, first_page()).await.unwrap();
    let (of_b, total_b) = store.list_loans_for_user(b, first_page()).await.unwrap();
    assert_eq!((total_a, total_b), (3, 2));
    assert!(of_a.iter().all(|l| l.instance.status.borrower() == Some(a)));
    assert!(of_b.iter().all(|l| l.instance.status.borrower() == Some(b)));

    let (all, total) = store.list_active_loans(first_page()).await.unwrap();
    assert_eq!(total, 5);
    let ids: Vec<_> = all.iter().map(|l| l.instance.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    assert_eq!(store.count_instances().await.unwrap(), 6);
    assert_eq!(
        store.count_instances_with_status(LoanStatusKind::OnLoan).await.unwrap(),
        5
    );
}

async fn undated_copies_listed_first(store: &dyn CatalogStore) {
    let reader = user(store, "reader").await;
    let book = store.create_book(&book_input("Mixed", None, Vec::new())).await.unwrap();
    lend(store, book.id, reader, day(3)).await;
    let mut shelved = BookInstance::new(Some(book.id), "shelved".to_string());
    shelved.status = LoanStatus::Available;
    store.insert_instance(&shelved).await.unwrap();

    let copies = store.list_instances_for_book(book.id).await.unwrap();
    assert_eq!(copies.len(), 2);
    assert_eq!(copies[0].status.due_back(), None);
    assert_eq!(copies[1].status.due_back(), Some(day(3)));
}

async fn author_books_listed_by_id(store: &dyn CatalogStore) {
    let author = store
        .create_author(&AuthorInput {
            first_name: "Ursula".to_string(),
            last_name: "Le Guin".to_string(),
            date_of_birth: None,
            date_of_death: None,
        })
        .await
        .unwrap();
    let zebra = store.create_book(&book_input("Zebra", Some(author.id), Vec::new())).await.unwrap();
    let apple = store.create_book(&book_input("Apple", Some(author.id), Vec::new())).await.unwrap();
    store.create_book(&book_input("Other", None, Vec::new())).await.unwrap();

    let books = store.list_books_by_author(author.id).await.unwrap();
    let ids: Vec<_> = books.iter().map(|b| b.id).collect();
    assert_eq!(ids, vec![zebra.id, apple.id]);
}

async fn genres_fold_onto_books(store: &dyn CatalogStore) {
    let poetry = store.create_genre("Poetry").await.unwrap();
    let fantasy = store.create_genre("Fantasy").await.unwrap();
    let book = store
        .create_book(&book_input("Verses", None, vec![fantasy.id, poetry.id, fantasy.id]))
        .await
        .unwrap();
    let mut expected = vec![poetry.id, fantasy.id];
    expected.sort();
    assert_eq!(store.get_book(book.id).await.unwrap().genre_ids, expected);

    store.delete_genre(poetry.id).await.unwrap();
    assert_eq!(store.get_book(book.id).await.unwrap().genre_ids, vec![fantasy.id]);
}

async fn constraint_violations_mapped(store: &dyn CatalogStore) {
    assert!(matches!(
        store.create_book(&book_input("Orphan", Some(9999), Vec::new())).await,
        Err(AppError::NotFound(_))
    ));

    user(store, "taken").await;
    let duplicate = store
        .create_user(&NewUser {
            username: "taken".to_string(),
            password_hash: "hash".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            permissions: Vec::new(),
        })
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let book = store.create_book(&book_input("Lent", None, Vec::new())).await.unwrap();
    let mut copy = BookInstance::new(Some(book.id), "ghost".to_string());
    copy.status = LoanStatus::OnLoan { borrower: 9999, due_back: day(1) };
    assert!(matches!(
        store.insert_instance(&copy).await,
        Err(AppError::NotFound(_))
    ));
}

mod memory {
    use super::*;

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        stale_version_conflicts(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_loans_listed_by_due_date() {
        loans_listed_by_due_date(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_loans_are_disjoint_per_user() {
        loans_are_disjoint_per_user(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_undated_copies_listed_first() {
        undated_copies_listed_first(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_author_books_listed_by_id() {
        author_books_listed_by_id(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_genres_fold_onto_books() {
        genres_fold_onto_books(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_constraint_violations_mapped() {
        constraint_violations_mapped(&MemoryStore::new()).await;
    }
}

mod postgres {
    use super::*;

    #[sqlx::test(migrations = "./migrations")]
    #[ignore] // Requires DATABASE_URL
    async fn test_stale_version_conflicts(pool: PgPool) {
        stale_version_conflicts(&PgStore::new(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn test_loans_listed_by_due_date(pool: PgPool) {
        loans_listed_by_due_date(&PgStore::new(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn test_loans_are_disjoint_per_user(pool: PgPool) {
        loans_are_disjoint_per_user(&PgStore::new(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn test_undated_copies_listed_first(pool: PgPool) {
        undated_copies_listed_first(&PgStore::new(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn test_author_books_listed_by_id(pool: PgPool) {
        author_books_listed_by_id(&PgStore::new(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn test_genres_fold_onto_books(pool: PgPool) {
        genres_fold_onto_books(&PgStore::new(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn test_constraint_violations_mapped(pool: PgPool) {
        constraint_violations_mapped(&PgStore::new(pool)).await;
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn test_loan_fields_must_match_status(pool: PgPool) {
        let store = PgStore::new(pool.clone());
        let book = store.create_book(&book_input("Checked", None, Vec::new())).await.unwrap();
        let result = sqlx::query(
            "INSERT INTO book_instances (id, book_id, imprint, status) VALUES ($1, $2, 'x', 'o')",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(book.id)
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
