//! Repository layer: the catalog store port and its adapters.
//!
//! Services only see [`CatalogStore`]. [`postgres::PgStore`] is the
//! production adapter, [`memory::MemoryStore`] keeps everything in process
//! and backs the test suite.
//!
//! Lookups of a single record return [`AppError::NotFound`](crate::error::AppError)
//! when it is absent. Instance writes are compare-and-set on
//! [`BookInstance::version`]: a stale version yields `Conflict`.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        author::AuthorInput,
        book::BookInput,
        book_instance::{LoanStatusKind, TitledInstance},
        user::NewUser,
        Author, Book, BookInstance, Genre, Language, PageRequest, User, UserId,
    },
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait GenreStore: Send + Sync {
    /// All genres, by name
    async fn list_genres(&self) -> AppResult<Vec<Genre>>;
    async fn get_genre(&self, id: i32) -> AppResult<Genre>;
    async fn create_genre(&self, name: &str) -> AppResult<Genre>;
    async fn update_genre(&self, id: i32, name: &str) -> AppResult<Genre>;
    /// Also removes the genre from every book
    async fn delete_genre(&self, id: i32) -> AppResult<()>;
    async fn count_genres(&self) -> AppResult<i64>;
}

#[async_trait]
pub trait LanguageStore: Send + Sync {
    /// All languages, by name
    async fn list_languages(&self) -> AppResult<Vec<Language>>;
    async fn get_language(&self, id: i32) -> AppResult<Language>;
    async fn create_language(&self, name: &str) -> AppResult<Language>;
    async fn update_language(&self, id: i32, name: &str) -> AppResult<Language>;
    /// Books written in it lose their language
    async fn delete_language(&self, id: i32) -> AppResult<()>;
}

#[async_trait]
pub trait AuthorStore: Send + Sync {
    /// One page of authors by id, plus the total count
    async fn list_authors(&self, page: PageRequest) -> AppResult<(Vec<Author>, i64)>;
    async fn get_author(&self, id: i32) -> AppResult<Author>;
    async fn create_author(&self, input: &AuthorInput) -> AppResult<Author>;
    async fn update_author(&self, id: i32, input: &AuthorInput) -> AppResult<Author>;
    /// Books by this author keep existing without an author
    async fn delete_author(&self, id: i32) -> AppResult<()>;
    async fn count_authors(&self) -> AppResult<i64>;
}

#[async_trait]
pub trait BookStore: Send + Sync {
    /// One page of books by id, optionally filtered on a case-insensitive
    /// title substring, plus the filtered total
    async fn list_books(&self, page: PageRequest, title: Option<&str>) -> AppResult<(Vec<Book>, i64)>;
    /// Books by one author, by id
    async fn list_books_by_author(&self, author_id: i32) -> AppResult<Vec<Book>>;
    async fn get_book(&self, id: i32) -> AppResult<Book>;
    async fn create_book(&self, input: &BookInput) -> AppResult<Book>;
    async fn update_book(&self, id: i32, input: &BookInput) -> AppResult<Book>;
    /// Copies of the book stay, detached from it
    async fn delete_book(&self, id: i32) -> AppResult<()>;
    async fn count_books(&self) -> AppResult<i64>;
}

#[async_trait]
pub trait InstanceStore: Send + Sync {
    async fn get_instance(&self, id: Uuid) -> AppResult<BookInstance>;
    /// Copies of a book, due date ascending with undated copies first
    async fn list_instances_for_book(&self, book_id: i32) -> AppResult<Vec<BookInstance>>;
    async fn insert_instance(&self, instance: &BookInstance) -> AppResult<BookInstance>;
    /// Write `instance` if its version is still current; returns the stored
    /// copy with the bumped version
    async fn update_instance(&self, instance: &BookInstance) -> AppResult<BookInstance>;
    async fn delete_instance(&self, id: Uuid) -> AppResult<()>;
    async fn count_instances(&self) -> AppResult<i64>;
    async fn count_instances_with_status(&self, status: LoanStatusKind) -> AppResult<i64>;
    /// Copies on loan to `borrower`, due date ascending
    async fn list_loans_for_user(
        &self,
        borrower: UserId,
        page: PageRequest,
    ) -> AppResult<(Vec<TitledInstance>, i64)>;
    /// Every copy on loan, by id
    async fn list_active_loans(&self, page: PageRequest) -> AppResult<(Vec<TitledInstance>, i64)>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: UserId) -> AppResult<User>;
    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    /// `Conflict` when the username is taken
    async fn create_user(&self, user: &NewUser) -> AppResult<User>;
}

/// Everything the services need from persistence
#[async_trait]
pub trait CatalogStore:
    GenreStore + LanguageStore + AuthorStore + BookStore + InstanceStore + UserStore
{
    /// Cheap round-trip used by the readiness probe
    async fn ping(&self) -> AppResult<()>;
}

pub type SharedStore = Arc<dyn CatalogStore>;
