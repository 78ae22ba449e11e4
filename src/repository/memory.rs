//! In-process catalog store.
//!
//! Mirrors the relational rules of the Postgres schema (referential
//! integrity, `ON DELETE SET NULL`, ordering) so services behave the same
//! on both adapters.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::AuthorInput,
        book::BookInput,
        book_instance::{LoanStatusKind, TitledInstance},
        user::NewUser,
        Author, Book, BookInstance, Genre, Language, PageRequest, User, UserId,
    },
};

use super::{AuthorStore, BookStore, CatalogStore, GenreStore, InstanceStore, LanguageStore, UserStore};

#[derive(Default)]
struct Tables {
    genres: BTreeMap<i32, Genre>,
    languages: BTreeMap<i32, Language>,
    authors: BTreeMap<i32, Author>,
    books: BTreeMap<i32, Book>,
    instances: HashMap<Uuid, BookInstance>,
    users: BTreeMap<i32, User>,
    last_id: HashMap<&'static str, i32>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i32 {
        let id = self.last_id.entry(table).or_insert(0);
        *id += 1;
        *id
    }

    fn check_book_refs(&self, input: &BookInput) -> AppResult<()> {
        if let Some(author_id) = input.author_id {
            if !self.authors.contains_key(&author_id) {
                return Err(not_found("Author", author_id));
            }
        }
        if let Some(language_id) = input.language_id {
            if !self.languages.contains_key(&language_id) {
                return Err(not_found("Language", language_id));
            }
        }
        if let Some(missing) = input.genre_ids.iter().find(|id| !self.genres.contains_key(*id)) {
            return Err(not_found("Genre", missing));
        }
        Ok(())
    }

    fn titled(&self, instance: &BookInstance) -> TitledInstance {
        TitledInstance {
            instance: instance.clone(),
            book_title: instance
                .book_id
                .and_then(|id| self.books.get(&id))
                .map(|b| b.title.clone()),
        }
    }
}

fn not_found(entity: &str, id: impl std::fmt::Display) -> AppError {
    AppError::NotFound(format!("{} with id {} not found", entity, id))
}

fn window<T: Clone>(rows: &[T], page: PageRequest) -> Vec<T> {
    rows.iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .cloned()
        .collect()
}

/// Catalog store held in memory behind a single lock
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GenreStore for MemoryStore {
    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let tables = self.tables.read().await;
        let mut genres: Vec<Genre> = tables.genres.values().cloned().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(genres)
    }

    async fn get_genre(&self, id: i32) -> AppResult<Genre> {
        let tables = self.tables.read().await;
        tables.genres.get(&id).cloned().ok_or_else(|| not_found("Genre", id))
    }

    async fn create_genre(&self, name: &str) -> AppResult<Genre> {
        let mut tables = self.tables.write().await;
        let genre = Genre {
            id: tables.next_id("genres"),
            name: name.to_string(),
        };
        tables.genres.insert(genre.id, genre.clone());
        Ok(genre)
    }

    async fn update_genre(&self, id: i32, name: &str) -> AppResult<Genre> {
        let mut tables = self.tables.write().await;
        let genre = tables.genres.get_mut(&id).ok_or_else(|| not_found("Genre", id))?;
        genre.name = name.to_string();
        Ok(genre.clone())
    }

    async fn delete_genre(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.genres.remove(&id).ok_or_else(|| not_found("Genre", id))?;
        for book in tables.books.values_mut() {
            book.genre_ids.retain(|g| *g != id);
        }
        Ok(())
    }

    async fn count_genres(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.genres.len() as i64)
    }
}

#[async_trait]
impl LanguageStore for MemoryStore {
    async fn list_languages(&self) -> AppResult<Vec<Language>> {
        let tables = self.tables.read().await;
        let mut languages: Vec<Language> = tables.languages.values().cloned().collect();
        languages.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(languages)
    }

    async fn get_language(&self, id: i32) -> AppResult<Language> {
        let tables = self.tables.read().await;
        tables.languages.get(&id).cloned().ok_or_else(|| not_found("Language", id))
    }

    async fn create_language(&self, name: &str) -> AppResult<Language> {
        let mut tables = self.tables.write().await;
        let language = Language {
            id: tables.next_id("languages"),
            name: name.to_string(),
        };
        tables.languages.insert(language.id, language.clone());
        Ok(language)
    }

    async fn update_language(&self, id: i32, name: &str) -> AppResult<Language> {
        let mut tables = self.tables.write().await;
        let language = tables.languages.get_mut(&id).ok_or_else(|| not_found("Language", id))?;
        language.name = name.to_string();
        Ok(language.clone())
    }

    async fn delete_language(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.languages.remove(&id).ok_or_else(|| not_found("Language", id))?;
        for book in tables.books.values_mut() {
            if book.language_id == Some(id) {
                book.language_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AuthorStore for MemoryStore {
    async fn list_authors(&self, page: PageRequest) -> AppResult<(Vec<Author>, i64)> {
        let tables = self.tables.read().await;
        let all: Vec<Author> = tables.authors.values().cloned().collect();
        Ok((window(&all, page), all.len() as i64))
    }

    async fn get_author(&self, id: i32) -> AppResult<Author> {
        let tables = self.tables.read().await;
        tables.authors.get(&id).cloned().ok_or_else(|| not_found("Author", id))
    }

    async fn create_author(&self, input: &AuthorInput) -> AppResult<Author> {
        let mut tables = self.tables.write().await;
        let author = Author {
            id: tables.next_id("authors"),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            date_of_birth: input.date_of_birth,
            date_of_death: input.date_of_death,
        };
        tables.authors.insert(author.id, author.clone());
        Ok(author)
    }

    async fn update_author(&self, id: i32, input: &AuthorInput) -> AppResult<Author> {
        let mut tables = self.tables.write().await;
        let author = tables.authors.get_mut(&id).ok_or_else(|| not_found("Author", id))?;
        author.first_name = input.first_name.clone();
        author.last_name = input.last_name.clone();
        author.date_of_birth = input.date_of_birth;
        author.date_of_death = input.date_of_death;
        Ok(author.clone())
    }

    async fn delete_author(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.authors.remove(&id).ok_or_else(|| not_found("Author", id))?;
        for book in tables.books.values_mut() {
            if book.author_id == Some(id) {
                book.author_id = None;
            }
        }
        Ok(())
    }

    async fn count_authors(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.authors.len() as i64)
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list_books(&self, page: PageRequest, title: Option<&str>) -> AppResult<(Vec<Book>, i64)> {
        let tables = self.tables.read().await;
        let needle = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        let matching: Vec<Book> = tables
            .books
            .values()
            .filter(|b| match &needle {
                Some(n) => b.title.to_lowercase().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        Ok((window(&matching, page), matching.len() as i64))
    }

    async fn list_books_by_author(&self, author_id: i32) -> AppResult<Vec<Book>> {
        let tables = self.tables.read().await;
        Ok(tables
            .books
            .values()
            .filter(|b| b.author_id == Some(author_id))
            .cloned()
            .collect())
    }

    async fn get_book(&self, id: i32) -> AppResult<Book> {
        let tables = self.tables.read().await;
        tables.books.get(&id).cloned().ok_or_else(|| not_found("Book", id))
    }

    async fn create_book(&self, input: &BookInput) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        tables.check_book_refs(input)?;
        let book = Book {
            id: tables.next_id("books"),
            title: input.title.clone(),
            summary: input.summary.clone(),
            isbn: input.isbn.clone(),
            author_id: input.author_id,
            language_id: input.language_id,
            genre_ids: input.normalized_genre_ids(),
        };
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update_book(&self, id: i32, input: &BookInput) -> AppResult<Book> {
        let mut tables = self.tables.write().await;
        tables.check_book_refs(input)?;
        let book = tables.books.get_mut(&id).ok_or_else(|| not_found("Book", id))?;
        book.title = input.title.clone();
        book.summary = input.summary.clone();
        book.isbn = input.isbn.clone();
        book.author_id = input.author_id;
        book.language_id = input.language_id;
        book.genre_ids = input.normalized_genre_ids();
        Ok(book.clone())
    }

    async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables.books.remove(&id).ok_or_else(|| not_found("Book", id))?;
        for instance in tables.instances.values_mut() {
            if instance.book_id == Some(id) {
                instance.book_id = None;
                instance.version += 1;
            }
        }
        Ok(())
    }

    async fn count_books(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.books.len() as i64)
    }
}

#[async_trait]
impl InstanceStore for MemoryStore {
    async fn get_instance(&self, id: Uuid) -> AppResult<BookInstance> {
        let tables = self.tables.read().await;
        tables
            .instances
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Book instance", id))
    }

    async fn list_instances_for_book(&self, book_id: i32) -> AppResult<Vec<BookInstance>> {
        let tables = self.tables.read().await;
        let mut instances: Vec<BookInstance> = tables
            .instances
            .values()
            .filter(|i| i.book_id == Some(book_id))
            .cloned()
            .collect();
        // None sorts before Some, matching NULLS FIRST
        instances.sort_by(|a, b| {
            a.status
                .due_back()
                .cmp(&b.status.due_back())
                .then(a.id.cmp(&b.id))
        });
        Ok(instances)
    }

    async fn insert_instance(&self, instance: &BookInstance) -> AppResult<BookInstance> {
        let mut tables = self.tables.write().await;
        if let Some(book_id) = instance.book_id {
            if !tables.books.contains_key(&book_id) {
                return Err(not_found("Book", book_id));
            }
        }
        if let Some(borrower) = instance.status.borrower() {
            if !tables.users.contains_key(&borrower) {
                return Err(not_found("User", borrower));
            }
        }
        if tables.instances.contains_key(&instance.id) {
            return Err(AppError::Conflict(format!("Book instance {} already exists", instance.id)));
        }
        tables.instances.insert(instance.id, instance.clone());
        Ok(instance.clone())
    }

    async fn update_instance(&self, instance: &BookInstance) -> AppResult<BookInstance> {
        let mut tables = self.tables.write().await;
        if let Some(book_id) = instance.book_id {
            if !tables.books.contains_key(&book_id) {
                return Err(not_found("Book", book_id));
            }
        }
        if let Some(borrower) = instance.status.borrower() {
            if !tables.users.contains_key(&borrower) {
                return Err(not_found("User", borrower));
            }
        }
        let stored = tables
            .instances
            .get_mut(&instance.id)
            .ok_or_else(|| not_found("Book instance", instance.id))?;
        if stored.version != instance.version {
            return Err(AppError::Conflict(format!(
                "Book instance {} was modified concurrently",
                instance.id
            )));
        }
        *stored = BookInstance {
            version: instance.version + 1,
            ..instance.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_instance(&self, id: Uuid) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        tables
            .instances
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Book instance", id))
    }

    async fn count_instances(&self) -> AppResult<i64> {
        Ok(self.tables.read().await.instances.len() as i64)
    }

    async fn count_instances_with_status(&self, status: LoanStatusKind) -> AppResult<i64> {
        let tables = self.tables.read().await;
        Ok(tables
            .instances
            .values()
            .filter(|i| i.status.kind() == status)
            .count() as i64)
    }

    async fn list_loans_for_user(
        &self,
        borrower: UserId,
        page: PageRequest,
    ) -> AppResult<(Vec<TitledInstance>, i64)> {
        let tables = self.tables.read().await;
        let mut loans: Vec<&BookInstance> = tables
            .instances
            .values()
            .filter(|i| i.status.borrower() == Some(borrower))
            .collect();
        loans.sort_by(|a, b| {
            a.status
                .due_back()
                .cmp(&b.status.due_back())
                .then(a.id.cmp(&b.id))
        });
        let rows: Vec<TitledInstance> = loans.into_iter().map(|i| tables.titled(i)).collect();
        Ok((window(&rows, page), rows.len() as i64))
    }

    async fn list_active_loans(&self, page: PageRequest) -> AppResult<(Vec<TitledInstance>, i64)> {
        let tables = self.tables.read().await;
        let mut loans: Vec<&BookInstance> = tables
            .instances
            .values()
            .filter(|i| i.status.kind() == LoanStatusKind::OnLoan)
            .collect();
        loans.sort_by_key(|i| i.id);
        let rows: Vec<TitledInstance> = loans.into_iter().map(|i| tables.titled(i)).collect();
        Ok((window(&rows, page), rows.len() as i64))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, id: UserId) -> AppResult<User> {
        let tables = self.tables.read().await;
        tables.users.get(&id).cloned().ok_or_else(|| not_found("User", id))
    }

    async fn find_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "Username {} already exists",
                user.username
            )));
        }
        let created = User {
            id: tables.next_id("users"),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            permissions: user.permissions.clone(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoanStatus;
    use chrono::NaiveDate;

    fn book_input(title: &str, author_id: Option<i32>) -> BookInput {
        BookInput {
            title: title.to_string(),
            summary: String::new(),
            isbn: "9780000000001".to_string(),
            author_id,
            language_id: None,
            genre_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_deleting_author_keeps_books() {
        let store = MemoryStore::new();
        let author = store
            .create_author(&AuthorInput {
                first_name: "John".to_string(),
                last_name: "Smith".to_string(),
                date_of_birth: None,
                date_of_death: None,
            })
            .await
            .unwrap();
        let book = store.create_book(&book_input("Title", Some(author.id))).await.unwrap();

        store.delete_author(author.id).await.unwrap();

        let book = store.get_book(book.id).await.unwrap();
        assert_eq!(book.author_id, None);
    }

    #[tokio::test]
    async fn test_book_refs_must_exist() {
        let store = MemoryStore::new();
        let err = store.create_book(&book_input("Title", Some(42))).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deleting_genre_detaches_books() {
        let store = MemoryStore::new();
        let fantasy = store.create_genre("Fantasy").await.unwrap();
        let poetry = store.create_genre("Poetry").await.unwrap();
        let mut input = book_input("Title", None);
        input.genre_ids = vec![poetry.id, fantasy.id];
        let book = store.create_book(&input).await.unwrap();
        assert_eq!(book.genre_ids, vec![fantasy.id, poetry.id]);

        store.delete_genre(fantasy.id).await.unwrap();
        assert_eq!(store.get_book(book.id).await.unwrap().genre_ids, vec![poetry.id]);
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let store = MemoryStore::new();
        let instance = store
            .insert_instance(&BookInstance::new(None, "Imprint".to_string()))
            .await
            .unwrap();

        let mut first = instance.clone();
        first.status = LoanStatus::Available;
        let stored = store.update_instance(&first).await.unwrap();
        assert_eq!(stored.version, 1);

        let mut second = instance;
        second.status = LoanStatus::Reserved;
        assert!(matches!(
            store.update_instance(&second).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_book_order_and_title_filter() {
        let store = MemoryStore::new();
        for title in ["Madagascar", "Dune", "madagascar 2", "Emma"] {
            store.create_book(&book_input(title, None)).await.unwrap();
        }
        let page = PageRequest::new(Some(1), 3).unwrap();
        let (books, total) = store.list_books(page, None).await.unwrap();
        assert_eq!(total, 4);
        assert_eq!(
            books.iter().map(|b| b.title.as_str()).collect::<Vec<_>>(),
            vec!["Madagascar", "Dune", "madagascar 2"]
        );

        let (books, total) = store.list_books(page, Some("MADAGASCAR")).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(books.len(), 2);
    }

    #[tokio::test]
    async fn test_undated_copies_sort_first() {
        let store = MemoryStore::new();
        let user = store
            .create_user(&NewUser {
                username: "reader".to_string(),
                password_hash: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                permissions: Vec::new(),
            })
            .await
            .unwrap();
        let book = store.create_book(&book_input("Title", None)).await.unwrap();

        let mut on_loan = BookInstance::new(Some(book.id), "a".to_string());
        on_loan.status = LoanStatus::OnLoan {
            borrower: user.id,
            due_back: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        store.insert_instance(&on_loan).await.unwrap();
        let shelved = store
            .insert_instance(&BookInstance::new(Some(book.id), "b".to_string()))
            .await
            .unwrap();

        let copies = store.list_instances_for_book(book.id).await.unwrap();
        assert_eq!(copies[0].id, shelved.id);
        assert_eq!(copies[1].id, on_loan.id);
    }
}
