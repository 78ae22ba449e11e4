//! Catalog queries and management

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        author::AuthorInput,
        book::{genre_display, BookInput},
        book_instance::BookInstanceInput,
        genre::GenreInput,
        language::LanguageInput,
        pagination::{AUTHORS_PER_PAGE, BOOKS_PER_PAGE, LOANS_PER_PAGE},
        Actor, Author, AuthorDetails, Book, BookDetails, BookInstance, Genre, Language,
        LoanStatusKind, LoanedCopy, Page, PageRequest, Permission, PublicCopy, UserId,
    },
    repository::{
        AuthorStore, BookStore, GenreStore, InstanceStore, LanguageStore, SharedStore,
    },
};

use super::auth::SharedAuthorizer;

/// Home page figures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CatalogSummary {
    pub num_books: i64,
    pub num_instances: i64,
    pub num_instances_available: i64,
    pub num_authors: i64,
    pub num_genres: i64,
    /// Visits by this client before the current one
    pub num_visits: u64,
}

#[derive(Clone)]
pub struct CatalogService {
    store: SharedStore,
    authorizer: SharedAuthorizer,
}

impl CatalogService {
    pub fn new(store: SharedStore, authorizer: SharedAuthorizer) -> Self {
        Self { store, authorizer }
    }

    // Queries

    pub async fn summary(&self, visits: u64) -> AppResult<CatalogSummary> {
        Ok(CatalogSummary {
            num_books: self.store.count_books().await?,
            num_instances: self.store.count_instances().await?,
            num_instances_available: self
                .store
                .count_instances_with_status(LoanStatusKind::Available)
                .await?,
            num_authors: self.store.count_authors().await?,
            num_genres: self.store.count_genres().await?,
            num_visits: visits,
        })
    }

    pub async fn list_authors(&self, page: Option<u32>) -> AppResult<Page<Author>> {
        let request = PageRequest::new(page, AUTHORS_PER_PAGE)?;
        let (authors, total) = self.store.list_authors(request).await?;
        Page::new(authors, total, request)
    }

    pub async fn list_books(&self, page: Option<u32>, title: Option<&str>) -> AppResult<Page<Book>> {
        let request = PageRequest::new(page, BOOKS_PER_PAGE)?;
        let (books, total) = self.store.list_books(request, title).await?;
        Page::new(books, total, request)
    }

    /// Copies currently lent to `borrower`, soonest due first
    pub async fn list_loans_for_user(
        &self,
        borrower: UserId,
        page: Option<u32>,
        today: NaiveDate,
    ) -> AppResult<Page<LoanedCopy>> {
        let request = PageRequest::new(page, LOANS_PER_PAGE)?;
        let (entries, total) = self.store.list_loans_for_user(borrower, request).await?;
        Ok(Page::new(entries, total, request)?.map(|entry| LoanedCopy::new(entry, today)))
    }

    /// Every running loan, for staff allowed to take copies back
    pub async fn list_all_active_loans(
        &self,
        actor: &Actor,
        page: Option<u32>,
        today: NaiveDate,
    ) -> AppResult<Page<LoanedCopy>> {
        self.authorizer.require(actor, Permission::CanMarkReturned)?;

        let request = PageRequest::new(page, LOANS_PER_PAGE)?;
        let (entries, total) = self.store.list_active_loans(request).await?;
        Ok(Page::new(entries, total, request)?.map(|entry| LoanedCopy::new(entry, today)))
    }

    pub async fn get_author(&self, id: i32) -> AppResult<AuthorDetails> {
        let author = self.store.get_author(id).await?;
        let books = self.store.list_books_by_author(id).await?;
        Ok(AuthorDetails {
            display_name: author.display_name(),
            author,
            books,
        })
    }

    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        let book = self.store.get_book(id).await?;

        let author = match book.author_id {
            Some(author_id) => Some(self.store.get_author(author_id).await?),
            None => None,
        };
        let language = match book.language_id {
            Some(language_id) => Some(self.store.get_language(language_id).await?),
            None => None,
        };

        let mut genres: Vec<Genre> = self
            .store
            .list_genres()
            .await?
            .into_iter()
            .filter(|g| book.genre_ids.contains(&g.id))
            .collect();
        genres.sort_by_key(|g| g.id);

        let instances = self
            .store
            .list_instances_for_book(id)
            .await?
            .into_iter()
            .map(PublicCopy::from)
            .collect();

        Ok(BookDetails {
            genre_display: genre_display(&genres),
            book,
            author,
            language,
            genres,
            instances,
        })
    }

    /// A copy as the public catalog shows it, without its borrower
    pub async fn get_instance(&self, id: Uuid) -> AppResult<PublicCopy> {
        Ok(self.store.get_instance(id).await?.into())
    }

    pub async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        self.store.list_genres().await
    }

    pub async fn list_languages(&self) -> AppResult<Vec<Language>> {
        self.store.list_languages().await
    }

    // Genres

    pub async fn create_genre(&self, actor: &Actor, input: GenreInput) -> AppResult<Genre> {
        self.authorizer.require(actor, Permission::AddGenre)?;
        input.validate()?;
        let genre = self.store.create_genre(input.name.trim()).await?;
        tracing::info!(genre_id = genre.id, by = actor.user_id, "Genre created");
        Ok(genre)
    }

    pub async fn update_genre(&self, actor: &Actor, id: i32, input: GenreInput) -> AppResult<Genre> {
        self.authorizer.require(actor, Permission::ChangeGenre)?;
        input.validate()?;
        self.store.update_genre(id, input.name.trim()).await
    }

    pub async fn delete_genre(&self, actor: &Actor, id: i32) -> AppResult<()> {
        self.authorizer.require(actor, Permission::DeleteGenre)?;
        self.store.delete_genre(id).await?;
        tracing::info!(genre_id = id, by = actor.user_id, "Genre deleted");
        Ok(())
    }

    // Languages

    pub async fn create_language(&self, actor: &Actor, input: LanguageInput) -> AppResult<Language> {
        self.authorizer.require(actor, Permission::AddLanguage)?;
        input.validate()?;
        let language = self.store.create_language(input.name.trim()).await?;
        tracing::info!(language_id = language.id, by = actor.user_id, "Language created");
        Ok(language)
    }

    pub async fn update_language(
        &self,
        actor: &Actor,
        id: i32,
        input: LanguageInput,
    ) -> AppResult<Language> {
        self.authorizer.require(actor, Permission::ChangeLanguage)?;
        input.validate()?;
        self.store.update_language(id, input.name.trim()).await
    }

    pub async fn delete_language(&self, actor: &Actor, id: i32) -> AppResult<()> {
        self.authorizer.require(actor, Permission::DeleteLanguage)?;
        self.store.delete_language(id).await?;
        tracing::info!(language_id = id, by = actor.user_id, "Language deleted");
        Ok(())
    }

    // Authors

    pub async fn create_author(&self, actor: &Actor, input: AuthorInput) -> AppResult<Author> {
        self.authorizer.require(actor, Permission::AddAuthor)?;
        input.validate()?;
        let author = self.store.create_author(&input).await?;
        tracing::info!(author_id = author.id, by = actor.user_id, "Author created");
        Ok(author)
    }

    pub async fn update_author(&self, actor: &Actor, id: i32, input: AuthorInput) -> AppResult<Author> {
        self.authorizer.require(actor, Permission::ChangeAuthor)?;
        input.validate()?;
        self.store.update_author(id, &input).await
    }

    pub async fn delete_author(&self, actor: &Actor, id: i32) -> AppResult<()> {
        self.authorizer.require(actor, Permission::DeleteAuthor)?;
        self.store.delete_author(id).await?;
        tracing::info!(author_id = id, by = actor.user_id, "Author deleted");
        Ok(())
    }

    // Books

    pub async fn create_book(&self, actor: &Actor, input: BookInput) -> AppResult<Book> {
        self.authorizer.require(actor, Permission::AddBook)?;
        input.validate()?;
        let book = self.store.create_book(&input).await?;
        tracing::info!(book_id = book.id, by = actor.user_id, "Book created");
        Ok(book)
    }

    pub async fn update_book(&self, actor: &Actor, id: i32, input: BookInput) -> AppResult<Book> {
        self.authorizer.require(actor, Permission::ChangeBook)?;
        input.validate()?;
        self.store.update_book(id, &input).await
    }

    pub async fn delete_book(&self, actor: &Actor, id: i32) -> AppResult<()> {
        self.authorizer.require(actor, Permission::DeleteBook)?;
        self.store.delete_book(id).await?;
        tracing::info!(book_id = id, by = actor.user_id, "Book deleted");
        Ok(())
    }

    // Book instances

    /// New copies start in maintenance
    pub async fn create_instance(
        &self,
        actor: &Actor,
        book_id: i32,
        input: BookInstanceInput,
    ) -> AppResult<BookInstance> {
        self.authorizer.require(actor, Permission::AddBookinstance)?;
        input.validate()?;
        self.store.get_book(book_id).await?;

        let instance = self
            .store
            .insert_instance(&BookInstance::new(Some(book_id), input.imprint))
            .await?;
        tracing::info!(instance_id = %instance.id, book_id, by = actor.user_id, "Book instance created");
        Ok(instance)
    }

    /// Edit imprint and, when given, the book a copy belongs to.
    /// Status is left alone.
    pub async fn update_instance(
        &self,
        actor: &Actor,
        id: Uuid,
        input: BookInstanceInput,
        expected_version: Option<i32>,
    ) -> AppResult<BookInstance> {
        self.authorizer.require(actor, Permission::ChangeBookinstance)?;
        input.validate()?;

        let mut instance = self.store.get_instance(id).await?;
        if let Some(version) = expected_version {
            instance.version = version;
        }
        if let Some(book_id) = input.book_id {
            self.store.get_book(book_id).await?;
            instance.book_id = Some(book_id);
        }
        instance.imprint = input.imprint;

        self.store.update_instance(&instance).await
    }

    pub async fn delete_instance(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        self.authorizer.require(actor, Permission::DeleteBookinstance)?;
        self.store.delete_instance(id).await?;
        tracing::info!(instance_id = %id, by = actor.user_id, "Book instance deleted");
        Ok(())
    }
}
