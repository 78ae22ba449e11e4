//! Book (catalog entry) model and related types.
//!
//! A book is the catalog-level description; the loanable copies are
//! [`BookInstance`](super::book_instance::BookInstance)s.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{author::Author, book_instance::PublicCopy, genre::Genre, language::Language};

/// Number of genre names shown by [`genre_display`]
const GENRE_DISPLAY_LIMIT: usize = 3;

/// Book model from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub summary: String,
    pub isbn: String,
    pub author_id: Option<i32>,
    pub language_id: Option<i32>,
    /// Genre ids, ascending
    pub genre_ids: Vec<i32>,
}

/// Book with its related records resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub author: Option<Author>,
    pub language: Option<Language>,
    pub genres: Vec<Genre>,
    pub genre_display: String,
    pub instances: Vec<PublicCopy>,
}

/// Comma-separated names of the first three genres
pub fn genre_display(genres: &[Genre]) -> String {
    genres
        .iter()
        .take(GENRE_DISPLAY_LIMIT)
        .map(|g| g.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Create or update book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 1000, message = "Summary must be at most 1000 characters"))]
    pub summary: String,
    #[validate(length(equal = 13, message = "ISBN must be 13 characters"))]
    pub isbn: String,
    pub author_id: Option<i32>,
    pub language_id: Option<i32>,
    #[serde(default)]
    pub genre_ids: Vec<i32>,
}

impl BookInput {
    /// Sorted, duplicate-free genre ids
    pub fn normalized_genre_ids(&self) -> Vec<i32> {
        let mut ids = self.genre_ids.clone();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Book list query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Page number (default: 1)
    pub page: Option<u32>,
    /// Case-insensitive title search
    pub title: Option<String>,
}
