//! Page requests and paginated responses

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};

use super::{author::Author, book::Book, book_instance::LoanedCopy};

/// Authors per page
pub const AUTHORS_PER_PAGE: u32 = 10;
/// Books per page
pub const BOOKS_PER_PAGE: u32 = 3;
/// Loans per page, for both the per-user and the all-loans listings
pub const LOANS_PER_PAGE: u32 = 10;

/// `?page=` query parameter
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page number (default: 1)
    pub page: Option<u32>,
}

/// A 1-based page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: u32) -> AppResult<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(AppError::Validation("Page numbers start at 1".to_string()));
        }
        Ok(Self { page, per_page })
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated response wrapper
#[derive(Debug, Serialize, ToSchema)]
#[aliases(AuthorPage = Page<Author>, BookPage = Page<Book>, LoanPage = Page<LoanedCopy>)]
pub struct Page<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Entries on this page
    pub items: Vec<T>,
    /// Total number of entries
    pub total: i64,
    /// Current page number
    pub page: u32,
    /// Entries per page
    pub per_page: u32,
    pub num_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Wrap one fetched window. Asking past the last page is a not-found,
    /// except for the first page of an empty collection.
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> AppResult<Self> {
        let per_page = request.per_page.max(1) as i64;
        let num_pages = ((total + per_page - 1) / per_page).max(1) as u32;

        if request.page > num_pages {
            return Err(AppError::NotFound(format!(
                "Page {} is past the last page ({})",
                request.page, num_pages
            )));
        }

        Ok(Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            num_pages,
            has_next: request.page < num_pages,
            has_previous: request.page > 1,
        })
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        U: for<'a> ToSchema<'a>,
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            num_pages: self.num_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}
