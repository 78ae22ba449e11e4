//! Data models for the library catalog

pub mod author;
pub mod book;
pub mod book_instance;
pub mod genre;
pub mod language;
pub mod pagination;
pub mod user;

// Re-export commonly used types
pub use author::{Author, AuthorDetails};
pub use book::{Book, BookDetails};
pub use book_instance::{BookInstance, LoanStatus, LoanStatusKind, LoanedCopy, PublicCopy};
pub use genre::Genre;
pub use language::Language;
pub use pagination::{Page, PageRequest};
pub use user::{Actor, Permission, User, UserId};
