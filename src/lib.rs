//! Library catalog server
//!
//! Tracks books, authors, genres, languages and physical copies, and runs
//! the loan lifecycle of those copies (checkout, renewal, return) behind a
//! REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    /// Decides what "today" is for due dates and overdue flags
    pub clock: Arc<dyn services::clock::Clock>,
}
