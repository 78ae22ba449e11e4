//! API handlers for the library catalog REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod catalog;
pub mod genres;
pub mod health;
pub mod instances;
pub mod languages;
pub mod loans;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::AppError,
    models::user::{Actor, UserClaims},
    AppState,
};

/// Extractor for the authenticated actor from a JWT bearer token
pub struct AuthenticatedUser(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims.into()))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication and accounts
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/users", post(auth::create_user))
        // Catalog
        .route("/catalog/summary", get(catalog::summary))
        .route("/genres", get(genres::list_genres).post(genres::create_genre))
        .route("/genres/:id", put(genres::update_genre).delete(genres::delete_genre))
        .route("/languages", get(languages::list_languages).post(languages::create_language))
        .route(
            "/languages/:id",
            put(languages::update_language).delete(languages::delete_language),
        )
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book).put(books::update_book).delete(books::delete_book),
        )
        .route("/books/:id/instances", post(instances::create_instance))
        // Copies and their loan lifecycle
        .route(
            "/instances/:id",
            get(instances::get_instance)
                .put(instances::update_instance)
                .delete(instances::delete_instance),
        )
        .route("/instances/:id/status", put(instances::set_status))
        .route("/instances/:id/checkout", post(loans::checkout))
        .route("/instances/:id/renew", get(loans::renewal_proposal).post(loans::renew))
        .route("/instances/:id/return", post(loans::mark_returned))
        // Loan listings
        .route("/loans/mine", get(loans::my_loans))
        .route("/loans", get(loans::all_loans))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
