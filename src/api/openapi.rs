//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, authors, books, catalog, genres, health, instances, languages, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Catalog API",
        version = "1.0.0",
        description = "Books, copies and loans REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        auth::create_user,
        // Catalog
        catalog::summary,
        genres::list_genres,
        genres::create_genre,
        genres::update_genre,
        genres::delete_genre,
        languages::list_languages,
        languages::create_language,
        languages::update_language,
        languages::delete_language,
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Copies
        instances::create_instance,
        instances::get_instance,
        instances::update_instance,
        instances::delete_instance,
        instances::set_status,
        // Loans
        loans::checkout,
        loans::renewal_proposal,
        loans::renew,
        loans::mark_returned,
        loans::my_loans,
        loans::all_loans,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::LoginRequest,
            crate::models::user::LoginResponse,
            crate::models::user::CreateUser,
            crate::models::user::User,
            crate::models::user::Permission,
            // Catalog
            crate::services::catalog::CatalogSummary,
            crate::models::genre::Genre,
            crate::models::genre::GenreInput,
            crate::models::language::Language,
            crate::models::language::LanguageInput,
            crate::models::author::Author,
            crate::models::author::AuthorDetails,
            crate::models::author::AuthorInput,
            crate::models::book::Book,
            crate::models::book::BookDetails,
            crate::models::book::BookInput,
            crate::models::pagination::AuthorPage,
            crate::models::pagination::BookPage,
            crate::models::pagination::LoanPage,
            // Copies and loans
            crate::models::book_instance::BookInstance,
            crate::models::book_instance::PublicCopy,
            crate::models::book_instance::LoanStatus,
            crate::models::book_instance::LoanStatusKind,
            crate::models::book_instance::BookInstanceInput,
            crate::models::book_instance::SetStatusRequest,
            crate::models::book_instance::CheckoutRequest,
            crate::models::book_instance::RenewRequest,
            crate::models::book_instance::RenewalProposal,
            crate::models::book_instance::LoanedCopy,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User accounts"),
        (name = "catalog", description = "Catalog summary"),
        (name = "genres", description = "Genre management"),
        (name = "languages", description = "Language management"),
        (name = "authors", description = "Author browsing and management"),
        (name = "books", description = "Book browsing and management"),
        (name = "instances", description = "Book copies"),
        (name = "loans", description = "Checkout, renewal, return and loan listings")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by secured paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
