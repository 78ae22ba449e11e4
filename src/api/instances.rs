//! Book instance (copy) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book_instance::{BookInstanceInput, SetStatusRequest, VersionQuery},
        BookInstance, PublicCopy,
    },
};

use super::AuthenticatedUser;

/// Add a copy of a book; it starts in maintenance
#[utoipa::path(
    post,
    path = "/books/{id}/instances",
    tag = "instances",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BookInstanceInput,
    responses(
        (status = 201, description = "Copy created", body = BookInstance),
        (status = 403, description = "Missing add_bookinstance permission", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_instance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(book_id): Path<i32>,
    Json(input): Json<BookInstanceInput>,
) -> AppResult<(StatusCode, Json<BookInstance>)> {
    let instance = state
        .services
        .catalog
        .create_instance(&actor, book_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

#[utoipa::path(
    get,
    path = "/instances/{id}",
    tag = "instances",
    params(("id" = Uuid, Path, description = "Copy ID")),
    responses(
        (status = 200, description = "Copy, without its borrower", body = PublicCopy),
        (status = 404, description = "Copy not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_instance(
    State(state): State<crate::AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublicCopy>> {
    let instance = state.services.catalog.get_instance(id).await?;
    Ok(Json(instance))
}

/// Edit imprint or owning book. Status is not touched here.
#[utoipa::path(
    put,
    path = "/instances/{id}",
    tag = "instances",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Copy ID"), VersionQuery),
    request_body = BookInstanceInput,
    responses(
        (status = 200, description = "Copy updated", body = BookInstance),
        (status = 404, description = "Copy or book not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Stale version", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_instance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(version): Query<VersionQuery>,
    Json(input): Json<BookInstanceInput>,
) -> AppResult<Json<BookInstance>> {
    let instance = state
        .services
        .catalog
        .update_instance(&actor, id, input, version.version)
        .await?;
    Ok(Json(instance))
}

#[utoipa::path(
    delete,
    path = "/instances/{id}",
    tag = "instances",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Copy ID")),
    responses(
        (status = 204, description = "Copy deleted"),
        (status = 404, description = "Copy not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_instance(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_instance(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Move a copy to maintenance, available or reserved
#[utoipa::path(
    put,
    path = "/instances/{id}/status",
    tag = "instances",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Copy ID")),
    request_body = SetStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = BookInstance),
        (status = 400, description = "On loan requested, use checkout", body = crate::error::ErrorResponse),
        (status = 409, description = "Transition not allowed or stale version", body = crate::error::ErrorResponse)
    )
)]
pub async fn set_status(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> AppResult<Json<BookInstance>> {
    let instance = state
        .services
        .loans
        .set_status(&actor, id, request.status, request.version)
        .await?;
    Ok(Json(instance))
}
