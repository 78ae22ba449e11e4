//! Loan endpoints: checkout, renewal, return and loan listings

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book_instance::{CheckoutRequest, RenewRequest, RenewalProposal, VersionQuery},
        pagination::{LoanPage, PageQuery},
        BookInstance, LoanedCopy, Page,
    },
};

use super::AuthenticatedUser;

/// Lend a copy to a user
#[utoipa::path(
    post,
    path = "/instances/{id}/checkout",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Copy ID")),
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Copy on loan", body = BookInstance),
        (status = 400, description = "Due date outside the allowed window", body = crate::error::ErrorResponse),
        (status = 403, description = "Missing can_mark_returned permission", body = crate::error::ErrorResponse),
        (status = 404, description = "Copy or borrower not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Copy cannot be lent from its status, or stale version", body = crate::error::ErrorResponse)
    )
)]
pub async fn checkout(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Json<BookInstance>> {
    let today = state.clock.today();
    let instance = state
        .services
        .loans
        .mark_on_loan(&actor, id, request.borrower, request.due_back, request.version, today)
        .await?;
    Ok(Json(instance))
}

/// Renewal form data: the current loan and the proposed new due date
#[utoipa::path(
    get,
    path = "/instances/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Copy ID")),
    responses(
        (status = 200, description = "Proposed renewal", body = RenewalProposal),
        (status = 409, description = "Copy not on loan", body = crate::error::ErrorResponse)
    )
)]
pub async fn renewal_proposal(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RenewalProposal>> {
    let today = state.clock.today();
    let proposal = state.services.loans.renewal_proposal(&actor, id, today).await?;
    Ok(Json(proposal))
}

/// Set a new due date on a running loan
#[utoipa::path(
    post,
    path = "/instances/{id}/renew",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Copy ID")),
    request_body = RenewRequest,
    responses(
        (status = 200, description = "Loan renewed", body = BookInstance),
        (status = 400, description = "Date in the past or more than 3 weeks ahead", body = crate::error::ErrorResponse),
        (status = 409, description = "Copy not on loan, or stale version", body = crate::error::ErrorResponse)
    )
)]
pub async fn renew(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<RenewRequest>,
) -> AppResult<Json<BookInstance>> {
    let today = state.clock.today();
    let instance = state
        .services
        .loans
        .renew(&actor, id, request.due_back, request.version, today)
        .await?;
    Ok(Json(instance))
}

/// Take a copy back
#[utoipa::path(
    post,
    path = "/instances/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Copy ID"), VersionQuery),
    responses(
        (status = 200, description = "Copy available again", body = BookInstance),
        (status = 409, description = "Copy not on loan, or stale version", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_returned(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(version): Query<VersionQuery>,
) -> AppResult<Json<BookInstance>> {
    let instance = state
        .services
        .loans
        .mark_returned(&actor, id, version.version)
        .await?;
    Ok(Json(instance))
}

/// Copies the current user has borrowed, soonest due first
#[utoipa::path(
    get,
    path = "/loans/mine",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Borrowed copies", body = LoanPage),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn my_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<LoanedCopy>>> {
    let today = state.clock.today();
    let page = state
        .services
        .catalog
        .list_loans_for_user(actor.user_id, query.page, today)
        .await?;
    Ok(Json(page))
}

/// Every copy on loan, by copy id
#[utoipa::path(
    get,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "All active loans", body = LoanPage),
        (status = 403, description = "Missing can_mark_returned permission", body = crate::error::ErrorResponse)
    )
)]
pub async fn all_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Page<LoanedCopy>>> {
    let today = state.clock.today();
    let page = state
        .services
        .catalog
        .list_all_active_loans(&actor, query.page, today)
        .await?;
    Ok(Json(page))
}
