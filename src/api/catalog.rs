//! Catalog home page figures

use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::{error::AppResult, services::catalog::CatalogSummary};

/// Per-client visit counter
pub const VISITS_COOKIE: &str = "num_visits";

/// Catalog counts plus how often this client has been here before.
///
/// The counter lives in the `num_visits` cookie: the response reports the
/// value it arrived with and sets the cookie one higher.
#[utoipa::path(
    get,
    path = "/catalog/summary",
    tag = "catalog",
    responses(
        (status = 200, description = "Catalog summary", body = CatalogSummary)
    )
)]
pub async fn summary(
    State(state): State<crate::AppState>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Json<CatalogSummary>)> {
    let visits = jar
        .get(VISITS_COOKIE)
        .and_then(|cookie| cookie.value().parse::<u64>().ok())
        .unwrap_or(0);

    let summary = state.services.catalog.summary(visits).await?;

    let cookie = Cookie::build((VISITS_COOKIE, visits.saturating_add(1).to_string()))
        .path("/")
        .http_only(true);

    Ok((jar.add(cookie), Json(summary)))
}
