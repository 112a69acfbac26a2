use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;

use crate::api::health::{health, HealthState};
use crate::config::{MAX_MARKET_ID_LEN, MAX_TITLE_QUERY_LEN};
use crate::db::RecordStore;
use crate::error::AppError;
use crate::types::{MarketRecord, Selection};
use crate::upstream::Upstream;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn RecordStore>,
    pub upstream: Arc<dyn Upstream>,
    pub health: Arc<HealthState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/tutorials", get(list_records))
        .route("/api/tutorials/", get(list_records))
        .route("/api/tutorials/:market_id", get(market_detail))
        .route("/api/tutorials/:market_id/", get(market_detail))
        .route("/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub title: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// All stored records, or those whose title contains `?title=` (case-insensitive).
async fn list_records(
    State(state): State<ApiState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<Vec<MarketRecord>>, AppError> {
    let title = params.title.as_deref().filter(|t| !t.is_empty());
    if let Some(t) = title {
        if t.chars().count() > MAX_TITLE_QUERY_LEN {
            return Err(AppError::Validation(format!(
                "title must be at most {MAX_TITLE_QUERY_LEN} characters"
            )));
        }
    }

    let records = state.store.list(title).await.map_err(|e| {
        warn!("Listing records failed: {e}");
        e
    })?;
    Ok(Json(records))
}

/// Proxy the upstream diamond payload for one market as `[{mid, sid, nat}]`.
async fn market_detail(
    State(state): State<ApiState>,
    Path(market_id): Path<String>,
) -> Result<Json<Vec<Selection>>, AppError> {
    validate_market_id(&market_id)?;

    let selections = state
        .upstream
        .fetch_match_detail(&market_id)
        .await
        .map_err(|e| {
            warn!(market_id = %market_id, "Match detail failed: {e}");
            e
        })?;
    Ok(Json(selections))
}

/// Non-empty, bounded, and limited to characters safe in an upstream path segment.
fn validate_market_id(id: &str) -> Result<(), AppError> {
    if id.is_empty() || id.len() > MAX_MARKET_ID_LEN {
        return Err(AppError::Validation(format!(
            "marketId must be 1 to {MAX_MARKET_ID_LEN} characters"
        )));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err(AppError::Validation(
            "marketId may only contain letters, digits, '.', '-' and '_'".to_string(),
        ));
    }
    Ok(())
}
