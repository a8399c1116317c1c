//! API Handlers
//!
//! HTTP request handlers. Each one resolves the raw request into a
//! [`ShelterService`] call; no query logic lives here.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use crate::config::Config;
use crate::error::Result;
use crate::models::{
    CountRequest, CountResponse, CreateRequest, CreateResponse, DeleteRequest, DeleteResponse,
    HealthResponse, HistogramRequest, HistogramResponse, InvalidateResponse, PageRequest,
    PageResponse, StatsResponse, TopBreedsRequest, TopBreedsResponse, UpdateRequest,
    UpdateResponse,
};
use crate::pagination::Cursor;
use crate::service::ShelterService;
use crate::store::DocumentStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The process-wide query core
    pub service: Arc<ShelterService>,
}

impl AppState {
    pub fn new(service: Arc<ShelterService>) -> Self {
        Self { service }
    }

    /// Builds the service over `store` from configuration.
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self::new(Arc::new(ShelterService::new(store, config)))
    }
}

/// Handler for POST /animals/page
pub async fn page_handler(
    State(state): State<AppState>,
    Json(req): Json<PageRequest>,
) -> Result<Json<PageResponse>> {
    let cursor = Cursor::from_token(req.cursor.as_deref())?;
    let filters = req.input.resolve();
    let page = state
        .service
        .fetch_page(filters.as_ref(), cursor.as_ref(), req.page_size)
        .await?;

    Ok(Json(PageResponse::from(page)))
}

/// Handler for POST /animals/count
pub async fn count_handler(
    State(state): State<AppState>,
    Json(req): Json<CountRequest>,
) -> Result<Json<CountResponse>> {
    let filters = req.input.resolve();
    let total = state.service.count(filters.as_ref()).await?;
    Ok(Json(CountResponse { total }))
}

/// Handler for POST /metrics/top-breeds
pub async fn top_breeds_handler(
    State(state): State<AppState>,
    Json(req): Json<TopBreedsRequest>,
) -> Result<Json<TopBreedsResponse>> {
    let filters = req.input.resolve();
    let breeds = state.service.top_breeds(filters.as_ref(), req.limit).await?;
    Ok(Json(TopBreedsResponse { breeds }))
}

/// Handler for POST /metrics/age-histogram
pub async fn age_histogram_handler(
    State(state): State<AppState>,
    Json(req): Json<HistogramRequest>,
) -> Result<Json<HistogramResponse>> {
    let filters = req.input.resolve();
    let buckets = state
        .service
        .age_histogram(filters.as_ref(), req.step, req.max_weeks)
        .await?;
    Ok(Json(HistogramResponse { buckets }))
}

/// Handler for POST /animals
pub async fn create_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateRequest>,
) -> Result<(StatusCode, Json<CreateResponse>)> {
    let id = state.service.create(req.document).await?;
    Ok((StatusCode::CREATED, Json(CreateResponse::new(id))))
}

/// Handler for PATCH /animals
pub async fn update_handler(
    State(state): State<AppState>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<UpdateResponse>> {
    let outcome = state.service.update(req.filter, req.changes).await?;
    Ok(Json(UpdateResponse::from(outcome)))
}

/// Handler for DELETE /animals
pub async fn delete_handler(
    State(state): State<AppState>,
    Json(req): Json<DeleteRequest>,
) -> Result<Json<DeleteResponse>> {
    let deleted = state.service.delete(req.filter).await?;
    Ok(Json(DeleteResponse::new(deleted)))
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    let cleared = state.service.invalidate();
    Json(InvalidateResponse { cleared })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.service.cache_stats()))
}

/// Handler for GET /health
///
/// Answers 503 when the store does not respond to its ping.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let reachable = state.service.ping().await.is_ok();
    let status = if reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthResponse::new(reachable)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShelterError;
    use crate::models::FilterInput;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn test_state() -> AppState {
        let docs = (1..=3).map(|i| {
            json!({ "breed": "Beagle", "age_upon_outcome_in_weeks": i * 10 })
                .as_object()
                .cloned()
                .unwrap()
        });
        let store = MemoryStore::from_documents(docs).unwrap();
        AppState::from_config(Arc::new(store), &Config::default())
    }

    #[tokio::test]
    async fn test_page_handler_first_page() {
        let req = PageRequest {
            page_size: Some(2),
            ..Default::default()
        };
        let response = page_handler(State(test_state()), Json(req)).await.unwrap();
        assert_eq!(response.count, 2);
        assert!(response.next_cursor.is_some());
    }

    #[tokio::test]
    async fn test_page_handler_rejects_bad_cursor() {
        let req = PageRequest {
            cursor: Some("%%%".to_string()),
            ..Default::default()
        };
        let result = page_handler(State(test_state()), Json(req)).await;
        assert!(matches!(result, Err(ShelterError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn test_top_breeds_handler() {
        let req = TopBreedsRequest {
            input: FilterInput {
                filters: Some(json!({ "breed": "Beagle" })),
                selection: None,
            },
            limit: None,
        };
        let response = top_breeds_handler(State(test_state()), Json(req)).await.unwrap();
        assert_eq!(response.breeds.len(), 1);
        assert_eq!(response.breeds[0].count, 3);
    }

    #[tokio::test]
    async fn test_invalidate_handler_reports_cleared_entries() {
        let state = test_state();
        top_breeds_handler(State(state.clone()), Json(TopBreedsRequest::default()))
            .await
            .unwrap();

        let response = invalidate_handler(State(state)).await;
        assert_eq!(response.cleared, 1);
    }

    #[tokio::test]
    async fn test_health_handler() {
        let (status, response) = health_handler(State(test_state())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.status, "healthy");
    }
}
