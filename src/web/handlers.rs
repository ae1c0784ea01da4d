//! HTTP request handlers

use super::state::AppState;
use crate::cache::CacheStats;
use crate::feedback::{FeedbackError, NewFeedback};
use crate::library::{FavoriteSort, LibraryError, LibraryImport, NewFavorite, NewPost, NewVisit};
use crate::metrics::MetricsSnapshot;
use crate::places::LookupError;
use crate::results::{sort_shops, FailedLookup, GeoPoint, ShopRecord, SortKey, Timing, SOUP_TYPES};
use crate::search::{shop_records, SearchError, SearchQuery};
use crate::summary::{ReviewSummary, SummaryError, Summarizer};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Error body for every failing API call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidOrigin { .. } => Self::BadRequest(e.to_string()),
            SearchError::Lookup(LookupError::NotFound(id)) => {
                Self::NotFound(format!("place not found: {}", id))
            }
            SearchError::NoKeywords => {
                error!("Search is misconfigured: {}", e);
                Self::Upstream(e.to_string())
            }
            other => {
                warn!("Search failed: {}", other);
                Self::Upstream(other.to_string())
            }
        }
    }
}

impl From<SummaryError> for ApiError {
    fn from(e: SummaryError) -> Self {
        warn!("Summarizer failed: {}", e);
        Self::Upstream(e.to_string())
    }
}

impl From<LibraryError> for ApiError {
    fn from(e: LibraryError) -> Self {
        match e {
            LibraryError::MissingField(_) => Self::BadRequest(e.to_string()),
            LibraryError::NotFavorite(_) | LibraryError::PostNotFound(_) => {
                Self::NotFound(e.to_string())
            }
        }
    }
}

impl From<FeedbackError> for ApiError {
    fn from(e: FeedbackError) -> Self {
        match e {
            FeedbackError::NotStored => Self::Internal(e.to_string()),
            _ => Self::BadRequest(e.to_string()),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Query parameters for search
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub lat: f64,
    pub lng: f64,
    /// Free-text term
    pub q: Option<String>,
    /// distance | rating
    pub sort: Option<String>,
    /// Only shops reported open
    #[serde(default)]
    pub open_now: bool,
    /// Soup style the name, address or categories must mention
    pub soup: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub number_of_results: usize,
    pub from_cache: bool,
    pub results: Vec<ShopRecord>,
    pub failed_lookups: Vec<FailedLookup>,
    pub timings: Vec<Timing>,
}

/// Health check handler
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION
    }))
}

/// Search handler
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let sort = match params.sort.as_deref() {
        Some(s) => s.parse::<SortKey>().map_err(ApiError::BadRequest)?,
        None => SortKey::default(),
    };
    let query = SearchQuery::new(GeoPoint::new(params.lat, params.lng))
        .with_query(params.q.unwrap_or_default());

    let outcome = state.search.execute(&query).await?;
    let flags = state.library.flag_index().await;

    let mut results = shop_records(&outcome, query.origin, &flags);
    if params.open_now {
        results.retain(|shop| shop.open_now == Some(true));
    }
    if let Some(soup) = params.soup.as_deref() {
        results.retain(|shop| shop.mentions(soup));
    }
    sort_shops(&mut results, sort);

    Ok(Json(SearchResponse {
        query: query.query,
        number_of_results: results.len(),
        from_cache: outcome.from_cache,
        results,
        failed_lookups: outcome.failed_lookups,
        timings: outcome.timings,
    }))
}

pub async fn soup_types() -> impl IntoResponse {
    Json(SOUP_TYPES)
}

pub async fn place_details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.search.details(&id).await?))
}

pub async fn place_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReviewSummary>> {
    let details = state.search.details(&id).await?;
    let summary = state
        .summarizer
        .review_summary(&id, &details.review_text())
        .await?;
    Ok(Json(summary))
}

pub async fn place_tags(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let details = state.search.details(&id).await?;
    let tags = state
        .summarizer
        .feature_tags(&id, &details.review_text())
        .await?;
    Ok(Json(json!({ "tags": tags })))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub instance_name: String,
    pub version: &'static str,
    pub metrics: MetricsSnapshot,
}

pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        instance_name: state.instance_name().to_string(),
        version: crate::VERSION,
        metrics: state.metrics.snapshot(),
    })
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub places: CacheStats,
    pub summaries: CacheStats,
}

pub async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(CacheStatsResponse {
        places: state.places_cache().stats().await,
        summaries: state.summary_cache().stats().await,
    })
}

/// Drop cached search results, details and summaries
pub async fn clear_cache(State(state): State<AppState>) -> StatusCode {
    state.places_cache().clear_all().await;
    state.summary_cache().clear_all().await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct FavoritesParams {
    pub sort: Option<String>,
}

pub async fn list_favorites(
    State(state): State<AppState>,
    Query(params): Query<FavoritesParams>,
) -> ApiResult<impl IntoResponse> {
    let sort = match params.sort.as_deref() {
        Some(s) => s.parse::<FavoriteSort>().map_err(ApiError::BadRequest)?,
        None => FavoriteSort::default(),
    };
    Ok(Json(state.library.favorites_sorted(sort).await))
}

pub async fn add_favorite(
    State(state): State<AppState>,
    Json(shop): Json<NewFavorite>,
) -> ApiResult<impl IntoResponse> {
    if shop.place_id.trim().is_empty() {
        return Err(ApiError::BadRequest("place_id is required".to_string()));
    }
    let favorite = state.library.add_favorite(shop).await;
    Ok((StatusCode::CREATED, Json(favorite)))
}

/// Notes and tags edits; absent fields are left alone
#[derive(Debug, Deserialize)]
pub struct FavoriteUpdate {
    pub personal_notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub async fn update_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<FavoriteUpdate>,
) -> ApiResult<StatusCode> {
    if let Some(notes) = update.personal_notes {
        state.library.update_notes(&id, notes).await?;
    }
    if let Some(tags) = update.tags {
        state.library.update_tags(&id, tags).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.library.remove_favorite(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(LibraryError::NotFavorite(id).into())
    }
}

pub async fn list_bookmarks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.library.bookmarks().await)
}

pub async fn toggle_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let bookmarked = state.library.toggle_bookmark(&id).await;
    Json(json!({ "place_id": id, "bookmarked": bookmarked }))
}

#[derive(Debug, Deserialize)]
pub struct VisitsParams {
    pub place_id: Option<String>,
}

pub async fn list_visits(
    State(state): State<AppState>,
    Query(params): Query<VisitsParams>,
) -> impl IntoResponse {
    let visits = match params.place_id {
        Some(id) => state.library.shop_visits(&id).await,
        None => state.library.visit_history().await,
    };
    Json(visits)
}

pub async fn add_visit(
    State(state): State<AppState>,
    Json(visit): Json<NewVisit>,
) -> ApiResult<impl IntoResponse> {
    if visit.place_id.trim().is_empty() {
        return Err(ApiError::BadRequest("place_id is required".to_string()));
    }
    let record = state.library.add_visit(visit).await;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
pub struct PostsParams {
    pub place_id: Option<String>,
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(params): Query<PostsParams>,
) -> impl IntoResponse {
    let posts = match params.place_id {
        Some(id) => state.library.shop_posts(&id).await,
        None => state.library.posts().await,
    };
    Json(posts)
}

pub async fn add_post(
    State(state): State<AppState>,
    Json(post): Json<NewPost>,
) -> ApiResult<impl IntoResponse> {
    let record = state.library.add_post(post).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Like toggle; `liked` defaults to true
#[derive(Debug, Deserialize)]
pub struct LikeParams {
    #[serde(default = "default_liked")]
    pub liked: bool,
}

fn default_liked() -> bool {
    true
}

pub async fn like_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<LikeParams>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.library.like_post(&id, params.liked).await?))
}

pub async fn remove_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.library.remove_post(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(LibraryError::PostNotFound(id).into())
    }
}

pub async fn submit_feedback(
    State(state): State<AppState>,
    Json(feedback): Json<NewFeedback>,
) -> ApiResult<impl IntoResponse> {
    let record = state.feedback.submit(feedback).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Feedback received", "id": record.id })),
    ))
}

pub async fn list_feedback(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.feedback.list().await)
}

pub async fn export_library(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.library.export().await)
}

pub async fn import_library(
    State(state): State<AppState>,
    Json(data): Json<LibraryImport>,
) -> StatusCode {
    state.library.import(data).await;
    StatusCode::NO_CONTENT
}
