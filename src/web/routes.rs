use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Json;
use axum::Router;
use serde_json::json;

use super::error::ApiError;
use super::pagination::{ListParams, PageResponse};
use super::AppState;
use crate::analysis;
use crate::crawler::{self, CrawlReport, FieldError};
use crate::db::{
    count_comments_by_episode, delete_analysis_result, delete_summaries, get_episode, get_series,
    list_comments_by_episode, list_episodes_by_series, list_series, NewSeries, COMMENT_COLUMNS,
    EPISODE_COLUMNS, SERIES_COLUMNS,
};

type ApiResult = Result<Response, ApiError>;

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/series", get(series_list).post(series_create))
        .route("/api/series/:id", get(series_detail))
        .route("/api/series/:id/episodes", get(episode_list))
        .route("/api/series/:id/episodes/crawl", post(episode_crawl))
        .route("/api/episodes/:id", get(episode_detail))
        .route("/api/episodes/:id/comments", get(comment_list))
        .route("/api/episodes/:id/comments/count", get(comment_count))
        .route("/api/episodes/:id/comments/crawl", post(comment_crawl))
        .route(
            "/api/emotion-analysis/:episode_id",
            get(emotion_list).patch(emotion_run),
        )
        .route(
            "/api/emotion-analysis/comments/:comment_id",
            delete(emotion_delete),
        )
        .route(
            "/api/summary-analysis/:episode_id",
            get(summary_list).post(summary_create).delete(summary_clear),
        )
}

async fn health() -> &'static str {
    "OK"
}

/// 200 when skipped, 207 when anything was rejected, 201 otherwise.
fn crawl_response(report: CrawlReport) -> Response {
    let status = if report.skipped {
        StatusCode::OK
    } else if report.rejected.is_empty() {
        StatusCode::CREATED
    } else {
        StatusCode::MULTI_STATUS
    };
    (status, Json(report)).into_response()
}

// ========== Series ==========

async fn series_list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<ListParams>,
) -> ApiResult {
    let query = params.to_query(SERIES_COLUMNS, state.config.api_page_size)?;
    let page = list_series(state.db.pool(), &query)
        .await
        .map_err(|e| ApiError::internal("Failed to list series", &e))?;

    Ok(Json(PageResponse::build(uri.path(), &query, page)).into_response())
}

fn validate_new_series(series: &NewSeries) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if series.id <= 0 {
        errors.push(FieldError::new("id", "must be a positive integer"));
    }
    if series.title.trim().is_empty() {
        errors.push(FieldError::new("title", "must not be blank"));
    }
    if series.owner.trim().is_empty() {
        errors.push(FieldError::new("owner", "must not be blank"));
    }
    errors
}

async fn series_create(State(state): State<AppState>, Json(body): Json<NewSeries>) -> ApiResult {
    let errors = validate_new_series(&body);
    if !errors.is_empty() {
        return Err(ApiError::validation("Invalid series").with_detail(json!(errors)));
    }

    let creation = crawler::create_series(&state.db, &body).await?;
    let status = if creation.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(creation)).into_response())
}

async fn series_detail(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    match get_series(state.db.pool(), id).await {
        Ok(Some(series)) => Ok(Json(series).into_response()),
        Ok(None) => Err(ApiError::not_found(format!("series {id} not found"))),
        Err(e) => Err(ApiError::internal("Failed to fetch series", &e)),
    }
}

// ========== Episodes ==========

async fn episode_list(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<ListParams>,
) -> ApiResult {
    let query = params.to_query(EPISODE_COLUMNS, state.config.api_page_size)?;
    match get_series(state.db.pool(), id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(ApiError::not_found(format!("series {id} not found"))),
        Err(e) => return Err(ApiError::internal("Failed to fetch series", &e)),
    }

    let page = list_episodes_by_series(state.db.pool(), id, &query)
        .await
        .map_err(|e| ApiError::internal("Failed to list episodes", &e))?;

    Ok(Json(PageResponse::build(uri.path(), &query, page)).into_response())
}

async fn episode_crawl(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    let report =
        crawler::crawl_episodes(&state.db, &state.graphql, &state.collector, id).await?;
    Ok(crawl_response(report))
}

async fn episode_detail(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    match get_episode(state.db.pool(), id).await {
        Ok(Some(episode)) => Ok(Json(episode).into_response()),
        Ok(None) => Err(ApiError::not_found(format!("episode {id} not found"))),
        Err(e) => Err(ApiError::internal("Failed to fetch episode", &e)),
    }
}

// ========== Comments ==========

async fn require_episode(state: &AppState, id: i64) -> Result<(), ApiError> {
    match get_episode(state.db.pool(), id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(ApiError::not_found(format!("episode {id} not found"))),
        Err(e) => Err(ApiError::internal("Failed to fetch episode", &e)),
    }
}

async fn comment_list(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<ListParams>,
) -> ApiResult {
    let query = params.to_query(COMMENT_COLUMNS, state.config.api_page_size)?;
    require_episode(&state, id).await?;

    let page = list_comments_by_episode(state.db.pool(), id, &query)
        .await
        .map_err(|e| ApiError::internal("Failed to list comments", &e))?;

    Ok(Json(PageResponse::build(uri.path(), &query, page)).into_response())
}

async fn comment_count(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    require_episode(&state, id).await?;
    let count = count_comments_by_episode(state.db.pool(), id)
        .await
        .map_err(|e| ApiError::internal("Failed to count comments", &e))?;

    Ok(Json(json!({ "episode_id": id, "count": count })).into_response())
}

async fn comment_crawl(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult {
    let report =
        crawler::crawl_comments(&state.db, &state.graphql, &state.collector, id).await?;
    Ok(crawl_response(report))
}

// ========== Analysis ==========

async fn emotion_run(State(state): State<AppState>, Path(episode_id): Path<i64>) -> ApiResult {
    let run = analysis::analyze_emotions(&state.db, state.analyzer.as_ref(), episode_id).await?;
    Ok(Json(run).into_response())
}

async fn emotion_list(State(state): State<AppState>, Path(episode_id): Path<i64>) -> ApiResult {
    let results = analysis::emotion_results(&state.db, episode_id).await?;
    Ok(Json(results).into_response())
}

async fn emotion_delete(State(state): State<AppState>, Path(comment_id): Path<i64>) -> ApiResult {
    match delete_analysis_result(state.db.pool(), comment_id).await {
        Ok(true) => Ok(StatusCode::NO_CONTENT.into_response()),
        Ok(false) => Err(ApiError::not_found(format!(
            "no analysis result for comment {comment_id}"
        ))),
        Err(e) => Err(ApiError::internal("Failed to delete analysis result", &e)),
    }
}

async fn summary_create(State(state): State<AppState>, Path(episode_id): Path<i64>) -> ApiResult {
    let summary =
        analysis::summarize_episode(&state.db, state.analyzer.as_ref(), episode_id).await?;
    Ok((StatusCode::CREATED, Json(summary)).into_response())
}

async fn summary_list(State(state): State<AppState>, Path(episode_id): Path<i64>) -> ApiResult {
    let summaries = analysis::summaries(&state.db, episode_id).await?;
    Ok(Json(summaries).into_response())
}

async fn summary_clear(State(state): State<AppState>, Path(episode_id): Path<i64>) -> ApiResult {
    match delete_summaries(state.db.pool(), episode_id).await {
        Ok(0) => Err(ApiError::not_found(format!(
            "no summaries found for episode {episode_id}"
        ))),
        Ok(_) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => Err(ApiError::internal("Failed to delete summaries", &e)),
    }
}
