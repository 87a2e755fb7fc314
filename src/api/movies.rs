use axum::{
    Json,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use std::sync::Arc;

use super::extract::JsonBody;
use super::types::{ApiResponse, ListMoviesParams, MovieData, MovieListData};
use super::{ApiError, AppState};
use crate::models::filters::Filters;
use crate::models::id::Id;
use crate::models::movie::{MOVIE_SORT_SAFELIST, MovieInput, MovieQuery};
use crate::models::validator::Validator;

const DEFAULT_PAGE_SIZE: u64 = 10;

/// Ids that do not decode cannot exist, so they are reported as missing
/// rather than malformed.
fn parse_id(raw: &str) -> Result<i32, ApiError> {
    raw.parse::<Id>()
        .map(|Id(id)| id)
        .map_err(|_| ApiError::NotFound)
}

fn read_int(v: &mut Validator, key: &str, raw: Option<&str>, default: u64) -> u64 {
    match raw.filter(|s| !s.is_empty()) {
        None => default,
        Some(s) => s.parse().unwrap_or_else(|_| {
            v.add_error(key, "must be an integer value");
            default
        }),
    }
}

fn read_csv(raw: Option<&str>) -> Vec<String> {
    raw.filter(|s| !s.is_empty())
        .map(|s| s.split(',').map(ToString::to_string).collect())
        .unwrap_or_default()
}

/// GET /v1/movies
pub async fn list_movies(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListMoviesParams>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut v = Validator::new();
    let filters = Filters {
        page: read_int(&mut v, "page", params.page.as_deref(), 1),
        page_size: read_int(
            &mut v,
            "page_size",
            params.page_size.as_deref(),
            DEFAULT_PAGE_SIZE,
        ),
        sort: params
            .sort
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "id".to_string()),
        sort_safelist: MOVIE_SORT_SAFELIST,
    };
    filters.validate(&mut v);
    v.finish().map_err(ApiError::FailedValidation)?;

    let query = MovieQuery {
        title: params.title.unwrap_or_default(),
        genres: read_csv(params.genres.as_deref()),
        filters,
    };

    let (movies, metadata) = state.movies().list(query).await?;
    Ok(Json(ApiResponse::success(MovieListData { metadata, movies })))
}

/// POST /v1/movies
pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    JsonBody(input): JsonBody<MovieInput>,
) -> Result<impl IntoResponse, ApiError> {
    let movie = state.movies().create(input).await?;
    let location = format!("/v1/movies/{}", Id(movie.id));

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ApiResponse::success(MovieData { movie })),
    ))
}

/// GET /v1/movies/{id}
pub async fn show_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let movie = state.movies().get(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::success(MovieData { movie })))
}

/// PATCH /v1/movies/{id}
///
/// An optional `X-Expected-Version` header pins the update to the version
/// the client last saw.
pub async fn update_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(patch): JsonBody<MovieInput>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let expected_version = match headers.get("X-Expected-Version") {
        None => None,
        Some(value) => Some(
            value
                .to_str()
                .ok()
                .and_then(|s| s.trim().parse::<i32>().ok())
                .ok_or_else(|| {
                    ApiError::BadRequest("X-Expected-Version must be an integer".to_string())
                })?,
        ),
    };

    let movie = state.movies().update(id, patch, expected_version).await?;
    Ok(Json(ApiResponse::success(MovieData { movie })))
}

/// DELETE /v1/movies/{id}
pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.movies().delete(parse_id(&id)?).await?;
    Ok(Json(ApiResponse::message("movie successfully deleted")))
}
