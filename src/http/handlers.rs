//! Consumer endpoint handlers.
//!
//! Handlers never surface upstream failures: the services already turned
//! them into fallback values. Only malformed requests produce error statuses.

use std::num::ParseIntError;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use futures_util::future::join_all;
use serde::Deserialize;

use crate::resilience::CommandSnapshot;
use crate::service::{ConsumerServices, User};

#[derive(Debug, Deserialize)]
pub struct IdsQuery {
    #[serde(default)]
    pub ids: String,
}

/// Parse `1,2,3`; blank segments are skipped.
pub fn parse_ids(raw: &str) -> Result<Vec<i64>, ParseIntError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

fn bad_ids(raw: &str, e: ParseIntError) -> (StatusCode, String) {
    tracing::debug!(ids = %raw, error = %e, "Rejecting malformed ids");
    (StatusCode::BAD_REQUEST, format!("invalid ids '{}': {}", raw, e))
}

pub async fn hello(State(services): State<ConsumerServices>) -> String {
    services.hello.hello().await
}

pub async fn get_user(
    State(services): State<ConsumerServices>,
    Path(id): Path<i64>,
) -> Json<User> {
    Json(services.users.get_user_by_id(id).await)
}

pub async fn get_user_async(
    State(services): State<ConsumerServices>,
    Path(id): Path<i64>,
) -> Json<User> {
    let pending = services.users.get_user_by_id_async(id);
    Json(pending.await)
}

pub async fn get_user_collapsed(
    State(services): State<ConsumerServices>,
    Path(id): Path<i64>,
) -> Json<User> {
    Json(services.users.find(id).await)
}

pub async fn find_all(
    State(services): State<ConsumerServices>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<Vec<User>>, (StatusCode, String)> {
    let ids = parse_ids(&query.ids).map_err(|e| bad_ids(&query.ids, e))?;
    Ok(Json(services.users.find_all(&ids).await))
}

/// Issue one collapsed lookup per id at once, so they share a window.
pub async fn find_collapsed(
    State(services): State<ConsumerServices>,
    Query(query): Query<IdsQuery>,
) -> Result<Json<Vec<User>>, (StatusCode, String)> {
    let ids = parse_ids(&query.ids).map_err(|e| bad_ids(&query.ids, e))?;
    let users = join_all(ids.into_iter().map(|id| services.users.find(id))).await;
    Ok(Json(users))
}

pub async fn circuits(State(services): State<ConsumerServices>) -> Json<Vec<CommandSnapshot>> {
    Json(services.registry.snapshot())
}
