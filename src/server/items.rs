use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::error::ApiResult;
use super::AppState;
use crate::items as repo;
use crate::models::{Item, NewItem};

#[derive(Debug, Deserialize)]
pub struct ItemQuery {
    search: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ItemQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Item>>> {
    let Query(q) = query?;
    let items = state
        .with_conn(move |conn, _| repo::search(conn, q.search.as_deref()))
        .await?;
    Ok(Json(items))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Item>> {
    Ok(Json(state.with_conn(move |conn, _| repo::get(conn, id)).await?))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewItem>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    let Json(new) = payload?;
    let item = state.with_conn(move |conn, _| repo::create(conn, &new)).await?;
    Ok((StatusCode::CREATED, Json(item)))
}
