use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiResult;
use super::AppState;
use crate::customers::{self as repo, CustomerPage, DEFAULT_PAGE_SIZE};
use crate::models::{Customer, NewCustomer};

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    search: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<CustomerQuery>, QueryRejection>,
) -> ApiResult<Json<CustomerPage>> {
    let Query(q) = query?;
    let page = state
        .with_conn(move |conn, _| {
            repo::list(
                conn,
                q.search.as_deref(),
                q.page.unwrap_or(1),
                q.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            )
        })
        .await?;
    Ok(Json(page))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Customer>> {
    let customer = state.with_conn(move |conn, _| repo::get(conn, id)).await?;
    Ok(Json(customer))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewCustomer>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let Json(new) = payload?;
    let customer = state.with_conn(move |conn, _| repo::create(conn, &new)).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<NewCustomer>, JsonRejection>,
) -> ApiResult<Json<Customer>> {
    let Json(new) = payload?;
    let customer = state
        .with_conn(move |conn, _| repo::update(conn, id, &new))
        .await?;
    Ok(Json(customer))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    state.with_conn(move |conn, _| repo::delete(conn, id)).await?;
    Ok(Json(json!({ "message": "Customer deleted successfully" })))
}
