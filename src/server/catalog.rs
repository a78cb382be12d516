use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::error::ApiResult;
use super::AppState;
use crate::catalog as repo;
use crate::error::InvoicerError;
use crate::models::{InvoicePrefix, NewPrefix};
use crate::sequence;

pub async fn units(State(state): State<AppState>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.with_conn(|conn, _| repo::list_units(conn)).await?))
}

pub async fn list_prefixes(State(state): State<AppState>) -> ApiResult<Json<Vec<InvoicePrefix>>> {
    Ok(Json(state.with_conn(|conn, _| repo::list_prefixes(conn)).await?))
}

pub async fn create_prefix(
    State(state): State<AppState>,
    payload: Result<Json<NewPrefix>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<InvoicePrefix>)> {
    let Json(new) = payload?;
    new.validate().map_err(InvoicerError::from)?;
    let prefix = state
        .with_conn(move |conn, _| repo::register_prefix(conn, &new))
        .await?;
    Ok((StatusCode::CREATED, Json(prefix)))
}

pub async fn make_default(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<InvoicePrefix>> {
    let prefix = state
        .with_conn(move |conn, _| repo::set_default_prefix(conn, id))
        .await?;
    Ok(Json(prefix))
}

#[derive(Debug, Deserialize)]
pub struct NextNumberQuery {
    prefix: Option<String>,
}

/// `{"next_number": "0042"}`: the padded suffix the next invoice under
/// `prefix` would get. Nothing is reserved.
pub async fn latest_invoice_number(
    State(state): State<AppState>,
    query: Result<Query<NextNumberQuery>, QueryRejection>,
) -> ApiResult<Json<Value>> {
    let Query(q) = query?;
    let prefix = q
        .prefix
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| InvoicerError::InvalidPrefix("Prefix is required".into()))?;
    let next = state
        .with_conn(move |conn, _| sequence::peek_next_suffix(conn, &prefix))
        .await?;
    Ok(Json(json!({ "next_number": next })))
}
