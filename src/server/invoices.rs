use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use super::error::ApiResult;
use super::AppState;
use crate::invoices::{self as repo, InvoiceDetails, InvoiceFilter, SavedInvoice};
use crate::models::{InvoicePayload, InvoiceSummary};

#[derive(Debug, Serialize)]
pub struct SavedResponse {
    message: &'static str,
    #[serde(flatten)]
    saved: SavedInvoice,
}

pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<InvoiceFilter>, QueryRejection>,
) -> ApiResult<Json<Vec<InvoiceSummary>>> {
    let Query(filter) = query?;
    let invoices = state.with_conn(move |conn, _| repo::list(conn, &filter)).await?;
    Ok(Json(invoices))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<InvoiceDetails>> {
    Ok(Json(state.with_conn(move |conn, _| repo::get_details(conn, id)).await?))
}

pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<InvoicePayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SavedResponse>)> {
    let Json(payload) = payload?;
    let saved = state
        .with_conn(move |conn, policy| repo::create(conn, policy, &payload))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SavedResponse {
            message: "Invoice created successfully",
            saved,
        }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<InvoicePayload>, JsonRejection>,
) -> ApiResult<Json<SavedResponse>> {
    let Json(payload) = payload?;
    let saved = state
        .with_conn(move |conn, policy| repo::update(conn, policy, id, &payload))
        .await?;
    Ok(Json(SavedResponse {
        message: "Invoice updated successfully",
        saved,
    }))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    state.with_conn(move |conn, _| repo::delete(conn, id)).await?;
    Ok(Json(json!({ "message": "Invoice deleted successfully" })))
}

#[cfg(feature = "pdf")]
#[derive(Debug, serde::Deserialize)]
pub struct PdfQuery {
    theme: Option<String>,
}

/// Render invoice `id` as a PDF, inline. `?theme=` overrides the configured default.
#[cfg(feature = "pdf")]
pub async fn pdf(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    query: Result<Query<PdfQuery>, QueryRejection>,
) -> ApiResult<axum::response::Response> {
    use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
    use axum::response::IntoResponse;

    use crate::pdf::{pdf_filename, render_invoice, Theme};
    use crate::reports::invoice_document;

    let Query(q) = query?;
    let theme: Theme = q.theme.as_deref().unwrap_or(state.default_theme()).parse()?;
    let (invoice_no, bytes) = state
        .with_conn(move |conn, _| {
            let doc = invoice_document(conn, id)?;
            let bytes = render_invoice(&doc, theme)?;
            Ok((doc.invoice.invoice_no, bytes))
        })
        .await?;

    let headers = [
        (CONTENT_TYPE, "application/pdf".to_string()),
        (
            CONTENT_DISPOSITION,
            format!("inline; filename={}", pdf_filename(&invoice_no)),
        ),
    ];
    Ok((headers, bytes).into_response())
}
