//! HTTP API.
//!
//! Each request opens its own SQLite connection on the blocking pool; the
//! write paths rely on IMMEDIATE transactions for number allocation, so
//! concurrent requests serialise inside SQLite rather than in the process.

mod catalog;
mod customers;
pub mod error;
mod invoices;
mod items;
mod reports;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, put},
    Json, Router,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db;
use crate::error::{InvoicerError, Result};
use crate::settings::Settings;
use crate::tax::TaxPolicy;
use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    db_path: Arc<PathBuf>,
    policy: Arc<TaxPolicy>,
    default_theme: Arc<str>,
}

impl AppState {
    pub fn new(db_path: PathBuf, policy: TaxPolicy, default_theme: &str) -> Self {
        Self {
            db_path: Arc::new(db_path),
            policy: Arc::new(policy),
            default_theme: Arc::from(default_theme),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.db_path(),
            settings.tax_policy(),
            &settings.default_theme,
        )
    }

    pub fn default_theme(&self) -> &str {
        &self.default_theme
    }

    /// Run `f` against a fresh connection on the blocking pool.
    pub async fn with_conn<T, F>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&mut Connection, &TaxPolicy) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = Arc::clone(&self.db_path);
        let policy = Arc::clone(&self.policy);
        let outcome = tokio::task::spawn_blocking(move || {
            let mut conn = db::get_connection(&path)?;
            f(&mut conn, &policy)
        })
        .await
        .map_err(|e| ApiError(InvoicerError::Other(format!("blocking task failed: {e}"))))?;
        outcome.map_err(ApiError::from)
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn api_routes() -> Router<AppState> {
    let router = Router::new()
        .route(
            "/customers",
            get(customers::list).post(customers::create),
        )
        .route(
            "/customers/{id}",
            get(customers::get)
                .put(customers::update)
                .delete(customers::delete),
        )
        .route("/items", get(items::list).post(items::create))
        .route("/items/{id}", get(items::get))
        .route("/units", get(catalog::units))
        .route(
            "/invoice_prefixes",
            get(catalog::list_prefixes).post(catalog::create_prefix),
        )
        .route("/invoice_prefixes/{id}/default", put(catalog::make_default))
        .route("/latest_invoice_number", get(catalog::latest_invoice_number))
        .route("/invoices", get(invoices::list).post(invoices::create))
        .route(
            "/invoices/{id}",
            get(invoices::get)
                .put(invoices::update)
                .delete(invoices::delete),
        )
        .route("/sales_data", get(reports::sales_data))
        .route(
            "/financial_year_summary",
            get(reports::financial_year_summary),
        );

    #[cfg(feature = "pdf")]
    let router = router.route("/invoices/{id}/pdf", get(invoices::pdf));

    router
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, db = %state.db_path.display(), "listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
