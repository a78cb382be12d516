use std::net::SocketAddr;

use crate::error::{InvoicerError, Result};
use crate::server::{self, AppState};
use crate::settings::load_settings;

pub fn run(bind: Option<String>) -> Result<()> {
    let settings = load_settings();
    // Fail before binding if the database is missing.
    drop(super::open_db(&settings)?);

    let addr: SocketAddr = bind
        .as_deref()
        .unwrap_or(&settings.bind_addr)
        .parse()
        .map_err(|e| InvoicerError::Settings(format!("invalid bind address: {e}")))?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime
        .block_on(server::serve(AppState::from_settings(&settings), addr))
        .map_err(|e| InvoicerError::Other(format!("{e:#}")))
}
