use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

use crate::error::Result;
use crate::reports;
use crate::settings::{load_settings, Settings};

fn default_path(settings: &Settings, name: &str) -> PathBuf {
    PathBuf::from(&settings.data_dir).join("exports").join(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(feature = "pdf")]
pub fn pdf(id: i64, theme: Option<String>, output: Option<String>) -> Result<()> {
    use crate::pdf::{pdf_filename, render_invoice, Theme};

    let settings = load_settings();
    let theme: Theme = theme.as_deref().unwrap_or(&settings.default_theme).parse()?;
    let conn = super::open_db(&settings)?;
    let doc = reports::invoice_document(&conn, id)?;
    let bytes = render_invoice(&doc, theme)?;

    let path = output
        .map(PathBuf::from)
        .unwrap_or_else(|| default_path(&settings, &pdf_filename(&doc.invoice.invoice_no)));
    ensure_parent(&path)?;
    std::fs::write(&path, bytes)?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Write the sales register for `[from, to]` as CSV, one row per invoice.
pub fn register(from: Option<NaiveDate>, to: Option<NaiveDate>, output: Option<String>) -> Result<()> {
    let settings = load_settings();
    let conn = super::open_db(&settings)?;
    let rows = reports::register(&conn, from, to)?;

    let path = output.map(PathBuf::from).unwrap_or_else(|| {
        let date = Local::now().format("%Y-%m-%d");
        default_path(&settings, &format!("register-{date}.csv"))
    });
    ensure_parent(&path)?;
    write_register(&path, &rows)?;
    println!("Wrote {} ({} invoices)", path.display(), rows.len());
    Ok(())
}

fn write_register(path: &Path, rows: &[reports::RegisterRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
