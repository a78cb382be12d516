use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment, Table};

use crate::error::Result;
use crate::fmt::money;
use crate::invoices::{self, InvoiceFilter};
use crate::sequence;
use crate::settings::load_settings;

pub fn list(search: Option<String>, from: Option<NaiveDate>, to: Option<NaiveDate>, limit: i64) -> Result<()> {
    let conn = super::open_db(&load_settings())?;
    let rows = invoices::list(
        &conn,
        &InvoiceFilter {
            search,
            start_date: from,
            end_date: to,
            limit: Some(limit),
        },
    )?;

    if rows.is_empty() {
        println!("No invoices found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Invoice No", "Date", "Customer", "Total", "Status"]);
    for row in &rows {
        table.add_row(vec![
            Cell::new(row.id),
            Cell::new(&row.invoice_no),
            Cell::new(row.date),
            Cell::new(&row.customer_name),
            Cell::new(money(row.total_value)).set_alignment(CellAlignment::Right),
            Cell::new(&row.status),
        ]);
    }
    println!("Invoices\n{table}");
    Ok(())
}

pub fn next_number(prefix: &str) -> Result<()> {
    let conn = super::open_db(&load_settings())?;
    println!("{}", sequence::next_invoice_number(&conn, prefix)?);
    Ok(())
}
