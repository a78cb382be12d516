//! Invoice persistence.
//!
//! Create and update recompute every tax figure from the submitted lines,
//! check any client-computed figures against that, then write the header,
//! the lines and the number counter in one IMMEDIATE transaction.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::catalog;
use crate::customers;
use crate::db::{conflict_on_unique, from_db, opt_from_db, to_db};
use crate::error::{InvoicerError, Result};
use crate::models::{Customer, Invoice, InvoiceLine, InvoicePayload, InvoiceSummary};
use crate::sequence;
use crate::tax::{InvoiceTotals, LineInput, TaxPolicy};

const DEFAULT_UNIT: &str = "PCS";

const INVOICE_COLUMNS: &str = "id, invoice_no, date, customer_id, sale_type, notes, status, \
                               taxable_value, cgst, sgst, igst, cess, round_off, total_value";

/// Result of a successful create or update.
#[derive(Debug, Serialize)]
pub struct SavedInvoice {
    pub invoice_id: i64,
    pub invoice_no: String,
    pub totals: InvoiceTotals,
}

/// Invoice with its customer and lines, as shown in the editor.
#[derive(Debug, Serialize)]
pub struct InvoiceDetails {
    pub invoice: Invoice,
    pub customer: Customer,
    pub items: Vec<InvoiceLine>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InvoiceFilter {
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

fn row_to_invoice(row: &rusqlite::Row) -> rusqlite::Result<Invoice> {
    Ok(Invoice {
        id: row.get(0)?,
        invoice_no: row.get(1)?,
        date: row.get(2)?,
        customer_id: row.get(3)?,
        sale_type: row.get(4)?,
        notes: row.get(5)?,
        status: row.get(6)?,
        taxable_value: from_db(row.get(7)?),
        cgst: from_db(row.get(8)?),
        sgst: from_db(row.get(9)?),
        igst: from_db(row.get(10)?),
        cess: from_db(row.get(11)?),
        round_off: from_db(row.get(12)?),
        total_value: from_db(row.get(13)?),
    })
}

fn row_to_line(row: &rusqlite::Row) -> rusqlite::Result<InvoiceLine> {
    Ok(InvoiceLine {
        id: row.get(0)?,
        invoice_id: row.get(1)?,
        item_id: row.get(2)?,
        item_name: row.get(3)?,
        default_mrp: opt_from_db(row.get(4)?),
        quantity: row.get(5)?,
        free_quantity: row.get(6)?,
        unit: row.get(7)?,
        price_per_unit: from_db(row.get(8)?),
        discount: from_db(row.get(9)?),
        gst_rate: from_db(row.get(10)?),
        cgst_amount: from_db(row.get(11)?),
        sgst_amount: from_db(row.get(12)?),
        igst_amount: from_db(row.get(13)?),
        cess_amount: from_db(row.get(14)?),
        total_amount: from_db(row.get(15)?),
        hsn_code: row.get(16)?,
    })
}

/// Validate the payload and compute its totals. No database access.
fn compute(policy: &TaxPolicy, payload: &InvoicePayload) -> Result<InvoiceTotals> {
    payload.validate()?;
    let lines: Vec<LineInput> = payload.items.iter().map(LineInput::from).collect();
    let totals = policy.compute(&lines, payload.sale_type)?;
    policy.verify_submitted(&totals, payload)?;
    Ok(totals)
}

fn check_references(conn: &Connection, payload: &InvoicePayload) -> Result<()> {
    customers::get(conn, payload.customer_id)?;
    let mut stmt = conn.prepare("SELECT 1 FROM items WHERE id = ?1")?;
    for (i, line) in payload.items.iter().enumerate() {
        if !stmt.exists([line.item_id])? {
            return Err(InvoicerError::NotFound(format!(
                "Item {} (line {})",
                line.item_id,
                i + 1
            )));
        }
    }
    Ok(())
}

fn explicit_number(payload: &InvoicePayload) -> Option<&str> {
    payload
        .invoice_no
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn requested_prefix(payload: &InvoicePayload) -> Option<&str> {
    payload
        .prefix
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn insert_lines(
    tx: &Transaction<'_>,
    invoice_id: i64,
    payload: &InvoicePayload,
    totals: &InvoiceTotals,
) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO invoice_items (invoice_id, item_id, quantity, free_quantity, unit,
                                    price_per_unit, discount, gst_rate, cgst_amount,
                                    sgst_amount, igst_amount, cess_amount, total_amount, hsn_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                 COALESCE(?14, (SELECT hsn_code FROM items WHERE id = ?2)))",
    )?;
    for (line, lt) in payload.items.iter().zip(&totals.lines) {
        let unit = line
            .unit
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_UNIT);
        stmt.execute(params![
            invoice_id,
            line.item_id,
            line.quantity,
            line.free_quantity,
            unit,
            to_db(line.price_per_unit),
            to_db(line.discount),
            to_db(line.gst_rate),
            to_db(lt.cgst),
            to_db(lt.sgst),
            to_db(lt.igst),
            to_db(lt.cess),
            to_db(lt.total),
            line.hsn_code.as_deref().filter(|h| !h.trim().is_empty()),
        ])?;
    }
    Ok(())
}

fn duplicate_number(err: rusqlite::Error, invoice_no: &str) -> InvoicerError {
    conflict_on_unique(err, &format!("Invoice number {invoice_no} already exists"))
}

/// Create an invoice. The number is `invoice_no` when given, otherwise the
/// next one under `prefix`, otherwise the next one under the default prefix.
pub fn create(conn: &mut Connection, policy: &TaxPolicy, payload: &InvoicePayload) -> Result<SavedInvoice> {
    let totals = compute(policy, payload)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    check_references(&tx, payload)?;

    let invoice_no = match (explicit_number(payload), requested_prefix(payload)) {
        (Some(no), _) => {
            sequence::record_explicit(&tx, no)?;
            no.to_string()
        }
        (None, Some(prefix)) => sequence::allocate(&tx, prefix)?,
        (None, None) => {
            let prefix = catalog::default_prefix(&tx)?.ok_or_else(|| {
                InvoicerError::InvalidPrefix("no default invoice prefix is registered".into())
            })?;
            sequence::allocate(&tx, &prefix)?
        }
    };

    tx.execute(
        "INSERT INTO invoices (invoice_no, date, customer_id, sale_type, notes, status,
                               taxable_value, cgst, sgst, igst, cess, round_off, total_value)
         VALUES (?1, ?2, ?3, ?4, ?5, 'PAID', ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            invoice_no,
            payload.date,
            payload.customer_id,
            payload.sale_type,
            payload.notes,
            to_db(totals.taxable_value),
            to_db(totals.cgst),
            to_db(totals.sgst),
            to_db(totals.igst),
            to_db(totals.cess),
            to_db(totals.round_off),
            to_db(totals.total_value),
        ],
    )
    .map_err(|e| duplicate_number(e, &invoice_no))?;
    let invoice_id = tx.last_insert_rowid();
    insert_lines(&tx, invoice_id, payload, &totals)?;
    tx.commit()?;

    tracing::info!(invoice_id, %invoice_no, total = %totals.total_value, "invoice created");
    Ok(SavedInvoice {
        invoice_id,
        invoice_no,
        totals,
    })
}

/// Replace the header and every line of invoice `id`.
///
/// The number is kept unless the payload names a new one, or names a prefix
/// the current number does not belong to.
pub fn update(
    conn: &mut Connection,
    policy: &TaxPolicy,
    id: i64,
    payload: &InvoicePayload,
) -> Result<SavedInvoice> {
    let totals = compute(policy, payload)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current: Option<String> = tx
        .query_row("SELECT invoice_no FROM invoices WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    let Some(current) = current else {
        return Err(InvoicerError::NotFound("Invoice".into()));
    };
    check_references(&tx, payload)?;

    let invoice_no = match (explicit_number(payload), requested_prefix(payload)) {
        (Some(no), _) => {
            sequence::record_explicit(&tx, no)?;
            no.to_string()
        }
        (None, Some(prefix)) if sequence::parse_suffix(prefix, &current).is_none() => {
            sequence::allocate(&tx, prefix)?
        }
        _ => current,
    };

    tx.execute("DELETE FROM invoice_items WHERE invoice_id = ?1", [id])?;
    tx.execute(
        "UPDATE invoices
         SET invoice_no = ?1, date = ?2, customer_id = ?3, sale_type = ?4, notes = ?5,
             status = 'PAID', taxable_value = ?6, cgst = ?7, sgst = ?8, igst = ?9,
             cess = ?10, round_off = ?11, total_value = ?12
         WHERE id = ?13",
        params![
            invoice_no,
            payload.date,
            payload.customer_id,
            payload.sale_type,
            payload.notes,
            to_db(totals.taxable_value),
            to_db(totals.cgst),
            to_db(totals.sgst),
            to_db(totals.igst),
            to_db(totals.cess),
            to_db(totals.round_off),
            to_db(totals.total_value),
            id,
        ],
    )
    .map_err(|e| duplicate_number(e, &invoice_no))?;
    insert_lines(&tx, id, payload, &totals)?;
    tx.commit()?;

    tracing::info!(invoice_id = id, %invoice_no, total = %totals.total_value, "invoice updated");
    Ok(SavedInvoice {
        invoice_id: id,
        invoice_no,
        totals,
    })
}

/// Delete an invoice; its lines go with it.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    if conn.execute("DELETE FROM invoices WHERE id = ?1", [id])? == 0 {
        return Err(InvoicerError::NotFound("Invoice".into()));
    }
    tracing::info!(invoice_id = id, "invoice deleted");
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Invoice> {
    conn.query_row(
        &format!("SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"),
        [id],
        row_to_invoice,
    )
    .optional()?
    .ok_or_else(|| InvoicerError::NotFound("Invoice".into()))
}

pub fn lines(conn: &Connection, invoice_id: i64) -> Result<Vec<InvoiceLine>> {
    let mut stmt = conn.prepare(
        "SELECT ii.id, ii.invoice_id, ii.item_id, i.name, i.default_mrp, ii.quantity,
                ii.free_quantity, ii.unit, ii.price_per_unit, ii.discount, ii.gst_rate,
                ii.cgst_amount, ii.sgst_amount, ii.igst_amount, ii.cess_amount,
                ii.total_amount, COALESCE(ii.hsn_code, i.hsn_code)
         FROM invoice_items ii
         JOIN items i ON ii.item_id = i.id
         WHERE ii.invoice_id = ?1
         ORDER BY ii.id",
    )?;
    let rows = stmt.query_map([invoice_id], row_to_line)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn get_details(conn: &Connection, id: i64) -> Result<InvoiceDetails> {
    let invoice = get(conn, id)?;
    let customer = customers::get(conn, invoice.customer_id)?;
    let items = lines(conn, id)?;
    Ok(InvoiceDetails {
        invoice,
        customer,
        items,
    })
}

/// Invoices newest first. `search` matches the number, the customer name or
/// the total.
pub fn list(conn: &Connection, filter: &InvoiceFilter) -> Result<Vec<InvoiceSummary>> {
    let pattern = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    let mut stmt = conn.prepare(
        "SELECT i.id, i.invoice_no, i.date, i.total_value, i.status, c.name
         FROM invoices i
         JOIN customers c ON i.customer_id = c.id
         WHERE (?1 IS NULL OR i.invoice_no LIKE ?1 OR c.name LIKE ?1
                OR CAST(i.total_value AS TEXT) LIKE ?1)
           AND (?2 IS NULL OR i.date >= ?2)
           AND (?3 IS NULL OR i.date <= ?3)
         ORDER BY i.date DESC, i.id DESC
         LIMIT ?4",
    )?;
    let rows = stmt.query_map(
        params![
            pattern,
            filter.start_date,
            filter.end_date,
            filter.limit.filter(|l| *l > 0).unwrap_or(-1),
        ],
        |row| {
            Ok(InvoiceSummary {
                id: row.get(0)?,
                invoice_no: row.get(1)?,
                date: row.get(2)?,
                total_value: from_db(row.get(3)?),
                status: row.get(4)?,
                customer_name: row.get(5)?,
            })
        },
    )?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}
