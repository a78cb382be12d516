//! Invoice number allocation.
//!
//! Numbers are `{prefix}{n}` with `n` zero-padded to at least four digits.
//! The next `n` is one more than the larger of the stored counter for the
//! prefix and the highest suffix already used under it. `allocate` writes
//! the counter back, so it must run in the same IMMEDIATE transaction as the
//! invoice insert; the UNIQUE constraint on `invoice_no` backs this up.

use rusqlite::{params, Connection, OptionalExtension, Transaction};

use crate::error::{InvoicerError, Result};

pub const SEQUENCE_WIDTH: usize = 4;

/// Highest sequence number a prefix can reach.
pub const MAX_SEQUENCE: i64 = 999_999_999;

pub fn format_suffix(n: i64) -> String {
    format!("{n:0width$}", width = SEQUENCE_WIDTH)
}

pub fn format_number(prefix: &str, n: i64) -> String {
    format!("{prefix}{}", format_suffix(n))
}

/// Numeric suffix of `invoice_no` under `prefix`, if it has one.
pub fn parse_suffix(prefix: &str, invoice_no: &str) -> Option<i64> {
    let rest = invoice_no.strip_prefix(prefix)?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

fn ensure_registered(conn: &Connection, prefix: &str) -> Result<()> {
    if prefix.trim().is_empty() {
        return Err(InvoicerError::InvalidPrefix("prefix is required".into()));
    }
    let known: Option<i64> = conn
        .query_row(
            "SELECT id FROM invoice_prefixes WHERE prefix = ?1",
            [prefix],
            |row| row.get(0),
        )
        .optional()?;
    match known {
        Some(_) => Ok(()),
        None => Err(InvoicerError::InvalidPrefix(format!("{prefix} is not registered"))),
    }
}

fn highest_suffix(conn: &Connection, prefix: &str) -> Result<i64> {
    let mut stmt = conn.prepare(
        "SELECT invoice_no FROM invoices WHERE substr(invoice_no, 1, length(?1)) = ?1",
    )?;
    let numbers = stmt.query_map([prefix], |row| row.get::<_, String>(0))?;
    let mut highest = 0;
    for no in numbers {
        if let Some(n) = parse_suffix(prefix, &no?) {
            highest = highest.max(n);
        }
    }
    Ok(highest)
}

fn counter(conn: &Connection, prefix: &str) -> Result<i64> {
    let value = conn
        .query_row(
            "SELECT last_value FROM invoice_sequences WHERE prefix = ?1",
            [prefix],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.unwrap_or(0))
}

fn peek_next(conn: &Connection, prefix: &str) -> Result<i64> {
    ensure_registered(conn, prefix)?;
    counter(conn, prefix)?
        .max(highest_suffix(conn, prefix)?)
        .checked_add(1)
        .filter(|n| *n <= MAX_SEQUENCE)
        .ok_or_else(|| {
            InvoicerError::Validation(format!(
                "invoice numbers under {prefix} are exhausted (limit {MAX_SEQUENCE})"
            ))
        })
}

/// Next number under `prefix` without reserving it.
pub fn next_invoice_number(conn: &Connection, prefix: &str) -> Result<String> {
    Ok(format_number(prefix, peek_next(conn, prefix)?))
}

/// Padded suffix only, e.g. `"0042"`.
pub fn peek_next_suffix(conn: &Connection, prefix: &str) -> Result<String> {
    Ok(format_suffix(peek_next(conn, prefix)?))
}

/// Reserve the next number under `prefix` inside `tx`.
pub fn allocate(tx: &Transaction<'_>, prefix: &str) -> Result<String> {
    let n = peek_next(tx, prefix)?;
    tx.execute(
        "INSERT INTO invoice_sequences (prefix, last_value) VALUES (?1, ?2)
         ON CONFLICT(prefix) DO UPDATE SET last_value = excluded.last_value",
        params![prefix, n],
    )?;
    Ok(format_number(prefix, n))
}

/// Account for a caller-chosen number. It must start with a registered
/// prefix (the longest match wins) and end in digits; the counter for that
/// prefix is raised to at least its suffix.
pub fn record_explicit(tx: &Transaction<'_>, invoice_no: &str) -> Result<()> {
    let prefix: Option<String> = tx
        .query_row(
            "SELECT prefix FROM invoice_prefixes
             WHERE substr(?1, 1, length(prefix)) = prefix
             ORDER BY length(prefix) DESC LIMIT 1",
            [invoice_no],
            |row| row.get(0),
        )
        .optional()?;
    let Some(prefix) = prefix else {
        return Err(InvoicerError::InvalidPrefix(format!(
            "{invoice_no} does not start with a registered prefix"
        )));
    };
    let Some(n) = parse_suffix(&prefix, invoice_no) else {
        return Err(InvoicerError::Validation(format!(
            "invoice number {invoice_no} must end in a numeric sequence after {prefix}"
        )));
    };
    if n > MAX_SEQUENCE {
        return Err(InvoicerError::Validation(format!(
            "invoice number {invoice_no} exceeds the sequence limit of {MAX_SEQUENCE}"
        )));
    }
    tx.execute(
        "INSERT INTO invoice_sequences (prefix, last_value) VALUES (?1, ?2)
         ON CONFLICT(prefix) DO UPDATE SET last_value = MAX(last_value, excluded.last_value)",
        params![prefix, n],
    )?;
    Ok(())
}

/// Set the counter for `prefix` outright. Used when bulk-loading invoices.
pub fn set_counter(conn: &Connection, prefix: &str, last_value: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO invoice_sequences (prefix, last_value) VALUES (?1, ?2)
         ON CONFLICT(prefix) DO UPDATE SET last_value = excluded.last_value",
        params![prefix, last_value],
    )?;
    Ok(())
}
