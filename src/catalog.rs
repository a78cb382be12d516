//! Reference data: units, categories, the business profile and invoice
//! prefixes.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::db::conflict_on_unique;
use crate::error::{InvoicerError, Result};
use crate::models::{Business, InvoicePrefix, NewPrefix};

// ----- Units & categories -----

pub fn list_units(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM units ORDER BY name")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Insert a category if missing and return its id.
pub fn ensure_category(conn: &Connection, name: &str) -> Result<i64> {
    conn.execute("INSERT OR IGNORE INTO categories (name) VALUES (?1)", [name])?;
    Ok(conn.query_row("SELECT id FROM categories WHERE name = ?1", [name], |row| row.get(0))?)
}

// ----- Business profile -----

pub fn get_business(conn: &Connection) -> Result<Option<Business>> {
    let business = conn
        .query_row(
            "SELECT name, address, gstin, contact_number FROM business ORDER BY id LIMIT 1",
            [],
            |row| {
                Ok(Business {
                    name: row.get(0)?,
                    address: row.get(1)?,
                    gstin: row.get(2)?,
                    contact_number: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(business)
}

/// Replace the single business profile row.
pub fn save_business(conn: &Connection, business: &Business) -> Result<()> {
    conn.execute("DELETE FROM business", [])?;
    conn.execute(
        "INSERT INTO business (name, address, gstin, contact_number) VALUES (?1, ?2, ?3, ?4)",
        params![business.name, business.address, business.gstin, business.contact_number],
    )?;
    Ok(())
}

// ----- Invoice prefixes -----

fn row_to_prefix(row: &rusqlite::Row) -> rusqlite::Result<InvoicePrefix> {
    Ok(InvoicePrefix {
        id: row.get(0)?,
        prefix: row.get(1)?,
        is_default: row.get(2)?,
    })
}

/// Registered prefixes, the default first, then newest prefix first.
pub fn list_prefixes(conn: &Connection) -> Result<Vec<InvoicePrefix>> {
    let mut stmt = conn.prepare(
        "SELECT id, prefix, is_default FROM invoice_prefixes ORDER BY is_default DESC, prefix DESC",
    )?;
    let rows = stmt.query_map([], row_to_prefix)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn default_prefix(conn: &Connection) -> Result<Option<String>> {
    let prefix = conn
        .query_row(
            "SELECT prefix FROM invoice_prefixes WHERE is_default = 1 LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(prefix)
}

/// True when `longer` is `shorter` followed only by digits, so a number like
/// `INV10005` would parse under both.
fn extends_with_digits(longer: &str, shorter: &str) -> bool {
    longer
        .strip_prefix(shorter)
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// Register a prefix. The first prefix ever registered becomes the default,
/// and a default registration clears the flag on every other prefix.
/// A prefix that differs from an existing one only by trailing digits is
/// rejected.
pub fn register_prefix(conn: &mut Connection, new: &NewPrefix) -> Result<InvoicePrefix> {
    let prefix = new.prefix.trim();
    if prefix.is_empty() {
        return Err(InvoicerError::InvalidPrefix("prefix is required".into()));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let known: Vec<String> = {
        let mut stmt = tx.prepare("SELECT prefix FROM invoice_prefixes")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<std::result::Result<_, _>>()?
    };
    if let Some(other) = known
        .iter()
        .find(|other| extends_with_digits(prefix, other) || extends_with_digits(other, prefix))
    {
        return Err(InvoicerError::InvalidPrefix(format!(
            "{prefix} overlaps {other}: numbers under one would parse under the other"
        )));
    }
    let existing: i64 = tx.query_row("SELECT count(*) FROM invoice_prefixes", [], |row| row.get(0))?;
    let is_default = new.is_default || existing == 0;
    if is_default {
        tx.execute("UPDATE invoice_prefixes SET is_default = 0", [])?;
    }
    tx.execute(
        "INSERT INTO invoice_prefixes (prefix, is_default) VALUES (?1, ?2)",
        params![prefix, is_default],
    )
    .map_err(|e| conflict_on_unique(e, &format!("prefix {prefix} already exists")))?;
    let id = tx.last_insert_rowid();
    tx.commit()?;

    Ok(InvoicePrefix {
        id,
        prefix: prefix.to_string(),
        is_default,
    })
}

/// Make prefix `id` the only default.
pub fn set_default_prefix(conn: &mut Connection, id: i64) -> Result<InvoicePrefix> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let found = tx
        .query_row(
            "SELECT id, prefix, is_default FROM invoice_prefixes WHERE id = ?1",
            [id],
            row_to_prefix,
        )
        .optional()?;
    let Some(mut prefix) = found else {
        return Err(InvoicerError::NotFound(format!("Invoice prefix {id}")));
    };
    tx.execute("UPDATE invoice_prefixes SET is_default = (id = ?1)", [id])?;
    tx.commit()?;
    prefix.is_default = true;
    Ok(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn new_prefix(prefix: &str, is_default: bool) -> NewPrefix {
        NewPrefix {
            prefix: prefix.to_string(),
            is_default,
        }
    }

    fn default_count(conn: &Connection) -> i64 {
        conn.query_row(
            "SELECT count(*) FROM invoice_prefixes WHERE is_default = 1",
            [],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_units_are_sorted() {
        let (_dir, conn) = test_db();
        let units = list_units(&conn).unwrap();
        assert_eq!(units.first().map(String::as_str), Some("BDL"));
        assert!(units.windows(2).all(|w| w[0] <= w[1]));
        assert!(units.contains(&"PCS".to_string()));
    }

    #[test]
    fn test_ensure_category_is_idempotent() {
        let (_dir, conn) = test_db();
        let a = ensure_category(&conn, "Skincare").unwrap();
        let b = ensure_category(&conn, "Skincare").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_business_round_trip() {
        let (_dir, conn) = test_db();
        assert!(get_business(&conn).unwrap().is_none());
        let business = Business {
            name: "AMAR BEAUTY PLACE".into(),
            address: Some("Ghaziabad, Uttar Pradesh".into()),
            gstin: Some("09ABCDE1234F1Z5".into()),
            contact_number: Some("9876543210".into()),
        };
        save_business(&conn, &business).unwrap();
        save_business(&conn, &business).unwrap();
        let loaded = get_business(&conn).unwrap().unwrap();
        assert_eq!(loaded.name, "AMAR BEAUTY PLACE");
        let rows: i64 = conn.query_row("SELECT count(*) FROM business", [], |r| r.get(0)).unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_first_prefix_becomes_default() {
        let (_dir, mut conn) = test_db();
        let p = register_prefix(&mut conn, &new_prefix("FY24-25/", false)).unwrap();
        assert!(p.is_default);
        assert_eq!(default_prefix(&conn).unwrap().as_deref(), Some("FY24-25/"));
    }

    #[test]
    fn test_single_default_is_enforced() {
        let (_dir, mut conn) = test_db();
        register_prefix(&mut conn, &new_prefix("FY24-25/", true)).unwrap();
        register_prefix(&mut conn, &new_prefix("FY25-26/", true)).unwrap();
        register_prefix(&mut conn, &new_prefix("INV/", false)).unwrap();
        assert_eq!(default_count(&conn), 1);
        let list = list_prefixes(&conn).unwrap();
        assert_eq!(list[0].prefix, "FY25-26/");
        assert!(list[0].is_default);
    }

    #[test]
    fn test_set_default_prefix() {
        let (_dir, mut conn) = test_db();
        register_prefix(&mut conn, &new_prefix("FY25-26/", true)).unwrap();
        let old = register_prefix(&mut conn, &new_prefix("FY24-25/", false)).unwrap();
        let promoted = set_default_prefix(&mut conn, old.id).unwrap();
        assert!(promoted.is_default);
        assert_eq!(default_count(&conn), 1);
        assert_eq!(default_prefix(&conn).unwrap().as_deref(), Some("FY24-25/"));
    }

    #[test]
    fn test_set_default_unknown_prefix() {
        let (_dir, mut conn) = test_db();
        assert!(matches!(
            set_default_prefix(&mut conn, 99),
            Err(InvoicerError::NotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_and_empty_prefix() {
        let (_dir, mut conn) = test_db();
        register_prefix(&mut conn, &new_prefix("FY25-26/", false)).unwrap();
        assert!(matches!(
            register_prefix(&mut conn, &new_prefix("FY25-26/", false)),
            Err(InvoicerError::Conflict(_))
        ));
        assert!(matches!(
            register_prefix(&mut conn, &new_prefix("  ", false)),
            Err(InvoicerError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_prefix_plus_digits_is_rejected() {
        let (_dir, mut conn) = test_db();
        register_prefix(&mut conn, &new_prefix("INV", false)).unwrap();
        assert!(matches!(
            register_prefix(&mut conn, &new_prefix("INV1", false)),
            Err(InvoicerError::InvalidPrefix(_))
        ));
        register_prefix(&mut conn, &new_prefix("INV-", false)).unwrap();
        register_prefix(&mut conn, &new_prefix("INV/", false)).unwrap();

        register_prefix(&mut conn, &new_prefix("BILL25", false)).unwrap();
        assert!(matches!(
            register_prefix(&mut conn, &new_prefix("BILL", false)),
            Err(InvoicerError::InvalidPrefix(_))
        ));
        assert_eq!(list_prefixes(&conn).unwrap().len(), 4);
    }

    #[test]
    fn test_failed_default_registration_keeps_old_default() {
        let (_dir, mut conn) = test_db();
        register_prefix(&mut conn, &new_prefix("FY25-26/", true)).unwrap();
        assert!(register_prefix(&mut conn, &new_prefix("FY25-26/", true)).is_err());
        assert_eq!(default_count(&conn), 1);
    }
}
