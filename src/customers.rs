use std::sync::OnceLock;

use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use validator::Validate;

use crate::db::conflict_on_unique;
use crate::error::{InvoicerError, Result};
use crate::models::{Customer, NewCustomer};

pub const DEFAULT_PAGE_SIZE: i64 = 15;

const COLUMNS: &str = "id, name, phone, gstin, address, place_of_supply";

#[derive(Debug, Serialize)]
pub struct CustomerPage {
    pub customers: Vec<Customer>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

fn gstin_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[0-9]{2}[A-Z]{5}[0-9]{4}[A-Z][1-9A-Z]Z[0-9A-Z]$"))
        .as_ref()
        .map_err(|e| InvoicerError::Other(e.to_string()))
}

fn row_to_customer(row: &rusqlite::Row) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        gstin: row.get(3)?,
        address: row.get(4)?,
        place_of_supply: row.get(5)?,
    })
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Field checks shared by create and update. Returns the normalised GSTIN.
fn validate(new: &NewCustomer) -> Result<Option<String>> {
    new.validate()?;
    if new.name.trim().is_empty() || new.address.trim().is_empty() {
        return Err(InvoicerError::Validation("Name and Address are required".into()));
    }
    let gstin = blank_to_none(&new.gstin).map(|g| g.to_uppercase());
    if let Some(g) = &gstin {
        if !gstin_pattern()?.is_match(g) {
            return Err(InvoicerError::Validation(format!("{g} is not a valid GSTIN")));
        }
    }
    Ok(gstin)
}

/// Page through customers ordered by name. `search` matches name, phone or
/// GSTIN; pages start at 1.
pub fn list(conn: &Connection, search: Option<&str>, page: i64, limit: i64) -> Result<CustomerPage> {
    let page = page.max(1);
    let limit = if limit > 0 { limit } else { DEFAULT_PAGE_SIZE };
    let pattern = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));

    let filter = "WHERE (?1 IS NULL OR name LIKE ?1 OR phone LIKE ?1 OR gstin LIKE ?1)";
    let total: i64 = conn.query_row(
        &format!("SELECT count(*) FROM customers {filter}"),
        [&pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM customers {filter} ORDER BY name, id LIMIT ?2 OFFSET ?3"
    ))?;
    let rows = stmt.query_map(params![pattern, limit, (page - 1) * limit], row_to_customer)?;
    let customers = rows.collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(CustomerPage {
        customers,
        total,
        page,
        limit,
    })
}

pub fn get(conn: &Connection, id: i64) -> Result<Customer> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM customers WHERE id = ?1"),
        [id],
        row_to_customer,
    )
    .optional()?
    .ok_or_else(|| InvoicerError::NotFound("Customer".into()))
}

pub fn create(conn: &Connection, new: &NewCustomer) -> Result<Customer> {
    let gstin = validate(new)?;
    conn.execute(
        "INSERT INTO customers (name, phone, gstin, address, place_of_supply) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.name.trim(),
            blank_to_none(&new.phone),
            gstin,
            new.address.trim(),
            blank_to_none(&new.place_of_supply),
        ],
    )
    .map_err(|e| conflict_on_unique(e, "A customer with this name and phone already exists"))?;
    get(conn, conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, new: &NewCustomer) -> Result<Customer> {
    let gstin = validate(new)?;
    let changed = conn
        .execute(
            "UPDATE customers SET name = ?1, phone = ?2, gstin = ?3, address = ?4, place_of_supply = ?5
             WHERE id = ?6",
            params![
                new.name.trim(),
                blank_to_none(&new.phone),
                gstin,
                new.address.trim(),
                blank_to_none(&new.place_of_supply),
                id,
            ],
        )
        .map_err(|e| conflict_on_unique(e, "A customer with this name and phone already exists"))?;
    if changed == 0 {
        return Err(InvoicerError::NotFound("Customer".into()));
    }
    get(conn, id)
}

/// Delete a customer that no invoice refers to.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let invoices: i64 = conn.query_row(
        "SELECT count(*) FROM invoices WHERE customer_id = ?1",
        [id],
        |row| row.get(0),
    )?;
    if invoices > 0 {
        return Err(InvoicerError::Conflict(format!(
            "Cannot delete. Customer has {invoices} associated invoice(s)."
        )));
    }
    if conn.execute("DELETE FROM customers WHERE id = ?1", [id])? == 0 {
        return Err(InvoicerError::NotFound("Customer".into()));
    }
    Ok(())
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

    fn new_customer(name: &str, phone: &str) -> NewCustomer {
        NewCustomer {
            name: name.to_string(),
            phone: Some(phone.to_string()),
            gstin: None,
            address: "Delhi Main Road".to_string(),
            place_of_supply: Some("Delhi".to_string()),
        }
    }

    #[test]
    fn test_create_and_get() {
        let (_dir, conn) = test_db();
        let c = create(&conn, &new_customer("Aarav Sharma", "9876500001")).unwrap();
        let loaded = get(&conn, c.id).unwrap();
        assert_eq!(loaded.name, "Aarav Sharma");
        assert_eq!(loaded.place_of_supply.as_deref(), Some("Delhi"));
    }

    #[test]
    fn test_create_requires_name_and_address() {
        let (_dir, conn) = test_db();
        let mut c = new_customer("", "1");
        assert!(create(&conn, &c).is_err());
        c.name = "Diya".into();
        c.address = "   ".into();
        let err = create(&conn, &c).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_gstin_is_validated_and_uppercased() {
        let (_dir, conn) = test_db();
        let mut c = new_customer("Myra Jain", "9000000000");
        c.gstin = Some("bogus".into());
        assert!(matches!(create(&conn, &c), Err(InvoicerError::Validation(_))));
        c.gstin = Some("09abcde1234f1z5".into());
        let saved = create(&conn, &c).unwrap();
        assert_eq!(saved.gstin.as_deref(), Some("09ABCDE1234F1Z5"));
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let (_dir, conn) = test_db();
        create(&conn, &new_customer("Arjun Rao", "9811111111")).unwrap();
        assert!(matches!(
            create(&conn, &new_customer("Arjun Rao", "9811111111")),
            Err(InvoicerError::Conflict(_))
        ));
        assert!(create(&conn, &new_customer("Arjun Rao", "9822222222")).is_ok());
    }

    #[test]
    fn test_list_paginates_and_searches() {
        let (_dir, conn) = test_db();
        for i in 0..20 {
            create(&conn, &new_customer(&format!("Customer {i:02}"), &format!("90000000{i:02}"))).unwrap();
        }
        create(&conn, &new_customer("Zoya Khan", "9123456789")).unwrap();

        let first = list(&conn, None, 1, 0).unwrap();
        assert_eq!(first.total, 21);
        assert_eq!(first.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(first.customers.len(), 15);
        assert_eq!(first.customers[0].name, "Customer 00");

        let second = list(&conn, None, 2, 15).unwrap();
        assert_eq!(second.customers.len(), 6);

        let found = list(&conn, Some("zoya"), 1, 15).unwrap();
        assert_eq!(found.total, 1);
        let by_phone = list(&conn, Some("912345"), 1, 15).unwrap();
        assert_eq!(by_phone.customers[0].name, "Zoya Khan");
    }

    #[test]
    fn test_update_and_missing() {
        let (_dir, conn) = test_db();
        let c = create(&conn, &new_customer("Sai Patel", "9333333333")).unwrap();
        let mut changed = new_customer("Sai Patel", "9333333333");
        changed.address = "Pune Main Road".into();
        let updated = update(&conn, c.id, &changed).unwrap();
        assert_eq!(updated.address, "Pune Main Road");
        assert!(matches!(
            update(&conn, 999, &changed),
            Err(InvoicerError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_refused_while_invoiced() {
        let (_dir, conn) = test_db();
        let c = create(&conn, &new_customer("Ishaan Mehta", "9444444444")).unwrap();
        conn.execute(
            "INSERT INTO invoices (invoice_no, date, customer_id) VALUES ('FY25-26/0001', '2025-05-01', ?1)",
            [c.id],
        )
        .unwrap();
        let err = delete(&conn, c.id).unwrap_err();
        assert!(err.to_string().contains("1 associated invoice"));

        conn.execute("DELETE FROM invoices", []).unwrap();
        delete(&conn, c.id).unwrap();
        assert!(matches!(get(&conn, c.id), Err(InvoicerError::NotFound(_))));
        assert!(matches!(delete(&conn, c.id), Err(InvoicerError::NotFound(_))));
    }
}
