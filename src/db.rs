use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::error::{InvoicerError, Result};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS business (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    address TEXT,
    gstin TEXT,
    contact_number TEXT
);

CREATE TABLE IF NOT EXISTS units (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS hsn_codes (
    code TEXT PRIMARY KEY,
    description TEXT
);

CREATE TABLE IF NOT EXISTS customers (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    phone TEXT,
    gstin TEXT,
    address TEXT NOT NULL,
    place_of_supply TEXT,
    created_at TEXT DEFAULT (datetime('now')),
    UNIQUE (name, phone)
);

CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    hsn_code TEXT,
    default_unit TEXT,
    default_mrp REAL,
    purchase_price REAL,
    default_sale_price REAL,
    default_tax_rate REAL,
    category_id INTEGER,
    inclusive_of_tax INTEGER DEFAULT 0,
    FOREIGN KEY (category_id) REFERENCES categories(id)
);

CREATE TABLE IF NOT EXISTS invoice_prefixes (
    id INTEGER PRIMARY KEY,
    prefix TEXT NOT NULL UNIQUE CHECK (length(prefix) > 0),
    is_default INTEGER DEFAULT 0
);

CREATE TABLE IF NOT EXISTS invoice_sequences (
    prefix TEXT PRIMARY KEY,
    last_value INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS invoices (
    id INTEGER PRIMARY KEY,
    invoice_no TEXT NOT NULL UNIQUE,
    date TEXT NOT NULL,
    customer_id INTEGER NOT NULL,
    sale_type TEXT NOT NULL DEFAULT 'INTRA_STATE',
    notes TEXT,
    status TEXT NOT NULL DEFAULT 'PAID',
    taxable_value REAL NOT NULL DEFAULT 0,
    cgst REAL NOT NULL DEFAULT 0,
    sgst REAL NOT NULL DEFAULT 0,
    igst REAL NOT NULL DEFAULT 0,
    cess REAL NOT NULL DEFAULT 0,
    round_off REAL NOT NULL DEFAULT 0,
    total_value REAL NOT NULL DEFAULT 0,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (customer_id) REFERENCES customers(id)
);

CREATE TABLE IF NOT EXISTS invoice_items (
    id INTEGER PRIMARY KEY,
    invoice_id INTEGER NOT NULL,
    item_id INTEGER NOT NULL,
    quantity INTEGER NOT NULL,
    free_quantity INTEGER NOT NULL DEFAULT 0,
    unit TEXT NOT NULL DEFAULT 'PCS',
    price_per_unit REAL NOT NULL,
    discount REAL NOT NULL DEFAULT 0,
    gst_rate REAL NOT NULL,
    cgst_amount REAL NOT NULL DEFAULT 0,
    sgst_amount REAL NOT NULL DEFAULT 0,
    igst_amount REAL NOT NULL DEFAULT 0,
    cess_amount REAL NOT NULL DEFAULT 0,
    total_amount REAL NOT NULL DEFAULT 0,
    hsn_code TEXT,
    FOREIGN KEY (invoice_id) REFERENCES invoices(id) ON DELETE CASCADE,
    FOREIGN KEY (item_id) REFERENCES items(id)
);

CREATE INDEX IF NOT EXISTS idx_invoices_date ON invoices(date);
CREATE INDEX IF NOT EXISTS idx_invoices_customer ON invoices(customer_id);
CREATE INDEX IF NOT EXISTS idx_invoice_items_invoice ON invoice_items(invoice_id);
";

pub const DEFAULT_UNITS: &[&str] = &[
    "PCS", "BTL", "BOX", "BUN", "BDL", "CAN", "CTN", "DZN", "GM", "KG", "LTR", "MTR", "NOS", "PAC",
    "ROL", "SET", "SQF", "TBS", "TUB",
];

/// Tables emptied by `clear_all_data`, children first.
const DATA_TABLES: &[&str] = &[
    "invoice_items",
    "invoices",
    "invoice_sequences",
    "items",
    "customers",
    "categories",
    "business",
    "hsn_codes",
    "invoice_prefixes",
    "units",
];

/// Decimal places kept when reading money back from REAL columns.
const MONEY_SCALE: u32 = 6;

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM units", [], |row| row.get(0))?;
    if count == 0 {
        seed_units(conn)?;
    }
    Ok(())
}

pub fn seed_units(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO units (name) VALUES (?1)")?;
    for unit in DEFAULT_UNITS {
        stmt.execute([unit])?;
    }
    Ok(())
}

/// Delete every row from every data table. A table that does not exist yet
/// is skipped; any other failure is returned.
pub fn clear_all_data(conn: &Connection) -> Result<()> {
    for table in DATA_TABLES {
        match conn.execute(&format!("DELETE FROM {table}"), []) {
            Ok(_) => {}
            Err(e) if is_missing_table(&e) => {
                tracing::debug!(table, "skipping clear of missing table");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table"))
}

/// Turn a UNIQUE/PRIMARY KEY violation into `Conflict(msg)`; pass anything
/// else through as a storage error.
pub fn conflict_on_unique(err: rusqlite::Error, msg: &str) -> InvoicerError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
        {
            InvoicerError::Conflict(msg.to_string())
        }
        _ => InvoicerError::Storage(err),
    }
}

pub fn to_db(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

pub fn from_db(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp(MONEY_SCALE)
        .normalize()
}

pub fn opt_from_db(value: Option<f64>) -> Option<Decimal> {
    value.map(from_db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &[
            "business",
            "units",
            "categories",
            "hsn_codes",
            "customers",
            "items",
            "invoice_prefixes",
            "invoice_sequences",
            "invoices",
            "invoice_items",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
        let count: i64 = conn.query_row("SELECT count(*) FROM units", [], |r| r.get(0)).unwrap();
        assert_eq!(count, DEFAULT_UNITS.len() as i64);
    }

    #[test]
    fn test_clear_all_data_empties_tables() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO categories (name) VALUES ('Skincare')", []).unwrap();
        clear_all_data(&conn).unwrap();
        let units: i64 = conn.query_row("SELECT count(*) FROM units", [], |r| r.get(0)).unwrap();
        let cats: i64 = conn.query_row("SELECT count(*) FROM categories", [], |r| r.get(0)).unwrap();
        assert_eq!(units, 0);
        assert_eq!(cats, 0);
    }

    #[test]
    fn test_clear_all_data_tolerates_missing_tables() {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("empty.db")).unwrap();
        conn.execute_batch("CREATE TABLE units (name TEXT PRIMARY KEY); INSERT INTO units VALUES ('PCS');")
            .unwrap();
        clear_all_data(&conn).unwrap();
        let units: i64 = conn.query_row("SELECT count(*) FROM units", [], |r| r.get(0)).unwrap();
        assert_eq!(units, 0);
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let (_dir, conn) = test_db();
        let err = conn
            .execute("INSERT INTO units (name) VALUES ('PCS')", [])
            .unwrap_err();
        assert!(matches!(
            conflict_on_unique(err, "dup"),
            InvoicerError::Conflict(_)
        ));
    }

    #[test]
    fn test_invoice_items_cascade_on_delete() {
        let (_dir, conn) = test_db();
        conn.execute_batch(
            "INSERT INTO customers (id, name, address) VALUES (1, 'A', 'Addr');
             INSERT INTO items (id, name) VALUES (1, 'Serum');
             INSERT INTO invoices (id, invoice_no, date, customer_id) VALUES (1, 'FY25-26/0001', '2025-05-01', 1);
             INSERT INTO invoice_items (invoice_id, item_id, quantity, price_per_unit, gst_rate) VALUES (1, 1, 1, 10, 5);
             DELETE FROM invoices WHERE id = 1;",
        )
        .unwrap();
        let lines: i64 = conn.query_row("SELECT count(*) FROM invoice_items", [], |r| r.get(0)).unwrap();
        assert_eq!(lines, 0);
    }

    #[test]
    fn test_money_round_trips_through_real() {
        let v: Decimal = "104.9895".parse().unwrap();
        assert_eq!(from_db(to_db(v)), v);
        let half: Decimal = "0.83325".parse().unwrap();
        assert_eq!(from_db(to_db(half)), half);
    }
}
