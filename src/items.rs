use rusqlite::{params, Connection, OptionalExtension};
use validator::Validate;

use crate::db::{conflict_on_unique, opt_from_db, to_db};
use crate::error::{InvoicerError, Result};
use crate::models::{Item, NewItem};

/// Item search returns at most this many rows.
pub const SEARCH_LIMIT: i64 = 20;

const COLUMNS: &str = "id, name, hsn_code, default_unit, default_mrp, purchase_price, \
                       default_sale_price, default_tax_rate, category_id, inclusive_of_tax";

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get(1)?,
        hsn_code: row.get(2)?,
        default_unit: row.get(3)?,
        default_mrp: opt_from_db(row.get(4)?),
        purchase_price: opt_from_db(row.get(5)?),
        default_sale_price: opt_from_db(row.get(6)?),
        default_tax_rate: opt_from_db(row.get(7)?),
        category_id: row.get(8)?,
        inclusive_of_tax: row.get::<_, Option<bool>>(9)?.unwrap_or(false),
    })
}

pub fn search(conn: &Connection, term: Option<&str>) -> Result<Vec<Item>> {
    let pattern = term
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{s}%"));
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM items WHERE (?1 IS NULL OR name LIKE ?1) ORDER BY name LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![pattern, SEARCH_LIMIT], row_to_item)?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

pub fn get(conn: &Connection, id: i64) -> Result<Item> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM items WHERE id = ?1"),
        [id],
        row_to_item,
    )
    .optional()?
    .ok_or_else(|| InvoicerError::NotFound("Item".into()))
}

pub fn create(conn: &Connection, new: &NewItem) -> Result<Item> {
    new.validate()?;
    let name = new.name.trim();
    if name.is_empty() {
        return Err(InvoicerError::Validation("Item Name is required".into()));
    }
    let prices = [
        new.default_mrp,
        new.purchase_price,
        new.default_sale_price,
        new.default_tax_rate,
    ];
    if prices.iter().flatten().any(|p| p.is_sign_negative() && !p.is_zero()) {
        return Err(InvoicerError::Validation(
            "Prices and tax rate must not be negative".into(),
        ));
    }

    conn.execute(
        "INSERT INTO items (name, hsn_code, default_unit, default_mrp, purchase_price,
                            default_sale_price, default_tax_rate, category_id, inclusive_of_tax)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            name,
            new.hsn_code,
            new.default_unit,
            new.default_mrp.map(to_db),
            new.purchase_price.map(to_db),
            new.default_sale_price.map(to_db),
            new.default_tax_rate.map(to_db),
            new.category_id,
            new.inclusive_of_tax,
        ],
    )
    .map_err(|e| conflict_on_unique(e, "An item with this name already exists"))?;
    get(conn, conn.last_insert_rowid())
}
