use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::catalog;
use crate::error::Result;
use crate::models::NewPrefix;
use crate::sequence;
use crate::settings::load_settings;

pub fn list() -> Result<()> {
    let conn = super::open_db(&load_settings())?;
    let prefixes = catalog::list_prefixes(&conn)?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Prefix", "Default", "Next Number"]);
    for p in &prefixes {
        table.add_row(vec![
            Cell::new(p.id),
            Cell::new(&p.prefix),
            Cell::new(if p.is_default { "yes".green().to_string() } else { String::new() }),
            Cell::new(sequence::next_invoice_number(&conn, &p.prefix)?),
        ]);
    }
    println!("Invoice prefixes\n{table}");
    Ok(())
}

pub fn add(prefix: &str, default: bool) -> Result<()> {
    let mut conn = super::open_db(&load_settings())?;
    let added = catalog::register_prefix(
        &mut conn,
        &NewPrefix {
            prefix: prefix.to_string(),
            is_default: default,
        },
    )?;
    if added.is_default {
        println!("Added prefix {} (default)", added.prefix);
    } else {
        println!("Added prefix {}", added.prefix);
    }
    Ok(())
}
