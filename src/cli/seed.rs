use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime};
use colored::Colorize;
use rand::prelude::*;
use rusqlite::{params, Connection};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::catalog;
use crate::db::{clear_all_data, get_connection, init_db, seed_units, to_db};
use crate::error::{InvoicerError, Result};
use crate::fiscal;
use crate::models::{Business, SaleType};
use crate::sequence;
use crate::settings::load_settings;
use crate::tax::{compute_invoice_totals, LineInput};

const FIRST_NAMES: &[&str] = &[
    "Aarav", "Vivaan", "Aditya", "Vihaan", "Arjun", "Sai", "Reyansh", "Ayaan", "Krishna", "Ishaan",
    "Saanvi", "Aanya", "Aadhya", "Aaradhya", "Ananya", "Pari", "Diya", "Myra", "Anika", "Avni",
    "Rishabh", "Suraj",
];

const LAST_NAMES: &[&str] = &[
    "Sharma", "Verma", "Gupta", "Singh", "Kumar", "Patel", "Shah", "Mehta", "Jain", "Agarwal", "Khan",
    "Ali", "Reddy", "Naidu", "Rao",
];

const CITIES: &[(&str, &str)] = &[
    ("Mumbai", "Maharashtra"),
    ("Delhi", "Delhi"),
    ("Bangalore", "Karnataka"),
    ("Hyderabad", "Telangana"),
    ("Ahmedabad", "Gujarat"),
    ("Chennai", "Tamil Nadu"),
    ("Kolkata", "West Bengal"),
    ("Pune", "Maharashtra"),
    ("Jaipur", "Rajasthan"),
    ("Lucknow", "Uttar Pradesh"),
    ("Kanpur", "Uttar Pradesh"),
    ("Nagpur", "Maharashtra"),
    ("Indore", "Madhya Pradesh"),
    ("Thane", "Maharashtra"),
    ("Bhopal", "Madhya Pradesh"),
    ("Patna", "Bihar"),
    ("Ghaziabad", "Uttar Pradesh"),
    ("Ludhiana", "Punjab"),
    ("Agra", "Uttar Pradesh"),
    ("Nashik", "Maharashtra"),
];

const ITEM_ADJECTIVES: &[&str] = &[
    "Premium", "Organic", "Herbal", "Advanced", "Gentle", "Radiant", "Soothing", "Matte", "Glossy",
    "HD", "Natural", "Pure", "Intense", "Daily", "Luminous",
];

const ITEM_TYPES: &[&str] = &[
    "Face Wash", "Lipstick", "Foundation", "Serum", "Moisturizer", "Shampoo", "Conditioner",
    "Hair Oil", "Sunscreen", "Toner", "Cleanser", "Exfoliator", "Mask", "Eye Cream", "Body Lotion",
];

const ITEM_SUFFIXES: &[&str] = &[
    "Plus", "Pro", "Max", "for Men", "for Women", "200ml", "50g", "Kit", "for Oily Skin",
    "for Dry Skin", "UV Protect", "Intense Repair", "Classic", "Gold",
];

const CATEGORIES: &[&str] = &["Cosmetics", "Skincare", "Haircare"];
const ITEM_TAX_RATES: &[u32] = &[5, 12, 18];
const ITEM_HSN: &str = "3304";
const ITEM_UNIT: &str = "PCS";

/// Invoices per month vary by this much either side of the average.
const MONTHLY_SPREAD: u32 = 20;
const MAX_LINES_PER_INVOICE: usize = 5;

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub customers: usize,
    pub items: usize,
    pub months: u32,
    pub per_month: u32,
    pub rng_seed: Option<u64>,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            customers: 200,
            items: 80,
            months: 18,
            per_month: 120,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SeedReport {
    pub customers: usize,
    pub items: usize,
    pub invoices: usize,
    /// Highest number issued per prefix.
    pub sequences: BTreeMap<String, i64>,
}

struct SeedItem {
    id: i64,
    sale_price: Decimal,
    tax_rate: Decimal,
}

fn money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(2)
}

fn business() -> Business {
    Business {
        name: "AMAR BEAUTY PLACE".to_string(),
        address: Some("Ghaziabad, Uttar Pradesh".to_string()),
        gstin: Some("09ABCDE1234F1Z5".to_string()),
        contact_number: Some("9876543210".to_string()),
    }
}

fn seed_customers(conn: &Connection, rng: &mut StdRng, count: usize) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO customers (name, phone, address, place_of_supply)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut inserted = 0;
    while inserted < count {
        let (first, last) = match (FIRST_NAMES.choose(rng), LAST_NAMES.choose(rng)) {
            (Some(f), Some(l)) => (f, l),
            _ => break,
        };
        let Some((city, state)) = CITIES.choose(rng) else {
            break;
        };
        let phone = format!("{}{}", rng.gen_range(6..=9), rng.gen_range(100_000_000..=999_999_999u32));
        inserted += stmt.execute(params![
            format!("{first} {last}"),
            phone,
            format!("{city} Main Road"),
            state,
        ])?;
    }
    Ok(inserted)
}

fn seed_items(conn: &Connection, rng: &mut StdRng, count: usize) -> Result<Vec<SeedItem>> {
    let combinations = ITEM_ADJECTIVES.len() * ITEM_TYPES.len() * ITEM_SUFFIXES.len();
    let count = count.min(combinations);

    let mut category_ids = Vec::new();
    for name in CATEGORIES {
        category_ids.push(catalog::ensure_category(conn, name)?);
    }

    let mut stmt = conn.prepare(
        "INSERT INTO items (name, hsn_code, default_unit, default_mrp, purchase_price,
                            default_sale_price, default_tax_rate, category_id, inclusive_of_tax)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    let mut names = HashSet::new();
    let mut items = Vec::with_capacity(count);
    while items.len() < count {
        let name = format!(
            "{} {} {}",
            ITEM_ADJECTIVES.choose(rng).unwrap_or(&"Daily"),
            ITEM_TYPES.choose(rng).unwrap_or(&"Serum"),
            ITEM_SUFFIXES.choose(rng).unwrap_or(&"Classic"),
        );
        if !names.insert(name.clone()) {
            continue;
        }
        let purchase = money(rng.gen_range(50.0..500.0));
        let sale = money(rng.gen_range(1.5..2.5)) * purchase;
        let sale = sale.round_dp(2);
        let mrp = (sale * Decimal::new(12, 1)).round_dp(2);
        let rate = Decimal::from(*ITEM_TAX_RATES.choose(rng).unwrap_or(&18));
        let category = category_ids.choose(rng).copied();
        stmt.execute(params![
            name,
            ITEM_HSN,
            ITEM_UNIT,
            to_db(mrp),
            to_db(purchase),
            to_db(sale),
            to_db(rate),
            category,
            rng.gen_bool(0.5),
        ])?;
        items.push(SeedItem {
            id: conn.last_insert_rowid(),
            sale_price: sale,
            tax_rate: rate,
        });
    }
    Ok(items)
}

fn last_moment_of_month(first: NaiveDate) -> NaiveDateTime {
    let next = first.checked_add_months(Months::new(1)).unwrap_or(first);
    next.and_time(NaiveTime::MIN) - Duration::seconds(1)
}

/// Generate invoices month by month up to `now`, numbering each financial
/// year's invoices from 1 under its `FYxx-yy/` prefix.
fn seed_invoices(
    conn: &Connection,
    rng: &mut StdRng,
    opts: &SeedOptions,
    customer_ids: &[i64],
    items: &[SeedItem],
    now: NaiveDateTime,
) -> Result<(usize, BTreeMap<String, i64>)> {
    let mut sequences: BTreeMap<String, i64> = BTreeMap::new();
    if opts.months == 0 || customer_ids.is_empty() || items.is_empty() {
        return Ok((0, sequences));
    }

    let this_month = now.date().with_day(1).unwrap_or(now.date());
    let mut month = this_month
        .checked_sub_months(Months::new(opts.months - 1))
        .unwrap_or(this_month);

    let mut invoice_stmt = conn.prepare(
        "INSERT INTO invoices (invoice_no, date, customer_id, sale_type, status, taxable_value,
                               cgst, sgst, igst, cess, round_off, total_value)
         VALUES (?1, ?2, ?3, ?4, 'PAID', ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;
    let mut line_stmt = conn.prepare(
        "INSERT INTO invoice_items (invoice_id, item_id, quantity, unit, price_per_unit, gst_rate,
                                    cgst_amount, sgst_amount, igst_amount, total_amount, hsn_code)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
    )?;

    let mut created = 0;
    while month <= this_month {
        let prefix = fiscal::default_prefix_for(month);
        let low = opts.per_month.saturating_sub(MONTHLY_SPREAD);
        let target = rng.gen_range(low..=opts.per_month + MONTHLY_SPREAD);
        let end = last_moment_of_month(month).min(now);
        let mut at = month.and_time(NaiveTime::MIN);

        for _ in 0..target {
            if at > end {
                break;
            }
            let Some(customer_id) = customer_ids.choose(rng).copied() else {
                break;
            };
            let line_count = rng.gen_range(1..=MAX_LINES_PER_INVOICE.min(items.len()));
            let chosen: Vec<&SeedItem> = items.choose_multiple(rng, line_count).collect();
            let inputs: Vec<LineInput> = chosen
                .iter()
                .map(|item| LineInput {
                    quantity: rng.gen_range(1..=10),
                    free_quantity: 0,
                    price_per_unit: item.sale_price,
                    discount: Decimal::ZERO,
                    gst_rate: item.tax_rate,
                })
                .collect();
            let totals = compute_invoice_totals(&inputs, SaleType::IntraState)?;

            let counter = sequences.entry(prefix.clone()).or_insert(0);
            *counter += 1;
            let invoice_no = sequence::format_number(&prefix, *counter);

            invoice_stmt.execute(params![
                invoice_no,
                at.date(),
                customer_id,
                SaleType::IntraState,
                to_db(totals.taxable_value),
                to_db(totals.cgst),
                to_db(totals.sgst),
                to_db(totals.igst),
                to_db(totals.cess),
                to_db(totals.round_off),
                to_db(totals.total_value),
            ])?;
            let invoice_id = conn.last_insert_rowid();
            for ((item, input), lt) in chosen.iter().zip(&inputs).zip(&totals.lines) {
                line_stmt.execute(params![
                    invoice_id,
                    item.id,
                    input.quantity,
                    ITEM_UNIT,
                    to_db(input.price_per_unit),
                    to_db(input.gst_rate),
                    to_db(lt.cgst),
                    to_db(lt.sgst),
                    to_db(lt.igst),
                    to_db(lt.total),
                    ITEM_HSN,
                ])?;
            }
            created += 1;
            at += Duration::hours(rng.gen_range(1..=18));
        }

        tracing::debug!(month = %month.format("%Y-%m"), invoices = created, "seeded month");
        match month.checked_add_months(Months::new(1)) {
            Some(next) => month = next,
            None => break,
        }
    }
    Ok((created, sequences))
}

/// Register every prefix that received invoices plus the one for `today`,
/// which becomes the default, and point each counter at its last number.
fn register_sequences(conn: &Connection, sequences: &BTreeMap<String, i64>, today: NaiveDate) -> Result<()> {
    let current = fiscal::default_prefix_for(today);
    let mut stmt =
        conn.prepare("INSERT INTO invoice_prefixes (prefix, is_default) VALUES (?1, ?2)")?;
    if !sequences.contains_key(&current) {
        stmt.execute(params![current, true])?;
    }
    for (prefix, last) in sequences {
        stmt.execute(params![prefix, *prefix == current])?;
        sequence::set_counter(conn, prefix, *last)?;
    }
    Ok(())
}

/// Wipe the database and fill it with generated sample data, all in one
/// transaction.
pub fn seed(conn: &mut Connection, opts: &SeedOptions, now: NaiveDateTime) -> Result<SeedReport> {
    let mut rng = match opts.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    init_db(conn)?;
    clear_all_data(conn)?;

    let tx = conn.transaction()?;
    seed_units(&tx)?;
    catalog::save_business(&tx, &business())?;
    let customers = seed_customers(&tx, &mut rng, opts.customers)?;
    let items = seed_items(&tx, &mut rng, opts.items)?;

    let customer_ids: Vec<i64> = {
        let mut stmt = tx.prepare("SELECT id FROM customers ORDER BY id")?;
        let ids = stmt.query_map([], |row| row.get(0))?;
        ids.collect::<std::result::Result<Vec<_>, _>>()?
    };
    let (invoices, sequences) = seed_invoices(&tx, &mut rng, opts, &customer_ids, &items, now)?;
    register_sequences(&tx, &sequences, now.date())?;
    tx.commit()?;

    tracing::info!(customers, items = items.len(), invoices, "database seeded");
    Ok(SeedReport {
        customers,
        items: items.len(),
        invoices,
        sequences,
    })
}

pub fn run(opts: SeedOptions) -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(InvoicerError::Settings(format!(
            "No database found at {}\nRun `invoicer init` first.",
            db_path.display()
        )));
    }

    let mut conn = get_connection(&db_path)?;
    println!("Clearing existing data and seeding {}...", db_path.display());
    let started = Instant::now();
    let report = seed(&mut conn, &opts, Local::now().naive_local())?;

    println!("{} {} customers, {} items", "Seeded".green().bold(), report.customers, report.items);
    for (prefix, last) in &report.sequences {
        println!("  {prefix:<10} {last:>6} invoices");
    }
    println!(
        "{} {} invoices in {:.2}s",
        "Generated".green().bold(),
        report.invoices,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}
