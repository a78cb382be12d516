use std::collections::HashMap;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog;
use crate::customers;
use crate::db::from_db;
use crate::error::{InvoicerError, Result};
use crate::fiscal;
use crate::fmt::rupees_in_words;
use crate::invoices;
use crate::models::{Business, Customer, Invoice, InvoiceLine};
use crate::tax::{tax_summary, RateSummary};

/// Ranges longer than this many days are bucketed by month.
const DAILY_SERIES_MAX_DAYS: i64 = 60;

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    ThisMonth,
    LastMonth,
    ThisYear,
    Custom,
}

impl FromStr for Period {
    type Err = InvoicerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "this-month" => Ok(Period::ThisMonth),
            "last-month" => Ok(Period::LastMonth),
            "this-year" => Ok(Period::ThisYear),
            "custom" => Ok(Period::Custom),
            other => Err(InvoicerError::Validation(format!(
                "unknown period '{other}' (expected this-month, last-month, this-year or custom)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

fn first_of_month(d: NaiveDate) -> NaiveDate {
    d.with_day(1).unwrap_or(d)
}

fn day_before(d: NaiveDate) -> NaiveDate {
    d.pred_opt().unwrap_or(d)
}

fn whole_month_before(d: NaiveDate) -> DateRange {
    let end = day_before(first_of_month(d));
    DateRange::new(first_of_month(end), end)
}

/// Current range for `period` and the range it is compared against. Custom
/// ranges have no comparison range.
pub fn resolve_period(
    period: Period,
    today: NaiveDate,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(DateRange, Option<DateRange>)> {
    match period {
        Period::ThisMonth => {
            let current = DateRange::new(first_of_month(today), today);
            Ok((current, Some(whole_month_before(today))))
        }
        Period::LastMonth => {
            let current = whole_month_before(today);
            Ok((current, Some(whole_month_before(current.start))))
        }
        Period::ThisYear => {
            let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
            let prev_end = day_before(start);
            let prev_start = NaiveDate::from_ymd_opt(prev_end.year(), 1, 1).unwrap_or(prev_end);
            Ok((
                DateRange::new(start, today),
                Some(DateRange::new(prev_start, prev_end)),
            ))
        }
        Period::Custom => match (start, end) {
            (Some(s), Some(e)) if s <= e => Ok((DateRange::new(s, e), None)),
            (Some(_), Some(_)) => Err(InvoicerError::Validation(
                "start_date must not be after end_date".into(),
            )),
            _ => Err(InvoicerError::Validation(
                "custom period requires start_date and end_date".into(),
            )),
        },
    }
}

// ---------------------------------------------------------------------------
// KPIs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub total_sales: Decimal,
    pub total_profit: Decimal,
    pub total_invoices: i64,
}

/// Sales, gross profit and invoice count for invoices dated within `range`.
/// Profit counts only lines whose item has a purchase price.
pub fn kpis(conn: &Connection, range: DateRange) -> Result<Kpis> {
    let (sales, count): (Option<f64>, i64) = conn.query_row(
        "SELECT SUM(total_value), COUNT(id) FROM invoices WHERE date BETWEEN ?1 AND ?2",
        params![range.start, range.end],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let profit: Option<f64> = conn.query_row(
        "SELECT SUM(ii.quantity * (ii.price_per_unit - i.purchase_price))
         FROM invoice_items ii
         JOIN items i ON ii.item_id = i.id
         JOIN invoices inv ON ii.invoice_id = inv.id
         WHERE inv.date BETWEEN ?1 AND ?2 AND i.purchase_price IS NOT NULL",
        params![range.start, range.end],
        |row| row.get(0),
    )?;
    Ok(Kpis {
        total_sales: sales.map(from_db).unwrap_or_default(),
        total_profit: profit.map(from_db).unwrap_or_default(),
        total_invoices: count,
    })
}

/// Percentage change label shown on the dashboard: `+12%`, `-3%`, `+100%`
/// when there were no previous sales, `N/A` when neither period sold.
pub fn change_label(current: Decimal, previous: Decimal) -> String {
    if previous > Decimal::ZERO {
        let change = ((current - previous) / previous * Decimal::ONE_HUNDRED).round();
        let sign = if change >= Decimal::ZERO { "+" } else { "" };
        format!("{sign}{change}%")
    } else if current > Decimal::ZERO {
        "+100%".to_string()
    } else {
        "N/A".to_string()
    }
}

// ---------------------------------------------------------------------------
// Sales series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Day,
    Month,
}

#[derive(Debug, Clone, Serialize)]
pub struct SalesData {
    pub labels: Vec<String>,
    pub data: Vec<Decimal>,
    pub total: Decimal,
    pub total_profit: Decimal,
    pub total_invoices: i64,
    pub change: String,
    pub time_unit: TimeUnit,
}

pub fn sales_data(
    conn: &Connection,
    period: Period,
    today: NaiveDate,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<SalesData> {
    let (current, previous) = resolve_period(period, today, start, end)?;
    let now = kpis(conn, current)?;
    let before = match previous {
        Some(range) => kpis(conn, range)?,
        None => Kpis::default(),
    };

    let time_unit = if (current.end - current.start).num_days() > DAILY_SERIES_MAX_DAYS {
        TimeUnit::Month
    } else {
        TimeUnit::Day
    };
    let bucket = match time_unit {
        TimeUnit::Day => "%Y-%m-%d",
        TimeUnit::Month => "%Y-%m-01",
    };

    let mut stmt = conn.prepare(
        "SELECT strftime(?1, date) AS period, SUM(total_value)
         FROM invoices WHERE date BETWEEN ?2 AND ?3
         GROUP BY period ORDER BY period",
    )?;
    let rows = stmt.query_map(params![bucket, current.start, current.end], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
    })?;
    let mut by_bucket: HashMap<String, Decimal> = HashMap::new();
    for row in rows {
        let (key, total) = row?;
        by_bucket.insert(key, from_db(total));
    }

    let labels: Vec<String> = match time_unit {
        TimeUnit::Day => current
            .start
            .iter_days()
            .take_while(|d| *d <= current.end)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect(),
        TimeUnit::Month => {
            let mut labels = Vec::new();
            let mut month = first_of_month(current.start);
            while month <= current.end {
                labels.push(month.format("%Y-%m-01").to_string());
                match month.checked_add_months(Months::new(1)) {
                    Some(next) => month = next,
                    None => break,
                }
            }
            labels
        }
    };
    let data = labels
        .iter()
        .map(|l| by_bucket.get(l).copied().unwrap_or_default())
        .collect();

    Ok(SalesData {
        labels,
        data,
        total: now.total_sales,
        total_profit: now.total_profit,
        total_invoices: now.total_invoices,
        change: change_label(now.total_sales, before.total_sales),
        time_unit,
    })
}

// ---------------------------------------------------------------------------
// Financial-year summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FinancialYearSummary {
    pub financial_year: String,
    pub total_sales: Decimal,
    pub total_profit: Decimal,
}

/// Sales and profit from 1 April of the current financial year to `today`.
pub fn financial_year_summary(conn: &Connection, today: NaiveDate) -> Result<FinancialYearSummary> {
    let k = kpis(conn, DateRange::new(fiscal::fiscal_year_start(today), today))?;
    Ok(FinancialYearSummary {
        financial_year: fiscal::fiscal_year_of(today),
        total_sales: k.total_sales,
        total_profit: k.total_profit,
    })
}

// ---------------------------------------------------------------------------
// Invoice register
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRow {
    pub invoice_no: String,
    pub date: NaiveDate,
    pub customer: String,
    pub gstin: Option<String>,
    pub sale_type: String,
    pub taxable_value: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub round_off: Decimal,
    pub total_value: Decimal,
}

/// Every invoice in `[from, to]`, oldest first, for the sales register.
pub fn register(conn: &Connection, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Vec<RegisterRow>> {
    let mut stmt = conn.prepare(
        "SELECT i.invoice_no, i.date, c.name, c.gstin, i.sale_type, i.taxable_value,
                i.cgst, i.sgst, i.igst, i.round_off, i.total_value
         FROM invoices i JOIN customers c ON i.customer_id = c.id
         WHERE (?1 IS NULL OR i.date >= ?1) AND (?2 IS NULL OR i.date <= ?2)
         ORDER BY i.date, i.id",
    )?;
    let rows = stmt.query_map(params![from, to], |row| {
        Ok(RegisterRow {
            invoice_no: row.get(0)?,
            date: row.get(1)?,
            customer: row.get(2)?,
            gstin: row.get(3)?,
            sale_type: row.get(4)?,
            taxable_value: from_db(row.get(5)?),
            cgst: from_db(row.get(6)?),
            sgst: from_db(row.get(7)?),
            igst: from_db(row.get(8)?),
            round_off: from_db(row.get(9)?),
            total_value: from_db(row.get(10)?),
        })
    })?;
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

// ---------------------------------------------------------------------------
// PDF data
// ---------------------------------------------------------------------------

/// Everything a rendered invoice shows.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDocument {
    pub business: Business,
    pub invoice: Invoice,
    pub customer: Customer,
    pub items: Vec<InvoiceLine>,
    pub total_quantity: i64,
    pub tax_summary: Vec<RateSummary>,
    pub amount_in_words: String,
}

pub fn invoice_document(conn: &Connection, invoice_id: i64) -> Result<InvoiceDocument> {
    let invoice = invoices::get(conn, invoice_id)?;
    let customer = customers::get(conn, invoice.customer_id)?;
    let items = invoices::lines(conn, invoice_id)?;
    let business = catalog::get_business(conn)?.unwrap_or_default();

    Ok(InvoiceDocument {
        total_quantity: items.iter().map(|i| i.quantity).sum(),
        tax_summary: tax_summary(&items),
        amount_in_words: rupees_in_words(invoice.total_value),
        business,
        invoice,
        customer,
        items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO customers (id, name, gstin, address) VALUES (1, 'Aarav Sharma', '07ABCDE1234F1Z5', 'Delhi Main Road');
             INSERT INTO items (id, name, purchase_price) VALUES (1, 'Radiant Serum Gold', 60);
             INSERT INTO items (id, name) VALUES (2, 'Gentle Face Wash');",
        )
        .unwrap();
        (dir, conn)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Invoice with one line of item 1 (qty x price at 18%) and one of item 2.
    fn add_invoice(conn: &Connection, no: &str, date: &str, total: f64, qty: i64, price: f64) {
        conn.execute(
            "INSERT INTO invoices (invoice_no, date, customer_id, taxable_value, cgst, sgst, total_value)
             VALUES (?1, ?2, 1, ?3, 0, 0, ?3)",
            params![no, date, total],
        )
        .unwrap();
        let id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO invoice_items (invoice_id, item_id, quantity, price_per_unit, gst_rate, cgst_amount, sgst_amount)
             VALUES (?1, 1, ?2, ?3, 18, 9, 9)",
            params![id, qty, price],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO invoice_items (invoice_id, item_id, quantity, price_per_unit, gst_rate, cgst_amount, sgst_amount)
             VALUES (?1, 2, 1, 10, 5, 0.25, 0.25)",
            [id],
        )
        .unwrap();
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("last-month".parse::<Period>().unwrap(), Period::LastMonth);
        assert!("fortnight".parse::<Period>().is_err());
    }

    #[test]
    fn test_resolve_this_month() {
        let (cur, prev) = resolve_period(Period::ThisMonth, d(2025, 3, 15), None, None).unwrap();
        assert_eq!(cur, DateRange::new(d(2025, 3, 1), d(2025, 3, 15)));
        assert_eq!(prev, Some(DateRange::new(d(2025, 2, 1), d(2025, 2, 28))));
    }

    #[test]
    fn test_resolve_last_month_across_year() {
        let (cur, prev) = resolve_period(Period::LastMonth, d(2025, 1, 10), None, None).unwrap();
        assert_eq!(cur, DateRange::new(d(2024, 12, 1), d(2024, 12, 31)));
        assert_eq!(prev, Some(DateRange::new(d(2024, 11, 1), d(2024, 11, 30))));
    }

    #[test]
    fn test_resolve_this_year_and_custom() {
        let (cur, prev) = resolve_period(Period::ThisYear, d(2025, 6, 1), None, None).unwrap();
        assert_eq!(cur, DateRange::new(d(2025, 1, 1), d(2025, 6, 1)));
        assert_eq!(prev, Some(DateRange::new(d(2024, 1, 1), d(2024, 12, 31))));

        let (cur, prev) =
            resolve_period(Period::Custom, d(2025, 6, 1), Some(d(2025, 2, 1)), Some(d(2025, 2, 3))).unwrap();
        assert_eq!(cur, DateRange::new(d(2025, 2, 1), d(2025, 2, 3)));
        assert!(prev.is_none());
        assert!(resolve_period(Period::Custom, d(2025, 6, 1), None, Some(d(2025, 2, 3))).is_err());
        assert!(resolve_period(Period::Custom, d(2025, 6, 1), Some(d(2025, 3, 1)), Some(d(2025, 2, 1))).is_err());
    }

    #[test]
    fn test_change_labels() {
        let dec = |s: &str| s.parse::<Decimal>().unwrap();
        assert_eq!(change_label(dec("112"), dec("100")), "+12%");
        assert_eq!(change_label(dec("97"), dec("100")), "-3%");
        assert_eq!(change_label(dec("100"), dec("100")), "+0%");
        assert_eq!(change_label(dec("50"), Decimal::ZERO), "+100%");
        assert_eq!(change_label(Decimal::ZERO, Decimal::ZERO), "N/A");
    }

    #[test]
    fn test_kpis_sum_sales_and_profit() {
        let (_dir, conn) = test_db();
        add_invoice(&conn, "FY24-25/0001", "2025-03-02", 500.0, 2, 100.0);
        add_invoice(&conn, "FY24-25/0002", "2025-03-20", 300.0, 1, 150.0);
        add_invoice(&conn, "FY24-25/0003", "2025-02-20", 999.0, 1, 100.0);

        let k = kpis(&conn, DateRange::new(d(2025, 3, 1), d(2025, 3, 31))).unwrap();
        assert_eq!(k.total_invoices, 2);
        assert_eq!(k.total_sales, Decimal::from(800));
        // (2 * (100 - 60)) + (1 * (150 - 60)); item 2 has no purchase price
        assert_eq!(k.total_profit, Decimal::from(170));

        let empty = kpis(&conn, DateRange::new(d(2020, 1, 1), d(2020, 1, 31))).unwrap();
        assert_eq!(empty, Kpis::default());
    }

    #[test]
    fn test_sales_data_daily_buckets() {
        let (_dir, conn) = test_db();
        add_invoice(&conn, "A/0001", "2025-03-02", 500.0, 1, 100.0);
        add_invoice(&conn, "A/0002", "2025-03-02", 100.0, 1, 100.0);
        add_invoice(&conn, "A/0003", "2025-02-10", 400.0, 1, 100.0);

        let s = sales_data(&conn, Period::ThisMonth, d(2025, 3, 5), None, None).unwrap();
        assert_eq!(s.time_unit, TimeUnit::Day);
        assert_eq!(s.labels.len(), 5);
        assert_eq!(s.labels[1], "2025-03-02");
        assert_eq!(s.data[1], Decimal::from(600));
        assert_eq!(s.data[0], Decimal::ZERO);
        assert_eq!(s.total, Decimal::from(600));
        assert_eq!(s.total_invoices, 2);
        assert_eq!(s.change, "+50%");
    }

    #[test]
    fn test_sales_data_monthly_buckets_for_long_ranges() {
        let (_dir, conn) = test_db();
        add_invoice(&conn, "A/0001", "2025-01-15", 100.0, 1, 100.0);
        add_invoice(&conn, "A/0002", "2025-04-01", 250.0, 1, 100.0);

        let s = sales_data(&conn, Period::ThisYear, d(2025, 5, 10), None, None).unwrap();
        assert_eq!(s.time_unit, TimeUnit::Month);
        assert_eq!(
            s.labels,
            vec!["2025-01-01", "2025-02-01", "2025-03-01", "2025-04-01", "2025-05-01"]
        );
        assert_eq!(s.data[0], Decimal::from(100));
        assert_eq!(s.data[3], Decimal::from(250));
        assert_eq!(s.change, "+100%");
    }

    #[test]
    fn test_financial_year_summary_starts_in_april() {
        let (_dir, conn) = test_db();
        add_invoice(&conn, "FY24-25/0001", "2025-03-31", 1000.0, 1, 100.0);
        add_invoice(&conn, "FY25-26/0001", "2025-04-01", 200.0, 1, 100.0);
        let s = financial_year_summary(&conn, d(2025, 8, 15)).unwrap();
        assert_eq!(s.financial_year, "FY25-26");
        assert_eq!(s.total_sales, Decimal::from(200));
        assert_eq!(s.total_profit, Decimal::from(40));
    }

    #[test]
    fn test_register_is_oldest_first() {
        let (_dir, conn) = test_db();
        add_invoice(&conn, "A/0002", "2025-05-02", 10.0, 1, 1.0);
        add_invoice(&conn, "A/0001", "2025-05-01", 20.0, 1, 1.0);
        let rows = register(&conn, None, None).unwrap();
        assert_eq!(rows[0].invoice_no, "A/0001");
        assert_eq!(rows[0].gstin.as_deref(), Some("07ABCDE1234F1Z5"));
        let may2 = register(&conn, Some(d(2025, 5, 2)), None).unwrap();
        assert_eq!(may2.len(), 1);
    }

    #[test]
    fn test_invoice_document() {
        let (_dir, conn) = test_db();
        add_invoice(&conn, "A/0001", "2025-05-01", 726.0, 3, 100.0);
        let doc = invoice_document(&conn, 1).unwrap();
        assert_eq!(doc.total_quantity, 4);
        assert_eq!(doc.amount_in_words, "Seven Hundred Twenty-Six Rupees Only");
        assert_eq!(doc.tax_summary.len(), 2);
        assert_eq!(doc.customer.name, "Aarav Sharma");
        assert!(matches!(invoice_document(&conn, 2), Err(InvoicerError::NotFound(_))));
    }
}
