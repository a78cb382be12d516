use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Whether CGST+SGST or IGST applies to an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleType {
    #[default]
    IntraState,
    InterState,
}

impl SaleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleType::IntraState => "INTRA_STATE",
            SaleType::InterState => "INTER_STATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INTRA_STATE" => Some(SaleType::IntraState),
            "INTER_STATE" => Some(SaleType::InterState),
            _ => None,
        }
    }
}

impl ToSql for SaleType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for SaleType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        SaleType::parse(s).ok_or(FromSqlError::InvalidType)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Business {
    pub name: String,
    pub address: Option<String>,
    pub gstin: Option<String>,
    pub contact_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: Option<String>,
    pub gstin: Option<String>,
    pub address: String,
    pub place_of_supply: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub hsn_code: Option<String>,
    pub default_unit: Option<String>,
    pub default_mrp: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
    pub default_sale_price: Option<Decimal>,
    pub default_tax_rate: Option<Decimal>,
    pub category_id: Option<i64>,
    pub inclusive_of_tax: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoicePrefix {
    pub id: i64,
    pub prefix: String,
    pub is_default: bool,
}

/// Invoice header as persisted, totals included.
#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: i64,
    pub invoice_no: String,
    pub date: NaiveDate,
    pub customer_id: i64,
    pub sale_type: SaleType,
    pub notes: Option<String>,
    pub status: String,
    pub taxable_value: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub cess: Decimal,
    pub round_off: Decimal,
    pub total_value: Decimal,
}

/// Persisted invoice line joined with its catalogue item.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceLine {
    pub id: i64,
    pub invoice_id: i64,
    pub item_id: i64,
    pub item_name: String,
    pub default_mrp: Option<Decimal>,
    pub quantity: i64,
    pub free_quantity: i64,
    pub unit: String,
    pub price_per_unit: Decimal,
    pub discount: Decimal,
    pub gst_rate: Decimal,
    pub cgst_amount: Decimal,
    pub sgst_amount: Decimal,
    pub igst_amount: Decimal,
    pub cess_amount: Decimal,
    pub total_amount: Decimal,
    pub hsn_code: Option<String>,
}

/// Row in invoice listings.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    pub id: i64,
    pub invoice_no: String,
    pub date: NaiveDate,
    pub total_value: Decimal,
    pub status: String,
    pub customer_name: String,
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCustomer {
    #[serde(default)]
    #[validate(length(min = 1, message = "Name and Address are required"))]
    pub name: String,
    pub phone: Option<String>,
    pub gstin: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "Name and Address are required"))]
    pub address: String,
    pub place_of_supply: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewItem {
    #[serde(default)]
    #[validate(length(min = 1, message = "Item Name is required"))]
    pub name: String,
    pub hsn_code: Option<String>,
    pub default_unit: Option<String>,
    pub default_mrp: Option<Decimal>,
    pub purchase_price: Option<Decimal>,
    pub default_sale_price: Option<Decimal>,
    pub default_tax_rate: Option<Decimal>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub inclusive_of_tax: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPrefix {
    #[serde(default)]
    #[validate(length(min = 1, message = "Prefix is required"))]
    pub prefix: String,
    #[serde(default)]
    pub is_default: bool,
}

fn default_quantity() -> i64 {
    1
}

/// One line of an invoice create/update request.
///
/// The `*_amount` figures are what the client computed; they are optional and
/// only checked against the server-side recomputation.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LinePayload {
    #[validate(range(min = 1, message = "item_id is required"))]
    pub item_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub free_quantity: i64,
    pub unit: Option<String>,
    pub price_per_unit: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub gst_rate: Decimal,
    pub hsn_code: Option<String>,
    pub cgst_amount: Option<Decimal>,
    pub sgst_amount: Option<Decimal>,
    pub igst_amount: Option<Decimal>,
    pub total_amount: Option<Decimal>,
}

/// Invoice create/update request.
///
/// Either `invoice_no` (explicit) or `prefix` (allocate the next number) may be
/// given; with neither, creation allocates under the default prefix and update
/// keeps the current number.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InvoicePayload {
    #[validate(range(min = 1, message = "customer_id is required"))]
    pub customer_id: i64,
    pub date: NaiveDate,
    #[serde(default)]
    pub sale_type: SaleType,
    pub notes: Option<String>,
    pub prefix: Option<String>,
    pub invoice_no: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    #[validate(nested)]
    pub items: Vec<LinePayload>,
    pub taxable_value: Option<Decimal>,
    pub cgst: Option<Decimal>,
    pub sgst: Option<Decimal>,
    pub igst: Option<Decimal>,
    pub round_off: Option<Decimal>,
    pub total_value: Option<Decimal>,
}
