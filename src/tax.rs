//! GST computation for invoices.
//!
//! All arithmetic is done in `Decimal` so the CGST and SGST halves of an
//! intra-state tax are always exactly equal. The invoice total is rounded to
//! whole rupees half-away-from-zero and the difference is carried in
//! `round_off`.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{InvoicerError, Result};
use crate::models::{InvoiceLine, InvoicePayload, LinePayload, SaleType};

pub const DEFAULT_GST_RATES: &[u32] = &[0, 5, 12, 18];

/// Largest quantity accepted on one line.
pub const MAX_QUANTITY: i64 = 1_000_000;
/// Largest unit price accepted on one line, in rupees (100 crore).
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;

/// Tax-relevant primitives of one invoice line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineInput {
    pub quantity: i64,
    pub free_quantity: i64,
    pub price_per_unit: Decimal,
    pub discount: Decimal,
    pub gst_rate: Decimal,
}

impl From<&LinePayload> for LineInput {
    fn from(p: &LinePayload) -> Self {
        Self {
            quantity: p.quantity,
            free_quantity: p.free_quantity,
            price_per_unit: p.price_per_unit,
            discount: p.discount,
            gst_rate: p.gst_rate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LineTax {
    pub taxable: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub cess: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvoiceTotals {
    pub taxable_value: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
    pub cess: Decimal,
    pub exact_total: Decimal,
    pub total_value: Decimal,
    pub round_off: Decimal,
    #[serde(skip)]
    pub lines: Vec<LineTax>,
}

/// Per-rate breakdown printed in the tax summary of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSummary {
    pub rate: Decimal,
    pub taxable: Decimal,
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
}

/// Allowed GST slabs and the tolerance used when checking client figures.
#[derive(Debug, Clone)]
pub struct TaxPolicy {
    allowed_rates: Vec<Decimal>,
    tolerance: Decimal,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_GST_RATES)
    }
}

/// Round to whole rupees, half away from zero.
pub fn round_to_rupee(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}

impl TaxPolicy {
    pub fn new(rates: &[u32]) -> Self {
        Self {
            allowed_rates: rates.iter().map(|r| Decimal::from(*r)).collect(),
            tolerance: Decimal::new(1, 2),
        }
    }

    fn validate_line(&self, index: usize, line: &LineInput) -> Result<()> {
        let reason = if line.quantity <= 0 {
            Some(format!("quantity must be positive, got {}", line.quantity))
        } else if line.quantity > MAX_QUANTITY {
            Some(format!("quantity {} exceeds the limit of {MAX_QUANTITY}", line.quantity))
        } else if line.free_quantity > MAX_QUANTITY {
            Some(format!("free quantity {} exceeds the limit of {MAX_QUANTITY}", line.free_quantity))
        } else if line.free_quantity < 0 {
            Some(format!("free quantity must not be negative, got {}", line.free_quantity))
        } else if line.price_per_unit.is_sign_negative() && !line.price_per_unit.is_zero() {
            Some(format!("price per unit must not be negative, got {}", line.price_per_unit))
        } else if line.price_per_unit > Decimal::from(MAX_UNIT_PRICE) {
            Some(format!("price per unit {} exceeds the limit of {MAX_UNIT_PRICE}", line.price_per_unit))
        } else if line.discount.is_sign_negative() && !line.discount.is_zero() {
            Some(format!("discount must not be negative, got {}", line.discount))
        } else if !self.allowed_rates.contains(&line.gst_rate) {
            let allowed: Vec<String> = self.allowed_rates.iter().map(|r| r.to_string()).collect();
            Some(format!(
                "GST rate {}% is not one of {}",
                line.gst_rate,
                allowed.join(", ")
            ))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(InvoicerError::InvalidLineItem {
                line: index + 1,
                reason,
            }),
            None => Ok(()),
        }
    }

    fn line_tax(line: &LineInput, sale_type: SaleType) -> LineTax {
        let taxable = Decimal::from(line.quantity) * line.price_per_unit;
        let tax = taxable * line.gst_rate / Decimal::ONE_HUNDRED;
        let (cgst, sgst, igst) = match sale_type {
            SaleType::IntraState => {
                let half = tax / Decimal::TWO;
                (half, half, Decimal::ZERO)
            }
            SaleType::InterState => (Decimal::ZERO, Decimal::ZERO, tax),
        };
        LineTax {
            taxable,
            cgst,
            sgst,
            igst,
            cess: Decimal::ZERO,
            total: taxable + tax,
        }
    }

    /// Validate every line, then compute per-line splits and invoice totals.
    pub fn compute(&self, lines: &[LineInput], sale_type: SaleType) -> Result<InvoiceTotals> {
        for (i, line) in lines.iter().enumerate() {
            self.validate_line(i, line)?;
        }

        let mut totals = InvoiceTotals::default();
        for line in lines {
            let lt = Self::line_tax(line, sale_type);
            totals.taxable_value += lt.taxable;
            totals.cgst += lt.cgst;
            totals.sgst += lt.sgst;
            totals.igst += lt.igst;
            totals.cess += lt.cess;
            totals.lines.push(lt);
        }

        totals.exact_total =
            totals.taxable_value + totals.cgst + totals.sgst + totals.igst + totals.cess;
        totals.total_value = round_to_rupee(totals.exact_total);
        totals.round_off = totals.total_value - totals.exact_total;
        Ok(totals)
    }

    fn check(&self, field: &str, submitted: Decimal, computed: Decimal) -> Result<()> {
        let disagrees = submitted
            .checked_sub(computed)
            .map_or(true, |diff| diff.abs() > self.tolerance);
        if disagrees {
            return Err(InvoicerError::Validation(format!(
                "{field}: submitted {submitted} disagrees with computed {}",
                computed.round_dp(2)
            )));
        }
        Ok(())
    }

    /// Reject a request whose client-computed figures disagree with `totals`.
    pub fn verify_submitted(&self, totals: &InvoiceTotals, payload: &InvoicePayload) -> Result<()> {
        let header = [
            ("taxable_value", payload.taxable_value, totals.taxable_value),
            ("cgst", payload.cgst, totals.cgst),
            ("sgst", payload.sgst, totals.sgst),
            ("igst", payload.igst, totals.igst),
            ("round_off", payload.round_off, totals.round_off),
            ("total_value", payload.total_value, totals.total_value),
        ];
        for (field, submitted, computed) in header {
            if let Some(v) = submitted {
                self.check(field, v, computed)?;
            }
        }

        for (i, (line, lt)) in payload.items.iter().zip(&totals.lines).enumerate() {
            let n = i + 1;
            let fields = [
                ("cgst_amount", line.cgst_amount, lt.cgst),
                ("sgst_amount", line.sgst_amount, lt.sgst),
                ("igst_amount", line.igst_amount, lt.igst),
                ("total_amount", line.total_amount, lt.total),
            ];
            for (field, submitted, computed) in fields {
                if let Some(v) = submitted {
                    self.check(&format!("line {n} {field}"), v, computed)?;
                }
            }
        }
        Ok(())
    }
}

/// Compute totals with the default GST slabs.
pub fn compute_invoice_totals(lines: &[LineInput], sale_type: SaleType) -> Result<InvoiceTotals> {
    TaxPolicy::default().compute(lines, sale_type)
}

/// Group persisted line taxes by GST rate, lowest rate first. Zero-rated lines
/// are left out.
pub fn tax_summary(lines: &[InvoiceLine]) -> Vec<RateSummary> {
    let mut by_rate: BTreeMap<Decimal, RateSummary> = BTreeMap::new();
    for line in lines.iter().filter(|l| !l.gst_rate.is_zero()) {
        let entry = by_rate.entry(line.gst_rate).or_insert_with(|| RateSummary {
            rate: line.gst_rate,
            taxable: Decimal::ZERO,
            cgst: Decimal::ZERO,
            sgst: Decimal::ZERO,
            igst: Decimal::ZERO,
        });
        entry.taxable += Decimal::from(line.quantity) * line.price_per_unit;
        entry.cgst += line.cgst_amount;
        entry.sgst += line.sgst_amount;
        entry.igst += line.igst_amount;
    }
    by_rate.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, price: i64, rate: u32) -> LineInput {
        LineInput {
            quantity: qty,
            free_quantity: 0,
            price_per_unit: Decimal::from(price),
            discount: Decimal::ZERO,
            gst_rate: Decimal::from(rate),
        }
    }

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_three_line_intra_state_scenario() {
        let lines = vec![line(2, 100, 18), line(1, 250, 12), line(5, 40, 5)];
        let t = compute_invoice_totals(&lines, SaleType::IntraState).unwrap();
        assert_eq!(t.taxable_value, dec("650"));
        assert_eq!(t.cgst, dec("38"));
        assert_eq!(t.sgst, dec("38"));
        assert_eq!(t.igst, Decimal::ZERO);
        assert_eq!(t.exact_total, dec("726"));
        assert_eq!(t.total_value, dec("726"));
        assert_eq!(t.round_off, Decimal::ZERO);
        assert_eq!(t.lines.len(), 3);
        assert_eq!(t.lines[0].total, dec("236"));
    }

    #[test]
    fn test_inter_state_uses_igst_only() {
        let lines = vec![line(2, 100, 18), line(1, 250, 12), line(5, 40, 5)];
        let t = compute_invoice_totals(&lines, SaleType::InterState).unwrap();
        assert_eq!(t.igst, dec("76"));
        assert_eq!(t.cgst, Decimal::ZERO);
        assert_eq!(t.sgst, Decimal::ZERO);
        assert_eq!(t.total_value, dec("726"));
    }

    #[test]
    fn test_empty_lines_yield_zero_totals() {
        let t = compute_invoice_totals(&[], SaleType::IntraState).unwrap();
        assert_eq!(t, InvoiceTotals::default());
    }

    #[test]
    fn test_round_off_reconciles_fractional_total() {
        // 3 x 33.33 = 99.99 taxable, 5% = 4.9995 tax -> 104.9895
        let lines = vec![LineInput {
            quantity: 3,
            free_quantity: 0,
            price_per_unit: dec("33.33"),
            discount: Decimal::ZERO,
            gst_rate: Decimal::from(5),
        }];
        let t = compute_invoice_totals(&lines, SaleType::IntraState).unwrap();
        assert_eq!(t.exact_total, dec("104.9895"));
        assert_eq!(t.total_value, dec("105"));
        assert_eq!(t.round_off, dec("0.0105"));
        assert_eq!(t.cgst, t.sgst);
    }

    #[test]
    fn test_half_rounds_away_from_zero() {
        assert_eq!(round_to_rupee(dec("100.5")), dec("101"));
        assert_eq!(round_to_rupee(dec("101.5")), dec("102"));
        assert_eq!(round_to_rupee(dec("100.49")), dec("100"));
    }

    #[test]
    fn test_round_off_is_below_one_rupee() {
        let prices = ["0.01", "17.77", "99.99", "123.45", "1000.50"];
        for (i, p) in prices.iter().enumerate() {
            for rate in DEFAULT_GST_RATES {
                let lines = vec![LineInput {
                    quantity: i as i64 + 1,
                    free_quantity: 2,
                    price_per_unit: dec(p),
                    discount: Decimal::ZERO,
                    gst_rate: Decimal::from(*rate),
                }];
                let t = compute_invoice_totals(&lines, SaleType::IntraState).unwrap();
                assert_eq!(t.total_value.fract(), Decimal::ZERO);
                assert!(t.round_off.abs() < Decimal::ONE);
                assert_eq!(t.round_off, t.total_value - t.exact_total);
                assert_eq!(t.cgst, t.sgst);
            }
        }
    }

    #[test]
    fn test_compute_is_deterministic() {
        let lines = vec![line(7, 19, 12), line(1, 1, 5)];
        let a = compute_invoice_totals(&lines, SaleType::IntraState).unwrap();
        let b = compute_invoice_totals(&lines, SaleType::IntraState).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_free_quantity_and_discount_do_not_change_tax() {
        let mut l = line(2, 100, 18);
        let base = compute_invoice_totals(&[l.clone()], SaleType::IntraState).unwrap();
        l.free_quantity = 3;
        l.discount = dec("10");
        let with_extras = compute_invoice_totals(&[l], SaleType::IntraState).unwrap();
        assert_eq!(base.total_value, with_extras.total_value);
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let err = compute_invoice_totals(&[line(1, 10, 5), line(0, 10, 5)], SaleType::IntraState)
            .unwrap_err();
        match err {
            InvoicerError::InvalidLineItem { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_negative_price() {
        let mut l = line(1, 10, 5);
        l.price_per_unit = dec("-1");
        assert!(matches!(
            compute_invoice_totals(&[l], SaleType::IntraState),
            Err(InvoicerError::InvalidLineItem { .. })
        ));
    }

    #[test]
    fn test_rejects_amounts_beyond_limits() {
        let huge_qty = line(i64::MAX, 10, 18);
        let mut huge_price = line(1, 10, 18);
        huge_price.price_per_unit = dec("79228162514264337593543950");
        let mut both = line(i64::MAX, 10, 18);
        both.price_per_unit = huge_price.price_per_unit;
        for l in [huge_qty, huge_price, both] {
            assert!(matches!(
                compute_invoice_totals(&[l], SaleType::IntraState),
                Err(InvoicerError::InvalidLineItem { line: 1, .. })
            ));
        }
    }

    #[test]
    fn test_largest_allowed_line_computes() {
        let l = line(MAX_QUANTITY, MAX_UNIT_PRICE, 18);
        let t = compute_invoice_totals(&[l.clone(), l], SaleType::IntraState).unwrap();
        assert_eq!(t.taxable_value, Decimal::from(2 * MAX_QUANTITY * MAX_UNIT_PRICE));
        assert_eq!(t.cgst, t.sgst);
    }

    #[test]
    fn test_rejects_rate_outside_allowed_set() {
        let err = compute_invoice_totals(&[line(1, 10, 28)], SaleType::IntraState).unwrap_err();
        assert!(err.to_string().contains("28"), "got: {err}");
    }

    #[test]
    fn test_custom_policy_allows_extra_slab() {
        let policy = TaxPolicy::new(&[0, 5, 12, 18, 28]);
        let t = policy.compute(&[line(1, 100, 28)], SaleType::IntraState).unwrap();
        assert_eq!(t.total_value, dec("128"));
    }

    #[test]
    fn test_decimal_rate_matches_integer_slab() {
        let mut l = line(1, 100, 18);
        l.gst_rate = dec("18.0");
        assert!(compute_invoice_totals(&[l], SaleType::IntraState).is_ok());
    }

    fn payload(items: serde_json::Value, extra: serde_json::Value) -> InvoicePayload {
        let mut body = serde_json::json!({
            "customer_id": 1,
            "date": "2025-05-01",
            "items": items,
        });
        if let (Some(obj), Some(more)) = (body.as_object_mut(), extra.as_object()) {
            for (k, v) in more {
                obj.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_verify_accepts_matching_client_figures() {
        let p = payload(
            serde_json::json!([{ "item_id": 1, "quantity": 2, "price_per_unit": 100, "gst_rate": 18,
                                 "cgst_amount": 18.0, "sgst_amount": 18.0, "total_amount": 236.0 }]),
            serde_json::json!({ "taxable_value": 200, "cgst": 18, "sgst": 18, "total_value": 236, "round_off": 0.004 }),
        );
        let policy = TaxPolicy::default();
        let lines: Vec<LineInput> = p.items.iter().map(LineInput::from).collect();
        let totals = policy.compute(&lines, p.sale_type).unwrap();
        assert!(policy.verify_submitted(&totals, &p).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampered_total() {
        let p = payload(
            serde_json::json!([{ "item_id": 1, "quantity": 2, "price_per_unit": 100, "gst_rate": 18 }]),
            serde_json::json!({ "total_value": 200 }),
        );
        let policy = TaxPolicy::default();
        let lines: Vec<LineInput> = p.items.iter().map(LineInput::from).collect();
        let totals = policy.compute(&lines, p.sale_type).unwrap();
        let err = policy.verify_submitted(&totals, &p).unwrap_err();
        assert!(err.to_string().contains("total_value"), "got: {err}");
    }

    #[test]
    fn test_verify_rejects_extreme_submitted_total() {
        let mut p = payload(
            serde_json::json!([{ "item_id": 1, "quantity": 2, "price_per_unit": 100, "gst_rate": 18 }]),
            serde_json::json!({}),
        );
        p.total_value = Some(Decimal::MIN);
        let policy = TaxPolicy::default();
        let lines: Vec<LineInput> = p.items.iter().map(LineInput::from).collect();
        let totals = policy.compute(&lines, p.sale_type).unwrap();
        assert!(matches!(
            policy.verify_submitted(&totals, &p),
            Err(InvoicerError::Validation(_))
        ));
    }

    #[test]
    fn test_verify_rejects_tampered_line_tax() {
        let p = payload(
            serde_json::json!([{ "item_id": 1, "quantity": 1, "price_per_unit": 100, "gst_rate": 12,
                                 "cgst_amount": 5.0 }]),
            serde_json::json!({}),
        );
        let policy = TaxPolicy::default();
        let lines: Vec<LineInput> = p.items.iter().map(LineInput::from).collect();
        let totals = policy.compute(&lines, p.sale_type).unwrap();
        let err = policy.verify_submitted(&totals, &p).unwrap_err();
        assert!(err.to_string().contains("line 1 cgst_amount"), "got: {err}");
    }

    fn persisted(rate: i64, qty: i64, price: i64, cgst: &str) -> InvoiceLine {
        InvoiceLine {
            id: 0,
            invoice_id: 1,
            item_id: 1,
            item_name: "Serum".to_string(),
            default_mrp: None,
            quantity: qty,
            free_quantity: 0,
            unit: "PCS".to_string(),
            price_per_unit: Decimal::from(price),
            discount: Decimal::ZERO,
            gst_rate: Decimal::from(rate),
            cgst_amount: dec(cgst),
            sgst_amount: dec(cgst),
            igst_amount: Decimal::ZERO,
            cess_amount: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            hsn_code: None,
        }
    }

    #[test]
    fn test_tax_summary_groups_and_skips_zero() {
        let lines = vec![
            persisted(18, 2, 100, "18"),
            persisted(5, 5, 40, "5"),
            persisted(18, 1, 50, "4.5"),
            persisted(0, 1, 10, "0"),
        ];
        let summary = tax_summary(&lines);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].rate, Decimal::from(5));
        assert_eq!(summary[1].rate, Decimal::from(18));
        assert_eq!(summary[1].taxable, dec("250"));
        assert_eq!(summary[1].cgst, dec("22.5"));
    }
}
