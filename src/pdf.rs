use std::io::BufWriter;
use std::str::FromStr;

use printpdf::*;
use rust_decimal::Decimal;

use crate::error::{InvoicerError, Result};
use crate::fmt::{amount, percent};
use crate::reports::InvoiceDocument;

// A4 dimensions (mm)
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_TOP: f32 = 15.0;
const MARGIN_BOTTOM: f32 = 18.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 15.0;
const CONTENT_W: f32 = PAGE_W - MARGIN_LEFT - MARGIN_RIGHT;
const ROW_H: f32 = 5.5;
const FONT_SIZE: f32 = 9.0;
const SMALL_SIZE: f32 = 8.0;
const TITLE_SIZE: f32 = 18.0;
const PT_PER_MM: f32 = 2.834_646;

/// Builtin PDF fonts cannot draw the rupee sign.
fn rs(val: Decimal) -> String {
    format!("Rs. {}", amount(val))
}

pub fn pdf_filename(invoice_no: &str) -> String {
    format!("invoice_{}.pdf", invoice_no.replace('/', "-"))
}

// ---------------------------------------------------------------------------
// Themes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Default,
    Modern,
    Minimalist,
    Classic,
    Creative,
    Technical,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Default,
        Theme::Modern,
        Theme::Minimalist,
        Theme::Classic,
        Theme::Creative,
        Theme::Technical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Modern => "modern",
            Theme::Minimalist => "minimalist",
            Theme::Classic => "classic",
            Theme::Creative => "creative",
            Theme::Technical => "technical",
        }
    }

    fn style(self) -> Style {
        match self {
            Theme::Default => Style {
                regular: BuiltinFont::Helvetica,
                bold: BuiltinFont::HelveticaBold,
                accent: (0.12, 0.31, 0.55),
                char_width: 0.18,
                banner: false,
                rule: 0.5,
            },
            Theme::Modern => Style {
                regular: BuiltinFont::Helvetica,
                bold: BuiltinFont::HelveticaBold,
                accent: (0.0, 0.47, 0.42),
                char_width: 0.18,
                banner: true,
                rule: 0.3,
            },
            Theme::Minimalist => Style {
                regular: BuiltinFont::Helvetica,
                bold: BuiltinFont::Helvetica,
                accent: (0.35, 0.35, 0.35),
                char_width: 0.18,
                banner: false,
                rule: 0.2,
            },
            Theme::Classic => Style {
                regular: BuiltinFont::TimesRoman,
                bold: BuiltinFont::TimesBold,
                accent: (0.0, 0.0, 0.0),
                char_width: 0.16,
                banner: false,
                rule: 0.8,
            },
            Theme::Creative => Style {
                regular: BuiltinFont::Helvetica,
                bold: BuiltinFont::HelveticaBold,
                accent: (0.76, 0.18, 0.42),
                char_width: 0.18,
                banner: true,
                rule: 0.5,
            },
            Theme::Technical => Style {
                regular: BuiltinFont::Courier,
                bold: BuiltinFont::CourierBold,
                accent: (0.1, 0.1, 0.1),
                char_width: 0.212,
                banner: false,
                rule: 0.4,
            },
        }
    }
}

impl FromStr for Theme {
    type Err = InvoicerError;

    fn from_str(s: &str) -> Result<Self> {
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| InvoicerError::Validation(format!("Invalid theme selected: {s}")))
    }
}

#[derive(Clone, Copy)]
struct Style {
    regular: BuiltinFont,
    bold: BuiltinFont,
    accent: (f32, f32, f32),
    /// Approximate glyph advance in mm per point of font size.
    char_width: f32,
    /// Draw the business name on a filled accent band.
    banner: bool,
    /// Rule thickness in points.
    rule: f32,
}

fn rgb((r, g, b): (f32, f32, f32)) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const WHITE: (f32, f32, f32) = (1.0, 1.0, 1.0);

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Col {
    width: f32,
    align: Align,
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    style: Style,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str, style: Style) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(style.regular)
            .map_err(|e| InvoicerError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(style.bold)
            .map_err(|e| InvoicerError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            style,
            y: MARGIN_TOP,
        })
    }

    fn layer(&self) -> PdfLayerReference {
        self.doc
            .get_page(self.current_page)
            .get_layer(self.current_layer)
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text_width(&self, s: &str, size: f32) -> f32 {
        s.chars().count() as f32 * size * self.style.char_width
    }

    fn text_colored(&self, s: &str, x: f32, size: f32, bold: bool, color: (f32, f32, f32)) {
        let font = if bold { &self.font_bold } else { &self.font };
        let layer = self.layer();
        layer.set_fill_color(rgb(color));
        layer.use_text(s, size, Mm(x), Mm(self.pdf_y()), font);
        layer.set_fill_color(rgb(BLACK));
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        self.text_colored(s, x, size, bold, BLACK);
    }

    fn text_right(&self, s: &str, right: f32, size: f32, bold: bool) {
        self.text(s, right - self.text_width(s, size), size, bold);
    }

    fn hline(&self, x1: f32, x2: f32, thickness: f32, color: (f32, f32, f32)) {
        let layer = self.layer();
        layer.set_outline_color(rgb(color));
        layer.set_outline_thickness(thickness);
        let line = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        };
        layer.add_line(line);
        layer.set_outline_color(rgb(BLACK));
    }

    /// Solid band `height` mm tall starting at the current row.
    fn band(&mut self, height: f32) {
        let top = self.y;
        self.y = top + height / 2.0;
        self.hline(0.0, PAGE_W, height * PT_PER_MM, self.style.accent);
        self.y = top;
    }

    fn rule(&mut self) {
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT, self.style.rule, self.style.accent);
        self.y += 2.5;
    }

    fn fit(&self, s: &str, width: f32) -> String {
        let max = (width / (FONT_SIZE * self.style.char_width)).floor() as usize;
        if s.chars().count() <= max {
            s.to_string()
        } else {
            let mut cut: String = s.chars().take(max.saturating_sub(2)).collect();
            cut.push_str("..");
            cut
        }
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.ensure_space(ROW_H * 2.0);
        let mut x = MARGIN_LEFT;
        for (col, header) in cols.iter().zip(headers) {
            let tx = match col.align {
                Align::Left => x,
                Align::Right => x + col.width - self.text_width(header, FONT_SIZE),
            };
            self.text_colored(header, tx, FONT_SIZE, true, self.style.accent);
            x += col.width;
        }
        self.y += 1.5;
        self.rule();
        self.y += 1.5;
    }

    fn table_row(&mut self, cols: &[Col], values: &[&str], bold: bool) {
        self.ensure_space(ROW_H);
        let mut x = MARGIN_LEFT;
        for (col, value) in cols.iter().zip(values) {
            let value = self.fit(value, col.width - 1.0);
            match col.align {
                Align::Left => self.text(&value, x, FONT_SIZE, bold),
                Align::Right => self.text_right(&value, x + col.width, FONT_SIZE, bold),
            }
            x += col.width;
        }
        self.y += ROW_H;
    }

    /// Label/value pair right-aligned in the totals block.
    fn total_line(&mut self, label: &str, value: &str, bold: bool) {
        self.ensure_space(ROW_H);
        let right = PAGE_W - MARGIN_RIGHT;
        self.text(label, right - 75.0, FONT_SIZE, bold);
        self.text_right(value, right, FONT_SIZE, bold);
        self.y += ROW_H;
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| InvoicerError::Pdf(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| InvoicerError::Pdf(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Invoice
// ---------------------------------------------------------------------------

fn header(pdf: &mut PdfWriter, doc: &InvoiceDocument) {
    let business = &doc.business;
    let name = if business.name.is_empty() {
        "Tax Invoice"
    } else {
        business.name.as_str()
    };

    if pdf.style.banner {
        pdf.y = 0.0;
        pdf.band(28.0);
        pdf.y = 14.0;
        pdf.text_colored(name, MARGIN_LEFT, TITLE_SIZE, true, WHITE);
        let title = "TAX INVOICE";
        let x = PAGE_W - MARGIN_RIGHT - pdf.text_width(title, 12.0);
        pdf.text_colored(title, x, 12.0, true, WHITE);
        pdf.y = 34.0;
    } else {
        pdf.y = MARGIN_TOP + 5.0;
        pdf.text_colored(name, MARGIN_LEFT, TITLE_SIZE, true, pdf.style.accent);
        pdf.text_right("TAX INVOICE", PAGE_W - MARGIN_RIGHT, 12.0, true);
        pdf.y += 7.0;
    }

    for detail in [
        business.address.clone(),
        business.gstin.as_ref().map(|g| format!("GSTIN: {g}")),
        business.contact_number.as_ref().map(|c| format!("Phone: {c}")),
    ]
    .into_iter()
    .flatten()
    {
        pdf.text(&detail, MARGIN_LEFT, SMALL_SIZE, false);
        pdf.y += 4.0;
    }
    pdf.y += 1.0;
    pdf.rule();
}

fn parties(pdf: &mut PdfWriter, doc: &InvoiceDocument) {
    let inv = &doc.invoice;
    let customer = &doc.customer;
    let right = PAGE_W / 2.0 + 10.0;
    let top = pdf.y + 2.0;

    pdf.y = top;
    pdf.text_colored("BILL TO", MARGIN_LEFT, SMALL_SIZE, true, pdf.style.accent);
    pdf.y += 5.0;
    pdf.text(&customer.name, MARGIN_LEFT, FONT_SIZE, true);
    pdf.y += 4.5;
    let mut lines = vec![customer.address.clone()];
    if let Some(g) = &customer.gstin {
        lines.push(format!("GSTIN: {g}"));
    }
    if let Some(p) = &customer.phone {
        lines.push(format!("Phone: {p}"));
    }
    if let Some(pos) = &customer.place_of_supply {
        lines.push(format!("Place of supply: {pos}"));
    }
    for line in &lines {
        pdf.text(line, MARGIN_LEFT, SMALL_SIZE, false);
        pdf.y += 4.0;
    }
    let left_bottom = pdf.y;

    pdf.y = top;
    let date = inv.date.format("%d-%m-%Y").to_string();
    let sale_type = match inv.sale_type {
        crate::models::SaleType::IntraState => "Intra-state",
        crate::models::SaleType::InterState => "Inter-state",
    };
    for (label, value) in [
        ("Invoice No.", inv.invoice_no.as_str()),
        ("Date", date.as_str()),
        ("Supply", sale_type),
        ("Status", inv.status.as_str()),
    ] {
        pdf.text(label, right, FONT_SIZE, true);
        pdf.text_right(value, PAGE_W - MARGIN_RIGHT, FONT_SIZE, false);
        pdf.y += 5.0;
    }

    pdf.y = pdf.y.max(left_bottom) + 3.0;
    pdf.rule();
}

fn item_table(pdf: &mut PdfWriter, doc: &InvoiceDocument) {
    let cols = &[
        Col { width: 8.0, align: Align::Left },
        Col { width: 58.0, align: Align::Left },
        Col { width: 16.0, align: Align::Left },
        Col { width: 12.0, align: Align::Right },
        Col { width: 12.0, align: Align::Left },
        Col { width: 22.0, align: Align::Right },
        Col { width: 12.0, align: Align::Right },
        Col { width: 18.0, align: Align::Right },
        Col { width: CONTENT_W - 158.0, align: Align::Right },
    ];
    pdf.table_header(
        cols,
        &["#", "Item", "HSN", "Qty", "Unit", "Rate", "GST", "Tax", "Amount"],
    );

    for (i, line) in doc.items.iter().enumerate() {
        let n = (i + 1).to_string();
        let qty = if line.free_quantity > 0 {
            format!("{}+{}", line.quantity, line.free_quantity)
        } else {
            line.quantity.to_string()
        };
        let rate = amount(line.price_per_unit);
        let gst = percent(line.gst_rate);
        let tax = amount(line.cgst_amount + line.sgst_amount + line.igst_amount + line.cess_amount);
        let total = amount(line.total_amount);
        pdf.table_row(
            cols,
            &[
                &n,
                &line.item_name,
                line.hsn_code.as_deref().unwrap_or(""),
                &qty,
                &line.unit,
                &rate,
                &gst,
                &tax,
                &total,
            ],
            false,
        );
    }
    pdf.rule();
    let qty = doc.total_quantity.to_string();
    pdf.table_row(cols, &["", "Total quantity", "", &qty], true);
    pdf.y += 2.0;
}

fn totals(pdf: &mut PdfWriter, doc: &InvoiceDocument) {
    let inv = &doc.invoice;
    pdf.total_line("Taxable value", &rs(inv.taxable_value), false);
    if inv.igst.is_zero() {
        pdf.total_line("CGST", &rs(inv.cgst), false);
        pdf.total_line("SGST", &rs(inv.sgst), false);
    } else {
        pdf.total_line("IGST", &rs(inv.igst), false);
    }
    if !inv.cess.is_zero() {
        pdf.total_line("Cess", &rs(inv.cess), false);
    }
    pdf.total_line("Round off", &rs(inv.round_off), false);
    pdf.ensure_space(ROW_H * 2.0);
    let right = PAGE_W - MARGIN_RIGHT;
    pdf.hline(right - 75.0, right, pdf.style.rule, pdf.style.accent);
    pdf.y += 4.5;
    pdf.total_line("Invoice total", &rs(inv.total_value), true);
    pdf.y += 2.0;
}

fn tax_summary(pdf: &mut PdfWriter, doc: &InvoiceDocument) {
    if doc.tax_summary.is_empty() {
        return;
    }
    let cols = &[
        Col { width: 25.0, align: Align::Left },
        Col { width: 40.0, align: Align::Right },
        Col { width: 35.0, align: Align::Right },
        Col { width: 35.0, align: Align::Right },
        Col { width: 35.0, align: Align::Right },
    ];
    pdf.ensure_space(ROW_H * 4.0);
    pdf.text_colored("TAX SUMMARY", MARGIN_LEFT, SMALL_SIZE, true, pdf.style.accent);
    pdf.y += 5.0;
    pdf.table_header(cols, &["Rate", "Taxable", "CGST", "SGST", "IGST"]);
    for row in &doc.tax_summary {
        let rate = percent(row.rate);
        let taxable = amount(row.taxable);
        let cgst = amount(row.cgst);
        let sgst = amount(row.sgst);
        let igst = amount(row.igst);
        pdf.table_row(cols, &[&rate, &taxable, &cgst, &sgst, &igst], false);
    }
    pdf.y += 2.0;
}

fn footer(pdf: &mut PdfWriter, doc: &InvoiceDocument) {
    pdf.ensure_space(ROW_H * 6.0);
    pdf.text("Amount in words:", MARGIN_LEFT, FONT_SIZE, true);
    pdf.y += 5.0;
    pdf.text(&doc.amount_in_words, MARGIN_LEFT, FONT_SIZE, false);
    pdf.y += 7.0;

    if let Some(notes) = doc.invoice.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        pdf.text("Notes:", MARGIN_LEFT, FONT_SIZE, true);
        pdf.y += 5.0;
        pdf.text(notes, MARGIN_LEFT, SMALL_SIZE, false);
        pdf.y += 7.0;
    }

    let right = PAGE_W - MARGIN_RIGHT;
    if !doc.business.name.is_empty() {
        pdf.text_right(&format!("For {}", doc.business.name), right, FONT_SIZE, true);
    }
    pdf.y += 12.0;
    pdf.text_right("Authorised Signatory", right, SMALL_SIZE, false);
}

/// Render a GST invoice in the given theme.
pub fn render_invoice(doc: &InvoiceDocument, theme: Theme) -> Result<Vec<u8>> {
    let title = format!("Invoice {}", doc.invoice.invoice_no);
    let mut pdf = PdfWriter::new(&title, theme.style())?;
    header(&mut pdf, doc);
    parties(&mut pdf, doc);
    item_table(&mut pdf, doc);
    totals(&mut pdf, doc);
    tax_summary(&mut pdf, doc);
    footer(&mut pdf, doc);
    pdf.to_bytes()
}
