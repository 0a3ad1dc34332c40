use std::io::BufWriter;

use printpdf::*;

use crate::error::{LedgerError, Result};
use crate::fmt::{amount, money};
use crate::models::{PartnerLedger, TrialBalance};
use crate::settings::CompanyHeader;

// A4 dimensions (mm)
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 15.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 15.0;
const ROW_H: f32 = 6.0;
const FONT_SIZE: f32 = 9.0;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 12.0;
const MOVE_NAME_MAX: usize = 40;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.18
}

/// The builtin Helvetica only covers Latin text; anything else is dropped.
fn pdf_text(s: &str) -> String {
    let cleaned: String = s.chars().filter(|c| c.is_ascii() && !c.is_ascii_control()).collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

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
    y: f32,
    fresh_page: bool,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| LedgerError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| LedgerError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: MARGIN_TOP,
            fresh_page: true,
        })
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
        self.fresh_page = true;
    }

    /// Start a section on its own page, reusing the first blank page.
    fn start_section(&mut self) {
        if !self.fresh_page {
            self.new_page();
        }
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text(&mut self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold {
            self.font_bold.clone()
        } else {
            self.font.clone()
        };
        let layer = self
            .doc
            .get_page(self.current_page)
            .get_layer(self.current_layer);
        layer.use_text(pdf_text(s), size, Mm(x), Mm(self.pdf_y()), &font);
        self.fresh_page = false;
    }

    fn centered(&mut self, s: &str, size: f32, bold: bool) {
        let width = approx_text_width(s, size);
        self.text(s, (PAGE_W - width) / 2.0, size, bold);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self
            .doc
            .get_page(self.current_page)
            .get_layer(self.current_layer);
        layer.set_outline_thickness(0.5);
        let line = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        };
        layer.add_line(line);
    }

    fn letterhead(&mut self, company: &CompanyHeader) {
        if !company.name.is_empty() {
            self.text(&company.name, MARGIN_LEFT, SUBTITLE_SIZE, true);
            self.y += 6.0;
        }
        for line in &company.address_lines {
            self.text(line, MARGIN_LEFT, FONT_SIZE, false);
            self.y += 5.0;
        }
        if !company.vat_number.is_empty() {
            let vat = format!("VAT Number: {}", company.vat_number);
            self.text(&vat, MARGIN_LEFT, FONT_SIZE, false);
            self.y += 5.0;
        }
        self.y += 5.0;
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.ensure_space(ROW_H * 2.0);
        let mut x = MARGIN_LEFT;
        for (i, col) in cols.iter().enumerate() {
            if i < headers.len() {
                match col.align {
                    Align::Left => self.text(headers[i], x, FONT_SIZE, true),
                    Align::Right => {
                        let tw = approx_text_width(headers[i], FONT_SIZE);
                        self.text(headers[i], x + col.width - tw, FONT_SIZE, true);
                    }
                }
            }
            x += col.width;
        }
        self.y += 2.0;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += ROW_H - 2.0;
    }

    fn table_row(&mut self, cols: &[Col], values: &[&str], bold: bool) {
        self.ensure_space(ROW_H);
        let mut x = MARGIN_LEFT;
        for (i, col) in cols.iter().enumerate() {
            if i < values.len() {
                match col.align {
                    Align::Left => self.text(values[i], x, FONT_SIZE, bold),
                    Align::Right => {
                        let tw = approx_text_width(values[i], FONT_SIZE);
                        self.text(values[i], x + col.width - tw, FONT_SIZE, bold);
                    }
                }
            }
            x += col.width;
        }
        self.y += ROW_H;
    }

    /// A data row; on overflow the header is repeated at the top of the new page.
    fn body_row(&mut self, cols: &[Col], headers: &[&str], values: &[&str]) {
        if self.y + ROW_H > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
            self.table_header(cols, headers);
        }
        self.table_row(cols, values, false);
    }

    fn separator(&mut self) {
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 4.0;
    }

    fn footer_timestamp(&mut self) {
        let ts = chrono::Local::now()
            .format("Generated %Y-%m-%d %H:%M")
            .to_string();
        self.ensure_space(ROW_H * 2.0);
        self.y += ROW_H;
        self.text(&ts, MARGIN_LEFT, 7.0, false);
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| LedgerError::Pdf(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| LedgerError::Pdf(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Render functions
// ---------------------------------------------------------------------------

/// One section per partner, each starting on a new page.
pub fn render_partner_ledgers(
    ledgers: &[&PartnerLedger],
    company: &CompanyHeader,
    currency: &str,
    date_range: &str,
) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Partner Ledger")?;

    let cols = &[
        Col { width: 28.0, align: Align::Left },
        Col { width: 70.0, align: Align::Left },
        Col { width: 27.0, align: Align::Right },
        Col { width: 27.0, align: Align::Right },
        Col { width: 28.0, align: Align::Right },
    ];
    let headers = &["Date", "Move Name", "Debit", "Credit", "Balance"];

    if ledgers.is_empty() {
        pdf.letterhead(company);
        pdf.centered("PARTNER LEDGER", TITLE_SIZE, true);
        pdf.y += 10.0;
        pdf.text("No transactions for the selected partners.", MARGIN_LEFT, FONT_SIZE, false);
        return pdf.to_bytes();
    }

    for ledger in ledgers {
        // Ledgers are never built empty
        let Some(final_balance) = ledger.final_balance() else {
            continue;
        };
        pdf.start_section();
        pdf.letterhead(company);
        pdf.centered("PARTNER LEDGER", TITLE_SIZE, true);
        pdf.y += 10.0;
        let customer = format!("Customer: {}", ledger.partner_id);
        pdf.text(&customer, MARGIN_LEFT, SUBTITLE_SIZE, true);
        pdf.y += 6.0;
        pdf.text(date_range, MARGIN_LEFT, FONT_SIZE, false);
        pdf.y += 6.0;
        let bal = format!("Final Balance: {}", money(final_balance, currency));
        pdf.text(&bal, MARGIN_LEFT, SUBTITLE_SIZE, true);
        pdf.y += 10.0;

        pdf.table_header(cols, headers);
        for row in &ledger.rows {
            let date = row.date.format("%Y-%m-%d").to_string();
            let desc = truncate(&pdf_text(&row.description), MOVE_NAME_MAX);
            let debit = amount(row.debit);
            let credit = amount(row.credit);
            let balance = amount(row.running_balance);
            let values: [&str; 5] = [&date, &desc, &debit, &credit, &balance];
            pdf.body_row(cols, headers, &values);
        }
        pdf.separator();
        let debit = amount(ledger.total_debit());
        let credit = amount(ledger.total_credit());
        let balance = amount(final_balance);
        pdf.table_row(cols, &["", "Total", &debit, &credit, &balance], true);
        pdf.footer_timestamp();
    }

    pdf.to_bytes()
}

pub fn render_trial_balance(
    tb: &TrialBalance,
    company: &CompanyHeader,
    currency: &str,
    period_label: &str,
) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new("Trial Balance")?;
    pdf.letterhead(company);
    pdf.centered("TRIAL BALANCE", TITLE_SIZE, true);
    pdf.y += 10.0;
    pdf.text(period_label, MARGIN_LEFT, SUBTITLE_SIZE, true);
    pdf.y += 6.0;
    if !currency.is_empty() {
        pdf.text(&format!("Currency: {currency}"), MARGIN_LEFT, FONT_SIZE, false);
        pdf.y += 8.0;
    }

    let cols = &[
        Col { width: 75.0, align: Align::Left },
        Col { width: 35.0, align: Align::Right },
        Col { width: 35.0, align: Align::Right },
        Col { width: 35.0, align: Align::Right },
    ];
    let headers = &["Partner", "Opening", "Period", "Closing"];
    pdf.table_header(cols, headers);

    for row in &tb.rows {
        let partner = truncate(&pdf_text(&row.partner_id), MOVE_NAME_MAX);
        let opening = amount(row.opening);
        let period = amount(row.period);
        let closing = amount(row.closing);
        let values: [&str; 4] = [&partner, &opening, &period, &closing];
        pdf.body_row(cols, headers, &values);
    }

    pdf.separator();
    let opening = amount(tb.total_opening());
    let period = amount(tb.total_period());
    let closing = amount(tb.total_closing());
    pdf.table_row(cols, &["Total", &opening, &period, &closing], true);
    pdf.footer_timestamp();

    pdf.to_bytes()
}
