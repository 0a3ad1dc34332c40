use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{LedgerError, Result};
use crate::models::{RawRow, Transaction, JOURNAL_ENTRY};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Literal artifacts of the upstream export that stand for "no value".
pub fn is_sentinel(raw: &str) -> bool {
    let s = raw.trim();
    s.is_empty()
        || s.eq_ignore_ascii_case("false")
        || s.eq_ignore_ascii_case("none")
        || s.eq_ignore_ascii_case("nan")
}

/// Parse a monetary cell. Blank and sentinel cells are zero; `None` means the
/// cell held something that is not a number.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.replace([',', '"', '$'], "");
    let s = s.trim();
    if is_sentinel(s) {
        return Some(0.0);
    }
    let value = if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        -inner.trim().parse::<f64>().ok()?
    } else {
        s.parse::<f64>().ok()?
    };
    // parse::<f64> happily accepts "inf" and "NaN"
    value.is_finite().then_some(value + 0.0)
}

/// Accepts ISO dates with or without a time part, `YYYY/MM/DD`, and the
/// month-first `MM/DD/YYYY` that spreadsheet exports produce.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(any(feature = "xlsx", test))]
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    // Excel epoch is 1899-12-30 (accounting for the 1900 leap year bug)
    if !serial.is_finite() || serial.abs() > i32::MAX as f64 {
        return None;
    }
    let base = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    base.checked_add_signed(chrono::Duration::try_days(serial.trunc() as i64)?)
}

fn non_ascii() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\x00-\x7F]+").expect("valid regex"))
}

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

pub fn normalize_partner(raw: &str, strip_non_ascii: bool) -> Option<String> {
    let mut s = raw.trim().to_string();
    if strip_non_ascii {
        s = non_ascii().replace_all(&s, "").into_owned();
    }
    let s = whitespace_run().replace_all(s.trim(), " ").into_owned();
    if is_sentinel(&s) {
        None
    } else {
        Some(s)
    }
}

pub fn normalize_move_name(raw: &str) -> String {
    if is_sentinel(raw) {
        JOURNAL_ENTRY.to_string()
    } else {
        raw.trim().to_string()
    }
}

fn parse_account_code(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if let Ok(code) = s.parse::<i64>() {
        return Some(code);
    }
    // pandas round-trips integer columns with blanks as floats: "1102.0"
    let f = s.parse::<f64>().ok()?;
    (f.is_finite() && f.fract() == 0.0).then_some(f as i64)
}

// ---------------------------------------------------------------------------
// Raw table readers
// ---------------------------------------------------------------------------

/// A header row plus string cells, as read from CSV or a worksheet.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Case-insensitive, whitespace-tolerant header lookup.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Csv,
    Workbook,
}

impl InputFormat {
    /// Guess from a path or URL; anything unrecognised is CSV.
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or("");
        if [".xlsx", ".xls", ".ods"].iter().any(|ext| path.ends_with(ext)) {
            Self::Workbook
        } else {
            Self::Csv
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Workbook => "xlsx",
        }
    }
}

pub fn read_table(bytes: &[u8], format: InputFormat) -> Result<Table> {
    match format {
        InputFormat::Csv => read_csv_table(bytes),
        #[cfg(feature = "xlsx")]
        InputFormat::Workbook => read_workbook_table(bytes),
        #[cfg(not(feature = "xlsx"))]
        InputFormat::Workbook => Err(LedgerError::Workbook(
            "this build has no spreadsheet input support (enable the `xlsx` feature)".into(),
        )),
    }
}

fn read_csv_table(bytes: &[u8]) -> Result<Table> {
    // Strip a UTF-8 BOM so the first header still matches
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let headers = rdr.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table { headers, rows })
}

#[cfg(feature = "xlsx")]
fn read_workbook_table(bytes: &[u8]) -> Result<Table> {
    use calamine::{Data, Reader};

    let mut workbook = calamine::open_workbook_auto_from_rs(std::io::Cursor::new(bytes))
        .map_err(|e| LedgerError::Workbook(format!("Failed to open workbook: {e}")))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| LedgerError::Workbook("Workbook has no sheets".into()))?
        .map_err(|e| LedgerError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::default());
    };
    let headers: Vec<String> = header_row.iter().map(|c| c.to_string().trim().to_string()).collect();
    let date_col = headers.iter().position(|h| h.eq_ignore_ascii_case("date"));

    let cell_text = |idx: usize, cell: &Data| -> String {
        match cell {
            Data::Empty => String::new(),
            Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            Data::Float(f) if Some(idx) == date_col => excel_serial_to_date(*f)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            Data::Int(i) if Some(idx) == date_col => excel_serial_to_date(*i as f64)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            other => other.to_string(),
        }
    };

    let table_rows = rows
        .map(|row| row.iter().enumerate().map(|(i, c)| cell_text(i, c)).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .collect();
    Ok(Table {
        headers,
        rows: table_rows,
    })
}

/// Map a table onto the ledger export's columns. `date` and `partner_id` are
/// required; the rest default to blank.
pub fn raw_rows(table: &Table) -> Result<Vec<RawRow>> {
    let date = table
        .column("date")
        .ok_or_else(|| LedgerError::MissingColumn("date".into()))?;
    let partner = table
        .column("partner_id")
        .ok_or_else(|| LedgerError::MissingColumn("partner_id".into()))?;
    let move_name = table.column("move_name");
    let debit = table.column("debit");
    let credit = table.column("credit");
    let account_code = table.column("account_code");

    let cell = |row: &[String], idx: Option<usize>| -> String {
        idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
    };

    Ok(table
        .rows
        .iter()
        .map(|row| RawRow {
            date: cell(row, Some(date)),
            partner_id: cell(row, Some(partner)),
            move_name: cell(row, move_name),
            debit: cell(row, debit),
            credit: cell(row, credit),
            account_code: account_code.map(|i| cell(row, Some(i))),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    pub account_codes: Vec<i64>,
    pub strip_non_ascii_partners: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub rows_read: usize,
    pub dropped_dates: usize,
    pub dropped_partners: usize,
    pub excluded_accounts: usize,
    pub coerced_amounts: usize,
}

impl IngestReport {
    pub fn kept(&self) -> usize {
        self.rows_read - self.dropped_dates - self.dropped_partners - self.excluded_accounts
    }
}

/// The single place where raw text becomes typed transactions. Rows keep
/// their ingestion order.
pub fn normalize(rows: &[RawRow], opts: &IngestOptions) -> (Vec<Transaction>, IngestReport) {
    let mut report = IngestReport {
        rows_read: rows.len(),
        ..IngestReport::default()
    };
    let filter_accounts = !opts.account_codes.is_empty();
    if filter_accounts && rows.first().is_some_and(|r| r.account_code.is_none()) {
        tracing::warn!("account code allow-list is set but the source has no account_code column");
    }

    let mut transactions = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(date) = parse_date(&row.date) else {
            report.dropped_dates += 1;
            continue;
        };
        let Some(partner_id) = normalize_partner(&row.partner_id, opts.strip_non_ascii_partners)
        else {
            report.dropped_partners += 1;
            continue;
        };
        let account_code = row.account_code.as_deref().and_then(parse_account_code);
        if filter_accounts && row.account_code.is_some() {
            let allowed = account_code.is_some_and(|c| opts.account_codes.contains(&c));
            if !allowed {
                report.excluded_accounts += 1;
                continue;
            }
        }
        let mut coerce = |raw: &str| {
            parse_amount(raw).unwrap_or_else(|| {
                report.coerced_amounts += 1;
                0.0
            })
        };
        let debit = coerce(&row.debit);
        let credit = coerce(&row.credit);

        transactions.push(Transaction {
            date,
            partner_id,
            move_name: normalize_move_name(&row.move_name),
            debit,
            credit,
            account_code,
        });
    }

    if report.dropped_dates > 0 {
        tracing::warn!(count = report.dropped_dates, "dropped rows with unparseable dates");
    }
    if report.coerced_amounts > 0 {
        tracing::warn!(count = report.coerced_amounts, "coerced non-numeric amounts to zero");
    }
    tracing::info!(
        read = report.rows_read,
        kept = transactions.len(),
        dropped_partners = report.dropped_partners,
        excluded_accounts = report.excluded_accounts,
        "ingested transactions"
    );
    (transactions, report)
}

/// Read and normalize a ledger export in one go.
pub fn ingest(
    bytes: &[u8],
    format: InputFormat,
    opts: &IngestOptions,
) -> Result<(Vec<Transaction>, IngestReport)> {
    let table = read_table(bytes, format)?;
    let rows = raw_rows(&table)?;
    Ok(normalize(&rows, opts))
}
