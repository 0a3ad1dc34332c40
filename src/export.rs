use chrono::NaiveDate;
use rust_xlsxwriter::{Format, Workbook};

use crate::error::Result;
use crate::models::{PartnerLedger, TrialBalance};
use crate::usage::UsageTable;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

impl Cell {
    fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    fn as_csv_field(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            // Two decimals like the on-screen tables, without separators
            Self::Number(n) => format!("{n:.2}"),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// A format-agnostic worksheet: one header row plus data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sheet builders
// ---------------------------------------------------------------------------

pub fn ledger_sheet(ledgers: &[&PartnerLedger]) -> Sheet {
    let mut sheet = Sheet::new(
        "PartnerLedger",
        &["Partner", "Date", "Move Name", "Debit", "Credit", "Balance"],
    );
    let (mut debit, mut credit) = (0.0f64, 0.0f64);
    for ledger in ledgers {
        for row in &ledger.rows {
            sheet.rows.push(vec![
                Cell::text(&ledger.partner_id),
                Cell::Date(row.date),
                Cell::text(&row.description),
                Cell::Number(row.debit),
                Cell::Number(row.credit),
                Cell::Number(row.running_balance),
            ]);
        }
        debit += ledger.total_debit();
        credit += ledger.total_credit();
    }
    sheet.rows.push(vec![
        Cell::text("Total"),
        Cell::text(""),
        Cell::text(""),
        Cell::Number(debit),
        Cell::Number(credit),
        Cell::Number(debit - credit),
    ]);
    sheet
}

pub fn trial_balance_sheet(tb: &TrialBalance) -> Sheet {
    let mut sheet = Sheet::new(
        &format!("TrialBalance{}", tb.fiscal_year),
        &["Partner", "Opening", "Period", "Closing"],
    );
    for row in &tb.rows {
        sheet.rows.push(vec![
            Cell::text(&row.partner_id),
            Cell::Number(row.opening),
            Cell::Number(row.period),
            Cell::Number(row.closing),
        ]);
    }
    sheet.rows.push(vec![
        Cell::text("Total"),
        Cell::Number(tb.total_opening()),
        Cell::Number(tb.total_period()),
        Cell::Number(tb.total_closing()),
    ]);
    sheet
}

pub fn usage_sheet(table: &UsageTable) -> Sheet {
    let headers: Vec<&str> = table.headers.iter().map(String::as_str).collect();
    let mut sheet = Sheet::new("RawMaterialDaily", &headers);
    sheet.rows = table
        .rows
        .iter()
        .map(|r| r.cells.iter().map(Cell::text).collect())
        .collect();
    sheet
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub fn to_csv(sheet: &Sheet) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&sheet.headers)?;
    for row in &sheet.rows {
        wtr.write_record(row.iter().map(Cell::as_csv_field))?;
    }
    wtr.into_inner()
        .map_err(|e| crate::error::LedgerError::Io(e.into_error()))
}

pub fn to_xlsx(sheet: &Sheet) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let number_format = Format::new().set_num_format("#,##0.00");

    let worksheet = workbook.add_worksheet();
    // Excel sheet names are capped at 31 characters
    let name: String = sheet.name.chars().take(31).collect();
    worksheet.set_name(&name)?;

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &header_format)?;
        worksheet.set_column_width(col as u16, (header.len() as f64).max(14.0))?;
    }
    for (i, row) in sheet.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let c = col as u16;
            match cell {
                Cell::Text(s) => worksheet.write_string(r, c, s)?,
                Cell::Number(n) => worksheet.write_number_with_format(r, c, *n, &number_format)?,
                Cell::Date(d) => worksheet.write_string(r, c, d.format("%Y-%m-%d").to_string())?,
            };
        }
    }
    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LedgerRow, TrialBalanceRow};

    fn ledger() -> PartnerLedger {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        PartnerLedger {
            partner_id: "A".to_string(),
            rows: vec![
                LedgerRow {
                    date: d(1),
                    description: "INV1".to_string(),
                    debit: 100.0,
                    credit: 0.0,
                    running_balance: 100.0,
                },
                LedgerRow {
                    date: d(5),
                    description: "PAY, partial".to_string(),
                    debit: 0.0,
                    credit: 40.0,
                    running_balance: 60.0,
                },
            ],
        }
    }

    #[test]
    fn test_ledger_sheet_has_totals_row() {
        let l = ledger();
        let sheet = ledger_sheet(&[&l]);
        assert_eq!(sheet.rows.len(), 3);
        let total = sheet.rows.last().unwrap();
        assert_eq!(total[0], Cell::Text("Total".into()));
        assert_eq!(total[5], Cell::Number(60.0));
    }

    #[test]
    fn test_ledger_csv_quotes_and_formats() {
        let l = ledger();
        let bytes = to_csv(&ledger_sheet(&[&l])).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Partner,Date,Move Name,Debit,Credit,Balance");
        assert_eq!(lines[2], "A,2024-01-05,\"PAY, partial\",0.00,40.00,60.00");
        assert_eq!(lines[3], "Total,,,100.00,40.00,60.00");
    }

    #[test]
    fn test_trial_balance_sheet() {
        let tb = TrialBalance {
            fiscal_year: 2024,
            rows: vec![
                TrialBalanceRow {
                    partner_id: "B".into(),
                    opening: 30.0,
                    period: 20.0,
                    closing: 50.0,
                },
                TrialBalanceRow {
                    partner_id: "C".into(),
                    opening: 10.0,
                    period: 0.0,
                    closing: 10.0,
                },
            ],
        };
        let sheet = trial_balance_sheet(&tb);
        assert_eq!(sheet.name, "TrialBalance2024");
        assert_eq!(
            sheet.rows[2],
            vec![
                Cell::Text("Total".into()),
                Cell::Number(40.0),
                Cell::Number(20.0),
                Cell::Number(60.0)
            ]
        );
    }

    #[test]
    fn test_xlsx_is_a_zip_container() {
        let l = ledger();
        let bytes = to_xlsx(&ledger_sheet(&[&l])).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_empty_ledger_sheet_still_writes() {
        let sheet = ledger_sheet(&[]);
        assert_eq!(sheet.rows.len(), 1);
        assert!(to_xlsx(&sheet).unwrap().starts_with(b"PK"));
    }
}
