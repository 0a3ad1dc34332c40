//! Raw material daily usage: a pass-through table whose only typed column is
//! the date.

use chrono::NaiveDate;

use crate::error::{LedgerError, Result};
use crate::importer::{parse_date, Table};
use crate::ledger::{date_span, DateRange};

#[derive(Debug, Clone, PartialEq)]
pub struct UsageRow {
    pub date: NaiveDate,
    /// All cells in header order; the date cell is rewritten as YYYY-MM-DD.
    pub cells: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageTable {
    pub headers: Vec<String>,
    pub rows: Vec<UsageRow>,
    pub dropped_dates: usize,
}

impl UsageTable {
    pub fn from_table(table: Table) -> Result<Self> {
        let date_col = table
            .column("date")
            .ok_or_else(|| LedgerError::MissingColumn("date".into()))?;

        let mut rows = Vec::with_capacity(table.rows.len());
        let mut dropped_dates = 0;
        for mut cells in table.rows {
            let Some(date) = cells.get(date_col).and_then(|c| parse_date(c)) else {
                dropped_dates += 1;
                continue;
            };
            cells.resize(table.headers.len().max(cells.len()), String::new());
            cells[date_col] = date.format("%Y-%m-%d").to_string();
            rows.push(UsageRow { date, cells });
        }
        if dropped_dates > 0 {
            tracing::warn!(count = dropped_dates, "dropped usage rows with unparseable dates");
        }
        Ok(Self {
            headers: table.headers,
            rows,
            dropped_dates,
        })
    }

    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        date_span(self.rows.iter().map(|r| r.date))
    }

    /// Rows inside `range`, in source order.
    pub fn filter(&self, range: DateRange) -> UsageTable {
        UsageTable {
            headers: self.headers.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| range.contains(r.date))
                .cloned()
                .collect(),
            dropped_dates: self.dropped_dates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::{read_table, InputFormat};

    const USAGE_CSV: &str = "material,date,qty_kg\n\
                             PET,2024-03-01 00:00:00,120\n\
                             HDPE,garbage,5\n\
                             PET,2024-03-05,80\n\
                             LDPE,2024-03-09,15\n";

    fn usage() -> UsageTable {
        UsageTable::from_table(read_table(USAGE_CSV.as_bytes(), InputFormat::Csv).unwrap()).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_bad_dates_dropped_and_dates_normalized() {
        let t = usage();
        assert_eq!(t.rows.len(), 3);
        assert_eq!(t.dropped_dates, 1);
        assert_eq!(t.rows[0].cells, vec!["PET", "2024-03-01", "120"]);
    }

    #[test]
    fn test_span_and_filter() {
        let t = usage();
        assert_eq!(t.span(), Some((d(2024, 3, 1), d(2024, 3, 9))));
        let range = DateRange::new(Some(d(2024, 3, 2)), Some(d(2024, 3, 9))).unwrap();
        let filtered = t.filter(range);
        assert_eq!(filtered.rows.len(), 2);
        assert_eq!(filtered.rows[0].cells[0], "PET");
        assert_eq!(t.rows.len(), 3);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let table = read_table(b"date,a,b\n2024-01-01\n", InputFormat::Csv).unwrap();
        let t = UsageTable::from_table(table).unwrap();
        assert_eq!(t.rows[0].cells, vec!["2024-01-01", "", ""]);
    }

    #[test]
    fn test_missing_date_column() {
        let table = read_table(b"material,qty\nPET,1\n", InputFormat::Csv).unwrap();
        assert!(matches!(
            UsageTable::from_table(table),
            Err(LedgerError::MissingColumn(_))
        ));
    }
}
