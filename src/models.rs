use chrono::NaiveDate;

/// Placeholder shown in place of empty or sentinel move names.
pub const JOURNAL_ENTRY: &str = "Journal Entry";

/// One normalized row of the receivables export. Amounts are already coerced;
/// dates are already parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub partner_id: String,
    pub move_name: String,
    pub debit: f64,
    pub credit: f64,
    pub account_code: Option<i64>,
}

impl Transaction {
    pub fn net(&self) -> f64 {
        self.debit - self.credit
    }
}

/// Intermediate representation straight out of a CSV/XLSX reader, before
/// any coercion. Every field is whatever text the source held.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub date: String,
    pub partner_id: String,
    pub move_name: String,
    pub debit: String,
    pub credit: String,
    pub account_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub description: String,
    pub debit: f64,
    pub credit: f64,
    pub running_balance: f64,
}

/// A partner's statement. Only ever built with at least one row.
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerLedger {
    pub partner_id: String,
    pub rows: Vec<LedgerRow>,
}

impl PartnerLedger {
    pub fn final_balance(&self) -> Option<f64> {
        self.rows.last().map(|r| r.running_balance)
    }

    pub fn total_debit(&self) -> f64 {
        self.rows.iter().map(|r| r.debit).sum()
    }

    pub fn total_credit(&self) -> f64 {
        self.rows.iter().map(|r| r.credit).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialBalanceRow {
    pub partner_id: String,
    pub opening: f64,
    pub period: f64,
    pub closing: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrialBalance {
    pub fiscal_year: i32,
    pub rows: Vec<TrialBalanceRow>,
}

impl TrialBalance {
    pub fn total_opening(&self) -> f64 {
        self.rows.iter().map(|r| r.opening).sum()
    }

    pub fn total_period(&self) -> f64 {
        self.rows.iter().map(|r| r.period).sum()
    }

    pub fn total_closing(&self) -> f64 {
        self.rows.iter().map(|r| r.closing).sum()
    }
}
