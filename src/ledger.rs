use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use chrono::{Datelike, NaiveDate};

use crate::error::{LedgerError, Result};
use crate::models::{LedgerRow, PartnerLedger, Transaction, TrialBalance, TrialBalanceRow};

// ---------------------------------------------------------------------------
// Date range / fiscal year
// ---------------------------------------------------------------------------

/// Inclusive on both ends. A missing bound extends to the edge of the data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(LedgerError::InvalidRange {
                    from: f.to_string(),
                    to: t.to_string(),
                });
            }
        }
        Ok(Self { from, to })
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |f| date >= f) && self.to.map_or(true, |t| date <= t)
    }

    /// Concrete bounds, filling gaps from the span of the data.
    pub fn resolve(&self, span: Option<(NaiveDate, NaiveDate)>) -> Option<(NaiveDate, NaiveDate)> {
        let from = self.from.or(span.map(|s| s.0))?;
        let to = self.to.or(span.map(|s| s.1))?;
        Some((from, to))
    }
}

pub fn date_span<I>(dates: I) -> Option<(NaiveDate, NaiveDate)>
where
    I: IntoIterator<Item = NaiveDate>,
{
    dates.into_iter().fold(None, |acc, d| match acc {
        None => Some((d, d)),
        Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
    })
}

/// Twelve months starting on the first day of `start_month` in `year`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiscalYear {
    pub year: i32,
    start: NaiveDate,
    end: NaiveDate,
}

impl FiscalYear {
    pub fn new(year: i32, start_month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, start_month, 1);
        let end = year
            .checked_add(1)
            .and_then(|next| NaiveDate::from_ymd_opt(next, start_month, 1));
        match (start, end) {
            (Some(start), Some(end)) => Ok(Self { year, start, end }),
            _ => Err(LedgerError::Other(format!(
                "Fiscal year {year} starting in month {start_month} is out of range"
            ))),
        }
    }

    /// The fiscal year `date` falls in, named by the year it starts.
    pub fn containing(date: NaiveDate, start_month: u32) -> Result<Self> {
        let year = if date.month() >= start_month {
            date.year()
        } else {
            date.year() - 1
        };
        Self::new(year, start_month)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn last_day(&self) -> NaiveDate {
        self.end.pred_opt().unwrap_or(self.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn label(&self) -> String {
        if self.start.month() == 1 {
            format!("FY {}", self.year)
        } else {
            format!("FY {} ({} to {})", self.year, self.start, self.last_day())
        }
    }
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Canonical identity of a posted line: (move_name, partner_id, debit, credit).
/// The date is not part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DedupKey<'a> {
    move_name: &'a str,
    partner_id: &'a str,
    debit: u64,
    credit: u64,
}

impl<'a> DedupKey<'a> {
    fn of(t: &'a Transaction) -> Self {
        Self {
            move_name: &t.move_name,
            partner_id: &t.partner_id,
            // +0.0 folds -0.0 into 0.0 so both hash alike
            debit: (t.debit + 0.0).to_bits(),
            credit: (t.credit + 0.0).to_bits(),
        }
    }
}

/// Collapse rows sharing the canonical key, keeping the first occurrence.
pub fn dedup<'a, I>(transactions: I) -> Vec<&'a Transaction>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut seen = HashSet::new();
    transactions
        .into_iter()
        .filter(|t| seen.insert(DedupKey::of(*t)))
        .collect()
}

// ---------------------------------------------------------------------------
// Partner ledger
// ---------------------------------------------------------------------------

/// Stable: same-day rows keep their ingestion order.
pub fn sort_chronologically(rows: &mut [&Transaction]) {
    rows.sort_by_key(|t| t.date);
}

fn running_balance(sorted: &[&Transaction]) -> Vec<LedgerRow> {
    let mut balance = 0.0f64;
    sorted
        .iter()
        .map(|t| {
            balance += t.net();
            LedgerRow {
                date: t.date,
                description: t.move_name.clone(),
                debit: t.debit,
                credit: t.credit,
                running_balance: balance,
            }
        })
        .collect()
}

/// Per-partner statements for the selected partners within `range`.
///
/// Partners with nothing left after filtering and deduplication are absent
/// from the result rather than present with a zero balance.
pub fn build_partner_ledger(
    transactions: &[Transaction],
    partner_ids: &[String],
    range: DateRange,
) -> BTreeMap<String, PartnerLedger> {
    let selected: HashSet<&str> = partner_ids.iter().map(String::as_str).collect();
    if selected.is_empty() {
        return BTreeMap::new();
    }

    let in_scope = transactions
        .iter()
        .filter(|t| selected.contains(t.partner_id.as_str()) && range.contains(t.date));

    let mut groups: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for t in dedup(in_scope) {
        groups.entry(t.partner_id.as_str()).or_default().push(t);
    }

    let ledgers: BTreeMap<String, PartnerLedger> = groups
        .into_iter()
        .map(|(partner_id, mut group)| {
            sort_chronologically(&mut group);
            let ledger = PartnerLedger {
                partner_id: partner_id.to_string(),
                rows: running_balance(&group),
            };
            (partner_id.to_string(), ledger)
        })
        .collect();

    let missing = selected.len() - ledgers.len();
    if missing > 0 {
        tracing::debug!(missing, "selected partners without transactions in range");
    }
    ledgers
}

// ---------------------------------------------------------------------------
// Trial balance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrialBalanceSort {
    /// Largest closing balance first.
    #[default]
    ClosingDesc,
    Partner,
    /// First appearance in the source.
    Source,
}

impl TrialBalanceSort {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "closing" => Some(Self::ClosingDesc),
            "partner" => Some(Self::Partner),
            "source" => Some(Self::Source),
            _ => None,
        }
    }
}

pub fn build_trial_balance(transactions: &[Transaction], fiscal_year: FiscalYear) -> TrialBalance {
    build_trial_balance_sorted(transactions, fiscal_year, TrialBalanceSort::default())
}

/// Opening / period / closing per partner. Every partner known to the data
/// gets a row, even with no activity up to the end of the year.
pub fn build_trial_balance_sorted(
    transactions: &[Transaction],
    fiscal_year: FiscalYear,
    sort: TrialBalanceSort,
) -> TrialBalance {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut rows: Vec<TrialBalanceRow> = Vec::new();

    for t in dedup(transactions) {
        let i = *index.entry(t.partner_id.as_str()).or_insert_with(|| {
            rows.push(TrialBalanceRow {
                partner_id: t.partner_id.clone(),
                opening: 0.0,
                period: 0.0,
                closing: 0.0,
            });
            rows.len() - 1
        });
        if t.date < fiscal_year.start() {
            rows[i].opening += t.net();
        } else if fiscal_year.contains(t.date) {
            rows[i].period += t.net();
        }
    }

    for row in &mut rows {
        row.closing = row.opening + row.period;
    }

    match sort {
        TrialBalanceSort::ClosingDesc => rows.sort_by(|a, b| b.closing.total_cmp(&a.closing)),
        TrialBalanceSort::Partner => rows.sort_by(|a, b| a.partner_id.cmp(&b.partner_id)),
        TrialBalanceSort::Source => {}
    }

    tracing::debug!(
        fiscal_year = fiscal_year.year,
        partners = rows.len(),
        "built trial balance"
    );
    TrialBalance {
        fiscal_year: fiscal_year.year,
        rows,
    }
}

// ---------------------------------------------------------------------------
// Partner directory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PartnerSummary {
    pub partner_id: String,
    pub count: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub balance: f64,
    /// Distinct account codes the partner posts to, ascending.
    pub account_codes: BTreeSet<i64>,
}

/// One line per partner over the whole (deduplicated) data set, by id.
pub fn partner_summaries(transactions: &[Transaction]) -> Vec<PartnerSummary> {
    let mut by_partner: BTreeMap<&str, PartnerSummary> = BTreeMap::new();
    for t in dedup(transactions) {
        by_partner
            .entry(t.partner_id.as_str())
            .and_modify(|s| {
                s.count += 1;
                s.first_date = s.first_date.min(t.date);
                s.last_date = s.last_date.max(t.date);
                s.balance += t.net();
                s.account_codes.extend(t.account_code);
            })
            .or_insert_with(|| PartnerSummary {
                partner_id: t.partner_id.clone(),
                count: 1,
                first_date: t.date,
                last_date: t.date,
                balance: t.net(),
                account_codes: t.account_code.into_iter().collect(),
            });
    }
    by_partner.into_values().collect()
}

pub fn partner_ids(transactions: &[Transaction]) -> Vec<String> {
    let ids: BTreeSet<&str> =
        transactions.iter().map(|t| t.partner_id.as_str()).collect();
    ids.into_iter().map(str::to_string).collect()
}
