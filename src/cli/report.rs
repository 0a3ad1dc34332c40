use std::collections::HashSet;

use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use crate::cli::{Context, LedgerArgs, RangeArgs, ReportCommands, TrialBalanceArgs};
use crate::error::{LedgerError, Result};
use crate::fmt::{amount, money};
use crate::ledger::{self, date_span, DateRange, FiscalYear, PartnerSummary};
use crate::models::{PartnerLedger, Transaction, TrialBalance};
use crate::source::Snapshot;
use crate::usage::UsageTable;

pub fn dispatch(ctx: &Context, cmd: ReportCommands) -> Result<()> {
    let out = match cmd {
        ReportCommands::Partners => partners(ctx)?,
        ReportCommands::Ledger(args) => partner_ledger(ctx, &args)?,
        ReportCommands::TrialBalance(args) => trial_balance(ctx, &args)?,
        ReportCommands::Usage(range) => usage(ctx, &range)?,
    };
    println!("{out}");
    Ok(())
}

/// Prepend company name as a header line if non-empty.
fn with_header(company_name: &str, body: String) -> String {
    if company_name.is_empty() {
        body
    } else {
        format!("{company_name}\n{body}")
    }
}

fn num(val: f64) -> Cell {
    Cell::new(amount(val)).set_alignment(CellAlignment::Right)
}

fn balance_cell(val: f64) -> Cell {
    let text = amount(val);
    let text = if val < 0.0 {
        text.red().to_string()
    } else {
        text
    };
    Cell::new(text).set_alignment(CellAlignment::Right)
}

// ---------------------------------------------------------------------------
// Shared selection helpers (also used by export)
// ---------------------------------------------------------------------------

/// Partner ids named on the command line, first mention wins, or every
/// partner with `--all`.
pub(crate) fn selected_partners(transactions: &[Transaction], args: &LedgerArgs) -> Result<Vec<String>> {
    if args.all {
        return Ok(ledger::partner_ids(transactions));
    }
    let mut seen = HashSet::new();
    let ids: Vec<String> = args
        .partners
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty() && seen.insert(p.clone()))
        .collect();
    if ids.is_empty() {
        return Err(LedgerError::Other(
            "No partners selected (pass --partner <ID> or --all)".into(),
        ));
    }
    Ok(ids)
}

/// The requested fiscal year, or the one holding the latest transaction.
pub(crate) fn fiscal_year(ctx: &Context, snapshot: &Snapshot, year: Option<i32>) -> Result<FiscalYear> {
    let start_month = ctx.settings.fiscal_start_month();
    match year {
        Some(y) => FiscalYear::new(y, start_month),
        None => {
            let latest = snapshot
                .transactions
                .iter()
                .map(|t| t.date)
                .max()
                .unwrap_or_else(|| chrono::Local::now().date_naive());
            FiscalYear::containing(latest, start_month)
        }
    }
}

pub(crate) fn range_label(range: DateRange, span: Option<(chrono::NaiveDate, chrono::NaiveDate)>) -> String {
    match range.resolve(span) {
        Some((from, to)) => format!("{from} to {to}"),
        None => "No dates".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Data-fetching + formatting wrappers (used by dispatch)
// ---------------------------------------------------------------------------

pub fn partners(ctx: &Context) -> Result<String> {
    let snapshot = ctx.ledger()?;
    let rows = ledger::partner_summaries(&snapshot.transactions);
    let body = format!(
        "{}\n{}",
        format_partners(&rows, &ctx.settings.currency),
        format_snapshot(&snapshot)
    );
    Ok(with_header(&ctx.settings.company.name, body))
}

pub fn partner_ledger(ctx: &Context, args: &LedgerArgs) -> Result<String> {
    let range = args.range.range()?;
    let snapshot = ctx.ledger()?;
    let ids = selected_partners(&snapshot.transactions, args)?;
    let ledgers = ledger::build_partner_ledger(&snapshot.transactions, &ids, range);

    let span = date_span(snapshot.transactions.iter().map(|t| t.date));
    let mut out = format!("Partner Ledger: {}\n", range_label(range, span));
    let mut shown: Vec<&PartnerLedger> = Vec::new();
    for id in &ids {
        match ledgers.get(id) {
            Some(l) => shown.push(l),
            None => out.push_str(&format!("No transactions for {id} in range.\n")),
        }
    }
    out.push_str(&format_ledgers(&shown, &ctx.settings.currency));
    Ok(with_header(&ctx.settings.company.name, out))
}

pub fn trial_balance(ctx: &Context, args: &TrialBalanceArgs) -> Result<String> {
    let snapshot = ctx.ledger()?;
    let fy = fiscal_year(ctx, &snapshot, args.year)?;
    let tb = ledger::build_trial_balance_sorted(&snapshot.transactions, fy, args.sort);
    Ok(with_header(
        &ctx.settings.company.name,
        format_trial_balance(&tb, &fy.label()),
    ))
}

pub fn usage(ctx: &Context, range: &RangeArgs) -> Result<String> {
    let range = range.range()?;
    let table = ctx.usage()?;
    let label = range_label(range, table.span());
    let filtered = table.filter(range);
    Ok(format!("Raw Material Usage: {label}\n{}", format_usage(&filtered)))
}

// ---------------------------------------------------------------------------
// Pure formatting functions (report data → String)
// ---------------------------------------------------------------------------

pub fn format_partners(rows: &[PartnerSummary], currency: &str) -> String {
    if rows.is_empty() {
        return "No partners found.".to_string();
    }
    let mut table = Table::new();
    table.set_header(vec!["Partner", "Entries", "First", "Last", "Accounts", "Balance"]);
    for r in rows {
        let accounts: Vec<String> = r.account_codes.iter().map(i64::to_string).collect();
        table.add_row(vec![
            Cell::new(&r.partner_id),
            Cell::new(r.count),
            Cell::new(r.first_date),
            Cell::new(r.last_date),
            Cell::new(accounts.join(", ")),
            balance_cell(r.balance),
        ]);
    }
    let total: f64 = rows.iter().map(|r| r.balance).sum();
    format!(
        "Partners ({}, total balance: {})\n{table}",
        rows.len(),
        money(total, currency)
    )
}

/// Provenance and ingestion counts of the loaded data.
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let r = &snapshot.report;
    let mut out = format!(
        "Source: {} (sha256 {}, fetched {})\nRows: {} read, {} kept",
        snapshot.source,
        &snapshot.checksum[..snapshot.checksum.len().min(12)],
        snapshot.fetched_at.format("%Y-%m-%d %H:%M"),
        r.rows_read,
        r.kept(),
    );
    let skipped = [
        (r.dropped_dates, "bad dates"),
        (r.dropped_partners, "no partner"),
        (r.excluded_accounts, "excluded accounts"),
    ];
    for (count, why) in skipped {
        if count > 0 {
            out.push_str(&format!(", {count} skipped ({why})"));
        }
    }
    if r.coerced_amounts > 0 {
        out.push_str(&format!(", {} amounts read as 0", r.coerced_amounts));
    }
    out
}

pub fn format_ledgers(ledgers: &[&PartnerLedger], currency: &str) -> String {
    let mut sections = Vec::new();
    for l in ledgers {
        let mut table = Table::new();
        table.set_header(vec!["Date", "Move Name", "Debit", "Credit", "Balance"]);
        for row in &l.rows {
            table.add_row(vec![
                Cell::new(row.date),
                Cell::new(&row.description),
                num(row.debit),
                num(row.credit),
                balance_cell(row.running_balance),
            ]);
        }
        table.add_row(vec![
            Cell::new("Total".bold()),
            Cell::new(""),
            num(l.total_debit()),
            num(l.total_credit()),
            Cell::new(""),
        ]);
        let final_balance = l.final_balance().unwrap_or(0.0);
        let closing = money(final_balance, currency);
        let closing = if final_balance < 0.0 {
            closing.red().bold().to_string()
        } else {
            closing.bold().to_string()
        };
        sections.push(format!(
            "{}\n{table}\nFinal Balance: {closing}",
            format!("Customer: {}", l.partner_id).bold()
        ));
    }
    sections.join("\n\n")
}

pub fn format_trial_balance(tb: &TrialBalance, label: &str) -> String {
    if tb.rows.is_empty() {
        return format!("Trial Balance {label}\nNo partners found.");
    }
    let mut table = Table::new();
    table.set_header(vec!["Partner", "Opening", "Period", "Closing"]);
    for r in &tb.rows {
        table.add_row(vec![
            Cell::new(&r.partner_id),
            num(r.opening),
            num(r.period),
            balance_cell(r.closing),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        num(tb.total_opening()),
        num(tb.total_period()),
        balance_cell(tb.total_closing()),
    ]);
    format!("Trial Balance {label}\n{table}")
}

pub fn format_usage(data: &UsageTable) -> String {
    let mut out = if data.rows.is_empty() {
        "No usage rows in range.".to_string()
    } else {
        let mut table = Table::new();
        table.set_header(data.headers.clone());
        for r in &data.rows {
            table.add_row(r.cells.clone());
        }
        format!("{table}\n{} rows", data.rows.len())
    };
    if data.dropped_dates > 0 {
        out.push_str(&format!("\n{} rows skipped (bad dates)", data.dropped_dates));
    }
    out
}
