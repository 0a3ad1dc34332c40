use std::path::{Path, PathBuf};

use crate::cli::report::{fiscal_year, range_label, selected_partners};
use crate::cli::{Context, ExportCommands, ExportFormat, LedgerArgs, OutputArgs, RangeArgs, TrialBalanceArgs};
use crate::error::{LedgerError, Result};
use crate::export::{ledger_sheet, to_csv, to_xlsx, trial_balance_sheet, usage_sheet, Sheet};
use crate::ledger::{self, date_span, DateRange, FiscalYear};
use crate::models::{PartnerLedger, TrialBalance};
use crate::settings::Settings;

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn default_path(dir: &Path, name: &str, format: ExportFormat) -> PathBuf {
    dir.join(format!("{name}-{}.{}", today(), format.extension()))
}

fn output_path(ctx: &Context, out: &OutputArgs, name: &str) -> PathBuf {
    out.output
        .as_deref()
        .map(|p| PathBuf::from(crate::settings::shellexpand_path(p)))
        .unwrap_or_else(|| default_path(&ctx.exports_dir(), name, out.format))
}

fn write_file(bytes: &[u8], path: &Path) -> Result<String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    let shown = format!("{}", path.display());
    tracing::info!(path = %shown, bytes = bytes.len(), "export written");
    println!("Wrote {shown}");
    Ok(shown)
}

fn tabular(sheet: &Sheet, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => to_xlsx(sheet),
        ExportFormat::Csv => to_csv(sheet),
        ExportFormat::Pdf => Err(LedgerError::Other(format!(
            "{} has no PDF layout; use --format xlsx or csv",
            sheet.name
        ))),
    }
}

#[cfg(feature = "pdf")]
fn ledger_pdf(ledgers: &[&PartnerLedger], settings: &Settings, label: &str) -> Result<Vec<u8>> {
    crate::pdf::render_partner_ledgers(ledgers, &settings.company, &settings.currency, label)
}

#[cfg(not(feature = "pdf"))]
fn ledger_pdf(_: &[&PartnerLedger], _: &Settings, _: &str) -> Result<Vec<u8>> {
    Err(LedgerError::Pdf("built without the `pdf` feature".into()))
}

#[cfg(feature = "pdf")]
fn trial_balance_pdf(tb: &TrialBalance, settings: &Settings, label: &str) -> Result<Vec<u8>> {
    crate::pdf::render_trial_balance(tb, &settings.company, &settings.currency, label)
}

#[cfg(not(feature = "pdf"))]
fn trial_balance_pdf(_: &TrialBalance, _: &Settings, _: &str) -> Result<Vec<u8>> {
    Err(LedgerError::Pdf("built without the `pdf` feature".into()))
}

pub fn dispatch(ctx: &Context, cmd: ExportCommands) -> Result<()> {
    match cmd {
        ExportCommands::Ledger { args, out } => partner_ledger(ctx, &args, &out).map(drop),
        ExportCommands::TrialBalance { args, out } => trial_balance(ctx, &args, &out).map(drop),
        ExportCommands::Usage { range, out } => usage(ctx, &range, &out).map(drop),
        ExportCommands::All { year, output_dir } => {
            let msg = all(ctx, year, output_dir)?;
            println!("{msg}");
            Ok(())
        }
    }
}

pub fn partner_ledger(ctx: &Context, args: &LedgerArgs, out: &OutputArgs) -> Result<String> {
    let range = args.range.range()?;
    let snapshot = ctx.ledger()?;
    let ids = selected_partners(&snapshot.transactions, args)?;
    let ledgers = ledger::build_partner_ledger(&snapshot.transactions, &ids, range);
    let shown: Vec<&PartnerLedger> = ids.iter().filter_map(|id| ledgers.get(id)).collect();

    let bytes = match out.format {
        ExportFormat::Pdf => {
            let span = date_span(snapshot.transactions.iter().map(|t| t.date));
            ledger_pdf(&shown, &ctx.settings, &range_label(range, span))?
        }
        format => tabular(&ledger_sheet(&shown), format)?,
    };
    write_file(&bytes, &output_path(ctx, out, "partner-ledger"))
}

pub fn trial_balance(ctx: &Context, args: &TrialBalanceArgs, out: &OutputArgs) -> Result<String> {
    let snapshot = ctx.ledger()?;
    let fy = fiscal_year(ctx, &snapshot, args.year)?;
    let tb = ledger::build_trial_balance_sorted(&snapshot.transactions, fy, args.sort);

    let bytes = match out.format {
        ExportFormat::Pdf => trial_balance_pdf(&tb, &ctx.settings, &fy.label())?,
        format => tabular(&trial_balance_sheet(&tb), format)?,
    };
    let name = format!("trial-balance-{}", fy.year);
    write_file(&bytes, &output_path(ctx, out, &name))
}

pub fn usage(ctx: &Context, range: &RangeArgs, out: &OutputArgs) -> Result<String> {
    let range = range.range()?;
    let table = ctx.usage()?.filter(range);
    let bytes = tabular(&usage_sheet(&table), out.format)?;
    write_file(&bytes, &output_path(ctx, out, "raw-material-usage"))
}

/// Every report with default options into one directory.
pub fn all(ctx: &Context, year: Option<i32>, output_dir: Option<String>) -> Result<String> {
    let dir = output_dir
        .map(|d| PathBuf::from(crate::settings::shellexpand_path(&d)))
        .unwrap_or_else(|| ctx.exports_dir());
    std::fs::create_dir_all(&dir)?;

    let snapshot = ctx.ledger()?;
    let txns = &snapshot.transactions;

    let ids = ledger::partner_ids(txns);
    let ledgers = ledger::build_partner_ledger(txns, &ids, DateRange::all());
    let shown: Vec<&PartnerLedger> = ledgers.values().collect();
    write_file(
        &to_xlsx(&ledger_sheet(&shown))?,
        &default_path(&dir, "partner-ledger", ExportFormat::Xlsx),
    )?;

    let fy: FiscalYear = fiscal_year(ctx, &snapshot, year)?;
    let tb = ledger::build_trial_balance(txns, fy);
    let tb_name = format!("trial-balance-{}", fy.year);
    write_file(
        &to_xlsx(&trial_balance_sheet(&tb))?,
        &default_path(&dir, &tb_name, ExportFormat::Xlsx),
    )?;

    if cfg!(feature = "pdf") {
        let span = date_span(txns.iter().map(|t| t.date));
        let label = range_label(DateRange::all(), span);
        write_file(
            &ledger_pdf(&shown, &ctx.settings, &label)?,
            &default_path(&dir, "partner-ledger", ExportFormat::Pdf),
        )?;
        write_file(
            &trial_balance_pdf(&tb, &ctx.settings, &fy.label())?,
            &default_path(&dir, &tb_name, ExportFormat::Pdf),
        )?;
    }

    if let Some(table) = ctx.configured_usage()? {
        write_file(
            &to_xlsx(&usage_sheet(&table))?,
            &default_path(&dir, "raw-material-usage", ExportFormat::Xlsx),
        )?;
    }

    Ok(format!("All reports exported to {}", dir.display()))
}
