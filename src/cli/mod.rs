pub mod export;
pub mod init;
pub mod report;

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::error::{LedgerError, Result};
use crate::importer::{self, IngestOptions};
use crate::ledger::{DateRange, TrialBalanceSort};
use crate::settings::{load_settings, Settings};
use crate::source::{self, CacheOptions, Snapshot, Source};
use crate::usage::UsageTable;

pub(crate) fn parse_date_arg(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| LedgerError::InvalidDate(raw.to_string()))
}

fn parse_sort(raw: &str) -> std::result::Result<TrialBalanceSort, String> {
    TrialBalanceSort::parse(raw)
        .ok_or_else(|| format!("expected closing, partner or source, got {raw:?}"))
}

#[derive(Parser)]
#[command(
    name = "arledger",
    version,
    about = "Partner ledgers and trial balances from an accounts-receivable export."
)]
pub struct Cli {
    /// Data source (URL or file path); overrides the configured one
    #[arg(long, global = true)]
    pub source: Option<String>,

    /// Re-download remote sources even when the cache is fresh
    #[arg(long, global = true)]
    pub refresh: bool,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write or update settings: sources, data directory, currency.
    Init(InitArgs),
    /// Print reports to the terminal.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Export reports to XLSX, CSV or PDF.
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct InitArgs {
    /// Ledger export location (URL or path)
    #[arg(long = "ledger-source")]
    pub ledger_source: Option<String>,
    /// Raw material usage location (URL or path)
    #[arg(long = "usage-source")]
    pub usage_source: Option<String>,
    /// Cache and export directory (default: ~/Documents/arledger)
    #[arg(long = "data-dir")]
    pub data_dir: Option<String>,
    /// Currency code shown next to amounts
    #[arg(long)]
    pub currency: Option<String>,
    /// Company name for PDF letterheads
    #[arg(long)]
    pub company: Option<String>,
    /// Letterhead address line (repeatable; replaces the stored lines)
    #[arg(long = "address-line")]
    pub address_lines: Vec<String>,
    /// VAT registration number for PDF letterheads
    #[arg(long = "vat-number")]
    pub vat_number: Option<String>,
    /// First month of the fiscal year: 01-12
    #[arg(long = "fiscal-year-start")]
    pub fiscal_year_start: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RangeArgs {
    /// Start date: YYYY-MM-DD (default: earliest in data)
    #[arg(long = "from")]
    pub from_date: Option<String>,
    /// End date: YYYY-MM-DD (default: latest in data)
    #[arg(long = "to")]
    pub to_date: Option<String>,
}

impl RangeArgs {
    pub fn range(&self) -> Result<DateRange> {
        let from = self.from_date.as_deref().map(parse_date_arg).transpose()?;
        let to = self.to_date.as_deref().map(parse_date_arg).transpose()?;
        DateRange::new(from, to)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct LedgerArgs {
    /// Partner to include (repeatable)
    #[arg(long = "partner")]
    pub partners: Vec<String>,
    /// Include every partner in the data
    #[arg(long, conflicts_with = "partners")]
    pub all: bool,
    #[command(flatten)]
    pub range: RangeArgs,
}

#[derive(Args, Debug, Clone)]
pub struct TrialBalanceArgs {
    /// Fiscal year, named by the year it starts (default: latest in data)
    #[arg(long)]
    pub year: Option<i32>,
    /// Row order: closing, partner or source
    #[arg(long, value_parser = parse_sort, default_value = "closing")]
    pub sort: TrialBalanceSort,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Xlsx,
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Pdf => "pdf",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = ExportFormat::Xlsx)]
    pub format: ExportFormat,
    /// Output file path (default: <data_dir>/exports/<report>-<date>.<ext>)
    #[arg(long)]
    pub output: Option<String>,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// List partners with transaction counts and balances.
    Partners,
    /// Running-balance statement per partner.
    Ledger(LedgerArgs),
    /// Opening, period and closing balance per partner for a fiscal year.
    TrialBalance(TrialBalanceArgs),
    /// Raw material daily usage.
    Usage(RangeArgs),
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export partner ledgers.
    Ledger {
        #[command(flatten)]
        args: LedgerArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Export the trial balance.
    TrialBalance {
        #[command(flatten)]
        args: TrialBalanceArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Export raw material usage (XLSX or CSV).
    Usage {
        #[command(flatten)]
        range: RangeArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Export every report as XLSX (and PDF where available).
    All {
        #[arg(long)]
        year: Option<i32>,
        /// Output directory
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
}

/// Settings plus the global flags, shared by every command that reads data.
pub struct Context {
    pub settings: Settings,
    source_override: Option<String>,
    cache: CacheOptions,
}

impl Context {
    pub fn new(source_override: Option<String>, refresh: bool) -> Self {
        let settings = load_settings();
        let cache = CacheOptions {
            max_age: Duration::from_secs(settings.cache_max_age_secs),
            refresh,
        };
        Self {
            settings,
            source_override,
            cache,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.settings.data_dir().join("cache")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.settings.data_dir().join("exports")
    }

    fn resolve(&self, configured: Option<&str>) -> Result<Source> {
        self.source_override
            .as_deref()
            .or(configured)
            .filter(|s| !s.trim().is_empty())
            .map(Source::parse)
            .ok_or(LedgerError::NoSource)
    }

    fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            account_codes: self.settings.account_codes.clone(),
            strip_non_ascii_partners: self.settings.strip_non_ascii_partners,
        }
    }

    pub fn ledger(&self) -> Result<Snapshot> {
        let source = self.resolve(self.settings.ledger_source.as_deref())?;
        source::load_snapshot(&source, &self.cache_dir(), self.cache, &self.ingest_options())
    }

    pub fn usage(&self) -> Result<UsageTable> {
        let source = self.resolve(self.settings.usage_source.as_deref())?;
        self.load_usage(&source)
    }

    /// The configured usage table only, ignoring `--source`.
    pub fn configured_usage(&self) -> Result<Option<UsageTable>> {
        match self.settings.usage_source.as_deref() {
            Some(raw) if !raw.trim().is_empty() => self.load_usage(&Source::parse(raw)).map(Some),
            _ => Ok(None),
        }
    }

    fn load_usage(&self, source: &Source) -> Result<UsageTable> {
        let fetched = source::load_bytes(source, &self.cache_dir(), self.cache)?;
        let table = importer::read_table(&fetched.bytes, source.format())?;
        UsageTable::from_table(table)
    }
}
