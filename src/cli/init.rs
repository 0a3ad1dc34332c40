use crate::cli::InitArgs;
use crate::error::Result;
use crate::settings::{load_settings, parse_fiscal_start, save_settings, shellexpand_path, Settings};

/// Merge the given flags into the stored settings. Flags left out keep their
/// current values.
pub fn apply(settings: &mut Settings, args: InitArgs) -> Result<()> {
    if let Some(dir) = args.data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(src) = args.ledger_source {
        settings.ledger_source = Some(src.trim().to_string()).filter(|s| !s.is_empty());
    }
    if let Some(src) = args.usage_source {
        settings.usage_source = Some(src.trim().to_string()).filter(|s| !s.is_empty());
    }
    if let Some(currency) = args.currency {
        settings.currency = currency.trim().to_uppercase();
    }
    if let Some(name) = args.company {
        settings.company.name = name.trim().to_string();
    }
    if !args.address_lines.is_empty() {
        settings.company.address_lines = args
            .address_lines
            .iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
    }
    if let Some(vat) = args.vat_number {
        settings.company.vat_number = vat.trim().to_string();
    }
    if let Some(month) = args.fiscal_year_start {
        settings.fiscal_year_start = parse_fiscal_start(&month)?;
    }
    Ok(())
}

pub fn run(args: InitArgs) -> Result<()> {
    let mut settings = load_settings();
    apply(&mut settings, args)?;
    let path = save_settings(&settings)?;

    let data_dir = settings.data_dir();
    std::fs::create_dir_all(data_dir.join("cache"))?;
    std::fs::create_dir_all(data_dir.join("exports"))?;
    tracing::info!(settings = %path.display(), "saved settings");

    println!("Initialized arledger at {}", data_dir.display());
    match &settings.ledger_source {
        Some(src) => println!("Ledger source: {src}"),
        None => println!("No ledger source yet; run `arledger init --ledger-source <URL or path>`"),
    }
    if let Some(src) = &settings.usage_source {
        println!("Usage source: {src}");
    }
    Ok(())
}
