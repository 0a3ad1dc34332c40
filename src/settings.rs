use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Letterhead printed at the top of every PDF page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyHeader {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address_lines: Vec<String>,
    #[serde(default)]
    pub vat_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default)]
    pub ledger_source: Option<String>,
    #[serde(default)]
    pub usage_source: Option<String>,
    #[serde(default)]
    pub company: CompanyHeader,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Account codes that take part in receivable reporting. Empty means all.
    #[serde(default)]
    pub account_codes: Vec<i64>,
    #[serde(default)]
    pub strip_non_ascii_partners: bool,
    #[serde(default = "default_fiscal_year_start")]
    pub fiscal_year_start: String,
    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,
}

fn default_currency() -> String {
    "EGP".to_string()
}

fn default_fiscal_year_start() -> String {
    "01".to_string()
}

fn default_cache_max_age_secs() -> u64 {
    3600
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            ledger_source: None,
            usage_source: None,
            company: CompanyHeader::default(),
            currency: default_currency(),
            account_codes: Vec::new(),
            strip_non_ascii_partners: false,
            fiscal_year_start: default_fiscal_year_start(),
            cache_max_age_secs: default_cache_max_age_secs(),
        }
    }
}

impl Settings {
    /// First month of the fiscal year, clamped to 1..=12.
    pub fn fiscal_start_month(&self) -> u32 {
        self.fiscal_year_start
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .unwrap_or(1)
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("ARLEDGER_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("arledger")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("arledger")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Settings::default()
            }
        }
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<PathBuf> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)?;
    let path = settings_path();
    std::fs::write(&path, format!("{json}\n"))?;
    Ok(path)
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

/// Parse a fiscal-year start month given on the command line.
pub fn parse_fiscal_start(raw: &str) -> Result<String> {
    match raw.trim().parse::<u32>() {
        Ok(m) if (1..=12).contains(&m) => Ok(format!("{m:02}")),
        _ => Err(LedgerError::Other(format!(
            "Fiscal year start must be a month 01-12, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "currency": "SAR"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.fiscal_year_start, "01");
        assert_eq!(s.currency, "SAR");
        assert_eq!(s.cache_max_age_secs, 3600);
        assert!(s.account_codes.is_empty());
        assert!(s.ledger_source.is_none());
    }

    #[test]
    fn test_empty_json_is_all_defaults() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.currency, "EGP");
        assert!(!s.data_dir.is_empty());
        assert!(!s.strip_non_ascii_partners);
    }

    #[test]
    fn test_company_header_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            company: CompanyHeader {
                name: "Acme Recycling".to_string(),
                address_lines: vec!["Riyadh 14213".to_string()],
                vat_number: "300451393600003".to_string(),
            },
            account_codes: vec![1102, 1103],
            ..Settings::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded: Settings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.company.name, "Acme Recycling");
        assert_eq!(loaded.company.address_lines, vec!["Riyadh 14213"]);
        assert_eq!(loaded.account_codes, vec![1102, 1103]);
    }

    #[test]
    fn test_fiscal_start_month_clamps_garbage() {
        let mut s = Settings::default();
        assert_eq!(s.fiscal_start_month(), 1);
        s.fiscal_year_start = "07".to_string();
        assert_eq!(s.fiscal_start_month(), 7);
        s.fiscal_year_start = "13".to_string();
        assert_eq!(s.fiscal_start_month(), 1);
    }

    #[test]
    fn test_parse_fiscal_start() {
        assert_eq!(parse_fiscal_start("7").unwrap(), "07");
        assert!(parse_fiscal_start("0").is_err());
        assert!(parse_fiscal_start("july").is_err());
    }
}
