use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, Result};
use crate::importer::{self, IngestOptions, IngestReport, InputFormat};
use crate::models::Transaction;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a table comes from: a remote URL or a local file.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Url(String),
    File(PathBuf),
}

impl Source {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::File(PathBuf::from(crate::settings::shellexpand_path(raw)))
        }
    }

    pub fn format(&self) -> InputFormat {
        match self {
            Self::Url(url) => InputFormat::from_name(url),
            Self::File(path) => InputFormat::from_name(&path.to_string_lossy()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => write!(f, "{url}"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// How long a downloaded copy stays valid, and whether to ignore it.
#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
    pub max_age: Duration,
    pub refresh: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(3600),
            refresh: false,
        }
    }
}

pub struct Fetched {
    pub bytes: Vec<u8>,
    pub checksum: String,
    pub fetched_at: DateTime<Local>,
    pub from_cache: bool,
}

fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn cache_path(cache_dir: &Path, url: &str, format: InputFormat) -> PathBuf {
    let key = checksum(url.as_bytes());
    cache_dir.join(format!("{}.{}", &key[..16], format.extension()))
}

fn modified_at(path: &Path) -> Option<DateTime<Local>> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok().map(DateTime::from)
}

fn is_fresh(path: &Path, max_age: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.elapsed().ok())
        .is_some_and(|age| age < max_age)
}

fn fetch(url: &str) -> Result<Vec<u8>> {
    let fail = |reason: String| LedgerError::Fetch {
        url: url.to_string(),
        reason,
    };
    let client = reqwest::blocking::Client::builder()
        .user_agent(format!("arledger/{}", env!("CARGO_PKG_VERSION")))
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client.get(url).send().map_err(|e| fail(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(fail(format!("HTTP {}", status.as_u16())));
    }
    let body = response.bytes().map_err(|e| fail(e.to_string()))?;
    Ok(body.to_vec())
}

fn write_cache(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("part");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Read a source's bytes. URLs go through an on-disk cache under `cache_dir`;
/// a failed download falls back to a stale cached copy when one exists.
pub fn load_bytes(source: &Source, cache_dir: &Path, opts: CacheOptions) -> Result<Fetched> {
    match source {
        Source::File(path) => {
            let bytes = std::fs::read(path)?;
            Ok(Fetched {
                checksum: checksum(&bytes),
                bytes,
                fetched_at: Local::now(),
                from_cache: false,
            })
        }
        Source::Url(url) => {
            let cached = cache_path(cache_dir, url, source.format());
            if !opts.refresh && is_fresh(&cached, opts.max_age) {
                tracing::debug!(path = %cached.display(), "using cached download");
                let bytes = std::fs::read(&cached)?;
                return Ok(Fetched {
                    checksum: checksum(&bytes),
                    bytes,
                    fetched_at: modified_at(&cached).unwrap_or_else(Local::now),
                    from_cache: true,
                });
            }

            tracing::info!(%url, "downloading");
            match fetch(url) {
                Ok(bytes) => {
                    if let Err(e) = write_cache(&cached, &bytes) {
                        tracing::warn!(error = %e, "could not write download cache");
                    }
                    Ok(Fetched {
                        checksum: checksum(&bytes),
                        bytes,
                        fetched_at: Local::now(),
                        from_cache: false,
                    })
                }
                Err(e) if cached.exists() => {
                    tracing::warn!(error = %e, "download failed, using stale cached copy");
                    let bytes = std::fs::read(&cached)?;
                    Ok(Fetched {
                        checksum: checksum(&bytes),
                        bytes,
                        fetched_at: modified_at(&cached).unwrap_or_else(Local::now),
                        from_cache: true,
                    })
                }
                Err(e) => Err(e),
            }
        }
    }
}

/// An immutable, fully ingested copy of the ledger export. Reports are
/// computed from it and never modify it.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub source: String,
    pub checksum: String,
    pub fetched_at: DateTime<Local>,
    pub transactions: Vec<Transaction>,
    pub report: IngestReport,
}

pub fn load_snapshot(
    source: &Source,
    cache_dir: &Path,
    cache: CacheOptions,
    ingest: &IngestOptions,
) -> Result<Snapshot> {
    let fetched = load_bytes(source, cache_dir, cache)?;
    let (transactions, report) = importer::ingest(&fetched.bytes, source.format(), ingest)?;
    tracing::info!(
        source = %source,
        checksum = %&fetched.checksum[..12],
        from_cache = fetched.from_cache,
        "loaded snapshot"
    );
    Ok(Snapshot {
        source: source.to_string(),
        checksum: fetched.checksum,
        fetched_at: fetched.fetched_at,
        transactions,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    const LEDGER_CSV: &str = "date,partner_id,move_name,debit,credit\n\
                              2024-01-01,A,INV1,100,0\n\
                              2024-01-05,A,PAY1,0,40\n";

    fn hour() -> CacheOptions {
        CacheOptions {
            max_age: Duration::from_secs(3600),
            refresh: false,
        }
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(
            Source::parse(" https://example.com/a.csv "),
            Source::Url("https://example.com/a.csv".to_string())
        );
        assert!(matches!(Source::parse("/tmp/a.csv"), Source::File(_)));
    }

    #[test]
    fn test_load_local_file_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(&path, LEDGER_CSV).unwrap();
        let snap = load_snapshot(
            &Source::File(path),
            &dir.path().join("cache"),
            hour(),
            &IngestOptions::default(),
        )
        .unwrap();
        assert_eq!(snap.transactions.len(), 2);
        assert_eq!(snap.checksum.len(), 64);
        assert_eq!(snap.report.rows_read, 2);
    }

    #[test]
    fn test_missing_local_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_bytes(&Source::File(dir.path().join("nope.csv")), dir.path(), hour());
        assert!(matches!(result, Err(LedgerError::Io(_))));
    }

    #[test]
    fn test_download_is_cached_and_reused() {
        let server = MockServer::start();
        let mut mock = server.mock(|when, then| {
            when.method(GET).path("/ledger.csv");
            then.status(200).body(LEDGER_CSV);
        });
        let dir = tempfile::tempdir().unwrap();
        let source = Source::parse(&server.url("/ledger.csv"));

        let first = load_bytes(&source, dir.path(), hour()).unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.bytes, LEDGER_CSV.as_bytes());

        // Server gone: a fresh cache still answers
        mock.delete();
        let second = load_bytes(&source, dir.path(), hour()).unwrap();
        assert!(second.from_cache);
        assert_eq!(second.checksum, first.checksum);
    }

    #[test]
    fn test_refresh_falls_back_to_stale_cache() {
        let server = MockServer::start();
        let mut mock = server.mock(|when, then| {
            when.method(GET).path("/ledger.csv");
            then.status(200).body(LEDGER_CSV);
        });
        let dir = tempfile::tempdir().unwrap();
        let source = Source::parse(&server.url("/ledger.csv"));
        load_bytes(&source, dir.path(), hour()).unwrap();

        mock.delete();
        server.mock(|when, then| {
            when.method(GET).path("/ledger.csv");
            then.status(500);
        });
        let refreshed = load_bytes(
            &source,
            dir.path(),
            CacheOptions {
                refresh: true,
                ..hour()
            },
        )
        .unwrap();
        assert!(refreshed.from_cache);
        assert_eq!(refreshed.bytes, LEDGER_CSV.as_bytes());
    }

    #[test]
    fn test_http_error_without_cache() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/missing.csv");
            then.status(404);
        });
        let dir = tempfile::tempdir().unwrap();
        let source = Source::parse(&server.url("/missing.csv"));
        let err = load_bytes(&source, dir.path(), hour()).err().unwrap();
        assert!(matches!(err, LedgerError::Fetch { .. }));
        assert!(err.to_string().contains("HTTP 404"), "got: {err}");
    }
}
