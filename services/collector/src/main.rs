//! Collector Service - Stores raw snapshots of the OWID COVID-19 CSV
//!
//! Responsibilities:
//! - Download the dataset once (same client settings as the pipeline)
//! - Hash the content to avoid storing the same snapshot twice
//! - Check that the body parses as CSV before keeping it
//! - Store the snapshot on the filesystem as `<uuid>.csv`
//! - Register snapshot metadata in `manifest.json`
//!
//! Usage:
//!   cargo run --bin collector
//!   cargo run --bin collector -- --url https://... --out-dir ./data/raw --force

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use pipeline::config::Settings;
use pipeline::fetch::Fetcher;
use pipeline::RawTable;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Stores raw snapshots of the OWID COVID-19 dataset")]
struct Args {
    /// URL to fetch (defaults to DATA_URL)
    #[arg(long)]
    url: Option<String>,

    /// Snapshot directory (defaults to RAW_FS_DIR)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Store even if a snapshot with the same hash exists
    #[arg(long, default_value = "false")]
    force: bool,

    /// Dry run - don't write the snapshot or the manifest
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

/// Shared data settings plus the snapshot directory.
#[derive(Debug, Clone)]
struct Config {
    settings: Settings,
    raw_fs_dir: PathBuf,
}

impl Config {
    fn from_env() -> Self {
        Self {
            settings: Settings::from_env(),
            raw_fs_dir: PathBuf::from(
                std::env::var("RAW_FS_DIR").unwrap_or_else(|_| "./data/raw".to_string()),
            ),
        }
    }
}

// =============================================================================
// Manifest
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SnapshotMeta {
    snapshot_id: Uuid,
    url: String,
    captured_at: DateTime<Utc>,
    content_hash: String,
    size_bytes: u64,
    rows: usize,
    path: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    snapshots: Vec<SnapshotMeta>,
}

impl Manifest {
    async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let exists = fs::try_exists(&path)
            .await
            .with_context(|| format!("Failed to check {}", path.display()))?;
        if !exists {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    async fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).await?;
        let path = dir.join(MANIFEST_FILE);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn find_by_hash(&self, content_hash: &str) -> Option<&SnapshotMeta> {
        self.snapshots.iter().find(|s| s.content_hash == content_hash)
    }
}

fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug)]
enum Collected {
    Existing(SnapshotMeta),
    Stored(SnapshotMeta),
    DryRun(SnapshotMeta),
}

/// Validates `bytes` as CSV and registers it under `dir`, unless the same
/// content is already in the manifest.
async fn store_snapshot(
    dir: &Path,
    url: &str,
    bytes: &[u8],
    force: bool,
    dry_run: bool,
) -> Result<Collected> {
    let content_hash = content_hash(bytes);
    println!("  Downloaded: {} bytes", bytes.len());
    println!("  Hash: {}", content_hash);

    let table = RawTable::from_reader(bytes).context("Downloaded body is not a valid CSV")?;
    debug!(rows = table.len(), "snapshot parsed");

    let mut manifest = Manifest::load(dir).await?;
    if !force {
        if let Some(existing) = manifest.find_by_hash(&content_hash) {
            return Ok(Collected::Existing(existing.clone()));
        }
    }

    let snapshot_id = Uuid::new_v4();
    let path = dir.join(format!("{}.csv", snapshot_id));
    let meta = SnapshotMeta {
        snapshot_id,
        url: url.to_string(),
        captured_at: Utc::now(),
        content_hash,
        size_bytes: bytes.len() as u64,
        rows: table.len(),
        path: path.to_string_lossy().to_string(),
    };

    if dry_run {
        return Ok(Collected::DryRun(meta));
    }

    fs::create_dir_all(dir).await?;
    fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    manifest.snapshots.push(meta.clone());
    manifest.save(dir).await?;
    info!(snapshot_id = %meta.snapshot_id, rows = meta.rows, "snapshot stored");

    Ok(Collected::Stored(meta))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
    let args = Args::parse();
    let config = Config::from_env();

    let url = args.url.clone().unwrap_or_else(|| config.settings.data_url.clone());
    let dir = args.out_dir.clone().unwrap_or_else(|| config.raw_fs_dir.clone());

    println!("=== OWID COVID-19 Collector ===");
    println!("Storage: {}", dir.display());
    println!("URL: {}", url);

    let fetcher = Fetcher::new(config.settings.fetch_timeout)?;
    let bytes = fetcher
        .download(&url)
        .await
        .context("HTTP request failed")?;

    match store_snapshot(&dir, &url, &bytes, args.force, args.dry_run).await? {
        Collected::Existing(meta) => {
            println!("  Snapshot already exists: {}", meta.snapshot_id);
            println!("\n=== Collection Complete ===");
            println!("Path: {}", meta.path);
        }
        Collected::DryRun(meta) => {
            println!("  Dry run - would create snapshot: {}", meta.snapshot_id);
            println!("  Rows: {}", meta.rows);
        }
        Collected::Stored(meta) => {
            println!("  Saved to: {}", meta.path);
            println!("\n=== Collection Complete ===");
            println!("Snapshot ID: {}", meta.snapshot_id);
            println!("Rows: {}", meta.rows);
            println!(
                "Ready for charts: cargo run --bin pipeline -- --input {}",
                meta.path
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://example.org/owid.csv";
    const BODY: &[u8] = b"continent,location,date,new_cases\nEurope,France,2021-01-01,5\n";

    #[test]
    fn test_content_hash_format() {
        let hash = content_hash(b"");
        assert_eq!(
            hash,
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_store_writes_file_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let collected = store_snapshot(dir.path(), URL, BODY, false, false)
            .await
            .unwrap();
        let Collected::Stored(meta) = collected else {
            panic!("expected a stored snapshot");
        };
        assert_eq!(meta.rows, 1);
        assert_eq!(meta.size_bytes, BODY.len() as u64);
        assert_eq!(std::fs::read(&meta.path).unwrap(), BODY);

        let manifest = Manifest::load(dir.path()).await.unwrap();
        assert_eq!(manifest.snapshots, vec![meta]);
    }

    #[tokio::test]
    async fn test_same_content_is_not_stored_twice() {
        let dir = tempfile::tempdir().unwrap();
        store_snapshot(dir.path(), URL, BODY, false, false).await.unwrap();
        let again = store_snapshot(dir.path(), URL, BODY, false, false)
            .await
            .unwrap();
        assert!(matches!(again, Collected::Existing(_)));
        assert_eq!(Manifest::load(dir.path()).await.unwrap().snapshots.len(), 1);

        let forced = store_snapshot(dir.path(), URL, BODY, true, false)
            .await
            .unwrap();
        assert!(matches!(forced, Collected::Stored(_)));
        assert_eq!(Manifest::load(dir.path()).await.unwrap().snapshots.len(), 2);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let collected = store_snapshot(dir.path(), URL, BODY, false, true)
            .await
            .unwrap();
        assert!(matches!(collected, Collected::DryRun(_)));
        assert!(!dir.path().join(MANIFEST_FILE).exists());
    }

    #[tokio::test]
    async fn test_corrupt_manifest_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join(MANIFEST_FILE);
        std::fs::write(&manifest, "{ not json").unwrap();
        assert!(store_snapshot(dir.path(), URL, BODY, false, false)
            .await
            .is_err());
        assert_eq!(std::fs::read_to_string(&manifest).unwrap(), "{ not json");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_uncheckable_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("raw");
        std::fs::write(&not_a_dir, "file, not a directory").unwrap();
        assert!(Manifest::load(&not_a_dir).await.is_err());
    }

    #[test]
    fn test_config_reads_raw_dir() {
        let config = Config::from_env();
        assert!(!config.raw_fs_dir.as_os_str().is_empty());
        assert!(!config.settings.data_url.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_csv_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"a,b\n1,2,3\n";
        assert!(store_snapshot(dir.path(), URL, body, false, false)
            .await
            .is_err());
    }
}
