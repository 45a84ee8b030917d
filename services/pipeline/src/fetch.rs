//! Retrieves the source CSV over HTTP(S) or from a local snapshot.
//!
//! Every failure is an explicit `FetchError`; the `*_or_empty` variants turn
//! it into `RawTable::empty()` after logging, which every later stage
//! accepts as a valid, degenerate input.

use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::FetchError;
use crate::record::RawTable;

pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/owid-covid-data.csv";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const USER_AGENT: &str = "owid-pipeline/0.1 (covid chart generator)";

pub struct Fetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, timeout })
    }

    /// Raw response body of `url`.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| self.classify(url, e))?;
        Ok(bytes.to_vec())
    }

    pub async fn fetch(&self, url: &str) -> Result<RawTable, FetchError> {
        info!(url, "fetching dataset");
        let body = self.download(url).await?;
        let table = RawTable::from_reader(body.as_slice())?;
        info!(
            rows = table.len(),
            columns = table.header().names().len(),
            "dataset fetched"
        );
        Ok(table)
    }

    pub async fn fetch_or_empty(&self, url: &str) -> RawTable {
        match self.fetch(url).await {
            Ok(table) => table,
            Err(err) => {
                warn!(error = %err, "could not load data, continuing with an empty dataset");
                RawTable::empty()
            }
        }
    }

    fn classify(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                seconds: self.timeout.as_secs(),
            }
        } else {
            FetchError::Http {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Reads a CSV snapshot from disk with the same contract as `Fetcher::fetch`.
pub fn load_file(path: &Path) -> Result<RawTable, FetchError> {
    info!(path = %path.display(), "loading dataset from file");
    let file = std::fs::File::open(path)?;
    let table = RawTable::from_reader(std::io::BufReader::new(file))?;
    info!(rows = table.len(), "dataset loaded");
    Ok(table)
}

pub fn load_file_or_empty(path: &Path) -> RawTable {
    load_file(path).unwrap_or_else(|err| {
        warn!(error = %err, path = %path.display(), "could not load data file");
        RawTable::empty()
    })
}
