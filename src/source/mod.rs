//! Transaction sources and the fetch cache.
//!
//! A source turns a (department, year) key into raw CSV bytes. Network
//! and file-system failures, missing files and empty payloads all surface
//! as `FetchUnavailable` so callers can degrade to a "no data" view.

pub mod cache;

use crate::constants::department_file_path;
use crate::error::{ExplorerError, Result};
use crate::models::DatasetKey;
use reqwest::blocking::Client;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

pub use cache::FetchCache;

/// Supplier of raw per-department transaction payloads
pub trait TransactionSource {
    /// Fetch the CSV payload (plain or gzip) for a key
    fn fetch(&self, key: &DatasetKey) -> Result<Vec<u8>>;

    /// Human-readable location of the data
    fn describe(&self) -> String;
}

impl<T: TransactionSource + ?Sized> TransactionSource for Box<T> {
    fn fetch(&self, key: &DatasetKey) -> Result<Vec<u8>> {
        (**self).fetch(key)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Blocking HTTP source laid out as `{base}/{year}/departements/{dept}.csv.gz`
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    client: Client,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn url_for(&self, key: &DatasetKey) -> String {
        format!(
            "{}/{}",
            self.base_url,
            department_file_path(key.department.as_str(), key.year)
        )
    }

    /// Download an arbitrary URL, e.g. the summary table
    pub fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

impl TransactionSource for HttpSource {
    fn fetch(&self, key: &DatasetKey) -> Result<Vec<u8>> {
        let url = self.url_for(key);
        info!("Fetching transactions from {}", url);

        let unavailable =
            |reason: String| ExplorerError::fetch_unavailable(key.department.as_str(), key.year, reason);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {} from {}", status, url)));
        }

        let payload = response
            .bytes()
            .map_err(|e| unavailable(format!("failed to read response body: {}", e)))?
            .to_vec();

        if payload.is_empty() {
            return Err(unavailable("empty response".to_string()));
        }

        debug!("Fetched {} bytes for {}", payload.len(), key);
        Ok(payload)
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

/// Local mirror of the open-data layout
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &DatasetKey) -> PathBuf {
        self.root
            .join(department_file_path(key.department.as_str(), key.year))
    }
}

impl TransactionSource for DirectorySource {
    fn fetch(&self, key: &DatasetKey) -> Result<Vec<u8>> {
        let path = self.path_for(key);
        debug!("Reading transactions from {}", path.display());

        let payload = std::fs::read(&path).map_err(|e| {
            ExplorerError::fetch_unavailable(
                key.department.as_str(),
                key.year,
                format!("{}: {}", path.display(), e),
            )
        })?;

        if payload.is_empty() {
            return Err(ExplorerError::fetch_unavailable(
                key.department.as_str(),
                key.year,
                format!("{} is empty", path.display()),
            ));
        }

        Ok(payload)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DepartmentCode;
    use std::fs;
    use tempfile::TempDir;

    fn key(department: &str, year: i32) -> DatasetKey {
        DatasetKey::new(DepartmentCode::parse(department).unwrap(), year)
    }

    #[test]
    fn test_http_source_url_layout() {
        let source =
            HttpSource::new("https://example.org/geo-dvf/csv/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            source.url_for(&key("06", 2023)),
            "https://example.org/geo-dvf/csv/2023/departements/06.csv.gz"
        );
    }

    #[test]
    fn test_directory_source_reads_file() {
        let temp_dir = TempDir::new().unwrap();
        let source = DirectorySource::new(temp_dir.path());
        let path = source.path_for(&key("2A", 2022));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"payload").unwrap();

        assert_eq!(source.fetch(&key("2A", 2022)).unwrap(), b"payload".to_vec());
    }

    #[test]
    fn test_directory_source_missing_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let source = DirectorySource::new(temp_dir.path());

        match source.fetch(&key("75", 2021)) {
            Err(ExplorerError::FetchUnavailable {
                department, year, ..
            }) => {
                assert_eq!(department, "75");
                assert_eq!(year, 2021);
            }
            other => panic!("Expected FetchUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_directory_source_empty_file_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let source = DirectorySource::new(temp_dir.path());
        let path = source.path_for(&key("13", 2020));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"").unwrap();

        let error = source.fetch(&key("13", 2020)).unwrap_err();
        assert!(error.is_no_data());
    }
}
