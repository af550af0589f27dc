//! Record persistence
//!
//! One pretty-printed JSON file per (library, concurrency) trial, plus a
//! consolidated `summary.json` array built from whatever record files exist.

use crate::{
    defaults::SUMMARY_FILE,
    error::{AppError, Result},
    logging::Logger,
    models::{config::library_slug, TestRecord},
};
use std::fs;
use std::path::{Path, PathBuf};

/// Reads and writes record files in one results directory
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
    logger: Logger,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            logger: Logger::quiet(crate::logging::components::STORE),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of a trial's record, e.g. `nethttp_c32.json`
    pub fn record_file_name(library: &str, concurrency: usize) -> String {
        format!("{}_c{}.json", library_slug(library), concurrency)
    }

    /// Write one record, creating the directory when missing
    pub async fn write_record(&self, record: &TestRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::io(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let path = self
            .dir
            .join(Self::record_file_name(&record.library, record.concurrency));
        write_json(&path, record)?;

        self.logger
            .info(&format!("Results saved to {}", path.display()))
            .field("path", path.display().to_string())
            .field("library", &record.library)
            .field("concurrency", record.concurrency)
            .log()
            .await;
        Ok(path)
    }

    /// Every readable record in the directory, ordered by (library, concurrency)
    ///
    /// `summary.json` and files that do not hold a record are skipped.
    pub async fn collect(&self) -> Result<Vec<TestRecord>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            AppError::io(format!("Failed to read {}: {}", self.dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter(|path| path.file_name().is_some_and(|name| name != SUMMARY_FILE))
            .collect();
        paths.sort();

        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match read_record(&path) {
                Ok(record) => records.push(record),
                Err(error) => {
                    self.logger
                        .warn(&format!("Skipping {}", path.display()))
                        .field("path", path.display().to_string())
                        .error_info(&error)
                        .log()
                        .await;
                }
            }
        }

        records.sort_by(|a, b| {
            a.library
                .cmp(&b.library)
                .then(a.concurrency.cmp(&b.concurrency))
        });
        Ok(records)
    }

    /// Write the consolidated array to `summary.json`
    pub async fn write_summary(&self, records: &[TestRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            AppError::io(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let path = self.dir.join(SUMMARY_FILE);
        write_json(&path, &records)?;

        self.logger
            .info(&format!("Summary of {} records saved to {}", records.len(), path.display()))
            .field("records", records.len())
            .log()
            .await;
        Ok(path)
    }
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    fs::write(path, json)
        .map_err(|e| AppError::io(format!("Failed to write {}: {}", path.display(), e)))
}

fn read_record(path: &Path) -> Result<TestRecord> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::parse(format!("{} is not a record: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metrics, ResourceUsage, RunResult};
    use tempfile::TempDir;

    fn record(library: &str, concurrency: usize) -> TestRecord {
        let metrics = Metrics {
            library: library.to_string(),
            language: "rust".to_string(),
            concurrency,
            duration: 10,
            total_requests: 100,
            successful_requests: 100,
            failed_requests: 0,
            error_rate: 0.0,
            throughput: 10.0,
            latency_avg_ms: 2.0,
            latency_p50_ms: 2.0,
            latency_p95_ms: 3.0,
            latency_p99_ms: 4.0,
            latency_min_ms: 1.0,
            latency_max_ms: 5.0,
        };
        TestRecord::from_metrics(metrics, ResourceUsage::default())
    }

    #[test]
    fn test_record_file_name_uses_slug() {
        assert_eq!(ResultStore::record_file_name("net/http", 32), "nethttp_c32.json");
        assert_eq!(ResultStore::record_file_name("reqwest", 8), "reqwest_c8.json");
    }

    #[tokio::test]
    async fn test_write_record_creates_directory() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path().join("nested").join("results"));

        let path = store.write_record(&record("reqwest", 8)).await.unwrap();

        assert_eq!(path.file_name().unwrap(), "reqwest_c8.json");
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["library"], "reqwest");
        assert_eq!(json["latency_p99_ms"], 4.0);
        assert_eq!(json["resource_usage"]["client"]["cpu_percent_avg"], 0.0);
    }

    #[tokio::test]
    async fn test_degenerate_record_file_has_no_latency() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());
        let mut run = RunResult::new(4, 10);
        run.total_failures = 7;
        let degenerate = TestRecord::without_latency("ureq", "rust", &run, ResourceUsage::default());

        let path = store.write_record(&degenerate).await.unwrap();
        let content = fs::read_to_string(path).unwrap();

        assert!(!content.contains("latency_"));
        assert!(content.contains("\"error_rate\": 100.0"));
    }

    #[tokio::test]
    async fn test_collect_sorts_and_skips_noise() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());
        for r in [record("ureq", 8), record("reqwest", 128), record("reqwest", 32)] {
            store.write_record(&r).await.unwrap();
        }
        fs::write(temp.path().join("broken.json"), "{ not json").unwrap();
        fs::write(temp.path().join("notes.txt"), "ignored").unwrap();
        store.write_summary(&[record("stale", 1)]).await.unwrap();

        let records = store.collect().await.unwrap();
        let keys: Vec<(String, usize)> = records
            .iter()
            .map(|r| (r.library.clone(), r.concurrency))
            .collect();

        assert_eq!(
            keys,
            vec![
                ("reqwest".to_string(), 32),
                ("reqwest".to_string(), 128),
                ("ureq".to_string(), 8),
            ]
        );
    }

    #[tokio::test]
    async fn test_summary_round_trips_through_collect() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());
        store.write_record(&record("reqwest", 8)).await.unwrap();

        let records = store.collect().await.unwrap();
        let path = store.write_summary(&records).await.unwrap();

        let summary: Vec<TestRecord> =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(summary, records);
    }

    #[test]
    fn test_empty_summary_is_empty_array() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path());

        let path = tokio_test::block_on(store.write_summary(&[])).unwrap();

        assert_eq!(fs::read_to_string(path).unwrap().trim(), "[]");
    }

    #[tokio::test]
    async fn test_collect_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let store = ResultStore::new(temp.path().join("absent"));
        assert!(matches!(store.collect().await, Err(AppError::Io(_))));
    }
}
