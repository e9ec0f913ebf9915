//! Observation hooks for search and model events.
//!
//! A [`Monitor`] receives events as the pipeline runs. It never feeds
//! anything back into the pipeline.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Receives search and model-response events.
pub trait Monitor: Send + Sync {
    /// Called after a search query returns results.
    fn on_search(&self, query: &str, result_count: usize, sources: &[String]);

    /// Called after a model call returns text.
    fn on_response(&self, prompt_len: usize, response_len: usize);
}

/// Emits monitor events as `tracing` records.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMonitor;

impl Monitor for TracingMonitor {
    fn on_search(&self, query: &str, result_count: usize, sources: &[String]) {
        tracing::info!(query, result_count, sources = ?sources, "search completed");
    }

    fn on_response(&self, prompt_len: usize, response_len: usize) {
        tracing::info!(prompt_len, response_len, "model response received");
    }
}

/// A search recorded by [`SearchLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRecord {
    /// When the search completed.
    pub timestamp: DateTime<Utc>,
    /// The query text.
    pub query: String,
    /// Number of results returned.
    pub result_count: usize,
    /// URLs of the returned results.
    pub sources: Vec<String>,
}

/// In-memory log of every search made during a session.
#[derive(Debug, Default)]
pub struct SearchLog {
    records: Mutex<Vec<SearchRecord>>,
}

impl SearchLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of searches recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no searches have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The last `n` searches, oldest first.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<SearchRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let start = records.len().saturating_sub(n);
        records[start..].to_vec()
    }
}

impl Monitor for SearchLog {
    fn on_search(&self, query: &str, result_count: usize, sources: &[String]) {
        let record = SearchRecord {
            timestamp: Utc::now(),
            query: query.to_string(),
            result_count,
            sources: sources.to_vec(),
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    fn on_response(&self, _prompt_len: usize, _response_len: usize) {}
}

/// One line of a [`FileMonitor`] log.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LogEntry<'a> {
    Search {
        timestamp: DateTime<Utc>,
        query: &'a str,
        result_count: usize,
        sources: &'a [String],
    },
    Response {
        timestamp: DateTime<Utc>,
        prompt_length: usize,
        response_length: usize,
    },
}

/// Appends every event to a file, one JSON object per line.
///
/// Write failures are logged and dropped; the pipeline never sees them.
#[derive(Debug)]
pub struct FileMonitor {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileMonitor {
    /// Opens `path` for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// The file being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, entry: &LogEntry<'_>) {
        let mut line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode monitor entry");
                return;
            }
        };
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write monitor log");
        }
    }
}

impl Monitor for FileMonitor {
    fn on_search(&self, query: &str, result_count: usize, sources: &[String]) {
        self.append(&LogEntry::Search {
            timestamp: Utc::now(),
            query,
            result_count,
            sources,
        });
    }

    fn on_response(&self, prompt_len: usize, response_len: usize) {
        self.append(&LogEntry::Response {
            timestamp: Utc::now(),
            prompt_length: prompt_len,
            response_length: response_len,
        });
    }
}

/// Forwards every event to each contained monitor in order.
#[derive(Default, Clone)]
pub struct MonitorSet {
    monitors: Vec<Arc<dyn Monitor>>,
}

impl MonitorSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a monitor.
    #[must_use]
    pub fn with(mut self, monitor: Arc<dyn Monitor>) -> Self {
        self.monitors.push(monitor);
        self
    }

    /// Number of monitors in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl std::fmt::Debug for MonitorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorSet")
            .field("monitors", &self.monitors.len())
            .finish()
    }
}

impl Monitor for MonitorSet {
    fn on_search(&self, query: &str, result_count: usize, sources: &[String]) {
        for monitor in &self.monitors {
            monitor.on_search(query, result_count, sources);
        }
    }

    fn on_response(&self, prompt_len: usize, response_len: usize) {
        for monitor in &self.monitors {
            monitor.on_response(prompt_len, response_len);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_log_records_in_order() {
        let log = SearchLog::new();
        log.on_search("rust async", 3, &["https://a".to_string()]);
        log.on_search("tokio", 0, &[]);
        assert_eq!(log.len(), 2);
        let recent = log.recent(5);
        assert_eq!(recent[0].query, "rust async");
        assert_eq!(recent[0].sources, vec!["https://a".to_string()]);
        assert_eq!(recent[1].result_count, 0);
    }

    #[test]
    fn test_search_log_recent_limits() {
        let log = SearchLog::new();
        for i in 0..7 {
            log.on_search(&format!("q{i}"), i, &[]);
        }
        let recent = log.recent(5);
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].query, "q2");
        assert_eq!(recent[4].query, "q6");
    }

    #[test]
    fn test_file_monitor_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let path = dir.path().join("monitor.log");

        let monitor = FileMonitor::open(&path).unwrap_or_else(|_| unreachable!());
        monitor.on_search("capital of brazil", 2, &["https://a".to_string()]);
        monitor.on_response(120, 45);
        drop(monitor);

        // Reopening appends rather than truncating.
        let monitor = FileMonitor::open(&path).unwrap_or_else(|_| unreachable!());
        assert_eq!(monitor.path(), path.as_path());
        monitor.on_search("tokio", 0, &[]);

        let content = std::fs::read_to_string(&path).unwrap_or_default();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap_or_default())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["type"], "search");
        assert_eq!(lines[0]["query"], "capital of brazil");
        assert_eq!(lines[0]["result_count"], 2);
        assert_eq!(lines[0]["sources"][0], "https://a");
        assert!(lines[0]["timestamp"].is_string());
        assert_eq!(lines[1]["type"], "response");
        assert_eq!(lines[1]["prompt_length"], 120);
        assert_eq!(lines[1]["response_length"], 45);
        assert_eq!(lines[2]["query"], "tokio");
    }

    #[test]
    fn test_file_monitor_open_fails_for_missing_dir() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        assert!(FileMonitor::open(dir.path().join("missing").join("monitor.log")).is_err());
    }

    #[test]
    fn test_monitor_set_fans_out() {
        let a = Arc::new(SearchLog::new());
        let b = Arc::new(SearchLog::new());
        let set = MonitorSet::new()
            .with(Arc::clone(&a) as Arc<dyn Monitor>)
            .with(Arc::clone(&b) as Arc<dyn Monitor>)
            .with(Arc::new(TracingMonitor));
        set.on_search("q", 1, &[]);
        set.on_response(10, 20);
        assert_eq!(set.len(), 3);
        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 1);
    }
}
