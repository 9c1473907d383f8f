use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::model::{EdgeRecord, NodeRecord, Snapshot};

const SUCCESS_STATUS: &str = "success";

/// A producer response. Entries that do not deserialize are dropped here and
/// only counted, so one bad node never costs the rest of the batch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IncomingBatch {
    pub status: Option<String>,
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<EdgeRecord>,
    pub malformed_nodes: usize,
    pub malformed_edges: usize,
}

impl IncomingBatch {
    pub fn success(nodes: Vec<NodeRecord>, links: Vec<EdgeRecord>) -> Self {
        Self {
            status: Some(SUCCESS_STATUS.to_owned()),
            nodes,
            links,
            ..Self::default()
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(raw).context("invalid batch JSON")?;
        let object = parsed
            .as_object()
            .ok_or_else(|| anyhow!("batch must be a JSON object"))?;

        let status = object
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let mut batch = Self {
            status,
            ..Self::default()
        };

        for value in entries(object.get("nodes")) {
            match NodeRecord::deserialize(value) {
                Ok(node) => batch.nodes.push(node),
                Err(_) => batch.malformed_nodes += 1,
            }
        }

        for value in entries(object.get("links")) {
            match EdgeRecord::deserialize(value) {
                Ok(edge) => batch.links.push(edge),
                Err(_) => batch.malformed_edges += 1,
            }
        }

        Ok(batch)
    }

    pub fn is_success(&self) -> bool {
        self.status.as_deref() == Some(SUCCESS_STATUS)
    }

    pub fn into_snapshot(self) -> Option<Snapshot> {
        self.is_success()
            .then(|| Snapshot::new(self.nodes, self.links))
    }
}

fn entries(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flat_map(|array| array.iter())
}

pub fn read_batch_file(path: &Path) -> Result<IncomingBatch> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read batch {}", path.display()))?;
    IncomingBatch::parse(&raw).with_context(|| format!("failed to parse batch {}", path.display()))
}

/// New `*.json` files in `dir`, sorted by name, that are not in `seen`.
pub fn scan_batch_dir(dir: &Path, seen: &HashSet<PathBuf>) -> Result<Vec<PathBuf>> {
    let mut fresh = std::fs::read_dir(dir)
        .with_context(|| format!("failed to list batch directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
                && !seen.contains(path)
        })
        .collect::<Vec<_>>();
    fresh.sort();
    Ok(fresh)
}

#[derive(Debug)]
pub enum FeedMessage {
    Batch { source: PathBuf, batch: IncomingBatch },
    Failed { source: PathBuf, error: String },
}

/// Background worker that turns batch files dropped into a directory into
/// finished [`IncomingBatch`]es. Producers should write to a temporary name
/// and rename into place; each file is read once.
pub struct BatchFeed {
    dir: PathBuf,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    rx: Option<Receiver<FeedMessage>>,
}

impl BatchFeed {
    pub fn new(dir: PathBuf, poll_interval: Duration) -> Self {
        Self {
            dir,
            poll_interval: poll_interval.max(Duration::from_millis(10)),
            stop: Arc::new(AtomicBool::new(false)),
            worker: None,
            rx: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }

        let (tx, rx) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let dir = self.dir.clone();
        let poll_interval = self.poll_interval;
        let worker_stop = Arc::clone(&stop);

        self.worker = Some(thread::spawn(move || {
            run_feed(&dir, poll_interval, &worker_stop, &tx);
        }));
        self.stop = stop;
        self.rx = Some(rx);
        info!(dir = %self.dir.display(), "batch feed started");
    }

    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.stop.store(true, Ordering::Release);
        if worker.join().is_err() {
            warn!(dir = %self.dir.display(), "batch feed worker panicked");
        }
        self.rx = None;
        info!(dir = %self.dir.display(), "batch feed stopped");
    }

    /// Everything the worker has finished since the last call.
    pub fn drain(&self) -> Vec<FeedMessage> {
        self.rx
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }
}

impl Drop for BatchFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_feed(dir: &Path, poll_interval: Duration, stop: &AtomicBool, tx: &Sender<FeedMessage>) {
    let mut seen = HashSet::new();
    let mut reported_scan_error = false;

    while !stop.load(Ordering::Acquire) {
        match scan_batch_dir(dir, &seen) {
            Ok(paths) => {
                reported_scan_error = false;
                for path in paths {
                    seen.insert(path.clone());
                    let message = match read_batch_file(&path) {
                        Ok(batch) => {
                            debug!(path = %path.display(), nodes = batch.nodes.len(), "read batch");
                            FeedMessage::Batch {
                                source: path,
                                batch,
                            }
                        }
                        Err(error) => FeedMessage::Failed {
                            source: path,
                            error: format!("{error:#}"),
                        },
                    };
                    if tx.send(message).is_err() {
                        return;
                    }
                }
            }
            Err(error) if !reported_scan_error => {
                warn!("{error:#}");
                reported_scan_error = true;
            }
            Err(_) => {}
        }

        let deadline = Instant::now() + poll_interval;
        while !stop.load(Ordering::Acquire) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10).min(poll_interval));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_entries_that_fail_to_deserialize() {
        let batch = IncomingBatch::parse(
            r#"{
                "status": "success",
                "nodes": [{"id": "a"}, {"id": 7}, "junk", {"id": "b", "val": 4}],
                "links": [{"source": "a", "target": "b"}, {"source": 3, "target": "b"}]
            }"#,
        )
        .unwrap();

        assert!(batch.is_success());
        assert_eq!(batch.nodes.len(), 2);
        assert_eq!(batch.malformed_nodes, 2);
        assert_eq!(batch.links.len(), 1);
        assert_eq!(batch.malformed_edges, 1);
    }

    #[test]
    fn non_success_status_yields_no_snapshot() {
        let batch = IncomingBatch::parse(r#"{"status": "pending", "nodes": [{"id": "a"}]}"#).unwrap();
        assert!(batch.into_snapshot().is_none());

        let batch = IncomingBatch::parse(r#"{"nodes": [{"id": "a"}]}"#).unwrap();
        assert!(batch.into_snapshot().is_none());
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert!(IncomingBatch::parse("[1, 2]").is_err());
        assert!(IncomingBatch::parse("{").is_err());
    }

    #[test]
    fn scan_returns_new_json_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let mut seen = HashSet::new();
        let first = scan_batch_dir(dir.path(), &seen).unwrap();
        assert_eq!(
            first,
            vec![dir.path().join("a.json"), dir.path().join("b.json")]
        );

        seen.extend(first);
        assert!(scan_batch_dir(dir.path(), &seen).unwrap().is_empty());
    }

    #[test]
    fn feed_delivers_batches_and_stops_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("001.json"),
            r#"{"status": "success", "nodes": [{"id": "x"}], "links": []}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("002.json"), "not json").unwrap();

        let mut feed = BatchFeed::new(dir.path().to_path_buf(), Duration::from_millis(10));
        feed.start();
        assert!(feed.is_running());

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut messages = Vec::new();
        while messages.len() < 2 && Instant::now() < deadline {
            messages.extend(feed.drain());
            thread::sleep(Duration::from_millis(5));
        }

        feed.stop();
        assert!(!feed.is_running());
        assert!(feed.drain().is_empty());

        assert_eq!(messages.len(), 2);
        assert!(matches!(
            &messages[0],
            FeedMessage::Batch { batch, .. } if batch.nodes[0].id == "x"
        ));
        assert!(matches!(&messages[1], FeedMessage::Failed { .. }));
    }
}
