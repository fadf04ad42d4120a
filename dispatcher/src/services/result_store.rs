//! Concurrency-safe key/value merge into shared JSON result documents
//!
//! Every document path is guarded by a `<path>.lock` marker file created with
//! exclusive-create semantics, so independent dispatcher processes serialize
//! their read-modify-write cycles. Writers inside one process additionally
//! queue on a per-path async mutex and only contend on the marker with other
//! processes.
//!
//! A process that dies while holding a marker leaves it behind. With no
//! `stale_after` configured the path then stays locked until the marker is
//! removed by hand.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use shared::{run_debug, run_error, run_warn};
use crate::error::{DispatchError, DispatchResult};

/// JSON object stored at a result path
pub type ResultDocument = Map<String, Value>;

/// Lock acquisition budget and stale-marker policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSettings {
    /// Total create attempts before giving up
    pub attempts: u32,
    /// Wait after failed attempt `n` is `base_delay * n`
    pub base_delay: Duration,
    /// Markers older than this are treated as abandoned and removed
    pub stale_after: Option<Duration>,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
            stale_after: None,
        }
    }
}

/// Exclusive marker for one document path, held for one merge
#[derive(Debug)]
pub struct LockToken {
    marker: PathBuf,
    released: bool,
}

impl LockToken {
    pub fn marker(&self) -> &Path {
        &self.marker
    }

    /// Remove the marker file
    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = fs::remove_file(&self.marker).await {
            if e.kind() != ErrorKind::NotFound {
                run_warn!("⚠️ Failed to remove lock {}: {}", self.marker.display(), e);
            }
        }
    }
}

impl Drop for LockToken {
    fn drop(&mut self) {
        // Reached when the merge future is dropped mid-flight
        if !self.released {
            let _ = std::fs::remove_file(&self.marker);
        }
    }
}

/// Marker path guarding `path`
pub fn lock_path(path: &Path) -> PathBuf {
    let mut marker = path.as_os_str().to_owned();
    marker.push(".lock");
    PathBuf::from(marker)
}

fn steal_guard_path(marker: &Path) -> PathBuf {
    let mut guard = marker.as_os_str().to_owned();
    guard.push(".steal");
    PathBuf::from(guard)
}

/// Marker content identifying one acquisition: process id and a random nonce
fn owner_stamp() -> String {
    format!("{} {:016x}", std::process::id(), rand::random::<u64>())
}

/// Stamp and modification time of a marker file
#[derive(Debug, PartialEq, Eq)]
struct MarkerState {
    stamp: String,
    modified: SystemTime,
}

impl MarkerState {
    /// Current state of `marker`, or `None` once it is gone
    async fn inspect(marker: &Path) -> std::io::Result<Option<Self>> {
        let modified = match fs::metadata(marker).await {
            Ok(metadata) => metadata.modified()?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match fs::read_to_string(marker).await {
            Ok(stamp) => Ok(Some(Self { stamp, modified })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn age(&self) -> Duration {
        SystemTime::now().duration_since(self.modified).unwrap_or(Duration::ZERO)
    }
}

/// Remove a steal guard left behind by a process that died while holding it
async fn clear_abandoned_guard(guard: &Path, ttl: Duration) -> DispatchResult<()> {
    let Some(state) = MarkerState::inspect(guard).await? else {
        return Ok(());
    };
    if state.age() >= ttl {
        run_warn!("⚠️ Removing abandoned steal guard {}", guard.display());
        match fs::remove_file(guard).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut temp = path.as_os_str().to_owned();
    temp.push(format!(".{}.tmp", std::process::id()));
    PathBuf::from(temp)
}

/// Read-modify-write store for result documents
#[derive(Debug, Default)]
pub struct ResultStore {
    settings: LockSettings,
    local_gates: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl ResultStore {
    pub fn new(settings: LockSettings) -> Self {
        Self {
            settings,
            local_gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// Set `key` to `value` in the document at `path`, keeping every other key
    pub async fn merge(&self, path: &Path, key: impl Into<String>, value: Value) -> DispatchResult<()> {
        let mut entries = Map::new();
        entries.insert(key.into(), value);
        self.merge_entries(path, entries).await
    }

    /// Apply several key updates to one document under a single lock
    pub async fn merge_entries(&self, path: &Path, entries: ResultDocument) -> DispatchResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let gate = self.local_gate(path);
        let _local = gate.lock().await;

        let token = self.acquire(path).await?;
        let outcome = Self::apply(path, entries).await;
        token.release().await;

        if let Err(e) = &outcome {
            run_error!("❌ Merge into {} failed: {}", path.display(), e);
        }
        outcome
    }

    /// Current content of a document; a missing file is an empty document
    pub async fn read(&self, path: &Path) -> DispatchResult<ResultDocument> {
        read_document(path).await
    }

    /// Take the marker for `path`, waiting `base_delay * attempt` between tries
    pub async fn acquire(&self, path: &Path) -> DispatchResult<LockToken> {
        let marker = lock_path(path);
        let mut attempt = 1;

        loop {
            match fs::OpenOptions::new().write(true).create_new(true).open(&marker).await {
                Ok(mut file) => {
                    // Dropping the token on a failed write removes the marker again
                    let token = LockToken { marker, released: false };
                    file.write_all(owner_stamp().as_bytes()).await?;
                    file.flush().await?;
                    run_debug!("🔒 Acquired {}", token.marker.display());
                    return Ok(token);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if self.remove_if_stale(&marker).await? {
                        continue;
                    }
                    if attempt >= self.settings.attempts {
                        run_error!(
                            "❌ Could not get lock for {} after {} attempts",
                            path.display(),
                            self.settings.attempts
                        );
                        return Err(DispatchError::LockUnavailable {
                            path: path.to_path_buf(),
                            attempts: self.settings.attempts,
                        });
                    }
                    run_debug!("⏳ {} is locked (attempt {}), waiting", path.display(), attempt);
                    tokio::time::sleep(self.settings.base_delay * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Remove `marker` when it is older than the configured TTL
    ///
    /// Returns `true` when the marker is gone and creation should be retried
    /// at once. Removal happens under a `<marker>.steal` guard and only if the
    /// marker still carries the stamp and mtime seen when it was judged stale,
    /// so a fresh marker taken by another contender is never removed.
    async fn remove_if_stale(&self, marker: &Path) -> DispatchResult<bool> {
        let Some(ttl) = self.settings.stale_after else {
            return Ok(false);
        };

        let Some(observed) = MarkerState::inspect(marker).await? else {
            // Holder released between our create attempt and this check
            return Ok(true);
        };
        let age = observed.age();
        if age < ttl {
            return Ok(false);
        }

        let guard_path = steal_guard_path(marker);
        let guard = match fs::OpenOptions::new().write(true).create_new(true).open(&guard_path).await {
            Ok(_) => LockToken { marker: guard_path, released: false },
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                clear_abandoned_guard(&guard_path, ttl).await?;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let outcome: DispatchResult<bool> = match MarkerState::inspect(marker).await {
            Ok(None) => Ok(true),
            Ok(Some(current)) if current == observed => {
                run_warn!(
                    "⚠️ Removing stale lock {} ({}s old, ttl {}s)",
                    marker.display(),
                    age.as_secs(),
                    ttl.as_secs()
                );
                match fs::remove_file(marker).await {
                    Ok(()) => Ok(true),
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
                    Err(e) => Err(e.into()),
                }
            }
            Ok(Some(_)) => {
                run_debug!("{} was replaced before it could be removed", marker.display());
                Ok(false)
            }
            Err(e) => Err(e.into()),
        };
        guard.release().await;
        outcome
    }

    async fn apply(path: &Path, entries: ResultDocument) -> DispatchResult<()> {
        let mut document = read_document(path).await?;
        document.extend(entries);
        write_atomic(path, &serde_json::to_vec_pretty(&document)?).await
    }

    fn local_gate(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self
            .local_gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        gates.entry(path.to_path_buf()).or_default().clone()
    }
}

async fn read_document(path: &Path) -> DispatchResult<ResultDocument> {
    match fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(Map::new()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Map::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write through a sibling temp file and rename over the target
pub async fn write_atomic(path: &Path, content: &[u8]) -> DispatchResult<()> {
    let temp = temp_path(path);
    fs::write(&temp, content).await?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Render a single-row table: a region label followed by one `dim_i` column per value
pub fn embedding_table(region: &str, embedding: &[f64]) -> String {
    let header: Vec<String> = (0..embedding.len()).map(|i| format!("dim_{i}")).collect();
    let row: Vec<String> = embedding.iter().map(|value| value.to_string()).collect();
    format!(",{}\n{},{}\n", header.join(","), csv_field(region), row.join(","))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write a region's embedding table, creating parent directories as needed
pub async fn write_embedding(path: &Path, region: &str, embedding: &[f64]) -> DispatchResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    write_atomic(path, embedding_table(region, embedding).as_bytes()).await
}
