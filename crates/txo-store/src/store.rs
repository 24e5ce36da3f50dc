//! `TaskStore`: the durable map from `task_id` to `TaskRecord` (spec §4.1).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{info, warn};
use txo_models::{TaskId, TaskRecord};

use crate::error::{StoreError, StoreResult};

/// In-memory snapshot that is serialized wholesale on every mutation.
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Document {
    tasks: HashMap<TaskId, TaskRecord>,
}

pub struct TaskStore {
    path: PathBuf,
    inner: Mutex<HashMap<TaskId, TaskRecord>>,
    fallback_warned: AtomicBool,
}

impl TaskStore {
    /// Loads the store from `canonical_path`, falling back to a file in the
    /// system temp directory if the canonical parent directory cannot be
    /// created or written to. Tolerates a missing or corrupt document: logs
    /// and starts empty rather than failing startup.
    pub async fn load(canonical_path: impl Into<PathBuf>) -> Self {
        let canonical_path = canonical_path.into();
        let path = resolve_writable_path(&canonical_path).await;
        let tasks = load_document(&path).await;

        Self {
            path,
            inner: Mutex::new(tasks),
            fallback_warned: AtomicBool::new(false),
        }
    }

    pub async fn create(&self, record: TaskRecord) -> StoreResult<()> {
        let mut guard = self.inner.lock().await;
        if guard.contains_key(&record.task_id) {
            return Err(StoreError::AlreadyExists(record.task_id.clone()));
        }
        let task_id = record.task_id.clone();
        let previous = guard.insert(task_id.clone(), record);
        if let Err(err) = self.persist(&guard).await {
            // Roll back so memory and disk never diverge (spec §4.1 failure
            // semantics).
            match previous {
                Some(prior) => {
                    guard.insert(task_id, prior);
                }
                None => {
                    guard.remove(&task_id);
                }
            }
            return Err(err);
        }
        Ok(())
    }

    /// Atomic multi-insert: either all records appear or none do (spec §3
    /// invariant 6, the video fan-out).
    pub async fn create_many(&self, records: Vec<TaskRecord>) -> StoreResult<()> {
        let mut guard = self.inner.lock().await;
        for record in &records {
            if guard.contains_key(&record.task_id) {
                return Err(StoreError::AlreadyExists(record.task_id.clone()));
            }
        }

        let inserted_ids: Vec<TaskId> = records.iter().map(|r| r.task_id.clone()).collect();
        for record in records {
            guard.insert(record.task_id.clone(), record);
        }

        if let Err(err) = self.persist(&guard).await {
            for id in &inserted_ids {
                guard.remove(id);
            }
            return Err(err);
        }
        Ok(())
    }

    /// The resolved on-disk path backing this store, exposed for readiness
    /// probes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.inner.lock().await.get(task_id).cloned()
    }

    /// Read-modify-write under the store's lock. `mutator` must respect the
    /// task's state-machine invariants; its error (if any) is propagated and
    /// no persist is attempted.
    pub async fn update<F, E>(&self, task_id: &TaskId, mutator: F) -> StoreResult<TaskRecord>
    where
        F: FnOnce(&mut TaskRecord) -> Result<(), E>,
        StoreError: From<E>,
    {
        let mut guard = self.inner.lock().await;
        let record = guard
            .get_mut(task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.clone()))?;
        let before = record.clone();

        if let Err(err) = mutator(record) {
            *guard.get_mut(task_id).expect("record present") = before;
            return Err(err.into());
        }

        if let Err(err) = self.persist(&guard).await {
            guard.insert(task_id.clone(), before);
            return Err(err);
        }

        Ok(guard.get(task_id).expect("record present").clone())
    }

    pub async fn list(&self) -> Vec<TaskRecord> {
        self.inner.lock().await.values().cloned().collect()
    }

    /// Idempotent: deleting an absent task id is not an error.
    pub async fn delete(&self, task_id: &TaskId) -> StoreResult<()> {
        let mut guard = self.inner.lock().await;
        let previous = guard.remove(task_id);
        if previous.is_none() {
            return Ok(());
        }
        if let Err(err) = self.persist(&guard).await {
            guard.insert(task_id.clone(), previous.expect("checked above"));
            return Err(err);
        }
        Ok(())
    }

    async fn persist(&self, tasks: &HashMap<TaskId, TaskRecord>) -> StoreResult<()> {
        let document = Document {
            tasks: tasks.clone(),
        };
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &document))
            .await
            .expect("persist task panicked")
    }
}

/// Writes `document` to `path` via a temp-file-then-rename so a reader never
/// observes a partially-written document (grounded in the same pattern used
/// for crash-recovery snapshots elsewhere in this codebase).
fn write_atomic(path: &Path, document: &Document) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(StoreError::Persist)?;
    }
    let tmp_path = path.with_extension("tmp");
    let file = std::fs::File::create(&tmp_path).map_err(StoreError::Persist)?;
    if let Err(err) = serde_json::to_writer(&file, document) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StoreError::Persist(err.into()));
    }
    if let Err(err) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StoreError::Persist(err));
    }
    Ok(())
}

async fn load_document(path: &Path) -> HashMap<TaskId, TaskRecord> {
    let path = path.to_path_buf();
    let loaded = tokio::task::spawn_blocking(move || -> Option<Document> {
        let file = std::fs::File::open(&path).ok()?;
        match serde_json::from_reader(std::io::BufReader::new(file)) {
            Ok(doc) => Some(doc),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "task store document is corrupt, starting empty");
                None
            }
        }
    })
    .await
    .expect("load task panicked");

    match loaded {
        Some(doc) => {
            info!(count = doc.tasks.len(), "loaded task store");
            doc.tasks
        }
        None => HashMap::new(),
    }
}

/// Probes whether `canonical_path`'s parent directory can be created and
/// written to; if not, falls back to a file in the system temp directory and
/// logs a warning (spec §4.1: "fall back ... and log a warning once per
/// process").
async fn resolve_writable_path(canonical_path: &Path) -> PathBuf {
    let probe_path = canonical_path.to_path_buf();
    let writable = tokio::task::spawn_blocking(move || {
        let Some(parent) = probe_path.parent() else {
            return false;
        };
        if std::fs::create_dir_all(parent).is_err() {
            return false;
        }
        let probe = parent.join(".txo-store-write-probe");
        let ok = std::fs::write(&probe, b"ok").is_ok();
        let _ = std::fs::remove_file(&probe);
        ok
    })
    .await
    .unwrap_or(false);

    if writable {
        return canonical_path.to_path_buf();
    }

    warn!(
        canonical = %canonical_path.display(),
        "task store directory is not writable, falling back to system temp directory"
    );
    std::env::temp_dir().join("txo-tasks.json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use txo_models::TaskOptions;

    fn sample(id: &str) -> TaskRecord {
        TaskRecord::new(TaskId::from(id), "a.wav", "/audios/a.wav", TaskOptions::default())
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::load(dir.path().join("tasks.json")).await;
        let record = sample("20260101_000000_aaaaaaaa");
        store.create(record.clone()).await.unwrap();
        let fetched = store.get(&record.task_id).await.unwrap();
        assert_eq!(fetched.task_id, record.task_id);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::load(dir.path().join("tasks.json")).await;
        let record = sample("20260101_000000_aaaaaaaa");
        store.create(record.clone()).await.unwrap();
        let err = store.create(record).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn create_many_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::load(dir.path().join("tasks.json")).await;
        let first = sample("20260101_000000_aaaaaaaa");
        let dup = sample("20260101_000000_aaaaaaaa");
        let second = sample("20260101_000000_bbbbbbbb");

        store.create(first.clone()).await.unwrap();
        let err = store.create_many(vec![second, dup]).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(store.list().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::load(dir.path().join("tasks.json")).await;
        let id = TaskId::from("20260101_000000_aaaaaaaa");
        store.delete(&id).await.unwrap();
        store.create(sample(id.as_str())).await.unwrap();
        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        assert!(store.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn reload_survives_process_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.json");
        {
            let store = TaskStore::load(&path).await;
            store.create(sample("20260101_000000_aaaaaaaa")).await.unwrap();
        }
        let reloaded = TaskStore::load(&path).await;
        assert_eq!(reloaded.list().await.len(), 1);
    }

    #[tokio::test]
    async fn update_rolls_back_on_illegal_transition() {
        let dir = tempfile::tempdir().unwrap();
        let store = TaskStore::load(dir.path().join("tasks.json")).await;
        let record = sample("20260101_000000_aaaaaaaa");
        store.create(record.clone()).await.unwrap();

        let err = store
            .update(&record.task_id, |task| task.complete("/out.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition(_)));

        let fetched = store.get(&record.task_id).await.unwrap();
        assert_eq!(fetched.status, txo_models::TaskStatus::Pending);
    }
}
