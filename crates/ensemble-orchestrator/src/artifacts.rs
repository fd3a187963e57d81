use async_trait::async_trait;
use ensemble_core::{ArtifactRecord, EnsembleError, EnsembleResult, TaskId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Durable storage for reports and bundles, keyed by `(task_id, filename)`.
///
/// Saving the same key twice overwrites; a retried save after a crash never
/// produces a second artifact.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn save(
        &self,
        task_id: &TaskId,
        filename: &str,
        content: &str,
    ) -> EnsembleResult<ArtifactRecord>;
}

/// Reject anything that could escape its directory when used as a path segment.
pub(crate) fn safe_segment<'a>(what: &str, value: &'a str) -> EnsembleResult<&'a str> {
    let bad = value.is_empty()
        || value == "."
        || value.contains("..")
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0');
    if bad {
        return Err(EnsembleError::Store(format!("invalid {what}: {value:?}")));
    }
    Ok(value)
}

/// Write `content` next to `path` and rename it into place.
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> EnsembleResult<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, content)
        .await
        .map_err(|e| EnsembleError::Store(format!("write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| EnsembleError::Store(format!("rename {}: {e}", path.display())))
}

/// Artifacts as files under `<root>/<task_id>/<filename>`.
pub struct FileArtifactStore {
    root: PathBuf,
}

impl FileArtifactStore {
    pub async fn new(root: PathBuf) -> EnsembleResult<Self> {
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, task_id: &TaskId, filename: &str) -> EnsembleResult<PathBuf> {
        let dir = safe_segment("task id", task_id.as_str())?;
        let file = safe_segment("artifact filename", filename)?;
        Ok(self.root.join(dir).join(file))
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn save(
        &self,
        task_id: &TaskId,
        filename: &str,
        content: &str,
    ) -> EnsembleResult<ArtifactRecord> {
        let path = self.path_for(task_id, filename)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EnsembleError::Store(format!("create {}: {e}", parent.display())))?;
        }
        write_atomic(&path, content.as_bytes()).await?;
        debug!(task_id = %task_id, path = %path.display(), "Artifact saved");
        Ok(ArtifactRecord::new(task_id.clone(), filename, content))
    }
}

/// In-process store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryArtifactStore {
    items: RwLock<BTreeMap<(TaskId, String), ArtifactRecord>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &TaskId, filename: &str) -> Option<ArtifactRecord> {
        self.items
            .read()
            .get(&(task_id.clone(), filename.to_string()))
            .cloned()
    }

    /// Every stored key, sorted.
    pub fn keys(&self) -> Vec<(TaskId, String)> {
        self.items.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryArtifactStore {
    async fn save(
        &self,
        task_id: &TaskId,
        filename: &str,
        content: &str,
    ) -> EnsembleResult<ArtifactRecord> {
        safe_segment("task id", task_id.as_str())?;
        safe_segment("artifact filename", filename)?;
        let record = ArtifactRecord::new(task_id.clone(), filename, content);
        self.items
            .write()
            .insert((task_id.clone(), filename.to_string()), record.clone());
        Ok(record)
    }
}
