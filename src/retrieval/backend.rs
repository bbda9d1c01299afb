//! Where index generations live.

use crate::config::{IndexBackendKind, Settings};
use crate::error::{GlimpseError, Result};
use crate::vector_store::{DistanceMetric, MemoryIndex, SqliteIndex, VectorIndex};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Name of the pointer file naming the active generation.
const ACTIVE_FILE: &str = "ACTIVE";

/// Factory for fresh index generations.
#[derive(Debug, Clone)]
pub enum IndexBackend {
    /// Indexes live in process memory and die with it.
    Memory { metric: DistanceMetric },
    /// One SQLite file per generation under `dir`, plus an `ACTIVE` pointer.
    Sqlite { dir: PathBuf, metric: DistanceMetric },
}

impl IndexBackend {
    pub fn memory(metric: DistanceMetric) -> Self {
        IndexBackend::Memory { metric }
    }

    pub fn sqlite(dir: impl Into<PathBuf>, metric: DistanceMetric) -> Self {
        IndexBackend::Sqlite {
            dir: dir.into(),
            metric,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let metric = settings.retrieval.metric;
        match settings.retrieval.backend {
            IndexBackendKind::Memory => Self::memory(metric),
            IndexBackendKind::Sqlite => Self::sqlite(settings.index_dir(), metric),
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        match self {
            IndexBackend::Memory { metric } | IndexBackend::Sqlite { metric, .. } => *metric,
        }
    }

    fn generation_path(dir: &Path, generation: &Uuid) -> PathBuf {
        dir.join(format!("index-{}.sqlite3", generation))
    }

    /// Create an empty index for a new generation.
    ///
    /// The index is marked for discard, so its files disappear with the last
    /// handle unless the caller keeps it with `discard_on_drop(false)`.
    pub(crate) fn create(&self, generation: &Uuid) -> Result<Arc<dyn VectorIndex>> {
        let index: Arc<dyn VectorIndex> = match self {
            IndexBackend::Memory { metric } => Arc::new(MemoryIndex::new(*metric)),
            IndexBackend::Sqlite { dir, metric } => {
                let path = Self::generation_path(dir, generation);
                Arc::new(SqliteIndex::open(&path, *metric)?)
            }
        };
        index.discard_on_drop(true);
        Ok(index)
    }

    /// Record `generation` as the one to reopen after a restart.
    ///
    /// The pointer is replaced with a rename, so readers see the old or the
    /// new name and never a partial write.
    pub(crate) fn activate(&self, generation: &Uuid) -> Result<()> {
        let IndexBackend::Sqlite { dir, .. } = self else {
            return Ok(());
        };

        let file_name = format!("index-{}.sqlite3", generation);
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(file_name.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(dir.join(ACTIVE_FILE))
            .map_err(|e| GlimpseError::Io(e.error))?;

        debug!("Active index pointer now names {}", file_name);
        Ok(())
    }

    /// Reopen the generation named by the pointer file, if there is one.
    pub(crate) fn restore(&self) -> Result<Option<(Uuid, Arc<dyn VectorIndex>)>> {
        let IndexBackend::Sqlite { dir, metric } = self else {
            return Ok(None);
        };

        let pointer = dir.join(ACTIVE_FILE);
        if !pointer.exists() {
            return Ok(None);
        }

        let file_name = std::fs::read_to_string(&pointer)?;
        let file_name = file_name.trim();
        let generation = file_name
            .strip_prefix("index-")
            .and_then(|rest| rest.strip_suffix(".sqlite3"))
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| {
                GlimpseError::VectorStore(format!(
                    "{} names an unexpected file: {:?}",
                    pointer.display(),
                    file_name
                ))
            })?;

        let path = Self::generation_path(dir, &generation);
        if !path.exists() {
            return Err(GlimpseError::VectorStore(format!(
                "active index {} is missing",
                path.display()
            )));
        }

        info!("Restoring index generation {}", generation);
        let index: Arc<dyn VectorIndex> = Arc::new(SqliteIndex::open(&path, *metric)?);
        Ok(Some((generation, index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::IndexEntry;

    #[tokio::test]
    async fn test_activate_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let backend = IndexBackend::sqlite(dir.path(), DistanceMetric::Cosine);
        let generation = Uuid::new_v4();

        let index = backend.create(&generation).unwrap();
        index
            .insert(vec![IndexEntry::new("hello", vec![1.0, 0.0])])
            .await
            .unwrap();
        index.discard_on_drop(false);
        backend.activate(&generation).unwrap();

        let (restored, index) = backend.restore().unwrap().unwrap();
        assert_eq!(restored, generation);
        assert_eq!(index.len().await.unwrap(), 1);
    }

    #[test]
    fn test_restore_without_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let backend = IndexBackend::sqlite(dir.path(), DistanceMetric::Cosine);
        assert!(backend.restore().unwrap().is_none());
        assert!(IndexBackend::memory(DistanceMetric::Cosine)
            .restore()
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_garbled_pointer_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ACTIVE_FILE), "something-else").unwrap();
        let backend = IndexBackend::sqlite(dir.path(), DistanceMetric::Cosine);
        assert!(matches!(
            backend.restore(),
            Err(GlimpseError::VectorStore(_))
        ));
    }

    #[test]
    fn test_unkept_generation_is_deleted_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let backend = IndexBackend::sqlite(dir.path(), DistanceMetric::Cosine);

        let abandoned = Uuid::new_v4();
        drop(backend.create(&abandoned).unwrap());
        assert!(!IndexBackend::generation_path(dir.path(), &abandoned).exists());

        let kept = Uuid::new_v4();
        let index = backend.create(&kept).unwrap();
        index.discard_on_drop(false);
        drop(index);
        assert!(IndexBackend::generation_path(dir.path(), &kept).exists());
    }
}
