//! SQLite-based vector index implementation.
//!
//! Entries live in a single SQLite file and are scored in Rust with an exact
//! scan, which is plenty for the few hundred chunks of one transcript.
//! `insert` rewrites the table inside one transaction, so after a crash the
//! file holds either the complete previous batch or the complete new one.

use super::{nearest, validate_entries, DistanceMetric, IndexEntry, Neighbor, VectorIndex};
use crate::error::{GlimpseError, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, instrument, warn};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS entries (
        position INTEGER PRIMARY KEY,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// SQLite-based vector index.
pub struct SqliteIndex {
    conn: Mutex<Connection>,
    metric: DistanceMetric,
    // Declared after `conn`: the connection closes before the files go.
    files: IndexFiles,
}

/// The database file and its WAL companions.
struct IndexFiles {
    path: Option<PathBuf>,
    discard: AtomicBool,
}

impl Drop for IndexFiles {
    fn drop(&mut self) {
        if !*self.discard.get_mut() {
            return;
        }
        if let Some(path) = &self.path {
            remove_index_files(path);
        }
    }
}

/// Delete an index file with its `-wal` and `-shm` companions.
///
/// Best effort: failures are logged and otherwise ignored.
fn remove_index_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let file = PathBuf::from(format!("{}{}", path.display(), suffix));
        if !file.exists() {
            continue;
        }
        match std::fs::remove_file(&file) {
            Ok(()) => debug!("Removed {}", file.display()),
            Err(e) => warn!("Failed to remove old index file {}: {}", file.display(), e),
        }
    }
}

impl SqliteIndex {
    /// Open (or create) an index file.
    ///
    /// Fails with `InvalidConfiguration` if the file was built with another metric.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path, metric: DistanceMetric) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        Self::init(&conn, metric)?;

        info!("Opened SQLite index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            metric,
            files: IndexFiles {
                path: Some(path.to_path_buf()),
                discard: AtomicBool::new(false),
            },
        })
    }

    /// Create an in-memory SQLite index (useful for testing).
    pub fn in_memory(metric: DistanceMetric) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn, metric)?;

        Ok(Self {
            conn: Mutex::new(conn),
            metric,
            files: IndexFiles {
                path: None,
                discard: AtomicBool::new(false),
            },
        })
    }

    /// Location of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.files.path.as_deref()
    }

    fn init(conn: &Connection, metric: DistanceMetric) -> Result<()> {
        conn.execute_batch(SCHEMA)?;

        let stored: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'metric'", [], |row| {
                row.get(0)
            })
            .optional()?;

        match stored {
            Some(stored) if stored != metric.to_string() => {
                Err(GlimpseError::InvalidConfiguration(format!(
                    "index was built with the {} metric but {} is configured",
                    stored, metric
                )))
            }
            Some(_) => Ok(()),
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('metric', ?1)",
                    params![metric.to_string()],
                )?;
                Ok(())
            }
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| GlimpseError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn load_entries(conn: &Connection) -> Result<Vec<IndexEntry>> {
        let mut stmt =
            conn.prepare("SELECT content, embedding FROM entries ORDER BY position")?;

        let rows = stmt.query_map([], |row| {
            let content: String = row.get(0)?;
            let bytes: Vec<u8> = row.get(1)?;
            Ok(IndexEntry {
                text: content,
                embedding: bytes_to_embedding(&bytes),
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(GlimpseError::from)
    }

    /// When the current content was committed (RFC 3339), if ever.
    pub fn built_at(&self) -> Result<Option<String>> {
        let conn = self.lock()?;
        let built_at = conn
            .query_row("SELECT value FROM meta WHERE key = 'built_at'", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(built_at)
    }
}

/// Serialize embedding to little-endian bytes.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from little-endian bytes.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let dimension = validate_entries(&entries)?;
        let conn = self.lock()?;

        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM entries", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entries (position, content, embedding) VALUES (?1, ?2, ?3)",
            )?;
            for (position, entry) in entries.iter().enumerate() {
                stmt.execute(params![
                    position as i64,
                    entry.text,
                    embedding_to_bytes(&entry.embedding),
                ])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('dimension', ?1)",
            params![dimension.unwrap_or(0).to_string()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('built_at', ?1)",
            params![Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        info!("Committed {} index entries", entries.len());
        Ok(())
    }

    #[instrument(skip(self, vector))]
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let entries = {
            let conn = self.lock()?;
            Self::load_entries(&conn)?
        };

        let results = nearest(self.metric, &entries, vector, k)?;
        debug!("Found {} neighbours among {} entries", results.len(), entries.len());
        Ok(results)
    }

    async fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn discard_on_drop(&self, discard: bool) {
        self.files.discard.store(discard, Ordering::SeqCst);
    }
}
