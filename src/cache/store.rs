//! SQLite-backed cache store.
//!
//! One database holds the description cache, the advisory hit/miss counters,
//! and the metadata-analysis tables. All writes go through the connection
//! mutex and are scoped to a single statement or transaction; nothing holds
//! the lock across a subprocess or HTTP call.

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// One cached description row.
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub readme_hash: String,
    pub description: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_language: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_accessed: String,
}

/// Persisted counters plus totals recomputed on read.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub total_repositories: i64,
    pub cached_descriptions: i64,
    pub cache_hits: i64,
    pub cache_misses: i64,
    pub llm_api_calls: i64,
    pub last_updated: String,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS repositories (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    path          TEXT NOT NULL UNIQUE,
    name          TEXT NOT NULL DEFAULT '',
    readme_hash   TEXT NOT NULL DEFAULT '',
    description   TEXT NOT NULL DEFAULT '',
    llm_provider  TEXT NOT NULL DEFAULT '',
    llm_model     TEXT NOT NULL DEFAULT '',
    llm_language  TEXT NOT NULL DEFAULT '',
    created_at    TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at    TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    last_accessed TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS cache_stats (
    id            INTEGER PRIMARY KEY CHECK (id = 1),
    cache_hits    INTEGER NOT NULL DEFAULT 0,
    cache_misses  INTEGER NOT NULL DEFAULT 0,
    llm_api_calls INTEGER NOT NULL DEFAULT 0,
    last_updated  TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

INSERT OR IGNORE INTO cache_stats (id) VALUES (1);

CREATE TABLE IF NOT EXISTS repository_metadata (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id       INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    project_type        TEXT NOT NULL DEFAULT '',
    main_language       TEXT NOT NULL DEFAULT '',
    total_lines_of_code INTEGER NOT NULL DEFAULT 0,
    file_count          INTEGER NOT NULL DEFAULT 0,
    directory_count     INTEGER NOT NULL DEFAULT 0,
    repository_size     INTEGER NOT NULL DEFAULT 0,
    has_readme          INTEGER NOT NULL DEFAULT 0,
    has_license         INTEGER NOT NULL DEFAULT 0,
    has_tests           INTEGER NOT NULL DEFAULT 0,
    has_ci              INTEGER NOT NULL DEFAULT 0,
    has_docs            INTEGER NOT NULL DEFAULT 0,
    structure_hash      TEXT NOT NULL DEFAULT '',
    analyzed_at         TIMESTAMP,
    updated_at          TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(repository_id)
);

CREATE TABLE IF NOT EXISTS repository_languages (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    language      TEXT NOT NULL,
    percentage    REAL NOT NULL DEFAULT 0,
    lines_of_code INTEGER NOT NULL DEFAULT 0,
    file_count    INTEGER NOT NULL DEFAULT 0,
    bytes_count   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS repository_frameworks (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id    INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    framework        TEXT NOT NULL,
    version          TEXT NOT NULL DEFAULT '',
    category         TEXT NOT NULL DEFAULT '',
    confidence       REAL NOT NULL DEFAULT 0,
    detection_method TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS repository_licenses (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    license_name  TEXT NOT NULL,
    license_key   TEXT NOT NULL DEFAULT '',
    license_type  TEXT NOT NULL DEFAULT '',
    source_file   TEXT NOT NULL DEFAULT '',
    confidence    REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS repository_dependencies (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id   INTEGER NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
    dependency_name TEXT NOT NULL,
    version         TEXT NOT NULL DEFAULT '',
    dep_type        TEXT NOT NULL DEFAULT '',
    package_manager TEXT NOT NULL DEFAULT '',
    source_file     TEXT NOT NULL DEFAULT ''
);
";

/// Columns added since the first released schema. Applied after a
/// `PRAGMA table_info` inventory, so re-running is a no-op and no error
/// strings are ever inspected.
const MIGRATIONS: &[(&str, &str, &str)] = &[
    ("repositories", "llm_language", "TEXT NOT NULL DEFAULT ''"),
    (
        "repositories",
        "last_accessed",
        "TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP",
    ),
    ("repository_metadata", "structure_hash", "TEXT NOT NULL DEFAULT ''"),
];

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the cache database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create cache directory {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open cache database {}", db_path.display()))?;
        Self::init(conn, db_path.to_path_buf())
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::init(conn, PathBuf::from(":memory:"))
    }

    fn init(conn: Connection, db_path: PathBuf) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to configure cache database")?;

        conn.execute_batch(SCHEMA)
            .context("failed to initialize cache schema")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Add columns missing from older databases. Idempotent by design: the
    /// column inventory is read first, so nothing relies on error text.
    fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        for (table, column, decl) in MIGRATIONS {
            if !column_exists(&conn, table, column)? {
                debug!("migrating: adding {table}.{column}");
                conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"))
                    .with_context(|| format!("failed to add column {table}.{column}"))?;
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Size of the database file in bytes.
    pub fn db_size(&self) -> Result<u64> {
        let meta = std::fs::metadata(&self.db_path)
            .with_context(|| format!("failed to stat {}", self.db_path.display()))?;
        Ok(meta.len())
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("cache store mutex poisoned")
    }

    /// Look up a cached description. A row is a hit only when both the path
    /// and the README hash match. Hits bump `cache_hits` and refresh
    /// `last_accessed`; a missing row bumps `cache_misses`.
    pub fn lookup_description(&self, path: &str, readme_hash: &str) -> Result<Option<CacheEntry>> {
        let conn = self.lock();

        let entry = conn
            .query_row(
                "SELECT id, path, name, readme_hash, description,
                        llm_provider, llm_model, llm_language,
                        created_at, updated_at, last_accessed
                 FROM repositories
                 WHERE path = ?1 AND readme_hash = ?2",
                params![path, readme_hash],
                |row| {
                    Ok(CacheEntry {
                        id: row.get(0)?,
                        path: row.get(1)?,
                        name: row.get(2)?,
                        readme_hash: row.get(3)?,
                        description: row.get(4)?,
                        llm_provider: row.get(5)?,
                        llm_model: row.get(6)?,
                        llm_language: row.get(7)?,
                        created_at: row.get(8)?,
                        updated_at: row.get(9)?,
                        last_accessed: row.get(10)?,
                    })
                },
            )
            .optional()
            .context("failed to query description cache")?;

        match entry {
            Some(entry) => {
                // Counter updates are advisory; their failures are not
                // allowed to turn a hit into an error.
                let _ = conn.execute(
                    "UPDATE repositories SET last_accessed = CURRENT_TIMESTAMP WHERE id = ?1",
                    params![entry.id],
                );
                let _ = conn.execute(
                    "UPDATE cache_stats
                     SET cache_hits = cache_hits + 1, last_updated = CURRENT_TIMESTAMP
                     WHERE id = 1",
                    [],
                );
                debug!("cache hit: {path}");
                Ok(Some(entry))
            }
            None => {
                let _ = conn.execute(
                    "UPDATE cache_stats
                     SET cache_misses = cache_misses + 1, last_updated = CURRENT_TIMESTAMP
                     WHERE id = 1",
                    [],
                );
                Ok(None)
            }
        }
    }

    /// Upsert a description row. The row is replaced atomically: `path`
    /// keeps its id and `created_at`, everything else is overwritten.
    /// Bumps `llm_api_calls`.
    pub fn save_description(
        &self,
        path: &str,
        name: &str,
        readme_hash: &str,
        description: &str,
        llm_provider: &str,
        llm_model: &str,
        llm_language: &str,
    ) -> Result<()> {
        let conn = self.lock();

        conn.execute(
            "INSERT INTO repositories
                 (path, name, readme_hash, description, llm_provider, llm_model, llm_language)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                 name = excluded.name,
                 readme_hash = excluded.readme_hash,
                 description = excluded.description,
                 llm_provider = excluded.llm_provider,
                 llm_model = excluded.llm_model,
                 llm_language = excluded.llm_language,
                 updated_at = CURRENT_TIMESTAMP,
                 last_accessed = CURRENT_TIMESTAMP",
            params![path, name, readme_hash, description, llm_provider, llm_model, llm_language],
        )
        .context("failed to save description")?;

        let _ = conn.execute(
            "UPDATE cache_stats
             SET llm_api_calls = llm_api_calls + 1, last_updated = CURRENT_TIMESTAMP
             WHERE id = 1",
            [],
        );

        debug!("cached description for {path}");
        Ok(())
    }

    /// Counters plus derived totals recomputed on read.
    pub fn stats(&self) -> Result<CacheStats> {
        let conn = self.lock();

        let mut stats = conn
            .query_row(
                "SELECT cache_hits, cache_misses, llm_api_calls, last_updated
                 FROM cache_stats WHERE id = 1",
                [],
                |row| {
                    Ok(CacheStats {
                        cache_hits: row.get(0)?,
                        cache_misses: row.get(1)?,
                        llm_api_calls: row.get(2)?,
                        last_updated: row.get(3)?,
                        ..CacheStats::default()
                    })
                },
            )
            .context("failed to read cache stats")?;

        stats.total_repositories =
            conn.query_row("SELECT COUNT(*) FROM repositories", [], |row| row.get(0))?;
        stats.cached_descriptions = conn.query_row(
            "SELECT COUNT(*) FROM repositories WHERE description != ''",
            [],
            |row| row.get(0),
        )?;

        Ok(stats)
    }

    /// Truncate every table and reset the counters, all in one transaction.
    pub fn clear(&self) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction().context("failed to begin transaction")?;

        for table in [
            "repository_dependencies",
            "repository_licenses",
            "repository_frameworks",
            "repository_languages",
            "repository_metadata",
            "repositories",
        ] {
            tx.execute(&format!("DELETE FROM {table}"), [])
                .with_context(|| format!("failed to clear table {table}"))?;
        }

        tx.execute(
            "UPDATE cache_stats
             SET cache_hits = 0, cache_misses = 0, llm_api_calls = 0,
                 last_updated = CURRENT_TIMESTAMP
             WHERE id = 1",
            [],
        )?;

        tx.commit().context("failed to commit cache clear")?;
        debug!("cache cleared");
        Ok(())
    }

    /// Delete one repository row; metadata rows go with it via cascade.
    /// Returns whether a row existed.
    pub fn remove(&self, path: &str) -> Result<bool> {
        let conn = self.lock();
        let affected = conn
            .execute("DELETE FROM repositories WHERE path = ?1", params![path])
            .context("failed to remove cache entry")?;
        Ok(affected > 0)
    }

    /// Run `f` inside a transaction. Used by the metadata cache so one
    /// analysis lands atomically.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.lock();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let value = f(&tx)?;
        tx.commit().context("failed to commit transaction")?;
        Ok(value)
    }

    /// Read-only access for query helpers that manage their own statements.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&conn)
    }
}

/// Find or insert the repository row for `path`, returning its id.
pub fn get_or_create_repository(tx: &Transaction, path: &str, name: &str) -> Result<i64> {
    let existing: Option<i64> = tx
        .query_row(
            "SELECT id FROM repositories WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    tx.execute(
        "INSERT INTO repositories (path, name) VALUES (?1, ?2)",
        params![path, name],
    )?;
    Ok(tx.last_insert_rowid())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
