//! SQLite-backed document store.
//!
//! The tree is split into owner-level documents: everything under
//! `{root}/{collection}/{code}` is one JSON row. Reads above that depth
//! reassemble the rows; writes read-modify-write the touched rows inside one
//! `IMMEDIATE` transaction so concurrent writers on the same file serialize
//! instead of losing updates.
//!
//! Runtime pragmas:
//! - `journal_mode = WAL` so readers do not block the writer
//! - `busy_timeout = 5s`; a writer still locked out after that gets
//!   [`StoreError::Unavailable`]

pub mod migrations;
pub mod schema;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use super::{DocPath, DocumentStore, Patch, StoreError, tree};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Path depth at which the tree is split into rows.
pub const DOCUMENT_DEPTH: usize = 3;

type DocKey = (String, String, String);

/// Document store persisted in a single SQLite file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store file, apply pragmas and migrate the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file or its directory cannot be
    /// created, or the schema cannot be migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                StoreError::Io(format!("create store directory {}: {err}", parent.display()))
            })?;
        }

        let mut conn = Connection::open(path).map_err(sqlite_error)?;
        configure_connection(&conn).map_err(sqlite_error)?;
        migrations::migrate(&mut conn).map_err(sqlite_error)?;
        debug!(path = %path.display(), "opened sqlite document store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let mut conn = Connection::open_in_memory().map_err(sqlite_error)?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .map_err(sqlite_error)?;
        migrations::migrate(&mut conn).map_err(sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Backing file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of stored owner-level documents.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the count query fails.
    pub fn document_count(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .map_err(sqlite_error)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Corrupt {
            path: String::new(),
            reason: "sqlite connection lock poisoned".into(),
        })
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn sqlite_error(err: rusqlite::Error) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            StoreError::Unavailable(err.to_string())
        }
        _ => StoreError::Io(err.to_string()),
    }
}

fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

// ---------------------------------------------------------------------------
// Write planning
// ---------------------------------------------------------------------------

/// Row-level effect of one patch.
#[derive(Debug, Default)]
struct WritePlan {
    /// Subtrees above document depth that are replaced or deleted wholesale.
    cleared: Vec<DocPath>,
    /// Edits per document, as `(path inside the document, value)`.
    documents: BTreeMap<DocKey, Vec<(DocPath, Value)>>,
}

impl WritePlan {
    fn add(&mut self, target: DocPath, value: Value) -> Result<(), StoreError> {
        if target.len() >= DOCUMENT_DEPTH {
            let key = doc_key(&target);
            self.documents
                .entry(key)
                .or_default()
                .push((target.suffix(DOCUMENT_DEPTH), value));
            return Ok(());
        }

        match value {
            Value::Null => {
                self.cleared.push(target);
                Ok(())
            }
            Value::Object(children) => {
                self.cleared.push(target.clone());
                for (key, child) in children {
                    self.add(target.child(&key)?, child)?;
                }
                Ok(())
            }
            _ => Err(StoreError::InvalidPath {
                path: target.to_string(),
                reason: "only objects can be stored above document depth",
            }),
        }
    }
}

fn doc_key(path: &DocPath) -> DocKey {
    let segments = path.segments();
    (
        segments[0].clone(),
        segments[1].clone(),
        segments[2].clone(),
    )
}

fn doc_path(key: &DocKey) -> String {
    format!("{}/{}/{}", key.0, key.1, key.2)
}

fn parse_body(key: &DocKey, body: &str) -> Result<Value, StoreError> {
    serde_json::from_str(body).map_err(|err| StoreError::Corrupt {
        path: doc_path(key),
        reason: err.to_string(),
    })
}

fn load_document(conn: &Connection, key: &DocKey) -> Result<Option<Value>, StoreError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE root = ?1 AND collection = ?2 AND code = ?3",
            params![key.0, key.1, key.2],
            |row| row.get(0),
        )
        .optional()
        .map_err(sqlite_error)?;
    body.map(|body| parse_body(key, &body)).transpose()
}

/// Rows under a path shorter than [`DOCUMENT_DEPTH`].
fn scan_documents(conn: &Connection, prefix: &DocPath) -> Result<Vec<(DocKey, Value)>, StoreError> {
    let segments = prefix.segments();
    let (sql, args): (&str, Vec<&str>) = match segments {
        [] => ("SELECT root, collection, code, body FROM documents", vec![]),
        [root] => (
            "SELECT root, collection, code, body FROM documents WHERE root = ?1",
            vec![root.as_str()],
        ),
        [root, collection, ..] => (
            "SELECT root, collection, code, body FROM documents
             WHERE root = ?1 AND collection = ?2",
            vec![root.as_str(), collection.as_str()],
        ),
    };

    let mut stmt = conn.prepare(sql).map_err(sqlite_error)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args), |row| {
            Ok((
                (row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(sqlite_error)?;

    let mut documents = Vec::new();
    for row in rows {
        let (key, body) = row.map_err(sqlite_error)?;
        let value = parse_body(&key, &body)?;
        documents.push((key, value));
    }
    Ok(documents)
}

fn clear_prefix(conn: &Connection, prefix: &DocPath) -> Result<usize, StoreError> {
    let segments = prefix.segments();
    let deleted = match segments {
        [] => conn.execute("DELETE FROM documents", []),
        [root] => conn.execute("DELETE FROM documents WHERE root = ?1", params![root]),
        [root, collection, ..] => conn.execute(
            "DELETE FROM documents WHERE root = ?1 AND collection = ?2",
            params![root, collection],
        ),
    };
    deleted.map_err(sqlite_error)
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

impl DocumentStore for SqliteStore {
    fn read(&self, path: &DocPath) -> Result<Option<Value>, StoreError> {
        let conn = self.lock()?;

        if path.len() >= DOCUMENT_DEPTH {
            let key = doc_key(path);
            let Some(body) = load_document(&conn, &key)? else {
                return Ok(None);
            };
            return Ok(tree::get_value(&body, path.suffix(DOCUMENT_DEPTH).segments()).cloned());
        }

        let mut assembled = Value::Null;
        for (key, body) in scan_documents(&conn, path)? {
            let relative = [key.0, key.1, key.2];
            tree::set_value(&mut assembled, &relative[path.len()..], body);
        }
        Ok(if tree::is_vacant(&assembled) {
            None
        } else {
            Some(assembled)
        })
    }

    fn update(&self, path: &DocPath, patch: &Patch) -> Result<(), StoreError> {
        let mut plan = WritePlan::default();
        for (target, value) in tree::resolve_patch(path, patch)? {
            plan.add(target, value)?;
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite_error)?;

        for prefix in &plan.cleared {
            clear_prefix(&tx, prefix)?;
        }

        let stamp = now_us();
        for (key, edits) in &plan.documents {
            let mut body = load_document(&tx, key)?.unwrap_or(Value::Null);
            for (inner, value) in edits {
                tree::set_value(&mut body, inner.segments(), value.clone());
            }

            if tree::is_vacant(&body) {
                tx.execute(
                    "DELETE FROM documents WHERE root = ?1 AND collection = ?2 AND code = ?3",
                    params![key.0, key.1, key.2],
                )
                .map_err(sqlite_error)?;
            } else {
                let encoded = serde_json::to_string(&body)
                    .map_err(|err| StoreError::Io(format!("encode {}: {err}", doc_path(key))))?;
                tx.execute(
                    "INSERT INTO documents (root, collection, code, body, updated_at_us)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(root, collection, code)
                     DO UPDATE SET body = excluded.body, updated_at_us = excluded.updated_at_us",
                    params![key.0, key.1, key.2, encoded, stamp],
                )
                .map_err(sqlite_error)?;
            }
        }

        tx.commit().map_err(sqlite_error)?;
        debug!(
            path = %path,
            documents = plan.documents.len(),
            cleared = plan.cleared.len(),
            "applied sqlite update"
        );
        Ok(())
    }
}
