//! SQLite-backed glyph catalog.
//!
//! One connection serves both reads and writes; writes are single short
//! statements serialized by SQLite's writer lock. The connection runs WAL
//! with a bounded busy timeout so queries terminate even on slow storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::consolidation::ConsolidationMap;
use crate::types::{Glyph, DEPRECATED_PREFIX};

/// Default busy timeout for catalog connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(1);

const GLYPH_COLUMNS: &str = "glyph_name, display_name, description, \
     response_template, gate, voltage_pair, signal_tags";

/// Errors surfaced by the glyph catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Database file missing or schema setup failed.
    #[error("cannot open glyph catalog at {path}: {reason}")]
    Open { path: PathBuf, reason: String },
    /// Write contention outlived the busy timeout.
    #[error("glyph catalog busy: {0}")]
    Busy(rusqlite::Error),
    /// A write would duplicate `glyph_name`.
    #[error("glyph {0:?} already exists")]
    Duplicate(String),
    /// `glyph_name` must be non-empty.
    #[error("glyph name must be non-empty")]
    EmptyName,
    /// Any other SQLite failure.
    #[error(transparent)]
    Sql(rusqlite::Error),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                CatalogError::Busy(e)
            }
            _ => CatalogError::Sql(e),
        }
    }
}

/// Persistent store of glyph records plus the optional consolidation map.
#[derive(Debug)]
pub struct GlyphCatalog {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl GlyphCatalog {
    /// Open an existing catalog. A missing file is fatal; the schema is
    /// ensured (and migrated) inside an existing file.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open an existing catalog with an explicit busy timeout.
    pub fn open_with_timeout(
        path: &Path,
        busy_timeout: Duration,
    ) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::Open {
                path: path.to_path_buf(),
                reason: "database file does not exist".into(),
            });
        }
        let conn = Connection::open(path).map_err(|e| CatalogError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::init(conn, path, busy_timeout)
    }

    /// Create a new catalog file (or adopt an existing one) and ensure the
    /// schema. This is the administrative bootstrap path; `open` refuses
    /// missing files.
    pub fn create(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::init(conn, path, DEFAULT_BUSY_TIMEOUT)
    }

    /// In-memory catalog (for testing).
    pub fn open_in_memory() -> Result<Self, CatalogError> {
        let conn = Connection::open_in_memory().map_err(|e| CatalogError::Open {
            path: PathBuf::from(":memory:"),
            reason: e.to_string(),
        })?;
        Self::init(conn, Path::new(":memory:"), DEFAULT_BUSY_TIMEOUT)
    }

    fn init(
        conn: Connection,
        path: &Path,
        busy_timeout: Duration,
    ) -> Result<Self, CatalogError> {
        let setup = || -> rusqlite::Result<()> {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS glyph_lexicon (
                    glyph_name TEXT NOT NULL,
                    display_name TEXT,
                    description TEXT,
                    response_template TEXT,
                    gate TEXT,
                    voltage_pair TEXT,
                    signal_tags TEXT NOT NULL DEFAULT ''
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_glyph_lexicon_name
                    ON glyph_lexicon(glyph_name);",
            )?;
            migrate_signal_tags(&conn)?;
            Ok(())
        };
        setup().map_err(|e| CatalogError::Open {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// Location of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All glyphs eligible for selection: not deprecated, consolidation
    /// redirects resolved so each logical glyph appears once. Corrupt rows
    /// (null or empty name) are skipped with a warning.
    pub fn list_active(&self) -> Result<Vec<Glyph>, CatalogError> {
        let conn = self.conn.lock();
        let map = load_consolidation(&conn)?;

        let mut stmt =
            conn.prepare(&format!("SELECT {GLYPH_COLUMNS} FROM glyph_lexicon"))?;
        let mut rows = stmt.query([])?;

        let mut out: Vec<Glyph> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        while let Some(row) = rows.next()? {
            let name: Option<String> = row.get(0)?;
            let name = match name {
                Some(n) if !n.trim().is_empty() => n,
                _ => {
                    warn!("skipping glyph row with null or empty name");
                    continue;
                }
            };
            if name.starts_with(DEPRECATED_PREFIX) {
                continue;
            }

            let canonical = map.resolve(&name).to_string();
            if canonical.starts_with(DEPRECATED_PREFIX) {
                continue;
            }
            let is_canonical_row = canonical == name;

            let mut glyph = row_to_glyph(name, row)?;
            glyph.glyph_name = canonical.clone();

            match index.get(&canonical).copied() {
                None => {
                    index.insert(canonical, out.len());
                    out.push(glyph);
                }
                // Duplicate logical glyph: the row stored under the
                // canonical name wins over redirected ones.
                Some(i) if is_canonical_row => out[i] = glyph,
                Some(_) => {}
            }
        }
        Ok(out)
    }

    /// Exact lookup by name, honoring the consolidation map. Falls back to
    /// the raw name when the canonical row is absent.
    pub fn get(&self, name: &str) -> Result<Option<Glyph>, CatalogError> {
        let conn = self.conn.lock();
        let map = load_consolidation(&conn)?;
        let canonical = map.resolve(name);
        if let Some(glyph) = get_raw(&conn, canonical)? {
            return Ok(Some(glyph));
        }
        if canonical != name {
            return get_raw(&conn, name);
        }
        Ok(None)
    }

    /// Insert a new glyph. Duplicate names are rejected.
    pub fn add(&self, glyph: &Glyph) -> Result<(), CatalogError> {
        if glyph.glyph_name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        let conn = self.conn.lock();
        let tags = glyph.signal_tags.join(",");
        let result = conn.execute(
            "INSERT INTO glyph_lexicon (glyph_name, display_name, description,
                response_template, gate, voltage_pair, signal_tags)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                glyph.glyph_name,
                glyph.display_name,
                glyph.description,
                glyph.response_template,
                glyph.gate,
                glyph.voltage_pair,
                tags,
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) =>
            {
                Err(CatalogError::Duplicate(glyph.glyph_name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Update an existing glyph by name. Returns whether a row changed.
    pub fn update(&self, glyph: &Glyph) -> Result<bool, CatalogError> {
        if glyph.glyph_name.trim().is_empty() {
            return Err(CatalogError::EmptyName);
        }
        let conn = self.conn.lock();
        let tags = glyph.signal_tags.join(",");
        let changed = conn.execute(
            "UPDATE glyph_lexicon SET display_name = ?2, description = ?3,
                response_template = ?4, gate = ?5, voltage_pair = ?6,
                signal_tags = ?7
             WHERE glyph_name = ?1",
            params![
                glyph.glyph_name,
                glyph.display_name,
                glyph.description,
                glyph.response_template,
                glyph.gate,
                glyph.voltage_pair,
                tags,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Delete a glyph by name. Returns whether a row was removed.
    pub fn delete(&self, name: &str) -> Result<bool, CatalogError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "DELETE FROM glyph_lexicon WHERE glyph_name = ?1",
            params![name],
        )?;
        Ok(changed > 0)
    }

    /// Total stored rows, deprecated ones included.
    pub fn count(&self) -> Result<usize, CatalogError> {
        let conn = self.conn.lock();
        let n = conn.query_row("SELECT COUNT(*) FROM glyph_lexicon", [], |row| {
            row.get::<_, usize>(0)
        })?;
        Ok(n)
    }

    /// Record a consolidation redirect, creating the optional map table on
    /// first use.
    pub fn consolidate(&self, orig: &str, merged: &str) -> Result<(), CatalogError> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS consolidation_map (
                orig_name TEXT,
                merged_name TEXT
            );",
        )?;
        conn.execute(
            "INSERT INTO consolidation_map (orig_name, merged_name) VALUES (?1, ?2)",
            params![orig, merged],
        )?;
        Ok(())
    }
}

/// Older catalog files predate the signal_tags column.
fn migrate_signal_tags(conn: &Connection) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare("PRAGMA table_info(glyph_lexicon)")?;
    let mut rows = stmt.query([])?;
    let mut found = false;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == "signal_tags" {
            found = true;
        }
    }
    drop(rows);
    drop(stmt);
    if !found {
        conn.execute(
            "ALTER TABLE glyph_lexicon ADD COLUMN signal_tags TEXT NOT NULL DEFAULT ''",
            [],
        )?;
    }
    Ok(())
}

/// The consolidation map table is optional; absence means no redirects.
fn load_consolidation(conn: &Connection) -> Result<ConsolidationMap, CatalogError> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='consolidation_map'",
        [],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Ok(ConsolidationMap::default());
    }

    let mut stmt = conn.prepare("SELECT orig_name, merged_name FROM consolidation_map")?;
    let mut rows = stmt.query([])?;
    let mut redirects = HashMap::new();
    while let Some(row) = rows.next()? {
        let orig: Option<String> = row.get(0)?;
        let merged: Option<String> = row.get(1)?;
        match (orig, merged) {
            (Some(o), Some(m)) if !o.is_empty() && !m.is_empty() => {
                redirects.insert(o, m);
            }
            _ => warn!("skipping consolidation row with null or empty name"),
        }
    }
    Ok(ConsolidationMap::new(redirects))
}

fn get_raw(conn: &Connection, name: &str) -> Result<Option<Glyph>, CatalogError> {
    let glyph = conn
        .query_row(
            &format!("SELECT {GLYPH_COLUMNS} FROM glyph_lexicon WHERE glyph_name = ?1"),
            params![name],
            |row| {
                let name: String = row.get(0)?;
                row_to_glyph(name, row)
            },
        )
        .optional()?;
    Ok(glyph)
}

fn row_to_glyph(name: String, row: &rusqlite::Row<'_>) -> rusqlite::Result<Glyph> {
    let tags: Option<String> = row.get(6)?;
    Ok(Glyph {
        glyph_name: name,
        display_name: row.get(1)?,
        description: row.get(2)?,
        response_template: row.get(3)?,
        gate: row.get(4)?,
        voltage_pair: row.get(5)?,
        signal_tags: tags
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
    })
}
