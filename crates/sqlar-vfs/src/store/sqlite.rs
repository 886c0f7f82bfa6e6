//! SQLite-backed store over a real `sqlar` table.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Statement};

use super::{
    prefix_upper_bound, ArchiveStore, Children, Row, RowDefect, RowId, StoreError, StoreResult,
    ROW_ARITY,
};
use crate::config::SqliteConfig;

/// Table layout written by `sqlite3 -A`.
pub const SQLAR_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sqlar(
    name TEXT PRIMARY KEY,  -- name of the file
    mode INT,               -- access permissions
    mtime INT,              -- last modification time
    sz INT,                 -- original file size
    data BLOB               -- compressed content
);
"#;

// 61440 = S_IFMT, 16384 = S_IFDIR, 32768 = S_IFREG
macro_rules! mode_ok {
    ($t:literal) => {
        concat!("(", $t, ".mode & 61440) IN (16384, 32768)")
    };
}

// A file row with valid rows below it is a type conflict: the path is a directory.
macro_rules! not_shadowed {
    () => {
        concat!(
            "NOT ((s.mode & 61440) = 32768 AND EXISTS (",
            "SELECT 1 FROM sqlar AS d",
            " WHERE d.name >= s.name || '/' AND d.name < s.name || '0'",
            " AND ",
            mode_ok!("d"),
            "))"
        )
    };
}

macro_rules! row_columns {
    () => {
        "s.rowid, s.name, s.mode, coalesce(s.mtime, 0), coalesce(s.sz, 0)"
    };
}

const LOOKUP: &str = concat!(
    "SELECT ",
    row_columns!(),
    " FROM sqlar AS s WHERE s.name = ?1 AND ",
    mode_ok!("s"),
    " AND ",
    not_shadowed!(),
    " LIMIT 1"
);

const HAS_DESCENDANTS: &str = concat!(
    "SELECT EXISTS (SELECT 1 FROM sqlar AS s WHERE s.name >= ?1 AND s.name < ?2 AND ",
    mode_ok!("s"),
    ")"
);

const HAS_ANY: &str = concat!(
    "SELECT EXISTS (SELECT 1 FROM sqlar AS s WHERE s.name <> '.' AND ",
    mode_ok!("s"),
    ")"
);

const CHILD_ROWS: &str = concat!(
    "SELECT ",
    row_columns!(),
    " FROM sqlar AS s WHERE s.name >= ?1 AND s.name < ?2",
    " AND length(s.name) > ?3 AND instr(substr(s.name, ?3 + 1), '/') = 0 AND ",
    mode_ok!("s"),
    " AND ",
    not_shadowed!()
);

const ROOT_CHILD_ROWS: &str = concat!(
    "SELECT ",
    row_columns!(),
    " FROM sqlar AS s WHERE s.name NOT IN ('.', '') AND instr(s.name, '/') = 0 AND ",
    mode_ok!("s"),
    " AND ",
    not_shadowed!()
);

const SUBDIRS: &str = concat!(
    "SELECT DISTINCT substr(s.name, ?3 + 1, instr(substr(s.name, ?3 + 1), '/') - 1)",
    " FROM sqlar AS s WHERE s.name >= ?1 AND s.name < ?2",
    " AND instr(substr(s.name, ?3 + 1), '/') > 1 AND ",
    mode_ok!("s")
);

const ROOT_SUBDIRS: &str = concat!(
    "SELECT DISTINCT substr(s.name, 1, instr(s.name, '/') - 1)",
    " FROM sqlar AS s WHERE instr(s.name, '/') > 1 AND ",
    mode_ok!("s")
);

const FETCH_BLOB: &str = "SELECT data FROM sqlar WHERE rowid = ?1 AND (mode & 61440) = 32768";

/// Read-only store over an SQLite Archive file.
///
/// A single connection is shared behind a mutex; queries are short and the
/// connection keeps its prepared statements cached.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("conn", &"<locked>")
            .finish()
    }
}

impl SqliteStore {
    /// Open an archive file read-only.
    pub fn open<P: AsRef<Path>>(path: P, config: &SqliteConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = if config.immutable {
            let uri = format!("file:{}?immutable=1", uri_escape(&path.to_string_lossy()));
            Connection::open_with_flags(
                uri,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        };
        conn.set_prepared_statement_cache_capacity(config.statement_cache);
        tracing::debug!(path = %path.display(), immutable = config.immutable, "opened sqlar archive");
        Self::from_connection(conn)
    }

    /// Wrap an already open connection.
    ///
    /// Fails if the connection has no usable `sqlar` table.
    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.prepare("SELECT rowid, name, mode, mtime, sz, data FROM sqlar LIMIT 0")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run the metadata query and decode its rows, skipping defective ones.
    fn query_rows(
        stmt: &mut Statement<'_>,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<Row>> {
        check_arity(stmt)?;
        let raw = stmt.query_map(params, decode_row)?;
        let mut rows = Vec::new();
        for decoded in raw {
            match decoded? {
                Ok(row) => rows.push(row),
                Err((name, defect)) => {
                    tracing::warn!(name = %name, %defect, "skipping malformed sqlar row");
                }
            }
        }
        Ok(rows)
    }

    /// Run a single-column segment query, skipping segments that are not text.
    fn query_segments(
        stmt: &mut Statement<'_>,
        params: impl rusqlite::Params,
    ) -> StoreResult<Vec<String>> {
        let raw = stmt.query_map(params, |row| text_column(row, 0))?;
        let mut segments = Vec::new();
        for segment in raw {
            match segment? {
                Ok(segment) => segments.push(segment),
                Err(lossy) => {
                    tracing::warn!(segment = %lossy, "skipping directory segment with invalid name");
                }
            }
        }
        Ok(segments)
    }
}

impl ArchiveStore for SqliteStore {
    fn lookup(&self, name: &str) -> StoreResult<Option<Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(LOOKUP)?;
        Ok(Self::query_rows(&mut stmt, params![name])?.into_iter().next())
    }

    fn has_descendants(&self, prefix: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let exists = match prefix_upper_bound(prefix) {
            Some(upper) => conn
                .prepare_cached(HAS_DESCENDANTS)?
                .query_row(params![prefix, upper], |row| row.get(0))?,
            None => conn.prepare_cached(HAS_ANY)?.query_row(params![], |row| row.get(0))?,
        };
        Ok(exists)
    }

    fn children(&self, prefix: &str) -> StoreResult<Children> {
        let conn = self.conn.lock();
        let Some(upper) = prefix_upper_bound(prefix) else {
            let mut stmt = conn.prepare_cached(ROOT_CHILD_ROWS)?;
            let rows = Self::query_rows(&mut stmt, params![])?;
            let mut stmt = conn.prepare_cached(ROOT_SUBDIRS)?;
            let subdirs = Self::query_segments(&mut stmt, params![])?;
            return Ok(Children { rows, subdirs });
        };

        // substr/length count characters, not bytes
        let skip = prefix.chars().count() as i64;
        let mut stmt = conn.prepare_cached(CHILD_ROWS)?;
        let rows = Self::query_rows(&mut stmt, params![prefix, upper, skip])?;
        let mut stmt = conn.prepare_cached(SUBDIRS)?;
        let subdirs = Self::query_segments(&mut stmt, params![prefix, upper, skip])?;
        Ok(Children { rows, subdirs })
    }

    fn fetch_blob(&self, id: RowId) -> StoreResult<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let data: Option<Option<Vec<u8>>> = conn
            .prepare_cached(FETCH_BLOB)?
            .query_row(params![id.0], |row| row.get(0))
            .optional()?;
        Ok(data.map(Option::unwrap_or_default))
    }
}

type Decoded = Result<Row, (String, RowDefect)>;

fn decode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Decoded> {
    let name = match text_column(row, 1)? {
        Ok(name) => name,
        Err(lossy) => return Ok(Err((lossy, RowDefect::Name))),
    };
    Ok(Row::decode(row.get(0)?, name.clone(), row.get(2)?, row.get(3)?, row.get(4)?)
        .map_err(|defect| (name, defect)))
}

/// Read a text column without failing the query on bad UTF-8.
///
/// `Err` carries a lossy rendering for logging.
fn text_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Result<String, String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => Err(String::from_utf8_lossy(bytes).into_owned()),
        },
        other => Err(format!("<{}>", other.data_type())),
    })
}

fn check_arity(stmt: &Statement<'_>) -> StoreResult<()> {
    match stmt.column_count() {
        ROW_ARITY => Ok(()),
        n => Err(StoreError::Other(RowDefect::Arity(n).to_string())),
    }
}

/// Escape the characters that would end the path part of an SQLite URI.
fn uri_escape(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '%' => out.push_str("%25"),
            '?' => out.push_str("%3f"),
            '#' => out.push_str("%23"),
            c => out.push(c),
        }
    }
    out
}
