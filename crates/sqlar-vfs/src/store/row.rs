//! Typed rows at the store boundary.

use std::fmt;

use crate::archive::mode::FileMode;

/// Number of columns in a metadata row: `rowid, name, mode, mtime, sz`.
pub const ROW_ARITY: usize = 5;

/// Opaque store-assigned row handle (the SQLite `rowid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub i64);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A metadata row as returned by the store, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: RowId,
    /// Full archive path of the row (not the base name).
    pub name: String,
    pub mode: FileMode,
    pub mtime: i64,
    pub size: u64,
}

/// Why a raw row was refused at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDefect {
    /// Mode is out of range or does not name exactly one of file/directory.
    BrokenMode(i64),
    /// Negative `sz` column.
    NegativeSize(i64),
    /// Column count differs from [`ROW_ARITY`].
    Arity(usize),
    /// `name` is not valid UTF-8 text.
    Name,
}

impl fmt::Display for RowDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowDefect::BrokenMode(mode) => write!(f, "broken mode {mode:#o}"),
            RowDefect::NegativeSize(sz) => write!(f, "negative size {sz}"),
            RowDefect::Arity(n) => write!(f, "expected {ROW_ARITY} columns, got {n}"),
            RowDefect::Name => f.write_str("name is not valid UTF-8"),
        }
    }
}

impl Row {
    /// Decode the fixed-arity column tuple into a typed row.
    pub fn decode(
        id: i64,
        name: String,
        mode: i64,
        mtime: i64,
        sz: i64,
    ) -> Result<Self, RowDefect> {
        let mode = FileMode::from_raw(mode).ok_or(RowDefect::BrokenMode(mode))?;
        let size = u64::try_from(sz).map_err(|_| RowDefect::NegativeSize(sz))?;
        Ok(Self {
            id: RowId(id),
            name,
            mode,
            mtime,
            size,
        })
    }
}
