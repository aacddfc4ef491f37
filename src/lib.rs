//! coltab: a column-oriented table engine with hierarchical column grouping.
//!
//! The core object is the [`Table`]: a rectangular container of named,
//! uniformly typed columns (64-bit integer, 64-bit float or text) plus a
//! [`Coloring`] that groups column names hierarchically.  Around it sit
//! schema/dialect inference for heterogeneous delimited text, spreadsheet
//! style operators, and three interoperable persistence formats.
//!
//! Architecture:
//! ```text
//!  raw bytes
//!     │
//!     ▼
//!  ┌───────────┐
//!  │ io::infer  │  dialect sniffing, header detection, stored metadata
//!  └───────────┘
//!     │
//!     ▼
//!  ┌───────────┐      ┌──────────────────────────────┐
//!  │   Table    │ ◄──► │ io::{text, binary, hsv}       │
//!  │ + Coloring │      │ flat text / parquet / dirtree │
//!  └───────────┘      └──────────────────────────────┘
//!     │
//!     ▼
//!  ┌───────────┐
//!  │    ops     │  aggregate, pivot, join, stacking
//!  └───────────┘
//! ```

pub mod color;
pub mod error;
pub mod io;
pub mod ops;
pub mod table;

use std::path::{Path, PathBuf};

pub use error::{Result, TableError};
pub use io::text::{MetadataKind, MetadataSpec, TextReadOptions, TextWriteOptions};
pub use io::{Dialect, Quoting};
pub use ops::{
    aggregate, aggregate_in, col_stack, join, join_named, pivot, row_stack, strict_join, AggSpec,
    ColStackMode, Reducer, Renaming, RowStackMode,
};
pub use table::{ColumnData, ColumnType, Coloring, Table, Value};

// ---------------------------------------------------------------------------
// Persistence convenience methods
// ---------------------------------------------------------------------------

impl Table {
    /// Load from a delimited text file.  See [`io::text::read_text`].
    pub fn read_text(path: &Path, opts: &TextReadOptions) -> Result<Table> {
        io::text::read_text(path, opts)
    }

    /// Load from a binary (parquet) archive.  See [`io::binary::read_binary`].
    pub fn read_binary(path: &Path) -> Result<Table> {
        io::binary::read_binary(path)
    }

    /// Load from a hierarchical (HSV) directory.  See [`io::hsv::read_hsv`].
    pub fn read_hsv(path: &Path) -> Result<Table> {
        io::hsv::read_hsv(path)
    }

    /// Load several HSV trees side by side.  See [`io::hsv::read_hsv_list`].
    pub fn read_hsv_list(paths: &[PathBuf]) -> Result<Table> {
        io::hsv::read_hsv_list(paths)
    }

    /// Write as delimited text.  See [`io::text::write_text`].
    pub fn save_text(&self, path: &Path, opts: &TextWriteOptions) -> Result<()> {
        io::text::write_text(self, path, opts)
    }

    /// Write as a binary (parquet) archive.  See [`io::binary::write_binary`].
    pub fn save_binary(&self, path: &Path, with_coloring: bool) -> Result<()> {
        io::binary::write_binary(self, path, with_coloring)
    }

    /// Write as an HSV directory.  See [`io::hsv::write_hsv`].
    pub fn save_hsv(&self, path: &Path) -> Result<()> {
        io::hsv::write_hsv(self, path)
    }

    /// Write only the column files, losing the coloring.  See
    /// [`io::hsv::write_columns`].
    pub fn save_columns(&self, path: &Path) -> Result<()> {
        io::hsv::write_columns(self, path)
    }

    /// Append rows to an on-disk HSV tree, out of core.  See
    /// [`io::hsv::append_hsv`].
    pub fn append_hsv(&self, path: &Path) -> Result<()> {
        io::hsv::append_hsv(self, path)
    }

    /// Append rows to a flat on-disk column set.  See
    /// [`io::hsv::append_columns`].
    pub fn append_columns(&self, path: &Path, order: Option<&[String]>) -> Result<()> {
        io::hsv::append_columns(self, path, order)
    }
}
