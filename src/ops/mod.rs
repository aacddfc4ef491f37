//! Relational and spreadsheet-style operators over [`crate::Table`]:
//! aggregation, pivoting, joining and stacking.  Every operator consumes its
//! inputs immutably and produces a new table.

pub mod aggregate;
pub mod join;
pub mod pivot;
pub mod stack;

pub use aggregate::{aggregate, aggregate_in, AggSpec, Reducer};
pub use join::{join, join_named, strict_join, Renaming};
pub use pivot::pivot;
pub use stack::{col_stack, row_stack, ColStackMode, RowStackMode};
