//! Vertical and horizontal table concatenation.

use crate::error::{Result, TableError};
use crate::table::coloring::uniqify;
use crate::table::{ColumnData, ColumnType, Coloring, Table};

/// How [`row_stack`] reconciles differing column sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowStackMode {
    /// All inputs must share an identical column set.
    Abort,
    /// Keep only the columns present in every input.
    Commons,
    /// Keep the union of all columns, null-filling where an input lacks one.
    #[default]
    Nulls,
}

/// How [`col_stack`] reconciles same-named columns across inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColStackMode {
    /// Shared column names are an error.
    #[default]
    Abort,
    /// Keep the earliest input's column.
    First,
    /// Remove every colliding column.
    Drop,
    /// Suffix every colliding column with its input index.
    Rename,
}

// ---------------------------------------------------------------------------
// row_stack
// ---------------------------------------------------------------------------

/// Vertically concatenate tables.  Input colorings are union-merged and
/// restricted to the surviving columns.
pub fn row_stack(tables: &[Table], mode: RowStackMode) -> Result<Table> {
    match tables.len() {
        0 => return Err(TableError::EmptyInput),
        1 => return Ok(tables[0].clone()),
        _ => {}
    }

    if mode == RowStackMode::Abort {
        let first: Vec<String> = tables[0].names();
        let same = tables.iter().all(|t| {
            let n = t.names();
            n.len() == first.len() && first.iter().all(|x| n.contains(x))
        });
        if !same {
            return Err(TableError::ColumnSetMismatch);
        }
    }

    let names: Vec<String> = match mode {
        RowStackMode::Nulls => {
            uniqify(tables.iter().flat_map(|t| t.names()).collect())
        }
        RowStackMode::Abort | RowStackMode::Commons => {
            let common: Vec<String> = tables[0]
                .names()
                .into_iter()
                .filter(|n| tables[1..].iter().all(|t| t.has_column(n)))
                .collect();
            if common.is_empty() {
                return Err(TableError::EmptyIntersection);
            }
            common
        }
    };

    let mut columns: Vec<(String, ColumnData)> = Vec::with_capacity(names.len());
    for name in &names {
        let ty = tables
            .iter()
            .filter_map(|t| t.column(name).ok())
            .map(|c| c.column_type())
            .fold(ColumnType::Int, ColumnType::promote);
        let mut data = ColumnData::empty(ty);
        for t in tables {
            match t.column(name) {
                Ok(col) => {
                    let widened = col.data.widen(ty);
                    for i in 0..widened.len() {
                        data.push(widened.get(i));
                    }
                }
                Err(_) => {
                    for _ in 0..t.len() {
                        data.push(ty.null());
                    }
                }
            }
        }
        columns.push((name.clone(), data));
    }

    let mut table = Table::new(columns)?;
    table.set_coloring(merged_coloring(tables, &table.names()));
    Ok(table)
}

// ---------------------------------------------------------------------------
// col_stack
// ---------------------------------------------------------------------------

/// Horizontally concatenate tables of equal row count.  Input colorings are
/// union-merged and restricted to the surviving columns.
pub fn col_stack(tables: &[Table], mode: ColStackMode) -> Result<Table> {
    match tables.len() {
        0 => return Err(TableError::EmptyInput),
        1 => return Ok(tables[0].clone()),
        _ => {}
    }

    let lens: Vec<usize> = tables.iter().map(|t| t.len()).collect();
    if lens.iter().any(|&l| l != lens[0]) {
        return Err(TableError::RowCountMismatch(lens));
    }

    // Each distinct name with the list of inputs carrying it.
    let all_names = uniqify(tables.iter().flat_map(|t| t.names()).collect());
    let owners: Vec<(String, Vec<usize>)> = all_names
        .into_iter()
        .map(|n| {
            let o = (0..tables.len())
                .filter(|&i| tables[i].has_column(&n))
                .collect();
            (n, o)
        })
        .collect();
    let commons: Vec<String> = owners
        .iter()
        .filter(|(_, o)| o.len() > 1)
        .map(|(n, _)| n.clone())
        .collect();

    let mut picked: Vec<(usize, String, String)> = Vec::new(); // (input, source, output)
    if !commons.is_empty() && mode == ColStackMode::Abort {
        return Err(TableError::ColumnNameClash(commons));
    }
    for (name, o) in &owners {
        if o.len() > 1 {
            match mode {
                ColStackMode::Abort => unreachable!("handled above"),
                ColStackMode::First => picked.push((o[0], name.clone(), name.clone())),
                ColStackMode::Drop => {}
                ColStackMode::Rename => {
                    for &i in o {
                        picked.push((i, name.clone(), format!("{name}_{i}")));
                    }
                }
            }
        } else {
            picked.push((o[0], name.clone(), name.clone()));
        }
    }

    let columns = picked
        .into_iter()
        .map(|(i, source, output)| {
            tables[i]
                .column(&source)
                .map(|c| (output, c.data.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut table = Table::new(columns)?;
    table.set_coloring(merged_coloring(tables, &table.names()));
    Ok(table)
}

/// Union of the input colorings, restricted to `names` (groups reduced to
/// nothing are dropped, full-set groups are kept).
pub(crate) fn merged_coloring(tables: &[Table], names: &[String]) -> Coloring {
    let mut coloring = Coloring::new();
    for t in tables {
        coloring.merge(t.coloring());
    }
    coloring.restrict(names);
    coloring
}
