//! Multi-way outer join on common key columns.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};

use crate::error::{Result, TableError};
use crate::ops::stack::row_stack;
use crate::ops::RowStackMode;
use crate::table::{ColumnData, Coloring, Table, Value};

/// Per-input column renaming applied before a join:
/// input name → (old column name → new column name).
pub type Renaming = BTreeMap<String, BTreeMap<String, String>>;

// ---------------------------------------------------------------------------
// join – the forgiving wrapper
// ---------------------------------------------------------------------------

/// Join a list of tables, naming them by their list index.  See
/// [`join_named`].
pub fn join(tables: &[Table], keycols: Option<&[&str]>) -> Result<Table> {
    let inputs: Vec<(String, Table)> = tables
        .iter()
        .enumerate()
        .map(|(i, t)| (i.to_string(), t.clone()))
        .collect();
    join_named(&inputs, keycols).map(|(t, _)| t)
}

/// Join named tables on common key columns.
///
/// Wraps [`strict_join`]: when `keycols` is absent the largest set of common
/// columns with identical types and unique values per input is inferred (an
/// error when no such set exists), and colliding non-key columns are
/// auto-renamed by appending `_<input name>`.  Returns the joined table and
/// the renaming that was applied.
pub fn join_named(
    inputs: &[(String, Table)],
    keycols: Option<&[&str]>,
) -> Result<(Table, Renaming)> {
    if inputs.is_empty() {
        return Err(TableError::EmptyInput);
    }

    let keycols: Vec<String> = match keycols {
        Some(kc) => kc.iter().map(|k| k.to_string()).collect(),
        None => infer_keycols(inputs)?,
    };

    // Colliding non-key names force a renaming.
    let commons = common_nonkey_names(inputs, &keycols);
    let mut renaming = Renaming::new();
    if !commons.is_empty() {
        debug!("common non-key columns {commons:?}, forcing a renaming");
        for (name, t) in inputs {
            let mut map = BTreeMap::new();
            for c in &commons {
                if t.has_column(c) {
                    map.insert(c.clone(), format!("{c}_{name}"));
                }
            }
            if !map.is_empty() {
                renaming.insert(name.clone(), map);
            }
        }
    }

    let mut result = strict_join(inputs, &keycols, &renaming)?;

    // Carry the input colorings through the renaming.
    let mut coloring = Coloring::new();
    for (name, t) in inputs {
        let mut c = t.coloring().clone();
        if let Some(map) = renaming.get(name) {
            for (old, new) in map {
                c.rename_column(old, new);
            }
        }
        coloring.merge(&c);
    }
    coloring.restrict(&result.names());
    result.set_coloring(coloring);

    if !renaming.is_empty() {
        warn!("non-key columns were renamed: {renaming:?}");
    }
    Ok((result, renaming))
}

fn infer_keycols(inputs: &[(String, Table)]) -> Result<Vec<String>> {
    let mut commons: Vec<String> = inputs[0].1.names();
    for (_, t) in &inputs[1..] {
        commons.retain(|c| t.has_column(c));
    }
    if commons.is_empty() {
        return Err(TableError::NoCommonKey("no common column names found".into()));
    }

    let first = &inputs[0].1;
    commons.retain(|c| {
        let ty = first.column(c).expect("common column").column_type();
        inputs[1..]
            .iter()
            .all(|(_, t)| t.column(c).expect("common column").column_type() == ty)
    });
    if commons.is_empty() {
        return Err(TableError::NoCommonKey(
            "no common columns with identical types found".into(),
        ));
    }

    let unique_everywhere = inputs
        .iter()
        .all(|(_, t)| keys_are_unique(t, &commons));
    if !unique_everywhere {
        return Err(TableError::NoCommonKey(
            "no common key columns with unique value sets in every input".into(),
        ));
    }
    debug!("inferring key columns to be {commons:?}");
    Ok(commons)
}

fn common_nonkey_names(inputs: &[(String, Table)], keycols: &[String]) -> Vec<String> {
    let mut commons: Vec<String> = Vec::new();
    for i in 0..inputs.len() {
        for j in i + 1..inputs.len() {
            for n in inputs[i].1.names() {
                if !keycols.contains(&n)
                    && inputs[j].1.has_column(&n)
                    && !commons.contains(&n)
                {
                    commons.push(n);
                }
            }
        }
    }
    commons
}

fn keys_are_unique(t: &Table, keycols: &[String]) -> bool {
    let mut seen: BTreeSet<Vec<Value>> = BTreeSet::new();
    (0..t.len()).all(|i| seen.insert(t.key_at(keycols, i)))
}

// ---------------------------------------------------------------------------
// strict_join
// ---------------------------------------------------------------------------

/// Join named tables under strict preconditions: every input carries all key
/// columns with identical types and unique key tuples, and non-key names are
/// globally disjoint (after `renaming` is applied).
///
/// The algorithm walks the power set of inputs from the full intersection
/// down to singletons; at each subset it emits one row per key tuple common
/// to the subset's remaining rows and removes those rows from further
/// consideration, realizing a full outer join with null-filled gaps.
pub fn strict_join(
    inputs: &[(String, Table)],
    keycols: &[String],
    renaming: &Renaming,
) -> Result<Table> {
    if inputs.is_empty() {
        return Err(TableError::EmptyInput);
    }

    // Preconditions.
    let first = &inputs[0].1;
    for (name, t) in inputs {
        for k in keycols {
            let ok = t.has_column(k)
                && first.has_column(k)
                && t.column(k)?.column_type() == first.column(k)?.column_type();
            if !ok {
                return Err(TableError::BadKeyColumns(keycols.to_vec(), name.clone()));
            }
        }
        if !keys_are_unique(t, keycols) {
            return Err(TableError::NonUniqueKeys(keycols.to_vec(), name.clone()));
        }
    }

    // Renamed working copies, sorted by key.
    let mut working: Vec<(String, Table)> = Vec::with_capacity(inputs.len());
    for (name, t) in inputs {
        let mut t = t.clone();
        if let Some(map) = renaming.get(name) {
            for (old, new) in map {
                if !keycols.contains(old) {
                    t.rename(old, new)?;
                }
            }
        }
        let t = t.take(&t.argsort(keycols)?)?;
        working.push((name.clone(), t));
    }

    let commons = common_nonkey_names(&working, keycols);
    if !commons.is_empty() {
        return Err(TableError::DisjointnessViolation(commons));
    }

    // Zero-row result schema: key columns, then every input's non-key
    // columns in input order.
    let mut schema: Vec<(String, ColumnData)> = keycols
        .iter()
        .map(|k| {
            first
                .column(k)
                .map(|c| (k.clone(), ColumnData::empty(c.column_type())))
        })
        .collect::<Result<Vec<_>>>()?;
    for (_, t) in &working {
        for c in t.columns() {
            if !keycols.contains(&c.name) {
                schema.push((c.name.clone(), ColumnData::empty(c.column_type())));
            }
        }
    }
    let mut result = Table::new(schema)?;

    // Power set of input indices: full intersection first, then smaller
    // subsets, consuming matched rows as we go.
    let subsets = {
        let pl = powerlist(working.len());
        let mut to_get: Vec<Vec<usize>> = Vec::new();
        for k in 1..working.len().max(1) {
            to_get.extend(pl.iter().filter(|s| s.len() == k).cloned());
        }
        to_get.push((0..working.len()).collect());
        to_get.reverse();
        to_get
    };

    for subset in subsets {
        let keys_of = |t: &Table| -> Vec<Vec<Value>> {
            (0..t.len()).map(|i| t.key_at(keycols, i)).collect()
        };
        let mut common_keys = keys_of(&working[subset[0]].1);
        for &j in &subset[1..] {
            let other: BTreeSet<Vec<Value>> =
                keys_of(&working[j].1).into_iter().collect();
            common_keys.retain(|k| other.contains(k));
            if common_keys.is_empty() {
                break;
            }
        }
        if common_keys.is_empty() {
            continue;
        }
        let keyset: BTreeSet<Vec<Value>> = common_keys.iter().cloned().collect();

        // Rows with a common key align across the subset because every
        // working table is key-sorted with unique keys.
        let mut new_columns: Vec<(String, ColumnData)> = Vec::new();
        for (pos, &j) in subset.iter().enumerate() {
            let t = &working[j].1;
            let mask: Vec<bool> = (0..t.len())
                .map(|i| keyset.contains(&t.key_at(keycols, i)))
                .collect();
            let matched = t.mask(&mask)?;
            let inverse: Vec<bool> = mask.iter().map(|b| !b).collect();
            let leftover = t.mask(&inverse)?;
            for c in matched.columns() {
                if !keycols.contains(&c.name) || pos == 0 {
                    new_columns.push((c.name.clone(), c.data.clone()));
                }
            }
            working[j].1 = leftover;
        }
        let new_rows = Table::new(new_columns)?;
        result = row_stack(&[result, new_rows], RowStackMode::Nulls)?;
    }

    Ok(result)
}

/// All subsets of `0..n` in the recursive construction order of the
/// original algorithm (the empty set first, each element appended to every
/// earlier subset).
fn powerlist(n: usize) -> Vec<Vec<usize>> {
    let mut pl: Vec<Vec<usize>> = vec![vec![]];
    for i in 0..n {
        let mut extended: Vec<Vec<usize>> = pl
            .iter()
            .map(|s| {
                let mut s = s.clone();
                s.push(i);
                s
            })
            .collect();
        pl.append(&mut extended);
    }
    pl
}
