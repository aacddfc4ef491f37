//! Aggregation: collapse groups of rows sharing key values, plus the
//! "aggregate and keep" variant that folds aggregate rows back into the
//! detail rows they summarize.

use std::collections::BTreeMap;

use log::warn;

use crate::color::gray_codes;
use crate::error::{Result, TableError};
use crate::ops::stack::row_stack;
use crate::ops::RowStackMode;
use crate::table::coloring::uniqify;
use crate::table::{ColumnData, ColumnType, Table, Value};

/// Reserved column tagging aggregate rows with the comma-joined grouping
/// columns that produced them (empty for detail rows).
pub const AGGREGATES_COLUMN: &str = "__aggregates__";
/// Reserved column carrying a gray-scale web hex code per aggregate row.
pub const COLOR_COLUMN: &str = "__color__";

// ---------------------------------------------------------------------------
// Reducers
// ---------------------------------------------------------------------------

/// A function collapsing the values of one column within a group down to
/// one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
    Min,
    Max,
    First,
    /// String concatenation, in row order.
    Concat,
    Count,
}

impl Reducer {
    /// The automatic default for a column: numeric sum, string
    /// concatenation.
    fn auto(ty: ColumnType) -> Reducer {
        match ty {
            ColumnType::Int | ColumnType::Float => Reducer::Sum,
            ColumnType::Str => Reducer::Concat,
        }
    }

    fn apply(self, data: &ColumnData, rows: &[usize]) -> Value {
        match (self, data) {
            (Reducer::Count, _) => Value::Int(rows.len() as i64),
            (Reducer::First, _) => data.get(rows[0]),
            (Reducer::Sum, ColumnData::Int(v)) => {
                Value::Int(rows.iter().map(|&i| v[i]).sum())
            }
            (Reducer::Sum, ColumnData::Float(v)) => {
                Value::Float(rows.iter().map(|&i| v[i]).sum())
            }
            (Reducer::Mean, ColumnData::Int(v)) => {
                Value::Float(rows.iter().map(|&i| v[i] as f64).sum::<f64>() / rows.len() as f64)
            }
            (Reducer::Mean, ColumnData::Float(v)) => {
                Value::Float(rows.iter().map(|&i| v[i]).sum::<f64>() / rows.len() as f64)
            }
            (Reducer::Min, ColumnData::Int(v)) => {
                Value::Int(rows.iter().map(|&i| v[i]).min().expect("nonempty group"))
            }
            (Reducer::Min, ColumnData::Float(v)) => Value::Float(
                rows.iter()
                    .map(|&i| v[i])
                    .fold(f64::INFINITY, f64::min),
            ),
            (Reducer::Max, ColumnData::Int(v)) => {
                Value::Int(rows.iter().map(|&i| v[i]).max().expect("nonempty group"))
            }
            (Reducer::Max, ColumnData::Float(v)) => Value::Float(
                rows.iter()
                    .map(|&i| v[i])
                    .fold(f64::NEG_INFINITY, f64::max),
            ),
            (Reducer::Concat, ColumnData::Str(v)) => {
                Value::Str(rows.iter().map(|&i| v[i].as_str()).collect())
            }
            // Type-incompatible reducer: degrade to the automatic default.
            (r, d) => {
                let fallback = Reducer::auto(d.column_type());
                warn!(
                    "reducer {r:?} does not apply to a {} column; using {fallback:?} instead",
                    d.column_type()
                );
                fallback.apply(d, rows)
            }
        }
    }
}

/// Per-column reducer assignment for an aggregation.
#[derive(Debug, Clone, Default)]
pub struct AggSpec {
    /// Explicit reducer per column name.
    pub funcs: BTreeMap<String, Reducer>,
    /// Reducer for any column not listed in `funcs`; when also absent, the
    /// automatic default is chosen and reported.
    pub default: Option<Reducer>,
}

impl AggSpec {
    pub fn new() -> AggSpec {
        AggSpec::default()
    }

    pub fn with<S: Into<String>>(mut self, column: S, reducer: Reducer) -> AggSpec {
        self.funcs.insert(column.into(), reducer);
        self
    }

    pub fn default_reducer(mut self, reducer: Reducer) -> AggSpec {
        self.default = Some(reducer);
        self
    }
}

// ---------------------------------------------------------------------------
// aggregate
// ---------------------------------------------------------------------------

/// Group rows by the unique value combinations of the `on` columns and
/// collapse every other column with its reducer.
///
/// Grouping uses a stable uniqueness-detecting sort, so ties stay
/// well-defined; output rows appear in sorted key order, one per distinct
/// key, with the grouping values taken from the group's first member.  An
/// empty table is returned unchanged; an unknown `on` name is an error.
pub fn aggregate<S: AsRef<str>>(x: &Table, on: &[S], spec: &AggSpec) -> Result<Table> {
    let on: Vec<String> = on.iter().map(|s| s.as_ref().to_string()).collect();
    let missing: Vec<String> = on.iter().filter(|o| !x.has_column(o)).cloned().collect();
    if let Some(name) = missing.into_iter().next() {
        return Err(TableError::UnknownColumn(name));
    }
    if x.is_empty() {
        return Ok(x.clone());
    }

    // Resolve a reducer for every non-grouping column, reporting defaults.
    let mut resolved: BTreeMap<String, Reducer> = BTreeMap::new();
    let mut defaulted: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    for col in x.columns() {
        if on.contains(&col.name) {
            continue;
        }
        let reducer = spec
            .funcs
            .get(&col.name)
            .copied()
            .or(spec.default)
            .unwrap_or_else(|| {
                let auto = Reducer::auto(col.column_type());
                let kind = match auto {
                    Reducer::Sum => "sum",
                    _ => "string concatenation",
                };
                defaulted.entry(kind).or_default().push(col.name.clone());
                auto
            });
        resolved.insert(col.name.clone(), reducer);
    }
    for (kind, cols) in &defaulted {
        warn!("no reducer provided for {cols:?}; assuming {kind} by default");
    }

    // Stable sort, then group-boundary detection.
    let order = x.argsort(&on)?;
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (pos, &i) in order.iter().enumerate() {
        let starts_group = pos == 0
            || !on.is_empty() && x.key_at(&on, order[pos - 1]) != x.key_at(&on, i);
        if starts_group {
            groups.push(Vec::new());
        }
        groups.last_mut().expect("group pushed").push(i);
    }

    let mut columns: Vec<(String, ColumnData)> = Vec::with_capacity(x.n_columns());
    for col in x.columns() {
        let values: Vec<Value> = if on.contains(&col.name) {
            groups.iter().map(|g| col.data.get(g[0])).collect()
        } else {
            let reducer = resolved[&col.name];
            groups.iter().map(|g| reducer.apply(&col.data, g)).collect()
        };
        let ty = values
            .iter()
            .map(|v| match v {
                Value::Int(_) => ColumnType::Int,
                Value::Float(_) => ColumnType::Float,
                Value::Str(_) => ColumnType::Str,
            })
            .fold(ColumnType::Int, ColumnType::promote);
        let mut data = ColumnData::empty(ty);
        for v in values {
            data.push(v);
        }
        columns.push((col.name.clone(), data));
    }

    let mut out = Table::new(columns)?;
    out.set_coloring(x.coloring().clone());
    Ok(out)
}

// ---------------------------------------------------------------------------
// aggregate_in
// ---------------------------------------------------------------------------

/// Aggregate and keep: compute [`aggregate`] over the not-yet-aggregated
/// rows, then return detail rows and aggregate rows together.
///
/// Aggregate rows are tagged in the reserved `__aggregates__` column with
/// the comma-joined grouping list, so repeated calls compose multi-level
/// rollups, and shaded via the reserved `__color__` column (coarser
/// aggregates get darker grays).  With `interleaved`, each aggregate row is
/// placed directly after the detail block it summarizes; otherwise all
/// aggregate rows are appended at the end.
pub fn aggregate_in<S: AsRef<str>>(
    data: &Table,
    on: &[S],
    spec: &AggSpec,
    interleaved: bool,
) -> Result<Table> {
    let on: Vec<String> = on.iter().map(|s| s.as_ref().to_string()).collect();
    let data = data.delete_column_if_present(COLOR_COLUMN);

    // Split previously produced aggregate rows from detail rows.
    let (detail, old_aggregates, mut agg_vars) = if data.has_column(AGGREGATES_COLUMN) {
        let tags = match &data.column(AGGREGATES_COLUMN)?.data {
            ColumnData::Str(v) => v.clone(),
            _ => {
                return Err(TableError::NotNumeric(AGGREGATES_COLUMN.into()));
            }
        };
        let detail_mask: Vec<bool> = tags.iter().map(|t| t.is_empty()).collect();
        let agg_mask: Vec<bool> = detail_mask.iter().map(|b| !b).collect();
        let vars = uniqify(
            tags.iter()
                .filter(|t| !t.is_empty())
                .flat_map(|t| t.split(',').map(|s| s.to_string()))
                .collect(),
        );
        (data.mask(&detail_mask)?, data.mask(&agg_mask)?, vars)
    } else {
        (data.clone(), data.take(&[])?, Vec::new())
    };

    let new_aggregates = aggregate(&detail, &on, spec)?;
    let tag = on.join(",");
    let new_aggregates = new_aggregates.add_columns(vec![(
        AGGREGATES_COLUMN.to_string(),
        ColumnData::Str(vec![tag; new_aggregates.len()]),
    )])?;
    for o in &on {
        if !agg_vars.contains(o) {
            agg_vars.push(o.clone());
        }
    }

    let mut aggregates = row_stack(&[old_aggregates, new_aggregates], RowStackMode::Nulls)?;

    // Shade by aggregation level: fewer grouping columns, darker gray.
    let level_of = |tag: &str| -> usize { tag.split(',').filter(|s| !s.is_empty()).count() };
    let tags: Vec<String> = match &aggregates.column(AGGREGATES_COLUMN)?.data {
        ColumnData::Str(v) => v.clone(),
        _ => unreachable!("__aggregates__ is a text column"),
    };
    let mut levels: Vec<usize> = tags.iter().map(|t| level_of(t)).collect();
    levels.sort_unstable();
    levels.dedup();
    let grays = gray_codes(levels.len());
    let colors: Vec<String> = tags
        .iter()
        .map(|t| {
            let rank = levels
                .iter()
                .position(|&l| l == level_of(t))
                .expect("level present");
            grays[rank].clone()
        })
        .collect();
    aggregates = aggregates.add_columns(vec![(
        COLOR_COLUMN.to_string(),
        ColumnData::Str(colors),
    )])?;

    if !interleaved || agg_vars.is_empty() || detail.is_empty() {
        return row_stack(&[detail, aggregates], RowStackMode::Nulls);
    }

    // Finer aggregates first within each insertion point.
    let mut agg_order: Vec<usize> = (0..aggregates.len()).collect();
    agg_order.sort_by_key(|&j| std::cmp::Reverse(level_of(&tags[j])));
    let aggregates = aggregates.take(&agg_order)?;
    let tags: Vec<String> = match &aggregates.column(AGGREGATES_COLUMN)?.data {
        ColumnData::Str(v) => v.clone(),
        _ => unreachable!(),
    };

    // Sort detail rows by every aggregation variable and find the blocks.
    let present_vars: Vec<String> = agg_vars
        .iter()
        .filter(|v| detail.has_column(v))
        .cloned()
        .collect();
    let detail = detail.take(&detail.argsort(&present_vars)?)?;
    let mut block_starts = vec![0usize];
    for i in 1..detail.len() {
        if detail.key_at(&present_vars, i) != detail.key_at(&present_vars, i - 1) {
            block_starts.push(i);
        }
    }
    let n_blocks = block_starts.len();
    let block_end = |b: usize| {
        if b + 1 < n_blocks {
            block_starts[b + 1]
        } else {
            detail.len()
        }
    };
    // Attributes that change at each block boundary; the last block closes
    // every variable.
    let diff_atts: Vec<Vec<String>> = (0..n_blocks)
        .map(|b| {
            if b + 1 == n_blocks {
                present_vars.clone()
            } else {
                present_vars
                    .iter()
                    .filter(|v| {
                        detail.key_at(&[(*v).clone()], block_starts[b])
                            != detail.key_at(&[(*v).clone()], block_starts[b + 1])
                    })
                    .cloned()
                    .collect()
            }
        })
        .collect();

    let mut order: Vec<usize> = Vec::with_capacity(detail.len() + aggregates.len());
    for b in 0..n_blocks {
        order.extend(block_starts[b]..block_end(b));
        for (j, tag) in tags.iter().enumerate() {
            let vars: Vec<String> = tag
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
                .collect();
            if vars.is_empty() || !vars.iter().any(|v| diff_atts[b].contains(v)) {
                continue;
            }
            let usable: Vec<String> = vars
                .iter()
                .filter(|v| detail.has_column(v) && aggregates.has_column(v))
                .cloned()
                .collect();
            if usable.len() != vars.len() {
                continue;
            }
            if aggregates.key_at(&usable, j) == detail.key_at(&usable, block_starts[b]) {
                order.push(detail.len() + j);
            }
        }
    }

    let stacked = row_stack(&[detail, aggregates], RowStackMode::Nulls)?;
    stacked.take(&order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::new(vec![
            ("a".into(), ColumnData::Int(vec![1, 2, 1])),
            (
                "b".into(),
                ColumnData::Str(vec!["x".into(), "y".into(), "z".into()]),
            ),
            ("v".into(), ColumnData::Int(vec![10, 20, 30])),
        ])
        .unwrap()
    }

    #[test]
    fn concat_scenario() {
        // a,b / 1,x / 2,y / 1,z  aggregated on a with string join.
        let t = Table::new(vec![
            ("a".into(), ColumnData::Int(vec![1, 2, 1])),
            (
                "b".into(),
                ColumnData::Str(vec!["x".into(), "y".into(), "z".into()]),
            ),
        ])
        .unwrap();
        let agg = aggregate(&t, &["a"], &AggSpec::new()).unwrap();
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.column("a").unwrap().data, ColumnData::Int(vec![1, 2]));
        assert_eq!(
            agg.column("b").unwrap().data,
            ColumnData::Str(vec!["xz".into(), "y".into()])
        );
    }

    #[test]
    fn numeric_default_is_sum() {
        let agg = aggregate(&sample(), &["a"], &AggSpec::new()).unwrap();
        assert_eq!(agg.column("v").unwrap().data, ColumnData::Int(vec![40, 20]));
    }

    #[test]
    fn aggregate_is_idempotent() {
        let spec = AggSpec::new();
        let once = aggregate(&sample(), &["a"], &spec).unwrap();
        let twice = aggregate(&once, &["a"], &spec).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_unchanged() {
        let empty = sample().take(&[]).unwrap();
        let agg = aggregate(&empty, &["a"], &AggSpec::new()).unwrap();
        assert_eq!(agg, empty);
    }

    #[test]
    fn unknown_on_column_is_an_error() {
        assert!(matches!(
            aggregate(&sample(), &["nope"], &AggSpec::new()),
            Err(TableError::UnknownColumn(_))
        ));
    }

    #[test]
    fn empty_on_collapses_to_one_row() {
        let agg = aggregate(&sample(), &[] as &[&str], &AggSpec::new()).unwrap();
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.column("v").unwrap().data, ColumnData::Int(vec![60]));
    }

    #[test]
    fn mean_promotes_to_float() {
        let spec = AggSpec::new().with("v", Reducer::Mean);
        let agg = aggregate(&sample(), &["a"], &spec).unwrap();
        assert_eq!(
            agg.column("v").unwrap().data,
            ColumnData::Float(vec![20.0, 20.0])
        );
    }

    #[test]
    fn aggregate_in_tags_and_shades() {
        let out = aggregate_in(&sample(), &["a"], &AggSpec::new(), false).unwrap();
        assert_eq!(out.len(), 5); // 3 detail + 2 aggregate rows
        let tags = match &out.column(AGGREGATES_COLUMN).unwrap().data {
            ColumnData::Str(v) => v.clone(),
            _ => panic!(),
        };
        assert_eq!(tags.iter().filter(|t| t.is_empty()).count(), 3);
        assert_eq!(tags.iter().filter(|t| *t == "a").count(), 2);
        let colors = match &out.column(COLOR_COLUMN).unwrap().data {
            ColumnData::Str(v) => v.clone(),
            _ => panic!(),
        };
        assert!(colors.iter().any(|c| c.starts_with('#')));
    }

    #[test]
    fn aggregate_in_interleaves_after_blocks() {
        let out = aggregate_in(&sample(), &["a"], &AggSpec::new(), true).unwrap();
        let a = match &out.column("a").unwrap().data {
            ColumnData::Int(v) => v.clone(),
            _ => panic!(),
        };
        let tags = match &out.column(AGGREGATES_COLUMN).unwrap().data {
            ColumnData::Str(v) => v.clone(),
            _ => panic!(),
        };
        // Detail rows for a=1, then the a=1 aggregate, then a=2 detail and
        // its aggregate.
        assert_eq!(a, vec![1, 1, 1, 2, 2]);
        assert_eq!(tags, vec!["", "", "a", "", "a"]);
    }

    #[test]
    fn second_level_rollup_only_sees_detail_rows() {
        let first = aggregate_in(&sample(), &["a", "b"], &AggSpec::new(), false).unwrap();
        let second = aggregate_in(&first, &["a"], &AggSpec::new(), false).unwrap();
        let tags = match &second.column(AGGREGATES_COLUMN).unwrap().data {
            ColumnData::Str(v) => v.clone(),
            _ => panic!(),
        };
        // 3 detail rows, 3 (a,b)-level aggregates, 2 a-level aggregates.
        assert_eq!(second.len(), 8);
        assert_eq!(tags.iter().filter(|t| t.is_empty()).count(), 3);
        assert_eq!(tags.iter().filter(|t| *t == "a,b").count(), 3);
        assert_eq!(tags.iter().filter(|t| *t == "a").count(), 2);

        // The a-level sums cover only detail rows, not prior aggregates.
        let v: Vec<i64> = tags
            .iter()
            .enumerate()
            .filter(|(_, t)| *t == "a")
            .map(|(i, _)| match second.column("v").unwrap().data.get(i) {
                Value::Int(x) => x,
                _ => panic!(),
            })
            .collect();
        let mut v = v;
        v.sort_unstable();
        assert_eq!(v, vec![20, 40]);
    }
}
