//! Pivoting: turn the values of one column into a family of output columns.

use std::collections::BTreeSet;

use crate::error::{Result, TableError};
use crate::ops::stack::row_stack;
use crate::ops::RowStackMode;
use crate::table::{ColumnData, ColumnType, Coloring, Table, Value};

/// Pivot `x` on `(a, b)`: `a` becomes the row axis, the distinct values of
/// `b` the column axis.
///
/// The `(a, b)` value pairs must be unique.  When the cross product of
/// distinct `a` and `b` values is not fully present, the missing rows are
/// synthesized with type-appropriate null values before pivoting.  Columns
/// that are *trivial relative to `b`* (constant for every fixed `b` value)
/// contribute no output columns; every non-trivial column `c` expands into
/// one `<bval>_<c>` column per `b` value.  Trivial columns listed in `keep`
/// are cross-grouped by value into coloring entries; requesting a
/// non-trivial column there is an error.  The result's coloring also groups
/// the expansion of each non-trivial column and, under `prefix`, the columns
/// of each `b` value.
pub fn pivot<S: AsRef<str>>(
    x: &Table,
    a: &str,
    b: &str,
    keep: Option<&[S]>,
    prefix: &str,
) -> Result<Table> {
    x.column(a)?;
    x.column(b)?;
    let other_names: Vec<String> = x
        .names()
        .into_iter()
        .filter(|n| n != a && n != b)
        .collect();

    // Key uniqueness over (a, b).
    let ab = [a.to_string(), b.to_string()];
    let order = x.argsort(&ab)?;
    for w in order.windows(2) {
        if x.key_at(&ab, w[0]) == x.key_at(&ab, w[1]) {
            return Err(TableError::PivotPairsNotUnique(a.into(), b.into()));
        }
    }

    let unique_a = unique_sorted(x, a)?;
    let unique_b = unique_sorted(x, b)?;
    let (da, db) = (unique_a.len(), unique_b.len());

    // Complete the cross product with null-filled rows.
    let x = if x.len() != da * db {
        let present: BTreeSet<Vec<Value>> =
            (0..x.len()).map(|i| x.key_at(&ab, i)).collect();
        let mut missing: Vec<Vec<Value>> = Vec::new();
        for va in &unique_a {
            for vb in &unique_b {
                let key = vec![va.clone(), vb.clone()];
                if !present.contains(&key) {
                    missing.push(key);
                }
            }
        }
        let mut columns: Vec<(String, ColumnData)> = Vec::new();
        let mut push_values = |name: &str, values: Vec<Value>, ty: ColumnType| {
            let mut data = ColumnData::empty(ty);
            for v in values {
                data.push(v);
            }
            columns.push((name.to_string(), data));
        };
        push_values(
            a,
            missing.iter().map(|k| k[0].clone()).collect(),
            x.column(a)?.column_type(),
        );
        push_values(
            b,
            missing.iter().map(|k| k[1].clone()).collect(),
            x.column(b)?.column_type(),
        );
        for name in &other_names {
            let ty = x.column(name)?.column_type();
            push_values(name, vec![ty.null(); missing.len()], ty);
        }
        let filler = Table::new(columns)?;
        row_stack(&[x.clone(), filler], RowStackMode::Nulls)?
    } else {
        x.clone()
    };

    let x = x.take(&x.argsort(&ab)?)?;

    // The b values, stringified for column naming, must not collide.
    let bcol = &x.column(b)?.data;
    let bnames: Vec<String> = (0..db)
        .map(|i| bcol.get(i).to_string().replace(' ', ""))
        .collect();
    let collisions: Vec<String> = bnames
        .iter()
        .filter(|bn| other_names.contains(bn) || *bn == a)
        .cloned()
        .collect();
    if !collisions.is_empty() {
        return Err(TableError::PivotNameCollision(b.into(), collisions));
    }

    // Row axis: every Db-th value of the sorted a column.
    let acol_data = &x.column(a)?.data;
    let a_indices: Vec<usize> = (0..da).map(|r| r * db).collect();
    let acol = acol_data.take(&a_indices);

    // Classify every other column and expand the non-trivial ones.
    let mut trivials: Vec<String> = Vec::new();
    let mut non_trivials: Vec<String> = Vec::new();
    let mut columns: Vec<(String, ColumnData)> = vec![(a.to_string(), acol)];
    for c in &other_names {
        let data = &x.column(c)?.data;
        let trivial = (0..db).all(|i| {
            let first = data.get(i);
            (1..da).all(|r| data.get(r * db + i) == first)
        });
        if trivial {
            trivials.push(c.clone());
        } else {
            non_trivials.push(c.clone());
            for (i, bn) in bnames.iter().enumerate() {
                let cells: Vec<usize> = (0..da).map(|r| r * db + i).collect();
                columns.push((format!("{bn}_{c}"), data.take(&cells)));
            }
        }
    }

    // Trivial columns requested in `keep` become value-keyed groups; a
    // non-trivial column there is a hard error rather than a silent drop.
    let mut coloring = Coloring::new();
    if let Some(keep) = keep {
        let not_trivial: Vec<String> = keep
            .iter()
            .map(|k| k.as_ref().to_string())
            .filter(|k| !trivials.contains(k))
            .collect();
        if !not_trivial.is_empty() {
            return Err(TableError::PivotKeepNotTrivial(not_trivial, b.into()));
        }
        for c in keep {
            let c = c.as_ref();
            let data = &x.column(c)?.data;
            let mut cvals: Vec<Value> = Vec::new();
            for i in 0..x.len() {
                let v = data.get(i);
                if !cvals.contains(&v) {
                    cvals.push(v);
                }
            }
            for cv in cvals {
                // b values co-occurring with this trivial value.
                let blist: Vec<String> = (0..db)
                    .filter(|&i| data.get(i) == cv)
                    .map(|i| bnames[i].clone())
                    .collect();
                let label = cv.to_string();
                let mut members = vec![a.to_string()];
                for bn in &blist {
                    for d in &non_trivials {
                        members.push(format!("{bn}_{d}"));
                    }
                }
                coloring.insert(label.clone(), members);
                for d in &non_trivials {
                    let mut members = vec![a.to_string()];
                    members.extend(blist.iter().map(|bn| format!("{bn}_{d}")));
                    coloring.insert(format!("{label}_{d}"), members);
                }
            }
        }
    }

    for c in &non_trivials {
        let mut members = vec![a.to_string()];
        members.extend(bnames.iter().map(|bn| format!("{bn}_{c}")));
        coloring.insert(c.clone(), members);
    }
    for bn in &bnames {
        let mut members = vec![a.to_string()];
        members.extend(non_trivials.iter().map(|c| format!("{bn}_{c}")));
        coloring.insert(format!("{prefix}{bn}"), members);
    }

    let mut out = Table::new(columns)?;
    out.set_coloring(coloring);
    Ok(out)
}

fn unique_sorted(x: &Table, col: &str) -> Result<Vec<Value>> {
    let order = x.argsort(&[col])?;
    let data = &x.column(col)?.data;
    let mut out: Vec<Value> = Vec::new();
    for &i in &order {
        let v = data.get(i);
        if out.last() != Some(&v) {
            out.push(v);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two subjects by two conditions, with a measurement and a column fully
    /// determined by the condition.
    fn sample() -> Table {
        Table::new(vec![
            ("subj".into(), ColumnData::Int(vec![1, 1, 2, 2])),
            (
                "cond".into(),
                ColumnData::Str(vec!["lo".into(), "hi".into(), "lo".into(), "hi".into()]),
            ),
            ("m".into(), ColumnData::Float(vec![0.1, 0.2, 0.3, 0.4])),
            (
                "gain".into(),
                ColumnData::Int(vec![10, 20, 10, 20]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn expands_non_trivial_columns() {
        let p = pivot(&sample(), "subj", "cond", None::<&[&str]>, "_").unwrap();
        assert_eq!(
            p.names(),
            vec!["subj", "hi_m", "lo_m"] // b values sort: "hi" < "lo"
        );
        assert_eq!(p.column("subj").unwrap().data, ColumnData::Int(vec![1, 2]));
        assert_eq!(
            p.column("hi_m").unwrap().data,
            ColumnData::Float(vec![0.2, 0.4])
        );
        assert_eq!(
            p.column("lo_m").unwrap().data,
            ColumnData::Float(vec![0.1, 0.3])
        );
        // "gain" is trivial relative to "cond" and contributes no columns.
        assert!(!p.names().iter().any(|n| n.contains("gain")));
        // Expansion and per-b-value groups exist.
        assert!(p.coloring().contains("m"));
        assert!(p.coloring().contains("_hi"));
        assert!(p.coloring().contains("_lo"));
    }

    #[test]
    fn incomplete_cross_product_is_null_filled() {
        let t = sample().take(&[0, 1, 2]).unwrap(); // drop (2, "hi")
        let p = pivot(&t, "subj", "cond", None::<&[&str]>, "_").unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(
            p.column("hi_m").unwrap().data,
            ColumnData::Float(vec![0.2, 0.0])
        );
    }

    #[test]
    fn duplicate_pairs_are_rejected() {
        let t = Table::new(vec![
            ("a".into(), ColumnData::Int(vec![1, 1])),
            ("b".into(), ColumnData::Int(vec![2, 2])),
            ("v".into(), ColumnData::Int(vec![3, 4])),
        ])
        .unwrap();
        assert!(matches!(
            pivot(&t, "a", "b", None::<&[&str]>, "_"),
            Err(TableError::PivotPairsNotUnique(_, _))
        ));
    }

    #[test]
    fn keep_of_non_trivial_column_is_an_error() {
        assert!(matches!(
            pivot(&sample(), "subj", "cond", Some(&["m"]), "_"),
            Err(TableError::PivotKeepNotTrivial(_, _))
        ));
    }

    #[test]
    fn keep_cross_groups_by_value() {
        let p = pivot(&sample(), "subj", "cond", Some(&["gain"]), "_").unwrap();
        // gain=10 co-occurs with cond="lo" only.
        assert_eq!(
            p.coloring().get("10").unwrap(),
            &["subj".to_string(), "lo_m".to_string()]
        );
        assert_eq!(
            p.coloring().get("10_m").unwrap(),
            &["subj".to_string(), "lo_m".to_string()]
        );
    }

    #[test]
    fn melting_recovers_the_pivoted_values() {
        let t = sample();
        let p = pivot(&t, "subj", "cond", None::<&[&str]>, "_").unwrap();

        // Un-pivot the non-trivial column by walking the expansion.
        let mut recovered: Vec<(Value, String, Value)> = Vec::new();
        for bn in ["hi", "lo"] {
            let col = p.column(&format!("{bn}_m")).unwrap();
            for i in 0..p.len() {
                recovered.push((
                    p.column("subj").unwrap().data.get(i),
                    bn.to_string(),
                    col.data.get(i),
                ));
            }
        }
        let mut expected: Vec<(Value, String, Value)> = (0..t.len())
            .map(|i| {
                (
                    t.column("subj").unwrap().data.get(i),
                    t.column("cond").unwrap().data.get(i).to_string(),
                    t.column("m").unwrap().data.get(i),
                )
            })
            .collect();
        recovered.sort();
        expected.sort();
        assert_eq!(recovered, expected);
    }

    #[test]
    fn b_value_collision_is_an_error() {
        let t = Table::new(vec![
            ("a".into(), ColumnData::Int(vec![1, 2])),
            (
                "b".into(),
                ColumnData::Str(vec!["m".into(), "m2".into()]),
            ),
            ("m".into(), ColumnData::Int(vec![3, 4])),
        ])
        .unwrap();
        assert!(matches!(
            pivot(&t, "a", "b", None::<&[&str]>, "_"),
            Err(TableError::PivotNameCollision(_, _))
        ));
    }
}
