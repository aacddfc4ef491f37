//! Core data model: a rectangular, column-typed, row-aligned container plus
//! a hierarchical naming layer (the coloring) over its columns.
//!
//! A [`Table`] owns its column buffers outright.  Every subsetting operation
//! returns an independent copy, never an aliasing view; the only in-place
//! mutations are column rename, scalar replacement and coloring edits.

pub mod coloring;
pub mod column;

use log::warn;

use crate::error::{Result, TableError};
pub use coloring::Coloring;
pub use column::{parse_as, type_infer, ColumnData, ColumnType, Value};

use coloring::uniqify;

// ---------------------------------------------------------------------------
// Column – one named, typed buffer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new<S: Into<String>>(name: S, data: ColumnData) -> Column {
        Column {
            name: name.into(),
            data,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        self.data.column_type()
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// An ordered sequence of named columns of equal length, with unique names,
/// plus a [`Coloring`] grouping the column names hierarchically.
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<Column>,
    coloring: Coloring,
}

impl PartialEq for Table {
    /// Column-wise name, type and value equality (NaN == NaN), plus coloring
    /// equality.  Column order is significant.
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(other.columns.iter())
                .all(|(a, b)| a.name == b.name && a.data.value_eq(&b.data))
            && self.coloring == other.coloring
    }
}

impl Table {
    // -- Construction -------------------------------------------------------

    /// Build a table from (name, data) pairs.  Names must be unique and all
    /// columns the same length.
    pub fn new(columns: Vec<(String, ColumnData)>) -> Result<Table> {
        let mut table = Table::default();
        let expected = columns.first().map(|(_, d)| d.len()).unwrap_or(0);
        for (name, data) in columns {
            if table.columns.iter().any(|c| c.name == name) {
                return Err(TableError::DuplicateColumn(name));
            }
            if data.len() != expected {
                return Err(TableError::LengthMismatch {
                    name,
                    got: data.len(),
                    expected,
                });
            }
            table.columns.push(Column::new(name, data));
        }
        Ok(table)
    }

    /// Build a table from column-major raw data, inferring each column's
    /// type with the int → float → str funnel.
    pub fn from_columns<S: AsRef<str>>(names: &[S], columns: Vec<Vec<String>>) -> Result<Table> {
        if names.len() != columns.len() {
            return Err(TableError::NonRectangular {
                row: 0,
                got: columns.len(),
                expected: names.len(),
            });
        }
        Table::new(
            names
                .iter()
                .zip(columns.into_iter())
                .map(|(n, c)| (n.as_ref().to_string(), type_infer(&c)))
                .collect(),
        )
    }

    /// Build a table from row-major records.
    ///
    /// Column types are taken from `types` when given; otherwise each
    /// column's type is the widest type among its values.  An empty record
    /// set still produces a well-typed zero-row table over `names` (declared
    /// types, or text when none are declared).
    pub fn from_records<S: AsRef<str>>(
        records: &[Vec<Value>],
        names: &[S],
        types: Option<&[ColumnType]>,
    ) -> Result<Table> {
        for (i, rec) in records.iter().enumerate() {
            if rec.len() != names.len() {
                return Err(TableError::NonRectangular {
                    row: i,
                    got: rec.len(),
                    expected: names.len(),
                });
            }
        }
        let mut columns = Vec::with_capacity(names.len());
        for (j, name) in names.iter().enumerate() {
            let ty = match types {
                Some(ts) => ts[j],
                None if records.is_empty() => ColumnType::Str,
                None => records
                    .iter()
                    .map(|r| match &r[j] {
                        Value::Int(_) => ColumnType::Int,
                        Value::Float(_) => ColumnType::Float,
                        Value::Str(_) => ColumnType::Str,
                    })
                    .fold(ColumnType::Int, ColumnType::promote),
            };
            let mut data = ColumnData::empty(ty);
            for rec in records {
                match (ty, &rec[j]) {
                    (ColumnType::Int, Value::Float(_))
                    | (ColumnType::Int, Value::Str(_))
                    | (ColumnType::Float, Value::Str(_)) => {
                        return Err(TableError::NotNumeric(name.as_ref().to_string()))
                    }
                    _ => data.push(rec[j].clone()),
                }
            }
            columns.push((name.as_ref().to_string(), data));
        }
        Table::new(columns)
    }

    /// Attach a coloring, stripping any group whose name collides with a
    /// column name (with a diagnostic).
    pub fn with_coloring(mut self, coloring: Coloring) -> Table {
        self.set_coloring(coloring);
        self
    }

    pub fn set_coloring(&mut self, mut coloring: Coloring) {
        coloring.strip_collisions(&self.names());
        self.coloring = coloring;
    }

    /// Add a group named `wrap` listing every column (so an HSV save nests
    /// the whole table under `wrap.hsv/`).
    pub fn with_wrap<S: Into<String>>(mut self, wrap: S) -> Table {
        self.coloring.insert(wrap, self.names());
        self
    }

    // -- Introspection ------------------------------------------------------

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.columns.first().map(|c| c.data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn coloring(&self) -> &Coloring {
        &self.coloring
    }

    pub fn coloring_mut(&mut self) -> &mut Coloring {
        &mut self.coloring
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// One row as values, in column order.
    pub fn row(&self, i: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.data.get(i)).collect()
    }

    /// The values of `cols` at row `i`, used as a grouping/join key.
    pub fn key_at(&self, cols: &[String], i: usize) -> Vec<Value> {
        cols.iter()
            .map(|c| self.column(c).expect("key column checked").data.get(i))
            .collect()
    }

    // -- Column subsetting --------------------------------------------------

    /// Expand a mixed list of column names and coloring group names into the
    /// de-duplicated list of column names, preserving first occurrence.
    pub fn expand_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>> {
        let mut out = Vec::new();
        for n in names {
            let n = n.as_ref();
            if self.has_column(n) {
                out.push(n.to_string());
            } else if let Some(members) = self.coloring.get(n) {
                out.extend(members.iter().cloned());
            } else {
                return Err(TableError::UnknownColumn(n.to_string()));
            }
        }
        Ok(uniqify(out))
    }

    /// New table with the columns named (or grouped) in `names`; the
    /// coloring is thresholded to the surviving columns.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let expanded = self.expand_names(names)?;
        let columns = expanded
            .iter()
            .map(|n| self.column(n).map(|c| c.clone()))
            .collect::<Result<Vec<_>>>()?;
        let mut coloring = self.coloring.clone();
        coloring.threshold(&expanded);
        Ok(Table { columns, coloring })
    }

    /// New table holding exactly the columns of one coloring group.
    pub fn group(&self, name: &str) -> Result<Table> {
        if !self.coloring.contains(name) {
            return Err(TableError::UnknownGroup(name.to_string()));
        }
        self.select(&[name])
    }

    // -- Row subsetting -----------------------------------------------------

    /// New table with the rows where `mask` is true.  The coloring is
    /// carried over unchanged (row subsetting never changes columns).
    pub fn mask(&self, mask: &[bool]) -> Result<Table> {
        if mask.len() != self.len() {
            return Err(TableError::LengthMismatch {
                name: "<mask>".into(),
                got: mask.len(),
                expected: self.len(),
            });
        }
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.take(&indices)
    }

    /// New table with the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Result<Table> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(TableError::LengthMismatch {
                name: "<index>".into(),
                got: bad,
                expected: self.len(),
            });
        }
        Ok(Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(indices)))
                .collect(),
            coloring: self.coloring.clone(),
        })
    }

    /// Indices that stably sort the table by the given key columns.
    pub fn argsort<S: AsRef<str>>(&self, on: &[S]) -> Result<Vec<usize>> {
        let on: Vec<String> = on.iter().map(|s| s.as_ref().to_string()).collect();
        for c in &on {
            self.column(c)?;
        }
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.key_at(&on, a).cmp(&self.key_at(&on, b)));
        Ok(order)
    }

    // -- Column addition / deletion -----------------------------------------

    /// New table with the given columns appended.  A column whose name
    /// already exists replaces the existing data in place (with a
    /// diagnostic), keeping the original position.
    pub fn add_columns(&self, cols: Vec<(String, ColumnData)>) -> Result<Table> {
        let mut out = self.clone();
        for (name, data) in cols {
            if data.len() != out.len() && !(out.columns.is_empty()) {
                return Err(TableError::LengthMismatch {
                    name,
                    got: data.len(),
                    expected: out.len(),
                });
            }
            match out.columns.iter_mut().find(|c| c.name == name) {
                Some(existing) => {
                    warn!("replacing existing column '{name}'");
                    existing.data = data;
                }
                None => out.columns.push(Column::new(name, data)),
            }
        }
        Ok(out)
    }

    /// New table with the given records appended.  Values must match the
    /// column types (integers widen into float columns, anything renders
    /// into text columns).
    pub fn add_records(&self, records: &[Vec<Value>]) -> Result<Table> {
        let mut out = self.clone();
        for (i, rec) in records.iter().enumerate() {
            if rec.len() != out.n_columns() {
                return Err(TableError::NonRectangular {
                    row: i,
                    got: rec.len(),
                    expected: out.n_columns(),
                });
            }
            for (col, value) in out.columns.iter_mut().zip(rec.iter()) {
                match (col.data.column_type(), value) {
                    (ColumnType::Int, Value::Float(_)) | (ColumnType::Int, Value::Str(_)) => {
                        return Err(TableError::NotNumeric(col.name.clone()))
                    }
                    (ColumnType::Float, Value::Str(_)) => {
                        return Err(TableError::NotNumeric(col.name.clone()))
                    }
                    _ => col.data.push(value.clone()),
                }
            }
        }
        Ok(out)
    }

    /// New table without the named columns.  Names may include coloring
    /// group names, which expand to their members; the coloring of the
    /// result is thresholded to the surviving columns.
    pub fn delete_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let doomed = self.expand_names(names)?;
        let survivors: Vec<String> = self
            .names()
            .into_iter()
            .filter(|n| !doomed.contains(n))
            .collect();
        let columns = survivors
            .iter()
            .map(|n| self.column(n).map(|c| c.clone()))
            .collect::<Result<Vec<_>>>()?;
        let mut coloring = self.coloring.clone();
        coloring.threshold(&survivors);
        Ok(Table { columns, coloring })
    }

    /// Drop the named column if present; no-op otherwise.  Used for the
    /// reserved bookkeeping columns of `aggregate_in`.
    pub(crate) fn delete_column_if_present(&self, name: &str) -> Table {
        if self.has_column(name) {
            self.delete_columns(&[name]).expect("column just checked")
        } else {
            self.clone()
        }
    }

    // -- In-place mutation --------------------------------------------------

    /// Rename a column in place, rewriting every coloring entry that
    /// references the old name.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if self.has_column(new) {
            return Err(TableError::DuplicateColumn(new.to_string()));
        }
        let col = self
            .columns
            .iter_mut()
            .find(|c| c.name == old)
            .ok_or_else(|| TableError::UnknownColumn(old.to_string()))?;
        col.name = new.to_string();
        self.coloring.rename_column(old, new);
        Ok(())
    }

    /// Replace `old` with `new` in place.
    ///
    /// With `strict`, only exact value matches are replaced, in every column
    /// whose type matches `old` (non-matching columns are skipped with a
    /// diagnostic).  Without `strict`, `old` and `new` must be text and every
    /// substring occurrence is rewritten in text columns.  `cols` restricts
    /// the operation to the named columns, `rows` to a boolean mask.
    pub fn replace(
        &mut self,
        old: &Value,
        new: &Value,
        strict: bool,
        cols: Option<&[&str]>,
        rows: Option<&[bool]>,
    ) -> Result<()> {
        let targets: Vec<String> = match cols {
            Some(cs) => {
                for c in cs {
                    self.column(c)?;
                }
                cs.iter().map(|c| c.to_string()).collect()
            }
            None => self.names(),
        };
        if let Some(mask) = rows {
            if mask.len() != self.len() {
                return Err(TableError::LengthMismatch {
                    name: "<mask>".into(),
                    got: mask.len(),
                    expected: self.len(),
                });
            }
        }
        let selected = |i: usize| rows.map(|m| m[i]).unwrap_or(true);

        for name in targets {
            let col = self.columns.iter_mut().find(|c| c.name == name).unwrap();
            if strict {
                match (&mut col.data, old, new) {
                    (ColumnData::Int(v), Value::Int(o), Value::Int(n)) => {
                        v.iter_mut()
                            .enumerate()
                            .filter(|(i, x)| selected(*i) && **x == *o)
                            .for_each(|(_, x)| *x = *n);
                    }
                    (ColumnData::Float(v), o, n) => {
                        let (o, n) = match (o.as_f64(), n.as_f64()) {
                            (Some(o), Some(n)) => (o, n),
                            _ => {
                                warn!("replacement not made on column '{name}': type mismatch");
                                continue;
                            }
                        };
                        v.iter_mut()
                            .enumerate()
                            .filter(|(i, x)| selected(*i) && **x == o)
                            .for_each(|(_, x)| *x = n);
                    }
                    (ColumnData::Str(v), Value::Str(o), Value::Str(n)) => {
                        v.iter_mut()
                            .enumerate()
                            .filter(|(i, x)| selected(*i) && *x == o)
                            .for_each(|(_, x)| *x = n.clone());
                    }
                    _ => {
                        warn!("replacement not made on column '{name}': type mismatch");
                    }
                }
            } else {
                let (o, n) = match (old, new) {
                    (Value::Str(o), Value::Str(n)) => (o.clone(), n.clone()),
                    _ => {
                        warn!(
                            "substring replacement requires text values; \
                             skipping column '{name}'"
                        );
                        continue;
                    }
                };
                match &mut col.data {
                    ColumnData::Str(v) => {
                        v.iter_mut()
                            .enumerate()
                            .filter(|(i, _)| selected(*i))
                            .for_each(|(_, x)| *x = x.replace(&o, &n));
                    }
                    _ => {
                        warn!("not replacing in column '{name}' due to type mismatch");
                    }
                }
            }
        }
        Ok(())
    }

    // -- Numeric export -----------------------------------------------------

    /// Copy the table into a row-major numeric matrix.  Every column must be
    /// numeric (integers widen to f64); a text column is a caller error.
    pub fn extract(&self) -> Result<Vec<Vec<f64>>> {
        for c in &self.columns {
            if c.column_type() == ColumnType::Str {
                return Err(TableError::NotNumeric(c.name.clone()));
            }
        }
        Ok((0..self.len())
            .map(|i| {
                self.columns
                    .iter()
                    .map(|c| c.data.get(i).as_f64().expect("numeric checked"))
                    .collect()
            })
            .collect())
    }
}
