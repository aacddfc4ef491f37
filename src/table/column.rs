use std::fmt;

// ---------------------------------------------------------------------------
// Value – a single typed cell
// ---------------------------------------------------------------------------

/// A single cell value: 64-bit integer, 64-bit float or text.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use Value::*;
        fn discriminant(v: &Value) -> u8 {
            match v {
                Int(_) => 0,
                Float(_) => 1,
                Str(_) => 2,
            }
        }
        match (self, other) {
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (Str(a), Str(b)) => a.cmp(b),
            // Mixed numeric comparisons happen when grouping over promoted
            // columns; compare numerically before falling back to the tag.
            (Int(a), Float(b)) => (*a as f64).total_cmp(b),
            (Float(a), Int(b)) => a.total_cmp(&(*b as f64)),
            _ => discriminant(self).cmp(&discriminant(other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl Value {
    /// Numeric view, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(v) => Some(*v),
            Value::Str(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnType – the three scalar column types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ColumnType {
    Int,
    Float,
    Str,
}

impl ColumnType {
    /// Short type tag used in text headers and HSV file names.
    pub fn tag(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Float => "float",
            ColumnType::Str => "str",
        }
    }

    /// Storage format string written in the `formats` metadata line.
    pub fn format(&self) -> &'static str {
        match self {
            ColumnType::Int => "i64",
            ColumnType::Float => "f64",
            ColumnType::Str => "utf8",
        }
    }

    /// Parse either a type tag (`int`) or a format string (`i64`).
    pub fn parse(s: &str) -> Option<ColumnType> {
        match s.trim() {
            "int" | "i64" => Some(ColumnType::Int),
            "float" | "f64" => Some(ColumnType::Float),
            "str" | "utf8" => Some(ColumnType::Str),
            _ => None,
        }
    }

    /// Null value for this type (0 / 0.0 / empty string).
    pub fn null(&self) -> Value {
        match self {
            ColumnType::Int => Value::Int(0),
            ColumnType::Float => Value::Float(0.0),
            ColumnType::Str => Value::Str(String::new()),
        }
    }

    /// Widest compatible type: Int < Float < Str.
    pub fn promote(self, other: ColumnType) -> ColumnType {
        self.max(other)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// ColumnData – one column of uniformly typed values
// ---------------------------------------------------------------------------

/// The values of one column, uniformly typed.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int(Vec<i64>),
    Float(Vec<f64>),
    Str(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int(v) => v.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnData::Int(_) => ColumnType::Int,
            ColumnData::Float(_) => ColumnType::Float,
            ColumnData::Str(_) => ColumnType::Str,
        }
    }

    /// Empty column of the given type.
    pub fn empty(ty: ColumnType) -> ColumnData {
        match ty {
            ColumnType::Int => ColumnData::Int(Vec::new()),
            ColumnType::Float => ColumnData::Float(Vec::new()),
            ColumnType::Str => ColumnData::Str(Vec::new()),
        }
    }

    pub fn get(&self, i: usize) -> Value {
        match self {
            ColumnData::Int(v) => Value::Int(v[i]),
            ColumnData::Float(v) => Value::Float(v[i]),
            ColumnData::Str(v) => Value::Str(v[i].clone()),
        }
    }

    /// Value comparison that treats NaN as equal to NaN, so that round-trip
    /// tests over float columns with missing values are meaningful.
    pub fn value_eq(&self, other: &ColumnData) -> bool {
        match (self, other) {
            (ColumnData::Float(a), ColumnData::Float(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
            }
            _ => self == other,
        }
    }

    pub fn push(&mut self, value: Value) {
        match (self, value) {
            (ColumnData::Int(v), Value::Int(x)) => v.push(x),
            (ColumnData::Float(v), Value::Float(x)) => v.push(x),
            (ColumnData::Float(v), Value::Int(x)) => v.push(x as f64),
            (ColumnData::Str(v), Value::Str(x)) => v.push(x),
            (ColumnData::Str(v), x) => v.push(x.to_string()),
            (col, x) => unreachable!("pushing {x:?} into {} column", col.column_type()),
        }
    }

    /// New column with the rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> ColumnData {
        match self {
            ColumnData::Int(v) => ColumnData::Int(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Float(v) => ColumnData::Float(indices.iter().map(|&i| v[i]).collect()),
            ColumnData::Str(v) => {
                ColumnData::Str(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }

    /// Copy widened to `ty`.  Only widening conversions are supported
    /// (Int→Float, anything→Str); same-type is a plain clone.
    pub fn widen(&self, ty: ColumnType) -> ColumnData {
        match (self, ty) {
            (ColumnData::Int(v), ColumnType::Float) => {
                ColumnData::Float(v.iter().map(|&x| x as f64).collect())
            }
            (ColumnData::Int(v), ColumnType::Str) => {
                ColumnData::Str(v.iter().map(|x| x.to_string()).collect())
            }
            (ColumnData::Float(v), ColumnType::Str) => {
                ColumnData::Str(v.iter().map(|x| x.to_string()).collect())
            }
            _ => self.clone(),
        }
    }

    /// Render every value as text (the writer's fast path).
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            ColumnData::Int(v) => v.iter().map(|x| x.to_string()).collect(),
            ColumnData::Float(v) => v.iter().map(|x| x.to_string()).collect(),
            ColumnData::Str(v) => v.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Type inference: int → float → str funnel
// ---------------------------------------------------------------------------

/// Infer a typed column from raw text values.
///
/// All values parse as integers → integer column; else all parse as floats
/// (empty string counts as missing and becomes NaN) → float column; else the
/// values are kept verbatim as text.  Strict: a single non-conforming value
/// demotes the whole column.
pub fn type_infer<S: AsRef<str>>(raw: &[S]) -> ColumnData {
    let ints: Option<Vec<i64>> = raw.iter().map(|s| s.as_ref().trim().parse().ok()).collect();
    if let Some(v) = ints {
        return ColumnData::Int(v);
    }
    let floats: Option<Vec<f64>> = raw
        .iter()
        .map(|s| {
            let s = s.as_ref().trim();
            if s.is_empty() {
                Some(f64::NAN)
            } else {
                s.parse().ok()
            }
        })
        .collect();
    if let Some(v) = floats {
        return ColumnData::Float(v);
    }
    ColumnData::Str(raw.iter().map(|s| s.as_ref().to_string()).collect())
}

/// Parse raw text values as a declared type.  Returns `None` (with no
/// diagnostic; callers decide) when any value fails to parse.
pub fn parse_as<S: AsRef<str>>(raw: &[S], ty: ColumnType) -> Option<ColumnData> {
    match ty {
        ColumnType::Int => raw
            .iter()
            .map(|s| s.as_ref().trim().parse().ok())
            .collect::<Option<Vec<i64>>>()
            .map(ColumnData::Int),
        ColumnType::Float => raw
            .iter()
            .map(|s| {
                let s = s.as_ref().trim();
                if s.is_empty() {
                    Some(f64::NAN)
                } else {
                    s.parse().ok()
                }
            })
            .collect::<Option<Vec<f64>>>()
            .map(ColumnData::Float),
        ColumnType::Str => Some(ColumnData::Str(
            raw.iter().map(|s| s.as_ref().to_string()).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_int_column() {
        assert_eq!(
            type_infer(&["1", "2", "3"]),
            ColumnData::Int(vec![1, 2, 3])
        );
    }

    #[test]
    fn single_float_demotes_to_float() {
        assert_eq!(
            type_infer(&["1", "2.5"]),
            ColumnData::Float(vec![1.0, 2.5])
        );
    }

    #[test]
    fn single_text_demotes_to_str() {
        assert_eq!(
            type_infer(&["1", "x"]),
            ColumnData::Str(vec!["1".into(), "x".into()])
        );
    }

    #[test]
    fn empty_string_is_missing_float() {
        let col = type_infer(&["1", "", "3"]);
        match col {
            ColumnData::Float(v) => {
                assert_eq!(v[0], 1.0);
                assert!(v[1].is_nan());
                assert_eq!(v[2], 3.0);
            }
            other => panic!("expected float column, got {other:?}"),
        }
    }

    #[test]
    fn promotion_order() {
        assert_eq!(ColumnType::Int.promote(ColumnType::Float), ColumnType::Float);
        assert_eq!(ColumnType::Float.promote(ColumnType::Str), ColumnType::Str);
        assert_eq!(ColumnType::Int.promote(ColumnType::Int), ColumnType::Int);
    }

    #[test]
    fn float_display_roundtrips() {
        let col = ColumnData::Float(vec![0.1, 2.5, f64::NAN]);
        let strs = col.to_strings();
        let back = parse_as(&strs, ColumnType::Float).unwrap();
        assert!(col.value_eq(&back));
    }
}
