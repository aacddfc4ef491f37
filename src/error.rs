use thiserror::Error;

pub type Result<T> = std::result::Result<T, TableError>;

/// Library error type.
///
/// Schema errors and invariant violations are always hard failures;
/// degraded-inference conditions never appear here (they are logged and a
/// documented default is chosen instead).
#[derive(Error, Debug)]
pub enum TableError {
    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("unknown coloring group '{0}'")]
    UnknownGroup(String),

    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),

    #[error("column '{name}' has {got} values, expected {expected}")]
    LengthMismatch {
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("record {row} has {got} fields, expected {expected}")]
    NonRectangular {
        row: usize,
        got: usize,
        expected: usize,
    },

    #[error("column '{0}' is not numeric")]
    NotNumeric(String),

    #[error("values in key columns {0:?} are not unique in input '{1}'")]
    NonUniqueKeys(Vec<String>, String),

    #[error("key columns {0:?} missing or differently typed in input '{1}'")]
    BadKeyColumns(Vec<String>, String),

    #[error("non-key column names {0:?} appear in more than one join input")]
    DisjointnessViolation(Vec<String>),

    #[error("no suitable common key columns found: {0}")]
    NoCommonKey(String),

    #[error("pairs of values in columns '{0}' and '{1}' must be unique")]
    PivotPairsNotUnique(String, String),

    #[error("pivoted values of column '{0}' collide with existing column names: {1:?}")]
    PivotNameCollision(String, Vec<String>),

    #[error("columns {0:?} were requested as trivial but are not trivial relative to '{1}'")]
    PivotKeepNotTrivial(Vec<String>, String),

    #[error("input tables have no columns in common")]
    EmptyIntersection,

    #[error("column names {0:?} appear in more than one stacked input")]
    ColumnNameClash(Vec<String>),

    #[error("input tables have differing column sets")]
    ColumnSetMismatch,

    #[error("row counts differ across stacked inputs: {0:?}")]
    RowCountMismatch(Vec<usize>),

    #[error("no input tables given")]
    EmptyInput,

    #[error("no usable data loaded from '{0}'")]
    NothingLoaded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}
