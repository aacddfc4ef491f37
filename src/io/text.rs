//! Flat delimited-text persistence with an optional comment-prefixed
//! metadata header.
//!
//! Writing emits the selected metadata kinds (names, types, formats,
//! coloring, dialect) as comment lines, optionally preceded by a
//! `metametadata={...}` index line recording where each kind lives; reading
//! is the strict inverse and tolerates files with none, some or all of the
//! kinds present, falling back to inference for whatever is missing.

use std::fs;
use std::path::Path;

use log::{debug, warn};

use super::infer::{
    columns_from_records, infer_dialect, infer_header, read_stored_metadata, LineSpan, MetaIndex,
};
use super::Dialect;
use crate::error::{Result, TableError};
use crate::table::{ColumnType, Coloring, Table};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Which metadata kinds to include in a text header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Dialect,
    Coloring,
    Types,
    Formats,
    Names,
}

impl MetadataKind {
    fn key(self) -> &'static str {
        match self {
            MetadataKind::Dialect => "dialect",
            MetadataKind::Coloring => "coloring",
            MetadataKind::Types => "types",
            MetadataKind::Formats => "formats",
            MetadataKind::Names => "names",
        }
    }
}

/// Header metadata selection for writing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MetadataSpec {
    /// No header at all, just data rows.
    None,
    /// Column names only, without an index line.
    #[default]
    NamesOnly,
    /// Every kind, with an index line.
    All,
    /// An explicit selection, with an index line.
    Kinds(Vec<MetadataKind>),
}

impl MetadataSpec {
    fn kinds(&self) -> Vec<MetadataKind> {
        match self {
            MetadataSpec::None => vec![],
            MetadataSpec::NamesOnly => vec![MetadataKind::Names],
            MetadataSpec::All => vec![
                MetadataKind::Dialect,
                MetadataKind::Coloring,
                MetadataKind::Types,
                MetadataKind::Formats,
                MetadataKind::Names,
            ],
            MetadataSpec::Kinds(v) => v.clone(),
        }
    }

    fn index_by_default(&self) -> bool {
        !matches!(self, MetadataSpec::None | MetadataSpec::NamesOnly)
    }
}

/// Options for reading delimited text.  Explicitly supplied items always win
/// over values stored in the file, which win over inference.
#[derive(Debug, Clone)]
pub struct TextReadOptions {
    /// Comment prefix marking header lines.
    pub comments: String,
    pub dialect: Option<Dialect>,
    pub delimiter: Option<u8>,
    /// Lines discarded before anything else.
    pub skip_rows: usize,
    pub header_lines: Option<usize>,
    /// Column names are expected in the last header line.
    pub names_in_header: bool,
    pub names: Option<Vec<String>>,
    pub types: Option<Vec<ColumnType>>,
    pub coloring: Option<Coloring>,
    pub meta_index: Option<MetaIndex>,
}

impl Default for TextReadOptions {
    fn default() -> Self {
        TextReadOptions {
            comments: "#".into(),
            dialect: None,
            delimiter: None,
            skip_rows: 0,
            header_lines: None,
            names_in_header: true,
            names: None,
            types: None,
            coloring: None,
            meta_index: None,
        }
    }
}

/// Options for writing delimited text.
#[derive(Debug, Clone)]
pub struct TextWriteOptions {
    pub metadata: MetadataSpec,
    /// Whether to write the `metametadata=` index line; defaults to true for
    /// any spec beyond [`MetadataSpec::NamesOnly`].
    pub print_meta_index: Option<bool>,
    pub comments: String,
    pub dialect: Option<Dialect>,
    pub delimiter: Option<u8>,
}

impl Default for TextWriteOptions {
    fn default() -> Self {
        TextWriteOptions {
            metadata: MetadataSpec::default(),
            print_meta_index: None,
            comments: "#".into(),
            dialect: None,
            delimiter: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Load a table from a delimited text file.
pub fn read_text(path: &Path, opts: &TextReadOptions) -> Result<Table> {
    let content = fs::read_to_string(path)?;
    read_text_str(&content, Some(path), opts)
}

/// Load a table from delimited text already in memory.  `fname` only feeds
/// the extension-based delimiter fallback.
pub fn read_text_str(content: &str, fname: Option<&Path>, opts: &TextReadOptions) -> Result<Table> {
    let all_lines: Vec<&str> = content.lines().collect();
    let lines: Vec<&str> = all_lines
        .into_iter()
        .skip(opts.skip_rows)
        .collect();

    let stored = read_stored_metadata(&lines, &opts.comments, opts.meta_index.as_ref());

    // Header extent.
    let index = stored.as_ref().map(|m| &m.index).or(opts.meta_index.as_ref());
    let mut header_lines = match opts.header_lines {
        Some(h) => h.max(index.map(|ix| ix.lines_claimed()).unwrap_or(0)),
        None => {
            let h = infer_header(&lines, &opts.comments, index);
            debug!("inferred header to span {h} line(s)");
            h
        }
    };
    if opts.names_in_header && header_lines == 0 {
        debug!("forcing one header line since names are expected in the header");
        header_lines = 1;
    }
    let header_lines = header_lines.min(lines.len());
    let data_lines = &lines[header_lines..];

    // Dialect: explicit > stored > inferred.
    let stored_dialect = stored.as_ref().and_then(|m| m.dialect.clone());
    let dialect = opts
        .dialect
        .clone()
        .or_else(|| opts.delimiter.map(Dialect::with_delimiter))
        .or_else(|| {
            if let Some(d) = &stored_dialect {
                debug!("using dialect stored in the file header");
                Some(d.clone())
            } else {
                None
            }
        })
        .unwrap_or_else(|| infer_dialect(fname, data_lines));

    // Names: explicit > stored > last header line > generated.
    let stored_names = stored.as_ref().and_then(|m| m.names.clone());
    if let (Some(given), Some(found)) = (&opts.names, &stored_names) {
        if given != found {
            warn!("names stored in the file differ from the supplied names; using the supplied ones");
        }
    }
    let mut names = opts.names.clone().or(stored_names);
    if names.is_none() && opts.names_in_header && stored.is_none() && header_lines > 0 {
        let raw = lines[header_lines - 1].trim_start_matches(&opts.comments);
        names = Some(split_record(raw, &dialect));
        debug!("taking column names from the last header line");
    }

    // Types: explicit > stored.
    let stored_types = stored.as_ref().and_then(|m| m.types.clone());
    if let (Some(given), Some(found)) = (&opts.types, &stored_types) {
        if given != found {
            warn!("types stored in the file differ from the supplied types; using the supplied ones");
        }
    }
    let types = opts.types.clone().or(stored_types);

    // Data rows, quote-aware.
    let mut records: Vec<Vec<String>> = Vec::new();
    {
        let joined = data_lines
            .iter()
            .filter(|l| !l.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        let mut reader = dialect.reader_builder().from_reader(joined.as_bytes());
        for rec in reader.records() {
            let rec = rec?;
            records.push(rec.iter().map(|f| f.to_string()).collect());
        }
    }
    let n_cols = match (records.first(), &names) {
        (Some(first), _) => first.len(),
        (None, Some(ns)) => ns.len(),
        (None, None) => 0,
    };
    for (i, rec) in records.iter().enumerate() {
        if rec.len() != n_cols {
            return Err(TableError::NonRectangular {
                row: i,
                got: rec.len(),
                expected: n_cols,
            });
        }
    }

    let names = match names {
        Some(ns) => {
            if ns.len() != n_cols {
                return Err(TableError::NonRectangular {
                    row: 0,
                    got: n_cols,
                    expected: ns.len(),
                });
            }
            ns
        }
        None => {
            warn!("no column names found; generating c0..c{}", n_cols.saturating_sub(1));
            (0..n_cols).map(|j| format!("c{j}")).collect()
        }
    };

    let columns = columns_from_records(&records, n_cols, types.as_deref());
    let mut table = Table::new(names.into_iter().zip(columns).collect())?;

    let coloring = opts
        .coloring
        .clone()
        .or_else(|| stored.and_then(|m| m.coloring));
    if let Some(c) = coloring {
        table.set_coloring(c);
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write a table to a delimited text file.
pub fn write_text(table: &Table, path: &Path, opts: &TextWriteOptions) -> Result<()> {
    let rendered = write_text_string(table, Some(path), opts)?;
    fs::write(path, rendered)?;
    Ok(())
}

/// Render a table as delimited text.  `fname` only feeds the
/// extension-based delimiter fallback.
pub fn write_text_string(
    table: &Table,
    fname: Option<&Path>,
    opts: &TextWriteOptions,
) -> Result<String> {
    let dialect = opts
        .dialect
        .clone()
        .or_else(|| opts.delimiter.map(Dialect::with_delimiter))
        .unwrap_or_else(|| Dialect::from_extension(fname));

    let mut kinds = opts.metadata.kinds();
    // An empty coloring is not worth a header line.
    kinds.retain(|k| *k != MetadataKind::Coloring || !table.coloring().is_empty());

    let blocks: Vec<(MetadataKind, String)> = kinds
        .iter()
        .map(|&k| {
            let block = match k {
                MetadataKind::Names => join_record(&table.names(), &dialect),
                MetadataKind::Types => table
                    .columns()
                    .iter()
                    .map(|c| c.column_type().tag().to_string())
                    .collect::<Vec<_>>()
                    .join(&(dialect.delimiter as char).to_string()),
                MetadataKind::Formats => table
                    .columns()
                    .iter()
                    .map(|c| c.column_type().format().to_string())
                    .collect::<Vec<_>>()
                    .join(&(dialect.delimiter as char).to_string()),
                MetadataKind::Coloring => {
                    serde_json::to_string(table.coloring()).expect("coloring serializes")
                }
                MetadataKind::Dialect => dialect.to_json(),
            };
            (k, block)
        })
        .collect();

    let print_index = opts
        .print_meta_index
        .unwrap_or_else(|| opts.metadata.index_by_default() && !blocks.is_empty());

    let mut out = String::new();
    if print_index {
        let mut index = MetaIndex::default();
        let mut v = 1usize;
        for (k, block) in &blocks {
            let n = block.lines().count().max(1);
            let span = if n == 1 {
                LineSpan::Single(v)
            } else {
                LineSpan::Range(v, v + n)
            };
            index.spans.insert(k.key().to_string(), span);
            v += n;
        }
        out.push_str(&opts.comments);
        out.push_str("metametadata=");
        out.push_str(&index.to_json());
        out.push('\n');
    }
    for (_, block) in &blocks {
        for line in block.lines() {
            out.push_str(&opts.comments);
            out.push_str(line);
            out.push('\n');
        }
    }

    // Fast path joins pre-rendered values; any text value containing the
    // delimiter forces the quoting-aware writer for the whole file.
    let needs_quoting = table.columns().iter().find(|c| {
        matches!(&c.data, crate::table::ColumnData::Str(v)
            if v.iter().any(|s| s.as_bytes().contains(&dialect.delimiter)))
    });

    if let Some(col) = needs_quoting {
        warn!(
            "an entry in column '{}' contains the delimiter {:?}; \
             falling back to the quoting writer for this file",
            col.name, dialect.delimiter as char
        );
        let mut writer = dialect.writer_builder().from_writer(Vec::new());
        let rendered: Vec<Vec<String>> =
            table.columns().iter().map(|c| c.data.to_strings()).collect();
        for i in 0..table.len() {
            writer.write_record(rendered.iter().map(|col| col[i].as_str()))?;
        }
        let bytes = writer.into_inner().expect("vec writer cannot fail");
        out.push_str(&String::from_utf8(bytes).expect("rendered rows are utf8"));
    } else {
        let rendered: Vec<Vec<String>> =
            table.columns().iter().map(|c| c.data.to_strings()).collect();
        let sep = (dialect.delimiter as char).to_string();
        for i in 0..table.len() {
            let row: Vec<&str> = rendered.iter().map(|col| col[i].as_str()).collect();
            out.push_str(&row.join(&sep));
            out.push('\n');
        }
    }
    Ok(out)
}

fn split_record(line: &str, dialect: &Dialect) -> Vec<String> {
    let mut reader = dialect.reader_builder().from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(rec)) => rec.iter().map(|f| f.to_string()).collect(),
        _ => line
            .split(dialect.delimiter as char)
            .map(|s| s.to_string())
            .collect(),
    }
}

fn join_record(fields: &[String], dialect: &Dialect) -> String {
    let mut writer = dialect.writer_builder().from_writer(Vec::new());
    writer
        .write_record(fields.iter().map(|f| f.as_str()))
        .expect("vec writer cannot fail");
    let bytes = writer.into_inner().expect("vec writer cannot fail");
    String::from_utf8(bytes)
        .expect("fields are utf8")
        .trim_end_matches('\n')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ColumnData;

    fn sample() -> Table {
        let mut t = Table::new(vec![
            ("a".into(), ColumnData::Int(vec![1, 2, 1])),
            (
                "b".into(),
                ColumnData::Str(vec!["x".into(), "y".into(), "z".into()]),
            ),
            ("c".into(), ColumnData::Float(vec![0.5, 1.5, 2.5])),
        ])
        .unwrap();
        let mut coloring = Coloring::new();
        coloring.insert("nums", vec!["a".into(), "c".into()]);
        t.set_coloring(coloring);
        t
    }

    #[test]
    fn roundtrip_with_full_metadata() {
        let t = sample();
        let opts = TextWriteOptions {
            metadata: MetadataSpec::All,
            ..TextWriteOptions::default()
        };
        let text = write_text_string(&t, None, &opts).unwrap();
        assert!(text.starts_with("#metametadata="));
        let back = read_text_str(&text, None, &TextReadOptions::default()).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn roundtrip_names_only() {
        let t = sample();
        let text = write_text_string(&t, None, &TextWriteOptions::default()).unwrap();
        let back = read_text_str(&text, None, &TextReadOptions::default()).unwrap();
        assert_eq!(back.names(), t.names());
        assert_eq!(back.column("a").unwrap().data, t.column("a").unwrap().data);
        // Names-only headers do not carry the coloring.
        assert!(back.coloring().is_empty());
    }

    #[test]
    fn headerless_data_gets_generated_names() {
        let opts = TextReadOptions {
            names_in_header: false,
            ..TextReadOptions::default()
        };
        let t = read_text_str("1,2\n3,4\n", None, &opts).unwrap();
        assert_eq!(t.names(), vec!["c0", "c1"]);
        assert_eq!(t.column("c0").unwrap().data, ColumnData::Int(vec![1, 3]));
    }

    #[test]
    fn delimiter_in_text_forces_quoting_writer() {
        let t = Table::new(vec![(
            "s".into(),
            ColumnData::Str(vec!["a,b".into(), "c".into()]),
        )])
        .unwrap();
        let opts = TextWriteOptions {
            delimiter: Some(b','),
            ..TextWriteOptions::default()
        };
        let text = write_text_string(&t, None, &opts).unwrap();
        assert!(text.contains("\"a,b\""));
        let back = read_text_str(
            &text,
            None,
            &TextReadOptions {
                delimiter: Some(b','),
                ..TextReadOptions::default()
            },
        )
        .unwrap();
        assert_eq!(back.column("s").unwrap().data, t.column("s").unwrap().data);
    }

    #[test]
    fn explicit_names_override_stored() {
        let t = sample();
        let text = write_text_string(
            &t,
            None,
            &TextWriteOptions {
                metadata: MetadataSpec::All,
                ..TextWriteOptions::default()
            },
        )
        .unwrap();
        let back = read_text_str(
            &text,
            None,
            &TextReadOptions {
                names: Some(vec!["x".into(), "y".into(), "z".into()]),
                ..TextReadOptions::default()
            },
        )
        .unwrap();
        assert_eq!(back.names(), vec!["x", "y", "z"]);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let opts = TextReadOptions {
            delimiter: Some(b','),
            ..TextReadOptions::default()
        };
        let err = read_text_str("a,b\n1,2\n3\n", None, &opts).unwrap_err();
        assert!(matches!(err, TableError::NonRectangular { .. }));
    }

    #[test]
    fn skip_rows_discards_leading_junk() {
        let opts = TextReadOptions {
            skip_rows: 1,
            ..TextReadOptions::default()
        };
        let t = read_text_str("garbage line\na,b\n1,2\n", None, &opts).unwrap();
        assert_eq!(t.names(), vec!["a", "b"]);
    }
}
