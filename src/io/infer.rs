//! Dialect and schema inference for delimited text without a fixed contract.
//!
//! Inference never fails: every heuristic degrades to a documented default
//! (tab delimiter, no coloring, names from the header or generated) and logs
//! a diagnostic instead of raising.

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, warn};
use serde_json::Value as JsonValue;

use super::Dialect;
use crate::table::{type_infer, ColumnData, ColumnType, Coloring};

/// Candidate delimiter bytes considered by the frequency sniffer.
const CANDIDATES: &[u8] = &[b',', b'\t', b';', b'|', b':', b' '];

/// Window sizes tried at each sampling start.
const TRIES: &[usize] = &[10, 30, 60, 100, 200, 400, 800];

// ---------------------------------------------------------------------------
// Delimiter from file name
// ---------------------------------------------------------------------------

/// `.tsv` → tab, `.csv` → comma, anything else (or no name) → tab.
pub fn infer_delimiter_from_name(path: Option<&Path>) -> u8 {
    match path.and_then(|p| p.extension()).and_then(|e| e.to_str()) {
        Some("csv") => b',',
        Some("tsv") => b'\t',
        _ => b'\t',
    }
}

// ---------------------------------------------------------------------------
// Dialect inference
// ---------------------------------------------------------------------------

/// Infer the dialect of `data_lines` (header excluded).
///
/// Several starting offsets and window sizes are sampled; each window's
/// frequency sniff proposes candidate delimiters, and the candidate whose
/// per-line field counts have minimum variance over the leading sample wins.
/// When no candidate survives, the delimiter falls back to the file-name
/// extension rule.
pub fn infer_dialect(fname: Option<&Path>, data_lines: &[&str]) -> Dialect {
    let starts: Vec<usize> = if data_lines.len() > 100 {
        (0..5).map(|i| data_lines.len() / 5 * i).collect()
    } else {
        vec![0, data_lines.len() / 2]
    };

    let mut candidates: Vec<u8> = Vec::new();
    for &s in &starts {
        for (i, &t) in TRIES.iter().enumerate() {
            if i > 0 && s + TRIES[i - 1] > data_lines.len() {
                break;
            }
            let window = &data_lines[s.min(data_lines.len())
                ..(s + t).min(data_lines.len())];
            if let Some(d) = sniff_window(window) {
                if !candidates.contains(&d) {
                    candidates.push(d);
                }
                break;
            }
        }
    }

    let sample = &data_lines[..data_lines.len().min(1000)];
    let best = candidates
        .into_iter()
        .map(|d| (field_count_variance(sample, d), d))
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, d)| d);

    match best {
        Some(d) => {
            debug!("inferred delimiter {:?}", d as char);
            Dialect::with_delimiter(d)
        }
        None => {
            let d = infer_delimiter_from_name(fname);
            debug!(
                "dialect inference failed, falling back to {:?} from the file name",
                d as char
            );
            Dialect::with_delimiter(d)
        }
    }
}

/// Frequency sniff over one window: the candidate byte that appears a
/// consistent nonzero number of times per line.  Consistency is measured as
/// the share of lines carrying the modal count.
fn sniff_window(window: &[&str]) -> Option<u8> {
    let lines: Vec<&&str> = window.iter().filter(|l| !l.is_empty()).collect();
    if lines.is_empty() {
        return None;
    }
    let mut best: Option<(f64, u8)> = None;
    for &cand in CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|l| l.bytes().filter(|&b| b == cand).count())
            .collect();
        let mut freq: BTreeMap<usize, usize> = BTreeMap::new();
        for &c in &counts {
            *freq.entry(c).or_insert(0) += 1;
        }
        let (&mode, &mode_n) = freq.iter().max_by_key(|(_, &n)| n)?;
        if mode == 0 {
            continue;
        }
        let share = mode_n as f64 / lines.len() as f64;
        if share < 0.9 {
            continue;
        }
        if best.map(|(s, _)| share > s).unwrap_or(true) {
            best = Some((share, cand));
        }
    }
    best.map(|(_, d)| d)
}

/// Variance of per-line field counts under a candidate delimiter.
fn field_count_variance(lines: &[&str], delimiter: u8) -> f64 {
    let counts: Vec<f64> = lines
        .iter()
        .filter(|l| !l.is_empty())
        .map(|l| (l.bytes().filter(|&b| b == delimiter).count() + 1) as f64)
        .collect();
    if counts.is_empty() {
        return f64::INFINITY;
    }
    let mean = counts.iter().sum::<f64>() / counts.len() as f64;
    counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / counts.len() as f64
}

// ---------------------------------------------------------------------------
// Header inference
// ---------------------------------------------------------------------------

/// Number of header lines at the top of `lines`.
///
/// The header extends at least one past the last line claimed by the
/// meta-of-metadata index; comment-prefixed lines extend it further; when
/// both yield zero, a statistical field-type check runs line by line until a
/// line stops looking like a header.
pub fn infer_header(lines: &[&str], comments: &str, index: Option<&MetaIndex>) -> usize {
    let mut n = index.map(|ix| ix.lines_claimed()).unwrap_or(0);

    if !comments.is_empty() {
        while n < lines.len() && lines[n].starts_with(comments) {
            n += 1;
        }
    }
    if n > 0 {
        return n;
    }

    let dialect = infer_dialect(None, &lines[lines.len().min(1)..]);
    let mut j = 0;
    while j < lines.len().saturating_sub(1) && looks_like_header(&lines[j..], dialect.delimiter) {
        j += 1;
    }
    j
}

/// Field-type homogeneity test: the first line looks like a header when, in
/// some column, the body sample infers a numeric type but the first line's
/// field does not conform to it.
fn looks_like_header(lines: &[&str], delimiter: u8) -> bool {
    if lines.len() < 2 {
        return false;
    }
    let split = |l: &str| -> Vec<String> {
        l.split(delimiter as char).map(|s| s.to_string()).collect()
    };
    let head = split(lines[0]);
    let body: Vec<Vec<String>> = lines[1..lines.len().min(34)].iter().map(|l| split(l)).collect();
    let width = head.len();
    if body.iter().any(|r| r.len() != width) {
        return false;
    }

    let mut votes = 0i32;
    for j in 0..width {
        let col: Vec<&String> = body.iter().map(|r| &r[j]).collect();
        let body_ty = type_infer(&col).column_type();
        let head_ty = type_infer(&[&head[j]]).column_type();
        if body_ty != ColumnType::Str {
            if head_ty == body_ty {
                votes -= 1;
            } else {
                votes += 1;
            }
        }
    }
    votes > 0
}

// ---------------------------------------------------------------------------
// Meta-of-metadata: the stored index line
// ---------------------------------------------------------------------------

/// Where one metadata kind lives in the header: a single 0-based line, or a
/// half-open `[start, end)` line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSpan {
    Single(usize),
    Range(usize, usize),
}

impl LineSpan {
    pub fn start(&self) -> usize {
        match self {
            LineSpan::Single(s) => *s,
            LineSpan::Range(s, _) => *s,
        }
    }

    pub fn end(&self) -> usize {
        match self {
            LineSpan::Single(s) => s + 1,
            LineSpan::Range(_, e) => *e,
        }
    }

    fn to_json(self) -> JsonValue {
        match self {
            LineSpan::Single(s) => JsonValue::from(s),
            LineSpan::Range(s, e) => JsonValue::from(vec![s, e]),
        }
    }
}

/// The meta-of-metadata index: metadata kind → header line span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaIndex {
    pub spans: BTreeMap<String, LineSpan>,
}

impl MetaIndex {
    pub fn get(&self, kind: &str) -> Option<LineSpan> {
        self.spans.get(kind).copied()
    }

    /// One past the last header line referenced by any span.
    pub fn lines_claimed(&self) -> usize {
        self.spans.values().map(|s| s.end()).max().unwrap_or(0)
    }

    pub fn to_json(&self) -> String {
        let map: serde_json::Map<String, JsonValue> = self
            .spans
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        JsonValue::Object(map).to_string()
    }

    /// Parse and shape-validate the literal mapping: string keys, values a
    /// non-negative integer or a two-integer `[start, end)` pair.  Anything
    /// else is rejected wholesale (`None`) — this is a literal-mapping
    /// parser, never an expression evaluator.
    pub fn from_json(s: &str) -> Option<MetaIndex> {
        let parsed: JsonValue = serde_json::from_str(s).ok()?;
        let obj = parsed.as_object()?;
        let mut spans = BTreeMap::new();
        for (k, v) in obj {
            let span = match v {
                JsonValue::Number(n) => LineSpan::Single(n.as_u64()? as usize),
                JsonValue::Array(pair) if pair.len() == 2 => {
                    let s = pair[0].as_u64()? as usize;
                    let e = pair[1].as_u64()? as usize;
                    if e < s {
                        return None;
                    }
                    LineSpan::Range(s, e)
                }
                _ => return None,
            };
            spans.insert(k.clone(), span);
        }
        Some(MetaIndex { spans })
    }
}

// ---------------------------------------------------------------------------
// Stored metadata extraction
// ---------------------------------------------------------------------------

/// Metadata recovered from a file's own header.
#[derive(Debug, Default)]
pub struct StoredMetadata {
    pub index: MetaIndex,
    pub names: Option<Vec<String>>,
    pub types: Option<Vec<ColumnType>>,
    pub coloring: Option<Coloring>,
    pub dialect: Option<Dialect>,
}

/// Look for a `metametadata={...}` index line among the leading comment
/// lines (or on line 0 when there are no comments), then pull out every
/// metadata kind it references.  Returns `None` when no valid index is
/// found; individual kinds that fail to parse are skipped with a diagnostic.
pub fn read_stored_metadata(
    lines: &[&str],
    comments: &str,
    explicit_index: Option<&MetaIndex>,
) -> Option<StoredMetadata> {
    let index = match explicit_index {
        Some(ix) => ix.clone(),
        None => find_meta_index(lines, comments)?,
    };

    if index.lines_claimed() > lines.len() {
        warn!(
            "meta-of-metadata references line {} but the file has only {} lines; ignoring it",
            index.lines_claimed(),
            lines.len()
        );
        return None;
    }

    let mut meta = StoredMetadata {
        index: index.clone(),
        ..StoredMetadata::default()
    };

    let grab = |span: LineSpan| -> String {
        lines[span.start()..span.end()]
            .iter()
            .map(|l| l.trim_start_matches(comments))
            .collect::<Vec<_>>()
            .join("\n")
    };

    // Dialect first: names/types/formats split on its delimiter.
    if let Some(span) = index.get("dialect") {
        match Dialect::from_json(grab(span).trim()) {
            Some(d) => meta.dialect = Some(d),
            None => warn!("stored dialect failed to parse; ignoring it"),
        }
    }
    let delimiter = meta
        .dialect
        .as_ref()
        .map(|d| d.delimiter)
        .unwrap_or_else(|| infer_dialect(None, lines).delimiter);

    if let Some(span) = index.get("names") {
        meta.names = Some(split_metadata_line(&grab(span), delimiter));
    }
    for kind in ["types", "formats"] {
        if meta.types.is_none() {
            if let Some(span) = index.get(kind) {
                let raw = split_metadata_line(&grab(span), delimiter);
                let parsed: Option<Vec<ColumnType>> =
                    raw.iter().map(|t| ColumnType::parse(t)).collect();
                match parsed {
                    Some(ts) => meta.types = Some(ts),
                    None => warn!("stored {kind} line failed to parse; ignoring it"),
                }
            }
        }
    }
    if let Some(span) = index.get("coloring") {
        match serde_json::from_str::<Coloring>(grab(span).trim()) {
            Ok(c) => meta.coloring = Some(c),
            Err(_) => warn!("stored coloring failed to parse; ignoring it"),
        }
    }

    Some(meta)
}

/// Scan for the index line.  Only the leading comment block is searched
/// (line 0 when the file has no comment lines at all).
fn find_meta_index(lines: &[&str], comments: &str) -> Option<MetaIndex> {
    let mut search_end = 0;
    if !comments.is_empty() {
        while search_end < lines.len() && lines[search_end].starts_with(comments) {
            search_end += 1;
        }
    }
    if search_end == 0 {
        search_end = 1;
        debug!("no comment lines present, looking for meta-of-metadata on line 0");
    }

    for line in lines.iter().take(search_end.min(lines.len())) {
        let body = if comments.is_empty() {
            line.trim_start()
        } else {
            line.trim_start_matches(comments).trim_start()
        };
        if let Some(rest) = body.strip_prefix("metametadata") {
            let rest = rest.trim_start();
            if let Some(mapping) = rest.strip_prefix('=') {
                if let Some(ix) = MetaIndex::from_json(mapping.trim()) {
                    debug!("found meta-of-metadata index: {:?}", ix.spans);
                    return Some(ix);
                }
                warn!("malformed meta-of-metadata line ignored");
            }
        }
    }
    None
}

/// Split a stored names/types line on the delimiter, quote-aware.
fn split_metadata_line(line: &str, delimiter: u8) -> Vec<String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(Ok(rec)) => rec.iter().map(|f| f.to_string()).collect(),
        _ => line
            .split(delimiter as char)
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Columns produced from raw records: declared types when known, otherwise
/// the inference funnel.
pub fn columns_from_records(
    records: &[Vec<String>],
    n_cols: usize,
    types: Option<&[ColumnType]>,
) -> Vec<ColumnData> {
    (0..n_cols)
        .map(|j| {
            let raw: Vec<&String> = records.iter().map(|r| &r[j]).collect();
            match types.and_then(|ts| ts.get(j)) {
                Some(&ty) => crate::table::parse_as(&raw, ty).unwrap_or_else(|| {
                    warn!(
                        "column {j} does not conform to its declared type '{ty}'; \
                         falling back to inference"
                    );
                    type_infer(&raw)
                }),
                None => type_infer(&raw),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comma_beats_noise() {
        let lines: Vec<&str> = vec!["1,2,3", "4,5,6", "7,8,9", "10,11,12"];
        assert_eq!(infer_dialect(None, &lines).delimiter, b',');
    }

    #[test]
    fn tab_wins_on_mixed_content() {
        let lines: Vec<&str> = vec!["a,b\t1\t2", "c\t3\t4", "d,e,f\t5\t6"];
        assert_eq!(infer_dialect(None, &lines).delimiter, b'\t');
    }

    #[test]
    fn extension_fallback_on_unsniffable() {
        let lines: Vec<&str> = vec!["abc", "def"];
        assert_eq!(
            infer_dialect(Some(Path::new("f.csv")), &lines).delimiter,
            b','
        );
    }

    #[test]
    fn comment_lines_extend_header() {
        let lines = vec!["# one", "# two", "a,b", "1,2"];
        assert_eq!(infer_header(&lines, "#", None), 2);
    }

    #[test]
    fn statistical_header_detection() {
        let lines = vec!["a,b", "1,2", "3,4", "5,6"];
        assert_eq!(infer_header(&lines, "#", None), 1);
        let headerless = vec!["1,2", "3,4", "5,6"];
        assert_eq!(infer_header(&headerless, "#", None), 0);
    }

    #[test]
    fn meta_index_shapes() {
        let ix = MetaIndex::from_json("{\"names\": 2, \"coloring\": [1, 2]}").unwrap();
        assert_eq!(ix.get("names"), Some(LineSpan::Single(2)));
        assert_eq!(ix.get("coloring"), Some(LineSpan::Range(1, 2)));
        assert_eq!(ix.lines_claimed(), 3);

        assert!(MetaIndex::from_json("{\"names\": \"x\"}").is_none());
        assert!(MetaIndex::from_json("{\"names\": [1, 2, 3]}").is_none());
        assert!(MetaIndex::from_json("[1, 2]").is_none());
    }

    #[test]
    fn stored_metadata_roundtrip_shape() {
        let lines = vec![
            "#metametadata={\"names\": 1, \"types\": 2}",
            "#a,b",
            "#int,str",
            "1,x",
        ];
        let meta = read_stored_metadata(&lines, "#", None).unwrap();
        assert_eq!(meta.names.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert_eq!(
            meta.types.as_deref(),
            Some(&[ColumnType::Int, ColumnType::Str][..])
        );
    }

    #[test]
    fn out_of_range_index_rejected() {
        let lines = vec!["#metametadata={\"names\": 9}", "1,2"];
        assert!(read_stored_metadata(&lines, "#", None).is_none());
    }
}
