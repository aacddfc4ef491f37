//! Persistence adapters and the inference machinery they share.
//!
//! Three interoperable formats:
//! ```text
//!  raw delimited text ──► infer ──► Table ──► text | binary | hsv
//!        (dialect, header,             │
//!         stored metadata)             ▼
//!                              directory tree / parquet / flat file
//! ```
//! Configuration is passed explicitly into every adapter as an options
//! struct; there is no ambient global state.

pub mod binary;
pub mod hsv;
pub mod infer;
pub mod text;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dialect – how a delimited text source is put together
// ---------------------------------------------------------------------------

/// Quoting policy, mirroring the conventions of the `csv` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quoting {
    /// Quote only fields that require it.
    #[default]
    Minimal,
    All,
    NonNumeric,
    Never,
}

impl Quoting {
    pub fn to_style(self) -> csv::QuoteStyle {
        match self {
            Quoting::Minimal => csv::QuoteStyle::Necessary,
            Quoting::All => csv::QuoteStyle::Always,
            Quoting::NonNumeric => csv::QuoteStyle::NonNumeric,
            Quoting::Never => csv::QuoteStyle::Never,
        }
    }
}

/// Description of a delimited text source: delimiter, quoting, line
/// terminator.  Recovered from an explicit hint, from a stored JSON
/// representation in a file header, or by statistical inference
/// ([`infer::infer_dialect`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub quoting: Quoting,
    pub escape: Option<u8>,
    pub line_terminator: String,
    pub double_quote: bool,
    pub skip_initial_space: bool,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect {
            delimiter: b'\t',
            quote: b'"',
            quoting: Quoting::Minimal,
            escape: None,
            line_terminator: "\n".into(),
            double_quote: true,
            skip_initial_space: false,
        }
    }
}

impl Dialect {
    pub fn with_delimiter(delimiter: u8) -> Dialect {
        Dialect {
            delimiter,
            ..Dialect::default()
        }
    }

    /// Delimiter by file extension: `.tsv` → tab, `.csv` → comma, else tab.
    pub fn from_extension(path: Option<&std::path::Path>) -> Dialect {
        Dialect::with_delimiter(infer::infer_delimiter_from_name(path))
    }

    /// Reader configured for this dialect.  Header handling is left to the
    /// caller; the reader never interprets a header row itself.
    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut b = csv::ReaderBuilder::new();
        b.delimiter(self.delimiter)
            .quote(self.quote)
            .escape(self.escape)
            .double_quote(self.double_quote)
            .trim(if self.skip_initial_space {
                csv::Trim::Fields
            } else {
                csv::Trim::None
            })
            .has_headers(false)
            .flexible(true);
        b
    }

    pub fn writer_builder(&self) -> csv::WriterBuilder {
        let mut b = csv::WriterBuilder::new();
        b.delimiter(self.delimiter)
            .quote(self.quote)
            .double_quote(self.double_quote)
            .quote_style(self.quoting.to_style())
            .terminator(csv::Terminator::Any(b'\n'));
        if let Some(e) = self.escape {
            b.escape(e);
        }
        b
    }
}

// -- Stored JSON form -------------------------------------------------------

/// Serializable mirror of [`Dialect`] with single-character strings, the
/// form written into text headers.
#[derive(Debug, Serialize, Deserialize)]
struct DialectRepr {
    #[serde(default = "default_tab")]
    delimiter: String,
    #[serde(default = "default_quote")]
    quotechar: String,
    #[serde(default)]
    quoting: Quoting,
    #[serde(default)]
    escapechar: Option<String>,
    #[serde(default = "default_newline")]
    lineterminator: String,
    #[serde(default = "default_true")]
    doublequote: bool,
    #[serde(default)]
    skipinitialspace: bool,
}

fn default_tab() -> String {
    "\t".into()
}
fn default_quote() -> String {
    "\"".into()
}
fn default_newline() -> String {
    "\n".into()
}
fn default_true() -> bool {
    true
}

impl Dialect {
    pub fn to_json(&self) -> String {
        serde_json::to_string(&DialectRepr {
            delimiter: (self.delimiter as char).to_string(),
            quotechar: (self.quote as char).to_string(),
            quoting: self.quoting,
            escapechar: self.escape.map(|e| (e as char).to_string()),
            lineterminator: self.line_terminator.clone(),
            doublequote: self.double_quote,
            skipinitialspace: self.skip_initial_space,
        })
        .expect("dialect serialization cannot fail")
    }

    /// Parse the stored JSON form.  Returns `None` on any malformed input;
    /// stored metadata is never allowed to fail a load.
    pub fn from_json(s: &str) -> Option<Dialect> {
        let repr: DialectRepr = serde_json::from_str(s).ok()?;
        Some(Dialect {
            delimiter: single_byte(&repr.delimiter)?,
            quote: single_byte(&repr.quotechar)?,
            quoting: repr.quoting,
            escape: match repr.escapechar {
                Some(e) => Some(single_byte(&e)?),
                None => None,
            },
            line_terminator: repr.lineterminator,
            double_quote: repr.doublequote,
            skip_initial_space: repr.skipinitialspace,
        })
    }
}

fn single_byte(s: &str) -> Option<u8> {
    (s.len() == 1 && s.is_ascii()).then(|| s.as_bytes()[0])
}
