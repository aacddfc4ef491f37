//! Hierarchical separated-value persistence: one file per column, with the
//! coloring mirrored by nested `<group>.hsv/` directories.
//!
//! Layout written by [`write_hsv`]:
//! ```text
//! out.hsv/
//!   header.txt          declared column order for this level
//!   c3.float.csv        one value per line
//!   g.hsv/              one directory per maximal coloring group
//!     header.txt
//!     c1.int.csv
//!     c2.str.csv
//! ```
//! Reading reconstructs the coloring purely from the directory structure
//! when no other metadata exists.  [`append_hsv`] supports out-of-core
//! writing: it reads only `header.txt`, never existing column contents.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;

use crate::error::{Result, TableError};
use crate::ops::{col_stack, ColStackMode};
use crate::table::{parse_as, ColumnData, ColumnType, Coloring, Table};

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Save the table as an HSV directory, replacing any existing target.
pub fn write_hsv(table: &Table, path: &Path) -> Result<()> {
    if path.exists() {
        if path.is_dir() {
            fs::remove_dir_all(path)?;
        } else {
            fs::remove_file(path)?;
        }
    }
    write_hsv_level(table, path)
}

fn write_hsv_level(table: &Table, path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;

    let mut remaining = table.names();
    for key in maximal_groups(table.coloring()) {
        let sub = table.group(&key)?;
        write_hsv_level(&sub, &path.join(format!("{key}.hsv")))?;
        remaining.retain(|n| !sub.has_column(n));
    }

    let flat = table.select(&remaining)?;
    write_column_files(&flat, path)?;

    fs::write(path.join("header.txt"), table.names().join("\n"))?;
    Ok(())
}

/// Save only the column files into `path` (creating it if needed).  The
/// coloring is lost; no header is written.
pub fn write_columns(table: &Table, path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    write_column_files(table, path)
}

fn write_column_files(table: &Table, path: &Path) -> Result<()> {
    for col in table.columns() {
        let fname = format!("{}.{}.csv", col.name, col.column_type().tag());
        fs::write(path.join(fname), col.data.to_strings().join("\n"))?;
    }
    Ok(())
}

/// Groups not strictly contained in any other group.  Only these become
/// subdirectories; dominated groups materialize inside their dominator's
/// recursion instead, which avoids duplicate nesting.
fn maximal_groups(coloring: &Coloring) -> Vec<String> {
    let keys: Vec<&String> = coloring.group_names().collect();
    keys.iter()
        .filter(|&&k2| {
            let m2 = coloring.get(k2).unwrap();
            !keys.iter().any(|&k1| {
                let m1 = coloring.get(k1).unwrap();
                k1 != k2
                    && m2.iter().all(|m| m1.contains(m))
                    && m1.iter().any(|m| !m2.contains(m))
            })
        })
        .map(|k| k.to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Load a table from an HSV directory (or from a single column file inside
/// one).  Unreadable columns are skipped with a diagnostic; only a source
/// yielding no columns at all is an error.
pub fn read_hsv(path: &Path) -> Result<Table> {
    let mut cols: Vec<(String, ColumnData)> = Vec::new();
    let mut n_recs: Option<usize> = None;

    if path.is_dir() {
        let root_header = read_root_header(path);
        load_dir(path, &root_header, &mut cols, &mut n_recs)?;
    } else {
        load_column_file(path, &[], &mut cols, &mut n_recs);
    }

    if cols.is_empty() {
        return Err(TableError::NothingLoaded(path.display().to_string()));
    }

    let names: Vec<String> = cols.iter().map(|(n, _)| n.clone()).collect();
    let mut coloring = if path.is_dir() {
        infer_coloring(path)
    } else {
        Coloring::new()
    };
    // Columns that failed to load must not linger in the coloring.
    coloring.restrict(&names);

    let table = Table::new(cols)?;
    Ok(table.with_coloring(coloring))
}

/// Load several HSV trees with equal row counts and disjoint columns,
/// stacking them side by side.
pub fn read_hsv_list(paths: &[PathBuf]) -> Result<Table> {
    let tables = paths
        .iter()
        .map(|p| read_hsv(p))
        .collect::<Result<Vec<_>>>()?;
    col_stack(&tables, ColStackMode::Abort)
}

fn read_root_header(path: &Path) -> Vec<String> {
    let mut candidates: Vec<PathBuf> = match fs::read_dir(path) {
        Ok(entries) => entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.ends_with("header.txt"))
                    .unwrap_or(false)
            })
            .collect(),
        Err(_) => return Vec::new(),
    };
    candidates.sort();
    // Prefer the plain header.txt over any prefixed variant.
    let exact = path.join("header.txt");
    let chosen = if candidates.contains(&exact) {
        Some(exact)
    } else {
        candidates.into_iter().next()
    };
    chosen
        .and_then(|p| fs::read_to_string(p).ok())
        .map(|s| {
            s.trim_end_matches('\n')
                .split('\n')
                .map(|l| l.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn load_dir(
    path: &Path,
    root_header: &[String],
    cols: &mut Vec<(String, ColumnData)>,
    n_recs: &mut Option<usize>,
) -> Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(path)?
        .flatten()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for entry in entries {
        let fname = match entry.file_name().and_then(|n| n.to_str()) {
            Some(f) => f.to_string(),
            None => continue,
        };
        if fname.ends_with(".csv") && entry.is_file() {
            load_column_file(&entry, root_header, cols, n_recs);
        } else if fname.ends_with(".hsv") && entry.is_dir() {
            load_dir(&entry, root_header, cols, n_recs)?;
        }
    }
    Ok(())
}

/// Parse `<name>.<type>.csv`.  Returns `None` for file names that do not
/// follow the pattern.
fn parse_column_filename(fname: &str) -> Option<(String, ColumnType)> {
    let parts: Vec<&str> = fname.split('.').collect();
    if parts.len() < 3 || *parts.last()? != "csv" {
        return None;
    }
    let ty = ColumnType::parse(parts[parts.len() - 2])?;
    Some((parts[..parts.len() - 2].join("."), ty))
}

fn load_column_file(
    path: &Path,
    root_header: &[String],
    cols: &mut Vec<(String, ColumnData)>,
    n_recs: &mut Option<usize>,
) {
    let fname = match path.file_name().and_then(|n| n.to_str()) {
        Some(f) => f,
        None => return,
    };
    let (name, ty) = match parse_column_filename(fname) {
        Some(parsed) => parsed,
        None => {
            warn!("skipping '{fname}': not a <name>.<type>.csv column file");
            return;
        }
    };
    if cols.iter().any(|(n, _)| *n == name) {
        return;
    }

    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("skipping column file '{}': {e}", path.display());
            return;
        }
    };
    let values: Vec<&str> = if content.is_empty() {
        Vec::new()
    } else {
        content.trim_end_matches('\n').split('\n').collect()
    };

    if let Some(expected) = *n_recs {
        if values.len() != expected {
            warn!(
                "column '{}' has {} records but the first column loaded has {}; skipping it",
                name,
                values.len(),
                expected
            );
            return;
        }
    }
    let data = match parse_as(&values, ty) {
        Some(d) => d,
        None => {
            warn!(
                "the data in '{}' does not match its declared type '{}'; skipping it",
                path.display(),
                ty
            );
            return;
        }
    };

    if n_recs.is_none() {
        *n_recs = Some(data.len());
    }

    // header.txt, when present, dictates insertion order.
    if root_header.contains(&name) {
        let rank = |n: &str| root_header.iter().position(|h| h == n);
        let my_rank = rank(&name);
        let insert_at = cols
            .iter()
            .enumerate()
            .filter(|(_, (n, _))| rank(n).is_some() && rank(n) < my_rank)
            .map(|(i, _)| i + 1)
            .max()
            .unwrap_or(0);
        cols.insert(insert_at, (name, data));
    } else {
        cols.push((name, data));
    }
}

/// Rebuild the coloring from the directory structure alone: every column
/// file contributes its name to each `.hsv` directory on its chain from the
/// root.
fn infer_coloring(root: &Path) -> Coloring {
    let mut coloring = Coloring::new();
    infer_coloring_walk(root, &mut Vec::new(), &mut coloring);
    coloring
}

fn infer_coloring_walk(dir: &Path, chain: &mut Vec<String>, coloring: &mut Coloring) {
    let mut entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(es) => es.flatten().map(|e| e.path()).collect(),
        Err(_) => return,
    };
    entries.sort();

    if !chain.is_empty() {
        let names: Vec<String> = entries
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
            .filter_map(|f| parse_column_filename(f).map(|(n, _)| n))
            .collect();
        for key in chain.iter() {
            let mut members = coloring.get(key).map(|m| m.to_vec()).unwrap_or_default();
            members.extend(names.iter().cloned());
            coloring.insert(key.clone(), members);
        }
    }

    for entry in entries {
        if entry.is_dir() {
            if let Some(fname) = entry.file_name().and_then(|n| n.to_str()) {
                if let Some(key) = fname.strip_suffix(".hsv") {
                    chain.push(key.to_string());
                    infer_coloring_walk(&entry, chain, coloring);
                    chain.pop();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Appending (out-of-core)
// ---------------------------------------------------------------------------

/// Append the table's rows to an on-disk HSV tree, initialising the tree
/// with [`write_hsv`] when it does not exist yet.  Only `header.txt` is read
/// from the existing tree, bounding memory use to the incoming batch.
pub fn append_hsv(table: &Table, path: &Path) -> Result<()> {
    if !path.exists() {
        return write_hsv(table, path);
    }

    let mut remaining = table.names();
    for key in maximal_groups(table.coloring()) {
        let sub = table.group(&key)?;
        append_hsv(&sub, &path.join(format!("{key}.hsv")))?;
        remaining.retain(|n| !sub.has_column(n));
    }
    append_columns(&table.select(&remaining)?, path, None)
}

/// Append to a flat (single-level) on-disk column set.  The existing header
/// and the incoming column set are compared; a mismatch is a warning, not a
/// failure, and appending proceeds best-effort over the intersection.
pub fn append_columns(table: &Table, path: &Path, order: Option<&[String]>) -> Result<()> {
    let names = table.names();
    let order: Vec<String> = order.map(|o| o.to_vec()).unwrap_or_else(|| names.clone());

    if !path.exists() {
        if order.len() != names.len() || order.iter().any(|o| !names.contains(o)) {
            return Err(TableError::ColumnSetMismatch);
        }
        return write_hsv(&table.select(&order)?, path);
    }
    if table.is_empty() {
        return Ok(());
    }

    let header = read_root_header(path);
    if header.is_empty() {
        warn!(
            "no header.txt in '{}'; appending in the incoming column order",
            path.display()
        );
    } else {
        let matches = header.len() == names.len() && names.iter().all(|n| header.contains(n));
        if !matches {
            warn!(
                "the header file and the incoming columns conflict \
                 (header: {header:?}, incoming: {names:?}); proceeding anyway"
            );
        }
    }
    let order: Vec<String> = if header.is_empty() { order } else { header };

    for h in &order {
        let col = match table.columns().iter().find(|c| c.name == *h) {
            Some(c) => c,
            None => continue,
        };
        let target = find_column_file(path, h);
        match target {
            Some(file) => {
                let mut payload = String::from("\n");
                payload.push_str(&col.data.to_strings().join("\n"));
                use std::io::Write;
                let mut f = fs::OpenOptions::new().append(true).open(&file)?;
                f.write_all(payload.as_bytes())?;
            }
            None => {
                warn!("no existing column file for '{h}' in '{}'", path.display());
            }
        }
    }
    Ok(())
}

fn find_column_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_column_filename)
                .map(|(n, _)| n == name)
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    matches.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_parsing() {
        assert_eq!(
            parse_column_filename("c1.int.csv"),
            Some(("c1".to_string(), ColumnType::Int))
        );
        assert_eq!(
            parse_column_filename("a.b.float.csv"),
            Some(("a.b".to_string(), ColumnType::Float))
        );
        assert_eq!(parse_column_filename("header.txt"), None);
        assert_eq!(parse_column_filename("x.csv"), None);
        assert_eq!(parse_column_filename("x.bogus.csv"), None);
    }

    #[test]
    fn maximal_groups_skip_dominated() {
        let mut c = Coloring::new();
        c.insert("outer", vec!["a".into(), "b".into(), "c".into()]);
        c.insert("inner", vec!["a".into(), "b".into()]);
        assert_eq!(maximal_groups(&c), vec!["outer".to_string()]);
    }

    #[test]
    fn equal_groups_are_both_maximal() {
        let mut c = Coloring::new();
        c.insert("g", vec!["a".into()]);
        c.insert("h", vec!["a".into()]);
        let mut m = maximal_groups(&c);
        m.sort();
        assert_eq!(m, vec!["g".to_string(), "h".to_string()]);
    }
}
