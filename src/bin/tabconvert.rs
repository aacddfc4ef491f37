use std::path::Path;
use std::process::exit;

use coltab::{MetadataSpec, Table, TextReadOptions, TextWriteOptions};

/// Convert a table between the three on-disk formats, picking each format
/// from the file extension:
/// * `.csv` / `.tsv` / `.txt` – flat delimited text
/// * `.parquet` / `.pq`       – binary archive
/// * `.hsv`                   – hierarchical directory
fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: tabconvert <input> <output>");
        exit(2);
    }
    let input = Path::new(&args[1]);
    let output = Path::new(&args[2]);

    let table = match extension(input) {
        "parquet" | "pq" => Table::read_binary(input),
        "hsv" => Table::read_hsv(input),
        _ => Table::read_text(input, &TextReadOptions::default()),
    }
    .expect("failed to read input table");

    match extension(output) {
        "parquet" | "pq" => table
            .save_binary(output, true)
            .expect("failed to write parquet archive"),
        "hsv" => table.save_hsv(output).expect("failed to write HSV directory"),
        _ => table
            .save_text(
                output,
                &TextWriteOptions {
                    metadata: MetadataSpec::All,
                    ..TextWriteOptions::default()
                },
            )
            .expect("failed to write delimited text"),
    }

    println!(
        "Wrote {} rows x {} columns ({} coloring groups) to {}",
        table.len(),
        table.n_columns(),
        table.coloring().len(),
        output.display()
    );
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}
