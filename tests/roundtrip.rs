//! On-disk round-trip properties for the three persistence formats.

use std::fs;

use coltab::io::text::{read_text_str, write_text_string};
use coltab::{
    aggregate, AggSpec, ColumnData, ColumnType, Coloring, MetadataSpec, Table, TextReadOptions,
    TextWriteOptions,
};
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sample() -> Table {
    let mut t = Table::new(vec![
        ("a".to_string(), ColumnData::Int(vec![1, 2, 1])),
        (
            "b".to_string(),
            ColumnData::Str(vec!["x".into(), "y".into(), "z".into()]),
        ),
        ("c".to_string(), ColumnData::Float(vec![0.5, 1.5, 2.5])),
    ])
    .unwrap();
    let mut coloring = Coloring::new();
    coloring.insert("nums", vec!["a".to_string(), "c".to_string()]);
    t.set_coloring(coloring);
    t
}

// ---------------------------------------------------------------------------
// Flat text
// ---------------------------------------------------------------------------

#[test]
fn text_file_roundtrip_with_metadata() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.csv");
    let t = sample();
    t.save_text(
        &path,
        &TextWriteOptions {
            metadata: MetadataSpec::All,
            ..TextWriteOptions::default()
        },
    )
    .unwrap();
    let back = Table::read_text(&path, &TextReadOptions::default()).unwrap();
    assert_eq!(t, back);
}

#[test]
fn text_roundtrip_infers_types_without_metadata() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.tsv");
    let t = sample();
    t.save_text(&path, &TextWriteOptions::default()).unwrap();
    let back = Table::read_text(&path, &TextReadOptions::default()).unwrap();
    for col in t.columns() {
        let loaded = back.column(&col.name).unwrap();
        assert_eq!(loaded.column_type(), col.column_type());
        assert!(loaded.data.value_eq(&col.data));
    }
}

#[test]
fn header_in_last_line_aggregation_scenario() {
    init_logging();
    let t = read_text_str("a,b\n1,x\n2,y\n1,z\n", None, &TextReadOptions::default()).unwrap();
    let agg = aggregate(&t, &["a"], &AggSpec::new()).unwrap();
    assert_eq!(agg.len(), 2);
    assert_eq!(agg.column("a").unwrap().data, ColumnData::Int(vec![1, 2]));
    assert_eq!(
        agg.column("b").unwrap().data,
        ColumnData::Str(vec!["xz".into(), "y".into()])
    );
}

#[test]
fn written_text_is_reparsed_by_inference_alone() {
    init_logging();
    // Even with no stored metadata and no extension hint, the delimiter
    // comes back out of the variance heuristic.
    let t = sample();
    let text = write_text_string(
        &t,
        None,
        &TextWriteOptions {
            delimiter: Some(b';'),
            metadata: MetadataSpec::None,
            ..TextWriteOptions::default()
        },
    )
    .unwrap();
    let back = read_text_str(
        &text,
        None,
        &TextReadOptions {
            names_in_header: false,
            ..TextReadOptions::default()
        },
    )
    .unwrap();
    assert_eq!(back.n_columns(), 3);
    assert_eq!(back.len(), 3);
}

// ---------------------------------------------------------------------------
// Binary archive
// ---------------------------------------------------------------------------

#[test]
fn binary_roundtrip_with_coloring() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.parquet");
    let t = sample();
    t.save_binary(&path, true).unwrap();
    let back = Table::read_binary(&path).unwrap();
    assert_eq!(t, back);
}

#[test]
fn binary_without_coloring_drops_it() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.parquet");
    let t = sample();
    t.save_binary(&path, false).unwrap();
    let back = Table::read_binary(&path).unwrap();
    assert!(back.coloring().is_empty());
    assert_eq!(back.names(), t.names());
}

// ---------------------------------------------------------------------------
// HSV directory
// ---------------------------------------------------------------------------

#[test]
fn hsv_roundtrip_rebuilds_coloring_from_directories() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.hsv");
    let t = sample();
    t.save_hsv(&path).unwrap();

    assert!(path.join("nums.hsv").is_dir());
    assert!(path.join("nums.hsv").join("a.int.csv").is_file());
    assert!(path.join("b.str.csv").is_file());
    assert!(path.join("header.txt").is_file());

    let back = Table::read_hsv(&path).unwrap();
    assert_eq!(t, back);
}

#[test]
fn hsv_scenario_from_hand_built_directory() {
    init_logging();
    // g.hsv/ holding c1 and c2, plus a sibling c3, loads with the coloring
    // {"g": ["c1", "c2"]}.
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("x.hsv");
    fs::create_dir_all(root.join("g.hsv")).unwrap();
    fs::write(root.join("g.hsv").join("c1.int.csv"), "1\n2").unwrap();
    fs::write(root.join("g.hsv").join("c2.str.csv"), "u\nv").unwrap();
    fs::write(root.join("c3.float.csv"), "0.5\n1.5").unwrap();

    let t = Table::read_hsv(&root).unwrap();
    let mut names = t.names();
    names.sort();
    assert_eq!(names, vec!["c1", "c2", "c3"]);
    assert_eq!(t.column("c1").unwrap().column_type(), ColumnType::Int);
    assert_eq!(t.column("c3").unwrap().column_type(), ColumnType::Float);
    assert_eq!(
        t.coloring().get("g").unwrap(),
        &["c1".to_string(), "c2".to_string()]
    );
}

#[test]
fn hsv_skips_bad_columns_but_loads_the_rest() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("x.hsv");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("good.int.csv"), "1\n2").unwrap();
    // Wrong row count and a type mismatch: both skipped, not fatal.
    fs::write(root.join("short.int.csv"), "1").unwrap();
    fs::write(root.join("bad.int.csv"), "1\nnot-a-number").unwrap();

    let t = Table::read_hsv(&root).unwrap();
    assert_eq!(t.names(), vec!["good"]);
    assert_eq!(t.len(), 2);
}

#[test]
fn hsv_of_empty_directory_is_an_error() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("x.hsv");
    fs::create_dir_all(&root).unwrap();
    assert!(Table::read_hsv(&root).is_err());
}

#[test]
fn header_file_orders_columns() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("x.hsv");
    fs::create_dir_all(&root).unwrap();
    fs::write(root.join("a.int.csv"), "1").unwrap();
    fs::write(root.join("z.int.csv"), "2").unwrap();
    fs::write(root.join("header.txt"), "z\na").unwrap();

    let t = Table::read_hsv(&root).unwrap();
    assert_eq!(t.names(), vec!["z", "a"]);
}

#[test]
fn append_hsv_initializes_then_extends() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.hsv");
    let t = sample();

    t.append_hsv(&path).unwrap();
    let first = Table::read_hsv(&path).unwrap();
    assert_eq!(first.len(), 3);

    t.append_hsv(&path).unwrap();
    let doubled = Table::read_hsv(&path).unwrap();
    assert_eq!(doubled.len(), 6);
    assert_eq!(
        doubled.column("a").unwrap().data,
        ColumnData::Int(vec![1, 2, 1, 1, 2, 1])
    );
    assert_eq!(doubled.coloring(), first.coloring());
}

#[test]
fn append_with_mismatched_columns_proceeds_best_effort() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.hsv");
    let base = Table::new(vec![
        ("a".to_string(), ColumnData::Int(vec![1])),
        ("b".to_string(), ColumnData::Int(vec![2])),
    ])
    .unwrap();
    base.append_hsv(&path).unwrap();

    // The incoming batch lacks "b": a warning, not a failure; "a" grows.
    let partial = Table::new(vec![("a".to_string(), ColumnData::Int(vec![9]))]).unwrap();
    partial.append_hsv(&path).unwrap();

    let a = fs::read_to_string(path.join("a.int.csv")).unwrap();
    assert_eq!(a, "1\n9");
    let b = fs::read_to_string(path.join("b.int.csv")).unwrap();
    assert_eq!(b, "2");
}

#[test]
fn hsv_list_stacks_disjoint_trees() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let p1 = dir.path().join("one.hsv");
    let p2 = dir.path().join("two.hsv");
    Table::new(vec![("a".to_string(), ColumnData::Int(vec![1, 2]))])
        .unwrap()
        .save_hsv(&p1)
        .unwrap();
    Table::new(vec![("b".to_string(), ColumnData::Int(vec![3, 4]))])
        .unwrap()
        .save_hsv(&p2)
        .unwrap();

    let t = Table::read_hsv_list(&[p1, p2]).unwrap();
    assert_eq!(t.names(), vec!["a", "b"]);
    assert_eq!(t.len(), 2);
}

#[test]
fn nested_coloring_roundtrips() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("t.hsv");
    let mut t = Table::new(vec![
        ("a".to_string(), ColumnData::Int(vec![1])),
        ("b".to_string(), ColumnData::Int(vec![2])),
        ("c".to_string(), ColumnData::Int(vec![3])),
    ])
    .unwrap();
    let mut coloring = Coloring::new();
    coloring.insert("outer", vec!["a".to_string(), "b".to_string(), "c".to_string()]);
    coloring.insert("inner", vec!["a".to_string(), "b".to_string()]);
    t.set_coloring(coloring);

    t.save_hsv(&path).unwrap();
    // Only the maximal group becomes a top-level subdirectory.
    assert!(path.join("outer.hsv").is_dir());
    assert!(path.join("outer.hsv").join("inner.hsv").is_dir());
    assert!(!path.join("inner.hsv").exists());

    let back = Table::read_hsv(&path).unwrap();
    assert_eq!(back.names(), vec!["a", "b", "c"]);
    assert_eq!(back.coloring().get("inner").unwrap().len(), 2);
    assert_eq!(back.coloring().get("outer").unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Cross-format agreement
// ---------------------------------------------------------------------------

#[test]
fn all_three_formats_agree() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let t = sample();

    let text_path = dir.path().join("t.csv");
    t.save_text(
        &text_path,
        &TextWriteOptions {
            metadata: MetadataSpec::All,
            ..TextWriteOptions::default()
        },
    )
    .unwrap();
    let binary_path = dir.path().join("t.parquet");
    t.save_binary(&binary_path, true).unwrap();
    let hsv_path = dir.path().join("t.hsv");
    t.save_hsv(&hsv_path).unwrap();

    let from_text = Table::read_text(&text_path, &TextReadOptions::default()).unwrap();
    let from_binary = Table::read_binary(&binary_path).unwrap();
    let from_hsv = Table::read_hsv(&hsv_path).unwrap();
    assert_eq!(from_text, from_binary);
    assert_eq!(from_binary, from_hsv);
}
