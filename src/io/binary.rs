//! Binary archive persistence: the table as a single parquet file, with the
//! coloring riding in the footer's key-value metadata.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::warn;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::error::{Result, TableError};
use crate::table::{ColumnData, Coloring, Table};

/// Footer metadata key carrying the JSON-encoded coloring.
const COLORING_KEY: &str = "coltab.coloring";

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Save the table as a parquet archive.  With `with_coloring`, the coloring
/// is stored as a named footer entry; without, only the column data is
/// written (the single-column-family variant).
pub fn write_binary(table: &Table, path: &Path, with_coloring: bool) -> Result<()> {
    let fields: Vec<Field> = table
        .columns()
        .iter()
        .map(|c| {
            let dt = match c.data {
                ColumnData::Int(_) => DataType::Int64,
                ColumnData::Float(_) => DataType::Float64,
                ColumnData::Str(_) => DataType::Utf8,
            };
            Field::new(c.name.clone(), dt, false)
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .map(|c| -> ArrayRef {
            match &c.data {
                ColumnData::Int(v) => Arc::new(Int64Array::from(v.clone())),
                ColumnData::Float(v) => Arc::new(Float64Array::from(v.clone())),
                ColumnData::Str(v) => Arc::new(StringArray::from(v.clone())),
            }
        })
        .collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let mut props = WriterProperties::builder();
    if with_coloring && !table.coloring().is_empty() {
        let encoded = serde_json::to_string(table.coloring()).expect("coloring serializes");
        props = props.set_key_value_metadata(Some(vec![KeyValue::new(
            COLORING_KEY.to_string(),
            encoded,
        )]));
    }

    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(props.build()))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Load a table from a parquet archive written by [`write_binary`] (foreign
/// parquet files with int32/float32/large-utf8 columns are widened).
pub fn read_binary(path: &Path) -> Result<Table> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;

    let coloring: Option<Coloring> = builder
        .metadata()
        .file_metadata()
        .key_value_metadata()
        .and_then(|kvs| kvs.iter().find(|kv| kv.key == COLORING_KEY))
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| match serde_json::from_str(v) {
            Ok(c) => Some(c),
            Err(_) => {
                warn!("stored coloring entry failed to parse; ignoring it");
                None
            }
        });

    let schema = builder.schema().clone();
    let names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let mut columns: Vec<ColumnData> = schema
        .fields()
        .iter()
        .map(|f| match f.data_type() {
            DataType::Int64 | DataType::Int32 => ColumnData::Int(Vec::new()),
            DataType::Float64 | DataType::Float32 => ColumnData::Float(Vec::new()),
            _ => ColumnData::Str(Vec::new()),
        })
        .collect();
    if names.is_empty() {
        return Err(TableError::NothingLoaded(path.display().to_string()));
    }

    let reader = builder.build()?;
    for batch in reader {
        let batch = batch?;
        for (j, col) in batch.columns().iter().enumerate() {
            append_array(&mut columns[j], col, &names[j])?;
        }
    }

    let mut table = Table::new(names.into_iter().zip(columns).collect())?;
    if let Some(c) = coloring {
        table.set_coloring(c);
    }
    Ok(table)
}

/// Append one arrow array's values onto a column buffer, widening the
/// narrower arrow types the teacher formats use.
fn append_array(into: &mut ColumnData, array: &ArrayRef, name: &str) -> Result<()> {
    match into {
        ColumnData::Int(v) => {
            if let Some(a) = array.as_any().downcast_ref::<Int64Array>() {
                v.extend((0..a.len()).map(|i| a.value(i)));
            } else if let Some(a) = array.as_any().downcast_ref::<Int32Array>() {
                v.extend((0..a.len()).map(|i| a.value(i) as i64));
            } else {
                return Err(TableError::NotNumeric(name.to_string()));
            }
        }
        ColumnData::Float(v) => {
            if let Some(a) = array.as_any().downcast_ref::<Float64Array>() {
                v.extend((0..a.len()).map(|i| if a.is_null(i) { f64::NAN } else { a.value(i) }));
            } else if let Some(a) = array.as_any().downcast_ref::<Float32Array>() {
                v.extend(
                    (0..a.len()).map(|i| if a.is_null(i) { f64::NAN } else { a.value(i) as f64 }),
                );
            } else {
                return Err(TableError::NotNumeric(name.to_string()));
            }
        }
        ColumnData::Str(v) => {
            if let Some(a) = array.as_any().downcast_ref::<StringArray>() {
                v.extend((0..a.len()).map(|i| a.value(i).to_string()));
            } else {
                let a = arrow::compute::cast(array, &DataType::Utf8)?;
                let a = a
                    .as_any()
                    .downcast_ref::<StringArray>()
                    .expect("cast to utf8 yields StringArray");
                v.extend((0..a.len()).map(|i| a.value(i).to_string()));
            }
        }
    }
    Ok(())
}
