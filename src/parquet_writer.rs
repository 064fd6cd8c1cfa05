//! Parquet output of recorded book histories
//!
//! One file per snapshot session with four columns, each row holding the
//! top ten levels as a fixed-size list of `Float32`:
//! `bids10`, `asks10`, `bids10_size`, `asks10_size`.

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, FixedSizeListArray, FixedSizeListBuilder, Float32Builder, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::book_export::{BookHistory, TOP_LEVELS};

pub const COLUMNS: [&str; 4] = ["bids10", "asks10", "bids10_size", "asks10_size"];

fn levels_type() -> DataType {
    DataType::FixedSizeList(
        Arc::new(Field::new("item", DataType::Float32, true)),
        TOP_LEVELS as i32,
    )
}

pub fn book_schema() -> Arc<Schema> {
    Arc::new(Schema::new(
        COLUMNS
            .iter()
            .map(|name| Field::new(*name, levels_type(), false))
            .collect::<Vec<_>>(),
    ))
}

fn levels_array(rows: &[[f32; TOP_LEVELS]]) -> FixedSizeListArray {
    let values = Float32Builder::with_capacity(rows.len() * TOP_LEVELS);
    let mut builder = FixedSizeListBuilder::with_capacity(values, TOP_LEVELS as i32, rows.len());
    for row in rows {
        builder.values().append_slice(row);
        builder.append(true);
    }
    builder.finish()
}

/// Convert a history into a single record batch
pub fn to_record_batch(history: &BookHistory) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(levels_array(&history.bids10)),
        Arc::new(levels_array(&history.asks10)),
        Arc::new(levels_array(&history.bids10_size)),
        Arc::new(levels_array(&history.asks10_size)),
    ];

    RecordBatch::try_new(book_schema(), columns).context("Failed to build record batch")
}

/// Write `history` to `path`, creating parent directories as needed
pub fn write_book_history(path: &Path, history: &BookHistory) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create directory: {:?}", parent))?;
    }

    let batch = to_record_batch(history)?;
    let file = File::create(path)
        .context(format!("Failed to open parquet file: {:?}", path))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("Failed to create ArrowWriter")?;

    writer.write(&batch).context("Failed to write batch to parquet")?;
    writer.close().context("Failed to close writer")?;

    info!("Wrote {} records to {:?}", batch.num_rows(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, Float32Array};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use tempfile::tempdir;

    fn history(rows: usize) -> BookHistory {
        let mut history = BookHistory::default();
        for i in 0..rows {
            let base = i as f32;
            history.bids10.push([base; TOP_LEVELS]);
            history.asks10.push([base + 0.5; TOP_LEVELS]);
            history.bids10_size.push([1.0; TOP_LEVELS]);
            history.asks10_size.push([f32::NAN; TOP_LEVELS]);
        }
        history
    }

    #[test]
    fn test_record_batch_shape() {
        let batch = to_record_batch(&history(3)).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 4);
        assert_eq!(batch.schema().field(0).name(), "bids10");
        assert_eq!(batch.schema().field(0).data_type(), &levels_type());
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("20250921_000000.parquet");
        write_book_history(&path, &history(5)).unwrap();

        let file = File::open(&path).unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let total: usize = batches.iter().map(|b| b.num_rows()).sum();
        assert_eq!(total, 5);

        let asks = batches[0]
            .column(1)
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .unwrap();
        let row = asks.value(4);
        let row = row.as_any().downcast_ref::<Float32Array>().unwrap();
        assert_eq!(row.len(), TOP_LEVELS);
        assert_eq!(row.value(0), 4.5);

        let sizes = batches[0]
            .column(3)
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .unwrap();
        let row = sizes.value(0);
        let row = row.as_any().downcast_ref::<Float32Array>().unwrap();
        assert!(row.value(0).is_nan());
    }
}
