use anyhow::Result;
use arrow::{
    array::{ArrayRef, Float64Array, RecordBatch, StringArray, UInt8Array},
    datatypes::{DataType, Field, Schema},
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};
use std::{fs::File, path::Path, sync::Arc};

use crate::cli::create_progress_bar;

use super::ZonalStatRow;

/// Writes the statistics table in chunks, without extra attributes.
pub fn save_stats(rows: &[ZonalStatRow], file_path: &Path) -> Result<()> {
    let chunk_size = 100000;

    let file = File::create(file_path)?;

    let schema = Arc::new(Schema::new(vec![
        Field::new("alpha_3", DataType::Utf8, false),
        Field::new("ADM_LEVEL", DataType::UInt8, false),
        Field::new("ADM_PCODE", DataType::Utf8, false),
        Field::new("ADM_REF", DataType::Utf8, false),
        Field::new("season", DataType::Utf8, false),
        Field::new("CHIRPS_mean", DataType::Float64, true),
        Field::new("CHIRPS_min", DataType::Float64, true),
        Field::new("CHIRPS_max", DataType::Float64, true),
    ]));

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let pb = create_progress_bar(rows.len() as u64, "Writing parquet file chunks".to_string());

    for chunk in rows.chunks(chunk_size) {
        let countries: Vec<&str> = chunk.iter().map(|r| r.country.as_str()).collect();
        let levels: Vec<u8> = chunk.iter().map(|r| r.admin_level).collect();
        let pcodes: Vec<&str> = chunk.iter().map(|r| r.pcode.as_str()).collect();
        let references: Vec<&str> = chunk.iter().map(|r| r.reference_name.as_str()).collect();
        let seasons: Vec<&str> = chunk.iter().map(|r| r.season.as_str()).collect();
        let means: Vec<Option<f64>> = chunk.iter().map(|r| r.mean).collect();
        let mins: Vec<Option<f64>> = chunk.iter().map(|r| r.min).collect();
        let maxs: Vec<Option<f64>> = chunk.iter().map(|r| r.max).collect();

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(countries)) as ArrayRef,
                Arc::new(UInt8Array::from(levels)) as ArrayRef,
                Arc::new(StringArray::from(pcodes)) as ArrayRef,
                Arc::new(StringArray::from(references)) as ArrayRef,
                Arc::new(StringArray::from(seasons)) as ArrayRef,
                Arc::new(Float64Array::from(means)) as ArrayRef,
                Arc::new(Float64Array::from(mins)) as ArrayRef,
                Arc::new(Float64Array::from(maxs)) as ArrayRef,
            ],
        )?;

        writer.write(&batch)?;
        pb.inc(chunk.len() as u64);
    }

    writer.close()?;
    pb.finish_with_message("Parquet file written");

    Ok(())
}

// -- Tests -------------------------------------------------------------------
