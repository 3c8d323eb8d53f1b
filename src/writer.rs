// src/writer.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use csv::WriterBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde_json::{Map, Value};
use std::{fs::File, io::Write, path::Path, sync::Arc};
use tracing::info;

use crate::report::Report;

/// One JSON object per row, keyed by column name.
pub fn write_json_lines<W: Write>(report: &Report, mut out: W) -> Result<()> {
    for row in &report.rows {
        let obj: Map<String, Value> = report
            .column_names
            .iter()
            .cloned()
            .zip(row.iter().cloned())
            .collect();
        serde_json::to_writer(&mut out, &obj)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Header row of column names; nulls are empty cells, nested values JSON.
pub fn write_csv<W: Write>(report: &Report, out: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(out);
    wtr.write_record(&report.column_names)
        .context("writing csv header")?;
    for row in &report.rows {
        wtr.write_record(row.iter().map(|v| cell_text(v).unwrap_or_default()))
            .context("writing csv row")?;
    }
    wtr.flush()?;
    Ok(())
}

/// Column-aligned table for a terminal.
pub fn write_console<W: Write>(report: &Report, mut out: W) -> Result<()> {
    let cells: Vec<Vec<String>> = report
        .rows
        .iter()
        .map(|r| r.iter().map(|v| cell_text(v).unwrap_or_default()).collect())
        .collect();
    let mut widths: Vec<usize> = report.column_names.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cols: &[String]| {
        cols.iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<w$}", c, w = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    writeln!(out, "{}", line(&report.column_names))?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(out, "{}", line(&rule))?;
    for row in &cells {
        writeln!(out, "{}", line(row))?;
    }
    out.flush()?;
    Ok(())
}

/// Write the report as a single Snappy-compressed Parquet file.
pub fn write_parquet(report: &Report, path: &Path) -> Result<()> {
    let batch = to_record_batch(report)?;
    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating Arrow writer for report")?;
    writer.write(&batch).context("writing report batch")?;
    writer.close().context("closing report writer")?;
    info!(path = %path.display(), rows = report.rows.len(), "wrote parquet");
    Ok(())
}

/// Numeric columns become Float64, everything else Utf8.
pub fn to_record_batch(report: &Report) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(report.column_names.len());
    let mut columns = Vec::with_capacity(report.column_names.len());

    for (i, name) in report.column_names.iter().enumerate() {
        let cells: Vec<&Value> = report
            .rows
            .iter()
            .map(|r| r.get(i).unwrap_or(&Value::Null))
            .collect();

        let numeric = cells.iter().any(|v| v.is_number())
            && cells.iter().all(|v| v.is_number() || v.is_null());

        if numeric {
            let arr: Float64Array = cells.iter().map(|v| v.as_f64()).collect();
            fields.push(Field::new(name, DataType::Float64, true));
            columns.push(Arc::new(arr) as ArrayRef);
        } else {
            let arr: StringArray = cells.iter().map(|v| cell_text(v)).collect();
            fields.push(Field::new(name, DataType::Utf8, true));
            columns.push(Arc::new(arr) as ArrayRef);
        }
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building report record batch")
}

fn cell_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
