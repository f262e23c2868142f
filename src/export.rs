//! CSV and JSON encoders for the normalized table.

use std::{
    borrow::Cow,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::{Map, Value};

use crate::apply::NormalizedTable;

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn default_file_name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "normalized.csv",
            ExportFormat::Json => "normalized.json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
        }
    }

    pub fn encode(self, table: &NormalizedTable) -> Result<String> {
        match self {
            ExportFormat::Csv => Ok(to_csv(&table.headers, &table.rows)),
            ExportFormat::Json => to_json(&table.headers, &table.rows),
        }
    }
}

fn escape_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn encode_record(fields: &[String]) -> String {
    fields
        .iter()
        .map(|field| escape_field(field))
        .collect::<Vec<_>>()
        .join(",")
}

/// Header line followed by one line per row, joined with `\n` and no trailing
/// newline. Fields containing a comma, quote, or newline are quoted.
pub fn to_csv(headers: &[String], rows: &[Vec<String>]) -> String {
    std::iter::once(encode_record(headers))
        .chain(rows.iter().map(|row| encode_record(row)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pretty-printed array with one object per row, keyed by header in header order.
pub fn to_json(headers: &[String], rows: &[Vec<String>]) -> Result<String> {
    let objects = rows
        .iter()
        .map(|row| {
            let object = headers
                .iter()
                .enumerate()
                .map(|(idx, header)| {
                    let cell = row.get(idx).cloned().unwrap_or_default();
                    (header.clone(), Value::String(cell))
                })
                .collect::<Map<String, Value>>();
            Value::Object(object)
        })
        .collect::<Vec<_>>();
    serde_json::to_string_pretty(&objects).context("Encoding normalized rows as JSON")
}

/// Writes the encoded table to `output`, `-` for stdout, or the format's default
/// file name in the working directory. Returns where the data went.
pub fn write_export(
    table: &NormalizedTable,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let encoded = format.encode(table)?;
    match output {
        Some(path) if path == Path::new("-") => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(encoded.as_bytes())?;
            stdout.flush()?;
            Ok(None)
        }
        _ => {
            let path = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(format.default_file_name()));
            fs::write(&path, encoded).with_context(|| format!("Writing export file {path:?}"))?;
            Ok(Some(path))
        }
    }
}
