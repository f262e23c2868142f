//! Projection of source rows onto the destination schema.
//!
//! [`apply_mapping`] is the reference implementation. [`MappingApplier`] lets the
//! same step run either in-process ([`LocalApplier`]) or on the import backend
//! (`client::RemoteApplier`); both must produce identical tables.

use std::collections::HashMap;

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::mapping::MappingRules;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl NormalizedTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

pub trait MappingApplier {
    fn apply(
        &self,
        source_headers: &[String],
        rows: &[Vec<String>],
        rules: &MappingRules,
        fields: &[String],
    ) -> Result<NormalizedTable>;

    fn describe(&self) -> &'static str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalApplier;

impl MappingApplier for LocalApplier {
    fn apply(
        &self,
        source_headers: &[String],
        rows: &[Vec<String>],
        rules: &MappingRules,
        fields: &[String],
    ) -> Result<NormalizedTable> {
        Ok(apply_mapping(source_headers, rows, rules, fields))
    }

    fn describe(&self) -> &'static str {
        "local"
    }
}

/// Builds the normalized table. Output columns follow `fields`; unassigned fields,
/// rules naming an unknown header, and cells past the end of a short row all become
/// empty strings.
pub fn apply_mapping(
    source_headers: &[String],
    rows: &[Vec<String>],
    rules: &MappingRules,
    fields: &[String],
) -> NormalizedTable {
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(source_headers.len());
    for (idx, header) in source_headers.iter().enumerate() {
        positions.entry(header.as_str()).or_insert(idx);
    }

    let columns = fields
        .iter()
        .map(|field| {
            rules
                .get(field)
                .and_then(|source| source.as_deref())
                .and_then(|source| positions.get(source).copied())
        })
        .collect::<Vec<Option<usize>>>();
    debug!(
        "Resolved {} of {} destination field(s) to source columns",
        columns.iter().filter(|c| c.is_some()).count(),
        fields.len()
    );

    let normalized_rows = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| {
                    column
                        .and_then(|idx| row.get(idx))
                        .cloned()
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect();

    NormalizedTable {
        headers: fields.to_vec(),
        rows: normalized_rows,
    }
}
