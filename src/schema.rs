//! Destination schemas: the ordered field list an import must populate.
//!
//! The built-in [`DestinationSchema::order_v1`] matches the order import the backend
//! was designed around. Other schemas can be described in a small YAML file:
//!
//! ```yaml
//! key: customers_v2
//! fields: [customer_id, name, email]
//! ```

use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

pub const ORDER_SCHEMA_V1_KEY: &str = "order_v1";

pub const ORDER_SCHEMA_V1: &[&str] = &[
    "order_id",
    "customer_id",
    "product",
    "quantity",
    "unit_price",
    "order_date",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DestinationSchema {
    pub key: String,
    pub fields: Vec<String>,
}

impl DestinationSchema {
    pub fn new<I, S>(key: impl Into<String>, fields: I) -> Result<Self, ImportError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Self {
            key: key.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        };
        schema.ensure_valid()?;
        Ok(schema)
    }

    pub fn order_v1() -> Self {
        Self {
            key: ORDER_SCHEMA_V1_KEY.to_string(),
            fields: ORDER_SCHEMA_V1.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Opening schema file {path:?}"))?;
        let schema: DestinationSchema = serde_yaml::from_str(&contents)
            .with_context(|| format!("Parsing schema YAML {path:?}"))?;
        schema
            .ensure_valid()
            .with_context(|| format!("Validating schema {path:?}"))?;
        Ok(schema)
    }

    pub fn ensure_valid(&self) -> Result<(), ImportError> {
        if self.key.trim().is_empty() {
            return Err(ImportError::validation("Schema key must not be empty"));
        }
        if self.fields.is_empty() {
            return Err(ImportError::validation(format!(
                "Schema '{}' must define at least one field",
                self.key
            )));
        }
        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.trim().is_empty() {
                return Err(ImportError::validation(format!(
                    "Schema '{}' contains an empty field name",
                    self.key
                )));
            }
            if !seen.insert(field.as_str()) {
                return Err(ImportError::validation(format!(
                    "Schema '{}' lists field '{field}' more than once",
                    self.key
                )));
            }
        }
        Ok(())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for DestinationSchema {
    fn default() -> Self {
        Self::order_v1()
    }
}
