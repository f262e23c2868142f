//! Mapping templates: named rule sets persisted by the import backend.
//!
//! Storage lives behind [`TemplateStore`]; this module owns the record shapes, the
//! validation done before anything is sent, and re-keying stored rules against the
//! schema of the current session.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::ImportError,
    mapping::{self, MappingRules},
    schema::DestinationSchema,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateRecord {
    pub id: String,
    pub name: String,
    pub schema_key: String,
    #[serde(default)]
    pub rules: BTreeMap<String, Value>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewTemplate {
    pub name: String,
    pub schema_key: String,
    pub rules: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewTemplate {
    /// Builds a create request from the session's rules, dropping unassigned fields.
    pub fn from_rules(
        name: &str,
        schema: &DestinationSchema,
        rules: &MappingRules,
        description: Option<&str>,
    ) -> Result<Self, ImportError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ImportError::validation("Template name is required"));
        }
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Ok(Self {
            name: name.to_string(),
            schema_key: schema.key.clone(),
            rules: mapping::cleaned_rules(rules),
            description,
        })
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CreatedTemplate {
    pub id: String,
}

pub trait TemplateStore {
    fn list_templates(&self, schema_key: &str) -> Result<Vec<TemplateRecord>>;
    fn create_template(&self, template: &NewTemplate) -> Result<String>;
    fn get_template(&self, id: &str) -> Result<TemplateRecord>;
    fn delete_template(&self, id: &str) -> Result<()>;
}

/// Re-keys stored rules against `schema`: every schema field gets an entry, stored
/// keys outside the schema are ignored, and non-string values count as unassigned.
pub fn rules_for_schema(
    stored: &BTreeMap<String, Value>,
    schema: &DestinationSchema,
) -> MappingRules {
    let dropped = stored.keys().filter(|key| !schema.contains(key)).count();
    if dropped > 0 {
        warn!(
            "Ignoring {dropped} template rule(s) for fields outside schema '{}'",
            schema.key
        );
    }
    schema
        .fields
        .iter()
        .map(|field| {
            let source = match stored.get(field) {
                Some(Value::String(header)) => Some(header.clone()),
                _ => None,
            };
            (field.clone(), source)
        })
        .collect()
}
