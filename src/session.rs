//! Import session state carried between commands.
//!
//! A session holds one uploaded file's preview, the current mapping rules, and the
//! last applied table. Uploading a new file replaces all of it through
//! [`ImportSession::reset_with_preview`]; nothing is migrated from the previous file.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    apply::{MappingApplier, NormalizedTable},
    error::ImportError,
    mapping::{self, MappingRules},
    schema::DestinationSchema,
};

/// Preview payload returned by the import endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    #[serde(default)]
    pub delimiter: String,
    #[serde(default)]
    pub has_header: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub headers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sample_rows: Vec<Vec<String>>,
    #[serde(default)]
    pub count_guessed: usize,
}

// The backend encodes empty lists as `null`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportSession {
    pub schema: DestinationSchema,
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub preview: Option<ImportPreview>,
    pub rules: MappingRules,
    #[serde(default)]
    pub normalized: Option<NormalizedTable>,
}

impl ImportSession {
    pub fn new(schema: DestinationSchema) -> Self {
        let rules = mapping::empty_rules(&schema.fields);
        Self {
            schema,
            source_file: None,
            preview: None,
            rules,
            normalized: None,
        }
    }

    /// Starts over for a freshly uploaded file: new preview, freshly guessed rules,
    /// no normalized table.
    pub fn reset_with_preview(
        &mut self,
        schema: DestinationSchema,
        source_file: Option<String>,
        preview: ImportPreview,
    ) {
        let rules = mapping::guess_rules(&schema.fields, &preview.headers);
        *self = Self {
            schema,
            source_file,
            preview: Some(preview),
            rules,
            normalized: None,
        };
    }

    pub fn headers(&self) -> &[String] {
        self.preview
            .as_ref()
            .map(|p| p.headers.as_slice())
            .unwrap_or_default()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        self.preview
            .as_ref()
            .map(|p| p.sample_rows.as_slice())
            .unwrap_or_default()
    }

    pub fn require_preview(&self) -> Result<&ImportPreview, ImportError> {
        self.preview.as_ref().ok_or_else(|| {
            ImportError::validation("No file has been uploaded yet; run `preview` first")
        })
    }

    pub fn set_rule(&mut self, field: &str, source: Option<&str>) -> Result<(), ImportError> {
        self.require_preview()?;
        let headers = self.headers().to_vec();
        mapping::set_rule(&mut self.rules, &self.schema.fields, &headers, field, source)
    }

    pub fn regenerate_guess(&mut self) {
        self.rules = mapping::guess_rules(&self.schema.fields, self.headers());
    }

    /// Replaces the rules wholesale, keeping exactly the schema's fields.
    pub fn replace_rules(&mut self, rules: MappingRules) {
        self.rules = self
            .schema
            .fields
            .iter()
            .map(|field| (field.clone(), rules.get(field).cloned().flatten()))
            .collect();
    }

    pub fn apply_with(&mut self, applier: &dyn MappingApplier) -> Result<&NormalizedTable> {
        self.require_preview()?;
        let table = applier.apply(
            self.headers(),
            self.rows(),
            &self.rules,
            &self.schema.fields,
        )?;
        Ok(self.normalized.insert(table))
    }

    pub fn require_normalized(&self) -> Result<&NormalizedTable, ImportError> {
        self.normalized.as_ref().ok_or_else(|| {
            ImportError::validation("Mapping has not been applied yet; run `apply` first")
        })
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(path).with_context(|| format!("Opening session file {path:?}"))?;
        let session = serde_json::from_str(&contents)
            .with_context(|| format!("Parsing session file {path:?}"))?;
        Ok(Some(session))
    }

    /// Loads the session at `path`, or starts an empty one for `schema`.
    ///
    /// An existing session keeps the schema it was started with.
    pub fn load_or_new(path: &Path, schema: &DestinationSchema) -> Result<Self> {
        match Self::load(path)? {
            Some(session) => {
                if session.schema.key != schema.key {
                    warn!(
                        "Session {:?} uses schema '{}'; '{}' takes effect on the next upload",
                        path, session.schema.key, schema.key
                    );
                }
                Ok(session)
            }
            None => {
                debug!("No session at {:?}; starting a new one", path);
                Ok(Self::new(schema.clone()))
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Encoding session state")?;
        fs::write(path, json).with_context(|| format!("Writing session file {path:?}"))
    }
}
