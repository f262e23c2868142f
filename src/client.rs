//! Blocking HTTP client for the import backend.
//!
//! Covers the upload/preview endpoint, the server-side mapping apply, and the
//! template endpoints. No request is retried; a non-success status is returned as
//! [`ImportError::Backend`] carrying the response body.

use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result};
use log::{debug, info};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::blocking::{Client, Response, multipart::Form};
use serde::{Deserialize, Serialize};

use crate::{
    apply::{MappingApplier, NormalizedTable},
    error::ImportError,
    mapping::MappingRules,
    session::{ImportPreview, null_as_default},
    templates::{CreatedTemplate, NewTemplate, TemplateRecord, TemplateStore},
};

const IMPORTS_PATH: &str = "/api/imports";
const APPLY_PATH: &str = "/api/mappings/apply";
const TEMPLATES_PATH: &str = "/api/templates";

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct ApplyRequest<'a> {
    headers: &'a [String],
    rows: &'a [Vec<String>],
    rules: &'a MappingRules,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub normalized_headers: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub normalized_rows: Vec<Vec<String>>,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        anyhow::ensure!(!base_url.is_empty(), "Import backend URL is not configured");
        let http = Client::builder()
            .user_agent(concat!("csv-import-kit/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Building HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn template_url(&self, id: &str) -> String {
        let encoded = utf8_percent_encode(id, NON_ALPHANUMERIC);
        format!("{}{TEMPLATES_PATH}/{encoded}", self.base_url)
    }

    /// Uploads `path` as the multipart `file` field and returns the parsed preview.
    pub fn upload_preview(&self, path: &Path) -> Result<ImportPreview> {
        let form = Form::new()
            .file("file", path)
            .with_context(|| format!("Opening upload file {path:?}"))?;
        info!("Uploading {:?} to {}", path, self.url(IMPORTS_PATH));
        let response = self
            .http
            .post(self.url(IMPORTS_PATH))
            .multipart(form)
            .send()
            .map_err(ImportError::from)?;
        let preview = expect_success(response)?
            .json::<ImportPreview>()
            .map_err(|err| ImportError::MalformedResponse(err.to_string()))?;
        debug!(
            "Backend detected delimiter {:?}, header={}, {} column(s)",
            preview.delimiter,
            preview.has_header,
            preview.headers.len()
        );
        Ok(preview)
    }

    pub fn apply_remote(
        &self,
        headers: &[String],
        rows: &[Vec<String>],
        rules: &MappingRules,
    ) -> Result<ApplyResponse> {
        let request = ApplyRequest {
            headers,
            rows,
            rules,
        };
        let response = self
            .http
            .post(self.url(APPLY_PATH))
            .json(&request)
            .send()
            .map_err(ImportError::from)?;
        let body = expect_success(response)?
            .json::<ApplyResponse>()
            .map_err(|err| ImportError::MalformedResponse(err.to_string()))?;
        Ok(body)
    }
}

fn expect_success(response: Response) -> Result<Response, ImportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ImportError::Backend {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

impl TemplateStore for BackendClient {
    fn list_templates(&self, schema_key: &str) -> Result<Vec<TemplateRecord>> {
        let response = self
            .http
            .get(self.url(TEMPLATES_PATH))
            .query(&[("schema_key", schema_key)])
            .send()
            .map_err(ImportError::from)?;
        let records = expect_success(response)?
            .json::<Option<Vec<TemplateRecord>>>()
            .map_err(|err| ImportError::MalformedResponse(err.to_string()))?
            .unwrap_or_default();
        let total = records.len();
        let matching = records
            .into_iter()
            .filter(|record| record.schema_key == schema_key)
            .collect::<Vec<_>>();
        debug!(
            "Backend returned {total} template(s), {} for schema '{schema_key}'",
            matching.len()
        );
        Ok(matching)
    }

    fn create_template(&self, template: &NewTemplate) -> Result<String> {
        let response = self
            .http
            .post(self.url(TEMPLATES_PATH))
            .json(template)
            .send()
            .map_err(ImportError::from)?;
        let created = expect_success(response)?
            .json::<CreatedTemplate>()
            .map_err(|err| ImportError::MalformedResponse(err.to_string()))?;
        Ok(created.id)
    }

    fn get_template(&self, id: &str) -> Result<TemplateRecord> {
        let response = self
            .http
            .get(self.template_url(id))
            .send()
            .map_err(ImportError::from)?;
        let record = expect_success(response)?
            .json::<TemplateRecord>()
            .map_err(|err| ImportError::MalformedResponse(err.to_string()))?;
        Ok(record)
    }

    fn delete_template(&self, id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.template_url(id))
            .send()
            .map_err(ImportError::from)?;
        expect_success(response)?;
        Ok(())
    }
}

/// Runs the mapping on the import backend.
#[derive(Debug, Clone)]
pub struct RemoteApplier {
    client: BackendClient,
}

impl RemoteApplier {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

impl MappingApplier for RemoteApplier {
    fn apply(
        &self,
        source_headers: &[String],
        rows: &[Vec<String>],
        rules: &MappingRules,
        fields: &[String],
    ) -> Result<NormalizedTable> {
        // Send one entry per field so the backend sees the same total rule set.
        let total_rules = fields
            .iter()
            .map(|field| (field.clone(), rules.get(field).cloned().flatten()))
            .collect::<MappingRules>();
        let headers = mask_repeated_headers(source_headers, &total_rules);
        let response = self.client.apply_remote(&headers, rows, &total_rules)?;
        Ok(reproject(response, fields, rows.len())?)
    }

    fn describe(&self) -> &'static str {
        "remote"
    }
}

/// Renames every repeated header after its first occurrence to a name no header or
/// rule uses.
///
/// The backend indexes headers with the last occurrence winning, while
/// [`crate::apply::apply_mapping`] takes the first. Masking the later copies leaves
/// the backend only the first column to resolve.
pub fn mask_repeated_headers(headers: &[String], rules: &MappingRules) -> Vec<String> {
    let taken = |name: &str| {
        headers.iter().any(|h| h == name)
            || rules.values().flatten().any(|source| source == name)
    };
    let mut seen = HashSet::new();
    let mut masked = Vec::with_capacity(headers.len());
    for (idx, header) in headers.iter().enumerate() {
        if seen.insert(header.as_str()) {
            masked.push(header.clone());
            continue;
        }
        let mut name = format!("{header} (column {})", idx + 1);
        while taken(&name) {
            name.push('_');
        }
        masked.push(name);
    }
    masked
}

/// Puts a backend apply response into destination-schema order.
///
/// The backend is free to order its columns differently (it sorts them by name);
/// columns are matched by header, and absent columns or short rows read as empty.
pub fn reproject(
    response: ApplyResponse,
    fields: &[String],
    expected_rows: usize,
) -> Result<NormalizedTable, ImportError> {
    if response.normalized_rows.len() != expected_rows {
        return Err(ImportError::MalformedResponse(format!(
            "expected {expected_rows} normalized row(s), got {}",
            response.normalized_rows.len()
        )));
    }
    let columns = fields
        .iter()
        .map(|field| {
            response
                .normalized_headers
                .iter()
                .position(|header| header == field)
        })
        .collect::<Vec<_>>();
    let rows = response
        .normalized_rows
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
    Ok(NormalizedTable {
        headers: fields.to_vec(),
        rows,
    })
}
