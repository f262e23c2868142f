//! Example CSV files shipped alongside the tool.
//!
//! Requested names arrive from URLs and the command line, so every lookup goes
//! through [`SampleDirectory::resolve`]: the name is percent-decoded, normalized
//! lexically, joined onto the directory, and rejected unless the result lies strictly
//! inside it.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use log::warn;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;

use crate::error::ImportError;

pub const SAMPLE_ROUTE: &str = "/api/sample-csv";

/// Characters left bare by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SampleListing {
    pub filename: String,
    pub download_path: String,
}

#[derive(Debug, Clone)]
pub struct SampleDirectory {
    root: PathBuf,
}

pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component.as_os_str())
            }
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
        }
    }
    normalized
}

impl SampleDirectory {
    /// Opens `path` (relative paths resolve against the working directory).
    pub fn open(path: &Path) -> Result<Self> {
        let absolute = std::path::absolute(path)
            .with_context(|| format!("Resolving sample directory {path:?}"))?;
        let root = normalize_lexically(&absolute);
        if !root.is_dir() {
            bail!("Sample directory not found under {root:?}");
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Regular `.csv` files directly inside the directory, sorted by name.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Reading sample directory {:?}", self.root))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".csv") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn listings(&self) -> Result<Vec<SampleListing>> {
        Ok(self
            .list()?
            .into_iter()
            .map(|filename| SampleListing {
                download_path: format!("{SAMPLE_ROUTE}/{}", encode_component(&filename)),
                filename,
            })
            .collect())
    }

    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ImportError> {
        let decoded = percent_decode_str(requested)
            .decode_utf8()
            .map_err(|_| ImportError::InvalidSamplePath(requested.to_string()))?;
        let resolved = normalize_lexically(&self.root.join(decoded.as_ref()));
        let inside = resolved
            .strip_prefix(&self.root)
            .map(|rest| !rest.as_os_str().is_empty())
            .unwrap_or(false);
        if !inside {
            warn!("Rejected sample request {requested:?}");
            return Err(ImportError::InvalidSamplePath(requested.to_string()));
        }
        Ok(resolved)
    }

    pub fn read(&self, requested: &str) -> Result<(String, Vec<u8>), ImportError> {
        let path = self.resolve(requested)?;
        let bytes =
            fs::read(&path).map_err(|_| ImportError::SampleNotFound(requested.to_string()))?;
        let base_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        Ok((base_name, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_dir() -> (tempfile::TempDir, SampleDirectory) {
        let dir = tempdir().expect("temp dir");
        let samples = dir.path().join("sample_csv");
        fs::create_dir(&samples).expect("create samples");
        fs::write(samples.join("orders.csv"), "order_id\nA1\n").expect("write orders");
        fs::write(samples.join("a b.csv"), "x\n").expect("write spaced");
        fs::write(samples.join("notes.txt"), "skip").expect("write txt");
        fs::create_dir(samples.join("nested.csv")).expect("create nested dir");
        fs::write(dir.path().join("secret.csv"), "secret").expect("write secret");
        let opened = SampleDirectory::open(&samples).expect("open");
        (dir, opened)
    }

    #[test]
    fn list_returns_only_csv_files() {
        let (_dir, samples) = sample_dir();
        assert_eq!(samples.list().unwrap(), vec!["a b.csv", "orders.csv"]);
    }

    #[test]
    fn listings_encode_download_paths() {
        let (_dir, samples) = sample_dir();
        let listings = samples.listings().unwrap();
        assert_eq!(listings[0].download_path, "/api/sample-csv/a%20b.csv");
        assert_eq!(listings[1].download_path, "/api/sample-csv/orders.csv");
    }

    #[test]
    fn resolve_accepts_plain_and_encoded_names() {
        let (_dir, samples) = sample_dir();
        let plain = samples.resolve("orders.csv").unwrap();
        assert_eq!(plain, samples.root().join("orders.csv"));
        let encoded = samples.resolve("a%20b.csv").unwrap();
        assert_eq!(encoded, samples.root().join("a b.csv"));
        let dotted = samples.resolve("./x/../orders.csv").unwrap();
        assert_eq!(dotted, samples.root().join("orders.csv"));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let (_dir, samples) = sample_dir();
        for probe in [
            "../../etc/passwd",
            "..%2F..%2Fetc%2Fpasswd",
            "%2e%2e/secret.csv",
            "../secret.csv",
            "/etc/passwd",
            "",
            ".",
            "x/../..",
        ] {
            let err = samples.resolve(probe).unwrap_err();
            assert!(
                matches!(err, ImportError::InvalidSamplePath(_)),
                "{probe} should be rejected"
            );
        }
    }

    #[test]
    fn sibling_directory_with_shared_prefix_is_outside() {
        let (dir, samples) = sample_dir();
        let sibling = dir.path().join("sample_csv_private");
        fs::create_dir(&sibling).unwrap();
        fs::write(sibling.join("leak.csv"), "leak").unwrap();
        assert!(samples.resolve("../sample_csv_private/leak.csv").is_err());
    }

    #[test]
    fn read_reports_missing_file_as_not_found() {
        let (_dir, samples) = sample_dir();
        let (name, bytes) = samples.read("orders.csv").unwrap();
        assert_eq!(name, "orders.csv");
        assert_eq!(bytes, b"order_id\nA1\n");
        assert!(matches!(
            samples.read("missing.csv"),
            Err(ImportError::SampleNotFound(_))
        ));
    }

    #[test]
    fn open_fails_for_missing_directory() {
        let dir = tempdir().unwrap();
        assert!(SampleDirectory::open(&dir.path().join("absent")).is_err());
    }
}
