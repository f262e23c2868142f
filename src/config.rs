//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables and command-line flags (both handled by clap in
//! [`crate::cli::GlobalArgs`]).

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    apply::{LocalApplier, MappingApplier},
    cli::GlobalArgs,
    client::{BackendClient, RemoteApplier},
    schema::DestinationSchema,
};

pub const DEFAULT_CONFIG_FILE: &str = "csv-import-kit.yaml";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_SAMPLE_DIR: &str = "sample_csv";
pub const DEFAULT_SESSION_FILE: &str = ".csv-import-session.json";

#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ApplyMode {
    Local,
    #[default]
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    pub apply_mode: ApplyMode,
    pub sample_dir: PathBuf,
    pub session_file: PathBuf,
    pub schema_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            apply_mode: ApplyMode::default(),
            sample_dir: PathBuf::from(DEFAULT_SAMPLE_DIR),
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
            schema_file: None,
        }
    }
}

impl AppConfig {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Opening config file {path:?}"))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).with_context(|| format!("Parsing config file {path:?}"))
    }

    /// Builds the effective configuration for one invocation.
    ///
    /// An explicit `--config` file must exist; the default file name is only read
    /// when present.
    pub fn resolve(args: &GlobalArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_yaml_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(args);
        debug!("Effective configuration: {config:?}");
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &GlobalArgs) {
        if let Some(url) = &args.api_base_url {
            self.api_base_url = url.clone();
        }
        if let Some(mode) = args.apply_mode {
            self.apply_mode = mode;
        }
        if let Some(dir) = &args.sample_dir {
            self.sample_dir = dir.clone();
        }
        if let Some(session) = &args.session {
            self.session_file = session.clone();
        }
        if let Some(schema) = &args.schema {
            self.schema_file = Some(schema.clone());
        }
    }

    pub fn schema(&self) -> Result<DestinationSchema> {
        match &self.schema_file {
            Some(path) => DestinationSchema::load(path),
            None => Ok(DestinationSchema::order_v1()),
        }
    }

    pub fn backend(&self) -> Result<BackendClient> {
        BackendClient::new(&self.api_base_url)
    }

    pub fn applier(&self, mode: Option<ApplyMode>) -> Result<Box<dyn MappingApplier>> {
        Ok(match mode.unwrap_or(self.apply_mode) {
            ApplyMode::Local => Box::new(LocalApplier),
            ApplyMode::Remote => Box::new(RemoteApplier::new(self.backend()?)),
        })
    }
}
