use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{config::ApplyMode, export::ExportFormat, mapping::parse_assignment};

#[derive(Debug, Parser)]
#[command(author, version, about = "Preview, map, and normalize CSV imports", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    /// YAML configuration file (defaults to ./csv-import-kit.yaml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Base URL of the import backend
    #[arg(long = "api-base", global = true, env = "CSV_IMPORT_API_BASE_URL")]
    pub api_base_url: Option<String>,
    /// Where mappings are applied by default
    #[arg(long = "apply-mode", global = true, value_enum, env = "CSV_IMPORT_APPLY_MODE")]
    pub apply_mode: Option<ApplyMode>,
    /// Directory holding the sample CSV files
    #[arg(long = "sample-dir", global = true, env = "CSV_IMPORT_SAMPLE_DIR")]
    pub sample_dir: Option<PathBuf>,
    /// Session state file shared between commands
    #[arg(long, global = true, env = "CSV_IMPORT_SESSION")]
    pub session: Option<PathBuf>,
    /// Destination schema YAML file (defaults to the built-in order_v1 schema)
    #[arg(long, global = true, env = "CSV_IMPORT_SCHEMA")]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a file to the import backend and start a new session from its preview
    Preview(PreviewArgs),
    /// Inspect or edit the column mapping of the current session
    Mapping(MappingArgs),
    /// Apply the current mapping and show the normalized rows
    Apply(ApplyArgs),
    /// Write the normalized rows as CSV or JSON
    Export(ExportArgs),
    /// Manage saved mapping templates
    Templates(TemplatesArgs),
    /// List or fetch the bundled sample CSV files
    Samples(SamplesArgs),
    /// Serve the sample CSV files over HTTP
    Serve(ServeArgs),
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// CSV or Excel-exported CSV file to upload
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of preview rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct MappingArgs {
    #[command(subcommand)]
    pub action: MappingAction,
}

#[derive(Debug, Subcommand)]
pub enum MappingAction {
    /// Show the destination fields and their assigned source columns
    Show,
    /// Assign source columns, e.g. `quantity=Qty` (an empty right side unassigns)
    Set {
        #[arg(required = true, value_parser = parse_assignment)]
        assignments: Vec<(String, Option<String>)>,
    },
    /// Unassign one or more destination fields
    Unset {
        #[arg(required = true)]
        fields: Vec<String>,
    },
    /// Discard edits and guess the mapping again from the file headers
    Guess,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Override the configured apply mode for this run
    #[arg(long, value_enum)]
    pub mode: Option<ApplyMode>,
    /// Number of normalized rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    pub format: ExportFormat,
    /// Output path (`-` for stdout; defaults to normalized.csv / normalized.json)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TemplatesArgs {
    #[command(subcommand)]
    pub action: TemplatesAction,
}

#[derive(Debug, Subcommand)]
pub enum TemplatesAction {
    /// List saved templates for the session's schema
    List,
    /// Save the current mapping as a new template
    Save {
        /// Template name
        #[arg(long)]
        name: String,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
    },
    /// Load a saved template into the current mapping
    Load {
        /// Template id
        id: String,
    },
    /// Show one saved template
    Show {
        /// Template id
        id: String,
    },
    /// Delete a saved template
    Delete {
        /// Template id
        id: String,
    },
}

#[derive(Debug, Args)]
pub struct SamplesArgs {
    #[command(subcommand)]
    pub action: SamplesAction,
}

#[derive(Debug, Subcommand)]
pub enum SamplesAction {
    /// List the available sample files
    List,
    /// Copy a sample file out of the sample directory
    Fetch {
        /// Sample file name (URL-encoded names are accepted)
        name: String,
        /// Destination path (defaults to the sample's own name; `-` for stdout)
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    /// Port to listen on
    #[arg(long, default_value_t = 3000)]
    pub port: u16,
}
