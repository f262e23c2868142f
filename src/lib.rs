pub mod apply;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod mapping;
pub mod samples;
pub mod schema;
pub mod server;
pub mod session;
pub mod table;
pub mod templates;

use std::{
    env, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};

use crate::{
    cli::{
        ApplyArgs, Cli, Commands, ExportArgs, MappingAction, PreviewArgs, SamplesAction,
        ServeArgs, TemplatesAction,
    },
    config::AppConfig,
    samples::SampleDirectory,
    server::SampleRoot,
    session::ImportSession,
    templates::{NewTemplate, TemplateStore, rules_for_schema},
};

static LOGGER: OnceLock<()> = OnceLock::new();
const LOG_TARGET: &str = env!("CARGO_CRATE_NAME");

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module(LOG_TARGET, LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = AppConfig::resolve(&cli.global)?;
    match cli.command {
        Commands::Preview(args) => handle_preview(&config, &args),
        Commands::Mapping(args) => handle_mapping(&config, args.action),
        Commands::Apply(args) => handle_apply(&config, &args),
        Commands::Export(args) => handle_export(&config, &args),
        Commands::Templates(args) => handle_templates(&config, args.action),
        Commands::Samples(args) => handle_samples(&config, args.action),
        Commands::Serve(args) => handle_serve(&config, &args),
    }
}

fn load_session(config: &AppConfig) -> Result<ImportSession> {
    let schema = config.schema()?;
    ImportSession::load_or_new(&config.session_file, &schema)
}

fn handle_preview(config: &AppConfig, args: &PreviewArgs) -> Result<()> {
    let schema = config.schema()?;
    let client = config.backend()?;
    let preview = client
        .upload_preview(&args.input)
        .with_context(|| format!("Uploading {:?}", args.input))?;

    let mut session = ImportSession::new(schema.clone());
    session.reset_with_preview(schema, Some(args.input.display().to_string()), preview);

    let preview = session.require_preview()?;
    println!(
        "delimiter: {} / hasHeader: {} / rows: {}",
        printable_delimiter(&preview.delimiter),
        preview.has_header,
        preview.count_guessed
    );
    let shown = preview.sample_rows.iter().take(args.rows).cloned().collect::<Vec<_>>();
    table::print_table(&preview.headers, &shown);
    println!();
    print!("{}", table::render_rules(&session.schema.fields, &session.rules));

    session.save(&config.session_file)?;
    info!(
        "Started session for {:?} with {} column(s) and {} preview row(s)",
        args.input,
        session.headers().len(),
        session.rows().len()
    );
    Ok(())
}

fn handle_mapping(config: &AppConfig, action: MappingAction) -> Result<()> {
    let mut session = load_session(config)?;
    match action {
        MappingAction::Show => {}
        MappingAction::Set { assignments } => {
            for (field, source) in &assignments {
                session.set_rule(field, source.as_deref())?;
            }
            session.save(&config.session_file)?;
            info!("Updated {} mapping rule(s)", assignments.len());
        }
        MappingAction::Unset { fields } => {
            for field in &fields {
                session.set_rule(field, None)?;
            }
            session.save(&config.session_file)?;
            info!("Unassigned {} field(s)", fields.len());
        }
        MappingAction::Guess => {
            session.require_preview()?;
            session.regenerate_guess();
            session.save(&config.session_file)?;
            info!("Mapping guessed again from {} header(s)", session.headers().len());
        }
    }
    print!("{}", table::render_rules(&session.schema.fields, &session.rules));
    Ok(())
}

fn handle_apply(config: &AppConfig, args: &ApplyArgs) -> Result<()> {
    let mut session = load_session(config)?;
    let applier = config.applier(args.mode)?;
    debug!("Applying mapping with the {} applier", applier.describe());
    let normalized = session.apply_with(&*applier)?.clone();

    let shown = normalized.rows.iter().take(args.rows).cloned().collect::<Vec<_>>();
    table::print_table(&normalized.headers, &shown);
    session.save(&config.session_file)?;
    info!(
        "Applied mapping ({}) to {} row(s)",
        applier.describe(),
        normalized.row_count()
    );
    Ok(())
}

fn handle_export(config: &AppConfig, args: &ExportArgs) -> Result<()> {
    let session = load_session(config)?;
    let normalized = session.require_normalized()?;
    match export::write_export(normalized, args.format, args.output.as_deref())? {
        Some(path) => info!(
            "Wrote {} row(s) to {:?} ({})",
            normalized.row_count(),
            path,
            args.format.content_type()
        ),
        None => debug!("Wrote {} row(s) to stdout", normalized.row_count()),
    }
    Ok(())
}

fn handle_templates(config: &AppConfig, action: TemplatesAction) -> Result<()> {
    let client = config.backend()?;
    let mut session = load_session(config)?;
    match action {
        TemplatesAction::List => {
            let records = client.list_templates(&session.schema.key)?;
            let headers = ["id", "name", "rules", "updated", "description"]
                .iter()
                .map(|h| h.to_string())
                .collect::<Vec<_>>();
            let rows = records
                .iter()
                .map(|record| {
                    vec![
                        record.id.clone(),
                        record.name.clone(),
                        record.rules.len().to_string(),
                        record.updated_at.format("%Y-%m-%d %H:%M").to_string(),
                        record.description.clone().unwrap_or_default(),
                    ]
                })
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
            info!(
                "Listed {} template(s) for schema '{}'",
                records.len(),
                session.schema.key
            );
        }
        TemplatesAction::Save { name, description } => {
            let request = NewTemplate::from_rules(
                &name,
                &session.schema,
                &session.rules,
                description.as_deref(),
            )?;
            let id = client.create_template(&request)?;
            println!("{id}");
            info!(
                "Saved template '{}' with {} rule(s) as {id}",
                request.name,
                request.rules.len()
            );
        }
        TemplatesAction::Load { id } => {
            let record = client
                .list_templates(&session.schema.key)?
                .into_iter()
                .find(|record| record.id == id)
                .ok_or_else(|| {
                    anyhow!(
                        "Template '{id}' not found for schema '{}'",
                        session.schema.key
                    )
                })?;
            let rules = rules_for_schema(&record.rules, &session.schema);
            for source in rules.values().flatten() {
                if session.preview.is_some() && !session.headers().contains(source) {
                    warn!("Template column '{source}' is not present in the uploaded file");
                }
            }
            session.replace_rules(rules);
            session.save(&config.session_file)?;
            print!("{}", table::render_rules(&session.schema.fields, &session.rules));
            info!("Loaded template '{}' ({})", record.name, record.id);
        }
        TemplatesAction::Show { id } => {
            let record = client.get_template(&id)?;
            let json = serde_json::to_string_pretty(&record).context("Encoding template")?;
            println!("{json}");
        }
        TemplatesAction::Delete { id } => {
            client.delete_template(&id)?;
            info!("Deleted template {id}");
        }
    }
    Ok(())
}

fn handle_samples(config: &AppConfig, action: SamplesAction) -> Result<()> {
    let samples = SampleDirectory::open(&config.sample_dir)?;
    match action {
        SamplesAction::List => {
            let listings = samples.listings()?;
            let headers = vec!["filename".to_string(), "download path".to_string()];
            let rows = listings
                .iter()
                .map(|l| vec![l.filename.clone(), l.download_path.clone()])
                .collect::<Vec<_>>();
            table::print_table(&headers, &rows);
            info!("Found {} sample file(s) in {:?}", listings.len(), samples.root());
        }
        SamplesAction::Fetch { name, output } => {
            let (base_name, bytes) = samples.read(&name)?;
            let target = output.unwrap_or_else(|| PathBuf::from(&base_name));
            if target == Path::new("-") {
                io::stdout().lock().write_all(&bytes)?;
            } else {
                fs::write(&target, &bytes)
                    .with_context(|| format!("Writing sample to {target:?}"))?;
                info!("Copied sample '{base_name}' to {target:?}");
            }
        }
    }
    Ok(())
}

fn handle_serve(config: &AppConfig, args: &ServeArgs) -> Result<()> {
    let root = SampleRoot(config.sample_dir.clone());
    actix_web::rt::System::new()
        .block_on(server::run(&args.host, args.port, root))
        .with_context(|| format!("Serving on {}:{}", args.host, args.port))
}

pub(crate) fn printable_delimiter(delimiter: &str) -> String {
    match delimiter {
        "\t" => "\\t".to_string(),
        "" => "?".to_string(),
        other => other.to_string(),
    }
}
