//! tropedb CLI: natural-language queries and trope classification over a
//! local trope catalog.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use tropedb::config::{Credentials, Settings};
use tropedb::engine::{DatabaseLocation, Engine, EngineConfig, ServiceStatus};
use tropedb::paths::TropePaths;
use tropedb::provider::{self, TextGenerator};

#[derive(Parser)]
#[command(name = "tropedb", version, about = "AI-assisted trope catalog")]
struct Cli {
    /// Catalog database file. Defaults to the settings value, then the XDG data directory.
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Settings file. Defaults to `$XDG_CONFIG_HOME/tropedb/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the catalog schema (idempotent).
    Init,

    /// Turn a natural-language request into SQL and run it.
    Query {
        /// The request, e.g. "enemies to lovers novels from the last 5 years".
        text: String,

        /// Print the resolved command and provider attempts without executing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Identify catalog tropes in a description.
    Classify {
        /// Free-text description of a work.
        text: String,

        /// Record the matches as examples of this work.
        #[arg(long)]
        work_id: Option<String>,
    },

    /// Show configured providers and catalog state.
    Status {
        /// Contact local backends to check they respond.
        #[arg(long)]
        probe: bool,
    },
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn engine_config(cli: &Cli) -> Result<EngineConfig> {
    let paths = TropePaths::resolve();
    let settings = match (&cli.config, &paths) {
        (Some(path), _) => Settings::load(path)?,
        (None, Ok(paths)) => Settings::load_or_default(&paths.config_file())?,
        (None, Err(e)) => {
            tracing::warn!(error = %e, "no XDG config directory, using default settings");
            Settings::default()
        }
    };

    let database = match cli.database.clone().or_else(|| settings.database.clone()) {
        Some(path) => path,
        None => paths?.default_database(),
    };

    Ok(EngineConfig {
        database: DatabaseLocation::File(database),
        credentials: Credentials::from_env(),
        settings,
    })
}

#[derive(Serialize)]
struct ProbeReport {
    name: String,
    reachable: bool,
}

#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    probes: Option<Vec<ProbeReport>>,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = dotenvy::from_filename(".env.local") {
        if !e.not_found() {
            tracing::warn!(error = %e, "failed to load .env.local");
        }
    }

    let cli = Cli::parse();
    let config = engine_config(&cli)?;

    match cli.command {
        Commands::Init => {
            if let Ok(paths) = TropePaths::resolve() {
                paths.ensure_dirs()?;
                let config_file = paths.config_file();
                if cli.config.is_none() && !config_file.exists() {
                    config.settings.save(&config_file)?;
                    println!("Wrote default settings to {}", config_file.display());
                }
            }
            let engine = Engine::new(config)?;
            println!("Initialized catalog at {}", engine.store().location());
        }

        Commands::Query { text, dry_run } => {
            if dry_run {
                let engine = Engine::new(config)?;
                print_json(&engine.resolve(&text))?;
            } else {
                let mut engine = Engine::new(config)?;
                print_json(&engine.natural_query(&text)?)?;
            }
        }

        Commands::Classify { text, work_id } => {
            let mut engine = Engine::new(config)?;
            let result = match work_id {
                Some(work_id) => engine.record_tropes_for_work(&work_id, &text)?,
                None => engine.extract_tropes(&text)?,
            };
            print_json(&result)?;
        }

        Commands::Status { probe } => {
            let probes: Option<Vec<ProbeReport>> = probe.then(|| {
                provider::build_providers(&config.settings.providers, &config.credentials)
                    .iter()
                    .map(|p| ProbeReport {
                        name: p.name().to_string(),
                        reachable: p.probe(),
                    })
                    .collect()
            });
            let engine = Engine::new(config)?;
            print_json(&StatusReport {
                status: engine.status()?,
                probes,
            })?;
        }
    }

    Ok(())
}
