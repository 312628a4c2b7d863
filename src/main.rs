use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use yggdrasil::config::AppConfig;
use yggdrasil::database::{establish_connection, get_database_url, migrations::Migrator};
use yggdrasil::server::{self, MigrateDirection};
use yggdrasil::services::GedcomImportOptions;
use yggdrasil::storage::FilesystemBlobStore;
use yggdrasil::AppContext;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// TOML configuration file
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    /// Database file; overrides the configuration
    #[clap(short, long, global = true)]
    database: Option<String>,
    /// Blob storage directory; overrides the configuration
    #[clap(long, global = true)]
    storage_root: Option<PathBuf>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Serve {
        #[clap(short, long)]
        port: Option<u16>,
        #[clap(long)]
        cors_origin: Option<String>,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
    Gedcom {
        #[clap(subcommand)]
        command: GedcomCommands,
    },
    Backup {
        #[clap(subcommand)]
        command: BackupCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init,
    Migrate {
        #[clap(subcommand)]
        direction: MigrateDirection,
    },
}

#[derive(Subcommand, Debug)]
enum GedcomCommands {
    Import {
        file: PathBuf,
        /// Clear the existing tree before importing
        #[clap(long)]
        replace: bool,
    },
    Export {
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum BackupCommands {
    Export {
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Replace the whole tree with the archive contents
    Import { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(storage_root) = args.storage_root {
        config.storage_root = storage_root;
    }

    match args.command {
        Commands::Serve { port, cors_origin } => {
            if let Some(port) = port {
                config.port = port;
            }
            if cors_origin.is_some() {
                config.cors_origin = cors_origin;
            }
            info!("Starting server on port {}", config.port);
            server::start_server(&config).await?;
        }
        Commands::Db { command } => match command {
            DbCommands::Init => {
                info!("Initializing database: {}", config.database_path);
                server::migrate_database(&config.database_path, MigrateDirection::Up).await?;
            }
            DbCommands::Migrate { direction } => {
                info!("Running database migration: {:?}", direction);
                server::migrate_database(&config.database_path, direction).await?;
            }
        },
        Commands::Gedcom { command } => {
            let context = open_context(&config).await?;
            match command {
                GedcomCommands::Import { file, replace } => {
                    info!("Importing GEDCOM: {}", file.display());
                    let bytes = std::fs::read(&file)
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    let filename = file.file_name().and_then(|n| n.to_str());
                    let report = context
                        .import_gedcom(
                            filename,
                            &bytes,
                            GedcomImportOptions {
                                replace_existing: replace,
                            },
                        )
                        .await?;
                    for skipped in &report.summary.skipped {
                        warn!("Skipped {}", skipped);
                    }
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                GedcomCommands::Export { output } => {
                    let file = context.export_gedcom().await?;
                    let path = output.unwrap_or_else(|| PathBuf::from(&file.filename));
                    std::fs::write(&path, file.content)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("GEDCOM written to {}", path.display());
                }
            }
        }
        Commands::Backup { command } => {
            let context = open_context(&config).await?;
            match command {
                BackupCommands::Export { output } => {
                    let archive = context.export_backup().await?;
                    for warning in &archive.warnings {
                        warn!("{}", warning);
                    }
                    let path = output.unwrap_or_else(|| PathBuf::from(&archive.filename));
                    std::fs::write(&path, &archive.bytes)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Backup written to {}", path.display());
                }
                BackupCommands::Import { file } => {
                    info!("Restoring backup: {}", file.display());
                    let bytes = std::fs::read(&file)
                        .with_context(|| format!("Failed to read {}", file.display()))?;
                    let summary = context.import_backup(&bytes).await?;
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
            }
        }
    }

    Ok(())
}

async fn open_context(config: &AppConfig) -> Result<AppContext> {
    let database_url = get_database_url(Some(&config.database_path));
    let db = establish_connection(&database_url).await?;
    Migrator::up(&db, None).await?;
    let blob_store = Arc::new(FilesystemBlobStore::new(config.storage_root.clone()));
    Ok(AppContext::new(db, blob_store, config))
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let directives = log_directives(log_level, std::env::var("RUST_LOG").ok());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .without_time()
        .init();
}

/// `RUST_LOG` wins when set. SQL statements are only logged at debug and trace.
fn log_directives(level: Level, rust_log: Option<String>) -> String {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ if level >= Level::DEBUG => level.to_string(),
        _ => format!("sqlx=warn,{}", level),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directives() {
        assert_eq!(log_directives(Level::INFO, None), "sqlx=warn,INFO");
        assert_eq!(log_directives(Level::DEBUG, None), "DEBUG");
        assert_eq!(log_directives(Level::TRACE, Some(" ".into())), "TRACE");
        assert_eq!(
            log_directives(Level::INFO, Some("yggdrasil=debug".into())),
            "yggdrasil=debug"
        );
    }
}
