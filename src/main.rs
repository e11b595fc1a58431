use clap::{Parser, Subcommand};
use depot_resolver::{ConfigStore, Event, GenerateOptions, Generator};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "./data/config.json";

/// A log file at least this large is truncated at start-up
const MAX_LOG_SIZE: u64 = 2 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "depot-resolver", version, about = "Generate per-title depot unlock scripts")]
struct Cli {
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_CONFIG_PATH,
        help = "Settings file (created with defaults when missing)"
    )]
    config: PathBuf,
    #[arg(long, global = true, help = "Write logs to this file instead of stderr")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve keys and manifests for a title and write its script
    Generate {
        title_id: String,
        #[arg(long, help = "Script path (default: plug-in directory or download path)")]
        output: Option<PathBuf>,
        #[arg(long, help = "Skip dependent-item discovery")]
        no_dependencies: bool,
        #[arg(long, help = "Append setManifestid pins")]
        pin_versions: bool,
    },
    /// Manage the key dictionary cache
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },
    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum KeysCommands {
    /// Redownload the key dictionary and rewrite the cache
    Refresh,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective settings
    Show,
    /// Rewrite the settings file with defaults
    Reset,
    /// Change one setting; VALUE is parsed as JSON, falling back to a string
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.as_deref()) {
        eprintln!("failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(code = e.error_code(), error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> depot_resolver::Result<()> {
    let store = ConfigStore::new(&cli.config);

    match cli.command {
        Commands::Generate {
            title_id,
            output,
            no_dependencies,
            pin_versions,
        } => {
            let mut config = store.load_or_create().await?;
            config.apply_overrides(no_dependencies, pin_versions);
            let options = GenerateOptions::from(&config);

            let generator = Generator::new(config)?;
            let output = output.unwrap_or_else(|| generator.output_path_for(&title_id));

            let mut events = generator.subscribe();
            let progress = tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    match event {
                        Event::Progress { stage, percent, .. } => {
                            info!(?stage, percent, "progress");
                        }
                        Event::Completed { .. } | Event::Failed { .. } => break,
                    }
                }
            });

            let result = generator
                .resolve_and_generate(&title_id, &output, &options)
                .await;
            progress.await.ok();

            let summary = result?;
            for warning in &summary.warnings {
                warn!(%warning, "completed with warning");
            }
            println!("{}", summary.message);
            println!("{}", summary.output_path.display());
        }
        Commands::Keys {
            command: KeysCommands::Refresh,
        } => {
            let config = store.load_or_create().await?;
            let generator = Generator::new(config)?;
            let keys = generator.key_resolver().resolve(true).await?;
            println!("{} keys cached", keys.len());
        }
        Commands::Config { command } => {
            let config = match command {
                ConfigCommands::Show => {
                    let config = store.load_or_create().await?;
                    let missing = store.check_integrity().await?;
                    if !missing.is_empty() {
                        warn!(?missing, "settings file is missing keys");
                    }
                    config
                }
                ConfigCommands::Reset => store.reset().await?,
                ConfigCommands::Set { key, value } => {
                    let value = serde_json::from_str(&value)
                        .unwrap_or(serde_json::Value::String(value));
                    store.set(&key, value).await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let oversized = std::fs::metadata(path)
                .map(|m| m.len() >= MAX_LOG_SIZE)
                .unwrap_or(false);
            let file = OpenOptions::new()
                .create(true)
                .append(!oversized)
                .write(true)
                .truncate(oversized)
                .open(path)?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
