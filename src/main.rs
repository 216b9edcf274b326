//! # Image Studio - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione e autenticazione del token
//! - Esecuzione del comando e stampa del risultato (testo o JSON)
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, su stderr con `--json`)
//! 3. Carica la configurazione (`~/.image-studio/config.json` se non specificata)
//! 4. Risolve il token in un proprietario
//! 5. Esegue il comando sul service
//!
//! ## Esempio di utilizzo:
//! ```bash
//! image-studio token alice
//! export IMAGE_STUDIO_TOKEN=...
//! image-studio upload photo.jpg
//! image-studio process <ID> --width 800 --format png --quality 90
//! image-studio history --page 2 --json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use image_studio::{
    format_size, parse_record_id, Config, Filter, ImageService, JsonMessage, OutputFormat,
    OwnerId, ProcessingOptions, Quality, ResizeTarget, TokenAuthenticator,
};

const TOKEN_ENV: &str = "IMAGE_STUDIO_TOKEN";

#[derive(Parser)]
#[command(name = "image-studio")]
#[command(about = "Upload, transform and track images")]
struct Args {
    /// Config file (default: ~/.image-studio/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bearer token (falls back to IMAGE_STUDIO_TOKEN)
    #[arg(long, global = true)]
    token: Option<String>,

    /// Output results as JSON for programmatic use
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload an image
    Upload {
        file: PathBuf,
    },

    /// Process an uploaded image
    Process {
        id: String,

        /// Target width (height follows the aspect ratio if omitted)
        #[arg(long)]
        width: Option<u32>,

        /// Target height (width follows the aspect ratio if omitted)
        #[arg(long)]
        height: Option<u32>,

        /// Clockwise rotation in degrees
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        rotate: i32,

        /// Output format (jpeg or png)
        #[arg(long, default_value = "jpeg")]
        format: String,

        /// Encoder quality (1-100)
        #[arg(long, default_value = "85", allow_hyphen_values = true)]
        quality: i32,

        /// Filter to apply (grayscale, blur, sepia); repeatable
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Flatten transparency onto white
        #[arg(long)]
        remove_background: bool,

        /// Sharpen the image
        #[arg(long)]
        enhance: bool,
    },

    /// List uploaded images, newest first
    History {
        #[arg(long, default_value = "1")]
        page: usize,

        /// Page size (0 = configured default)
        #[arg(long, default_value = "0")]
        limit: usize,
    },

    /// Delete an image and its processed output
    Delete {
        id: String,
    },

    /// Show aggregate statistics
    Stats,

    /// Save the latest processed output to a file
    Export {
        id: String,
        path: PathBuf,
    },

    /// Issue a new token for an owner and store its digest in the config
    Token {
        owner: String,
    },
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    // Con --json stdout è riservato ai messaggi JSON
    if json {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

/// Spinner for indeterminate progress
fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();

    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }

    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    spinner
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.json)?;

    let json = args.json;
    match run(args).await {
        Ok(message) => {
            if json {
                message.emit();
            } else {
                print_human(&message);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                JsonMessage::from_error(&e).emit();
            }
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<JsonMessage> {
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::from_file(&config_path)
        .await
        .with_context(|| format!("Could not load config from {}", config_path.display()))?;

    match args.command {
        Command::Token { owner } => issue_token(&mut config, &config_path, &owner).await,
        command => {
            let service = ImageService::open(&config).await?;
            let credential = args
                .token
                .or_else(|| std::env::var(TOKEN_ENV).ok())
                .unwrap_or_default();
            let owner = service.authenticate(&credential).await?;
            execute(&service, &owner, command, args.json).await
        }
    }
}

async fn issue_token(config: &mut Config, config_path: &Path, owner: &str) -> Result<JsonMessage> {
    let owner = OwnerId::new(owner.trim());
    if owner.as_str().is_empty() {
        return Err(anyhow::anyhow!("Owner must not be empty"));
    }

    let token = TokenAuthenticator::issue_token(config, owner.clone());
    config.save_to_file(config_path).await?;
    info!("🔑 Token issued for {}, config saved to {}", owner, config_path.display());
    Ok(JsonMessage::Token { owner, token })
}

async fn execute(service: &ImageService, owner: &OwnerId, command: Command, json: bool) -> Result<JsonMessage> {
    let message = match command {
        Command::Upload { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Could not read {}", file.display()))?;
            let filename = file_name(&file);
            JsonMessage::Upload(service.upload(owner, &filename, bytes).await?)
        }

        Command::Process {
            id,
            width,
            height,
            rotate,
            format,
            quality,
            filters,
            remove_background,
            enhance,
        } => {
            let id = parse_record_id(&id)?;
            let options = ProcessingOptions {
                enhance,
                filters: filters.iter().map(|f| Filter::parse(f)).collect(),
                resize: (width.is_some() || height.is_some()).then_some(ResizeTarget { width, height }),
                rotate,
                remove_background,
                format: OutputFormat::parse(&format),
                quality: Quality::new(quality),
            };

            let progress = (!json).then(|| spinner(&format!("Processing {}", id)));
            let result = service.process(id, owner, options).await;
            if let Some(progress) = progress {
                progress.finish_and_clear();
            }
            JsonMessage::Process(result?)
        }

        Command::History { page, limit } => JsonMessage::History(service.history(owner, page, limit).await?),

        Command::Delete { id } => {
            let id = parse_record_id(&id)?;
            service.delete(id, owner).await?;
            JsonMessage::Delete { id }
        }

        Command::Stats => JsonMessage::Stats(service.stats(owner).await?),

        Command::Export { id, path } => {
            let id = parse_record_id(&id)?;
            let (facet, bytes) = service.processed_bytes(id, owner).await?;
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Could not write {}", path.display()))?;
            JsonMessage::Export {
                id,
                path,
                format: facet.format,
                size: bytes.len() as u64,
            }
        }

        Command::Token { owner } => {
            return Err(anyhow::anyhow!("Tokens for {} are issued without authentication", owner));
        }
    };

    Ok(message)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string())
}

fn print_human(message: &JsonMessage) {
    match message {
        JsonMessage::Upload(summary) => info!(
            "📥 Uploaded {} ({}x{} {}, {})",
            summary.id,
            summary.width,
            summary.height,
            summary.format,
            format_size(summary.size)
        ),
        JsonMessage::Process(summary) => info!(
            "✅ {}: {} -> {} ({}% saved) {} {}x{}",
            summary.id,
            format_size(summary.original_size),
            format_size(summary.processed_size),
            summary.compression_ratio,
            summary.format,
            summary.width,
            summary.height
        ),
        JsonMessage::History(page) => {
            for entry in &page.entries {
                let processed = entry
                    .processed
                    .as_ref()
                    .map(|p| format!("{} {}x{} {}", p.format, p.width, p.height, format_size(p.size)))
                    .unwrap_or_else(|| "-".to_string());
                info!(
                    "{}  {:<10} {}  {} ({}x{} {}) -> {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.status.as_str(),
                    entry.id,
                    entry.original_name,
                    entry.width,
                    entry.height,
                    format_size(entry.original_size),
                    processed
                );
            }
            let p = &page.pagination;
            info!("Page {}/{} ({} images)", p.page, p.pages.max(1), p.total);
        }
        JsonMessage::Delete { id } => info!("🗑️  Deleted {}", id),
        JsonMessage::Stats(stats) => info!("📊 {}", stats.format_summary()),
        JsonMessage::Export { id, path, format, size } => info!(
            "📤 Exported {} as {} ({}) to {}",
            id,
            format,
            format_size(*size),
            path.display()
        ),
        JsonMessage::Token { owner, token } => {
            // Stampato sempre, indipendentemente dal filtro dei log
            println!("Token for {}: {}", owner, token);
        }
        JsonMessage::Error { message, .. } => tracing::error!("{}", message),
    }
}
