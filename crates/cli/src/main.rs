mod commands;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use lotreg_core::LotTypeRegistry;
use lotreg_engine::{EngineConfig, RevisionEngine, SequenceAllocator};
use lotreg_storage::FileStore;
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Configuration file read when `--config` is not given.
const DEFAULT_CONFIG: &str = "lotreg.toml";

pub(crate) const EXIT_ERROR: i32 = 1;
pub(crate) const EXIT_CONFLICT: i32 = 2;
pub(crate) const EXIT_VALIDATION: i32 = 3;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Lot registry: identifier allocation and revision-tracked lot storage.
#[derive(Parser)]
#[command(
    name = "lotreg",
    version,
    about = "Lot registry: identifier allocation and revision-tracked lot storage"
)]
struct Cli {
    /// Configuration file (default: ./lotreg.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Document store directory, overriding the configuration
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Server id, overriding the configuration
    #[arg(long, global = true)]
    server_id: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate lot identifiers
    Allocate {
        /// Day to allocate for (YYYY-MM-DD). Default: today (UTC)
        #[arg(long)]
        date: Option<String>,
        /// Number of identifiers to allocate
        #[arg(long, default_value = "1")]
        count: u32,
    },

    /// Create a lot from a JSON file under a freshly allocated identifier
    Create {
        /// Path to the lot data JSON file
        data: PathBuf,
        /// Author recorded in the revision history
        #[arg(long, default_value = "cli")]
        author: String,
    },

    /// Merge a JSON file into an existing lot and save it
    Patch {
        /// Lot identifier
        id: String,
        /// Path to the partial lot data JSON file
        data: PathBuf,
        /// Author recorded in the revision history
        #[arg(long, default_value = "cli")]
        author: String,
        /// Leave dateModified untouched
        #[arg(long)]
        keep_modified: bool,
    },

    /// Show a stored lot
    Show {
        /// Lot identifier
        id: String,
        /// Comma-separated fields for a listing view
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
    },

    /// Show the revision history of a lot
    History {
        /// Lot identifier
        id: String,
    },
}

/// Everything a command needs: resolved configuration and the opened store.
pub(crate) struct Context {
    pub config: EngineConfig,
    pub store: Arc<FileStore>,
    pub registry: Arc<LotTypeRegistry>,
    pub output: OutputFormat,
}

impl Context {
    pub fn allocator(&self) -> SequenceAllocator<Arc<FileStore>> {
        SequenceAllocator::from_config(self.store.clone(), &self.config.allocator)
    }

    pub fn engine(&self) -> RevisionEngine<Arc<FileStore>> {
        RevisionEngine::new(self.store.clone(), self.registry.clone())
    }
}

/// A failed command: message, optional structured detail, exit status.
#[derive(Debug)]
pub(crate) struct CliError {
    pub code: i32,
    pub message: String,
    pub detail: Option<Value>,
}

impl CliError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: EXIT_ERROR,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = code;
        self
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let output = cli.output;
    let ctx = match build_context(&cli) {
        Ok(ctx) => ctx,
        Err(e) => {
            report_error(&e, output);
            process::exit(e.code);
        }
    };
    let command = cli.command;

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&CliError::new(format!("failed to start runtime: {e}")), output);
            process::exit(EXIT_ERROR);
        }
    };

    let result = rt.block_on(async {
        match command {
            Commands::Allocate { date, count } => {
                commands::allocate::run(&ctx, date.as_deref(), count).await
            }
            Commands::Create { data, author } => commands::create::run(&ctx, &data, &author).await,
            Commands::Patch {
                id,
                data,
                author,
                keep_modified,
            } => commands::patch::run(&ctx, &id, &data, &author, keep_modified).await,
            Commands::Show { id, fields } => commands::show::run(&ctx, &id, &fields).await,
            Commands::History { id } => commands::history::run(&ctx, &id).await,
        }
    });

    if let Err(e) = result {
        report_error(&e, output);
        process::exit(e.code);
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("lotreg={level},lotreg_engine={level},lotreg_storage={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<EngineConfig, CliError> {
    let loaded = match explicit {
        Some(path) => EngineConfig::load(path),
        None if Path::new(DEFAULT_CONFIG).exists() => EngineConfig::load(Path::new(DEFAULT_CONFIG)),
        None => Ok(EngineConfig::default()),
    };
    loaded.map_err(|e| CliError::new(e.to_string()))
}

fn build_context(cli: &Cli) -> Result<Context, CliError> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(store) = &cli.store {
        config.store.path = store.clone();
    }
    if let Some(server_id) = &cli.server_id {
        config.allocator.server_id = server_id.clone();
    }
    tracing::debug!(store = %config.store.path.display(), server_id = %config.allocator.server_id, "configuration loaded");

    let store = FileStore::open(&config.store.path).map_err(|e| CliError::new(e.to_string()))?;
    let registry = LotTypeRegistry::with_defaults()
        .map_err(|e| CliError::new(format!("internal error: {e}")))?;

    Ok(Context {
        config,
        store: Arc::new(store),
        registry: Arc::new(registry),
        output: cli.output,
    })
}

pub(crate) fn report_error(err: &CliError, output: OutputFormat) {
    match output {
        OutputFormat::Text => {
            eprintln!("error: {}", err.message);
            if let Some(Value::Object(fields)) = &err.detail {
                for (field, messages) in fields {
                    eprintln!("  {field}: {}", render_messages(messages));
                }
            }
        }
        OutputFormat::Json => {
            let mut body = serde_json::Map::new();
            body.insert("error".to_string(), Value::String(err.message.clone()));
            if let Some(detail) = &err.detail {
                body.insert("fields".to_string(), detail.clone());
            }
            eprintln!("{}", Value::Object(body));
        }
    }
}

fn render_messages(messages: &Value) -> String {
    match messages {
        Value::Array(items) => items
            .iter()
            .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

pub(crate) fn print_json(value: &Value) {
    let pretty = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("serialization error: {}", e));
    println!("{}", pretty);
}
