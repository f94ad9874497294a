use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};

use docqa_chat::chain::ConversationalChain;
use docqa_chat::llm::LlmClient;
use docqa_chat::session::Session;
use docqa_core::{DocqaConfig, OutputFormat};
use docqa_index::cache::{CacheStatus, IndexCache};
use docqa_index::embedding::EmbeddingClient;
use docqa_index::retriever::{IndexOrigin, Retriever};
use docqa_index::store::VectorStore;

const CONFIG_FILE: &str = ".docqa.toml";

#[derive(Parser)]
#[command(
    name = "docqa",
    version,
    about = "Chat with the documents in a local folder",
    long_about = "docqa indexes a folder of documents into a local vector store and answers\n\
                   questions about them with an OpenAI-compatible LLM, keeping the\n\
                   conversation as context for follow-up questions.\n\n\
                   The index is cached in the persist directory and rebuilt only when the\n\
                   content of the data directory changes.\n\n\
                   Examples:\n  \
                     docqa                          Start an interactive session\n  \
                     docqa 'What is the deadline?'  Ask a first question, then keep chatting\n  \
                     docqa index --force            Rebuild the index from scratch\n  \
                     docqa status                   Show the cache state without network calls\n  \
                     docqa init                     Write a default .docqa.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// First question to ask before prompting
    query: Option<String>,

    /// Path to configuration file (default: .docqa.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing the documents (default: data/)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory where the index is cached (default: persist)
    #[arg(long, global = true)]
    persist_dir: Option<PathBuf>,

    /// Keep the index in memory only
    #[arg(long, global = true)]
    no_persist: bool,

    /// Chat model to answer with (default: gpt-3.5-turbo)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Number of chunks retrieved per question (default: 1)
    #[arg(short, long = "top-k")]
    k: Option<usize>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for answers and status.\n\n\
                       Formats:\n  \
                         text  Answer text only (default)\n  \
                         json  One JSON object per answer with the standalone question and sources"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build or refresh the document index
    #[command(long_about = "Build or refresh the document index.\n\n\
        Fingerprints the data directory and reuses the cached index when nothing\n\
        changed. Otherwise loads, chunks, and embeds every document.\n\n\
        Examples:\n  docqa index\n  docqa index --force --data-dir docs/")]
    Index {
        /// Discard the cached index and rebuild it
        #[arg(long)]
        force: bool,
    },
    /// Show the data fingerprint and cache state
    #[command(long_about = "Show the data fingerprint and cache state.\n\n\
        Makes no network calls and modifies nothing.")]
    Status,
    /// Create a default .docqa.toml configuration file
    #[command(long_about = "Create a default .docqa.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .docqa.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# docqa configuration
# API keys may also come from API_KEY or OPENAI_API_KEY (a .env file is read).

[llm]
# model = "gpt-3.5-turbo"
# base_url = "https://api.openai.com"
# temperature = 0.7

[embedding]
# model = "text-embedding-ada-002"
# base_url = "https://api.openai.com"
# batch_size = 64

[index]
# data_dir = "data/"
# persist_dir = "persist"
# persist = true
# chunk_size = 1000
# chunk_overlap = 0

[retrieval]
# k = 1
"#;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<DocqaConfig> {
    let mut config = match &cli.config {
        Some(path) => DocqaConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                DocqaConfig::from_file(default_path)?
            } else {
                DocqaConfig::default()
            }
        }
    };

    if let Some(dir) = &cli.data_dir {
        config.index.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.persist_dir {
        config.index.persist_dir = dir.clone();
    }
    if cli.no_persist {
        config.index.persist = false;
    }
    if let Some(model) = &cli.model {
        config.llm.model = model.clone();
    }
    if let Some(k) = cli.k {
        config.retrieval.k = k;
    }

    config.validate()?;
    Ok(config)
}

fn spinner(message: &'static str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn ensure_data_dir(config: &DocqaConfig) -> Result<()> {
    let data_dir = &config.index.data_dir;
    if !data_dir.is_dir() {
        miette::bail!(miette::miette!(
            help = "Create it and add documents, or point --data-dir at an existing folder.",
            "Data directory {} does not exist",
            data_dir.display()
        ));
    }
    Ok(())
}

fn embedding_client(config: &DocqaConfig) -> Result<EmbeddingClient> {
    EmbeddingClient::with_config(&config.embedding).map_err(|e| {
        miette::miette!(
            help = "Set API_KEY or OPENAI_API_KEY (a .env file works), or add api_key under [embedding] in .docqa.toml.",
            "{e}"
        )
    })
}

async fn open_index(config: &DocqaConfig, force: bool) -> Result<(Retriever, IndexOrigin)> {
    ensure_data_dir(config)?;
    let embeddings = embedding_client(config)?;

    let pb = spinner("Loading document index...");
    let result = Retriever::open_or_build(&config.index, embeddings, force).await;
    if let Some(pb) = pb {
        match &result {
            Ok(_) => pb.finish_and_clear(),
            Err(_) => pb.finish_with_message("Failed"),
        }
    }
    Ok(result?)
}

fn report_origin(origin: &IndexOrigin, config: &DocqaConfig) {
    match origin {
        IndexOrigin::Reused => {
            tracing::info!(persist_dir = %config.index.persist_dir.display(), "reusing the existing index");
        }
        IndexOrigin::Built { stats, persisted } => {
            tracing::info!(
                documents = stats.total_documents,
                chunks = stats.total_chunks,
                persisted,
                "created new index"
            );
        }
    }
}

fn print_status(config: &DocqaConfig, format: OutputFormat) -> Result<()> {
    ensure_data_dir(config)?;
    let cache = IndexCache::from_config(&config.index);
    let data_hash = cache.data_hash()?;
    let status = cache.inspect(&data_hash)?;

    let store = if status.is_reusable() && cache.index_path().exists() {
        Some(VectorStore::open(&cache.index_path())?)
    } else {
        None
    };
    let stats = store.as_ref().map(VectorStore::stats).transpose()?;
    let built_at = store
        .as_ref()
        .map(VectorStore::built_at)
        .transpose()?
        .flatten();

    match format {
        OutputFormat::Json => {
            let stored = match &status {
                CacheStatus::Stale { stored } => Some(stored.clone()),
                _ => None,
            };
            let value = serde_json::json!({
                "dataDir": cache.data_dir(),
                "persistDir": cache.persist_dir(),
                "persist": cache.is_persistent(),
                "dataHash": data_hash,
                "storedHash": stored,
                "status": status.describe(),
                "reusable": status.is_reusable(),
                "stats": stats,
                "builtAt": built_at,
            });
            println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
        }
        OutputFormat::Text => {
            println!("Data dir:     {}", cache.data_dir().display());
            println!("Persist dir:  {}", cache.persist_dir().display());
            println!("Data hash:    {data_hash}");
            if let CacheStatus::Stale { stored } = &status {
                println!("Stored hash:  {stored}");
            }
            println!("Status:       {}", status.describe());
            if let Some(stats) = stats {
                println!(
                    "Index:        {} chunks from {} documents ({} bytes)",
                    stats.total_chunks, stats.total_documents, stats.index_size_bytes
                );
            }
            if let Some(at) = built_at {
                println!("Built at:     {}", at.to_rfc3339());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!("failed to load .env: {e}");
        }
    }

    match cli.command {
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!(miette::miette!(
                    help = "Edit the existing file or remove it first.",
                    "{CONFIG_FILE} already exists"
                ));
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "docqa", &mut std::io::stdout());
        }
        Some(Command::Status) => {
            let config = load_config(&cli)?;
            print_status(&config, cli.format)?;
        }
        Some(Command::Index { force }) => {
            let config = load_config(&cli)?;
            if !config.index.persist {
                tracing::warn!("persistence is disabled, the index will not be saved");
            }
            let (retriever, origin) = open_index(&config, force).await?;
            report_origin(&origin, &config);
            let stats = retriever.store().stats()?;

            match cli.format {
                OutputFormat::Json => {
                    let value = serde_json::json!({
                        "rebuilt": matches!(origin, IndexOrigin::Built { .. }),
                        "stats": stats,
                    });
                    println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
                }
                OutputFormat::Text => {
                    let verb = match origin {
                        IndexOrigin::Reused => "Index is up to date",
                        IndexOrigin::Built { .. } => "Indexed",
                    };
                    eprintln!(
                        "{verb}: {} chunks from {} documents",
                        stats.total_chunks, stats.total_documents
                    );
                }
            }
        }
        None => {
            let config = load_config(&cli)?;
            let llm = LlmClient::new(&config.llm).map_err(|e| {
                miette::miette!(
                    help = "Set API_KEY or OPENAI_API_KEY (a .env file works), or add api_key under [llm] in .docqa.toml.",
                    "{e}"
                )
            })?;
            tracing::info!(
                model = %llm.model(),
                data_dir = %config.index.data_dir.display(),
                persist = config.index.persist,
                persist_dir = %config.index.persist_dir.display(),
                "initializing"
            );

            let (retriever, origin) = open_index(&config, false).await?;
            report_origin(&origin, &config);

            let chain = ConversationalChain::new(llm, retriever, config.retrieval.k);
            let mut session = Session::new(&chain, cli.format)
                .with_progress(std::io::stderr().is_terminal());

            let stdin = std::io::stdin();
            session
                .run(cli.query.as_deref(), stdin.lock(), std::io::stdout())
                .await
                .wrap_err("chat session failed")?;
        }
    }

    Ok(())
}
