use clap::{Parser, Subcommand};
use corpus_qa::Result;
use corpus_qa::commands::{ask, clear, ingest, show_config, show_stats};
use corpus_qa::config::{Config, get_config_dir};
use corpus_qa::pipeline::AppContext;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "corpus-qa")]
#[command(about = "A retrieval-augmented question answering system over a text corpus")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a text file or a directory of .txt/.md files
    Ingest {
        /// File or directory to ingest
        path: PathBuf,
        /// Source id to record for a single file, e.g. "book://shiva_purana"
        #[arg(long)]
        source: Option<String>,
    },
    /// Ask a question against the indexed corpus
    Ask {
        /// The question to answer
        question: String,
        /// Stream the answer as it is generated
        #[arg(long)]
        stream: bool,
    },
    /// Show index and cache statistics
    Stats,
    /// Delete all indexed chunks and cached responses
    Clear,
    /// Show the current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(get_config_dir()?)?;

    match cli.command {
        Commands::Ingest { path, source } => {
            let ctx = AppContext::initialize(config).await?;
            ingest(&ctx, &path, source).await?;
        }
        Commands::Ask { question, stream } => {
            let ctx = AppContext::initialize(config).await?;
            ask(&ctx, &question, stream).await?;
        }
        Commands::Stats => {
            let ctx = AppContext::initialize(config).await?;
            show_stats(&ctx).await?;
        }
        Commands::Clear => {
            let ctx = AppContext::initialize(config).await?;
            clear(&ctx).await?;
        }
        Commands::Config => {
            show_config(&config)?;
        }
    }

    Ok(())
}
