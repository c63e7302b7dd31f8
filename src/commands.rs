use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::pipeline::{AppContext, StreamEvent};
use crate::{CorpusError, Result};

/// Ingest a text file, or every `.txt`/`.md` file in a directory, into the
/// knowledge index.
#[inline]
pub async fn ingest(ctx: &AppContext, path: &Path, source: Option<String>) -> Result<()> {
    let files = collect_text_files(path)?;
    if files.is_empty() {
        println!("No .txt or .md files found at {}", path.display());
        return Ok(());
    }

    if source.is_some() && files.len() > 1 {
        warn!("--source applies to a single file; using per-file sources for the directory");
    }

    let bar = ProgressBar::new(files.len() as u64).with_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
            .map_err(|e| CorpusError::Other(e.into()))?,
    );

    let mut total_chunks = 0;
    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        bar.set_message(name);

        let text = std::fs::read_to_string(file)?;
        let file_source = match (&source, files.len()) {
            (Some(source), 1) => source.clone(),
            _ => default_source(file),
        };

        total_chunks += ctx.index.add(&text, &file_source).await;
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "Ingested {} chunks from {} file(s) into '{}'",
        total_chunks,
        files.len(),
        ctx.config.retrieval.collection_name
    );
    Ok(())
}

/// Ask a question, either as one response or streamed delta by delta.
#[inline]
pub async fn ask(ctx: &AppContext, question: &str, stream: bool) -> Result<()> {
    if stream {
        let mut rx = ctx.pipeline.ask_stream(question).await;
        let mut stdout = std::io::stdout();
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::Delta { chunk } => {
                    print!("{}", chunk);
                    stdout.flush()?;
                }
                StreamEvent::Done { sources, .. } => {
                    println!();
                    print_sources(&sources);
                }
                StreamEvent::Error { error } => {
                    println!();
                    return Err(CorpusError::Generation(error));
                }
            }
        }
    } else {
        let answer = ctx.pipeline.ask(question).await?;
        println!("{}", answer.response);
        print_sources(&answer.sources);
    }
    Ok(())
}

/// Print index and cache statistics as JSON.
#[inline]
pub async fn show_stats(ctx: &AppContext) -> Result<()> {
    let stats = serde_json::json!({
        "index": ctx.index.stats().await?,
        "cache": ctx.cache.stats(),
    });
    let rendered = serde_json::to_string_pretty(&stats).map_err(|e| CorpusError::Other(e.into()))?;
    println!("{}", rendered);
    Ok(())
}

/// Drop all indexed chunks and cached responses.
#[inline]
pub async fn clear(ctx: &AppContext) -> Result<()> {
    ctx.index.clear().await?;
    ctx.cache.clear();
    info!("Cleared index and response cache");
    println!("Knowledge index and response cache cleared");
    Ok(())
}

/// Print the active configuration.
#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    println!("Provider:");
    println!("  Provider: {}", config.provider.provider);
    println!("  Groq model: {}", config.provider.groq_model);
    println!("  Gemini model: {}", config.provider.gemini_model);
    println!("  Timeout: {}s", config.provider.timeout_seconds);

    println!("Embedding:");
    match config.embedding.url() {
        Ok(url) => println!("  URL: {}", url),
        Err(e) => println!("  URL: invalid ({})", e),
    }
    println!("  Model: {}", config.embedding.model);
    println!("  Batch size: {}", config.embedding.batch_size);
    println!("  Dimension: {}", config.embedding.embedding_dimension);

    println!("Retrieval:");
    println!("  Collection: {}", config.retrieval.collection_name);
    println!("  Chunk size: {}", config.retrieval.chunk_size);
    println!("  Chunk overlap: {}", config.retrieval.chunk_overlap);
    println!("  Search results: {}", config.retrieval.search_results);
    println!(
        "  Relevance threshold: {}",
        config.retrieval.relevance_threshold
    );

    println!("Cache:");
    println!("  Max entries: {}", config.cache.max_size);
    println!("  TTL: {}s", config.cache.ttl_seconds);

    Ok(())
}

fn print_sources(sources: &[String]) {
    if !sources.is_empty() {
        println!();
        println!("Sources:");
        for source in sources {
            println!("  - {}", source);
        }
    }
}

/// Source id for a file ingested without an explicit `--source` override.
fn default_source(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());
    format!("book://{}", stem)
}

fn collect_text_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(CorpusError::Config(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .is_some_and(|ext| ext == "txt" || ext == "md")
        })
        .collect();
    files.sort();
    Ok(files)
}
