use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mediadex::{IndexConfig, MediaRef, SearchRequest};
use std::path::PathBuf;

/// Admin tool for the media file index.
#[derive(Parser, Debug)]
#[command(name = "mediadex", version, about)]
struct Cli {
    /// Config file (defaults to the platform config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index one media item by its native file id.
    Save {
        file_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long, default_value_t = 0)]
        size: u64,
    },
    /// Search file names (and captions when enabled in config).
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Results per page; defaults to `max_results` from config.
        #[arg(long)]
        limit: Option<usize>,
        /// Only keep names containing this language tag.
        #[arg(long)]
        lang: Option<String>,
    },
    /// Delete every file whose name matches the query.
    Delete { query: String },
    /// Look up a file by its stored id.
    Get { id: String },
    /// Record counts per store.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    mediadex::logging::init("info");
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(IndexConfig::default_path);
    let config = IndexConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let index = config.open().context("Failed to open file stores")?;

    let output = match cli.command {
        Command::Save {
            file_id,
            name,
            caption,
            size,
        } => {
            let media = MediaRef {
                file_id,
                file_name: name,
                caption,
                file_size: size,
            };
            let outcome = index.save(&media).await.context("Failed to save file")?;
            serde_json::to_value(outcome)?
        }
        Command::Search {
            query,
            offset,
            limit,
            lang,
        } => {
            let mut request = SearchRequest::new(query)
                .offset(offset)
                .page_size(limit.unwrap_or(config.max_results))
                .match_caption(config.use_caption_filter);
            if let Some(lang) = lang {
                request = request.language(lang);
            }
            let page = index.search(&request).await.context("Search failed")?;
            serde_json::to_value(page)?
        }
        Command::Delete { query } => {
            let deleted = index
                .delete_matching(&query)
                .await
                .context("Delete failed")?;
            serde_json::json!({ "deleted": deleted })
        }
        Command::Get { id } => {
            let record = index.fetch_by_id(&id).await.context("Lookup failed")?;
            serde_json::to_value(record)?
        }
        Command::Stats => serde_json::to_value(index.counts().await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
