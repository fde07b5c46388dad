use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{info, warn};
use std::path::PathBuf;
use std::str::FromStr;

use owl_assistant::completion::ChatCompletionClient;
use owl_assistant::config::{AppConfig, EmbedderKind, StoreKind};
use owl_assistant::conversation::Conversation;
use owl_assistant::database::QdrantStore;
use owl_assistant::embeddings::{EmbeddingBackend, LocalEmbedder};
use owl_assistant::gemini::GeminiClient;
use owl_assistant::rag::RagEngine;
use owl_assistant::retrieval::Retriever;
use owl_assistant::store::{LocalStore, StoreBackend};
use owl_assistant::RagError;

/// Purdue OWL writing assistant: semantic search over writing guides
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory of .txt documents to index
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory holding the persisted index
    #[arg(long, global = true)]
    persist_dir: Option<PathBuf>,

    /// Number of passages retrieved per question
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Embedding backend: local or gemini
    #[arg(long, global = true, value_parser = EmbedderKind::from_str)]
    embedder: Option<EmbedderKind>,

    /// Vector store backend: local or qdrant
    #[arg(long, global = true, value_parser = StoreKind::from_str)]
    store: Option<StoreKind>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rebuild the index from the documents directory
    Index,
    /// Interactive chat session
    Chat,
    /// Answer a single question
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
}

type Engine = RagEngine<EmbeddingBackend, StoreBackend, ChatCompletionClient>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        if let Some(hint) = err.downcast_ref::<RagError>().and_then(RagError::hint) {
            eprintln!("{}", hint);
        }
        return Err(err);
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::from_env().context("Invalid configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(persist_dir) = cli.persist_dir {
        config.persist_dir = persist_dir;
    }
    if let Some(top_k) = cli.top_k {
        config.top_k = top_k;
    }
    if let Some(embedder) = cli.embedder {
        config.embedder = embedder;
    }
    if let Some(store) = cli.store {
        config.store = store;
    }
    config.chunking.validate()?;

    match cli.command {
        Command::Index => {
            println!("Building Purdue OWL knowledge base...");
            println!("{}", "-".repeat(40));

            if !config.data_dir.is_dir() {
                return Err(RagError::MissingDataDirectory(config.data_dir.clone()).into());
            }
            let mut engine = build_engine(&config, false)?;
            let report = engine
                .index_directory(&config.data_dir)
                .await
                .context("Failed to build the index")?;

            println!(
                "Loaded {} document(s) from {}",
                report.documents,
                config.data_dir.display()
            );
            println!("Split into {} chunks", report.chunks);
            println!("Indexed {} chunks ({} store)", report.indexed, config.store);
            println!("{}", "-".repeat(40));
            println!("Done! You can now use the chatbot.");
        }
        Command::Chat => {
            let engine = build_engine(&config, true)?;
            let mut conversation = Conversation::new();
            engine
                .run_query_loop(&mut conversation)
                .await
                .context("Error in query loop")?;
        }
        Command::Ask { question } => {
            let engine = build_engine(&config, true)?;
            let mut conversation = Conversation::new();
            let reply = engine.respond(&mut conversation, &question.join(" ")).await;

            println!("{}", reply.content);
            if !reply.sources.is_empty() {
                println!("\nSources: {}", reply.sources);
            }
        }
    }

    Ok(())
}

/// Wire the configured backends into an engine
fn build_engine(config: &AppConfig, serving: bool) -> Result<Engine> {
    let embedder = match config.embedder {
        EmbedderKind::Local => EmbeddingBackend::Local(
            LocalEmbedder::new(&config.model_cache_dir).context("Failed to load embedding model")?,
        ),
        EmbedderKind::Gemini => {
            let gemini = config
                .gemini
                .clone()
                .ok_or_else(|| RagError::config("GEMINI_API_KEY must be set to use the gemini embedder"))?;
            EmbeddingBackend::Gemini(GeminiClient::new(gemini))
        }
    };

    let store = match config.store {
        StoreKind::Local if serving => StoreBackend::Local(
            LocalStore::load(&config.persist_dir).context("Failed to read the persisted index")?,
        ),
        StoreKind::Local => StoreBackend::Local(LocalStore::empty(&config.persist_dir)),
        StoreKind::Qdrant => {
            let qdrant = config
                .qdrant
                .clone()
                .ok_or_else(|| RagError::config("QDRANT_URL must be set to use the qdrant store"))?;
            StoreBackend::Qdrant(QdrantStore::new(qdrant).context("Failed to initialize Qdrant client")?)
        }
    };

    let completion = if serving {
        match config.completion.clone() {
            Some(completion) => {
                info!("Using completion model {}", completion.model);
                Some(ChatCompletionClient::new(completion)?)
            }
            None => {
                warn!("OPENAI_API_KEY not set; answers will show retrieved passages only");
                None
            }
        }
    } else {
        None
    };

    Ok(RagEngine::new(
        Retriever::new(embedder, store),
        completion,
        config.chunking,
        config.top_k,
    ))
}
