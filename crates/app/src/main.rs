use clap::{Parser, Subcommand};
use doc_chat_core::{
    AskOutcome, DocumentLoader, Embeddings, MemoryConfig, OpenAiChat, OpenAiEmbeddings,
    QaChainManager, QdrantBackend, StoreRetriever, VectorStoreManager, DEFAULT_CHAT_MODEL,
    DEFAULT_COLLECTION_NAME, DEFAULT_EMBEDDING_MODEL,
};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "doc-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Vector collection name
    #[arg(long, default_value = DEFAULT_COLLECTION_NAME)]
    collection: String,

    /// Directory holding the collection manifest
    #[arg(long, default_value = "./doc_chat_db")]
    persist_dir: PathBuf,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, default_value = "https://api.openai.com/v1")]
    api_base_url: String,

    /// API key for the embedding and chat endpoints
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Embedding model name
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    /// Chat model name
    #[arg(long, default_value = DEFAULT_CHAT_MODEL)]
    chat_model: String,

    /// Sampling temperature for answers
    #[arg(long, default_value = "0.1")]
    temperature: f32,

    /// Response length cap in tokens
    #[arg(long, default_value = "1000")]
    max_tokens: u32,

    /// Conversation turns kept verbatim before summarization
    #[arg(long, default_value = "10")]
    memory_window: usize,

    /// Approximate token budget for buffered conversation turns
    #[arg(long, default_value = "2000")]
    memory_token_budget: usize,

    /// Maximum characters per chunk
    #[arg(long, default_value = "1000")]
    chunk_size: usize,

    /// Characters of overlap between consecutive chunks
    #[arg(long, default_value = "200")]
    chunk_overlap: usize,

    /// Number of chunks retrieved per question
    #[arg(long, default_value = "4")]
    top_k: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a document file or a directory of documents.
    Ingest {
        /// File or folder to ingest (PDF, TXT, DOCX).
        #[arg(long)]
        path: PathBuf,
    },
    /// Ask a single question against the stored documents.
    Ask {
        /// The question to answer.
        #[arg(long)]
        question: String,
    },
    /// Interactive question loop with conversational memory.
    Chat,
    /// Print collection information.
    Info,
    /// Delete every stored vector and recreate an empty collection.
    ClearStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embeddings = OpenAiEmbeddings::new(&cli.api_base_url, &cli.api_key, &cli.embedding_model);
    let backend = QdrantBackend::new(&cli.qdrant_url, &cli.collection, embeddings.vector_size());
    let store = Arc::new(
        VectorStoreManager::initialize(
            backend,
            embeddings,
            &cli.persist_dir,
            &cli.collection,
            &cli.embedding_model,
        )
        .await?,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        collection = %cli.collection,
        "doc-chat boot"
    );

    match &cli.command {
        Command::Ingest { path } => {
            let loader = DocumentLoader::new(cli.chunk_size, cli.chunk_overlap)?;

            let chunks = if path.is_dir() {
                let report = loader.load_directory_report(path);
                if !report.skipped_files.is_empty() {
                    warn!(skipped = report.skipped_files.len(), "some files were skipped");
                    for skipped in &report.skipped_files {
                        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
                    }
                }
                report.chunks
            } else {
                loader.load_single_document(path)
            };

            if chunks.is_empty() {
                println!("0 chunks ingested");
                return Ok(());
            }

            let ids = store.add_documents(&chunks).await?;
            println!("{} chunks ingested into '{}'", ids.len(), cli.collection);
        }
        Command::Ask { question } => {
            let mut qa = build_chain(&cli, &store);
            let outcome = qa.ask(question).await;
            print_outcome(&outcome);
        }
        Command::Chat => {
            let mut qa = build_chain(&cli, &store);
            println!("doc-chat interactive mode. /info, /clear, /quit");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                print!("> ");
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };

                match line.trim() {
                    "" => continue,
                    "/quit" | "/exit" => break,
                    "/clear" => {
                        qa.clear_history();
                        println!("conversation history cleared");
                    }
                    "/info" => {
                        let collection = store.get_collection_info().await?;
                        let memory = qa.memory_summary();
                        println!(
                            "collection={} documents={} model={}",
                            collection.collection_name,
                            collection.document_count,
                            collection.embedding_model
                        );
                        println!(
                            "conversations={} buffered_turns={} window={}",
                            memory.total_conversations, memory.buffered_turns, memory.memory_window
                        );
                    }
                    question => {
                        let outcome = qa.ask(question).await;
                        print_outcome(&outcome);
                    }
                }
            }
        }
        Command::Info => {
            let collection = store.get_collection_info().await?;
            println!("collection: {}", collection.collection_name);
            println!("documents: {}", collection.document_count);
            println!("persist_directory: {}", collection.persist_directory);
            println!(
                "embeddings: {} ({} dimensions)",
                collection.embedding_model, collection.vector_size
            );
        }
        Command::ClearStore => {
            store.delete_collection().await?;
            println!("collection '{}' deleted and recreated empty", cli.collection);
        }
    }

    Ok(())
}

fn build_chain(
    cli: &Cli,
    store: &Arc<VectorStoreManager<QdrantBackend, OpenAiEmbeddings>>,
) -> QaChainManager<StoreRetriever<QdrantBackend, OpenAiEmbeddings>, OpenAiChat> {
    let chat = OpenAiChat::new(
        &cli.api_base_url,
        &cli.api_key,
        &cli.chat_model,
        cli.temperature,
        cli.max_tokens,
    );

    QaChainManager::new(
        Arc::clone(store).as_retriever(Some(cli.top_k)),
        chat,
        MemoryConfig {
            window: cli.memory_window,
            token_budget: cli.memory_token_budget,
        },
    )
}

fn print_outcome(outcome: &AskOutcome) {
    match outcome {
        AskOutcome::Answered {
            answer, sources, ..
        } => {
            println!("{answer}");
            for (index, source) in sources.iter().enumerate() {
                println!(
                    "[source {}] {} (score {:.4})",
                    index + 1,
                    source.file_name,
                    source.score
                );
            }
        }
        AskOutcome::Failed { message } => {
            println!("{message}");
        }
    }
}
