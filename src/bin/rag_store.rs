use clap::{Parser, Subcommand};
use colored::*;
use local_rag_chat::adapters::ollama::require_installed;
use local_rag_chat::core::maintenance;
use local_rag_chat::domain::model::{StoreStats, StoreStatus};
use local_rag_chat::utils::{logger, validation::Validate};
use local_rag_chat::{
    build_loader, open_knowledge_base, rebuild_knowledge_base, CommonArgs, LocalKnowledgeBase,
    OllamaClient, RagConfig, RagError,
};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rag-store")]
#[command(about = "Vector store management utility")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show vector store statistics
    Stats,
    /// Add a single document
    Add {
        /// Path to the document file
        file: PathBuf,
    },
    /// Rebuild the vector store from scratch
    Rebuild {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Index new documents from the data directory
    Update,
    /// Test retrieval with a query
    Test {
        /// Query to test
        query: String,
        /// Number of results to fetch
        #[arg(short, long, default_value = "5")]
        k: usize,
        /// Minimum relevance score
        #[arg(long, default_value = "0.7")]
        threshold: f32,
    },
    /// Check that the chat and embedding models are installed
    Check,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.common.verbose);
    }

    if let Err(e) = run(args).await {
        tracing::error!(
            "rag-store failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("{} {}", "Error:".red().bold(), e.user_friendly_message());
        eprintln!("{} {}", "Suggestion:".yellow(), e.recovery_suggestion());

        let exit_code = e.exit_code();
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(args: Args) -> Result<(), RagError> {
    let config = args.common.resolve_config()?;
    config.validate()?;

    let client = OllamaClient::from_config(&config.ollama)?;

    match args.command {
        Command::Stats => {
            let knowledge = open_knowledge_base(&client, &config).await?;
            print_stats(&knowledge.stats());
        }
        Command::Add { file } => add_document(&client, &config, file).await?,
        Command::Rebuild { yes } => {
            if yes || confirm("This will delete the existing vectorstore. Continue? (y/n): ")? {
                rebuild(&client, &config).await?;
            } else {
                println!("Operation cancelled");
            }
        }
        Command::Update => update(&client, &config).await?,
        Command::Test {
            query,
            k,
            threshold,
        } => {
            let knowledge = open_knowledge_base(&client, &config).await?;
            test_retrieval(&knowledge, &query, k, threshold).await?;
        }
        Command::Check => check_models(&client, &config).await?,
    }

    Ok(())
}

fn print_stats(stats: &StoreStats) {
    println!("\n{}", "=== Vectorstore Statistics ===".cyan());
    println!("Status: {}", stats.status);

    if stats.status == StoreStatus::Initialized {
        println!("Total chunks: {}", stats.total_chunks);
        println!("Unique sources: {}", stats.unique_sources);
        println!("Embedding model: {}", stats.embedding_model);
        if let Some(dimension) = stats.dimension {
            println!("Dimension: {}", dimension);
        }
        if let Some(updated_at) = stats.updated_at {
            println!("Last updated: {}", updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        if !stats.sources.is_empty() {
            println!("\n{}", "Sources:".yellow());
            for source in &stats.sources {
                println!("  • {}", source);
            }
        }
    }
}

fn confirm(question: &str) -> Result<bool, RagError> {
    print!("{}", question.yellow());
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

async fn add_document(
    client: &OllamaClient,
    config: &RagConfig,
    file: PathBuf,
) -> Result<(), RagError> {
    println!("{}", format!("Loading document: {}", file.display()).yellow());

    let mut knowledge = open_knowledge_base(client, config).await?;
    let report = maintenance::add_file(&mut knowledge, &build_loader(config), &file).await?;
    println!("Document split into {} chunks", report.chunks_found);
    println!(
        "{}",
        format!("✓ Added {} new chunks to vectorstore", report.chunks_added).green()
    );
    Ok(())
}

async fn rebuild(client: &OllamaClient, config: &RagConfig) -> Result<(), RagError> {
    println!("{}", "Rebuilding vectorstore from scratch...".yellow());

    let (knowledge, report) = rebuild_knowledge_base(client, config).await?;
    println!(
        "Deleted existing vectorstore at {}",
        config.store.persist_directory
    );

    if report.found_nothing() {
        println!("{}", "No documents found to index".red());
        return Ok(());
    }

    println!(
        "{}",
        format!("✓ Vectorstore rebuilt with {} chunks", report.chunks_added).green()
    );
    print_stats(&knowledge.stats());
    Ok(())
}

async fn update(client: &OllamaClient, config: &RagConfig) -> Result<(), RagError> {
    println!("{}", "Checking for new documents...".yellow());

    let mut knowledge = open_knowledge_base(client, config).await?;
    let report = maintenance::update_from_directory(
        &mut knowledge,
        &build_loader(config),
        &config.documents.data_directory,
    )
    .await?;

    if report.found_nothing() {
        println!("{}", "No documents found in data directory".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("✓ Update complete ({} new chunks)", report.chunks_added).green()
    );
    print_stats(&knowledge.stats());
    Ok(())
}

async fn test_retrieval(
    knowledge: &LocalKnowledgeBase,
    query: &str,
    k: usize,
    threshold: f32,
) -> Result<(), RagError> {
    println!("\n{}", format!("Testing retrieval for: '{}'", query).cyan());

    let results = knowledge
        .similarity_search_with_relevance_scores(query, k, threshold)
        .await?;

    if results.is_empty() {
        println!("{}", "No documents found above relevance threshold".red());
        return Ok(());
    }

    println!(
        "\n{}",
        format!("Found {} relevant documents:", results.len()).green()
    );
    for (i, result) in results.iter().enumerate() {
        let preview: String = result.chunk.content.chars().take(200).collect();
        println!(
            "\n{}",
            format!("Document {} (Score: {:.3}):", i + 1, result.score).yellow()
        );
        println!("Source: {}", result.chunk.source);
        println!("Chunk ID: {}", result.chunk.id);
        println!("Content preview: {}...", preview);
    }
    Ok(())
}

async fn check_models(client: &OllamaClient, config: &RagConfig) -> Result<(), RagError> {
    println!(
        "{}",
        format!("Checking models at {}...", client.base_url()).yellow()
    );

    let statuses = client
        .model_status(&[
            config.ollama.chat_model.as_str(),
            config.ollama.embedding_model.as_str(),
        ])
        .await?;
    for (role, status) in ["chat", "embedding"].iter().zip(&statuses) {
        if status.installed {
            println!("{} {} model {}", "✓".green(), role, status.name);
        } else {
            println!(
                "{} {} model {} (run `ollama pull {}`)",
                "✗".red(),
                role,
                status.name,
                status.name
            );
        }
    }

    require_installed(&statuses)
}
