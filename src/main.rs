use clap::Parser;
use colored::*;
use local_rag_chat::core::maintenance;
use local_rag_chat::utils::{logger, validation::Validate};
use local_rag_chat::{
    build_loader, open_knowledge_base, CommonArgs, DocumentLoader, LocalStorage, OllamaChat,
    OllamaClient, OllamaEmbedder, RagChatbot, RagConfig, RagError,
};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(about = "Chat with your local documents through a local language model")]
struct Args {
    #[command(flatten)]
    common: CommonArgs,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.common.verbose);

    if let Err(e) = run(args).await {
        tracing::error!(
            "rag-chat failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        eprintln!("{} {}", "Error:".red().bold(), e.user_friendly_message());
        eprintln!("{} {}", "Suggestion:".yellow(), e.recovery_suggestion());
        std::process::exit(e.exit_code().max(1));
    }
}

async fn run(args: Args) -> Result<(), RagError> {
    let config = args.common.resolve_config()?;
    config.validate()?;
    tracing::debug!("Resolved config: {:?}", config);

    print_welcome();
    println!("{}", "Initializing system...".yellow());

    let client = OllamaClient::from_config(&config.ollama)?;
    client
        .ensure_models(&[
            config.ollama.chat_model.as_str(),
            config.ollama.embedding_model.as_str(),
        ])
        .await?;
    let loader = build_loader(&config);
    let mut knowledge = open_knowledge_base(&client, &config).await?;

    maintenance::update_from_directory(&mut knowledge, &loader, &config.documents.data_directory)
        .await?;

    if knowledge.is_empty() {
        return Err(RagError::NoDocuments {
            directory: config.documents.data_directory.clone(),
        });
    }

    let model = OllamaChat::new(client, config.ollama.chat_model.clone(), &config.chat);
    let mut chatbot = RagChatbot::new(
        model,
        knowledge,
        config.chat.clone(),
        config.assistant.clone(),
    );

    println!("{}\n", "Ready! Start chatting...".green());
    chat_loop(&mut chatbot, &loader, &config).await
}

fn print_welcome() {
    let rule = "=".repeat(60);
    println!("\n{}", rule.cyan());
    println!("{}", "  Company RAG Chatbot - Terminal Interface".cyan());
    println!("{}", rule.cyan());
    println!(
        "\n{}",
        "Type 'exit' to quit, 'clear' to clear conversation history".yellow()
    );
    println!(
        "{}\n",
        "Type 'reload' to reload documents from the data folder".yellow()
    );
}

fn prompt() {
    print!("{} ", "You:".blue());
    let _ = std::io::stdout().flush();
}

async fn chat_loop(
    chatbot: &mut RagChatbot<OllamaChat, OllamaEmbedder, LocalStorage>,
    loader: &DocumentLoader,
    config: &RagConfig,
) -> Result<(), RagError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!("\n\n{}\n", "Interrupted. Type 'exit' to quit.".yellow());
                continue;
            }
        };

        let Some(line) = line else {
            println!("\n{}", "Goodbye!".yellow());
            return Ok(());
        };
        let input = line.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" => {
                println!("\n{}", "Goodbye!".yellow());
                return Ok(());
            }
            "clear" => {
                chatbot.clear_memory();
                println!("{}\n", "Conversation history cleared.".yellow());
            }
            "reload" => {
                println!("{}", "Reloading documents...".yellow());
                let result = maintenance::update_from_directory(
                    chatbot.knowledge_mut(),
                    loader,
                    &config.documents.data_directory,
                )
                .await;
                match result {
                    Ok(report) => println!(
                        "{}\n",
                        format!(
                            "Documents reloaded successfully! ({} new chunks)",
                            report.chunks_added
                        )
                        .green()
                    ),
                    Err(e) => println!("\n{} {}\n", "Error:".red(), e.user_friendly_message()),
                }
            }
            _ => {
                print!("{}", "Thinking...".yellow());
                let _ = std::io::stdout().flush();

                let outcome = tokio::select! {
                    result = chatbot.generate_response(input) => Some(result),
                    _ = tokio::signal::ctrl_c() => None,
                };
                print!("\r{}\r", " ".repeat(20));

                match outcome {
                    Some(Ok(response)) => {
                        println!("\n{} {}\n", "Assistant:".green(), response);
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Response generation failed: {}", e);
                        println!("\n{} {}\n", "Error:".red(), e.user_friendly_message());
                    }
                    None => println!("\n\n{}\n", "Interrupted. Type 'exit' to quit.".yellow()),
                }
            }
        }
    }
}
