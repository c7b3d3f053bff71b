use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use eliza::{
    chat, constants, default_knowledge, proxy, AssistantConfig, ConversationContext, ElizaAssistant,
    GatewayClient, KeyManager, KnowledgeBase, UserContext,
};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the gateway chat proxies over HTTP.
    Serve {
        #[arg(long, default_value_t = 8787, env = "ELIZA_PORT", help = "Port for the proxy server.")]
        port: u16,
        #[arg(long, env = "GATEWAY_URL", help = "Chat completion endpoint of the AI gateway.")]
        gateway_url: Option<String>,
        #[arg(long, env = "AI_GATEWAY_API_KEY", hide_env_values = true, help = "API key for the AI gateway.")]
        gateway_key: Option<String>,
    },
    /// Chat with Eliza in the terminal.
    Chat {
        #[arg(long, help = "JSON file with extra knowledge entries.")]
        knowledge: Option<PathBuf>,
        #[arg(long, help = "Your display name.")]
        name: Option<String>,
        #[arg(long, help = "Treat the session as a DAO founder.")]
        founder: bool,
    },
    /// Ask Eliza a single question and print the answer.
    Ask {
        prompt: String,
        #[arg(long, help = "JSON file with extra knowledge entries.")]
        knowledge: Option<PathBuf>,
    },
    /// List knowledge entries, or those matching a query.
    Knowledge {
        #[arg(long, help = "JSON file with extra knowledge entries.")]
        knowledge: Option<PathBuf>,
        #[arg(long, help = "Only show entries relevant to this text.")]
        query: Option<String>,
    },
}

fn load_knowledge(path: Option<PathBuf>) -> Result<KnowledgeBase> {
    match path {
        Some(path) => {
            let kb = KnowledgeBase::from_json_file(&path)
                .with_context(|| format!("Failed to load knowledge from {}", path.display()))?;
            info!(entries = kb.len(), "Loaded knowledge file");
            Ok(kb)
        }
        None => Ok(default_knowledge()),
    }
}

fn build_assistant(knowledge: KnowledgeBase) -> ElizaAssistant {
    let keys = Arc::new(KeyManager::from_env());
    if keys.is_empty() {
        error!("GEMINI_API_KEY is not set; Eliza will not be able to answer");
    }
    ElizaAssistant::new(AssistantConfig::default(), keys, knowledge)
}

fn base_context() -> ConversationContext {
    ConversationContext {
        system_version: constants::ELIZA_SYSTEM_VERSION.clone(),
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,eliza=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            gateway_url,
            gateway_key,
        } => {
            let url = gateway_url.unwrap_or_else(|| constants::GATEWAY_URL.clone());
            info!(%url, "Starting Eliza proxies on port {}...", port);

            let state = proxy::ProxyState::new(GatewayClient::new(url, gateway_key));
            let server = tokio::spawn(proxy::start_proxy_server(port, state));

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down...");
                }
                res = server => {
                    match res {
                        Ok(Ok(())) => info!("Proxy server stopped."),
                        Ok(Err(e)) => error!("Proxy server failed: {:?}", e),
                        Err(e) if e.is_panic() => error!("Proxy server task panicked: {:?}", e),
                        Err(e) => error!("Proxy server task failed: {:?}", e),
                    }
                }
            }
            info!("Shutdown complete.");
        }
        Commands::Chat {
            knowledge,
            name,
            founder,
        } => {
            let assistant = build_assistant(load_knowledge(knowledge)?);
            let mut context = base_context();
            context.user_context = Some(UserContext {
                name,
                is_founder: founder,
                ..Default::default()
            });

            let stdin = std::io::stdin();
            let turns = chat::run_chat(&assistant, &mut context, stdin.lock(), std::io::stdout())
                .await
                .context("Chat session failed")?;
            info!(turns, "Chat session finished.");
        }
        Commands::Ask { prompt, knowledge } => {
            let assistant = build_assistant(load_knowledge(knowledge)?);
            let reply = assistant
                .generate_response(&prompt, &base_context())
                .await
                .context("Eliza could not answer")?;
            println!("{}", reply);
        }
        Commands::Knowledge { knowledge, query } => {
            let kb = load_knowledge(knowledge)?;
            let entries: Vec<_> = match query.as_deref() {
                Some(q) => kb.relevant(q),
                None => kb.entries().iter().collect(),
            };
            for entry in entries {
                println!("[{} / {}] {}", entry.category, entry.topic, entry.content);
            }
        }
    }

    Ok(())
}
