use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chat_relay::conversation::{Conversation, RelayClient, run_terminal};
use chat_relay::llm::{ApiKey, DEFAULT_API_BASE, OpenAiClient};
use chat_relay::relay::{DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, Relay, RelayConfig};
use chat_relay::server::Server;

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the chat page and the /api/generate relay
    Serve(ServeArgs),

    /// Chat with a running relay from the terminal
    Chat {
        /// Relay root URL
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,
    },
}

#[derive(Args)]
struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind: String,

    /// Provider credential; requests fail with a configuration error when unset
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system_prompt: String,

    #[arg(long, default_value_t = 0.0)]
    temperature: f32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Chat { url } => chat(&url).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let api_key = args.api_key.and_then(ApiKey::new);
    if api_key.is_none() {
        warn!("no OPENAI_API_KEY configured; every generate request will fail until one is set");
    }

    let provider = OpenAiClient::new(&args.api_base).context("building provider client")?;
    info!(url = provider.url(), model = %args.model, "relaying completions");

    let config = RelayConfig {
        api_key,
        model: args.model,
        system_prompt: args.system_prompt,
        temperature: args.temperature,
    };
    let relay = Arc::new(Relay::new(config, Arc::new(provider)));
    let router = Arc::new(chat_relay::app::router(relay));

    let server = Server::bind(&args.bind).await?;
    info!("open http://{} in a browser to chat", server.local_addr());

    server
        .run_until(
            move |req| {
                let router = Arc::clone(&router);
                async move { router.route(req).await }
            },
            async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            },
        )
        .await?;
    Ok(())
}

async fn chat(url: &str) -> Result<()> {
    let transport = RelayClient::new(url).context("building relay client")?;
    let mut conversation = Conversation::new(Arc::new(transport));

    println!("Chatting via {url}. Enter sends, Ctrl-D ends the session.");
    let input = BufReader::new(tokio::io::stdin());
    run_terminal(&mut conversation, input, &mut std::io::stdout()).await?;
    Ok(())
}
