use anyhow::Result;
use clap::Parser;
use solvinger_relay::config::Config;
use solvinger_relay::relay::{ChatRelay, ChatRequest, Message, Role};
use solvinger_relay::server;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "solvinger-relay",
    about = "Chat relay in front of the Gemini generateContent API"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Serve POST /gemini/chat
    Serve {
        /// Path to config file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Port override (beats PORT and the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Gemini model override
        #[arg(long)]
        model: Option<String>,
    },

    /// Relay a single user message and print the reply JSON
    Ask {
        /// Message text
        #[arg(required = true)]
        text: Vec<String>,

        /// Path to config file
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,

        /// Gemini model override
        #[arg(long)]
        model: Option<String>,
    },
}

/// Config file if present, defaults otherwise, then env overrides.
fn load_config(path: &Path, model: Option<String>) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };
    config.apply_env()?;
    if let Some(model) = model {
        config.gemini.model = model;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "solvinger_relay=info,tower_http=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            port,
            model,
        } => {
            let mut cfg = load_config(&config, model)?;
            if let Some(port) = port {
                cfg.server.port = port;
            }
            server::serve(cfg).await
        }
        Command::Ask {
            text,
            config,
            model,
        } => {
            let cfg = load_config(&config, model)?;
            cfg.validate()?;
            let relay = ChatRelay::from_config(&cfg)?;
            let request = ChatRequest::new(vec![Message {
                role: Role::User,
                text: text.join(" "),
            }])?;
            let reply = relay.handle(&request).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
            Ok(())
        }
    }
}
