use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use careline_api::{ApiClient, ReqwestTransport};
use careline_bot::{BotOptions, QuestionnaireBot, METADATA_ANSWER, METADATA_END};
use careline_bridge::{connect_bridge, SessionCredentials};
use careline_config::{load as load_config, AppConfig};
use careline_relay::{ChatEvent, ChatInterface, ChatRelay, EventPayload, MessageMetadata};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "careline")]
#[command(about = "Careline chat client (console interview by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect the live bridge and run the full chat session
    Run,
    /// Run a local questionnaire interview in the terminal (default)
    Console,
}

mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::INFO)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Run => run_live().await,
        Commands::Console => run_console().await,
    }
}

fn build_bot(config: &AppConfig) -> anyhow::Result<QuestionnaireBot> {
    let transport = ReqwestTransport::new(
        config.api.base_url.clone(),
        config.api.token.clone(),
        Duration::from_secs(config.api.request_timeout_seconds),
    )
    .context("failed to build api transport")?;
    let client = ApiClient::new(Arc::new(transport));

    Ok(QuestionnaireBot::new(
        client,
        BotOptions {
            nick_name: config.bot.nick_name.clone(),
            avatar: config.bot.avatar.clone(),
            typing_delay: Duration::from_millis(config.bot.typing_delay_ms),
            visit_type_id: config.bot.visit_type_id,
            ..BotOptions::default()
        },
    ))
}

async fn run_live() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting Careline live session");

    let config = load_config().context("failed to load configuration")?;

    let mut bot = build_bot(&config)?;
    bot.start()
        .await
        .context("failed to load the questionnaire script")?;

    let relay = ChatRelay::new();
    relay.bind_interface(Arc::new(Mutex::new(bot)));

    let dispatcher = relay.clone();
    let dispatcher_task = tokio::spawn(async move { dispatcher.run().await });

    let session = SessionCredentials {
        session_id: config.bridge.session_id,
        session_key: config.bridge.session_key.clone(),
    };
    let (_bridge, driver) = connect_bridge(&relay, session, &config.bridge.endpoint)
        .await
        .context("failed to connect the live bridge")?;

    relay.start_chat();
    info!(endpoint = %config.bridge.endpoint, "live session running");

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = driver => info!("socket connection ended"),
    }

    relay.cleanup_chat();
    relay.dispatch_pending();
    dispatcher_task.abort();

    info!("careline shut down");
    Ok(())
}

async fn run_console() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;

    let mut bot = build_bot(&config)?;
    bot.start()
        .await
        .context("failed to load the questionnaire script")?;

    let relay = ChatRelay::new();
    relay.bind_interface(Arc::new(Mutex::new(bot)));
    let console_id = relay.bind_interface(Arc::new(Mutex::new(ConsolePrinter { id: None })));

    let dispatcher = relay.clone();
    let dispatcher_task = tokio::spawn(async move { dispatcher.run().await });

    relay.start_chat();
    relay
        .add_participant(&console_id, "You", "")
        .context("failed to join the chat")?;

    println!("Type your answers and press enter. Ctrl-C to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = shutdown_signal() => break,
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) if !line.trim().is_empty() => {
                        let metadata = MessageMetadata::new(
                            METADATA_ANSWER,
                            serde_json::json!({ "text": line.trim() }),
                        );
                        if let Err(error) =
                            relay.send_message(&console_id, line.trim(), Some(metadata), None, None)
                        {
                            tracing::warn!(%error, "failed to send answer");
                        }
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
    }

    relay.cleanup_chat();
    relay.dispatch_pending();
    dispatcher_task.abort();
    Ok(())
}

/// Prints relay traffic for the person at the terminal
struct ConsolePrinter {
    id: Option<String>,
}

impl ChatInterface for ConsolePrinter {
    fn interface_id(&self) -> Option<String> {
        self.id.clone()
    }

    fn assign_interface_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn on_event(&mut self, event: ChatEvent, _relay: &ChatRelay) {
        match &event.payload {
            EventPayload::ChatMessage { message, metadata } => {
                println!("> {message}");
                if let Some(metadata) = metadata {
                    if let Some(options) = metadata.data.get("possibleAnswers") {
                        if let Some(options) = options.as_array() {
                            for option in options {
                                if let Some(value) = option.get("value").and_then(|v| v.as_str()) {
                                    println!("    - {value}");
                                }
                            }
                        }
                    }
                    if metadata.kind == METADATA_END {
                        println!("(interview complete, ctrl-c to exit)");
                    }
                }
            }
            EventPayload::ChatParticipantJoined { member } => {
                println!("* {} joined", member.nick_name);
            }
            EventPayload::ChatParticipantLeft => {
                if let Some(member) = &event.sender_id {
                    println!("* {member} left");
                }
            }
            EventPayload::ChatEnded => println!("* chat ended"),
            _ => {}
        }
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
}
