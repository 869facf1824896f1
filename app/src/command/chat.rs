//! Interactive chat with slash commands.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info};

use yinyang_conversation::{ConnectionStatus, ExchangeState, SessionEvent, SubmitError};
use yinyang_core::{FailureKind, Role, SettingsPatch};

use super::{CommonComponents, init_common_components};

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Optional model override
    pub model: Option<String>,
    /// Turn on coding mode before sending
    pub coding: bool,
}

/// Strategy for executing the Chat command.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let mut common = init_common_components().await?;
        let events = std::mem::replace(&mut common.events, common.manager.subscribe());
        let mut renderer = Renderer::new(events);

        if let Some(model) = input.model {
            common.manager.configure(SettingsPatch::model(model)).await?;
        }
        if input.coding {
            common
                .manager
                .configure(SettingsPatch::coding_mode(true))
                .await?;
        }
        renderer.drain();

        if let Some(msg) = input.message {
            let result = common.manager.submit(&msg).await;
            renderer.drain();
            return match result {
                Ok(_) => Ok(()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            };
        }

        run_interactive(&common, &mut renderer).await?;

        let usage = common.manager.usage().await;
        info!(
            "Conversation ended: {} total messages, ~{} tokens",
            usage.message_count, usage.approximate_tokens
        );
        Ok(())
    }
}

async fn run_interactive(common: &CommonComponents, renderer: &mut Renderer) -> anyhow::Result<()> {
    let manager = &common.manager;
    let settings = manager.settings().await;

    println!("=== yinyang chat ({}) ===", settings.model);
    println!("Type /help for commands, 'exit' to leave.\n");

    if manager.credentials().is_valid() {
        // The status line reports the outcome.
        let _ = manager.test_connection().await;
    } else {
        println!("API key required. Use /key <KEY> to set one.");
    }
    renderer.drain();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if matches!(input, "exit" | "quit" | "q") {
            break;
        }
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            run_slash_command(common, command).await;
        } else {
            match manager.submit(input).await {
                Ok(reply) => debug!("Turn {} done", reply.turn_number),
                Err(SubmitError::ExchangeInFlight) => {
                    println!("Still waiting for the previous reply.");
                }
                Err(SubmitError::Failed {
                    diagnostic: None,
                    failure,
                    ..
                }) => println!("{}", common.config.messages.render(&failure)),
                Err(e) => debug!("Submission not completed: {e}"),
            }
        }
        renderer.drain();
    }

    let usage = manager.usage().await;
    println!(
        "\nSession ended. {} messages, ~{} tokens.",
        usage.message_count, usage.approximate_tokens
    );
    Ok(())
}

async fn run_slash_command(common: &CommonComponents, command: &str) {
    let manager = &common.manager;
    let (name, arg) = command
        .split_once(char::is_whitespace)
        .map_or((command, ""), |(name, arg)| (name, arg.trim()));

    match name {
        "reset" => manager.reset().await,
        "coding" => {
            let enabled = !manager.settings().await.coding_mode;
            if let Err(e) = manager.configure(SettingsPatch::coding_mode(enabled)).await {
                println!("{e}");
            }
        }
        "model" if !arg.is_empty() => {
            if let Err(e) = manager.configure(SettingsPatch::model(arg)).await {
                println!("{e}");
            }
        }
        "tokens" => match arg.parse::<u32>() {
            Ok(n) => {
                if let Err(e) = manager.configure(SettingsPatch::max_tokens(n)).await {
                    println!("{e}");
                }
            }
            Err(_) => println!("Usage: /tokens <n>"),
        },
        "key" if !arg.is_empty() => match manager.set_credential(arg).await {
            Ok(credential) => {
                println!("Stored API key {}", credential.masked());
                if let Err(e) = manager.test_connection().await {
                    println!("{}", common.config.messages.render(&e));
                }
            }
            Err(e) => println!("{e}"),
        },
        "status" => {
            let settings = manager.settings().await;
            let stats = manager.stats().await;
            println!("{}", manager.connection_status().await);
            println!(
                "Model: {} | Max tokens: {} | Coding: {}",
                settings.model,
                settings.max_tokens,
                if settings.coding_mode { "on" } else { "off" }
            );
            println!(
                "Messages: {} ({} user, {} assistant, {} errors) | ~{} tokens",
                stats.total_messages,
                stats.user_messages,
                stats.assistant_messages,
                stats.diagnostic_messages,
                stats.estimated_tokens
            );
        }
        _ => print_help(),
    }
}

fn print_help() {
    println!("Commands:");
    println!("  /reset          clear the conversation");
    println!("  /coding         toggle coding mode");
    println!("  /model <id>     switch model");
    println!("  /tokens <n>     set the reply token limit");
    println!("  /key <KEY>      set and test an API key");
    println!("  /status         show connection and usage");
    println!("  exit            leave");
}

/// Prints session events as they arrive.
struct Renderer {
    events: Receiver<SessionEvent>,
}

impl Renderer {
    const fn new(events: Receiver<SessionEvent>) -> Self {
        Self { events }
    }

    fn drain(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => Self::render(&event),
                Err(TryRecvError::Lagged(skipped)) => debug!("Renderer skipped {skipped} events"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    fn render(event: &SessionEvent) {
        match event {
            SessionEvent::MessageAppended(message) if message.role == Role::Assistant => {
                println!("\n{}\n", message.content);
            }
            SessionEvent::StateChanged(ExchangeState::Failed(kind)) => {
                debug!("Exchange failed: {kind}");
            }
            SessionEvent::UsageUpdated(usage) => {
                debug!(
                    "Usage: {} messages, ~{} tokens",
                    usage.message_count, usage.approximate_tokens
                );
            }
            SessionEvent::HistoryCleared => println!("Conversation cleared."),
            SessionEvent::HistoryLoaded(count) if *count > 0 => {
                println!("Restored {count} messages.");
            }
            SessionEvent::SettingsChanged(settings) => {
                debug!("Settings: {settings:?}");
            }
            SessionEvent::ConnectionChanged(status) => render_status(*status),
            SessionEvent::CredentialAttention(kind) => match kind {
                FailureKind::QuotaExhausted => {
                    println!("Top up the balance or use /key <KEY> to switch keys.");
                }
                _ => println!("Use /key <KEY> to set a new API key."),
            },
            _ => {}
        }
    }
}

fn render_status(status: ConnectionStatus) {
    match status {
        ConnectionStatus::Unknown => {}
        other => println!("[{other}]"),
    }
}
