use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod command;

use command::{
    ChatInput, ChatStrategy, CommandStrategy, InfoStrategy, InitStrategy, KeyInput, KeyStrategy,
    ResetStrategy, VersionStrategy,
};

#[derive(Parser)]
#[command(name = "yinyang")]
#[command(about = "yinyang chat client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively, or send a single message
    Chat {
        /// Single message to send
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,

        /// Prefix requests with the coding preamble
        #[arg(long)]
        coding: bool,
    },
    /// Manage the API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Clear the stored conversation
    Reset,
    /// Show configuration and session state
    Info,
    /// Initialize configuration
    Init,
    /// Show version
    Version,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Validate and store an API key
    Set { key: String },
    /// Probe the endpoint with the given key, or the stored one
    Test { key: Option<String> },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat {
            message,
            model,
            coding,
        } => {
            ChatStrategy
                .execute(ChatInput {
                    message,
                    model,
                    coding,
                })
                .await
        }
        Commands::Key { action } => {
            let input = match action {
                KeyAction::Set { key } => KeyInput::Set(key),
                KeyAction::Test { key } => KeyInput::Test(key),
            };
            KeyStrategy.execute(input).await
        }
        Commands::Reset => ResetStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
