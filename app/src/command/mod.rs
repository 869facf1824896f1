//! Static strategy pattern for CLI commands.
//!
//! Each command is a separate strategy type with its own input, dispatched
//! statically from `main`.

use std::sync::Arc;
use tokio::sync::broadcast::Receiver;
use tracing::info;

use yinyang_config::Config;
use yinyang_conversation::{ConversationManager, SessionEvent};
use yinyang_core::{CredentialStore, Persistence};
use yinyang_providers::HttpGateway;
use yinyang_storage::SqliteStore;

mod chat;
mod info;
mod init;
mod key;
mod reset;
mod version;

pub use chat::{ChatInput, ChatStrategy};
pub use info::InfoStrategy;
pub use init::InitStrategy;
pub use key::{KeyInput, KeyStrategy};
pub use reset::ResetStrategy;
pub use version::VersionStrategy;

/// Everything a session-bound command needs.
pub struct CommonComponents {
    pub config: Config,
    pub manager: Arc<ConversationManager<HttpGateway>>,
    /// Subscribed before the session was restored, so it sees the load events.
    pub events: Receiver<SessionEvent>,
}

/// Load config, open storage and restore the persisted session.
pub async fn init_common_components() -> anyhow::Result<CommonComponents> {
    let config = Config::load_or_default()?;
    let db_path = config.database_path(&Config::ensure_config_dir()?);
    info!("Database path: {}", db_path.display());

    let store = SqliteStore::open(&db_path).await?;
    let persistence = Persistence::new(Arc::new(store));
    let credentials = Arc::new(CredentialStore::new(
        config.credential.clone(),
        persistence.clone(),
        config.storage.keys.credential.clone(),
    ));
    let gateway = HttpGateway::new(config.gateway.to_gateway_config());

    let manager = Arc::new(ConversationManager::new(
        gateway,
        credentials,
        persistence,
        config.conversation_config(),
    ));
    let events = manager.subscribe();
    manager.load().await;

    Ok(CommonComponents {
        config,
        manager,
        events,
    })
}

/// Core trait defining the contract for all command strategies.
///
/// Each strategy names its own input type, so `main` passes parameters
/// without boxing or runtime casting.
pub trait CommandStrategy: Send + Sync + 'static {
    /// The input type this strategy accepts.
    type Input;

    /// Execute the command with the given input.
    ///
    /// # Errors
    /// Returns an error if command execution fails.
    async fn execute(&self, input: Self::Input) -> anyhow::Result<()>;
}
