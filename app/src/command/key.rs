use tracing::info;

use yinyang_conversation::ProbeError;

use super::init_common_components;

/// Input for the Key command strategy.
#[derive(Debug, Clone)]
pub enum KeyInput {
    /// Validate and store a key
    Set(String),
    /// Probe a candidate key, or the stored one when `None`
    Test(Option<String>),
}

/// Strategy for managing the stored API key.
#[derive(Debug, Clone, Copy)]
pub struct KeyStrategy;

impl super::CommandStrategy for KeyStrategy {
    type Input = KeyInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components().await?;
        let manager = &common.manager;

        match input {
            KeyInput::Set(candidate) => {
                let credential = manager.set_credential(&candidate).await?;
                println!("✅ Stored API key {}", credential.masked());
            }
            KeyInput::Test(Some(candidate)) => match manager.test_candidate(&candidate).await {
                Ok(()) => println!("✅ API key works"),
                Err(ProbeError::Format(e)) => anyhow::bail!("{e}"),
                Err(ProbeError::Failed(failure)) => {
                    anyhow::bail!("{}", common.config.messages.render(&failure))
                }
            },
            KeyInput::Test(None) => {
                info!("Testing stored API key");
                match manager.test_connection().await {
                    Ok(()) => println!("✅ {}", manager.connection_status().await),
                    Err(failure) => {
                        anyhow::bail!("{}", common.config.messages.render(&failure))
                    }
                }
            }
        }

        Ok(())
    }
}
