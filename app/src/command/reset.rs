use super::init_common_components;

/// Strategy for clearing the stored conversation.
///
/// The API key and settings are kept.
#[derive(Debug, Clone, Copy)]
pub struct ResetStrategy;

impl super::CommandStrategy for ResetStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components().await?;
        let before = common.manager.usage().await;

        common.manager.reset().await;

        println!("Cleared {} messages.", before.message_count);
        Ok(())
    }
}
