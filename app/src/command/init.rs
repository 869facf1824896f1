use yinyang_config::Config;

/// Strategy for initializing the configuration.
///
/// This strategy creates the default configuration file at `~/yinyang/config.json`.
#[derive(Debug, Clone, Copy)]
pub struct InitStrategy;

impl super::CommandStrategy for InitStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let path = Config::create_config()?;

        println!("✅ Created config file at: {}", path.display());
        println!();
        println!("📝 Next steps:");
        println!("   1. Run 'yinyang key set <KEY>' with your DeepSeek API key");
        println!("   2. Run 'yinyang chat' to start a conversation");
        println!();
        println!("🔧 Configuration options:");
        println!("   - session.models: models offered by /model");
        println!("   - session.history_limit: messages sent per request (all when absent)");
        println!("   - gateway.request_timeout_secs: how long to wait for a reply");
        println!("   - messages: text shown when a request fails");
        println!();
        Ok(())
    }
}
