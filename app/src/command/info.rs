use super::init_common_components;

/// Strategy for displaying configuration and session information.
///
/// The API key is only ever shown masked.
#[derive(Debug, Clone, Copy)]
pub struct InfoStrategy;

impl super::CommandStrategy for InfoStrategy {
    type Input = ();

    async fn execute(&self, _input: Self::Input) -> anyhow::Result<()> {
        let common = init_common_components().await?;
        let config = &common.config;
        let manager = &common.manager;

        println!("=== yinyang Configuration ===\n");

        println!("API Key:");
        match manager.credentials().current() {
            Some(credential) => println!("  DeepSeek: {}", credential.masked()),
            None => println!("  DeepSeek: (not set)"),
        }
        println!();

        println!("Gateway:");
        println!("  Endpoint: {}", config.gateway.endpoint);
        println!("  Temperature: {}", config.gateway.temperature);
        println!(
            "  Timeouts: probe {}s, request {}s",
            config.gateway.probe_timeout_secs, config.gateway.request_timeout_secs
        );
        println!();

        let settings = manager.settings().await;
        println!("Session:");
        println!("  Model: {}", settings.model);
        println!("  Max Tokens: {}", settings.max_tokens);
        println!("  Coding Mode: {}", settings.coding_mode);
        println!("  Save History: {}", settings.auto_persist);
        if let Some(limit) = config.session.history_limit {
            println!("  History Limit: {limit}");
        }
        if !config.session.models.is_empty() {
            println!("  Models: {}", config.session.models.join(", "));
        }
        println!("  Coding Preamble: {}", truncate(&config.session.coding_preamble, 60));
        println!();

        let stats = manager.stats().await;
        println!("History:");
        println!(
            "  Messages: {} ({} user, {} assistant, {} errors)",
            stats.total_messages,
            stats.user_messages,
            stats.assistant_messages,
            stats.diagnostic_messages
        );
        println!("  Estimated Tokens: {}", stats.estimated_tokens);
        println!(
            "  Database: {}",
            config
                .database_path(&yinyang_config::Config::config_dir()?)
                .display()
        );

        Ok(())
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
