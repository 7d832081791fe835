use anyhow::Context;
use clap::Parser;
use dilemma_server::{preview, Command, Config};
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(&config.log_level);

    match config.command.clone() {
        Some(Command::Scenario { seed, avatar, female }) => {
            let preview = preview::preview(&config.scenario_config(), seed, &avatar, female);
            let json = serde_json::to_string_pretty(&preview).context("failed to serialize scenario")?;
            println!("{json}");
            Ok(())
        }
        None => dilemma_server::server::run(config).await,
    }
}
