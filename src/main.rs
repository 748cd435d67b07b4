use anyhow::Context;
use enhance_queue::shared::{utils::init_logger, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    enhance_queue::run(config)
        .await
        .context("Image queue worker exited with an error")?;

    Ok(())
}
