use dotenv::dotenv;

use leekwatch::{config::Config, lcbot};

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG set there reaches the logger
    dotenv().ok();

    // Begin logger
    env_logger::init();

    let config = Config::from_env()?;
    log::info!("Starting leekwatch with database {}", config.db_path);

    if let Err(why) = lcbot::run_leekbot(config).await {
        log::error!("Client error: {why:?}");
        return Err(why);
    }

    Ok(())
}
