use std::sync::Arc;

use gramcast_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), gramcast_core::Error> {
    gramcast_core::logging::init("gramcast")?;

    let cfg = Arc::new(Config::load()?);

    gramcast_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| gramcast_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
