pub mod bridge;
pub mod publisher;

use color_eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::publisher::PublisherHandle;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    info!("Starting meeting state publisher");
    let publisher = PublisherHandle::from_env();

    let stdin = tokio::io::stdin();
    tokio::select! {
        result = bridge::forward_events(stdin, &publisher) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    publisher.shutdown().await;
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();
}
