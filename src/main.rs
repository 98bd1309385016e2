use anyhow::{Context, Result};
use smtp_fixture::{ServerConfig, SmtpServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let mut server = SmtpServer::start(config).await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    server.stop().await?;

    for (index, message) in server.received_messages().iter().enumerate() {
        tracing::info!(
            "Message {} received at {}: subject {:?}, {} body lines",
            index + 1,
            message.received_at,
            message.header("Subject").unwrap_or_default(),
            message.body_lines.len()
        );
        tracing::debug!("\n{}", message);
    }
    tracing::info!("{} messages received", server.received_message_count());

    Ok(())
}
