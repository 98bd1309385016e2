use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::connection::Connection;
use crate::{Message, ServerConfig};

/// Back-off applied after a failed `accept`, so a persistent error does not
/// spin the accept loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// SMTP test server
///
/// Accepts connections one at a time and keeps every received message in
/// arrival order, for inspection once the server has been stopped.
///
/// Connections are served sequentially on purpose: this keeps the order of
/// [`SmtpServer::received_messages`] deterministic. A client that stalls
/// without closing its connection stalls the whole server, as there is no
/// read timeout.
pub struct SmtpServer {
    local_addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
struct Shared {
    messages: Mutex<Vec<Message>>,
    running: AtomicBool,
    stopped: AtomicBool,
}

impl SmtpServer {
    /// Bind the listening socket and start accepting connections
    ///
    /// # Errors
    ///
    /// Fails if the configured address cannot be bound.
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind)
            .await
            .with_context(|| format!("failed to bind SMTP server on {}", config.bind))?;
        let local_addr = listener
            .local_addr()
            .context("failed to read listener address")?;

        let shared = Arc::new(Shared::default());
        shared.running.store(true, Ordering::SeqCst);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, Arc::clone(&shared), shutdown_rx));

        tracing::info!("SMTP server listening on {}", local_addr);

        Ok(Self {
            local_addr,
            shared,
            shutdown,
            task: Some(task),
        })
    }

    /// Request shutdown and wait until the accept loop has exited
    ///
    /// A session in progress is allowed to finish first.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        tracing::debug!("Stopping SMTP server on {}", self.local_addr);
        self.shutdown.send_replace(true);
        task.await.context("SMTP server task failed")?;

        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stopped.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn received_message_count(&self) -> usize {
        self.shared.messages().len()
    }

    /// Snapshot of the messages received so far
    pub fn received_messages(&self) -> Vec<Message> {
        self.shared.messages().clone()
    }
}

impl Drop for SmtpServer {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.shutdown.send_replace(true);
        }
    }
}

impl Shared {
    fn messages(&self) -> std::sync::MutexGuard<'_, Vec<Message>> {
        self.messages.lock().expect("received messages lock")
    }
}

async fn accept_loop(
    listener: TcpListener,
    shared: Arc<Shared>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            biased;

            _ = shutdown.changed() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                tracing::info!("Accepted connection from {}", peer);

                let message = Connection::new(stream).serve().await;
                tracing::info!(
                    "Stored message from {} with {} lines",
                    peer,
                    message.lines.len()
                );
                shared.messages().push(message);
            }
            Err(error) => {
                tracing::warn!("Failed to accept connection: {}", error);
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
                }
            }
        }
    }

    drop(listener);
    shared.running.store(false, Ordering::SeqCst);
    shared.stopped.store(true, Ordering::SeqCst);
    tracing::info!("SMTP server stopped");
}
