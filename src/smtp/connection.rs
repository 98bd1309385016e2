use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use super::accumulator::MessageAccumulator;
use super::state_machine::{Request, Response, State};
use crate::Message;

/// A single client session.
///
/// Drives the state machine over the lines read from `stream` and collects
/// the DATA content into a [`Message`].
pub struct Connection<S> {
    stream: BufReader<S>,
    state: State,
    accumulator: MessageAccumulator,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new session over a connected stream
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            state: State::Connect,
            accumulator: MessageAccumulator::new(),
        }
    }

    /// Run the session to completion
    ///
    /// Returns whatever was received, even when the client disconnects or
    /// the transport fails halfway through.
    #[tracing::instrument(name = "smtp-session", skip_all)]
    pub async fn serve(mut self) -> Message {
        if let Err(error) = self.run().await {
            tracing::warn!("Session ended early in state {:?}: {:#}", self.state, error);
        }

        if let Err(error) = self.stream.get_mut().shutdown().await {
            tracing::debug!("Failed to shut down stream: {}", error);
        }

        self.accumulator.finish()
    }

    async fn run(&mut self) -> Result<()> {
        self.greet().await?;

        let mut buf = Vec::new();
        while self.state != State::Connect {
            buf.clear();
            let n = self
                .stream
                .read_until(b'\n', &mut buf)
                .await
                .context("failed to read from client")?;

            if n == 0 {
                tracing::info!("Received EOF in state {:?}", self.state);
                break;
            }

            // 8-bit message content is not a protocol error.
            let line = String::from_utf8_lossy(&buf);
            let line = line.strip_suffix('\n').unwrap_or(&line);
            let line = line.strip_suffix('\r').unwrap_or(line);
            let request = Request::parse(line, self.state);
            tracing::trace!("Received {:?} in state {:?}", line, self.state);

            let response = request.evaluate();
            self.accumulator.observe(&response, request.params.as_deref());
            self.respond(&response).await?;
        }

        Ok(())
    }

    /// Send the initial SMTP greeting
    async fn greet(&mut self) -> Result<()> {
        let response = Request::connect().evaluate();
        self.respond(&response).await
    }

    async fn respond(&mut self, response: &Response) -> Result<()> {
        write_response(self.stream.get_mut(), response).await?;
        self.state = response.next_state;
        Ok(())
    }
}

/// Write `response` to `writer`, or nothing at all for a silent response.
pub async fn write_response<W>(writer: &mut W, response: &Response) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    match response.wire() {
        Some(reply) => {
            tracing::trace!("Sending {:?}", reply.trim_end());
            writer
                .write_all(reply.as_bytes())
                .await
                .context("failed to write reply")?;
            writer.flush().await.context("failed to flush reply")
        }
        None => {
            tracing::debug!("Not responding, awaiting more data");
            Ok(())
        }
    }
}
