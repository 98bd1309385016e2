use chrono::Utc;

use super::state_machine::{Response, State};
use crate::Message;

/// Builds a [`Message`] out of the silent responses seen during DATA.
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    lines: Vec<String>,
    headers: Vec<(String, String)>,
    body_lines: Vec<String>,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the parameter of a processed request.
    ///
    /// Only silent responses carry message content; everything else is
    /// envelope or control traffic and is ignored.
    pub fn observe(&mut self, response: &Response, params: Option<&str>) {
        let Some(line) = params else {
            return;
        };
        if !response.is_silent() {
            return;
        }

        self.lines.push(line.to_string());
        match response.next_state {
            State::DataHeaders => self.store_header(line),
            State::DataBody => self.body_lines.push(line.to_string()),
            _ => {}
        }
    }

    fn store_header(&mut self, line: &str) {
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = self.headers.last_mut() {
                let continuation = line.trim();
                if !continuation.is_empty() {
                    value.push(' ');
                    value.push_str(continuation);
                }
                return;
            }
        }

        match line.split_once(':') {
            Some((name, value)) => {
                self.headers
                    .push((name.trim().to_string(), value.trim().to_string()));
            }
            None => tracing::debug!("Ignoring malformed header line {:?}", line),
        }
    }

    /// Finalize the message, stamping it with the current time.
    pub fn finish(self) -> Message {
        Message {
            received_at: Utc::now(),
            lines: self.lines,
            headers: self.headers,
            body_lines: self.body_lines,
        }
    }
}

/// Fold a sequence of evaluated responses and their parameters into a
/// finished message.
pub fn accumulate<'a, I>(steps: I) -> Message
where
    I: IntoIterator<Item = (&'a Response, Option<&'a str>)>,
{
    let mut accumulator = MessageAccumulator::new();
    for (response, params) in steps {
        accumulator.observe(response, params);
    }
    accumulator.finish()
}
