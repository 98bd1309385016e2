use std::fmt;

use chrono::{DateTime, Utc};

pub mod config;
pub mod smtp;

pub use config::ServerConfig;
pub use smtp::server::SmtpServer;

/// A message captured during one SMTP session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// When the session that produced this message ended.
    pub received_at: DateTime<Utc>,
    /// Every header and body line, verbatim, in arrival order.
    pub lines: Vec<String>,
    /// Parsed `Name: value` pairs, with folded continuation lines joined.
    pub headers: Vec<(String, String)>,
    /// Lines received after the blank line ending the headers.
    pub body_lines: Vec<String>,
}

impl Message {
    /// First value of the header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> String {
        self.body_lines.join("\n")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.headers {
            writeln!(f, "{}: {}", name, value)?;
        }
        writeln!(f)?;
        write!(f, "{}", self.body())
    }
}
