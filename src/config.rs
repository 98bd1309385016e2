use std::net::{Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};

/// Where the SMTP server listens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl ServerConfig {
    pub const DEFAULT_PORT: u16 = 2525;
    pub const BIND_ENV: &'static str = "SMTP_FIXTURE_BIND";

    /// Listen on the loopback interface. Port `0` picks a free port.
    pub fn new(port: u16) -> Self {
        Self::with_bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    }

    pub fn with_bind(bind: SocketAddr) -> Self {
        Self { bind }
    }

    /// Read the configuration from the environment.
    ///
    /// If the `SMTP_FIXTURE_BIND` environment variable is not set, fallback
    /// to the loopback interface on the default port.
    pub fn from_env() -> Result<Self> {
        match std::env::var(Self::BIND_ENV) {
            Ok(bind) => {
                let bind: SocketAddr = bind
                    .parse()
                    .with_context(|| format!("invalid {} value {:?}", Self::BIND_ENV, bind))?;
                Ok(Self::with_bind(bind))
            }
            Err(_) => {
                let config = Self::default();
                tracing::warn!(
                    "{} not set, using default address {}",
                    Self::BIND_ENV,
                    config.bind
                );
                Ok(config)
            }
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PORT)
    }
}
