use anyhow::{Context, Result};
use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl AppConfig {
    /// Reads the process configuration from the environment. Only
    /// `DATABASE_URL` is mandatory.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("DATABASE_URL").context("DATABASE_URL is not set")?;

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {v}"))?,
            None => 10,
        };

        let port = match lookup("HELPDESK_PORT") {
            Some(v) => v
                .parse()
                .with_context(|| format!("HELPDESK_PORT is not a valid port: {v}"))?,
            None => 8080,
        };

        Ok(Self {
            server: ServerConfig {
                host: lookup("HELPDESK_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port,
            },
            database: DatabaseConfig {
                url,
                max_connections,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
