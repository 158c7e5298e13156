//! Runtime configuration.
//!
//! Every setting can be given as a flag or through the environment. SMTP
//! credentials are only required by commands that actually send mail.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::PipelineConfig;
use crate::source::{EnvSecret, GraphQlSource, DEFAULT_API_URL};
use crate::store::FileStore;
use crate::transport::{SmtpConfig, DEFAULT_FROM, DEFAULT_SMTP_PORT, DEFAULT_TO};

/// Default SMTP relay host.
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

/// Default interval between cycles in `watch` mode.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Settings shared by all commands.
#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// GraphQL endpoint of the notification API
    #[arg(long, env = "MYOSHI_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Environment variable holding the API bearer token
    #[arg(long, env = "MYOSHI_API_KEY_VAR", default_value = "MYOSHI_API_KEY")]
    pub api_key_var: String,

    /// HTTP timeout for the notification query, in seconds
    #[arg(long, env = "NOTIFY_HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// State file holding the last notified fingerprint
    #[arg(long, env = "NOTIFY_STATE_PATH", default_value = "/data/notify-state.json")]
    pub state_path: PathBuf,

    /// Sender address
    #[arg(long, env = "NOTIFY_EMAIL_FROM", default_value = DEFAULT_FROM)]
    pub from: String,

    /// Operator address receiving digests
    #[arg(long, env = "NOTIFY_EMAIL_TO", default_value = DEFAULT_TO)]
    pub to: String,

    /// SMTP relay host
    #[arg(long, env = "SMTP_HOST", default_value = DEFAULT_SMTP_HOST)]
    pub smtp_host: String,

    /// SMTP relay port (STARTTLS)
    #[arg(long, env = "SMTP_PORT", default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,

    /// SMTP username
    #[arg(long, env = "SMTP_USERNAME", hide_env_values = true)]
    pub smtp_username: Option<String>,

    /// SMTP password
    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,
}

impl Settings {
    /// Addressing for the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }

    /// Build the GraphQL notification source.
    pub fn source(&self) -> Result<GraphQlSource> {
        GraphQlSource::new(
            self.api_url.clone(),
            Arc::new(EnvSecret::new(self.api_key_var.clone())),
            Duration::from_secs(self.http_timeout_secs),
        )
        .context("Failed to build notification source")
    }

    #[must_use]
    pub fn store(&self) -> FileStore {
        FileStore::new(self.state_path.clone())
    }

    /// SMTP settings; fails when credentials are missing.
    pub fn smtp(&self) -> Result<SmtpConfig> {
        let username = self
            .smtp_username
            .clone()
            .context("SMTP_USERNAME is not set")?;
        let password = self
            .smtp_password
            .clone()
            .context("SMTP_PASSWORD is not set")?;

        Ok(SmtpConfig {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            username,
            password,
        })
    }
}
