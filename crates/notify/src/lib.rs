//! Unread-notification digest for myoshi.co.
//!
//! This crate polls the myoshi.co GraphQL API for unread forum notifications
//! and emails the operator a digest, never twice for the same unread set.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use notify_digest::{
//!     AlertStateStore, EmailTransport, EnvSecret, FileStore, GraphQlSource, Pipeline,
//!     PipelineConfig, SmtpConfig, SmtpMailer,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let source = GraphQlSource::new(
//!     "https://api.myoshi.co/graphql",
//!     Arc::new(EnvSecret::new("MYOSHI_API_KEY")),
//!     Duration::from_secs(30),
//! )?;
//! let mailer = SmtpMailer::new(&SmtpConfig {
//!     host: "smtp.gmail.com".to_string(),
//!     port: 587,
//!     username: "bot@example.com".to_string(),
//!     password: "app-password".to_string(),
//! })?;
//!
//! let pipeline = Pipeline::new(
//!     PipelineConfig::default(),
//!     Arc::new(source),
//!     AlertStateStore::new(Arc::new(FileStore::new("/data/notify-state.json"))),
//!     EmailTransport::new(Arc::new(mailer)),
//! );
//!
//! let outcome = pipeline.run_cycle().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`NotificationSource`] fetches the current unread set ([`GraphQlSource`])
//! - [`gate`] compares its [`Fingerprint`] with the last emailed one
//! - [`DigestComposer`] renders the email
//! - [`EmailTransport`] assembles it and hands it to an [`OutboundMailer`]
//! - [`AlertStateStore`] persists the fingerprint over a [`KeyValueStore`]
//! - [`Pipeline`] runs one cycle; [`Scheduler`] fires cycles periodically

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod digest;
pub mod error;
pub mod gate;
pub mod notification;
pub mod pipeline;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod transport;

pub use config::Settings;
pub use digest::{DigestComposer, EmailDigest};
pub use error::{CycleError, SourceError, StoreError, TransportError};
pub use gate::{Decision, GateState};
pub use notification::{Fingerprint, NotificationItem, NotificationSet};
pub use pipeline::{CycleOutcome, Pipeline, PipelineConfig};
pub use scheduler::Scheduler;
pub use source::{EnvSecret, GraphQlSource, NotificationSource, SecretProvider, StaticSecret};
pub use store::{AlertStateStore, FileStore, KeyValueStore, MemoryStore, LAST_NOTIFIED_KEY};
pub use transport::{EmailTransport, OutboundMailer, SmtpConfig, SmtpMailer};
