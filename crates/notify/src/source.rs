//! Notification source backed by the myoshi.co GraphQL API.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::error::SourceError;
use crate::notification::{NotificationItem, NotificationSet};

/// Default GraphQL endpoint.
pub const DEFAULT_API_URL: &str = "https://api.myoshi.co/graphql";

/// Unread count plus the full notification list.
const NOTIFICATIONS_QUERY: &str = r"{
  notifications {
    unreadCount
    list {
      edges {
        node {
          id
          message
          is_read
          url
          batch_count
          created_at
        }
      }
    }
  }
}";

/// Anything that can produce the current unread-notification set.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Fetch the current set. Makes at most one attempt.
    async fn fetch_unread(&self) -> Result<NotificationSet, SourceError>;
}

/// Opaque retrieval of the API bearer token.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    async fn secret(&self) -> Result<String, SourceError>;
}

/// Reads the secret from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvSecret {
    var: String,
}

impl EnvSecret {
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl SecretProvider for EnvSecret {
    async fn secret(&self) -> Result<String, SourceError> {
        match std::env::var(&self.var) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(SourceError::Secret(format!("{} is not set", self.var))),
        }
    }
}

/// A fixed secret, for tests and one-off runs.
#[derive(Clone)]
pub struct StaticSecret(pub String);

#[async_trait]
impl SecretProvider for StaticSecret {
    async fn secret(&self) -> Result<String, SourceError> {
        Ok(self.0.clone())
    }
}

/// GraphQL-backed [`NotificationSource`].
#[derive(Clone)]
pub struct GraphQlSource {
    client: reqwest::Client,
    api_url: String,
    secret: Arc<dyn SecretProvider>,
}

impl GraphQlSource {
    /// Create a source for the given endpoint.
    pub fn new(
        api_url: impl Into<String>,
        secret: Arc<dyn SecretProvider>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            secret,
        })
    }
}

#[async_trait]
impl NotificationSource for GraphQlSource {
    #[instrument(skip(self), fields(api_url = %self.api_url))]
    async fn fetch_unread(&self) -> Result<NotificationSet, SourceError> {
        let bearer = self.secret.secret().await?;

        let response = self
            .client
            .post(&self.api_url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {bearer}"))
            .json(&GraphQlRequest {
                query: NOTIFICATIONS_QUERY,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::Status { status, body });
        }

        debug!(len = body.len(), "Received GraphQL response");
        parse_response(&body)
    }
}

/// Decode a raw GraphQL response body into a [`NotificationSet`].
pub fn parse_response(body: &str) -> Result<NotificationSet, SourceError> {
    let response: GraphQlResponse = serde_json::from_str(body)?;

    if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
        return Err(SourceError::GraphQl(
            errors.into_iter().map(|e| e.message).collect(),
        ));
    }

    let notifications = response
        .data
        .and_then(|d| d.notifications)
        .ok_or(SourceError::MissingData)?;

    let items: Vec<NotificationItem> = notifications
        .list
        .map(|l| l.edges)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|edge| edge.node)
        .map(WireNode::into_item)
        .collect();

    let unread_count = notifications.unread_count.unwrap_or_else(|| {
        warn!("unreadCount missing from response, counting listed unread items");
        items.iter().filter(|i| !i.is_read).count() as u64
    });

    Ok(NotificationSet::new(unread_count, items))
}

// =============================================================================
// GraphQL wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct GraphQlRequest {
    query: &'static str,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<WireData>,
    errors: Option<Vec<WireError>>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireData {
    notifications: Option<WireNotifications>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNotifications {
    unread_count: Option<u64>,
    list: Option<WireList>,
}

#[derive(Debug, Deserialize)]
struct WireList {
    #[serde(default)]
    edges: Vec<WireEdge>,
}

#[derive(Debug, Deserialize)]
struct WireEdge {
    node: Option<WireNode>,
}

#[derive(Debug, Deserialize)]
struct WireNode {
    id: Scalar,
    message: Option<String>,
    is_read: Option<bool>,
    url: Option<String>,
    batch_count: Option<u32>,
    created_at: Option<Scalar>,
}

/// GraphQL ids and timestamps may arrive as strings or numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

impl WireNode {
    fn into_item(self) -> NotificationItem {
        NotificationItem {
            id: self.id.into_string(),
            message: self.message.unwrap_or_default(),
            is_read: self.is_read.unwrap_or(false),
            url: self.url.filter(|u| !u.is_empty()),
            created_at: self.created_at.map(Scalar::into_string),
            batch_count: self.batch_count,
        }
    }
}
