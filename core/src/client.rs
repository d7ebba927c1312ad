use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::errors::{ProviderError, ProviderResult};
use crate::types::{InboxData, InboxEnvelope, MailboxInfo, RawMessage};

/// Operations the session layer needs from the upstream mail provider.
///
/// Each implementation owns its own cookie state, so one instance belongs to
/// exactly one caller session.
#[async_trait]
pub trait MailProvider: Send + Sync + Debug {
    /// Load the landing page so the provider hands out session cookies
    async fn warm_up(&self) -> ProviderResult<()>;

    /// Ask the provider for the mailbox bound to the current cookies
    async fn fetch_mailbox(&self, now: DateTime<Utc>) -> ProviderResult<MailboxInfo>;

    /// Read the inbox entries of the current mailbox
    async fn fetch_inbox_messages(&self, now: DateTime<Utc>) -> ProviderResult<Vec<RawMessage>>;
}

/// Type alias for Arc-wrapped MailProvider trait objects
pub type MailProviderRef = Arc<dyn MailProvider>;

/// Builds a fresh, cookie-isolated provider for each new session
pub trait ProviderFactory: Send + Sync + Debug {
    fn create(&self) -> ProviderResult<MailProviderRef>;
}

/// HTTP client for the tempmail.so inbox API
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: Client,
    config: ProviderConfig,
    headers: HeaderMap,
}

impl ProviderClient {
    /// Create a client with an empty cookie jar
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let jar = Arc::new(Jar::default());
        let mut builder = Client::builder().cookie_provider(jar);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| {
            ProviderError::UpstreamUnavailable(format!("Failed to build HTTP client: {}", e))
        })?;
        let headers = build_header_map(&config);

        Ok(Self {
            http,
            config,
            headers,
        })
    }

    async fn get_inbox_data(&self, now: DateTime<Utc>) -> ProviderResult<InboxData> {
        let url = self.config.inbox_url();
        let request_time = now.timestamp_millis().to_string();

        let response = self
            .http
            .get(&url)
            .query(&[("requestTime", request_time.as_str()), ("lang", self.config.lang.as_str())])
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UpstreamUnavailable(format!(
                "Inbox request failed with status {}",
                status
            )));
        }

        let body = response.text().await?;
        let envelope: InboxEnvelope = serde_json::from_str(&body).map_err(|e| {
            ProviderError::UpstreamMalformedResponse(format!("Invalid JSON body: {}", e))
        })?;

        envelope.data.ok_or_else(|| {
            ProviderError::UpstreamMalformedResponse("Missing `data` object".to_string())
        })
    }
}

#[async_trait]
impl MailProvider for ProviderClient {
    async fn warm_up(&self) -> ProviderResult<()> {
        let url = self.config.homepage_url();
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::UpstreamUnavailable(format!(
                "Warm-up request failed with status {}",
                status
            )));
        }

        debug!(url = %url, "Provider warm-up complete");
        Ok(())
    }

    async fn fetch_mailbox(&self, now: DateTime<Utc>) -> ProviderResult<MailboxInfo> {
        let data = self.get_inbox_data(now).await?;

        let address = data
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                ProviderError::UpstreamMalformedResponse("Missing mailbox name".to_string())
            })?
            .to_string();

        let expires_at = data
            .expires_millis()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| {
                ProviderError::UpstreamMalformedResponse("Missing or invalid expiry".to_string())
            })?;

        Ok(MailboxInfo {
            address,
            expires_at,
        })
    }

    async fn fetch_inbox_messages(&self, now: DateTime<Utc>) -> ProviderResult<Vec<RawMessage>> {
        let data = self.get_inbox_data(now).await?;
        let messages: Vec<RawMessage> = data
            .inbox
            .unwrap_or_default()
            .into_iter()
            .map(RawMessage::from_value)
            .collect();

        debug!(count = messages.len(), "Fetched inbox entries");
        Ok(messages)
    }
}

/// Factory producing [`ProviderClient`]s that share a config but never cookies
#[derive(Debug, Clone)]
pub struct ProviderClientFactory {
    config: ProviderConfig,
}

impl ProviderClientFactory {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

impl ProviderFactory for ProviderClientFactory {
    fn create(&self) -> ProviderResult<MailProviderRef> {
        let client: MailProviderRef = Arc::new(ProviderClient::new(self.config.clone())?);
        Ok(client)
    }
}

/// Turn the configured header strings into a `HeaderMap`. Entries that are
/// not valid HTTP headers are dropped so a bad config line cannot take the
/// proxy down.
fn build_header_map(config: &ProviderConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid provider header"),
        }
    }
    headers
}
