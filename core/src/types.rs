use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Mailbox assignment returned by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxInfo {
    pub address: String,
    pub expires_at: DateTime<Utc>,
}

/// A single inbox entry as the provider sends it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    #[serde(default, deserialize_with = "lenient_string")]
    pub from: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub subject: String,
    #[serde(rename = "textBody", default, deserialize_with = "lenient_string")]
    pub text_body: String,
}

impl RawMessage {
    /// Build a message from an arbitrary JSON value. Anything that is not an
    /// object degrades to an empty message.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

/// Normalized inbox entry handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub from: String,
    pub subject: String,
    pub otp: String,
    pub body: String,
}

/// `{data: {...}}` envelope of the inbox endpoint
#[derive(Debug, Deserialize)]
pub(crate) struct InboxEnvelope {
    pub data: Option<InboxData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InboxData {
    pub name: Option<String>,
    pub expires: Option<Value>,
    pub inbox: Option<Vec<Value>>,
}

impl InboxData {
    /// Expiry in epoch milliseconds. The provider has sent both numbers and
    /// numeric strings here.
    pub fn expires_millis(&self) -> Option<i64> {
        match self.expires.as_ref()? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}
