use std::sync::LazyLock;

use regex::Regex;

use crate::types::{InboxMessage, RawMessage};

/// Placeholder used when a subject carries no passcode
pub const OTP_NOT_FOUND: &str = "Not Found";

// ASCII word boundaries: a code glued to non-Latin text still counts as standalone
static RE_OTP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u:\b)[0-9]{6}(?-u:\b)").unwrap());

/// First standalone 6-digit run in `subject`, if any
pub fn extract_otp(subject: &str) -> Option<&str> {
    RE_OTP.find(subject).map(|m| m.as_str())
}

/// Normalize raw provider entries into inbox messages. Never fails.
pub fn parse(raw: Vec<RawMessage>) -> Vec<InboxMessage> {
    raw.into_iter()
        .map(|msg| {
            let otp = extract_otp(&msg.subject)
                .unwrap_or(OTP_NOT_FOUND)
                .to_string();
            InboxMessage {
                from: msg.from,
                subject: msg.subject,
                otp,
                body: msg.text_body,
            }
        })
        .collect()
}
