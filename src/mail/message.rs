//! Review mail parsing: sender, subject, and plain-text body extraction.

use mail_parser::{MessageParser, PartType};

/// The parts of an inbound message the review pipeline looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewMail {
    /// Sender address (no display name).
    pub sender: String,
    pub subject: String,
    /// Concatenation of every `text/plain` body part.
    pub body: String,
}

impl ReviewMail {
    /// Parse a raw RFC 822 message. Returns `None` if it is not parseable.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let parsed = MessageParser::default().parse(raw)?;
        Some(Self {
            sender: extract_sender(&parsed),
            subject: parsed.subject().unwrap_or_default().to_string(),
            body: plain_text_body(&parsed),
        })
    }
}

/// Extract the sender address from a parsed email.
fn extract_sender(parsed: &mail_parser::Message) -> String {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".into())
}

/// Concatenate the plain-text body parts; HTML alternatives are ignored.
pub fn plain_text_body(parsed: &mail_parser::Message) -> String {
    parsed
        .text_bodies()
        .filter_map(|part| match &part.body {
            PartType::Text(text) => Some(text.as_ref()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check if a sender email is in the allowlist.
///
/// - Empty list → deny all
/// - `*` in list → allow all
/// - `@domain.com` or `domain.com` → domain match
/// - `user@domain.com` → exact email match
pub fn is_sender_allowed(allowed: &[String], email: &str) -> bool {
    if allowed.is_empty() {
        return false;
    }
    if allowed.iter().any(|a| a == "*") {
        return true;
    }
    let email_lower = email.to_lowercase();
    allowed.iter().any(|a| {
        if a.starts_with('@') {
            email_lower.ends_with(&a.to_lowercase())
        } else if a.contains('@') {
            a.eq_ignore_ascii_case(email)
        } else {
            email_lower.ends_with(&format!("@{}", a.to_lowercase()))
        }
    })
}
