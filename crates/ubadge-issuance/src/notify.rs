//! # Invite Notifications
//!
//! Outbound email seam. The orchestrator composes an [`EmailMessage`] and
//! hands it to an [`EmailDispatcher`]; delivery itself is someone else's
//! problem. Dispatch errors are returned so they can be reported per
//! recipient.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

/// Email dispatch failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("email dispatch failed: {0}")]
pub struct DispatchError(pub String);

/// An outbound email.
#[derive(Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

impl std::fmt::Debug for EmailMessage {
    // Invite bodies carry redemption nonces.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailMessage")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .field("body", &"[REDACTED]")
            .field("is_html", &self.is_html)
            .finish()
    }
}

/// Sends email.
pub trait EmailDispatcher: Send + Sync {
    /// Hand `message` to the transport.
    fn send(&self, message: &EmailMessage) -> Result<(), DispatchError>;
}

/// Logs each dispatch and drops the message. Used when no transport is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMailer;

impl EmailDispatcher for TracingMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), DispatchError> {
        tracing::info!(
            from = %message.from,
            recipients = message.to.len(),
            subject = %message.subject,
            "email dispatched (no transport configured)"
        );
        Ok(())
    }
}

/// Records every message in memory. Clones share the outbox.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
}

impl Outbox {
    /// An empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages sent so far, oldest first.
    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }

    /// Messages addressed to `to`.
    pub fn messages_to(&self, to: &str) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.to.iter().any(|t| t == to))
            .cloned()
            .collect()
    }

    /// Number of messages sent.
    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    /// Whether nothing has been sent.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmailDispatcher for Outbox {
    fn send(&self, message: &EmailMessage) -> Result<(), DispatchError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// Minimal HTML escaping for text interpolated into email bodies.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// HTML body of the invite email.
pub(crate) fn invite_body(issuer_name: &str, profile_url: &str, nonce: &str) -> String {
    let issuer = escape_html(issuer_name);
    let profile = escape_html(profile_url);
    format!(
        "<html><body>\
         <p>{issuer} would like to issue you a digital badge.</p>\
         <p>To accept it, add this issuer in your certificate wallet using the issuer URL \
         <a href=\"{profile}\">{profile}</a> and the one-time code below.</p>\
         <p style=\"font-size:1.5em\"><strong>{nonce}</strong></p>\
         </body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            from: "badges@acme.org".into(),
            to: vec![to.into()],
            subject: "[DX - uBadge]".into(),
            body: "<p>123456</p>".into(),
            is_html: true,
        }
    }

    #[test]
    fn outbox_records_messages() {
        let outbox = Outbox::new();
        let shared = outbox.clone();
        outbox.send(&message("a@x.com")).unwrap();
        outbox.send(&message("b@x.com")).unwrap();
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.messages_to("a@x.com").len(), 1);
    }

    #[test]
    fn tracing_mailer_accepts_everything() {
        assert!(TracingMailer.send(&message("a@x.com")).is_ok());
    }

    #[test]
    fn debug_hides_body() {
        let rendered = format!("{:?}", message("a@x.com"));
        assert!(!rendered.contains("123456"));
    }

    #[test]
    fn escape_html_handles_markup() {
        assert_eq!(
            escape_html("<b>Tom & \"Jerry\"</b>"),
            "&lt;b&gt;Tom &amp; &quot;Jerry&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn invite_body_carries_nonce_and_profile() {
        let body = invite_body("Acme <Labs>", "https://api/issuers/1/profile", "042042");
        assert!(body.contains("042042"));
        assert!(body.contains("https://api/issuers/1/profile"));
        assert!(body.contains("Acme &lt;Labs&gt;"));
    }
}
