//! Inbound request record.

use std::time::SystemTime;

/// Identity of a requester as supplied by the chat front end.
pub type UserId = i64;

/// One inbound link submission. Lives until its result is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Who sent the link.
    pub user_id: UserId,
    /// Raw text as received, trimmed.
    pub url: String,
    /// When the front end handed the text over.
    pub submitted_at: SystemTime,
}

impl Request {
    /// Creates a request stamped with the current time.
    #[must_use]
    pub fn new(user_id: UserId, text: &str) -> Self {
        Self {
            user_id,
            url: text.trim().to_string(),
            submitted_at: SystemTime::now(),
        }
    }
}
