use serde::{Deserialize, Serialize};

/// Outbound short message queued on a connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub recipients: Vec<String>,
    pub body: String,
}

impl OutboundMessage {
    pub fn new(
        recipients: impl IntoIterator<Item = impl Into<String>>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipients: recipients.into_iter().map(Into::into).collect(),
            body: body.into(),
        }
    }

    /// A message must name at least one non-blank recipient.
    pub fn is_valid(&self) -> bool {
        !self.recipients.is_empty() && self.recipients.iter().all(|r| !r.trim().is_empty())
    }
}
