//! Inbound message parsed out of one provider webhook request.

/// A user message from the provider: sender, text body, and media references.
/// Ephemeral — lives only for the duration of the webhook request.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub sender: String,
    pub body: String,
    /// Provider-assigned message id (MessageSid), when present.
    pub message_sid: Option<String>,
    pub media: Vec<MediaItem>,
}

/// One media attachment reference from the webhook form.
#[derive(Debug, Clone)]
pub struct MediaItem {
    pub url: String,
    pub content_type: String,
}
