//! WhatsApp channel over the Twilio Messaging API: webhook form parsing,
//! media download, and TwiML reply rendering.

use crate::agent::Agent;
use crate::channels::inbound::{InboundMessage, MediaItem};
use async_trait::async_trait;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;

const MEDIA_TIMEOUT: Duration = Duration::from_secs(20);

/// Reply sent when the runtime is unreachable or errors out.
pub const FALLBACK_REPLY: &str =
    "Sorry, something went wrong while handling your message. Please try again in a moment.";

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("missing 'From' in webhook form")]
    MissingSender,
    #[error("media download failed: {0}")]
    Media(String),
}

/// What one webhook POST turned out to be.
#[derive(Debug)]
pub enum WebhookEvent {
    /// Delivery-status callback; acknowledged with an empty response.
    StatusCallback,
    Message(InboundMessage),
}

/// Parse the provider's form fields into a webhook event.
pub fn parse_webhook_form(form: &[(String, String)]) -> Result<WebhookEvent, ChannelError> {
    let field = |name: &str| {
        form.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    // Delivery-status callbacks carry MessageStatus/SmsSid and no user content.
    if field("MessageStatus").is_some() && field("SmsSid").is_some() {
        return Ok(WebhookEvent::StatusCallback);
    }

    let sender = field("From").map(str::trim).unwrap_or_default();
    if sender.is_empty() {
        return Err(ChannelError::MissingSender);
    }
    let body = field("Body").map(str::trim).unwrap_or_default().to_string();

    let num_media: usize = field("NumMedia")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0);
    let mut media = Vec::new();
    for i in 0..num_media {
        let url = field(&format!("MediaUrl{}", i)).unwrap_or_default();
        let content_type = field(&format!("MediaContentType{}", i)).unwrap_or_default();
        if !url.is_empty() {
            media.push(MediaItem {
                url: url.to_string(),
                content_type: content_type.to_string(),
            });
        }
    }

    Ok(WebhookEvent::Message(InboundMessage {
        sender: sender.to_string(),
        body,
        message_sid: field("MessageSid").map(str::to_string),
        media,
    }))
}

/// Downloads provider-hosted media and converts it to a base64 data URI.
#[derive(Clone)]
pub struct MediaFetcher {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
}

impl MediaFetcher {
    pub fn new(account_sid: String, auth_token: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(MEDIA_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            account_sid,
            auth_token,
        }
    }

    /// Download a media URL (provider basic auth) and return a
    /// `data:{mime};base64,{payload}` URI. The response Content-Type wins over
    /// the declared form type; anything that is not an image is coerced to
    /// image/jpeg.
    pub async fn fetch_data_uri(
        &self,
        url: &str,
        declared_type: &str,
    ) -> Result<String, ChannelError> {
        log::info!("downloading media from {}", url);
        let res = self
            .client
            .get(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| ChannelError::Media(e.to_string()))?;
        if !res.status().is_success() {
            return Err(ChannelError::Media(format!(
                "{} fetching {}",
                res.status(),
                url
            )));
        }
        let header_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let mut mime = header_type
            .filter(|s| !s.is_empty())
            .or_else(|| {
                let t = declared_type.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            })
            .unwrap_or_else(|| "image/jpeg".to_string());
        if !mime.starts_with("image/") {
            log::warn!("coercing non-image content type '{}' to image/jpeg", mime);
            mime = "image/jpeg".to_string();
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| ChannelError::Media(e.to_string()))?;
        let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(format!("data:{};base64,{}", mime, b64))
    }
}

/// Wrap a reply text in the provider's messaging markup, XML-escaped.
pub fn render_reply(text: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        quick_xml::escape::escape(text)
    )
}

/// Empty acknowledgement (status callbacks, nothing to say).
pub fn empty_reply() -> String {
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response></Response>".to_string()
}

/// A WhatsApp provider integration: verified webhook form in, reply markup out.
#[async_trait]
pub trait WhatsAppChannel: Send + Sync {
    async fn handle_message(&self, form: &[(String, String)]) -> Result<String, ChannelError>;
}

/// Twilio-backed channel: downloads image attachments, forwards the message to
/// the agent, and renders the reply as TwiML.
pub struct TwilioWhatsAppChannel {
    agent: Arc<Agent>,
    media: MediaFetcher,
}

impl TwilioWhatsAppChannel {
    pub fn new(agent: Arc<Agent>, media: MediaFetcher) -> Self {
        Self { agent, media }
    }
}

#[async_trait]
impl WhatsAppChannel for TwilioWhatsAppChannel {
    async fn handle_message(&self, form: &[(String, String)]) -> Result<String, ChannelError> {
        let message = match parse_webhook_form(form)? {
            WebhookEvent::StatusCallback => {
                log::info!("delivery callback received, acknowledging without action");
                return Ok(empty_reply());
            }
            WebhookEvent::Message(m) => m,
        };

        let mut images = Vec::new();
        for item in &message.media {
            if !item.content_type.starts_with("image/") {
                log::debug!(
                    "skipping non-image attachment {} ({})",
                    item.url,
                    item.content_type
                );
                continue;
            }
            match self.media.fetch_data_uri(&item.url, &item.content_type).await {
                Ok(uri) => images.push(uri),
                Err(e) => log::warn!("failed to download {}: {}", item.url, e),
            }
        }

        log::info!(
            "whatsapp: message from {} ({} chars, {} image(s))",
            message.sender,
            message.body.len(),
            images.len()
        );

        match self.agent.invoke(&message.sender, &message.body, &images).await {
            Ok(reply) => Ok(render_reply(&reply)),
            Err(e) => {
                log::error!("agent invoke failed: {}", e);
                Ok(render_reply(FALLBACK_REPLY))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_text_message() {
        let event = parse_webhook_form(&form(&[
            ("MessageSid", "SM123"),
            ("From", "whatsapp:+14155550100"),
            ("Body", "  hello  "),
            ("NumMedia", "0"),
        ]))
        .expect("parse");
        let WebhookEvent::Message(msg) = event else {
            panic!("expected message");
        };
        assert_eq!(msg.sender, "whatsapp:+14155550100");
        assert_eq!(msg.body, "hello");
        assert_eq!(msg.message_sid.as_deref(), Some("SM123"));
        assert!(msg.media.is_empty());
    }

    #[test]
    fn parses_media_references() {
        let event = parse_webhook_form(&form(&[
            ("From", "whatsapp:+14155550100"),
            ("Body", "look at this"),
            ("NumMedia", "2"),
            ("MediaUrl0", "https://api.example.com/media/0"),
            ("MediaContentType0", "image/jpeg"),
            ("MediaUrl1", "https://api.example.com/media/1"),
            ("MediaContentType1", "application/pdf"),
        ]))
        .expect("parse");
        let WebhookEvent::Message(msg) = event else {
            panic!("expected message");
        };
        assert_eq!(msg.media.len(), 2);
        assert_eq!(msg.media[0].content_type, "image/jpeg");
        assert_eq!(msg.media[1].url, "https://api.example.com/media/1");
    }

    #[test]
    fn detects_status_callback() {
        let event = parse_webhook_form(&form(&[
            ("SmsSid", "SM123"),
            ("MessageStatus", "delivered"),
        ]))
        .expect("parse");
        assert!(matches!(event, WebhookEvent::StatusCallback));
    }

    #[test]
    fn missing_sender_is_an_error() {
        let err = parse_webhook_form(&form(&[("Body", "hi")])).expect_err("should fail");
        assert!(matches!(err, ChannelError::MissingSender));
    }

    #[test]
    fn renders_escaped_twiml() {
        let xml = render_reply("a < b & \"c\"");
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>a &lt; b &amp; &quot;c&quot;</Message></Response>"
        );
    }

    #[test]
    fn empty_reply_has_no_message() {
        let xml = empty_reply();
        assert!(xml.contains("<Response></Response>"));
        assert!(!xml.contains("<Message>"));
    }
}
