//! Communication channels (WhatsApp via Twilio).
//!
//! Channel trait so the gateway stays provider-agnostic at the handler
//! boundary: parse the webhook form, talk to the agent, render the reply
//! markup.

mod inbound;
mod whatsapp;

pub use inbound::{InboundMessage, MediaItem};
pub use whatsapp::{
    empty_reply, parse_webhook_form, render_reply, ChannelError, MediaFetcher,
    TwilioWhatsAppChannel, WebhookEvent, WhatsAppChannel, FALLBACK_REPLY,
};
