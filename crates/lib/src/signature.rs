//! Twilio webhook signature validation (X-Twilio-Signature header).
//!
//! The signature is HMAC-SHA1 over the full request URL followed by the POST
//! parameters sorted by name (name then value appended for each), keyed with
//! the account auth token and base64-encoded.

use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Validates (and computes) webhook signatures for one auth token.
#[derive(Clone)]
pub struct RequestValidator {
    auth_token: String,
}

impl RequestValidator {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
        }
    }

    fn mac_over(&self, url: &str, params: &[(String, String)]) -> HmacSha1 {
        let mut sorted: Vec<&(String, String)> = params.iter().collect();
        sorted.sort();
        let mut mac = HmacSha1::new_from_slice(self.auth_token.as_bytes())
            .expect("HMAC accepts keys of any size");
        mac.update(url.as_bytes());
        for (name, value) in sorted {
            mac.update(name.as_bytes());
            mac.update(value.as_bytes());
        }
        mac
    }

    /// Compute the expected signature for a URL and form parameters.
    pub fn compute(&self, url: &str, params: &[(String, String)]) -> String {
        let mac = self.mac_over(url, params);
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Verify a provided signature in constant time. Malformed base64 is a
    /// rejection, never an error.
    pub fn validate(&self, url: &str, params: &[(String, String)], signature: &str) -> bool {
        let provided = match base64::engine::general_purpose::STANDARD.decode(signature.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        self.mac_over(url, params).verify_slice(&provided).is_ok()
    }
}
