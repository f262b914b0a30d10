//! Provider request signature validation.
//!
//! The provider signs every server-to-server request: HMAC-SHA1 keyed with
//! the account auth token over the full request URL followed by each POST
//! parameter name and value, concatenated in parameter-name order. The
//! base64 digest arrives in [`SIGNATURE_HEADER`].

use crate::error::WebhookValidationError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "X-Twilio-Signature";

type HmacSha1 = Hmac<Sha1>;

fn signing_mac(auth_token: &str, url: &str, params: &[(String, String)]) -> HmacSha1 {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC key length is valid");
    mac.update(url.as_bytes());
    for (name, value) in sorted {
        mac.update(name.as_bytes());
        mac.update(value.as_bytes());
    }
    mac
}

/// Computes the base64 signature the provider would send for a request.
pub fn compute_signature(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    let digest = signing_mac(auth_token, url, params).finalize().into_bytes();
    STANDARD.encode(digest)
}

/// Validates provider requests against the shared auth token.
#[derive(Clone)]
pub struct RequestValidator {
    auth_token: String,
}

impl std::fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestValidator")
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

impl RequestValidator {
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
        }
    }

    /// Checks `signature` for a request to `url` carrying `params`.
    ///
    /// The comparison is constant-time.
    ///
    /// # Errors
    ///
    /// Returns a [`WebhookValidationError`] describing why the request is
    /// not authentic.
    pub fn validate(
        &self,
        url: &str,
        params: &[(String, String)],
        signature: Option<&str>,
    ) -> Result<(), WebhookValidationError> {
        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(WebhookValidationError::MissingSignature)?;
        let provided = STANDARD
            .decode(signature)
            .map_err(|_| WebhookValidationError::MalformedSignature)?;

        signing_mac(&self.auth_token, url, params)
            .verify_slice(&provided)
            .map_err(|_| WebhookValidationError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_params() -> Vec<(String, String)> {
        [
            ("CallSid", "CA1234567890ABCDE"),
            ("Caller", "+12349013030"),
            ("Digits", "1234"),
            ("From", "+12349013030"),
            ("To", "+18005551212"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    const SAMPLE_URL: &str = "https://mycompany.com/myapp.php?foo=1&bar=2";

    #[test]
    fn matches_published_example() {
        assert_eq!(
            compute_signature("12345", SAMPLE_URL, &sample_params()),
            "0/KCTR6DLpKmkAf8muzZqo1nDgQ="
        );
    }

    #[test]
    fn parameter_order_does_not_matter() {
        let mut reversed = sample_params();
        reversed.reverse();
        assert_eq!(
            compute_signature("12345", SAMPLE_URL, &reversed),
            compute_signature("12345", SAMPLE_URL, &sample_params())
        );
    }

    #[test]
    fn validator_accepts_correct_signature() {
        let validator = RequestValidator::new("12345");
        assert_eq!(
            validator.validate(SAMPLE_URL, &sample_params(), Some("0/KCTR6DLpKmkAf8muzZqo1nDgQ=")),
            Ok(())
        );
    }

    #[test]
    fn validator_rejects_tampering() {
        let validator = RequestValidator::new("12345");
        let mut tampered = sample_params();
        tampered[4].1 = "+4512345678".to_string();

        assert_eq!(
            validator.validate(SAMPLE_URL, &tampered, Some("0/KCTR6DLpKmkAf8muzZqo1nDgQ=")),
            Err(WebhookValidationError::Mismatch)
        );
        assert_eq!(
            validator.validate(SAMPLE_URL, &sample_params(), None),
            Err(WebhookValidationError::MissingSignature)
        );
        assert_eq!(
            validator.validate(SAMPLE_URL, &sample_params(), Some("not base64!")),
            Err(WebhookValidationError::MalformedSignature)
        );
    }

    #[test]
    fn validator_rejects_other_secret() {
        let validator = RequestValidator::new("other-token");
        assert_eq!(
            validator.validate(SAMPLE_URL, &sample_params(), Some("0/KCTR6DLpKmkAf8muzZqo1nDgQ=")),
            Err(WebhookValidationError::Mismatch)
        );
    }
}
