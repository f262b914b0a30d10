//! Browser access tokens for the signaling provider.

use crate::config::ProviderConfig;
use crate::error::VoiceError;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Content type the provider requires in the JWT header.
const TOKEN_CONTENT_TYPE: &str = "twilio-fpa;v=1";

/// Maximum length of a signaling identity.
const MAX_IDENTITY_LEN: usize = 121;

/// A freshly minted token and the identity it is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub identity: String,
    /// Unix seconds after which the provider rejects the token.
    pub expires_at: u64,
}

#[derive(Serialize)]
struct Claims<'a> {
    jti: String,
    iss: &'a str,
    sub: &'a str,
    nbf: u64,
    exp: u64,
    grants: Grants<'a>,
}

#[derive(Serialize)]
struct Grants<'a> {
    identity: &'a str,
    voice: VoiceGrant<'a>,
}

#[derive(Serialize)]
struct VoiceGrant<'a> {
    incoming: IncomingGrant,
    outgoing: OutgoingGrant<'a>,
}

#[derive(Serialize)]
struct IncomingGrant {
    allow: bool,
}

#[derive(Serialize)]
struct OutgoingGrant<'a> {
    application_sid: &'a str,
}

/// Derives the provider identity for a CRM user id.
///
/// The identity travels in provider protocol headers that reject special
/// characters, so everything outside `[A-Za-z0-9_]` becomes `_`. The mapping
/// is deterministic; an empty user id maps to `anonymous`.
pub fn signaling_identity(user_id: &str) -> String {
    let identity: String = user_id
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .take(MAX_IDENTITY_LEN)
        .collect();

    if identity.is_empty() {
        "anonymous".to_string()
    } else {
        identity
    }
}

/// Mints short-lived voice tokens bound to an identity.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    config: ProviderConfig,
}

impl TokenIssuer {
    /// Builds an issuer, refusing incomplete credentials.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::Config` when a required credential is missing.
    pub fn new(config: ProviderConfig) -> Result<Self, VoiceError> {
        config.validate_token_credentials()?;
        Ok(Self { config })
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.config.token_ttl()
    }

    /// Issues a token for `user_id`, valid from now.
    pub fn issue(&self, user_id: &str) -> Result<IssuedToken, VoiceError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.issue_at(user_id, now)
    }

    /// Issues a token for `user_id` with `now` as the not-before time.
    pub fn issue_at(&self, user_id: &str, now: u64) -> Result<IssuedToken, VoiceError> {
        let identity = signaling_identity(user_id);
        let expires_at = now + self.ttl_seconds();

        let claims = Claims {
            jti: format!("{}-{}", self.config.api_key, now),
            iss: &self.config.api_key,
            sub: &self.config.account_sid,
            nbf: now,
            exp: expires_at,
            grants: Grants {
                identity: &identity,
                voice: VoiceGrant {
                    incoming: IncomingGrant { allow: false },
                    outgoing: OutgoingGrant {
                        application_sid: &self.config.twiml_app_sid,
                    },
                },
            },
        };

        let mut header = Header::new(Algorithm::HS256);
        header.cty = Some(TOKEN_CONTENT_TYPE.to_string());

        let token = encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.config.api_secret.as_bytes()),
        )?;

        Ok(IssuedToken {
            token,
            identity,
            expires_at,
        })
    }
}
