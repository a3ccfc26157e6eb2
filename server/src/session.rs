use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// The authenticated account behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn new(username: impl Into<String>) -> Self {
        Self(username.into())
    }

    pub fn username(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: String,
    exp: u64,
}

/// Issues and verifies HS256 session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, username: &str, name: &str) -> jsonwebtoken::errors::Result<String> {
        let exp = (chrono::Utc::now().timestamp().max(0) as u64).saturating_add(self.ttl.as_secs());
        let claims = Claims {
            sub: username.to_string(),
            name: name.to_string(),
            exp,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Resolves a token to the identity it was issued for. Missing, expired,
    /// malformed and foreign tokens all identify nobody.
    pub fn identify(&self, token: Option<&str>) -> Option<Identity> {
        let token = token?;
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(Identity(data.claims.sub)),
            Err(e) => {
                debug!("rejected session token: {e}");
                None
            }
        }
    }
}
