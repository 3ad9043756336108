//! Bearer-token verification and identity extraction

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Claims the gateway requires from a verified token
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier of the caller
    pub sub: String,
    /// Role string enforced against route allow-lists
    pub role: String,
    /// Expiry, seconds since the epoch
    pub exp: usize,
}

/// Per-request authentication outcome; never persisted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthResult {
    pub authenticated: bool,
    pub user_id: Option<String>,
    pub role: Option<String>,
}

impl AuthResult {
    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user_id: None,
            role: None,
        }
    }
}

/// Verifies bearer credentials against a shared secret.
///
/// Every failure path (missing header, wrong scheme, bad signature,
/// expired token) yields an anonymous result; nothing escapes this
/// boundary as an error.
pub struct AuthGuard {
    // None means no key was configured; every caller stays anonymous.
    // An empty-string HMAC key would still verify tokens signed with
    // the empty secret, so absence must not degrade into "".
    decoding_key: Option<DecodingKey>,
    validation: Validation,
}

impl AuthGuard {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: Some(DecodingKey::from_secret(secret.as_bytes())),
            validation: Validation::default(),
        }
    }

    /// Guard without a verification key; rejects every credential
    pub fn disabled() -> Self {
        Self {
            decoding_key: None,
            validation: Validation::default(),
        }
    }

    /// Authenticate from the raw `Authorization` header value
    pub fn authenticate(&self, authorization: Option<&str>) -> AuthResult {
        let decoding_key = match &self.decoding_key {
            Some(key) => key,
            None => return AuthResult::anonymous(),
        };

        let header = match authorization {
            Some(h) => h,
            None => return AuthResult::anonymous(),
        };

        let token = match header.strip_prefix("Bearer ") {
            Some(t) => t,
            None => {
                debug!("Authorization header present but not a bearer token");
                return AuthResult::anonymous();
            }
        };

        match decode::<Claims>(token, decoding_key, &self.validation) {
            Ok(data) => AuthResult {
                authenticated: true,
                user_id: Some(data.claims.sub),
                role: Some(data.claims.role),
            },
            Err(e) => {
                debug!("Token verification failed: {}", e);
                AuthResult::anonymous()
            }
        }
    }
}
