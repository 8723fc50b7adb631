//! Bearer token verification.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a relay bearer token.
///
/// Issuers put the numeric user id in `user_id`; tokens minted by generic
/// identity providers carry it as a numeric `sub` instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: i64,
}

impl Claims {
    /// The authenticated user id, if the token names one.
    pub fn user_id(&self) -> Option<i64> {
        self.user_id
            .or_else(|| self.sub.as_deref().and_then(|s| s.parse().ok()))
    }
}

/// Verifies bearer tokens presented by clients.
pub trait TokenVerifier: Send + Sync {
    /// Returns the claims of a valid token, or `None` if the token is
    /// malformed, badly signed or expired.
    fn verify(&self, token: &str) -> Option<Claims>;

    /// Verify `token` and extract the user id in one step.
    fn authenticate(&self, token: &str) -> Option<i64> {
        self.verify(token)?.user_id()
    }
}

/// HS256 verifier backed by a shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Option<Claims> {
        match jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                None
            }
        }
    }
}
