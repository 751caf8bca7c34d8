use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use super::user::User;
use crate::Result;

/// Decoded fields of a verified access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username).
    pub sub: String,
    /// Role granted to the subject.
    pub role: String,
    /// Issued at (seconds since epoch).
    pub iat: u64,
    /// Expiration time (seconds since epoch).
    pub exp: u64,
}

/// Issues and verifies signed, time-limited access tokens.
///
/// Holds only the signing secret and the token lifetime, so a single
/// instance can be shared across tasks without locking.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    token_duration: Duration,
}

impl JwtManager {
    /// Creates a manager signing with `secret_key` (HS256).
    pub fn new(secret_key: &str, token_duration: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret_key.as_bytes()),
            validation,
            token_duration,
        }
    }

    /// Lifetime of issued tokens.
    pub fn token_duration(&self) -> Duration {
        self.token_duration
    }

    /// Issues a token for `user`, expiring after the configured duration.
    pub fn generate(&self, user: &User) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| unreachable!("System time is after UNIX_EPOCH"))
            .as_secs();

        let claims = Claims {
            sub: user.username.clone(),
            role: user.role.clone(),
            iat: now,
            exp: now.saturating_add(self.token_duration.as_secs()),
        };

        Ok(encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.encoding_key,
        )?)
    }

    /// Verifies signature and expiry of `access_token` and returns its claims.
    pub fn verify(&self, access_token: &str) -> Result<Claims> {
        let data = decode::<Claims>(access_token, &self.decoding_key, &self.validation)?;
        Ok(data.claims)
    }
}
