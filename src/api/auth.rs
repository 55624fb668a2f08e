//! JWT authentication
//!
//! Stateless bearer tokens signed with a shared secret. Credentials are
//! checked against the user table in the record store (bcrypt hashes);
//! tokens carry the user id so handlers can scope analytics without a
//! store lookup.

use bcrypt::verify;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::store::RecordStore;
use crate::types::User;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id, `usr_XXXXXX`)
    pub sub: String,
    /// User email at issue time
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    pub fn new(user: &User, ttl_seconds: i64) -> Self {
        let now = crate::utils::current_timestamp();
        Self {
            sub: user.id.clone(),
            email: user.email.clone(),
            iat: now,
            exp: now + ttl_seconds,
        }
    }

    pub fn is_expired(&self) -> bool {
        crate::utils::current_timestamp() > self.exp
    }
}

/// Issued-token response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// JWT manager: signing, validation, credential checks
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    pub access_token_ttl: i64,
}

impl JwtAuth {
    pub fn new(secret: &str, access_token_ttl: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_ttl,
        }
    }

    /// Build from application config. Without a configured secret a random
    /// one is generated, which invalidates outstanding tokens on restart.
    pub fn from_config(config: &AppConfig) -> Result<Self, AuthError> {
        let secret = match &config.jwt_secret {
            Some(secret) => {
                if secret.len() < 32 {
                    return Err(AuthError::InvalidSecret(
                        "PULSE_JWT_SECRET must be at least 32 characters".to_string(),
                    ));
                }
                secret.clone()
            }
            None => {
                eprintln!(
                    "[Auth] PULSE_JWT_SECRET not set, generated an ephemeral secret; \
                     tokens will not survive a restart"
                );
                Self::generate_secure_secret()
            }
        };

        Ok(Self::new(&secret, config.access_token_ttl))
    }

    /// Generate a 64-char hex secret from process-local entropy
    fn generate_secure_secret() -> String {
        use std::collections::hash_map::RandomState;
        use std::hash::{BuildHasher, Hasher};

        let now = chrono::Utc::now();
        let timestamp = now.timestamp_nanos_opt().unwrap_or(0);

        let state = RandomState::new();
        let mut hasher = state.build_hasher();
        hasher.write_i64(timestamp);
        hasher.write_u32(std::process::id());
        let hash1 = hasher.finish();

        let state2 = RandomState::new();
        let mut hasher2 = state2.build_hasher();
        hasher2.write_u64(hash1);
        hasher2.write_i64(now.timestamp_micros());
        let hash2 = hasher2.finish();

        format!(
            "{:016x}{:016x}{:016x}{:016x}",
            hash1,
            hash2,
            timestamp as u64,
            hash1 ^ hash2
        )
    }

    /// Check credentials against the user table
    pub fn authenticate(
        &self,
        store: &RecordStore,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let user = store
            .find_user_by_email(email)
            .ok_or(AuthError::InvalidCredentials)?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;

        if verify(password, hash).unwrap_or(false) {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Issue an access token for a user
    pub fn issue_token(&self, user: &User) -> Result<TokenResponse, AuthError> {
        let claims = Claims::new(user, self.access_token_ttl);
        let access_token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenError(e.to_string()))?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_token_ttl,
        })
    }

    /// Validate a token and return its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let token_data: TokenData<Claims> =
            decode(token, &self.decoding_key, &Validation::default())
                .map_err(|e| AuthError::TokenError(e.to_string()))?;

        if token_data.claims.is_expired() {
            return Err(AuthError::TokenExpired);
        }

        Ok(token_data.claims)
    }

    /// Validate a token from an Authorization header value.
    /// Supports "Bearer <token>" or a bare token.
    pub fn validate_authorization(&self, auth_header: &str) -> Result<Claims, AuthError> {
        let token = auth_header.strip_prefix("Bearer ").unwrap_or(auth_header);
        self.validate_token(token)
    }
}

/// Authentication errors
#[derive(Debug, Clone)]
pub enum AuthError {
    InvalidCredentials,
    InvalidSecret(String),
    TokenError(String),
    TokenExpired,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::InvalidSecret(msg) => write!(f, "Invalid secret: {}", msg),
            AuthError::TokenError(msg) => write!(f, "Token error: {}", msg),
            AuthError::TokenExpired => write!(f, "Token has expired"),
        }
    }
}

impl std::error::Error for AuthError {}
