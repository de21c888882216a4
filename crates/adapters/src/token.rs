// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token minting for toolchain credentials.
//!
//! The coordinator and executor share an internal secret; tokens minted from
//! it let the toolchain authenticate against the coordinator's registry and
//! API hosts. Minting failures are not fatal to a job — the credentials
//! artifact is simply skipped and unauthenticated toolchain calls fail
//! downstream instead.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Token lifetime (seconds).
const TOKEN_TTL_SECS: u64 = 24 * 60 * 60;

/// Errors from token minting.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("no signing secret configured")]
    MissingSecret,
}

/// Capability yielding an opaque bearer token, or failing.
pub trait TokenMinter: Send + Sync {
    fn mint(&self) -> Result<String, TokenError>;
}

/// Mints HS256 tokens signed with the shared internal secret.
pub struct SecretTokenMinter {
    secret: Option<String>,
}

impl SecretTokenMinter {
    pub fn new(secret: Option<String>) -> Self {
        Self { secret: secret.filter(|s| !s.is_empty()) }
    }
}

impl TokenMinter for SecretTokenMinter {
    fn mint(&self) -> Result<String, TokenError> {
        let secret = self.secret.as_deref().ok_or(TokenError::MissingSecret)?;

        let now =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let header = json!({"alg": "HS256", "typ": "JWT"});
        let claims = json!({
            "iss": "quarry",
            "sub": "internal",
            "iat": now,
            "exp": now + TOKEN_TTL_SECS,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let signature = hmac_sha256(secret.as_bytes(), signing_input.as_bytes());
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }
}

/// HMAC-SHA256 (RFC 2104) over sha2.
fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    const BLOCK: usize = 64;

    let mut key_block = [0u8; BLOCK];
    if key.len() > BLOCK {
        key_block[..32].copy_from_slice(&Sha256::digest(key));
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    let ipad: Vec<u8> = key_block.iter().map(|b| b ^ 0x36).collect();
    inner.update(&ipad);
    inner.update(message);
    let inner_hash = inner.finalize();

    let mut outer = Sha256::new();
    let opad: Vec<u8> = key_block.iter().map(|b| b ^ 0x5c).collect();
    outer.update(&opad);
    outer.update(inner_hash);
    outer.finalize().into()
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{TokenError, TokenMinter};

    /// Fake minter returning a fixed token, or failing when none is set.
    pub struct FakeTokenMinter {
        token: Option<String>,
    }

    impl FakeTokenMinter {
        pub fn with_token(token: impl Into<String>) -> Self {
            Self { token: Some(token.into()) }
        }

        pub fn failing() -> Self {
            Self { token: None }
        }
    }

    impl TokenMinter for FakeTokenMinter {
        fn mint(&self) -> Result<String, TokenError> {
            self.token.clone().ok_or(TokenError::MissingSecret)
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeTokenMinter;

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
