//! CSRF state tokens for the authorization round trip

use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// 256 bits of entropy per login attempt.
const STATE_TOKEN_BYTES: usize = 32;

/// Opaque nonce bound to one pending login attempt
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateToken(String);

impl StateToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StateToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateToken(..)")
    }
}

/// Mints and checks state tokens
///
/// Comparison goes through HMAC tags under a per-process key so that the
/// check takes the same time wherever the two values first differ.
pub struct StateTokenIssuer {
    comparison_key: [u8; 32],
}

impl StateTokenIssuer {
    pub fn new() -> Self {
        let mut comparison_key = [0_u8; 32];
        rand::thread_rng().fill_bytes(&mut comparison_key);
        Self { comparison_key }
    }

    /// Generate a fresh token from the thread-local CSPRNG
    pub fn issue(&self) -> StateToken {
        let mut bytes = [0_u8; STATE_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        StateToken(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Returns true only when `received` equals `expected` exactly
    ///
    /// An empty `received` value never verifies.
    pub fn verify(&self, expected: &StateToken, received: &str) -> bool {
        if expected.0.is_empty() || received.is_empty() {
            return false;
        }

        let Ok(mut expected_mac) = HmacSha256::new_from_slice(&self.comparison_key) else {
            return false;
        };
        expected_mac.update(expected.0.as_bytes());
        let expected_tag = expected_mac.finalize().into_bytes();

        let Ok(mut received_mac) = HmacSha256::new_from_slice(&self.comparison_key) else {
            return false;
        };
        received_mac.update(received.as_bytes());
        received_mac.verify_slice(&expected_tag).is_ok()
    }
}

impl Default for StateTokenIssuer {
    fn default() -> Self {
        Self::new()
    }
}
