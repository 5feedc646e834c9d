//! Session identity
//!
//! The browser only ever holds a random session id with an HMAC-SHA256
//! signature. Everything bound to the session lives in the session store.
//!
//! Cookie value format: `base64(id).base64(hmac_sha256(id))`

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::fmt;

use crate::error::{AppError, SessionError};

type HmacSha256 = Hmac<Sha256>;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "herokugate_session";

const SESSION_ID_BYTES: usize = 32;
const SESSION_ID_ENCODED_LEN: usize = 43;

/// Unpredictable identifier of one browser session
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a new identifier from the thread-local CSPRNG
    pub fn generate() -> Self {
        let mut bytes = [0_u8; SESSION_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix safe to put in logs
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({}..)", self.short())
    }
}

/// Keys derived from the configured session secret
pub struct SessionKeys {
    pub signing: [u8; 32],
    pub encryption: [u8; 32],
}

impl SessionKeys {
    /// Derive independent signing and encryption keys
    ///
    /// # Errors
    /// Returns `AppError::Config` if the secret cannot key an HMAC
    pub fn derive(secret: &str) -> Result<Self, AppError> {
        Ok(Self {
            signing: derive_key(secret, b"herokugate/session-cookie-signing")?,
            encryption: derive_key(secret, b"herokugate/session-record-encryption")?,
        })
    }
}

fn derive_key(secret: &str, label: &[u8]) -> Result<[u8; 32], AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Config(format!("session.secret: {e}")))?;
    mac.update(label);

    let mut key = [0_u8; 32];
    key.copy_from_slice(&mac.finalize().into_bytes());
    Ok(key)
}

/// Issues and reads the signed session cookie
pub struct SessionCookies {
    mac: HmacSha256,
    secure: bool,
    max_age_seconds: i64,
}

impl SessionCookies {
    /// # Errors
    /// Returns `AppError::Config` if the key cannot key an HMAC
    pub fn new(signing_key: &[u8], secure: bool, max_age_seconds: i64) -> Result<Self, AppError> {
        let mac = HmacSha256::new_from_slice(signing_key)
            .map_err(|e| AppError::Config(format!("session signing key: {e}")))?;
        Ok(Self {
            mac,
            secure,
            max_age_seconds,
        })
    }

    /// Create a signed cookie value for `id`
    pub fn sign(&self, id: &SessionId) -> String {
        let signature = self.signature(id.as_str());
        format!(
            "{}.{}",
            id.as_str(),
            general_purpose::URL_SAFE_NO_PAD.encode(signature)
        )
    }

    /// Verify a cookie value and return the session id it carries
    ///
    /// # Errors
    /// Returns `SessionError::InvalidCookie` if the value is malformed or
    /// its signature does not verify
    pub fn verify(&self, value: &str) -> Result<SessionId, SessionError> {
        let (id, signature_b64) = value.split_once('.').ok_or(SessionError::InvalidCookie)?;
        if id.len() != SESSION_ID_ENCODED_LEN {
            return Err(SessionError::InvalidCookie);
        }

        let signature = general_purpose::URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| SessionError::InvalidCookie)?;

        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::InvalidCookie)?;

        Ok(SessionId(id.to_string()))
    }

    /// Read the session id from a request's cookies
    ///
    /// `Ok(None)` when no session cookie was sent.
    pub fn read(&self, jar: &CookieJar) -> Result<Option<SessionId>, SessionError> {
        jar.get(SESSION_COOKIE)
            .map(|cookie| self.verify(cookie.value()))
            .transpose()
    }

    /// Build the `Set-Cookie` for `id`
    pub fn cookie(&self, id: &SessionId) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, self.sign(id)))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            // Lax so the cookie rides along on the provider's redirect back.
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.max_age_seconds))
            .build()
    }

    /// Build a cookie that clears the session cookie
    pub fn removal(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build();
        cookie.make_removal();
        cookie
    }

    fn signature(&self, id: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}
