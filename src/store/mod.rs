//! Session-scoped token storage
//!
//! Every value is keyed by the session id that owns it. Tokens and pending
//! state tokens live in separate slots so that consuming the state is a
//! single atomic take. Values are sealed before they reach a backend.
//!
//! Slot layout:
//! - `herokugate:token:{session_id}` - the session's access token
//! - `herokugate:state:{session_id}` - the pending login's state token

mod memory;
mod redis_backend;
mod seal;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use seal::RecordSealer;

use serde::{Serialize, de::DeserializeOwned};

use crate::auth::{AccessToken, SessionId, StateToken};
use crate::error::SessionError;

/// Storage backend for sealed session values
pub enum SessionBackend {
    Memory(MemoryBackend),
    Redis(RedisBackend),
}

impl SessionBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        match self {
            SessionBackend::Memory(backend) => Ok(backend.get(key).await),
            SessionBackend::Redis(backend) => backend.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), SessionError> {
        match self {
            SessionBackend::Memory(backend) => {
                backend.set(key, value).await;
                Ok(())
            }
            SessionBackend::Redis(backend) => backend.set(key, value).await,
        }
    }

    async fn take(&self, key: &str) -> Result<Option<Vec<u8>>, SessionError> {
        match self {
            SessionBackend::Memory(backend) => Ok(backend.take(key).await),
            SessionBackend::Redis(backend) => backend.take(key).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        match self {
            SessionBackend::Memory(backend) => {
                backend.remove(key).await;
                Ok(())
            }
            SessionBackend::Redis(backend) => backend.remove(key).await,
        }
    }
}

/// Result of a token lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenLookup {
    /// No token was ever stored for the session, or it was invalidated
    Absent,
    /// A token is stored but its provider-reported lifetime has passed
    Expired(AccessToken),
    Present(AccessToken),
}

#[derive(Clone, Copy)]
enum Slot {
    Token,
    State,
}

impl Slot {
    fn key(self, session: &SessionId) -> String {
        let kind = match self {
            Slot::Token => "token",
            Slot::State => "state",
        };
        format!("herokugate:{}:{}", kind, session.as_str())
    }
}

/// Per-session token store
pub struct SessionTokenStore {
    backend: SessionBackend,
    sealer: RecordSealer,
}

impl SessionTokenStore {
    pub fn new(backend: SessionBackend, sealer: RecordSealer) -> Self {
        Self { backend, sealer }
    }

    /// Associate `token` with `session`, replacing any previous token
    pub async fn put(&self, session: &SessionId, token: &AccessToken) -> Result<(), SessionError> {
        self.write(Slot::Token, session, token).await
    }

    /// Look up the token for `session`
    ///
    /// # Errors
    /// `SessionError::Corrupt` when a stored value fails to open; the caller
    /// decides whether to invalidate
    pub async fn get(&self, session: &SessionId) -> Result<TokenLookup, SessionError> {
        let key = Slot::Token.key(session);
        let Some(sealed) = self.backend.get(&key).await? else {
            return Ok(TokenLookup::Absent);
        };

        let token: AccessToken = self.open(&key, &sealed)?;
        if token.is_expired() {
            Ok(TokenLookup::Expired(token))
        } else {
            Ok(TokenLookup::Present(token))
        }
    }

    /// Remove everything stored for `session`
    pub async fn invalidate(&self, session: &SessionId) -> Result<(), SessionError> {
        self.backend.remove(&Slot::Token.key(session)).await?;
        self.backend.remove(&Slot::State.key(session)).await
    }

    /// Record the pending login's state token, replacing any earlier one
    pub async fn put_state(
        &self,
        session: &SessionId,
        state: &StateToken,
    ) -> Result<(), SessionError> {
        self.write(Slot::State, session, state).await
    }

    /// Remove and return the pending state token
    ///
    /// A state can be taken at most once, even by concurrent callbacks.
    pub async fn take_state(&self, session: &SessionId) -> Result<Option<StateToken>, SessionError> {
        let key = Slot::State.key(session);
        match self.backend.take(&key).await? {
            Some(sealed) => self.open(&key, &sealed).map(Some),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(
        &self,
        slot: Slot,
        session: &SessionId,
        value: &T,
    ) -> Result<(), SessionError> {
        let key = slot.key(session);
        let plaintext =
            serde_json::to_vec(value).map_err(|e| SessionError::Backend(e.to_string()))?;
        let sealed = self.sealer.seal(&key, &plaintext)?;
        self.backend.set(&key, sealed).await
    }

    fn open<T: DeserializeOwned>(&self, key: &str, sealed: &[u8]) -> Result<T, SessionError> {
        let plaintext = self.sealer.open(key, sealed)?;
        serde_json::from_slice(&plaintext).map_err(|_| SessionError::Corrupt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StateTokenIssuer;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn store() -> SessionTokenStore {
        SessionTokenStore::new(
            SessionBackend::Memory(MemoryBackend::new(std::time::Duration::from_secs(60))),
            RecordSealer::new(&[9_u8; 32]),
        )
    }

    fn token(value: &str) -> AccessToken {
        let mut token = AccessToken::new(value, "Bearer");
        token.expires_at = Some(Utc::now() + Duration::hours(8));
        token
    }

    #[tokio::test]
    async fn put_then_get_returns_token() {
        let store = store();
        let session = SessionId::generate();

        let stored = token("access-a");
        store.put(&session, &stored).await.unwrap();
        assert_eq!(
            store.get(&session).await.unwrap(),
            TokenLookup::Present(stored)
        );
    }

    async fn stored_token(store: &SessionTokenStore, session: &SessionId) -> AccessToken {
        match store.get(session).await.unwrap() {
            TokenLookup::Present(token) | TokenLookup::Expired(token) => token,
            TokenLookup::Absent => panic!("token missing"),
        }
    }

    #[tokio::test]
    async fn tokens_are_isolated_between_sessions() {
        let store = store();
        let session_a = SessionId::generate();
        let session_b = SessionId::generate();

        store.put(&session_a, &token("access-a")).await.unwrap();
        assert_eq!(store.get(&session_b).await.unwrap(), TokenLookup::Absent);

        store.put(&session_b, &token("access-b")).await.unwrap();
        assert_eq!(
            stored_token(&store, &session_a).await.secret(),
            "access-a"
        );
        assert_eq!(
            stored_token(&store, &session_b).await.secret(),
            "access-b"
        );
    }

    #[tokio::test]
    async fn put_overwrites_previous_token() {
        let store = store();
        let session = SessionId::generate();

        store.put(&session, &token("first")).await.unwrap();
        store.put(&session, &token("second")).await.unwrap();
        assert_eq!(
            stored_token(&store, &session).await.secret(),
            "second"
        );
    }

    #[tokio::test]
    async fn invalidate_removes_token_and_state() {
        let store = store();
        let session = SessionId::generate();
        let state = StateTokenIssuer::new().issue();

        store.put(&session, &token("access")).await.unwrap();
        store.put_state(&session, &state).await.unwrap();
        store.invalidate(&session).await.unwrap();

        assert_eq!(store.get(&session).await.unwrap(), TokenLookup::Absent);
        assert_eq!(store.take_state(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_token_is_distinct_from_absent() {
        let store = store();
        let session = SessionId::generate();
        let mut expired = token("old");
        expired.expires_at = Some(Utc::now() - Duration::minutes(1));

        store.put(&session, &expired).await.unwrap();
        assert!(matches!(
            store.get(&session).await.unwrap(),
            TokenLookup::Expired(t) if t.secret() == "old"
        ));
    }

    #[tokio::test]
    async fn state_can_be_taken_once() {
        let store = store();
        let session = SessionId::generate();
        let state = StateTokenIssuer::new().issue();

        store.put_state(&session, &state).await.unwrap();
        assert_eq!(store.take_state(&session).await.unwrap(), Some(state));
        assert_eq!(store.take_state(&session).await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_takes_yield_one_state() {
        let store = Arc::new(store());
        let session = SessionId::generate();
        store
            .put_state(&session, &StateTokenIssuer::new().issue())
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                store.take_state(&session).await.unwrap()
            }));
        }

        let mut taken = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                taken += 1;
            }
        }
        assert_eq!(taken, 1);
    }

    #[tokio::test]
    async fn tampered_record_is_corrupt() {
        let store = store();
        let session = SessionId::generate();
        store
            .backend
            .set(&Slot::Token.key(&session), b"not a sealed record".to_vec())
            .await
            .unwrap();

        assert!(matches!(
            store.get(&session).await,
            Err(SessionError::Corrupt)
        ));
    }

    #[tokio::test]
    async fn record_copied_to_another_session_does_not_open() {
        let store = store();
        let victim = SessionId::generate();
        let attacker = SessionId::generate();
        store.put(&victim, &token("victim-token")).await.unwrap();

        let sealed = store
            .backend
            .get(&Slot::Token.key(&victim))
            .await
            .unwrap()
            .unwrap();
        store
            .backend
            .set(&Slot::Token.key(&attacker), sealed)
            .await
            .unwrap();

        assert!(matches!(
            store.get(&attacker).await,
            Err(SessionError::Corrupt)
        ));
    }
}
