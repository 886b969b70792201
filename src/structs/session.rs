use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;

use super::client::Client;
use super::user::Role;
use super::UserId;
use crate::errors::{GymError, GymResult};
use crate::storage::TokenStore;

/// Anything the request layer can pull a bearer token from.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> Option<String>;
}

/// Who the current token says the caller is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Option<UserId>,
    pub email: Option<String>,
    pub role: Role,
    /// The token's `exp` claim. Informational only, never enforced here.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Only `role` is required. The other claims are informational and any
/// value of an unexpected shape is ignored rather than failing the decode.
#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    user_id: Option<Value>,
    #[serde(default)]
    email: Option<Value>,
    role: Role,
    #[serde(default)]
    exp: Option<Value>,
}

/// A user id sent as a number or a numeric string.
fn claim_id(value: Option<&Value>) -> Option<UserId> {
    match value? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// NumericDate: seconds since the epoch, possibly fractional.
fn claim_time(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let secs = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    DateTime::<Utc>::from_timestamp(whole as i64, nanos)
}

/// Decodes the identity embedded in a JWT's payload.
///
/// The signature is not checked. Anything that is not three dot-separated
/// segments with a base64url JSON payload carrying a `role` yields `None`.
pub fn decode_identity(token: &str) -> Option<Identity> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return None;
    };

    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;

    Some(Identity {
        id: claim_id(claims.id.as_ref()).or_else(|| claim_id(claims.user_id.as_ref())),
        email: claims
            .email
            .as_ref()
            .and_then(Value::as_str)
            .map(str::to_string),
        role: claims.role,
        expires_at: claim_time(claims.exp.as_ref()),
    })
}

/// Snapshot of the session. Either both token and identity are present or
/// neither is.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    token: Option<String>,
    identity: Option<Identity>,
}

impl SessionState {
    /// A token that fails to decode produces the empty state.
    pub fn from_token(token: Option<String>) -> Self {
        token
            .and_then(|token| decode_identity(&token).map(|identity| (token, identity)))
            .map(|(token, identity)| Self {
                token: Some(token),
                identity: Some(identity),
            })
            .unwrap_or_default()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// Session store: the bearer token, the identity derived from it, and the
/// durable storage the token is persisted to.
///
/// Written only by [`login`](Session::login) and [`logout`](Session::logout).
/// The HTTP [`Client`] reads the token on every request, so a change is
/// visible to the very next request.
pub struct Session {
    state: watch::Sender<SessionState>,
    store: Box<dyn TokenStore>,
}

impl Session {
    /// Creates an empty session backed by `store`. Nothing is loaded.
    pub fn new(store: impl TokenStore + 'static) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            state,
            store: Box::new(store),
        }
    }

    /// Creates a session from whatever token `store` holds. A persisted token
    /// that no longer decodes is wiped.
    pub fn restore(store: impl TokenStore + 'static) -> GymResult<Self> {
        let persisted = store.load()?;
        let session = Self::new(store);

        if let Some(token) = persisted {
            if session.login(token)?.is_none() {
                tracing::warn!("Discarded persisted token that could not be decoded");
            }
        }

        Ok(session)
    }

    /// Stores `token` and derives the identity from it.
    ///
    /// Returns `None` when the token does not decode. In that case the
    /// session is destroyed rather than left half-populated.
    pub fn login(&self, token: impl Into<String>) -> GymResult<Option<Identity>> {
        let next = SessionState::from_token(Some(token.into()));

        match next.token() {
            Some(token) => self.store.save(token)?,
            None => {
                self.logout()?;
                return Ok(None);
            }
        }

        let identity = next.identity.clone();
        if let Some(identity) = &identity {
            tracing::info!(role = %identity.role, email = ?identity.email, "Session established");
        }
        self.state.send_replace(next);

        Ok(identity)
    }

    /// Clears token and identity. The in-memory session is always cleared,
    /// even if removing the persisted token fails.
    pub fn logout(&self) -> GymResult<()> {
        let previous = self.state.send_replace(SessionState::default());
        if previous.is_authenticated() {
            tracing::info!("Session cleared");
        }
        self.store.clear()
    }

    /// Authenticates against the backend and, when the account's role may use
    /// the dashboard, stores the returned token.
    ///
    /// Trainer and member accounts are rejected with [`GymError::AccessDenied`]
    /// before anything is stored.
    pub async fn sign_in(&self, client: &Client, email: &str, password: &str) -> GymResult<Identity> {
        let response = client.login(email, password).await?;

        if !response.user.role.can_use_dashboard() {
            tracing::warn!(role = %response.user.role, "Rejected login for non-dashboard role");
            return Err(GymError::AccessDenied);
        }

        self.login(response.token)?.ok_or(GymError::MalformedToken)
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Subscribes to login and logout.
    pub fn on_change(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

impl TokenSource for Session {
    fn token(&self) -> Option<String> {
        self.state.borrow().token.clone()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) fn encode_token(claims: serde_json::Value) -> String {
    let header = BASE64_URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = BASE64_URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryTokenStore;
    use serde_json::json;
    use std::sync::Arc;

    fn admin_token() -> String {
        encode_token(json!({ "user_id": 1, "role": "admin", "exp": 1_700_000_000 }))
    }

    #[test]
    fn identity_is_derived_from_claims() {
        let token = encode_token(json!({ "id": 7, "email": "staff@gym.test", "role": "staff" }));
        let identity = decode_identity(&token).unwrap();

        assert_eq!(identity.id, Some(7));
        assert_eq!(identity.email.as_deref(), Some("staff@gym.test"));
        assert_eq!(identity.role, Role::Staff);
        assert_eq!(identity.expires_at, None);
    }

    #[test]
    fn decoding_is_pure() {
        let token = admin_token();
        assert_eq!(decode_identity(&token), decode_identity(&token));
        assert_eq!(decode_identity(&token).unwrap().id, Some(1));
    }

    #[test]
    fn malformed_tokens_have_no_identity() {
        let no_role = encode_token(json!({ "user_id": 3 }));
        let not_json = format!("h.{}.s", BASE64_URL_SAFE_NO_PAD.encode("hello"));

        for token in [
            "",
            "not-a-jwt",
            "a.b",
            "a.b.c.d",
            "eyJhbGciOiJIUzI1NiJ9.!!!.sig",
            no_role.as_str(),
            not_json.as_str(),
        ] {
            assert_eq!(decode_identity(token), None, "token {token:?}");
        }
    }

    #[test]
    fn loosely_typed_claims_still_decode() {
        let fractional_exp =
            encode_token(json!({ "user_id": 1, "role": "admin", "exp": 1_900_000_000.5 }));
        let identity = decode_identity(&fractional_exp).unwrap();
        assert_eq!(identity.id, Some(1));
        assert_eq!(
            identity.expires_at.map(|exp| exp.timestamp()),
            Some(1_900_000_000)
        );

        let string_id = encode_token(json!({ "user_id": "12", "role": "staff" }));
        assert_eq!(decode_identity(&string_id).unwrap().id, Some(12));

        let both_ids = encode_token(json!({ "id": 3, "user_id": 4, "role": "admin" }));
        assert_eq!(decode_identity(&both_ids).unwrap().id, Some(3));

        let junk_claims = encode_token(json!({ "user_id": "abc", "email": 5, "exp": "soon", "role": "admin" }));
        let identity = decode_identity(&junk_claims).unwrap();
        assert_eq!(identity.id, None);
        assert_eq!(identity.email, None);
        assert_eq!(identity.expires_at, None);
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn login_keeps_token_with_fractional_exp() {
        let session = Session::new(MemoryTokenStore::new());
        let token = encode_token(json!({ "user_id": 1, "role": "admin", "exp": 1_900_000_000.5 }));

        assert!(session.login(token.clone()).unwrap().is_some());
        assert_eq!(session.token(), Some(token));
    }

    #[test]
    fn expired_tokens_still_decode() {
        let identity = decode_identity(&admin_token()).unwrap();
        assert!(identity.is_expired(Utc::now()));
        assert!(identity.is_admin());
    }

    #[test]
    fn login_and_logout_move_token_and_identity_together() {
        let session = Session::new(MemoryTokenStore::new());
        assert!(!session.is_authenticated());
        assert_eq!(session.token(), None);

        let identity = session.login(admin_token()).unwrap().unwrap();
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(session.token(), Some(admin_token()));
        assert_eq!(session.identity(), Some(identity));

        session.logout().unwrap();
        let state = session.snapshot();
        assert_eq!(state.token(), None);
        assert_eq!(state.identity(), None);
    }

    #[test]
    fn malformed_login_destroys_the_session() {
        let store = Arc::new(MemoryTokenStore::new());
        let session = Session::new(SharedStore(store.clone()));
        session.login(admin_token()).unwrap();

        assert_eq!(session.login("garbage").unwrap(), None);
        assert_eq!(session.snapshot(), SessionState::default());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn restore_reads_persisted_token() {
        let store = MemoryTokenStore::new();
        store.save(&admin_token()).unwrap();

        let session = Session::restore(store).unwrap();
        assert_eq!(session.identity().map(|i| i.role), Some(Role::Admin));
    }

    #[test]
    fn restore_discards_undecodable_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save("junk").unwrap();

        let session = Session::restore(SharedStore(store.clone())).unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn listeners_see_login_and_logout() {
        let session = Session::new(MemoryTokenStore::new());
        let mut changes = session.on_change();

        session.login(admin_token()).unwrap();
        changes.changed().await.unwrap();
        assert!(changes.borrow_and_update().is_authenticated());

        session.logout().unwrap();
        changes.changed().await.unwrap();
        assert!(!changes.borrow_and_update().is_authenticated());
    }

    struct SharedStore(Arc<MemoryTokenStore>);

    impl TokenStore for SharedStore {
        fn load(&self) -> GymResult<Option<String>> {
            self.0.load()
        }
        fn save(&self, token: &str) -> GymResult<()> {
            self.0.save(token)
        }
        fn clear(&self) -> GymResult<()> {
            self.0.clear()
        }
    }
}
