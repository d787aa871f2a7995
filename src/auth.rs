//! Passphrase authentication and cookie-bound login sessions

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use pbkdf2::pbkdf2_hmac;
use rand::Rng;
use sha2::Sha512;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_cookies::{Cookie, Cookies};

use crate::error::{ApiError, GameError};
use crate::state::AppState;
use crate::store::{IdentityProvider, StoreResult};
use crate::types::{User, UserId, UserInfo};

/// Name of the cookie carrying the login session token
pub const SESSION_COOKIE: &str = "session";

const HASH_ITERATIONS: u32 = 1000;
const HASH_BYTES: usize = 64;
const SALT_BYTES: usize = 16;

/// Fresh random salt, hex encoded
pub fn generate_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// PBKDF2-HMAC-SHA512 of a passphrase, hex encoded
pub fn hash_passphrase(passphrase: &str, salt: &str) -> String {
    let mut key = [0u8; HASH_BYTES];
    pbkdf2_hmac::<Sha512>(passphrase.as_bytes(), salt.as_bytes(), HASH_ITERATIONS, &mut key);
    hex::encode(key)
}

pub fn verify_passphrase(passphrase: &str, salt: &str, expected_hash: &str) -> bool {
    let computed = hash_passphrase(passphrase, salt);
    constant_time_eq(computed.as_bytes(), expected_hash.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Check username and passphrase against the identity provider
pub async fn authenticate(
    identity: &dyn IdentityProvider,
    username: &str,
    passphrase: &str,
) -> StoreResult<Option<User>> {
    let Some(user) = identity.user_by_username(username).await? else {
        tracing::info!("Login failed: unknown user {}", username);
        return Ok(None);
    };

    if !verify_passphrase(passphrase, &user.salt, &user.hash) {
        tracing::info!("Login failed: wrong passphrase for {}", username);
        return Ok(None);
    }

    Ok(Some(user))
}

/// Server-side login sessions, keyed by the opaque cookie token
#[derive(Clone, Default)]
pub struct LoginSessions {
    tokens: Arc<RwLock<HashMap<String, UserId>>>,
}

impl LoginSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for a user and return its token
    pub async fn create(&self, user_id: UserId) -> String {
        let token = ulid::Ulid::new().to_string();
        self.tokens.write().await.insert(token.clone(), user_id);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<UserId> {
        self.tokens.read().await.get(token).copied()
    }

    pub async fn remove(&self, token: &str) -> Option<UserId> {
        self.tokens.write().await.remove(token)
    }
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .build()
}

/// The logged-in user for this request's cookies, if any
pub async fn current_user(state: &AppState, cookies: &Cookies) -> StoreResult<Option<UserInfo>> {
    let Some(token) = cookies.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
        return Ok(None);
    };
    let Some(user_id) = state.logins.resolve(&token).await else {
        return Ok(None);
    };
    let user = state.identity.user_by_id(user_id).await?;
    Ok(user.as_ref().map(UserInfo::from))
}

/// Middleware that rejects requests without a valid login session and
/// attaches the user as a request extension otherwise
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    match current_user(&state, &cookies).await {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => ApiError::from(GameError::Unauthorized).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
