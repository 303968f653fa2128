//! Authorization support for the version server.
//!
//! Every request carries an [`AuthToken`]; an [`Authorizer`] turns it into
//! the [`UserId`] recorded as the author of accepted commits.
//!
//! ## Signed token format
//!
//! [`HmacAuthorizer`] issues tokens of the form
//! `<user>.<timestamp>.<signature>` where `timestamp` is Unix millis in
//! decimal and `signature` is the hex HMAC-SHA256 of `<user>.<timestamp>`.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use revisor_history::{AuthToken, UserId};
use sha2::Sha256;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Resolves request credentials to a user.
pub trait Authorizer: Send + Sync {
    /// Validates `token` and returns the user it belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotAuthorized`] if the token is not accepted.
    fn validate(&self, token: &AuthToken) -> ServerResult<UserId>;
}

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token lifetime.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a configuration with a 24 hour token lifetime.
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token lifetime.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token_expiry", &self.token_expiry)
            .finish_non_exhaustive()
    }
}

/// Issues and validates signed, expiring tokens.
#[derive(Clone, Debug)]
pub struct HmacAuthorizer {
    config: AuthConfig,
}

impl HmacAuthorizer {
    /// Creates an authorizer.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for `user`, valid from now.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequest`] if the user id contains the
    /// `.` separator.
    pub fn issue_token(&self, user: &UserId) -> ServerResult<AuthToken> {
        self.issue_token_at(user, now_millis())
    }

    fn issue_token_at(&self, user: &UserId, timestamp: u64) -> ServerResult<AuthToken> {
        if user.as_str().is_empty() || user.as_str().contains('.') {
            return Err(ServerError::InvalidRequest(format!(
                "user id {user:?} cannot be carried in a token"
            )));
        }
        let claims = format!("{}.{timestamp}", user.as_str());
        let signature = self.sign(claims.as_bytes())?;
        Ok(AuthToken::new(format!("{claims}.{}", to_hex(&signature))))
    }

    fn mac(&self) -> ServerResult<HmacSha256> {
        HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("HMAC key rejected: {e}")))
    }

    fn sign(&self, data: &[u8]) -> ServerResult<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl Authorizer for HmacAuthorizer {
    fn validate(&self, token: &AuthToken) -> ServerResult<UserId> {
        let mut parts = token.as_str().rsplitn(2, '.');
        let (Some(signature_hex), Some(claims)) = (parts.next(), parts.next()) else {
            return Err(ServerError::NotAuthorized("malformed token".into()));
        };
        let Some((user, timestamp)) = claims.split_once('.') else {
            return Err(ServerError::NotAuthorized("malformed token".into()));
        };

        let signature = from_hex(signature_hex)
            .ok_or_else(|| ServerError::NotAuthorized("malformed signature".into()))?;
        let mut mac = self.mac()?;
        mac.update(claims.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| ServerError::NotAuthorized("invalid signature".into()))?;

        let issued: u64 = timestamp
            .parse()
            .map_err(|_| ServerError::NotAuthorized("malformed timestamp".into()))?;
        let expiry_millis = self.config.token_expiry.as_millis() as u64;
        if now_millis() >= issued.saturating_add(expiry_millis) {
            return Err(ServerError::NotAuthorized("token expired".into()));
        }

        Ok(UserId::new(user))
    }
}

/// Accepts a fixed set of tokens, each mapped to a user.
///
/// Useful for tests and single-tenant setups.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenAuthorizer {
    tokens: HashMap<String, UserId>,
}

impl StaticTokenAuthorizer {
    /// Creates an authorizer with no tokens.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token for `user`.
    pub fn with_token(mut self, token: impl Into<String>, user: UserId) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

impl Authorizer for StaticTokenAuthorizer {
    fn validate(&self, token: &AuthToken) -> ServerResult<UserId> {
        self.tokens
            .get(token.as_str())
            .cloned()
            .ok_or_else(|| ServerError::NotAuthorized("unknown token".into()))
    }
}

/// Trusts the caller: the token text is the user id.
///
/// Used when the server runs without authentication. Empty tokens are
/// still rejected so every commit has an author.
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenAuthorizer;

impl Authorizer for OpenAuthorizer {
    fn validate(&self, token: &AuthToken) -> ServerResult<UserId> {
        if token.as_str().is_empty() {
            return Err(ServerError::NotAuthorized("empty token".into()));
        }
        Ok(UserId::new(token.as_str()))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authorizer() -> HmacAuthorizer {
        HmacAuthorizer::new(AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec()))
    }

    #[test]
    fn issue_and_validate_token() {
        let auth = authorizer();
        let token = auth.issue_token(&UserId::new("alice")).unwrap();
        assert_eq!(auth.validate(&token).unwrap(), UserId::new("alice"));
    }

    #[test]
    fn reject_tampered_user() {
        let auth = authorizer();
        let token = auth.issue_token(&UserId::new("alice")).unwrap();
        let forged = AuthToken::new(token.as_str().replacen("alice", "mallo", 1));
        assert!(matches!(
            auth.validate(&forged),
            Err(ServerError::NotAuthorized(_))
        ));
    }

    #[test]
    fn reject_other_secret() {
        let token = authorizer().issue_token(&UserId::new("alice")).unwrap();
        let other = HmacAuthorizer::new(AuthConfig::new(b"another-secret".to_vec()));
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn reject_expired_token() {
        let auth = HmacAuthorizer::new(
            AuthConfig::new(b"secret".to_vec()).with_expiry(Duration::from_secs(60)),
        );
        let stale = auth
            .issue_token_at(&UserId::new("alice"), now_millis() - 61_000)
            .unwrap();
        assert!(matches!(
            auth.validate(&stale),
            Err(ServerError::NotAuthorized(msg)) if msg.contains("expired")
        ));
    }

    #[test]
    fn reject_garbage() {
        let auth = authorizer();
        for raw in ["", "nodots", "a.b", "alice.123.zz", "alice.notanumber.00"] {
            assert!(auth.validate(&AuthToken::new(raw)).is_err(), "{raw}");
        }
    }

    #[test]
    fn user_with_separator_cannot_get_token() {
        assert!(authorizer().issue_token(&UserId::new("a.b")).is_err());
    }

    #[test]
    fn static_tokens() {
        let auth = StaticTokenAuthorizer::new().with_token("tok-a", UserId::new("alice"));
        assert_eq!(
            auth.validate(&AuthToken::new("tok-a")).unwrap(),
            UserId::new("alice")
        );
        assert!(auth.validate(&AuthToken::new("tok-b")).is_err());
    }

    #[test]
    fn open_authorizer_uses_token_as_user() {
        assert_eq!(
            OpenAuthorizer.validate(&AuthToken::new("bob")).unwrap(),
            UserId::new("bob")
        );
        assert!(OpenAuthorizer.validate(&AuthToken::new("")).is_err());
    }

    #[test]
    fn hex_helpers() {
        assert_eq!(to_hex(&[0x00, 0xab, 0xff]), "00abff");
        assert_eq!(from_hex("00abff"), Some(vec![0x00, 0xab, 0xff]));
        assert_eq!(from_hex("abc"), None);
        assert_eq!(from_hex("zz"), None);
    }
}
