//! Signed-cookie sessions.
//!
//! A session is a JSON payload carried in a cookie and authenticated with
//! HMAC-SHA256 under the server's secret key: `base64url(payload).hex(tag)`.
//! Tampered, malformed, or foreign cookies verify as absent, so a bad cookie
//! turns the request anonymous instead of erroring.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "ctxm_session";
pub const OAUTH_STATE_COOKIE: &str = "ctxm_oauth_state";

/// The authenticated user, as captured at OAuth callback time. The access
/// token rides along so handlers can call the API on the user's behalf.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub avatar_url: String,
    pub access_token: String,
}

impl SessionUser {
    /// Contexts store owner ids as strings.
    pub fn owner_id(&self) -> String {
        self.id.to_string()
    }
}

/// Signs a payload into a cookie value.
pub fn sign_value(secret: &str, payload: &[u8]) -> String {
    let tag = hex_hmac_sha256(secret.as_bytes(), payload);
    format!("{}.{}", URL_SAFE_NO_PAD.encode(payload), tag)
}

/// Verifies a cookie value and returns the embedded payload.
pub fn verify_value(secret: &str, value: &str) -> Option<Vec<u8>> {
    let (payload_b64, tag_hex) = value.split_once('.')?;
    let payload = URL_SAFE_NO_PAD.decode(payload_b64).ok()?;
    let tag = hex::decode(tag_hex).ok()?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(&payload);
    mac.verify_slice(&tag).ok()?;
    Some(payload)
}

pub fn encode_session(secret: &str, user: &SessionUser) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_vec(user)?;
    Ok(sign_value(secret, &payload))
}

pub fn decode_session(secret: &str, value: &str) -> Option<SessionUser> {
    let payload = verify_value(secret, value)?;
    serde_json::from_slice(&payload).ok()
}

/// Pulls one named cookie out of a `Cookie` header value.
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        if k == name {
            Some(v)
        } else {
            None
        }
    })
}

/// Reads and verifies the session cookie from request headers.
pub fn user_from_headers(
    secret: &str,
    headers: &axum::http::HeaderMap,
) -> Option<SessionUser> {
    let header = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    let raw = cookie_value(header, SESSION_COOKIE)?;
    decode_session(secret, raw)
}

// ============ Set-Cookie builders ============

pub fn session_cookie_header(value: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, value)
}

pub fn clear_session_cookie_header() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    )
}

/// The OAuth state nonce only needs to survive the authorize round-trip.
pub fn state_cookie_header(value: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=600",
        OAUTH_STATE_COOKIE, value
    )
}

pub fn clear_state_cookie_header() -> String {
    format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        OAUTH_STATE_COOKIE
    )
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> SessionUser {
        SessionUser {
            id: 42,
            login: "alice".to_string(),
            name: Some("Alice".to_string()),
            email: None,
            avatar_url: "https://avatars.example/alice".to_string(),
            access_token: "gho_test".to_string(),
        }
    }

    #[test]
    fn test_session_round_trip() {
        let cookie = encode_session("secret", &sample_user()).unwrap();
        let user = decode_session("secret", &cookie).unwrap();
        assert_eq!(user.id, 42);
        assert_eq!(user.login, "alice");
        assert_eq!(user.access_token, "gho_test");
    }

    #[test]
    fn test_tampered_cookie_rejected() {
        let cookie = encode_session("secret", &sample_user()).unwrap();

        // Flip a payload character.
        let mut chars: Vec<char> = cookie.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered: String = chars.into_iter().collect();
        assert!(decode_session("secret", &tampered).is_none());

        // Truncate the tag.
        let truncated = &cookie[..cookie.len() - 2];
        assert!(decode_session("secret", truncated).is_none());

        // Verify under a different key.
        assert!(decode_session("other", &cookie).is_none());
    }

    #[test]
    fn test_malformed_cookie_rejected() {
        assert!(decode_session("secret", "").is_none());
        assert!(decode_session("secret", "no-dot-here").is_none());
        assert!(decode_session("secret", "!!!.abcd").is_none());
        assert!(decode_session("secret", "YWJj.nothex").is_none());
    }

    #[test]
    fn test_cookie_value_parsing() {
        let header = "a=1; ctxm_session=abc.def; b=2";
        assert_eq!(cookie_value(header, SESSION_COOKIE), Some("abc.def"));
        assert_eq!(cookie_value(header, "a"), Some("1"));
        assert_eq!(cookie_value(header, "missing"), None);
    }
}
