//! Credential normalization.
//!
//! Users paste credentials in whatever shape their browser or another tool
//! hands them out: a bare JWT, a `Bearer ` header value, the JSON blob stored
//! in a cookie, a URL-encoded copy of that blob, a query string, a full
//! `Cookie:` header, or a shell-escaped copy of any of these. This module
//! peels those layers until it reaches a JWT-shaped access token (or an
//! opaque refresh token).
//!
//! # Search Order
//!
//! 1. Strip quote wrapping and a `Bearer ` prefix
//! 2. Accept a JWT-shaped string as-is (access tokens only)
//! 3. Parse as JSON and search for priority-ordered keys
//! 4. Parse as a URL query string
//! 5. Parse as a `key=value; key=value` cookie header
//! 6. URL-decode, path-decode and shell-unescape, then start over
//! 7. Regex-extract any JWT-shaped substring (access tokens only)
//!
//! Recursion is bounded by [`MAX_DEPTH`] and every visited string is
//! remembered, so cyclic or adversarial input always terminates.

use std::collections::HashSet;
use std::sync::OnceLock;

use base64::prelude::*;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::trace;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of unwrapping levels.
pub const MAX_DEPTH: usize = 6;

/// Keys that may hold an access token, highest priority first.
pub const ACCESS_TOKEN_KEYS: &[&str] = &[
    "accessToken",
    "access_token",
    "__wtoken",
    "wtoken",
    "idToken",
    "id_token",
    "token",
];

/// Keys that may hold a refresh token, highest priority first.
pub const REFRESH_TOKEN_KEYS: &[&str] = &[
    "refreshToken",
    "refresh_token",
    "__wrtoken",
    "wrtoken",
    "wrefresh_token",
    "refresh",
];

fn jwt_exact() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_-]+=*\.[A-Za-z0-9_-]+=*\.[A-Za-z0-9_-]+=*$")
            .unwrap_or_else(|e| panic!("invalid JWT pattern: {e}"))
    })
}

fn jwt_anywhere() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+")
            .unwrap_or_else(|e| panic!("invalid JWT pattern: {e}"))
    })
}

// ============================================================================
// Public API
// ============================================================================

/// Normalizes a raw credential into a bare access token.
///
/// Returns the input unchanged when no JWT-shaped token can be found, so
/// opaque tokens pass straight through.
pub fn normalize_access_token(raw: &str) -> String {
    extract_access_token(raw, &[]).unwrap_or_else(|| raw.to_string())
}

/// Normalizes a raw refresh credential.
///
/// Keyed values (`refreshToken`, `__wrtoken`, ...) are extracted; anything
/// else is returned with quote wrapping removed.
pub fn normalize_refresh_token(raw: &str) -> String {
    extract_refresh_token(raw, &[]).unwrap_or_else(|| unwrap_layers(raw).to_string())
}

/// Searches a raw credential, then each cookie header, for an access token.
pub fn extract_access_token(raw: &str, cookies: &[String]) -> Option<String> {
    extract(raw, cookies, TokenKind::Access)
}

/// Searches a raw credential, then each cookie header, for a refresh token.
///
/// Refresh tokens are opaque, so only keyed values are accepted.
pub fn extract_refresh_token(raw: &str, cookies: &[String]) -> Option<String> {
    extract(raw, cookies, TokenKind::Refresh)
}

/// Returns true for `header.payload.signature` with base64url segments.
pub fn is_jwt_shaped(token: &str) -> bool {
    jwt_exact().is_match(token)
}

/// Decodes the claims segment of a JWT-shaped token.
///
/// The signature is not verified.
pub fn token_claims(token: &str) -> Option<Value> {
    let token = unwrap_layers(token);
    if !is_jwt_shaped(token) {
        return None;
    }
    let segment = token.split('.').nth(1)?.trim_end_matches('=');
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(segment)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(segment))
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Reads the `exp` claim of a JWT-shaped token.
///
/// Absent or malformed claims mean "no known expiry", never an error.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let claims = token_claims(token)?;
    let exp = claims.get("exp")?;
    let seconds = exp
        .as_i64()
        .or_else(|| exp.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        .or_else(|| exp.as_str().and_then(|s| s.trim().parse().ok()))?;
    DateTime::from_timestamp(seconds, 0)
}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn keys(self) -> &'static [&'static str] {
        match self {
            Self::Access => ACCESS_TOKEN_KEYS,
            Self::Refresh => REFRESH_TOKEN_KEYS,
        }
    }
}

fn extract(raw: &str, cookies: &[String], kind: TokenKind) -> Option<String> {
    let mut visited = HashSet::new();
    std::iter::once(raw)
        .chain(cookies.iter().map(String::as_str))
        .find_map(|input| search(input, kind, 0, &mut visited))
}

fn search(input: &str, kind: TokenKind, depth: usize, visited: &mut HashSet<String>) -> Option<String> {
    if depth >= MAX_DEPTH {
        return None;
    }
    let text = unwrap_layers(input);
    if text.is_empty() || !visited.insert(text.to_string()) {
        return None;
    }
    trace!(depth, len = text.len(), ?kind, "Searching credential layer");

    if kind == TokenKind::Access && is_jwt_shaped(text) {
        return Some(text.to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if let Some(found) = search_json(&value, kind, depth + 1, visited) {
            return Some(found);
        }
    }

    if let Some(found) = search_query(text, kind, depth + 1, visited) {
        return Some(found);
    }

    if let Some(found) = search_cookie_header(text, kind, depth + 1, visited) {
        return Some(found);
    }

    for decoded in decodings(text) {
        if let Some(found) = search(&decoded, kind, depth + 1, visited) {
            return Some(found);
        }
    }

    match kind {
        TokenKind::Access => find_jwt_substring(text),
        TokenKind::Refresh => None,
    }
}

fn search_json(
    value: &Value,
    kind: TokenKind,
    depth: usize,
    visited: &mut HashSet<String>,
) -> Option<String> {
    if depth >= MAX_DEPTH {
        return None;
    }
    match value {
        Value::String(s) => search(s, kind, depth, visited),
        Value::Object(map) => {
            for key in kind.keys() {
                if let Some(found) = map.get(*key).and_then(|v| accept(v, kind, depth, visited)) {
                    return Some(found);
                }
            }
            map.values()
                .filter(|v| v.is_object() || v.is_array() || looks_structured(v))
                .find_map(|v| search_json(v, kind, depth + 1, visited))
        }
        Value::Array(items) => items
            .iter()
            .find_map(|v| search_json(v, kind, depth + 1, visited)),
        _ => None,
    }
}

fn looks_structured(value: &Value) -> bool {
    value
        .as_str()
        .map(str::trim_start)
        .is_some_and(|s| s.starts_with('{') || s.starts_with('['))
}

/// Accepts the value found under a matching key.
fn accept(value: &Value, kind: TokenKind, depth: usize, visited: &mut HashSet<String>) -> Option<String> {
    match value {
        Value::String(s) => accept_str(s, kind, depth, visited),
        Value::Object(_) | Value::Array(_) => search_json(value, kind, depth + 1, visited),
        _ => None,
    }
}

fn accept_str(raw: &str, kind: TokenKind, depth: usize, visited: &mut HashSet<String>) -> Option<String> {
    if let Some(found) = search(raw, kind, depth + 1, visited) {
        return Some(found);
    }
    match kind {
        TokenKind::Access => None,
        TokenKind::Refresh => {
            let opaque = unwrap_layers(raw);
            (!opaque.is_empty()).then(|| opaque.to_string())
        }
    }
}

fn search_query(text: &str, kind: TokenKind, depth: usize, visited: &mut HashSet<String>) -> Option<String> {
    if !text.contains('=') {
        return None;
    }
    let query = text.split_once('?').map_or(text, |(_, q)| q).replace('#', "&");
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.trim().to_string(), v.into_owned()))
        .collect();

    kind.keys().iter().find_map(|key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| accept_str(v, kind, depth, visited))
    })
}

fn search_cookie_header(
    text: &str,
    kind: TokenKind,
    depth: usize,
    visited: &mut HashSet<String>,
) -> Option<String> {
    if !text.contains('=') {
        return None;
    }
    let text = text
        .strip_prefix("Cookie:")
        .or_else(|| text.strip_prefix("cookie:"))
        .unwrap_or(text);
    let pairs: Vec<(&str, &str)> = text
        .split(';')
        .filter_map(|part| part.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim()))
        .collect();

    kind.keys()
        .iter()
        .find_map(|key| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| accept_str(v, kind, depth, visited))
        })
        .or_else(|| search_token_cookies(&pairs, kind, depth, visited))
}

/// Opens cookies that hold the access-token blob when looking for a refresh
/// token, since `__wtoken` usually carries both.
fn search_token_cookies(
    pairs: &[(&str, &str)],
    kind: TokenKind,
    depth: usize,
    visited: &mut HashSet<String>,
) -> Option<String> {
    if kind != TokenKind::Refresh {
        return None;
    }
    ACCESS_TOKEN_KEYS.iter().find_map(|key| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| search(v, kind, depth + 1, visited))
    })
}

/// Whole-string decodings that may reveal another layer.
fn decodings(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        if candidate != text && !out.contains(&candidate) {
            out.push(candidate);
        }
    };

    if let Ok(decoded) = urlencoding::decode(&text.replace('+', " ")) {
        push(decoded.into_owned());
    }
    if let Ok(decoded) = urlencoding::decode(text) {
        push(decoded.into_owned());
    }
    push(shell_unescape(text));
    out
}

fn shell_unescape(text: &str) -> String {
    let text = text.replace("'\\''", "'");
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn find_jwt_substring(text: &str) -> Option<String> {
    let mut first = None;
    for m in jwt_anywhere().find_iter(text) {
        if m.as_str().starts_with("eyJ") {
            return Some(m.as_str().to_string());
        }
        first.get_or_insert(m.as_str());
    }
    first.map(str::to_string)
}

/// Strips surrounding whitespace, quotes and `Bearer ` prefixes.
fn unwrap_layers(input: &str) -> &str {
    let mut text = input.trim();
    loop {
        let next = strip_bearer(strip_quotes(text)).trim();
        if next == text {
            return text;
        }
        text = next;
    }
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if text.len() >= 2 && text.starts_with(quote) && text.ends_with(quote) {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn strip_bearer(text: &str) -> &str {
    match text.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &text[7..],
        _ => text,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "abc.def.ghi";

    #[test]
    fn test_access_token_encodings() {
        let cases = [
            ("plain", "abc.def.ghi".to_string()),
            ("bearer", "Bearer abc.def.ghi".to_string()),
            ("lowercase bearer", "bearer abc.def.ghi".to_string()),
            ("json", r#"{"accessToken":"abc.def.ghi"}"#.to_string()),
            (
                "nested json",
                r#"{"token":{"accessToken":"abc.def.ghi","expires_in":3600}}"#.to_string(),
            ),
            (
                "url-encoded json",
                "%7B%22accessToken%22%3A%22abc.def.ghi%22%7D".to_string(),
            ),
            (
                "partially encoded json",
                r#"{"accessToken"%3A"abc.def.ghi"}"#.to_string(),
            ),
            (
                "query string",
                "access_token=abc.def.ghi&expires_in=3600".to_string(),
            ),
            (
                "cookie header",
                "foo=bar; __wtoken=%7B%22accessToken%22%3A%22abc.def.ghi%22%7D".to_string(),
            ),
            (
                "quoted escaped json",
                r#""{\"accessToken\":\"abc.def.ghi\"}""#.to_string(),
            ),
            (
                "json wrapping an encoded cookie value",
                r#"{"__wtoken":"%7B%22accessToken%22%3A%22abc.def.ghi%22%7D"}"#.to_string(),
            ),
            ("single quoted", "'Bearer abc.def.ghi'".to_string()),
        ];

        for (name, raw) in cases {
            assert_eq!(normalize_access_token(&raw), TOKEN, "encoding: {name}");
        }
    }

    #[test]
    fn test_opaque_token_is_identity() {
        assert_eq!(normalize_access_token("opaque-token-value"), "opaque-token-value");
        assert_eq!(extract_access_token("opaque-token-value", &[]), None);
    }

    #[test]
    fn test_key_priority() {
        let raw = r#"{"token":"zzz.yyy.xxx","accessToken":"abc.def.ghi"}"#;
        assert_eq!(normalize_access_token(raw), TOKEN);
    }

    #[test]
    fn test_refresh_token_extraction() {
        let raw = r#"{"accessToken":"abc.def.ghi","refreshToken":"refresh_token_123"}"#;
        assert_eq!(
            extract_refresh_token(raw, &[]),
            Some("refresh_token_123".to_string())
        );
        // Independent of the access branch.
        assert_eq!(normalize_access_token(raw), TOKEN);
    }

    #[test]
    fn test_refresh_token_from_cookie_header() {
        let cookies = vec!["session=1; __wrtoken=opaque-refresh".to_string()];
        assert_eq!(
            extract_refresh_token("", &cookies),
            Some("opaque-refresh".to_string())
        );
    }

    #[test]
    fn test_refresh_token_inside_access_cookie() {
        let cookies = vec![
            "lang=en; __wtoken=%7B%22accessToken%22%3A%22abc.def.ghi%22%2C%22refreshToken%22%3A%22r1%22%7D"
                .to_string(),
        ];
        assert_eq!(extract_access_token("", &cookies), Some(TOKEN.to_string()));
        assert_eq!(extract_refresh_token("", &cookies), Some("r1".to_string()));
    }

    #[test]
    fn test_access_cookie_without_refresh_key_yields_none() {
        let cookies = vec!["__wtoken=%7B%22accessToken%22%3A%22abc.def.ghi%22%7D".to_string()];
        assert_eq!(extract_refresh_token("", &cookies), None);
    }

    #[test]
    fn test_refresh_token_requires_key() {
        assert_eq!(extract_refresh_token("just-a-string", &[]), None);
        assert_eq!(normalize_refresh_token("\"just-a-string\""), "just-a-string");
    }

    #[test]
    fn test_access_token_from_cookies_only() {
        let cookies = vec![
            "lang=en".to_string(),
            "__wtoken=%7B%22accessToken%22%3A%22abc.def.ghi%22%7D".to_string(),
        ];
        assert_eq!(extract_access_token("", &cookies), Some(TOKEN.to_string()));
    }

    #[test]
    fn test_regex_last_resort() {
        let raw = "garbage prefix eyJhbGciOi.eyJzdWIiOi.sig trailing";
        assert_eq!(normalize_access_token(raw), "eyJhbGciOi.eyJzdWIiOi.sig");
    }

    #[test]
    fn test_deep_nesting_terminates() {
        let mut raw = r#"{"accessToken":"abc.def.ghi"}"#.to_string();
        for _ in 0..20 {
            raw = serde_json::to_string(&serde_json::json!({ "wrapper": raw })).unwrap();
        }
        // Too deep to unwrap structurally; the substring scan still finds it.
        assert_eq!(extract_access_token(&raw, &[]), Some(TOKEN.to_string()));
    }

    #[test]
    fn test_self_referential_input_terminates() {
        let raw = "token=token%3Dtoken%253Dtoken";
        assert_eq!(extract_access_token(raw, &[]), None);
    }

    #[test]
    fn test_token_expiry() {
        let claims = BASE64_URL_SAFE_NO_PAD.encode(br#"{"sub":"u1","exp":1700000000}"#);
        let token = format!("eyJhbGciOiJIUzI1NiJ9.{claims}.sig");

        let exp = token_expiry(&token).unwrap();
        assert_eq!(exp.timestamp(), 1_700_000_000);
        assert_eq!(token_expiry(&format!("Bearer {token}")), Some(exp));
    }

    #[test]
    fn test_token_expiry_missing_or_invalid() {
        assert_eq!(token_expiry("abc.def.ghi"), None);
        assert_eq!(token_expiry("opaque"), None);

        let claims = BASE64_URL_SAFE_NO_PAD.encode(br#"{"exp":"soon"}"#);
        assert_eq!(token_expiry(&format!("a.{claims}.c")), None);
    }

    #[test]
    fn test_is_jwt_shaped() {
        assert!(is_jwt_shaped("abc.def.ghi"));
        assert!(is_jwt_shaped("eyJ0eXAi.eyJleHAi.c2ln"));
        assert!(!is_jwt_shaped("abc.def"));
        assert!(!is_jwt_shaped("a.b.c.d"));
        assert!(!is_jwt_shaped("abc.d ef.ghi"));
    }
}
