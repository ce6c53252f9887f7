//! Response classification and body parsing.

use std::time::Duration;

use basketeer_core::Payload;
use basketeer_fetch::token::{extract_access_token, extract_refresh_token};
use basketeer_fetch::{FetchError, RotatedTokens, UpstreamError};
use reqwest::{Response, StatusCode, header};
use serde_json::{Value, json};
use tracing::debug;

/// Longest excerpt of an error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// Converts a reqwest failure into an upstream error.
///
/// Failures that carry a status keep it; everything else (connect, timeout,
/// decode) is a transport error without status.
pub fn map_reqwest_error(error: &reqwest::Error) -> FetchError {
    match error.status() {
        Some(status) => UpstreamError::new(status.as_u16(), error.to_string()).into(),
        None => UpstreamError::transport(error.to_string()).into(),
    }
}

/// Reads a response into a payload, classifying non-success statuses.
pub async fn read_payload(response: Response) -> Result<Payload, FetchError> {
    let status = response.status();
    let retry_after = retry_after(response.headers());
    let body = response.text().await.map_err(|e| map_reqwest_error(&e))?;

    if !status.is_success() {
        return Err(status_error(status, retry_after, &body));
    }
    debug!(status = %status, bytes = body.len(), "Response body read");
    parse_body(&body)
}

/// Builds the error for a non-success response.
pub fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> FetchError {
    let reason = status.canonical_reason().unwrap_or("unexpected status");
    let excerpt = excerpt(body);
    let message = if excerpt.is_empty() {
        reason.to_string()
    } else {
        format!("{reason}: {excerpt}")
    };
    UpstreamError::new(status.as_u16(), message)
        .with_retry_after(retry_after)
        .into()
}

/// Parses a JSON body. Arrays are wrapped as `{"items": [...]}`, an empty
/// body is an empty payload.
pub fn parse_body(body: &str) -> Result<Payload, FetchError> {
    if body.trim().is_empty() {
        return Ok(Payload::new());
    }
    match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => Ok(Payload::from(map)),
        Value::Array(items) => Ok(Payload::from_value_lossy(json!({ "items": items }))),
        other => Err(FetchError::InvalidResponse(format!(
            "expected a JSON object, got {}",
            kind(&other)
        ))),
    }
}

/// Reads tokens from a token endpoint response.
///
/// JWT-shaped access tokens are found anywhere in the body; an opaque one
/// is only accepted under its top-level key.
pub fn rotated_tokens(payload: &Payload) -> Result<RotatedTokens, FetchError> {
    let raw = serde_json::to_string(payload)?;
    let access_token = extract_access_token(&raw, &[])
        .or_else(|| {
            ["access_token", "accessToken"]
                .iter()
                .find_map(|key| payload.get_str(key))
                .map(str::to_string)
        })
        .ok_or_else(|| FetchError::InvalidResponse("token response without access token".to_string()))?;
    Ok(RotatedTokens {
        access_token,
        refresh_token: extract_refresh_token(&raw, &[]),
    })
}

/// Reads a `Retry-After` header given in seconds.
pub fn retry_after(headers: &header::HeaderMap) -> Option<Duration> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
    format!("{cut}...")
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_parse_body_shapes() {
        assert_eq!(parse_body("{\"a\": 1}").unwrap().get_i64("a"), Some(1));
        assert_eq!(parse_body("[{\"id\": 1}]").unwrap().get_array("items").len(), 1);
        assert!(parse_body("  ").unwrap().is_empty());
        assert!(matches!(parse_body("42"), Err(FetchError::InvalidResponse(_))));
        assert!(matches!(parse_body("{"), Err(FetchError::Json(_))));
    }

    #[test]
    fn test_status_error_keeps_status_and_cooldown() {
        let err = status_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(3)),
            "slow down",
        );
        assert_eq!(err.status(), Some(429));
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
        assert!(err.to_string().contains("Too Many Requests: slow down"));
    }

    #[test]
    fn test_error_body_is_truncated() {
        let err = status_error(StatusCode::BAD_GATEWAY, None, &"x".repeat(1000));
        assert!(err.to_string().len() < 300);
        assert!(err.to_string().ends_with("..."));
    }

    #[test]
    fn test_retry_after_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_rotated_tokens() {
        let payload = parse_body(r#"{"access_token": "new.tok.en", "refresh_token": "r2", "expires_in": 1800}"#)
            .unwrap();
        let tokens = rotated_tokens(&payload).unwrap();
        assert_eq!(tokens.access_token, "new.tok.en");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r2"));

        let empty = parse_body("{}").unwrap();
        assert!(rotated_tokens(&empty).is_err());
    }
}
