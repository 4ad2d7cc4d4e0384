//! Uniform result of an API call.
//!
//! The executor never returns `Err`. Every call resolves to a
//! [`RequestOutcome`]; callers that want `?` use [`RequestOutcome::into_result`]
//! or [`RequestOutcome::json`], which map failures to [`ApiError`].

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::request::ResponseFormat;

/// Maximum length of a non-JSON error body used as a message.
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Why a call did not produce a usable body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No strategy produced a token; nothing was sent.
    Unauthenticated,
    /// 401 that survived re-authentication.
    Unauthorized,
    /// Any other non-2xx status.
    Http,
    /// Transport failure (DNS, refused connection, timeout).
    Network,
    /// 2xx whose body could not be parsed as expected.
    Malformed,
}

/// Typed view of a failed outcome.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not authenticated: no authentication strategy succeeded")]
    Unauthenticated,

    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("network error: {message}")]
    Network { message: String },

    #[error("malformed response body (status {status})")]
    MalformedResponse { status: u16 },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result of one logical call, including any 401 retry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestOutcome {
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    pub success: bool,
    /// Parsed body. A JSON value, or a string under [`ResponseFormat::Text`].
    pub body: Option<Value>,
    /// Raw body text when it was not parsed, or could not be.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    /// Human-readable failure message.
    pub error: Option<String>,
    pub kind: Option<FailureKind>,
    pub parse_error: bool,
    /// HTTP requests issued for this call (1 or 2).
    pub attempts: u8,
}

impl RequestOutcome {
    /// Interpret a received response.
    pub fn from_parts(status: StatusCode, text: String, expect: ResponseFormat, attempts: u8) -> Self {
        let code = status.as_u16();

        if !status.is_success() {
            let kind = if status == StatusCode::UNAUTHORIZED {
                FailureKind::Unauthorized
            } else {
                FailureKind::Http
            };
            return Self {
                status: code,
                success: false,
                body: None,
                error: Some(extract_message(status, &text)),
                raw: non_empty(text),
                kind: Some(kind),
                parse_error: false,
                attempts,
            };
        }

        let empty = text.trim().is_empty();
        if status == StatusCode::NO_CONTENT || (empty && expect == ResponseFormat::Text) {
            return Self::succeeded(code, None, attempts);
        }

        match expect {
            ResponseFormat::Text => Self {
                raw: Some(text.clone()),
                ..Self::succeeded(code, Some(Value::String(text)), attempts)
            },
            ResponseFormat::Json => match serde_json::from_str::<Value>(&text) {
                Ok(value) => Self::succeeded(code, Some(value), attempts),
                Err(e) => Self {
                    status: code,
                    success: true,
                    body: None,
                    raw: non_empty(text),
                    error: Some(format!("response body is not valid JSON: {}", e)),
                    kind: Some(FailureKind::Malformed),
                    parse_error: true,
                    attempts,
                },
            },
        }
    }

    /// No token could be obtained; no request was sent.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            success: false,
            body: None,
            raw: None,
            error: Some(message.into()),
            kind: Some(FailureKind::Unauthenticated),
            parse_error: false,
            attempts: 0,
        }
    }

    /// Transport failure before a response was received.
    pub fn network(message: impl Into<String>, attempts: u8) -> Self {
        Self {
            status: 0,
            success: false,
            body: None,
            raw: None,
            error: Some(message.into()),
            kind: Some(FailureKind::Network),
            parse_error: false,
            attempts,
        }
    }

    fn succeeded(status: u16, body: Option<Value>, attempts: u8) -> Self {
        Self {
            status,
            success: true,
            body,
            raw: None,
            error: None,
            kind: None,
            parse_error: false,
            attempts,
        }
    }

    /// Whether the call failed or returned an unusable body.
    pub fn is_failure(&self) -> bool {
        self.kind.is_some()
    }

    pub fn message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Convert into a `Result`, keeping the parsed body on success.
    pub fn into_result(self) -> Result<Option<Value>, ApiError> {
        let message = self.error.unwrap_or_default();
        match self.kind {
            None => Ok(self.body),
            Some(FailureKind::Unauthenticated) => Err(ApiError::Unauthenticated),
            Some(FailureKind::Unauthorized) => Err(ApiError::Unauthorized { message }),
            Some(FailureKind::Http) => Err(ApiError::Http {
                status: self.status,
                message,
            }),
            Some(FailureKind::Network) => Err(ApiError::Network { message }),
            Some(FailureKind::Malformed) => Err(ApiError::MalformedResponse {
                status: self.status,
            }),
        }
    }

    /// Deserialize the body. An absent body decodes from `null`.
    pub fn json<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let body = self.into_result()?.unwrap_or(Value::Null);
        Ok(serde_json::from_value(body)?)
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Best-effort human-readable message from an error response body.
///
/// Probes `detail`, `error`, `message`, then `msg`. FastAPI validation
/// errors (`detail` as a list of `{msg}` objects) are joined with `"; "`.
pub fn extract_message(status: StatusCode, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status_line(status);
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => ["detail", "error", "message", "msg"]
            .iter()
            .find_map(|key| map.get(*key).and_then(field_text))
            .unwrap_or_else(|| Value::Object(map).to_string()),
        Ok(other) => other.to_string(),
        Err(_) => truncate(trimmed),
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => obj.get("msg").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect();
            if parts.is_empty() {
                Some(value.to_string())
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
        other => Some(other.to_string()),
    }
}

/// `"<code> <reason>"`, e.g. `"404 Not Found"`.
pub(crate) fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_extract_detail_string() {
        let msg = extract_message(StatusCode::INTERNAL_SERVER_ERROR, r#"{"detail":"db down"}"#);
        assert_eq!(msg, "db down");
    }

    #[test]
    fn test_extract_fastapi_validation_errors() {
        let body = r#"{"detail":[
            {"loc":["body","name"],"msg":"field required","type":"value_error.missing"},
            {"loc":["body","order"],"msg":"value is not a valid integer","type":"type_error.integer"}
        ]}"#;
        assert_eq!(
            extract_message(StatusCode::UNPROCESSABLE_ENTITY, body),
            "field required; value is not a valid integer"
        );
    }

    #[test]
    fn test_extract_probe_order() {
        assert_eq!(
            extract_message(StatusCode::BAD_REQUEST, r#"{"message":"m","error":"e"}"#),
            "e"
        );
        assert_eq!(
            extract_message(StatusCode::BAD_REQUEST, r#"{"msg":"only msg"}"#),
            "only msg"
        );
        assert_eq!(
            extract_message(StatusCode::BAD_REQUEST, r#"{"code":7}"#),
            r#"{"code":7}"#
        );
    }

    #[test]
    fn test_extract_string_literal_and_raw_text() {
        assert_eq!(extract_message(StatusCode::BAD_GATEWAY, r#""upstream""#), "upstream");
        assert_eq!(
            extract_message(StatusCode::BAD_GATEWAY, "<html>Bad gateway</html>"),
            "<html>Bad gateway</html>"
        );
    }

    #[test]
    fn test_extract_empty_body_uses_status_line() {
        assert_eq!(extract_message(StatusCode::NOT_FOUND, "  "), "404 Not Found");
    }

    #[test]
    fn test_extract_truncates_long_text() {
        let long = "x".repeat(2000);
        let msg = extract_message(StatusCode::INTERNAL_SERVER_ERROR, &long);
        assert!(msg.starts_with(&"x".repeat(MAX_ERROR_BODY_LENGTH)));
        assert!(msg.ends_with("(truncated, 2000 total bytes)"));
    }

    #[test]
    fn test_success_json() {
        let outcome =
            RequestOutcome::from_parts(StatusCode::OK, r#"[{"id":1}]"#.into(), ResponseFormat::Json, 1);
        assert!(outcome.success);
        assert!(!outcome.is_failure());
        assert_eq!(outcome.body, Some(serde_json::json!([{"id": 1}])));
    }

    #[test]
    fn test_no_content_is_success_without_body() {
        let outcome =
            RequestOutcome::from_parts(StatusCode::NO_CONTENT, String::new(), ResponseFormat::Json, 1);
        assert!(outcome.success);
        assert!(!outcome.parse_error);
        assert!(outcome.body.is_none());
        assert!(outcome.into_result().unwrap().is_none());
    }

    #[test]
    fn test_garbled_success_body_is_parse_error() {
        let outcome =
            RequestOutcome::from_parts(StatusCode::OK, "not json".into(), ResponseFormat::Json, 1);
        assert!(outcome.success);
        assert!(outcome.parse_error);
        assert!(outcome.body.is_none());
        assert_eq!(outcome.kind, Some(FailureKind::Malformed));
        assert_eq!(outcome.raw.as_deref(), Some("not json"));
        assert!(matches!(
            outcome.into_result(),
            Err(ApiError::MalformedResponse { status: 200 })
        ));
    }

    #[test]
    fn test_empty_json_body_on_200_is_parse_error() {
        let outcome = RequestOutcome::from_parts(StatusCode::OK, String::new(), ResponseFormat::Json, 1);
        assert!(outcome.parse_error);
    }

    #[test]
    fn test_text_format() {
        let outcome = RequestOutcome::from_parts(StatusCode::OK, "pong".into(), ResponseFormat::Text, 1);
        assert_eq!(outcome.body, Some(Value::String("pong".into())));

        let empty = RequestOutcome::from_parts(StatusCode::OK, String::new(), ResponseFormat::Text, 1);
        assert!(empty.success);
        assert!(empty.body.is_none());
        assert!(!empty.parse_error);
    }

    #[test]
    fn test_http_failure_maps_to_error() {
        let outcome = RequestOutcome::from_parts(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"detail":"db down"}"#.into(),
            ResponseFormat::Json,
            1,
        );
        assert!(!outcome.success);
        assert_eq!(outcome.kind, Some(FailureKind::Http));
        match outcome.into_result() {
            Err(ApiError::Http { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "db down");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unauthorized_kind() {
        let outcome =
            RequestOutcome::from_parts(StatusCode::UNAUTHORIZED, String::new(), ResponseFormat::Json, 2);
        assert_eq!(outcome.kind, Some(FailureKind::Unauthorized));
        assert_eq!(outcome.error.as_deref(), Some("401 Unauthorized"));
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn test_network_and_unauthenticated() {
        let net = RequestOutcome::network("connection refused", 1);
        assert_eq!(net.status, 0);
        assert!(!net.success);
        assert!(matches!(net.into_result(), Err(ApiError::Network { .. })));

        let unauth = RequestOutcome::unauthenticated("exhausted");
        assert_eq!(unauth.status, 0);
        assert_eq!(unauth.attempts, 0);
        assert!(matches!(unauth.into_result(), Err(ApiError::Unauthenticated)));
    }

    #[test]
    fn test_json_decodes_typed_body() {
        #[derive(Deserialize)]
        struct Item {
            id: i64,
        }

        let outcome =
            RequestOutcome::from_parts(StatusCode::OK, r#"{"id": 7}"#.into(), ResponseFormat::Json, 1);
        let item: Item = outcome.json().unwrap();
        assert_eq!(item.id, 7);

        let wrong =
            RequestOutcome::from_parts(StatusCode::OK, r#"{"id": "x"}"#.into(), ResponseFormat::Json, 1);
        assert!(matches!(wrong.json::<Item>(), Err(ApiError::Decode(_))));
    }
}
