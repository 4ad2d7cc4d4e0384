//! Outbound request description.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart;
use serde_json::Value;

/// Request payload. The encoding is always chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/json`.
    Json(Value),
    /// `application/x-www-form-urlencoded`.
    Form(Vec<(String, String)>),
    /// `multipart/form-data`.
    Multipart(Vec<MultipartField>),
}

/// One part of a multipart body.
///
/// Kept as plain data so the body can be rebuilt for a retry.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartField {
    pub name: String,
    pub value: MultipartValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartValue {
    Text(String),
    File {
        file_name: String,
        content_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl MultipartField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            value: MultipartValue::File {
                file_name: file_name.into(),
                content_type,
                bytes,
            },
        }
    }
}

/// Build a fresh multipart form from the stored fields.
pub(crate) fn multipart_form(fields: &[MultipartField]) -> reqwest::Result<multipart::Form> {
    let mut form = multipart::Form::new();
    for field in fields {
        form = match &field.value {
            MultipartValue::Text(text) => form.text(field.name.clone(), text.clone()),
            MultipartValue::File {
                file_name,
                content_type,
                bytes,
            } => {
                let mut part = multipart::Part::bytes(bytes.clone()).file_name(file_name.clone());
                if let Some(content_type) = content_type {
                    part = part.mime_str(content_type)?;
                }
                form.part(field.name.clone(), part)
            }
        };
    }
    Ok(form)
}

/// How a successful response body is interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
}

/// A call against the backend, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<RequestBody>,
    /// Caller headers; these override the defaults.
    pub headers: HeaderMap,
    pub expect: ResponseFormat,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            headers: HeaderMap::new(),
            expect: ResponseFormat::Json,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.body = Some(RequestBody::Form(pairs));
        self
    }

    pub fn with_multipart(mut self, fields: Vec<MultipartField>) -> Self {
        self.body = Some(RequestBody::Multipart(fields));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Treat a successful body as text instead of JSON.
    pub fn expect_text(mut self) -> Self {
        self.expect = ResponseFormat::Text;
        self
    }

    /// Whether the default JSON content type applies to this request.
    pub(crate) fn sends_json(&self) -> bool {
        matches!(self.body, None | Some(RequestBody::Json(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let request = ApiRequest::get("/videos");
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.expect, ResponseFormat::Json);
        assert!(request.body.is_none());
        assert!(request.sends_json());
    }

    #[test]
    fn test_form_body_is_not_json() {
        let request = ApiRequest::post("/login").with_form([("email", "a@b.c")]);
        assert_eq!(
            request.body,
            Some(RequestBody::Form(vec![("email".into(), "a@b.c".into())]))
        );
        assert!(!request.sends_json());
    }

    #[test]
    fn test_json_body_and_header_override() {
        let request = ApiRequest::put("/segments/1")
            .with_json(json!({"name": "News"}))
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/merge-patch+json"));
        assert!(request.sends_json());
        assert_eq!(
            request.headers.get(CONTENT_TYPE).unwrap(),
            "application/merge-patch+json"
        );
    }

    #[test]
    fn test_multipart_form_builds_with_mime() {
        let fields = vec![
            MultipartField::text("title", "Poster"),
            MultipartField::file("image", "poster.png", Some("image/png".into()), vec![1, 2, 3]),
        ];
        assert!(multipart_form(&fields).is_ok());

        let bad = vec![MultipartField::file(
            "image",
            "poster.png",
            Some("not a mime".into()),
            vec![],
        )];
        assert!(multipart_form(&bad).is_err());
    }
}
