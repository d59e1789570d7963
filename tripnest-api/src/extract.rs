//! Wrappers around axum's extractors whose rejections render through [`AppError`],
//! so malformed bodies, paths and query strings get the standard error envelope.

use axum::extract::{FromRequest, FromRequestParts};
use serde::de::DeserializeOwned;

use crate::error::AppError;

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Parse a body that may be empty. An empty body yields `T::default()`.
pub fn optional_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> Result<T, AppError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| AppError::ValidationError(format!("Failed to parse the request body as JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Reply {
        host_response: Option<String>,
    }

    #[test]
    fn test_optional_body() {
        assert_eq!(optional_body::<Reply>(b"").unwrap(), Reply::default());
        let parsed: Reply = optional_body(br#"{"hostResponse":"See you"}"#).unwrap();
        assert_eq!(parsed.host_response.as_deref(), Some("See you"));
        assert!(optional_body::<Reply>(b"{oops").is_err());
    }
}
