use thiserror::Error;

/// Errors raised while talking HTTP to the vault backend
#[derive(Error, Debug)]
pub enum CommonRequestError {
    /// Connection, TLS, timeout or body read failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// A success status whose body could not be understood
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Error originating from the request builder
    #[error("Request builder error: {0}")]
    RequestBuilder(String),
}

impl CommonRequestError {
    /// HTTP status code, when the server produced one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True for 5xx answers.
    #[must_use]
    pub fn is_server_status(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }
}

/// Parse error response from HTTP status and body
pub fn parse_error_response(status: reqwest::StatusCode, body: &bytes::Bytes) -> CommonRequestError {
    let message = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|json| extract_error_message(&json))
        .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

    CommonRequestError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Pull a human readable message out of the JSON error shapes the backend emits
fn extract_error_message(json: &serde_json::Value) -> Option<String> {
    // {"error": {"message": "..."}}
    if let Some(msg) = json
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(serde_json::Value::as_str)
    {
        return Some(msg.to_string());
    }

    // {"error": "..."}
    if let Some(msg) = json.get("error").and_then(serde_json::Value::as_str) {
        return Some(msg.to_string());
    }

    // {"errors": [{"message": "..."}]}
    if let Some(msg) = json
        .get("errors")
        .and_then(serde_json::Value::as_array)
        .and_then(|errors| errors.first())
        .and_then(|e| e.get("message"))
        .and_then(serde_json::Value::as_str)
    {
        return Some(msg.to_string());
    }

    json.get("message")
        .and_then(serde_json::Value::as_str)
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_error_message_is_extracted() {
        let body = bytes::Bytes::from_static(br#"{"error": {"message": "quota exceeded"}}"#);
        let err = parse_error_response(reqwest::StatusCode::BAD_REQUEST, &body);
        match err {
            CommonRequestError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn graphql_errors_array_is_extracted() {
        let body = bytes::Bytes::from_static(br#"{"errors": [{"message": "not allowed"}]}"#);
        let err = parse_error_response(reqwest::StatusCode::FORBIDDEN, &body);
        assert_eq!(err.to_string(), "HTTP 403: not allowed");
    }

    #[test]
    fn plain_text_body_is_used_verbatim() {
        let body = bytes::Bytes::from_static(b"unauthorized\n");
        let err = parse_error_response(reqwest::StatusCode::UNAUTHORIZED, &body);
        assert_eq!(err.to_string(), "HTTP 401: unauthorized");
        assert!(!err.is_server_status());
    }

    #[test]
    fn five_hundreds_are_server_statuses() {
        let body = bytes::Bytes::from_static(b"boom");
        let err = parse_error_response(reqwest::StatusCode::BAD_GATEWAY, &body);
        assert!(err.is_server_status());
        assert_eq!(err.status(), Some(502));
    }
}
