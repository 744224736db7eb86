use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Raw failure produced by an access-key request before normalization.
#[derive(Debug, Error)]
pub enum RequestFailure {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("access key endpoint returned {status}")]
    Status { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Failure shape handed back to callers and recorded in the status broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub code: String,
    pub message: String,
}

impl ServiceError {
    pub fn new(status: Option<u16>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid access key api base url `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported base url scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Maps a raw request failure onto the caller-facing error shape.
pub trait ErrorNormalizer: Send + Sync {
    fn normalize(&self, failure: RequestFailure) -> ServiceError;
}

impl<F> ErrorNormalizer for F
where
    F: Fn(RequestFailure) -> ServiceError + Send + Sync,
{
    fn normalize(&self, failure: RequestFailure) -> ServiceError {
        self(failure)
    }
}

/// Default normalizer shared by every access-key operation.
pub fn handle_service_error(failure: RequestFailure) -> ServiceError {
    match failure {
        RequestFailure::Status { status, body } => {
            let code = match status {
                401 => "UNAUTHORIZED",
                403 => "FORBIDDEN",
                404 => "NOT_FOUND",
                409 => "CONFLICT",
                400..=499 => "REQUEST_REJECTED",
                _ => "SERVICE_ERROR",
            };
            ServiceError::new(Some(status), code, status_message(status, &body))
        }
        RequestFailure::Transport(error) if error.is_timeout() => {
            ServiceError::new(None, "TIMEOUT", error.to_string())
        }
        RequestFailure::Transport(error) => {
            ServiceError::new(None, "TRANSPORT_ERROR", error.to_string())
        }
        RequestFailure::Decode(message) => ServiceError::new(None, "DECODE_ERROR", message),
    }
}

fn status_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}"));
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => match map.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => trimmed.to_string(),
        },
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, body: &str) -> RequestFailure {
        RequestFailure::Status {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn server_errors_map_to_service_error() {
        let err = handle_service_error(status(500, ""));
        assert_eq!(err.code, "SERVICE_ERROR");
        assert_eq!(err.status, Some(500));
        assert_eq!(err.message, "Internal Server Error");
    }

    #[test]
    fn client_errors_are_classified() {
        assert_eq!(handle_service_error(status(401, "")).code, "UNAUTHORIZED");
        assert_eq!(handle_service_error(status(403, "")).code, "FORBIDDEN");
        assert_eq!(handle_service_error(status(404, "")).code, "NOT_FOUND");
        assert_eq!(handle_service_error(status(409, "")).code, "CONFLICT");
        assert_eq!(
            handle_service_error(status(422, "")).code,
            "REQUEST_REJECTED"
        );
    }

    #[test]
    fn json_message_field_is_preferred() {
        let err = handle_service_error(status(
            404,
            r#"{"code":404,"message":"Key for user jdoe not found"}"#,
        ));
        assert_eq!(err.message, "Key for user jdoe not found");
    }

    #[test]
    fn plain_text_body_is_kept_verbatim() {
        let err = handle_service_error(status(400, "  key file is not valid \n"));
        assert_eq!(err.message, "key file is not valid");
        let err = handle_service_error(status(400, r#"["not","an","object"]"#));
        assert_eq!(err.message, r#"["not","an","object"]"#);
    }

    #[test]
    fn decode_failures_keep_their_message() {
        let err = handle_service_error(RequestFailure::Decode("expected value".into()));
        assert_eq!(err, ServiceError::new(None, "DECODE_ERROR", "expected value"));
    }

    #[test]
    fn closures_act_as_normalizers() {
        let normalizer = |_: RequestFailure| ServiceError::new(None, "FIXED", "fixed");
        assert_eq!(normalizer.normalize(status(500, "")).code, "FIXED");
    }

    #[test]
    fn service_error_omits_missing_status_when_serialized() {
        let value = serde_json::to_value(ServiceError::new(None, "TIMEOUT", "slow")).unwrap();
        assert_eq!(value, serde_json::json!({"code": "TIMEOUT", "message": "slow"}));
    }
}
