use serde::Serialize;

use crate::error::ReconError;

/// Payload handed across the host boundary, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { message: String, data: T },
    NotFound { message: String },
    Cancel { message: String },
    Error { message: String },
}

impl<T> Response<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self::Success {
            message: message.into(),
            data,
        }
    }

    pub fn cancel() -> Self {
        Self::Cancel {
            message: "Operation cancelled".to_string(),
        }
    }

    /// `Ok` becomes `success`, `NotFound` becomes `not_found`, anything else
    /// `error`.
    pub fn from_result(result: Result<T, ReconError>, message: impl FnOnce(&T) -> String) -> Self {
        match result {
            Ok(data) => Self::success(message(&data), data),
            Err(err) => Self::from(err),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. }
            | Self::NotFound { message }
            | Self::Cancel { message }
            | Self::Error { message } => message,
        }
    }
}

impl<T> From<ReconError> for Response<T> {
    fn from(err: ReconError) -> Self {
        let message = err.to_string();
        match err {
            ReconError::NotFound(_) => Self::NotFound { message },
            _ => Self::Error { message },
        }
    }
}

impl<T: Serialize> Response<T> {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!(r#"{{"status":"error","message":"serialization failed: {err}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_is_tagged() {
        let response = Response::success("done", 3);
        let value: serde_json::Value = serde_json::from_str(&response.to_json()).unwrap();
        assert_eq!(value, json!({"status": "success", "message": "done", "data": 3}));
    }

    #[test]
    fn not_found_is_distinct_from_error() {
        let not_found: Response<()> = ReconError::NotFound("code 123".into()).into();
        assert_eq!(not_found.to_json(), r#"{"status":"not_found","message":"Not found: code 123"}"#);

        let error: Response<()> = ReconError::InvalidCodeLength("1234567890".into()).into();
        assert!(matches!(error, Response::Error { .. }));
        assert!(error.message().contains("1234567890"));
    }

    #[test]
    fn cancel_has_a_message() {
        let response: Response<()> = Response::cancel();
        assert_eq!(response.to_json(), r#"{"status":"cancel","message":"Operation cancelled"}"#);
    }
}
