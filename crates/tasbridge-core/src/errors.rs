/// Inbound payload could not be turned into a patch. The message is dropped.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a JSON object payload")]
    NotAnObject,

    #[error("field {key} has unexpected value {value}")]
    InvalidField { key: &'static str, value: String },
}

/// A control request carried an out-of-range or malformed value.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be an integer")]
    NotAnInteger { field: &'static str },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },
}

/// An outbound command could not be handed to the broker session.
#[derive(Clone, Debug, thiserror::Error)]
pub enum PublishError {
    #[error("broker session is not accepting requests: {0}")]
    Rejected(String),

    #[error("broker session has shut down")]
    Closed,
}

/// The bridge event loop is no longer running.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("bridge event loop has stopped")]
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_display() {
        let err = ValidationError::OutOfRange {
            field: "ct",
            min: 153,
            max: 500,
            value: 501,
        };
        assert_eq!(err.to_string(), "ct must be between 153 and 500, got 501");
    }

    #[test]
    fn json_error_from_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: RouteError = json_err.into();
        assert!(matches!(err, RouteError::Json(_)));
        assert!(err.to_string().starts_with("malformed JSON payload"));
    }
}
