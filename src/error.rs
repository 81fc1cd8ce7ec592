//! Error types for the identity wizard.

/// Top-level error type for wizard actions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// User-facing message for an unreachable backend.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "后端连接失败，请确认服务已启动。";
pub const BAD_REQUEST_FALLBACK: &str = "请求参数错误。";
pub const NOT_FOUND_FALLBACK: &str = "请求资源不存在。";
pub const VALIDATION_FALLBACK: &str = "请求参数校验失败。";
pub const SERVER_FALLBACK: &str = "后端服务异常，请稍后重试。";
pub const GENERIC_FALLBACK: &str = "请求失败，请稍后重试。";

/// Backend call errors, normalized into a small taxonomy.
///
/// `Display` is always a message that can be shown to the user as-is.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend could not be reached at all.
    #[error("后端连接失败，请确认服务已启动。")]
    Transport { reason: String },

    #[error("{message}")]
    BadRequest { message: String },

    /// 422. Validation detail arrays are flattened into `message`.
    #[error("{message}")]
    Validation { message: String },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("{message}")]
    Status { status: u16, message: String },

    /// The backend answered with data that violates the contract.
    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },
}

impl ApiError {
    /// Build an error from a non-success HTTP status and the extracted detail.
    pub fn from_status(status: u16, detail: Option<String>) -> Self {
        let detail = detail.filter(|d| !d.trim().is_empty());
        let pick = |fallback: &str| detail.clone().unwrap_or_else(|| fallback.to_string());
        match status {
            400 => Self::BadRequest {
                message: pick(BAD_REQUEST_FALLBACK),
            },
            404 => Self::NotFound {
                message: pick(NOT_FOUND_FALLBACK),
            },
            422 => Self::Validation {
                message: pick(VALIDATION_FALLBACK),
            },
            s if s >= 500 => Self::Server {
                status: s,
                message: pick(SERVER_FALLBACK),
            },
            s => Self::Status {
                status: s,
                message: pick(GENERIC_FALLBACK),
            },
        }
    }

    /// Whether this error is the protocol-violation class.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::InvalidResponse { .. })
    }
}

/// Wizard flow errors: a missing prerequisite or an invalid selection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FlowError {
    #[error("{stage} requires {requirement}")]
    MissingPrerequisite {
        stage: &'static str,
        requirement: &'static str,
    },

    #[error("Primary and backup identity must differ (both {id})")]
    SameIdentitySelected { id: String },

    #[error("Identity model {id} not found")]
    UnknownIdentity { id: String },

    #[error("Launch kit has no day {day}")]
    UnknownLaunchDay { day: u32 },

    #[error("Experiment {id} not found")]
    UnknownExperiment { id: String },
}

/// Durable key-value storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error on key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Export delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to serialize delivery package: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for wizard actions.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_prefers_detail() {
        let err = ApiError::from_status(400, Some("bad field".into()));
        assert!(matches!(err, ApiError::BadRequest { .. }));
        assert_eq!(err.to_string(), "bad field");

        let err = ApiError::from_status(404, None);
        assert_eq!(err.to_string(), NOT_FOUND_FALLBACK);

        let err = ApiError::from_status(422, Some("   ".into()));
        assert_eq!(err.to_string(), VALIDATION_FALLBACK);

        let err = ApiError::from_status(503, None);
        assert!(matches!(err, ApiError::Server { status: 503, .. }));
        assert_eq!(err.to_string(), SERVER_FALLBACK);

        let err = ApiError::from_status(409, None);
        assert_eq!(err.to_string(), GENERIC_FALLBACK);
    }

    #[test]
    fn transport_message_is_fixed() {
        let err = ApiError::Transport {
            reason: "connection refused".into(),
        };
        assert_eq!(err.to_string(), TRANSPORT_FAILURE_MESSAGE);
        assert!(!err.is_protocol_violation());
    }

    #[test]
    fn api_error_passes_through_top_level() {
        let err: Error = ApiError::from_status(400, Some("nope".into())).into();
        assert_eq!(err.to_string(), "nope");
    }
}
