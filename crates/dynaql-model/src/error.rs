//! Errors surfaced by the store or by the transport talking to it.
//!
//! The query layer never interprets or retries these; it hands them back to
//! the caller unchanged. [`StoreError::is_retryable`] is offered so callers
//! can build their own retry policy.

use std::fmt;

/// Well-known DynamoDB error codes on the read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum StoreErrorCode {
    /// Table or index not found.
    ResourceNotFoundException,
    /// Request rejected as malformed.
    #[default]
    ValidationException,
    /// Provisioned throughput exceeded.
    ProvisionedThroughputExceededException,
    /// Account-level request limit exceeded.
    RequestLimitExceeded,
    /// Request throttled.
    ThrottlingException,
    /// Caller is not authorized.
    AccessDeniedException,
    /// Store-side failure.
    InternalServerError,
    /// Store temporarily unavailable.
    ServiceUnavailable,
    /// The request never got a response (connection, DNS, TLS, ...).
    TransportFailure,
}

impl StoreErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ValidationException => "ValidationException",
            Self::ProvisionedThroughputExceededException => {
                "ProvisionedThroughputExceededException"
            }
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ThrottlingException => "ThrottlingException",
            Self::AccessDeniedException => "AccessDeniedException",
            Self::InternalServerError => "InternalServerError",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::TransportFailure => "TransportFailure",
        }
    }

    /// Parse the code from a `__type` value such as
    /// `com.amazonaws.dynamodb.v20120810#ResourceNotFoundException`.
    #[must_use]
    pub fn from_error_type(error_type: &str) -> Option<Self> {
        let short = error_type.rsplit('#').next().unwrap_or(error_type);
        let code = match short {
            "ResourceNotFoundException" => Self::ResourceNotFoundException,
            "ValidationException" => Self::ValidationException,
            "ProvisionedThroughputExceededException" => {
                Self::ProvisionedThroughputExceededException
            }
            "RequestLimitExceeded" => Self::RequestLimitExceeded,
            "ThrottlingException" => Self::ThrottlingException,
            "AccessDeniedException" => Self::AccessDeniedException,
            "InternalServerError" => Self::InternalServerError,
            "ServiceUnavailable" => Self::ServiceUnavailable,
            _ => return None,
        };
        Some(code)
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the store.
#[derive(Debug)]
pub struct StoreError {
    /// The error code.
    pub code: StoreErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl StoreError {
    /// Create an error whose message is the code name.
    #[must_use]
    pub fn new(code: StoreErrorCode) -> Self {
        Self {
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create an error with a custom message.
    #[must_use]
    pub fn with_message(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Attach the underlying error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns `true` when the same request may succeed if sent again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            StoreErrorCode::ProvisionedThroughputExceededException
                | StoreErrorCode::RequestLimitExceeded
                | StoreErrorCode::ThrottlingException
                | StoreErrorCode::InternalServerError
                | StoreErrorCode::ServiceUnavailable
                | StoreErrorCode::TransportFailure
        )
    }

    // -- Convenience constructors --

    /// Table or index not found.
    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ResourceNotFoundException, message)
    }

    /// Request rejected by validation.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ValidationException, message)
    }

    /// Request throttled.
    #[must_use]
    pub fn throttled(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ThrottlingException, message)
    }

    /// The request could not be delivered.
    #[must_use]
    pub fn transport(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::with_message(StoreErrorCode::TransportFailure, source.to_string()).with_source(source)
    }
}

/// Create a `StoreError` from an error code.
///
/// # Examples
///
/// ```
/// use dynaql_model::store_error;
/// use dynaql_model::error::StoreErrorCode;
///
/// let err = store_error!(ThrottlingException);
/// assert_eq!(err.code, StoreErrorCode::ThrottlingException);
///
/// let err = store_error!(ResourceNotFoundException, "Table not found");
/// assert_eq!(err.message, "Table not found");
/// ```
#[macro_export]
macro_rules! store_error {
    ($code:ident) => {
        $crate::error::StoreError::new($crate::error::StoreErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::StoreError::with_message($crate::error::StoreErrorCode::$code, $msg)
    };
}
