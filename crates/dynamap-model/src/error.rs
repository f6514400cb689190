//! Wire error returned by a DynamoDB-compatible store.
//!
//! On the wire an error is a JSON body whose `__type` holds the qualified
//! error name, e.g. `com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException`.
//! A cancelled transaction also carries `CancellationReasons`, one per
//! sub-request in request order.

use std::fmt;

use serde_json::{Value, json};

use crate::types::CancellationReason;

const SERVICE_NAMESPACE: &str = "com.amazonaws.dynamodb.v20120810";
const VALIDATION_NAMESPACE: &str = "com.amazon.coral.validate";

macro_rules! error_codes {
    ($($(#[$doc:meta])* $name:ident $(= $retry:ident)?,)+) => {
        /// Error codes a store can answer with.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[non_exhaustive]
        pub enum DynamoDBErrorCode {
            $($(#[$doc])* $name,)+
        }

        impl DynamoDBErrorCode {
            const ALL: &'static [Self] = &[$(Self::$name,)+];

            /// Short code, as it appears after the `#` of `__type`.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)+
                }
            }

            /// Returns `true` if resending the same request may succeed.
            #[must_use]
            pub fn is_retryable(&self) -> bool {
                match self {
                    $(Self::$name => error_codes!(@retry $($retry)?),)+
                }
            }
        }
    };
    (@retry retry) => { true };
    (@retry) => { false };
}

error_codes! {
    /// The table does not exist.
    ResourceNotFoundException,
    /// A condition expression evaluated to false.
    ConditionalCheckFailedException,
    /// A transaction was cancelled; see the cancellation reasons.
    TransactionCanceledException,
    /// Another transaction holds one of the items.
    TransactionConflictException = retry,
    /// Throughput limit hit.
    ProvisionedThroughputExceededException = retry,
    /// Account request limit hit.
    RequestLimitExceeded = retry,
    /// The request is malformed or violates a limit.
    #[default]
    ValidationException,
    /// The request body could not be decoded.
    SerializationException,
    /// The store failed.
    InternalServerError = retry,
}

impl DynamoDBErrorCode {
    /// Qualified name for the `__type` field.
    #[must_use]
    pub fn error_type(&self) -> String {
        let namespace = match self {
            Self::ValidationException => VALIDATION_NAMESPACE,
            _ => SERVICE_NAMESPACE,
        };
        format!("{namespace}#{}", self.as_str())
    }

    /// Parse a `__type` value, qualified or bare.
    #[must_use]
    pub fn from_error_type(error_type: &str) -> Option<Self> {
        let short = error_type.rsplit('#').next().unwrap_or(error_type);
        Self::ALL.iter().copied().find(|code| code.as_str() == short)
    }

    /// HTTP status the store answers this code with.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::InternalServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
            _ => http::StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for DynamoDBErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error answered by the store for one call.
#[derive(Debug)]
pub struct DynamoDBError {
    /// Error code.
    pub code: DynamoDBErrorCode,
    /// Store-provided message.
    pub message: String,
    /// HTTP status.
    pub status_code: http::StatusCode,
    /// Per-sub-request reasons of a cancelled transaction, in request order.
    pub cancellation_reasons: Vec<CancellationReason>,
    /// Lower-level cause, e.g. a transport failure.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for DynamoDBError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for DynamoDBError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl DynamoDBError {
    /// Error whose message is the bare code.
    #[must_use]
    pub fn new(code: DynamoDBErrorCode) -> Self {
        Self::with_message(code, code.as_str())
    }

    /// Error with a message.
    #[must_use]
    pub fn with_message(code: DynamoDBErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            cancellation_reasons: Vec::new(),
            source: None,
        }
    }

    /// Attach a cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Table not found.
    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ResourceNotFoundException, message)
    }

    /// A condition evaluated to false.
    #[must_use]
    pub fn conditional_check_failed(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ConditionalCheckFailedException, message)
    }

    /// Cancelled transaction with one reason per sub-request.
    #[must_use]
    pub fn transaction_canceled(reasons: Vec<CancellationReason>) -> Self {
        let codes: Vec<&str> = reasons
            .iter()
            .map(|r| r.code.as_deref().unwrap_or("None"))
            .collect();
        let mut err = Self::with_message(
            DynamoDBErrorCode::TransactionCanceledException,
            format!(
                "Transaction cancelled, please refer cancellation reasons for specific reasons [{}]",
                codes.join(", ")
            ),
        );
        err.cancellation_reasons = reasons;
        err
    }

    /// Malformed request.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::ValidationException, message)
    }

    /// Store failure.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(DynamoDBErrorCode::InternalServerError, message)
    }

    /// Returns `true` if resending the request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Render the wire JSON body.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "__type": self.code.error_type(),
            "message": self.message,
        });
        if !self.cancellation_reasons.is_empty() {
            body["CancellationReasons"] = serde_json::to_value(&self.cancellation_reasons).unwrap_or(Value::Null);
        }
        body
    }

    /// Decode a wire JSON body. Unknown codes become an internal error that
    /// keeps the original `__type` in its message.
    #[must_use]
    pub fn from_json(body: &Value, status_code: http::StatusCode) -> Self {
        let error_type = body.get("__type").and_then(Value::as_str).unwrap_or_default();
        let message = body
            .get("message")
            .or_else(|| body.get("Message"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut err = match DynamoDBErrorCode::from_error_type(error_type) {
            Some(code) => Self::with_message(code, message),
            None => Self::internal_error(format!("{error_type}: {message}")),
        };
        err.status_code = status_code;
        err.cancellation_reasons = body
            .get("CancellationReasons")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        err
    }
}

/// Build a [`DynamoDBError`] from a code name.
///
/// # Examples
///
/// ```
/// use dynamap_model::dynamodb_error;
/// use dynamap_model::error::DynamoDBErrorCode;
///
/// let err = dynamodb_error!(RequestLimitExceeded);
/// assert!(err.is_retryable());
///
/// let err = dynamodb_error!(ResourceNotFoundException, "no such table: orders");
/// assert_eq!(err.code, DynamoDBErrorCode::ResourceNotFoundException);
/// ```
#[macro_export]
macro_rules! dynamodb_error {
    ($code:ident) => {
        $crate::error::DynamoDBError::new($crate::error::DynamoDBErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::DynamoDBError::with_message($crate::error::DynamoDBErrorCode::$code, $msg)
    };
}
