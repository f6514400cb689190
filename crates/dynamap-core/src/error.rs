//! Error taxonomy for schema construction, conversion, composition and dispatch.

use std::fmt;

use dynamap_model::attribute_value::Item;
use dynamap_model::error::{DynamoDBError, DynamoDBErrorCode};
use dynamap_model::types::CancellationReason;

/// Result alias used throughout the crate.
pub type EnhancedResult<T> = Result<T, EnhancedError>;

/// Errors raised while building a [`TableSchema`](crate::schema::TableSchema).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Two attributes share a wire name.
    #[error("duplicate attribute name '{0}'")]
    DuplicateAttribute(String),

    /// An index declares more than one attribute for the same key role.
    #[error("index '{index}' already has a {role} ('{existing}'), cannot also use '{attribute}'")]
    DuplicateKeyRole {
        /// Index name.
        index: String,
        /// Role description (`partition key` / `sort key`).
        role: &'static str,
        /// Attribute already holding the role.
        existing: String,
        /// Attribute that tried to take it.
        attribute: String,
    },

    /// More than one attribute is tagged as the version attribute.
    #[error("attribute '{attribute}' cannot be a version attribute, '{existing}' already is")]
    DuplicateVersionAttribute {
        /// Attribute already tagged.
        existing: String,
        /// Attribute that tried to take the tag.
        attribute: String,
    },

    /// No attribute carries the primary partition key role.
    #[error("schema has no primary partition key")]
    MissingPartitionKey,

    /// No converter is registered for the attribute's logical type.
    #[error("no converter registered for attribute '{attribute}' of type {type_name}")]
    UnsupportedType {
        /// Attribute name.
        attribute: String,
        /// Rust type name of the attribute value.
        type_name: &'static str,
    },

    /// An attribute name is not part of the schema.
    #[error("attribute '{0}' is not mapped by this schema")]
    UnknownAttribute(String),
}

/// Errors raised while converting between logical values and wire values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// The wire value is of a different type than the converter expects.
    #[error("expected a {expected} attribute value, found {actual}")]
    UnexpectedType {
        /// Expected type descriptor.
        expected: &'static str,
        /// Actual type descriptor.
        actual: &'static str,
    },

    /// A number could not be parsed or does not fit into the target type.
    #[error("number '{value}' cannot be converted to {target}")]
    InvalidNumber {
        /// Wire text.
        value: String,
        /// Target Rust type.
        target: &'static str,
    },

    /// A string could not be parsed into the target type.
    #[error("value '{value}' is not a valid {target}: {reason}")]
    InvalidFormat {
        /// Wire text.
        value: String,
        /// Target Rust type.
        target: &'static str,
        /// Parser message.
        reason: String,
    },

    /// The produced wire value violates a wire invariant (empty set, duplicates).
    #[error("invalid wire value: {0}")]
    InvalidWireValue(String),

    /// Conversion failed for a named attribute.
    #[error("attribute '{attribute}': {source}")]
    Attribute {
        /// Attribute name.
        attribute: String,
        /// Underlying failure.
        #[source]
        source: Box<ConversionError>,
    },
}

impl ConversionError {
    /// Attach an attribute name to this error.
    #[must_use]
    pub fn for_attribute(self, attribute: &str) -> Self {
        Self::Attribute {
            attribute: attribute.to_owned(),
            source: Box::new(self),
        }
    }
}

/// One decoded cancellation reason of a failed transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CancellationDetail {
    /// Position of the sub-request in the transaction.
    pub index: usize,
    /// Table the sub-request targeted, when known.
    pub table_name: Option<String>,
    /// Wire reason code (`None`, `ConditionalCheckFailed`, ...).
    pub code: String,
    /// Wire reason message.
    pub message: Option<String>,
    /// Item image returned for a failed condition, if requested.
    pub item: Option<Item>,
}

impl CancellationDetail {
    /// Returns `true` if this sub-request caused the cancellation.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.code != "None"
    }

    /// Returns `true` if this sub-request's condition evaluated to false.
    #[must_use]
    pub fn is_conditional_check_failed(&self) -> bool {
        self.code == CancellationReason::CONDITIONAL_CHECK_FAILED
    }
}

/// Structured view of a cancelled transaction: one detail per sub-request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransactionCancellation {
    /// Wire message of the cancellation.
    pub message: String,
    /// Per-sub-request details, in request order.
    pub reasons: Vec<CancellationDetail>,
}

impl TransactionCancellation {
    /// Decode wire cancellation reasons.
    #[must_use]
    pub fn from_reasons(message: impl Into<String>, reasons: Vec<CancellationReason>) -> Self {
        let reasons = reasons
            .into_iter()
            .enumerate()
            .map(|(index, r)| CancellationDetail {
                index,
                table_name: None,
                code: r.code.unwrap_or_else(|| "None".to_owned()),
                message: r.message,
                item: r.item,
            })
            .collect();
        Self {
            message: message.into(),
            reasons,
        }
    }

    /// Attach table names to the decoded reasons, by position.
    #[must_use]
    pub fn with_table_names(mut self, tables: &[String]) -> Self {
        for detail in &mut self.reasons {
            detail.table_name = tables.get(detail.index).cloned();
        }
        self
    }

    /// Iterate over the sub-requests that caused the cancellation.
    pub fn failures(&self) -> impl Iterator<Item = &CancellationDetail> {
        self.reasons.iter().filter(|r| r.is_failure())
    }
}

impl fmt::Display for TransactionCancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for detail in self.failures() {
            write!(f, "; #{} {}", detail.index, detail.code)?;
        }
        Ok(())
    }
}

/// Top-level error of the mapping engine.
#[derive(Debug, thiserror::Error)]
pub enum EnhancedError {
    /// The schema is misconfigured.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A value could not be converted.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Two expression contributors disagree about a placeholder or an attribute.
    #[error("conflicting expressions for '{token}': {message}")]
    ExpressionConflict {
        /// Placeholder token or attribute name in conflict.
        token: String,
        /// Description of both sides.
        message: String,
    },

    /// An expression references a placeholder it does not declare.
    #[error("placeholder '{placeholder}' is not declared in expression '{expression}'")]
    InvalidPlaceholder {
        /// The undeclared token.
        placeholder: String,
        /// The offending expression text.
        expression: String,
    },

    /// A key attribute has no value.
    #[error("key attribute '{attribute}' of index '{index}' has no value")]
    MissingKeyAttribute {
        /// Attribute name.
        attribute: String,
        /// Index name.
        index: String,
    },

    /// The request is not valid for the operation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The store rejected the write because a condition evaluated to false.
    #[error("conditional check failed: {message}")]
    ConditionalCheckFailed {
        /// Wire message.
        message: String,
    },

    /// The store cancelled a transaction.
    #[error("transaction canceled: {0}")]
    TransactionCanceled(TransactionCancellation),

    /// An extension failed.
    #[error("extension error: {0}")]
    Extension(#[from] anyhow::Error),

    /// Any other store error, passed through unchanged.
    #[error(transparent)]
    Service(DynamoDBError),
}

impl EnhancedError {
    /// Build an [`EnhancedError::ExpressionConflict`].
    #[must_use]
    pub fn conflict(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExpressionConflict {
            token: token.into(),
            message: message.into(),
        }
    }

    /// Build an [`EnhancedError::Validation`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns `true` when the failure was a condition evaluating to false,
    /// either directly or inside a cancelled transaction.
    #[must_use]
    pub fn is_conditional_failure(&self) -> bool {
        match self {
            Self::ConditionalCheckFailed { .. } => true,
            Self::TransactionCanceled(c) => c.reasons.iter().any(CancellationDetail::is_conditional_check_failed),
            _ => false,
        }
    }

    /// Returns `true` when the failure happened while composing the request,
    /// before anything was sent to the store.
    #[must_use]
    pub fn is_composition_error(&self) -> bool {
        matches!(
            self,
            Self::Schema(_)
                | Self::Conversion(_)
                | Self::ExpressionConflict { .. }
                | Self::InvalidPlaceholder { .. }
                | Self::MissingKeyAttribute { .. }
                | Self::Validation(_)
                | Self::Extension(_)
        )
    }
}

impl From<DynamoDBError> for EnhancedError {
    fn from(err: DynamoDBError) -> Self {
        match err.code {
            DynamoDBErrorCode::ConditionalCheckFailedException => Self::ConditionalCheckFailed {
                message: err.message,
            },
            DynamoDBErrorCode::TransactionCanceledException => Self::TransactionCanceled(
                TransactionCancellation::from_reasons(err.message, err.cancellation_reasons),
            ),
            _ => Self::Service(err),
        }
    }
}
