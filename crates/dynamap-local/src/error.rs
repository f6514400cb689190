//! Conversion of local failures into wire errors.

use dynamap_model::{AttributeValueError, DynamoDBError};

use crate::expression::ExpressionError;
use crate::storage::StorageError;

/// Convert a storage error into a validation error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn storage_error_to_dynamodb(e: StorageError) -> DynamoDBError {
    DynamoDBError::validation(e.to_string())
}

/// Convert an expression error into a validation error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn expression_error_to_dynamodb(e: ExpressionError) -> DynamoDBError {
    DynamoDBError::validation(e.to_string())
}

/// Convert a malformed attribute value into a validation error.
#[must_use]
#[allow(clippy::needless_pass_by_value)]
pub fn attribute_error_to_dynamodb(e: AttributeValueError) -> DynamoDBError {
    DynamoDBError::validation(format!("One or more parameter values were invalid: {e}"))
}
