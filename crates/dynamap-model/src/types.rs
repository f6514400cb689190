//! Shared wire shapes used by the item-level request and response types.
//!
//! All structs use `PascalCase` JSON field naming to match the DynamoDB wire
//! protocol. Empty maps and absent options are omitted from the payload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::{AttributeValue, Item};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which item image a write operation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnValue {
    /// Nothing is returned.
    #[default]
    #[serde(rename = "NONE")]
    None,
    /// All attributes as they appeared before the operation.
    #[serde(rename = "ALL_OLD")]
    AllOld,
    /// Only the updated attributes as they appeared before the operation.
    #[serde(rename = "UPDATED_OLD")]
    UpdatedOld,
    /// All attributes as they appear after the operation.
    #[serde(rename = "ALL_NEW")]
    AllNew,
    /// Only the updated attributes as they appear after the operation.
    #[serde(rename = "UPDATED_NEW")]
    UpdatedNew,
}

impl ReturnValue {
    /// Returns the DynamoDB wire-format string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::AllOld => "ALL_OLD",
            Self::UpdatedOld => "UPDATED_OLD",
            Self::AllNew => "ALL_NEW",
            Self::UpdatedNew => "UPDATED_NEW",
        }
    }
}

impl std::fmt::Display for ReturnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls whether consumed capacity information is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnConsumedCapacity {
    /// Capacity for the table and any indexes involved.
    #[serde(rename = "INDEXES")]
    Indexes,
    /// Only the total consumed capacity.
    #[serde(rename = "TOTAL")]
    Total,
    /// No capacity reporting.
    #[default]
    #[serde(rename = "NONE")]
    None,
}

impl ReturnConsumedCapacity {
    /// Returns `true` if capacity tracking should be performed.
    #[must_use]
    pub fn should_report(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Controls whether the item image is returned when a condition check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReturnValuesOnConditionCheckFailure {
    /// Return the existing item.
    #[serde(rename = "ALL_OLD")]
    AllOld,
    /// Return nothing.
    #[default]
    #[serde(rename = "NONE")]
    None,
}

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

/// Capacity units consumed by an operation against one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsumedCapacity {
    /// The table the capacity was consumed on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Total capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_units: Option<f64>,
    /// Read capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_capacity_units: Option<f64>,
    /// Write capacity units consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_capacity_units: Option<f64>,
}

// ---------------------------------------------------------------------------
// Batch shapes
// ---------------------------------------------------------------------------

/// Keys and projection for one table of a `BatchGetItem` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeysAndAttributes {
    /// Primary keys of the items to read.
    pub keys: Vec<Item>,
    /// Projection of attributes to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    /// Substitution tokens for attribute names in the projection.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    /// Whether reads are strongly consistent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
}

/// One put or delete of a `BatchWriteItem` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WriteRequest {
    /// Put request, if this is a put.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_request: Option<PutRequest>,
    /// Delete request, if this is a delete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_request: Option<DeleteRequest>,
}

impl WriteRequest {
    /// Wrap an item into a put request.
    #[must_use]
    pub fn put(item: Item) -> Self {
        Self {
            put_request: Some(PutRequest { item }),
            delete_request: None,
        }
    }

    /// Wrap a key into a delete request.
    #[must_use]
    pub fn delete(key: Item) -> Self {
        Self {
            put_request: None,
            delete_request: Some(DeleteRequest { key }),
        }
    }
}

/// An unconditional put inside a batch write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRequest {
    /// The full item to write.
    pub item: Item,
}

/// An unconditional delete inside a batch write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteRequest {
    /// The primary key of the item to delete.
    pub key: Item,
}

// ---------------------------------------------------------------------------
// Transaction shapes
// ---------------------------------------------------------------------------

/// One action of a `TransactWriteItems` request. Exactly one field is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_check: Option<ConditionCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Put>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Delete>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Update>,
}

impl TransactWriteItem {
    /// Table the action targets.
    #[must_use]
    pub fn table_name(&self) -> Option<&str> {
        if let Some(c) = &self.condition_check {
            Some(&c.table_name)
        } else if let Some(p) = &self.put {
            Some(&p.table_name)
        } else if let Some(d) = &self.delete {
            Some(&d.table_name)
        } else {
            self.update.as_ref().map(|u| u.table_name.as_str())
        }
    }
}

/// Condition-only transaction action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConditionCheck {
    pub table_name: String,
    pub key: Item,
    pub condition_expression: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Transactional put.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Put {
    pub table_name: String,
    pub item: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Transactional delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Delete {
    pub table_name: String,
    pub key: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Transactional update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Update {
    pub table_name: String,
    pub key: Item,
    pub update_expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// One read of a `TransactGetItems` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactGetItem {
    pub get: Get,
}

/// Transactional get.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Get {
    pub table_name: String,
    pub key: Item,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,
}

/// The item (if any) found by one `TransactGetItems` read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

/// Why one sub-request of a cancelled transaction failed.
///
/// Sub-requests that did not cause the cancellation carry the code `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CancellationReason {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
}

impl CancellationReason {
    /// Code reported for a failed condition.
    pub const CONDITIONAL_CHECK_FAILED: &'static str = "ConditionalCheckFailed";

    /// Reason for a sub-request that did not fail.
    #[must_use]
    pub fn none() -> Self {
        Self {
            code: Some("None".to_owned()),
            message: None,
            item: None,
        }
    }

    /// Reason for a sub-request whose condition evaluated to false.
    #[must_use]
    pub fn conditional_check_failed(item: Option<Item>) -> Self {
        Self {
            code: Some(Self::CONDITIONAL_CHECK_FAILED.to_owned()),
            message: Some("The conditional request failed".to_owned()),
            item,
        }
    }

    /// Reason for a sub-request rejected by validation.
    #[must_use]
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self {
            code: Some("ValidationError".to_owned()),
            message: Some(message.into()),
            item: None,
        }
    }

    /// Returns `true` if this sub-request caused the cancellation.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.code.as_deref().is_some_and(|c| c != "None")
    }
}
