//! Request shapes for the item-level operations.
//!
//! All input structs use `PascalCase` JSON field naming to match the DynamoDB
//! wire protocol (`awsJson1_0`). Optional fields are omitted when `None`,
//! empty `HashMap`s and `Vec`s are omitted to produce minimal JSON payloads.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::{AttributeValue, Item};
use crate::types::{
    KeysAndAttributes, ReturnConsumedCapacity, ReturnValue, ReturnValuesOnConditionCheckFailure,
    TransactGetItem, TransactWriteItem, WriteRequest,
};

// ---------------------------------------------------------------------------
// Single-item operations
// ---------------------------------------------------------------------------

/// Input for the `GetItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemInput {
    /// The name of the table containing the item.
    pub table_name: String,

    /// The primary key of the item to retrieve.
    pub key: Item,

    /// If `true`, a strongly consistent read is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,

    /// Attributes to retrieve.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    /// Substitution tokens for attribute names in the projection.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

/// Input for the `PutItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemInput {
    /// The name of the table to put the item into.
    pub table_name: String,

    /// The full item to write.
    pub item: Item,

    /// A condition that must be satisfied for the put to succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,

    /// Substitution tokens for attribute names in an expression.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// Substitution tokens for attribute values in an expression.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,

    /// Determines the attributes to return after the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,

    /// Whether the existing item is returned when the condition fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Input for the `UpdateItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateItemInput {
    /// The name of the table containing the item.
    pub table_name: String,

    /// The primary key of the item to update.
    pub key: Item,

    /// The `SET`/`REMOVE`/`ADD`/`DELETE` clauses to apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_expression: Option<String>,

    /// A condition that must be satisfied for the update to succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,

    /// Substitution tokens for attribute names in an expression.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// Substitution tokens for attribute values in an expression.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,

    /// Determines the attributes to return after the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,

    /// Whether the existing item is returned when the condition fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

/// Input for the `DeleteItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemInput {
    /// The name of the table containing the item.
    pub table_name: String,

    /// The primary key of the item to delete.
    pub key: Item,

    /// A condition that must be satisfied for the delete to succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_expression: Option<String>,

    /// Substitution tokens for attribute names in an expression.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// Substitution tokens for attribute values in an expression.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,

    /// Determines the attributes to return after the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values: Option<ReturnValue>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,

    /// Whether the existing item is returned when the condition fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_values_on_condition_check_failure: Option<ReturnValuesOnConditionCheckFailure>,
}

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// Input for the `BatchGetItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemInput {
    /// Keys to read, grouped by table name.
    pub request_items: HashMap<String, KeysAndAttributes>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

/// Input for the `BatchWriteItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemInput {
    /// Puts and deletes, grouped by table name.
    pub request_items: HashMap<String, Vec<WriteRequest>>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// Input for the `TransactWriteItems` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItemsInput {
    /// The ordered list of actions; all succeed or none do.
    pub transact_items: Vec<TransactWriteItem>,

    /// Idempotency token for the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_request_token: Option<String>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}

/// Input for the `TransactGetItems` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactGetItemsInput {
    /// The ordered list of reads.
    pub transact_items: Vec<TransactGetItem>,

    /// Determines the level of detail about provisioned throughput consumption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_consumed_capacity: Option<ReturnConsumedCapacity>,
}
