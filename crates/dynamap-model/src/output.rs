//! Response shapes for the item-level operations.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::Item;
use crate::types::{ConsumedCapacity, ItemResponse, KeysAndAttributes, WriteRequest};

/// Output for the `GetItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetItemOutput {
    /// The item, or `None` if no item has the requested key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,

    /// Capacity consumed by the read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_capacity: Option<ConsumedCapacity>,
}

/// Output for the `PutItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutItemOutput {
    /// The attributes selected by `ReturnValues`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Item,

    /// Capacity consumed by the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_capacity: Option<ConsumedCapacity>,
}

/// Output for the `UpdateItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateItemOutput {
    /// The attributes selected by `ReturnValues`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Item,

    /// Capacity consumed by the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_capacity: Option<ConsumedCapacity>,
}

/// Output for the `DeleteItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeleteItemOutput {
    /// The attributes selected by `ReturnValues`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: Item,

    /// Capacity consumed by the write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_capacity: Option<ConsumedCapacity>,
}

/// Output for the `BatchGetItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchGetItemOutput {
    /// Items found, grouped by table name.
    #[serde(default)]
    pub responses: HashMap<String, Vec<Item>>,

    /// Keys the store did not process in this call.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub unprocessed_keys: HashMap<String, KeysAndAttributes>,

    /// Capacity consumed per table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

/// Output for the `BatchWriteItem` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchWriteItemOutput {
    /// Writes the store did not process in this call.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub unprocessed_items: HashMap<String, Vec<WriteRequest>>,

    /// Capacity consumed per table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

/// Output for the `TransactWriteItems` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactWriteItemsOutput {
    /// Capacity consumed per table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_capacity: Vec<ConsumedCapacity>,
}

/// Output for the `TransactGetItems` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactGetItemsOutput {
    /// One response per requested read, in request order.
    #[serde(default)]
    pub responses: Vec<ItemResponse>,

    /// Capacity consumed per table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consumed_capacity: Vec<ConsumedCapacity>,
}
