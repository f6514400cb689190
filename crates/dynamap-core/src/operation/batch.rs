//! `BatchGetItem` and `BatchWriteItem`.
//!
//! Batches are built per table from a [`MappedTable`], so each table's
//! schema and extension shape its own requests. Results are kept as raw
//! items and hydrated per table on demand.

use std::collections::HashMap;

use dynamap_model::Item;
use dynamap_model::input::{BatchGetItemInput, BatchWriteItemInput};
use dynamap_model::output::{BatchGetItemOutput, BatchWriteItemOutput};
use dynamap_model::types::{KeysAndAttributes, WriteRequest};
use typed_builder::TypedBuilder;

use super::put::{PutItemOperation, PutItemRequest};
use super::{DatabaseOperation, OperationName, TableOperation, read_record};
use crate::client::{WireClient, WireFuture};
use crate::config::EnhancedConfig;
use crate::error::{EnhancedError, EnhancedResult};
use crate::key::Key;
use crate::schema::PRIMARY_INDEX;
use crate::table::MappedTable;

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Keys to read from one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadBatch {
    table_name: String,
    keys: Vec<Item>,
    consistent_read: Option<bool>,
}

impl ReadBatch {
    /// Start a batch for `table`.
    #[must_use]
    pub fn builder<T>(table: &MappedTable<T>) -> ReadBatchBuilder<'_, T> {
        ReadBatchBuilder {
            table,
            keys: Vec::new(),
            consistent_read: None,
        }
    }

    /// Target table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Wire keys.
    #[must_use]
    pub fn keys(&self) -> &[Item] {
        &self.keys
    }
}

/// Builder for [`ReadBatch`].
#[derive(Debug)]
pub struct ReadBatchBuilder<'a, T> {
    table: &'a MappedTable<T>,
    keys: Vec<Key>,
    consistent_read: Option<bool>,
}

impl<T> ReadBatchBuilder<'_, T> {
    /// Read the item with `key`.
    #[must_use]
    pub fn add_get_item(mut self, key: Key) -> Self {
        self.keys.push(key);
        self
    }

    /// Strongly consistent reads for this table.
    #[must_use]
    pub fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = Some(consistent_read);
        self
    }

    /// Render the keys.
    pub fn build(self) -> EnhancedResult<ReadBatch> {
        let metadata = self.table.schema().table_metadata();
        let keys = self
            .keys
            .iter()
            .map(|key| key.key_map(metadata, PRIMARY_INDEX))
            .collect::<EnhancedResult<Vec<_>>>()?;
        Ok(ReadBatch {
            table_name: self.table.table_name().to_owned(),
            keys,
            consistent_read: self.consistent_read,
        })
    }
}

/// Read batches for several tables.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct BatchGetItemRequest {
    /// One batch per table. Batches for the same table are merged.
    pub read_batches: Vec<ReadBatch>,
}

/// Items returned by one `BatchGetItem` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetResultPage {
    responses: HashMap<String, Vec<Item>>,
    unprocessed_keys: HashMap<String, KeysAndAttributes>,
}

impl BatchGetResultPage {
    /// Records found in `table`, after `after_read`.
    pub fn results_for_table<T: Default>(&self, table: &MappedTable<T>) -> EnhancedResult<Vec<T>> {
        let context = table.context();
        self.responses
            .get(table.table_name())
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|item| read_record(table.schema(), table.extension(), &context, item.clone()))
            .collect()
    }

    /// Keys of `table` the store did not process.
    pub fn unprocessed_keys_for_table<T>(&self, table: &MappedTable<T>) -> EnhancedResult<Vec<Key>> {
        let metadata = table.schema().table_metadata();
        self.unprocessed_keys
            .get(table.table_name())
            .map(|k| k.keys.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|item| Key::from_item(item, metadata, PRIMARY_INDEX))
            .collect()
    }

    /// Returns `true` if some keys were left unprocessed.
    #[must_use]
    pub fn has_unprocessed_keys(&self) -> bool {
        self.unprocessed_keys.values().any(|k| !k.keys.is_empty())
    }
}

/// Translator for [`BatchGetItemRequest`].
#[derive(Debug)]
pub struct BatchGetItemOperation {
    request: BatchGetItemRequest,
}

impl BatchGetItemOperation {
    /// Wrap a request.
    #[must_use]
    pub fn new(request: BatchGetItemRequest) -> Self {
        Self { request }
    }
}

impl DatabaseOperation for BatchGetItemOperation {
    type Request = BatchGetItemInput;
    type Response = BatchGetItemOutput;
    type Output = BatchGetResultPage;

    fn operation_name(&self) -> OperationName {
        OperationName::BatchGetItem
    }

    fn generate_request(&self, config: &EnhancedConfig) -> EnhancedResult<BatchGetItemInput> {
        let mut request_items: HashMap<String, KeysAndAttributes> = HashMap::new();
        for batch in &self.request.read_batches {
            let consistent_read = batch.consistent_read.or(config.consistent_reads.then_some(true));
            let entry = request_items.entry(batch.table_name.clone()).or_default();
            if entry.keys.is_empty() {
                entry.consistent_read = consistent_read;
            } else if entry.consistent_read != consistent_read {
                return Err(EnhancedError::validation(format!(
                    "read batches for table '{}' disagree on consistent reads",
                    batch.table_name
                )));
            }
            entry.keys.extend(batch.keys.iter().cloned());
        }
        request_items.retain(|_, k| !k.keys.is_empty());

        let total: usize = request_items.values().map(|k| k.keys.len()).sum();
        check_batch_size(self.operation_name(), total, config.max_batch_get_items)?;
        Ok(BatchGetItemInput {
            request_items,
            ..BatchGetItemInput::default()
        })
    }

    fn service_call(&self, client: &dyn WireClient, request: BatchGetItemInput) -> WireFuture<BatchGetItemOutput> {
        client.batch_get_item(request)
    }

    fn transform_response(&self, response: BatchGetItemOutput) -> EnhancedResult<BatchGetResultPage> {
        let page = BatchGetResultPage {
            responses: response.responses,
            unprocessed_keys: response.unprocessed_keys,
        };
        if page.has_unprocessed_keys() {
            tracing::debug!(tables = page.unprocessed_keys.len(), "batch get left keys unprocessed");
        }
        Ok(page)
    }
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Puts and deletes for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteBatch {
    table_name: String,
    requests: Vec<WriteRequest>,
}

impl WriteBatch {
    /// Start a batch for `table`.
    #[must_use]
    pub fn builder<T>(table: &MappedTable<T>) -> WriteBatchBuilder<'_, T> {
        WriteBatchBuilder {
            table,
            pending: Vec::new(),
        }
    }

    /// Target table.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Wire write requests.
    #[must_use]
    pub fn requests(&self) -> &[WriteRequest] {
        &self.requests
    }
}

#[derive(Debug)]
enum PendingWrite<T> {
    Put(T),
    Delete(Key),
}

/// Builder for [`WriteBatch`].
#[derive(Debug)]
pub struct WriteBatchBuilder<'a, T> {
    table: &'a MappedTable<T>,
    pending: Vec<PendingWrite<T>>,
}

impl<T: Default> WriteBatchBuilder<'_, T> {
    /// Put `record`.
    #[must_use]
    pub fn add_put_item(mut self, record: T) -> Self {
        self.pending.push(PendingWrite::Put(record));
        self
    }

    /// Delete the item with `key`.
    #[must_use]
    pub fn add_delete_item(mut self, key: Key) -> Self {
        self.pending.push(PendingWrite::Delete(key));
        self
    }

    /// Run extensions and render the requests.
    ///
    /// Batch writes cannot carry conditions, so a put for which an extension
    /// adds one is rejected.
    pub fn build(self) -> EnhancedResult<WriteBatch> {
        let table = self.table;
        let context = table.context();
        let metadata = table.schema().table_metadata();
        let mut requests = Vec::with_capacity(self.pending.len());
        for write in self.pending {
            match write {
                PendingWrite::Put(record) => {
                    let input = PutItemOperation::new(PutItemRequest::builder().item(record).build())
                        .generate_request(table.schema(), &context, table.extension())?;
                    if input.condition_expression.is_some() {
                        return Err(EnhancedError::validation(format!(
                            "an extension added a condition to a put for table '{}'; batch writes cannot carry conditions",
                            table.table_name()
                        )));
                    }
                    requests.push(WriteRequest::put(input.item));
                }
                PendingWrite::Delete(key) => {
                    requests.push(WriteRequest::delete(key.key_map(metadata, PRIMARY_INDEX)?));
                }
            }
        }
        Ok(WriteBatch {
            table_name: table.table_name().to_owned(),
            requests,
        })
    }
}

/// Write batches for several tables.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct BatchWriteItemRequest {
    /// One batch per table. Batches for the same table are merged.
    pub write_batches: Vec<WriteBatch>,
}

/// Writes the store did not process in one `BatchWriteItem` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchWriteResult {
    unprocessed: HashMap<String, Vec<WriteRequest>>,
}

impl BatchWriteResult {
    /// Records of `table` whose put was not processed.
    pub fn unprocessed_put_items_for_table<T: Default>(&self, table: &MappedTable<T>) -> EnhancedResult<Vec<T>> {
        let context = table.context();
        self.requests_for(table.table_name())
            .filter_map(|r| r.put_request.as_ref())
            .map(|put| read_record(table.schema(), table.extension(), &context, put.item.clone()))
            .collect()
    }

    /// Keys of `table` whose delete was not processed.
    pub fn unprocessed_delete_keys_for_table<T>(&self, table: &MappedTable<T>) -> EnhancedResult<Vec<Key>> {
        let metadata = table.schema().table_metadata();
        self.requests_for(table.table_name())
            .filter_map(|r| r.delete_request.as_ref())
            .map(|delete| Key::from_item(&delete.key, metadata, PRIMARY_INDEX))
            .collect()
    }

    /// Returns `true` if every write was processed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unprocessed.values().all(Vec::is_empty)
    }

    fn requests_for(&self, table_name: &str) -> impl Iterator<Item = &WriteRequest> {
        self.unprocessed.get(table_name).into_iter().flatten()
    }
}

/// Translator for [`BatchWriteItemRequest`].
#[derive(Debug)]
pub struct BatchWriteItemOperation {
    request: BatchWriteItemRequest,
}

impl BatchWriteItemOperation {
    /// Wrap a request.
    #[must_use]
    pub fn new(request: BatchWriteItemRequest) -> Self {
        Self { request }
    }
}

impl DatabaseOperation for BatchWriteItemOperation {
    type Request = BatchWriteItemInput;
    type Response = BatchWriteItemOutput;
    type Output = BatchWriteResult;

    fn operation_name(&self) -> OperationName {
        OperationName::BatchWriteItem
    }

    fn generate_request(&self, config: &EnhancedConfig) -> EnhancedResult<BatchWriteItemInput> {
        let mut request_items: HashMap<String, Vec<WriteRequest>> = HashMap::new();
        for batch in &self.request.write_batches {
            request_items
                .entry(batch.table_name.clone())
                .or_default()
                .extend(batch.requests.iter().cloned());
        }
        request_items.retain(|_, r| !r.is_empty());

        let total: usize = request_items.values().map(Vec::len).sum();
        check_batch_size(self.operation_name(), total, config.max_batch_write_items)?;
        Ok(BatchWriteItemInput {
            request_items,
            ..BatchWriteItemInput::default()
        })
    }

    fn service_call(&self, client: &dyn WireClient, request: BatchWriteItemInput) -> WireFuture<BatchWriteItemOutput> {
        client.batch_write_item(request)
    }

    fn transform_response(&self, response: BatchWriteItemOutput) -> EnhancedResult<BatchWriteResult> {
        let result = BatchWriteResult {
            unprocessed: response.unprocessed_items,
        };
        if !result.is_complete() {
            tracing::debug!(tables = result.unprocessed.len(), "batch write left items unprocessed");
        }
        Ok(result)
    }
}

fn check_batch_size(operation: OperationName, total: usize, limit: usize) -> EnhancedResult<()> {
    if total == 0 {
        return Err(EnhancedError::validation(format!("{operation} needs at least one item")));
    }
    if total > limit {
        return Err(EnhancedError::validation(format!(
            "{operation} holds {total} items, more than the limit of {limit}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dynamap_model::AttributeValue;

    use super::*;
    use crate::client::tests::RecordingClient;
    use crate::schema::tests::{Order, sample_order};
    use crate::table::tests::orders;

    fn key(order_id: &str) -> Key {
        Key::builder()
            .partition_value(AttributeValue::from("c1"))
            .sort_value(AttributeValue::from(order_id))
            .build()
    }

    #[test]
    fn test_should_merge_read_batches_per_table() {
        let client = Arc::new(RecordingClient::default());
        let table = orders(&client, None);
        let first = ReadBatch::builder(&table).add_get_item(key("o1")).build().expect("batch");
        let second = ReadBatch::builder(&table).add_get_item(key("o2")).build().expect("batch");
        let op = BatchGetItemOperation::new(BatchGetItemRequest::builder().read_batches(vec![first, second]).build());
        let input = op.generate_request(&EnhancedConfig::default()).expect("input");
        assert_eq!(input.request_items["orders"].keys.len(), 2);
    }

    #[test]
    fn test_should_enforce_batch_limits() {
        let client = Arc::new(RecordingClient::default());
        let table = orders(&client, None);
        let batch = ReadBatch::builder(&table)
            .add_get_item(key("o1"))
            .add_get_item(key("o2"))
            .build()
            .expect("batch");
        let config = EnhancedConfig::builder().max_batch_get_items(1).build();
        let op = BatchGetItemOperation::new(BatchGetItemRequest::builder().read_batches(vec![batch]).build());
        assert!(matches!(op.generate_request(&config), Err(EnhancedError::Validation(_))));

        let empty = BatchWriteItemOperation::new(BatchWriteItemRequest::builder().write_batches(Vec::new()).build());
        assert!(empty.generate_request(&EnhancedConfig::default()).is_err());
    }

    #[test]
    fn test_should_reject_extension_condition_in_batch_write() {
        let client = Arc::new(RecordingClient::default());
        let table = orders(&client, None);
        let err = WriteBatch::builder(&table)
            .add_put_item(sample_order())
            .build()
            .expect_err("versioned put carries a condition");
        assert!(matches!(err, EnhancedError::Validation(_)));
    }

    #[test]
    fn test_should_build_unconditional_writes() {
        let client = Arc::new(RecordingClient::default());
        let table = orders(&client, Some(Vec::new()));
        let batch = WriteBatch::builder(&table)
            .add_put_item(sample_order())
            .add_delete_item(key("o9"))
            .build()
            .expect("batch");
        assert_eq!(batch.requests().len(), 2);
        assert!(batch.requests()[0].put_request.is_some());
        assert!(batch.requests()[1].delete_request.is_some());
    }

    #[test]
    fn test_should_surface_unprocessed_writes_per_table() {
        let client = Arc::new(RecordingClient::default());
        let table = orders(&client, Some(Vec::new()));
        let item = table.schema().item_from(&sample_order(), true).expect("item");
        let result = BatchWriteResult {
            unprocessed: HashMap::from([(
                "orders".to_owned(),
                vec![
                    WriteRequest::put(item),
                    WriteRequest::delete(
                        key("o9")
                            .key_map(table.schema().table_metadata(), PRIMARY_INDEX)
                            .expect("key"),
                    ),
                ],
            )]),
        };
        assert!(!result.is_complete());
        let puts: Vec<Order> = result.unprocessed_put_items_for_table(&table).expect("puts");
        assert_eq!(puts, vec![sample_order()]);
        assert_eq!(result.unprocessed_delete_keys_for_table(&table).expect("keys"), vec![key("o9")]);
    }
}
