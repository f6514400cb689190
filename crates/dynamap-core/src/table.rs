//! Typed facade over a [`WireClient`].

use std::fmt;
use std::sync::Arc;

use crate::client::WireClient;
use crate::config::EnhancedConfig;
use crate::error::{EnhancedError, EnhancedResult};
use crate::extension::{ChainExtension, Extension, VersionedRecordExtension};
use crate::key::Key;
use crate::operation::batch::{
    BatchGetItemOperation, BatchGetItemRequest, BatchGetResultPage, BatchWriteItemOperation,
    BatchWriteItemRequest, BatchWriteResult,
};
use crate::operation::delete::{DeleteItemOperation, DeleteItemRequest};
use crate::operation::get::{GetItemOperation, GetItemRequest};
use crate::operation::put::{PutItemOperation, PutItemRequest};
use crate::operation::transact::{
    Document, TransactGetItemsOperation, TransactGetItemsRequest, TransactWriteItemsOperation,
    TransactWriteItemsRequest,
};
use crate::operation::update::{UpdateItemOperation, UpdateItemRequest};
use crate::operation::{OperationContext, execute, execute_database};
use crate::schema::{PRIMARY_INDEX, TableSchema};

/// Entry point: a store client plus the extensions and limits applied to
/// every mapped table.
#[derive(Clone)]
pub struct EnhancedClient {
    client: Arc<dyn WireClient>,
    extension: Option<Arc<dyn Extension>>,
    config: Arc<EnhancedConfig>,
}

impl fmt::Debug for EnhancedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhancedClient")
            .field("extension", &self.extension)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EnhancedClient`].
#[derive(Default)]
pub struct EnhancedClientBuilder {
    client: Option<Arc<dyn WireClient>>,
    extensions: Option<Vec<Arc<dyn Extension>>>,
    config: Option<EnhancedConfig>,
}

impl fmt::Debug for EnhancedClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnhancedClientBuilder")
            .field("client", &self.client.is_some())
            .field("extensions", &self.extensions)
            .field("config", &self.config)
            .finish()
    }
}

impl EnhancedClientBuilder {
    /// Store client. Required.
    #[must_use]
    pub fn client(mut self, client: Arc<dyn WireClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Extensions, run in the given order. Without this call the client uses
    /// [`VersionedRecordExtension::default`]; an empty list disables
    /// extensions.
    #[must_use]
    pub fn extensions(mut self, extensions: Vec<Arc<dyn Extension>>) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Limits and defaults. Without this call [`EnhancedConfig::from_env`]
    /// is used.
    #[must_use]
    pub fn config(mut self, config: EnhancedConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the client.
    pub fn build(self) -> EnhancedResult<EnhancedClient> {
        let client = self
            .client
            .ok_or_else(|| EnhancedError::validation("an enhanced client needs a wire client"))?;
        let extension: Option<Arc<dyn Extension>> = match self.extensions {
            None => Some(Arc::new(VersionedRecordExtension::default())),
            Some(mut list) if list.len() <= 1 => list.pop(),
            Some(list) => Some(Arc::new(ChainExtension::new(list))),
        };
        let config = self.config.unwrap_or_else(EnhancedConfig::from_env);
        tracing::debug!(extension = ?extension, "built enhanced client");
        Ok(EnhancedClient {
            client,
            extension,
            config: Arc::new(config),
        })
    }
}

impl EnhancedClient {
    /// Start building a client.
    #[must_use]
    pub fn builder() -> EnhancedClientBuilder {
        EnhancedClientBuilder::default()
    }

    /// Map `table_name` to records described by `schema`.
    #[must_use]
    pub fn table<T>(&self, table_name: impl Into<String>, schema: Arc<TableSchema<T>>) -> MappedTable<T> {
        MappedTable {
            table_name: table_name.into(),
            schema,
            client: Arc::clone(&self.client),
            extension: self.extension.clone(),
            config: Arc::clone(&self.config),
        }
    }

    /// The extension applied to every table, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&dyn Extension> {
        self.extension.as_deref()
    }

    /// Limits and defaults.
    #[must_use]
    pub fn config(&self) -> &EnhancedConfig {
        &self.config
    }

    /// Read keys from several tables in one call.
    pub async fn batch_get_item(&self, request: BatchGetItemRequest) -> EnhancedResult<BatchGetResultPage> {
        execute_database(&BatchGetItemOperation::new(request), &self.config, self.client.as_ref()).await
    }

    /// Put and delete across several tables in one call, without conditions.
    pub async fn batch_write_item(&self, request: BatchWriteItemRequest) -> EnhancedResult<BatchWriteResult> {
        execute_database(&BatchWriteItemOperation::new(request), &self.config, self.client.as_ref()).await
    }

    /// Read several items atomically.
    pub async fn transact_get_items(&self, request: TransactGetItemsRequest) -> EnhancedResult<Vec<Document>> {
        execute_database(&TransactGetItemsOperation::new(request), &self.config, self.client.as_ref()).await
    }

    /// Write several items atomically.
    pub async fn transact_write_items(&self, request: TransactWriteItemsRequest) -> EnhancedResult<()> {
        execute_database(&TransactWriteItemsOperation::new(request), &self.config, self.client.as_ref()).await
    }
}

/// One table mapped to record type `T`.
pub struct MappedTable<T> {
    table_name: String,
    schema: Arc<TableSchema<T>>,
    client: Arc<dyn WireClient>,
    extension: Option<Arc<dyn Extension>>,
    config: Arc<EnhancedConfig>,
}

impl<T> Clone for MappedTable<T> {
    fn clone(&self) -> Self {
        Self {
            table_name: self.table_name.clone(),
            schema: Arc::clone(&self.schema),
            client: Arc::clone(&self.client),
            extension: self.extension.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<T> fmt::Debug for MappedTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedTable")
            .field("table_name", &self.table_name)
            .field("schema", &self.schema)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

impl<T> MappedTable<T> {
    /// Table name.
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Record schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema<T> {
        &self.schema
    }

    /// Extension applied to this table's reads and writes.
    #[must_use]
    pub fn extension(&self) -> Option<&dyn Extension> {
        self.extension.as_deref()
    }

    /// Context of an operation on the primary index.
    #[must_use]
    pub fn context(&self) -> OperationContext {
        OperationContext::new(&self.table_name)
    }

    /// Primary key of `record`.
    pub fn key_from(&self, record: &T) -> EnhancedResult<Key> {
        self.schema.key_for(record, PRIMARY_INDEX)
    }
}

impl<T: Default + Send + Sync> MappedTable<T> {
    /// Read a record by key.
    pub async fn get_item(&self, key: Key) -> EnhancedResult<Option<T>> {
        self.get_item_with(GetItemRequest::builder().key(key).build()).await
    }

    /// Read a record.
    pub async fn get_item_with(&self, mut request: GetItemRequest) -> EnhancedResult<Option<T>> {
        if request.consistent_read.is_none() && self.config.consistent_reads {
            request.consistent_read = Some(true);
        }
        let operation = GetItemOperation::new(request);
        execute(&operation, &self.schema, &self.context(), self.extension(), self.client.as_ref()).await
    }

    /// Write a whole record.
    pub async fn put_item(&self, record: T) -> EnhancedResult<()> {
        self.put_item_with(PutItemRequest::builder().item(record).build())
            .await
            .map(|_| ())
    }

    /// Write a whole record, returning the replaced one if asked for.
    pub async fn put_item_with(&self, request: PutItemRequest<T>) -> EnhancedResult<Option<T>> {
        let operation = PutItemOperation::new(request);
        execute(&operation, &self.schema, &self.context(), self.extension(), self.client.as_ref()).await
    }

    /// Write a record's attributes, removing the ones it leaves absent.
    pub async fn update_item(&self, record: T) -> EnhancedResult<Option<T>> {
        self.update_item_with(UpdateItemRequest::builder().item(record).build())
            .await
    }

    /// Update with explicit options.
    pub async fn update_item_with(&self, request: UpdateItemRequest<T>) -> EnhancedResult<Option<T>> {
        let operation = UpdateItemOperation::new(request);
        execute(&operation, &self.schema, &self.context(), self.extension(), self.client.as_ref()).await
    }

    /// Delete by key, returning the deleted record.
    pub async fn delete_item(&self, key: Key) -> EnhancedResult<Option<T>> {
        self.delete_item_with(DeleteItemRequest::builder().key(key).build())
            .await
    }

    /// Delete with explicit options.
    pub async fn delete_item_with(&self, request: DeleteItemRequest) -> EnhancedResult<Option<T>> {
        let operation = DeleteItemOperation::new(request);
        execute(&operation, &self.schema, &self.context(), self.extension(), self.client.as_ref()).await
    }

    /// Delete the item `record` maps to. With `optimistic_locking` the delete
    /// only succeeds while the stored version equals the record's.
    pub async fn delete_record(&self, record: &T, optimistic_locking: bool) -> EnhancedResult<Option<T>> {
        let request = DeleteItemRequest::for_record(&self.schema, record, optimistic_locking)?;
        self.delete_item_with(request).await
    }
}
