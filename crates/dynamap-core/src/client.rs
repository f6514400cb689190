//! Boundary to the store.
//!
//! Every mapped operation is composed synchronously and then sent through
//! exactly one [`WireClient`] call. Implementations own transport, retries
//! and authentication; the mapping layer never sees them.

use std::future::Future;
use std::pin::Pin;

use dynamap_model::DynamoDBError;
use dynamap_model::input::{
    BatchGetItemInput, BatchWriteItemInput, DeleteItemInput, GetItemInput, PutItemInput,
    TransactGetItemsInput, TransactWriteItemsInput, UpdateItemInput,
};
use dynamap_model::output::{
    BatchGetItemOutput, BatchWriteItemOutput, DeleteItemOutput, GetItemOutput, PutItemOutput,
    TransactGetItemsOutput, TransactWriteItemsOutput, UpdateItemOutput,
};

/// Future returned by a [`WireClient`] call.
pub type WireFuture<O> = Pin<Box<dyn Future<Output = Result<O, DynamoDBError>> + Send>>;

/// A DynamoDB-compatible store.
pub trait WireClient: Send + Sync + 'static {
    /// `GetItem`.
    fn get_item(&self, input: GetItemInput) -> WireFuture<GetItemOutput>;

    /// `PutItem`.
    fn put_item(&self, input: PutItemInput) -> WireFuture<PutItemOutput>;

    /// `UpdateItem`.
    fn update_item(&self, input: UpdateItemInput) -> WireFuture<UpdateItemOutput>;

    /// `DeleteItem`.
    fn delete_item(&self, input: DeleteItemInput) -> WireFuture<DeleteItemOutput>;

    /// `BatchGetItem`.
    fn batch_get_item(&self, input: BatchGetItemInput) -> WireFuture<BatchGetItemOutput>;

    /// `BatchWriteItem`.
    fn batch_write_item(&self, input: BatchWriteItemInput) -> WireFuture<BatchWriteItemOutput>;

    /// `TransactWriteItems`.
    fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> WireFuture<TransactWriteItemsOutput>;

    /// `TransactGetItems`.
    fn transact_get_items(&self, input: TransactGetItemsInput) -> WireFuture<TransactGetItemsOutput>;
}

#[cfg(test)]
pub(crate) mod tests {
    use parking_lot::Mutex;

    use super::*;

    /// Records every request and answers with canned outputs.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingClient {
        pub(crate) puts: Mutex<Vec<PutItemInput>>,
        pub(crate) updates: Mutex<Vec<UpdateItemInput>>,
        pub(crate) deletes: Mutex<Vec<DeleteItemInput>>,
        pub(crate) gets: Mutex<Vec<GetItemInput>>,
        pub(crate) batch_writes: Mutex<Vec<BatchWriteItemInput>>,
        pub(crate) batch_gets: Mutex<Vec<BatchGetItemInput>>,
        pub(crate) transact_writes: Mutex<Vec<TransactWriteItemsInput>>,
        pub(crate) transact_gets: Mutex<Vec<TransactGetItemsInput>>,
        pub(crate) get_output: Mutex<GetItemOutput>,
        pub(crate) update_output: Mutex<UpdateItemOutput>,
        pub(crate) batch_get_output: Mutex<BatchGetItemOutput>,
        pub(crate) transact_get_output: Mutex<TransactGetItemsOutput>,
        pub(crate) error: Mutex<Option<DynamoDBError>>,
    }

    impl RecordingClient {
        fn answer<O: Send + 'static>(&self, output: O) -> WireFuture<O> {
            let error = self.error.lock().take();
            Box::pin(async move {
                match error {
                    Some(err) => Err(err),
                    None => Ok(output),
                }
            })
        }

        pub(crate) fn fail_with(&self, error: DynamoDBError) {
            *self.error.lock() = Some(error);
        }

        pub(crate) fn call_count(&self) -> usize {
            self.puts.lock().len()
                + self.updates.lock().len()
                + self.deletes.lock().len()
                + self.gets.lock().len()
                + self.batch_writes.lock().len()
                + self.batch_gets.lock().len()
                + self.transact_writes.lock().len()
                + self.transact_gets.lock().len()
        }
    }

    impl WireClient for RecordingClient {
        fn get_item(&self, input: GetItemInput) -> WireFuture<GetItemOutput> {
            self.gets.lock().push(input);
            let output = self.get_output.lock().clone();
            self.answer(output)
        }

        fn put_item(&self, input: PutItemInput) -> WireFuture<PutItemOutput> {
            self.puts.lock().push(input);
            self.answer(PutItemOutput::default())
        }

        fn update_item(&self, input: UpdateItemInput) -> WireFuture<UpdateItemOutput> {
            self.updates.lock().push(input);
            let output = self.update_output.lock().clone();
            self.answer(output)
        }

        fn delete_item(&self, input: DeleteItemInput) -> WireFuture<DeleteItemOutput> {
            self.deletes.lock().push(input);
            self.answer(DeleteItemOutput::default())
        }

        fn batch_get_item(&self, input: BatchGetItemInput) -> WireFuture<BatchGetItemOutput> {
            self.batch_gets.lock().push(input);
            let output = self.batch_get_output.lock().clone();
            self.answer(output)
        }

        fn batch_write_item(&self, input: BatchWriteItemInput) -> WireFuture<BatchWriteItemOutput> {
            self.batch_writes.lock().push(input);
            self.answer(BatchWriteItemOutput::default())
        }

        fn transact_write_items(
            &self,
            input: TransactWriteItemsInput,
        ) -> WireFuture<TransactWriteItemsOutput> {
            self.transact_writes.lock().push(input);
            self.answer(TransactWriteItemsOutput::default())
        }

        fn transact_get_items(&self, input: TransactGetItemsInput) -> WireFuture<TransactGetItemsOutput> {
            self.transact_gets.lock().push(input);
            let output = self.transact_get_output.lock().clone();
            self.answer(output)
        }
    }
}
