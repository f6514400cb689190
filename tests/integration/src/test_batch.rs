//! Batch reads and writes across the mapped table.

#[cfg(test)]
mod tests {
    use dynamap_core::operation::batch::{BatchGetItemRequest, BatchWriteItemRequest, ReadBatch, WriteBatch};
    use dynamap_core::EnhancedError;

    use crate::{Order, enhanced_client, local_store, orders};

    #[tokio::test]
    async fn test_should_refuse_batch_put_under_versioning() {
        let (store, name) = local_store("batch");
        let table = orders(&store, &name, None);

        let err = WriteBatch::builder(&table)
            .add_put_item(Order::new("o1"))
            .build()
            .expect_err("conditional put");
        assert!(matches!(err, EnhancedError::Validation(_)));
        assert_eq!(store.item_count(&name).ok(), Some(0));
    }

    #[tokio::test]
    async fn test_should_write_and_read_batch() {
        let (store, name) = local_store("batch");
        let client = enhanced_client(&store, Some(Vec::new()));
        let table = client.table(name.as_str(), crate::order_schema());

        table.put_item(Order::new("doomed")).await.expect("seed");
        let doomed = table.key_from(&Order::new("doomed")).expect("key");

        let writes = WriteBatch::builder(&table)
            .add_put_item(Order::new("o1").total(1))
            .add_put_item(Order::new("o2").total(2).note("rush"))
            .add_delete_item(doomed.clone())
            .build()
            .expect("write batch");
        let written = client
            .batch_write_item(BatchWriteItemRequest::builder().write_batches(vec![writes]).build())
            .await
            .expect("batch write");
        assert!(written.is_complete());
        assert_eq!(store.item_count(&name).ok(), Some(2));

        let reads = ReadBatch::builder(&table)
            .add_get_item(table.key_from(&Order::new("o1")).expect("key"))
            .add_get_item(table.key_from(&Order::new("o2")).expect("key"))
            .add_get_item(doomed)
            .consistent_read(true)
            .build()
            .expect("read batch");
        let page = client
            .batch_get_item(BatchGetItemRequest::builder().read_batches(vec![reads]).build())
            .await
            .expect("batch get");
        assert!(!page.has_unprocessed_keys());

        let mut found = page.results_for_table(&table).expect("results");
        found.sort_by(|a, b| a.order_id.cmp(&b.order_id));
        assert_eq!(found, vec![Order::new("o1").total(1), Order::new("o2").total(2).note("rush")]);
    }
}
