//! Transactional writes and reads.

#[cfg(test)]
mod tests {
    use dynamap_core::operation::transact::{TransactGetItemsRequest, TransactWriteItemsRequest};
    use dynamap_core::{EnhancedError, Expression};

    use crate::{Order, enhanced_client, local_store};

    fn attribute_exists(name: &str) -> Expression {
        Expression::builder()
            .expression("attribute_exists(#attr)")
            .put_name("#attr", name)
            .build()
    }

    #[tokio::test]
    async fn test_should_cancel_whole_transaction_on_failed_check() {
        let (store, name) = local_store("transact");
        let client = enhanced_client(&store, Some(Vec::new()));
        let table = client.table(name.as_str(), crate::order_schema());

        let missing = table.key_from(&Order::new("absent")).expect("key");
        let request = TransactWriteItemsRequest::new()
            .add_put_item(&table, Order::new("o1").total(7))
            .and_then(|r| r.add_condition_check(&table, &missing, &attribute_exists("customer")))
            .expect("request");

        let err = client.transact_write_items(request).await.expect_err("cancelled");
        assert!(err.is_conditional_failure());
        let EnhancedError::TransactionCanceled(cancellation) = err else {
            panic!("expected a cancelled transaction");
        };
        let failures: Vec<_> = cancellation.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].index, 1);
        assert_eq!(failures[0].table_name.as_deref(), Some(name.as_str()));
        assert_eq!(store.item_count(&name).ok(), Some(0));
    }

    #[tokio::test]
    async fn test_should_commit_and_read_back_transaction() {
        let (store, name) = local_store("transact");
        let client = enhanced_client(&store, None);
        let table = client.table(name.as_str(), crate::order_schema());

        table.put_item(Order::new("old")).await.expect("seed");
        let old_key = table.key_from(&Order::new("old")).expect("key");
        let seeded = table.get_item(old_key.clone()).await.expect("get").expect("stored");

        let request = TransactWriteItemsRequest::new()
            .add_put_item(&table, Order::new("o1").total(1))
            .and_then(|r| r.add_put_item(&table, Order::new("o2").total(2)))
            .and_then(|r| r.add_delete_record(&table, &seeded, true))
            .expect("request");
        assert_eq!(request.len(), 3);
        client.transact_write_items(request).await.expect("commit");

        let k1 = table.key_from(&Order::new("o1")).expect("key");
        let k2 = table.key_from(&Order::new("o2")).expect("key");
        let reads = TransactGetItemsRequest::new()
            .add_get_item(&table, &k1)
            .and_then(|r| r.add_get_item(&table, &k2))
            .and_then(|r| r.add_get_item(&table, &old_key))
            .expect("reads");
        let documents = client.transact_get_items(reads).await.expect("get");
        assert_eq!(documents.len(), 3);

        let first = documents[0].item(&table).expect("hydrate").expect("o1");
        assert_eq!((first.total, first.version), (Some(1), Some(1)));
        let second = documents[1].item(&table).expect("hydrate").expect("o2");
        assert_eq!(second.total, Some(2));
        assert!(documents[2].item(&table).expect("hydrate").is_none());
    }

    #[tokio::test]
    async fn test_should_reject_stale_version_inside_transaction() {
        let (store, name) = local_store("transact");
        let client = enhanced_client(&store, None);
        let table = client.table(name.as_str(), crate::order_schema());

        table.put_item(Order::new("o1")).await.expect("seed");
        let key = table.key_from(&Order::new("o1")).expect("key");
        let mut stale = table.get_item(key).await.expect("get").expect("stored");
        stale.version = Some(5);

        let request = TransactWriteItemsRequest::new()
            .add_update_item(&table, stale.total(3))
            .expect("request");
        let err = client.transact_write_items(request).await.expect_err("stale");
        assert!(err.is_conditional_failure());
        assert_eq!(store.item_count(&name).ok(), Some(1));
    }
}
