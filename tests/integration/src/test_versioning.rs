//! Optimistic locking through the versioned-record extension.

#[cfg(test)]
mod tests {
    use crate::{Order, local_store, orders};

    #[tokio::test]
    async fn test_should_bump_version_and_reject_stale_update() {
        let (store, name) = local_store("version");
        let table = orders(&store, &name, None);

        table.put_item(Order::new("o1").total(100)).await.expect("initial put");
        let key = table.key_from(&Order::new("o1")).expect("key");
        let stored = table.get_item(key.clone()).await.expect("get").expect("stored");
        assert_eq!(stored.version, Some(1));

        let updated = table
            .update_item(stored.clone().total(200))
            .await
            .expect("update")
            .expect("new image");
        assert_eq!(updated.version, Some(2));
        assert_eq!(updated.total, Some(200));

        let err = table
            .update_item(stored.total(300))
            .await
            .expect_err("stale update");
        assert!(err.is_conditional_failure());

        let current = table.get_item(key).await.expect("get").expect("stored");
        assert_eq!(current.version, Some(2));
        assert_eq!(current.total, Some(200));
    }

    #[tokio::test]
    async fn test_should_reject_unversioned_put_over_existing_item() {
        let (store, name) = local_store("version");
        let table = orders(&store, &name, None);

        table.put_item(Order::new("o1")).await.expect("initial put");
        let err = table.put_item(Order::new("o1").total(5)).await.expect_err("second put");
        assert!(err.is_conditional_failure());
    }

    #[tokio::test]
    async fn test_should_delete_only_matching_version() {
        let (store, name) = local_store("version");
        let table = orders(&store, &name, None);

        table.put_item(Order::new("o1")).await.expect("put");
        let key = table.key_from(&Order::new("o1")).expect("key");
        let current = table.get_item(key.clone()).await.expect("get").expect("stored");

        let mut stale = current.clone();
        stale.version = Some(7);
        let err = table.delete_record(&stale, true).await.expect_err("stale delete");
        assert!(err.is_conditional_failure());
        assert!(table.get_item(key.clone()).await.expect("get").is_some());

        let deleted = table.delete_record(&current, true).await.expect("delete");
        assert_eq!(deleted.and_then(|o| o.version), Some(1));
        assert!(table.get_item(key).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn test_should_ignore_versions_without_extension() {
        let (store, name) = local_store("version");
        let table = orders(&store, &name, Some(Vec::new()));

        table.put_item(Order::new("o1")).await.expect("first put");
        table.put_item(Order::new("o1").total(9)).await.expect("overwrite");
        let key = table.key_from(&Order::new("o1")).expect("key");
        let stored = table.get_item(key).await.expect("get").expect("stored");
        assert_eq!(stored.version, None);
        assert_eq!(stored.total, Some(9));
    }
}
