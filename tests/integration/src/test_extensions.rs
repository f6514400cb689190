//! Counter, timestamp and expiry extensions against a live store.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use dynamap_core::extension::{
        AtomicCounter, AtomicCounterExtension, AutoGeneratedTimestampExtension, TimeToLive,
        TimeToLiveExtension,
    };
    use dynamap_core::{EnhancedError, Extension};

    use crate::{Order, local_store, orders};

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single().unwrap_or_default()
    }

    fn timestamp() -> Arc<dyn Extension> {
        Arc::new(AutoGeneratedTimestampExtension::new(["created_at"]).with_clock(fixed_clock))
    }

    fn ttl() -> Arc<dyn Extension> {
        Arc::new(TimeToLiveExtension::new(vec![TimeToLive::new(
            "expires_at",
            "created_at",
            Duration::days(1),
        )]))
    }

    #[tokio::test]
    async fn test_should_reset_counter_on_put_and_increment_on_update() {
        let (store, name) = local_store("counter");
        let counter: Arc<dyn Extension> =
            Arc::new(AtomicCounterExtension::new(vec![AtomicCounter::new("views").start(10).delta(5)]));
        let table = orders(&store, &name, Some(vec![counter]));

        let mut record = Order::new("o1").total(1);
        record.views = Some(999);
        table.put_item(record.clone()).await.expect("put");
        let key = table.key_from(&record).expect("key");
        assert_eq!(table.get_item(key.clone()).await.expect("get").and_then(|o| o.views), Some(10));

        let first = table.update_item(record.clone()).await.expect("update").expect("new image");
        assert_eq!(first.views, Some(15));
        let second = table.update_item(record).await.expect("update").expect("new image");
        assert_eq!(second.views, Some(20));
        assert_eq!(second.total, Some(1));
    }

    #[tokio::test]
    async fn test_should_start_counter_on_first_update() {
        let (store, name) = local_store("counter");
        let counter: Arc<dyn Extension> =
            Arc::new(AtomicCounterExtension::new(vec![AtomicCounter::new("views").start(3).delta(2)]));
        let table = orders(&store, &name, Some(vec![counter]));

        let created = table.update_item(Order::new("o1")).await.expect("update").expect("new image");
        assert_eq!(created.views, Some(3));
    }

    #[tokio::test]
    async fn test_should_reject_conflicting_counters_without_writing() {
        let (store, name) = local_store("counter");
        let by_one: Arc<dyn Extension> =
            Arc::new(AtomicCounterExtension::new(vec![AtomicCounter::new("views")]));
        let by_two: Arc<dyn Extension> =
            Arc::new(AtomicCounterExtension::new(vec![AtomicCounter::new("views").delta(2)]));
        let table = orders(&store, &name, Some(vec![by_one, by_two]));

        let err = table.update_item(Order::new("o1")).await.expect_err("conflict");
        assert!(matches!(err, EnhancedError::ExpressionConflict { .. }));
        assert!(err.is_composition_error());
        assert_eq!(store.item_count(&name).ok(), Some(0));
    }

    #[tokio::test]
    async fn test_should_derive_expiry_from_stamped_attribute() {
        let (store, name) = local_store("ttl");
        let table = orders(&store, &name, Some(vec![timestamp(), ttl()]));

        table.put_item(Order::new("o1")).await.expect("put");
        let key = table.key_from(&Order::new("o1")).expect("key");
        let stored = table.get_item(key).await.expect("get").expect("stored");
        assert_eq!(stored.created_at, Some(fixed_clock()));
        assert_eq!(stored.expires_at, Some(fixed_clock().timestamp() + 86_400));
    }

    #[tokio::test]
    async fn test_should_skip_expiry_when_base_is_stamped_later() {
        let (store, name) = local_store("ttl");
        let table = orders(&store, &name, Some(vec![ttl(), timestamp()]));

        table.put_item(Order::new("o1")).await.expect("put");
        let key = table.key_from(&Order::new("o1")).expect("key");
        let stored = table.get_item(key).await.expect("get").expect("stored");
        assert_eq!(stored.created_at, Some(fixed_clock()));
        assert_eq!(stored.expires_at, None);
    }

    #[tokio::test]
    async fn test_should_keep_explicit_expiry() {
        let (store, name) = local_store("ttl");
        let table = orders(&store, &name, Some(vec![timestamp(), ttl()]));

        let mut record = Order::new("o1");
        record.expires_at = Some(42);
        table.put_item(record.clone()).await.expect("put");
        let key = table.key_from(&record).expect("key");
        let stored = table.get_item(key).await.expect("get").expect("stored");
        assert_eq!(stored.expires_at, Some(42));
    }
}
