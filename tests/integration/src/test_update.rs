//! Record updates: null handling, key-only records and caller actions.

#[cfg(test)]
mod tests {
    use dynamap_core::{EnhancedError, PRIMARY_INDEX};
    use dynamap_core::expression::{SetAction, UpdateAction, UpdateExpression};
    use dynamap_core::operation::update::UpdateItemRequest;
    use dynamap_model::AttributeValue;
    use dynamap_model::input::GetItemInput;

    use crate::{Order, local_store, orders};

    #[tokio::test]
    async fn test_should_remove_absent_attributes_by_default() {
        let (store, name) = local_store("update");
        let table = orders(&store, &name, Some(Vec::new()));

        table.put_item(Order::new("o1").total(10).note("gift")).await.expect("put");
        let updated = table
            .update_item(Order::new("o1").total(20))
            .await
            .expect("update")
            .expect("new image");
        assert_eq!(updated.total, Some(20));
        assert_eq!(updated.note, None);
    }

    #[tokio::test]
    async fn test_should_keep_absent_attributes_when_ignoring_nulls() {
        let (store, name) = local_store("update");
        let table = orders(&store, &name, Some(Vec::new()));

        table.put_item(Order::new("o1").total(10).note("gift")).await.expect("put");
        let updated = table
            .update_item_with(
                UpdateItemRequest::builder()
                    .item(Order::new("o1").total(20))
                    .ignore_nulls(true)
                    .build(),
            )
            .await
            .expect("update")
            .expect("new image");
        assert_eq!(updated.total, Some(20));
        assert_eq!(updated.note.as_deref(), Some("gift"));
    }

    #[tokio::test]
    async fn test_should_create_item_from_key_only_record() {
        let (store, name) = local_store("update");
        let table = orders(&store, &name, Some(Vec::new()));

        let created = table
            .update_item_with(UpdateItemRequest::builder().item(Order::new("o1")).ignore_nulls(true).build())
            .await
            .expect("update")
            .expect("new image");
        assert_eq!(created, Order::new("o1"));
        assert_eq!(store.item_count(&name).ok(), Some(1));
    }

    #[tokio::test]
    async fn test_should_reject_caller_action_on_record_attribute_before_sending() {
        let (store, name) = local_store("update");
        let table = orders(&store, &name, Some(Vec::new()));

        let caller = UpdateExpression::new()
            .with_action(UpdateAction::Set(SetAction::for_attribute("total", AttributeValue::number(1))));
        let err = table
            .update_item_with(
                UpdateItemRequest::builder()
                    .item(Order::new("o1").total(5))
                    .update_expression(caller)
                    .build(),
            )
            .await
            .expect_err("conflict");
        assert!(matches!(err, EnhancedError::ExpressionConflict { .. }));
        assert_eq!(store.item_count(&name).ok(), Some(0));
    }

    #[tokio::test]
    async fn test_should_apply_caller_actions_on_unmapped_attributes() {
        let (store, name) = local_store("update");
        let table = orders(&store, &name, Some(Vec::new()));

        let caller = UpdateExpression::new()
            .with_action(UpdateAction::Set(SetAction::for_attribute("audit", AttributeValue::from("ops"))));
        table
            .update_item_with(
                UpdateItemRequest::builder()
                    .item(Order::new("o1").total(5))
                    .update_expression(caller)
                    .build(),
            )
            .await
            .expect("update");

        let key = table
            .key_from(&Order::new("o1"))
            .and_then(|k| k.key_map(table.schema().table_metadata(), PRIMARY_INDEX))
            .expect("key");
        let raw = store
            .handle_get_item(GetItemInput {
                table_name: name.clone(),
                key,
                ..Default::default()
            })
            .expect("raw get")
            .item
            .expect("stored");
        assert_eq!(raw.get("audit"), Some(&AttributeValue::from("ops")));
        assert_eq!(raw.get("total"), Some(&AttributeValue::number(5)));
    }
}
