//! End-to-end tests: typed tables on top of the in-memory store.
//!
//! Every test creates its own uniquely named table, so the suite runs in
//! parallel without shared state.
//!
//! ```text
//! cargo test -p dynamap-integration
//! ```

use std::sync::{Arc, Once};

use chrono::{DateTime, Utc};
use dynamap_core::config::EnhancedConfig;
use dynamap_core::{Attribute, EnhancedClient, Extension, MappedTable, TableSchema, WireClient};
use dynamap_local::LocalClient;

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Record stored by every scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    /// Partition key.
    pub customer: String,
    /// Sort key.
    pub order_id: Option<String>,
    /// Order total in cents.
    pub total: Option<i64>,
    /// Free text.
    pub note: Option<String>,
    /// Server-side counter.
    pub views: Option<i64>,
    /// Stamped on write.
    pub created_at: Option<DateTime<Utc>>,
    /// Expiry, epoch seconds.
    pub expires_at: Option<i64>,
    /// Optimistic-locking version.
    pub version: Option<i64>,
}

impl Order {
    /// Order `order_id` of customer `c1`.
    #[must_use]
    pub fn new(order_id: &str) -> Self {
        Self {
            customer: "c1".to_owned(),
            order_id: Some(order_id.to_owned()),
            ..Self::default()
        }
    }

    /// Set the total.
    #[must_use]
    pub fn total(mut self, total: i64) -> Self {
        self.total = Some(total);
        self
    }

    /// Set the note.
    #[must_use]
    pub fn note(mut self, note: &str) -> Self {
        self.note = Some(note.to_owned());
        self
    }
}

/// Schema of [`Order`].
#[must_use]
pub fn order_schema() -> Arc<TableSchema<Order>> {
    let schema = TableSchema::<Order>::builder()
        .attribute(
            Attribute::new("customer", |o: &Order| Some(o.customer.clone()), |o, v| {
                o.customer = v.unwrap_or_default();
            })
            .partition_key(),
        )
        .attribute(Attribute::new("order_id", |o: &Order| o.order_id.clone(), |o, v| o.order_id = v).sort_key())
        .attribute(Attribute::new("total", |o: &Order| o.total, |o, v| o.total = v))
        .attribute(Attribute::new("note", |o: &Order| o.note.clone(), |o, v| o.note = v))
        .attribute(Attribute::new("views", |o: &Order| o.views, |o, v| o.views = v))
        .attribute(Attribute::new("created_at", |o: &Order| o.created_at, |o, v| o.created_at = v))
        .attribute(Attribute::new("expires_at", |o: &Order| o.expires_at, |o, v| o.expires_at = v))
        .attribute(Attribute::new("version", |o: &Order| o.version, |o, v| o.version = v).version())
        .build()
        .unwrap_or_else(|e| panic!("invalid order schema: {e}"));
    Arc::new(schema)
}

/// Generate a unique table name for a test.
#[must_use]
pub fn test_table_name(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().to_string()[..8].to_owned();
    format!("test-{prefix}-{id}")
}

/// A fresh store with one orders table, plus the table's name.
#[must_use]
pub fn local_store(prefix: &str) -> (Arc<LocalClient>, String) {
    init_tracing();
    let store = Arc::new(LocalClient::default());
    let name = test_table_name(prefix);
    store.create_table(&name, "customer", Some("order_id"));
    tracing::debug!(table = %name, "created test table");
    (store, name)
}

/// Typed view of `table_name`. `None` keeps the default extensions.
#[must_use]
pub fn orders(
    store: &Arc<LocalClient>,
    table_name: &str,
    extensions: Option<Vec<Arc<dyn Extension>>>,
) -> MappedTable<Order> {
    enhanced_client(store, extensions).table(table_name, order_schema())
}

/// Client over `store`.
#[must_use]
pub fn enhanced_client(store: &Arc<LocalClient>, extensions: Option<Vec<Arc<dyn Extension>>>) -> EnhancedClient {
    let mut builder = EnhancedClient::builder()
        .client(Arc::clone(store) as Arc<dyn WireClient>)
        .config(EnhancedConfig::default());
    if let Some(extensions) = extensions {
        builder = builder.extensions(extensions);
    }
    builder
        .build()
        .unwrap_or_else(|e| panic!("failed to build client: {e}"))
}

mod test_batch;
mod test_extensions;
mod test_transact;
mod test_update;
mod test_versioning;
