//! In-memory item storage.
//!
//! ```text
//! DashMap<partition value, BTreeMap<SortableAttributeValue, Item>>
//! ```
//!
//! Tables without a sort key store each partition's single item under
//! [`SortableAttributeValue::Sentinel`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use dynamap_model::{AttributeValue, DynamoDBError, Item};

/// Errors raised while locating an item by key.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A key attribute is absent.
    #[error("missing required key attribute: {attr}")]
    MissingKeyAttribute {
        /// Attribute name.
        attr: String,
    },
    /// A key attribute is not a string, number or binary.
    #[error("key attribute '{attr}' has wrong type: expected S, N, or B, got {actual}")]
    InvalidKeyType {
        /// Attribute name.
        attr: String,
        /// Type descriptor found.
        actual: String,
    },
    /// The key carries attributes other than the key attributes.
    #[error("the provided key element does not match the schema")]
    KeyMismatch,
}

/// Key attribute names of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    /// Partition key attribute.
    pub partition_key: String,
    /// Sort key attribute, if the table has one.
    pub sort_key: Option<String>,
}

impl KeySchema {
    /// Returns `true` if `name` is one of the key attributes.
    #[must_use]
    pub fn is_key_attribute(&self, name: &str) -> bool {
        self.partition_key == name || self.sort_key.as_deref() == Some(name)
    }

    fn len(&self) -> usize {
        1 + usize::from(self.sort_key.is_some())
    }
}

/// Location of one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrimaryKey {
    /// Partition key value.
    pub partition_key: AttributeValue,
    /// Sort key value, or the sentinel.
    pub sort_key: SortableAttributeValue,
}

/// Key-eligible value with DynamoDB ordering.
///
/// Strings order by UTF-8 bytes, numbers numerically and binaries by
/// unsigned bytes.
#[derive(Debug, Clone)]
pub enum SortableAttributeValue {
    /// String sort key.
    S(String),
    /// Number sort key, kept in its wire form.
    N(String),
    /// Binary sort key.
    B(bytes::Bytes),
    /// Placeholder for tables without a sort key.
    Sentinel,
}

impl SortableAttributeValue {
    fn from_attribute_value(attr: &str, value: &AttributeValue) -> Result<Self, StorageError> {
        match value {
            AttributeValue::S(s) => Ok(Self::S(s.clone())),
            AttributeValue::N(n) => Ok(Self::N(n.clone())),
            AttributeValue::B(b) => Ok(Self::B(b.clone())),
            other => Err(StorageError::InvalidKeyType {
                attr: attr.to_owned(),
                actual: other.type_descriptor().to_owned(),
            }),
        }
    }
}

impl PartialEq for SortableAttributeValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortableAttributeValue {}

impl PartialOrd for SortableAttributeValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SortableAttributeValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::S(a), Self::S(b)) => a.as_bytes().cmp(b.as_bytes()),
            (Self::N(a), Self::N(b)) => {
                let fa = a.parse::<f64>().unwrap_or(f64::NAN);
                let fb = b.parse::<f64>().unwrap_or(f64::NAN);
                fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
            }
            (Self::B(a), Self::B(b)) => a.as_ref().cmp(b.as_ref()),
            (Self::Sentinel, Self::Sentinel) => Ordering::Equal,
            (Self::S(_), _) => Ordering::Less,
            (_, Self::S(_)) => Ordering::Greater,
            (Self::N(_), _) => Ordering::Less,
            (_, Self::N(_)) => Ordering::Greater,
            (Self::B(_), _) => Ordering::Less,
            (_, Self::B(_)) => Ordering::Greater,
        }
    }
}

impl std::hash::Hash for SortableAttributeValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::S(s) => s.hash(state),
            Self::N(n) => n.hash(state),
            Self::B(b) => b.hash(state),
            Self::Sentinel => {}
        }
    }
}

/// Items of one table.
#[derive(Debug)]
pub struct TableStorage {
    data: DashMap<AttributeValue, BTreeMap<SortableAttributeValue, Item>>,
    key_schema: KeySchema,
    item_count: AtomicU64,
}

impl TableStorage {
    /// Empty table with the given key attributes.
    #[must_use]
    pub fn new(key_schema: KeySchema) -> Self {
        Self {
            data: DashMap::new(),
            key_schema,
            item_count: AtomicU64::new(0),
        }
    }

    /// Key attributes of this table.
    #[must_use]
    pub fn key_schema(&self) -> &KeySchema {
        &self.key_schema
    }

    /// Number of stored items.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.item_count.load(AtomicOrdering::Relaxed)
    }

    /// Locate an item by a request key, which must name exactly the key
    /// attributes.
    pub fn key_of(&self, key: &Item) -> Result<PrimaryKey, StorageError> {
        if key.len() != self.key_schema.len() {
            return Err(StorageError::KeyMismatch);
        }
        extract_primary_key(&self.key_schema, key)
    }

    /// Insert or replace an item, returning the item it replaced.
    pub fn put_item(&self, item: Item) -> Result<Option<Item>, StorageError> {
        let key = extract_primary_key(&self.key_schema, &item)?;
        let old = self.data.entry(key.partition_key).or_default().insert(key.sort_key, item);
        if old.is_none() {
            self.item_count.fetch_add(1, AtomicOrdering::Relaxed);
            debug!("inserted new item");
        } else {
            debug!("replaced existing item");
        }
        Ok(old)
    }

    /// Item stored under `key`.
    #[must_use]
    pub fn get_item(&self, key: &PrimaryKey) -> Option<Item> {
        self.data
            .get(&key.partition_key)
            .and_then(|partition| partition.get(&key.sort_key).cloned())
    }

    /// Remove the item stored under `key`, returning it.
    pub fn delete_item(&self, key: &PrimaryKey) -> Option<Item> {
        let removed = {
            let mut partition = self.data.get_mut(&key.partition_key)?;
            partition.remove(&key.sort_key)?
        };
        self.data.remove_if(&key.partition_key, |_, partition| partition.is_empty());
        self.item_count.fetch_sub(1, AtomicOrdering::Relaxed);
        debug!("deleted item");
        Some(removed)
    }
}

/// Extract the primary key of `item`.
pub fn extract_primary_key(key_schema: &KeySchema, item: &Item) -> Result<PrimaryKey, StorageError> {
    let partition = key_attribute(item, &key_schema.partition_key)?;
    SortableAttributeValue::from_attribute_value(&key_schema.partition_key, partition)?;
    let sort_key = match &key_schema.sort_key {
        Some(name) => SortableAttributeValue::from_attribute_value(name, key_attribute(item, name)?)?,
        None => SortableAttributeValue::Sentinel,
    };
    Ok(PrimaryKey {
        partition_key: partition.clone(),
        sort_key,
    })
}

fn key_attribute<'a>(item: &'a Item, name: &str) -> Result<&'a AttributeValue, StorageError> {
    item.get(name).ok_or_else(|| StorageError::MissingKeyAttribute { attr: name.to_owned() })
}

/// All tables of a local store.
#[derive(Debug, Default)]
pub struct LocalStore {
    tables: DashMap<String, Arc<TableStorage>>,
}

impl LocalStore {
    /// Register a table. Re-creating an existing table replaces it.
    pub fn create_table(&self, name: impl Into<String>, key_schema: KeySchema) -> Arc<TableStorage> {
        let table = Arc::new(TableStorage::new(key_schema));
        self.tables.insert(name.into(), Arc::clone(&table));
        table
    }

    /// Look up a table or fail with `ResourceNotFoundException`.
    pub fn require_table(&self, name: &str) -> Result<Arc<TableStorage>, DynamoDBError> {
        self.tables
            .get(name)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| DynamoDBError::resource_not_found(format!("Requested resource not found: Table: {name} not found")))
    }

    /// Registered table names, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite_schema() -> KeySchema {
        KeySchema {
            partition_key: "pk".to_owned(),
            sort_key: Some("sk".to_owned()),
        }
    }

    fn item(pk: &str, sk: i64, extra: &str) -> Item {
        Item::from([
            ("pk".to_owned(), AttributeValue::from(pk)),
            ("sk".to_owned(), AttributeValue::number(sk)),
            ("extra".to_owned(), AttributeValue::from(extra)),
        ])
    }

    #[test]
    fn test_should_put_get_and_delete_item() {
        let table = TableStorage::new(composite_schema());
        assert!(table.put_item(item("a", 1, "x")).expect("put").is_none());
        let replaced = table.put_item(item("a", 1, "y")).expect("put");
        assert_eq!(replaced.and_then(|i| i.get("extra").cloned()), Some(AttributeValue::from("x")));
        assert_eq!(table.item_count(), 1);

        let request_key: Item = item("a", 1, "ignored").into_iter().filter(|(k, _)| k != "extra").collect();
        let key = table.key_of(&request_key).expect("key");
        assert_eq!(table.get_item(&key).and_then(|i| i.get("extra").cloned()), Some(AttributeValue::from("y")));
        assert!(table.delete_item(&key).is_some());
        assert!(table.get_item(&key).is_none());
        assert_eq!(table.item_count(), 0);
    }

    #[test]
    fn test_should_reject_bad_keys() {
        let table = TableStorage::new(composite_schema());
        let missing = Item::from([("pk".to_owned(), AttributeValue::from("a"))]);
        assert!(matches!(table.put_item(missing.clone()), Err(StorageError::MissingKeyAttribute { .. })));
        assert!(matches!(table.key_of(&missing), Err(StorageError::KeyMismatch)));
        let wrong_type = Item::from([
            ("pk".to_owned(), AttributeValue::Bool(true)),
            ("sk".to_owned(), AttributeValue::number(1)),
        ]);
        assert!(matches!(table.key_of(&wrong_type), Err(StorageError::InvalidKeyType { .. })));
    }

    #[test]
    fn test_should_order_numbers_numerically() {
        let nine = SortableAttributeValue::N("9".to_owned());
        let ten = SortableAttributeValue::N("10".to_owned());
        assert!(nine < ten);
        assert_eq!(SortableAttributeValue::N("1.0".to_owned()), SortableAttributeValue::N("1".to_owned()));
    }

    #[test]
    fn test_should_report_missing_table() {
        let store = LocalStore::default();
        store.create_table("users", KeySchema { partition_key: "id".to_owned(), sort_key: None });
        assert!(store.require_table("users").is_ok());
        let err = store.require_table("orders").expect_err("missing");
        assert_eq!(err.code, dynamap_model::DynamoDBErrorCode::ResourceNotFoundException);
        assert_eq!(store.table_names(), vec!["users".to_owned()]);
    }
}
