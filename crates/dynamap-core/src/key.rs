//! Primary and index keys.

use dynamap_model::{AttributeValue, Item};
use typed_builder::TypedBuilder;

use crate::error::{EnhancedError, EnhancedResult};
use crate::schema::{TableMetadata, TableSchema};

/// Partition value plus an optional sort value.
///
/// # Examples
///
/// ```
/// use dynamap_core::key::Key;
/// use dynamap_model::AttributeValue;
///
/// let key = Key::builder()
///     .partition_value(AttributeValue::from("c1"))
///     .sort_value(AttributeValue::from("o1"))
///     .build();
/// assert!(key.sort_value().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
pub struct Key {
    partition_value: AttributeValue,
    #[builder(default, setter(strip_option))]
    sort_value: Option<AttributeValue>,
}

impl Key {
    /// Partition value.
    #[must_use]
    pub fn partition_value(&self) -> &AttributeValue {
        &self.partition_value
    }

    /// Sort value, if any.
    #[must_use]
    pub fn sort_value(&self) -> Option<&AttributeValue> {
        self.sort_value.as_ref()
    }

    /// Render the wire key map for `index`.
    ///
    /// Fails if the index has a sort key and this key has no sort value, or
    /// the other way round.
    pub fn key_map(&self, metadata: &TableMetadata, index: &str) -> EnhancedResult<Item> {
        let layout = metadata.index(index)?;
        let mut map = Item::with_capacity(2);
        map.insert(layout.partition_key().to_owned(), self.partition_value.clone());
        match (layout.sort_key(), &self.sort_value) {
            (Some(attr), Some(value)) => {
                map.insert(attr.to_owned(), value.clone());
            }
            (Some(attr), None) => {
                return Err(EnhancedError::MissingKeyAttribute {
                    attribute: attr.to_owned(),
                    index: index.to_owned(),
                });
            }
            (None, Some(_)) => {
                return Err(EnhancedError::validation(format!(
                    "index '{index}' has no sort key but a sort value was given"
                )));
            }
            (None, None) => {}
        }
        Ok(map)
    }

    /// Extract the key of `index` from a wire item.
    pub fn from_item(item: &Item, metadata: &TableMetadata, index: &str) -> EnhancedResult<Self> {
        let layout = metadata.index(index)?;
        let lookup = |attr: &str| {
            item.get(attr)
                .filter(|v| !v.is_null())
                .cloned()
                .ok_or_else(|| EnhancedError::MissingKeyAttribute {
                    attribute: attr.to_owned(),
                    index: index.to_owned(),
                })
        };
        let partition_value = lookup(layout.partition_key())?;
        let sort_value = layout.sort_key().map(lookup).transpose()?;
        Ok(Self {
            partition_value,
            sort_value,
        })
    }
}

impl<T> TableSchema<T> {
    /// Derive the key of `index` from a record. Never returns a partial key.
    pub fn key_for(&self, record: &T, index: &str) -> EnhancedResult<Key> {
        let layout = self.table_metadata().index(index)?;
        let read = |attr: &str| -> EnhancedResult<AttributeValue> {
            self.attribute_value(record, attr)?
                .ok_or_else(|| EnhancedError::MissingKeyAttribute {
                    attribute: attr.to_owned(),
                    index: index.to_owned(),
                })
        };
        let partition_value = read(layout.partition_key())?;
        let sort_value = layout.sort_key().map(read).transpose()?;
        Ok(Key {
            partition_value,
            sort_value,
        })
    }
}
