//! Schema descriptors: how a record type maps to a wire item.
//!
//! A [`TableSchema`] is declared once with [`Attribute`] entries (a wire name,
//! a getter and a setter per field) and built against a converter registry.
//! Every converter is resolved at build time. The built schema is immutable
//! and can be shared between tasks behind an `Arc`.
//!
//! # Examples
//!
//! ```
//! use dynamap_core::schema::{Attribute, TableSchema};
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Customer {
//!     id: String,
//!     name: Option<String>,
//! }
//!
//! let schema = TableSchema::<Customer>::builder()
//!     .attribute(
//!         Attribute::new("id", |c: &Customer| Some(c.id.clone()), |c, v| c.id = v.unwrap_or_default())
//!             .partition_key(),
//!     )
//!     .attribute(Attribute::new("name", |c: &Customer| c.name.clone(), |c, v| c.name = v))
//!     .build()
//!     .unwrap();
//!
//! let record = Customer { id: "c1".into(), name: None };
//! let item = schema.item_from(&record, true).unwrap();
//! assert_eq!(item.len(), 1);
//! assert_eq!(schema.record_from(&item).unwrap(), record);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use dynamap_model::{AttributeValue, Item};

use crate::converter::{
    AttributeConverter, AttributeValueType, ConverterProvider, DefaultConverterProvider,
};
use crate::error::{ConversionError, EnhancedError, EnhancedResult, SchemaError};

/// Name of the table's primary index.
pub const PRIMARY_INDEX: &str = "$PRIMARY_INDEX";

/// A key or versioning role an attribute plays.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    /// Partition key of the table.
    PrimaryPartitionKey,
    /// Sort key of the table.
    PrimarySortKey,
    /// Partition key of the named secondary index.
    SecondaryPartitionKey(String),
    /// Sort key of the named secondary index.
    SecondarySortKey(String),
    /// Optimistic-locking version counter.
    Version,
}

/// How an update writes an attribute that may already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpdateBehavior {
    /// Always overwrite.
    #[default]
    WriteAlways,
    /// Only write when the stored item lacks the attribute.
    WriteIfNotExists,
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

type Getter<T, V> = Box<dyn Fn(&T) -> Option<V> + Send + Sync>;
type Setter<T, V> = Box<dyn Fn(&mut T, Option<V>) + Send + Sync>;
type Reader<T> = Box<dyn Fn(&T) -> Result<Option<AttributeValue>, ConversionError> + Send + Sync>;
type Writer<T> =
    Box<dyn Fn(&mut T, Option<&AttributeValue>) -> Result<(), ConversionError> + Send + Sync>;

/// Declaration of one mapped field of record type `T` with logical type `V`.
///
/// The getter returns `None` for an absent value; the setter receives `None`
/// when the stored item holds the null marker.
pub struct Attribute<T, V> {
    name: String,
    getter: Getter<T, V>,
    setter: Setter<T, V>,
    roles: Vec<Role>,
    update_behavior: UpdateBehavior,
    converter: Option<Arc<dyn AttributeConverter<V>>>,
}

impl<T, V> fmt::Debug for Attribute<T, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &std::any::type_name::<V>())
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

impl<T: 'static, V: 'static> Attribute<T, V> {
    /// Declare an attribute by wire name, getter and setter.
    pub fn new(
        name: impl Into<String>,
        getter: impl Fn(&T) -> Option<V> + Send + Sync + 'static,
        setter: impl Fn(&mut T, Option<V>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            getter: Box::new(getter),
            setter: Box::new(setter),
            roles: Vec::new(),
            update_behavior: UpdateBehavior::default(),
            converter: None,
        }
    }

    /// Add a role.
    #[must_use]
    pub fn role(mut self, role: Role) -> Self {
        self.roles.push(role);
        self
    }

    /// Mark as the table's partition key.
    #[must_use]
    pub fn partition_key(self) -> Self {
        self.role(Role::PrimaryPartitionKey)
    }

    /// Mark as the table's sort key.
    #[must_use]
    pub fn sort_key(self) -> Self {
        self.role(Role::PrimarySortKey)
    }

    /// Mark as the partition key of a secondary index.
    #[must_use]
    pub fn secondary_partition_key(self, index: impl Into<String>) -> Self {
        self.role(Role::SecondaryPartitionKey(index.into()))
    }

    /// Mark as the sort key of a secondary index.
    #[must_use]
    pub fn secondary_sort_key(self, index: impl Into<String>) -> Self {
        self.role(Role::SecondarySortKey(index.into()))
    }

    /// Mark as the optimistic-locking version attribute.
    #[must_use]
    pub fn version(self) -> Self {
        self.role(Role::Version)
    }

    /// Set the update behavior.
    #[must_use]
    pub fn update_behavior(mut self, behavior: UpdateBehavior) -> Self {
        self.update_behavior = behavior;
        self
    }

    /// Use a specific converter instead of the registry's.
    #[must_use]
    pub fn converter(mut self, converter: impl AttributeConverter<V> + 'static) -> Self {
        self.converter = Some(Arc::new(converter));
        self
    }
}

/// An attribute declaration whose logical type has been erased.
trait UnboundAttribute<T> {
    fn bind(self: Box<Self>, provider: &dyn ConverterProvider) -> Result<AttributeDescriptor<T>, SchemaError>;
}

impl<T: 'static, V: 'static> UnboundAttribute<T> for Attribute<T, V> {
    fn bind(self: Box<Self>, provider: &dyn ConverterProvider) -> Result<AttributeDescriptor<T>, SchemaError> {
        let Self {
            name,
            getter,
            setter,
            roles,
            update_behavior,
            converter,
        } = *self;
        let converter = converter
            .or_else(|| provider.converter_for::<V>())
            .ok_or_else(|| SchemaError::UnsupportedType {
                attribute: name.clone(),
                type_name: std::any::type_name::<V>(),
            })?;

        let value_type = converter.attribute_value_type();
        let to_wire = Arc::clone(&converter);
        let read: Reader<T> = Box::new(move |record| {
            getter(record)
                .map(|v| to_wire.transform_from(&v))
                .transpose()
        });
        let write: Writer<T> = Box::new(move |record, wire| {
            let value = wire.map(|av| converter.transform_to(av)).transpose()?;
            setter(record, value);
            Ok(())
        });

        Ok(AttributeDescriptor {
            name,
            type_name: std::any::type_name::<V>(),
            value_type,
            roles,
            update_behavior,
            read,
            write,
        })
    }
}

/// A bound attribute: wire name, roles and a type-erased getter/setter pair
/// that already applies the resolved converter.
pub struct AttributeDescriptor<T> {
    name: String,
    type_name: &'static str,
    value_type: AttributeValueType,
    roles: Vec<Role>,
    update_behavior: UpdateBehavior,
    read: Reader<T>,
    write: Writer<T>,
}

impl<T> fmt::Debug for AttributeDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeDescriptor")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("value_type", &self.value_type)
            .field("roles", &self.roles)
            .field("update_behavior", &self.update_behavior)
            .finish_non_exhaustive()
    }
}

impl<T> AttributeDescriptor<T> {
    /// Wire name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rust type name of the logical value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Wire type produced by the converter.
    #[must_use]
    pub fn value_type(&self) -> AttributeValueType {
        self.value_type
    }

    /// Roles of this attribute.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Update behavior of this attribute.
    #[must_use]
    pub fn update_behavior(&self) -> UpdateBehavior {
        self.update_behavior
    }

    /// Read and convert the field. The null marker counts as absent.
    pub fn read(&self, record: &T) -> Result<Option<AttributeValue>, ConversionError> {
        let value = (self.read)(record).map_err(|e| e.for_attribute(&self.name))?;
        Ok(value.filter(|v| !v.is_null()))
    }

    /// Convert and store a wire value. `None` stores an absent value.
    pub fn write(&self, record: &mut T, value: Option<&AttributeValue>) -> Result<(), ConversionError> {
        (self.write)(record, value).map_err(|e| e.for_attribute(&self.name))
    }
}

// ---------------------------------------------------------------------------
// Table metadata
// ---------------------------------------------------------------------------

/// Key attributes of one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMetadata {
    name: String,
    partition_key: String,
    sort_key: Option<String>,
}

impl IndexMetadata {
    /// Index name ([`PRIMARY_INDEX`] for the table itself).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partition key attribute.
    #[must_use]
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Sort key attribute, if the index has one.
    #[must_use]
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Partition and sort key attributes.
    #[must_use]
    pub fn key_attributes(&self) -> Vec<&str> {
        std::iter::once(self.partition_key.as_str())
            .chain(self.sort_key.as_deref())
            .collect()
    }
}

/// Key layout and tagged attributes of a table, derived from its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMetadata {
    primary: IndexMetadata,
    secondary: BTreeMap<String, IndexMetadata>,
    version_attribute: Option<String>,
}

impl TableMetadata {
    /// Name used for the primary index.
    #[must_use]
    pub fn primary_index_name() -> &'static str {
        PRIMARY_INDEX
    }

    /// Partition key attribute of the table.
    #[must_use]
    pub fn primary_partition_key(&self) -> &str {
        &self.primary.partition_key
    }

    /// Sort key attribute of the table.
    #[must_use]
    pub fn primary_sort_key(&self) -> Option<&str> {
        self.primary.sort_key.as_deref()
    }

    /// Key layout of the named index.
    pub fn index(&self, name: &str) -> EnhancedResult<&IndexMetadata> {
        if name == PRIMARY_INDEX {
            return Ok(&self.primary);
        }
        self.secondary
            .get(name)
            .ok_or_else(|| EnhancedError::validation(format!("index '{name}' is not defined by the schema")))
    }

    /// Names of the secondary indexes.
    #[must_use]
    pub fn index_names(&self) -> Vec<&str> {
        self.secondary.keys().map(String::as_str).collect()
    }

    /// Primary key attributes (partition first).
    #[must_use]
    pub fn key_attributes(&self) -> Vec<&str> {
        self.primary.key_attributes()
    }

    /// Key attributes of every index, without duplicates.
    #[must_use]
    pub fn all_key_attributes(&self) -> Vec<&str> {
        let mut out = self.primary.key_attributes();
        for index in self.secondary.values() {
            for attr in index.key_attributes() {
                if !out.contains(&attr) {
                    out.push(attr);
                }
            }
        }
        out
    }

    /// Returns `true` if the attribute is part of the primary key.
    #[must_use]
    pub fn is_primary_key_attribute(&self, name: &str) -> bool {
        self.primary.partition_key == name || self.primary.sort_key.as_deref() == Some(name)
    }

    /// The optimistic-locking version attribute, if any.
    #[must_use]
    pub fn version_attribute(&self) -> Option<&str> {
        self.version_attribute.as_deref()
    }
}

#[derive(Default)]
struct IndexDraft {
    partition_key: Option<String>,
    sort_key: Option<String>,
}

impl IndexDraft {
    fn assign(slot: &mut Option<String>, index: &str, role: &'static str, attribute: &str) -> Result<(), SchemaError> {
        if let Some(existing) = slot {
            return Err(SchemaError::DuplicateKeyRole {
                index: index.to_owned(),
                role,
                existing: existing.clone(),
                attribute: attribute.to_owned(),
            });
        }
        *slot = Some(attribute.to_owned());
        Ok(())
    }
}

fn derive_metadata<T>(attributes: &[AttributeDescriptor<T>]) -> Result<TableMetadata, SchemaError> {
    let mut primary = IndexDraft::default();
    let mut secondary: BTreeMap<String, IndexDraft> = BTreeMap::new();
    let mut version_attribute: Option<String> = None;

    for attr in attributes {
        for role in &attr.roles {
            match role {
                Role::PrimaryPartitionKey => {
                    IndexDraft::assign(&mut primary.partition_key, PRIMARY_INDEX, "partition key", &attr.name)?;
                }
                Role::PrimarySortKey => {
                    IndexDraft::assign(&mut primary.sort_key, PRIMARY_INDEX, "sort key", &attr.name)?;
                }
                Role::SecondaryPartitionKey(index) => {
                    let draft = secondary.entry(index.clone()).or_default();
                    IndexDraft::assign(&mut draft.partition_key, index, "partition key", &attr.name)?;
                }
                Role::SecondarySortKey(index) => {
                    let draft = secondary.entry(index.clone()).or_default();
                    IndexDraft::assign(&mut draft.sort_key, index, "sort key", &attr.name)?;
                }
                Role::Version => {
                    if let Some(existing) = &version_attribute {
                        return Err(SchemaError::DuplicateVersionAttribute {
                            existing: existing.clone(),
                            attribute: attr.name.clone(),
                        });
                    }
                    version_attribute = Some(attr.name.clone());
                }
            }
        }
    }

    let partition_key = primary.partition_key.ok_or(SchemaError::MissingPartitionKey)?;
    let secondary = secondary
        .into_iter()
        .map(|(name, draft)| {
            // A sort key alone describes a local index sharing the table's partition key.
            let index = IndexMetadata {
                name: name.clone(),
                partition_key: draft.partition_key.unwrap_or_else(|| partition_key.clone()),
                sort_key: draft.sort_key,
            };
            (name, index)
        })
        .collect();

    Ok(TableMetadata {
        primary: IndexMetadata {
            name: PRIMARY_INDEX.to_owned(),
            partition_key,
            sort_key: primary.sort_key,
        },
        secondary,
        version_attribute,
    })
}

// ---------------------------------------------------------------------------
// Table schema
// ---------------------------------------------------------------------------

/// Builder for [`TableSchema`].
pub struct TableSchemaBuilder<T> {
    attributes: Vec<Box<dyn UnboundAttribute<T>>>,
    provider: Option<Arc<dyn ConverterProvider>>,
}

impl<T> fmt::Debug for TableSchemaBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSchemaBuilder")
            .field("attributes", &self.attributes.len())
            .field("provider", &self.provider)
            .finish()
    }
}

impl<T: 'static> TableSchemaBuilder<T> {
    /// Add an attribute declaration.
    #[must_use]
    pub fn attribute<V: 'static>(mut self, attribute: Attribute<T, V>) -> Self {
        self.attributes.push(Box::new(attribute));
        self
    }

    /// Resolve converters from `provider` instead of the default registry.
    #[must_use]
    pub fn converter_provider(mut self, provider: Arc<dyn ConverterProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Resolve every converter and validate the key layout.
    pub fn build(self) -> Result<TableSchema<T>, SchemaError> {
        let provider = self
            .provider
            .unwrap_or_else(|| Arc::new(DefaultConverterProvider::new()));

        let mut attributes = Vec::with_capacity(self.attributes.len());
        let mut positions = HashMap::new();
        for unbound in self.attributes {
            let descriptor = unbound.bind(provider.as_ref())?;
            if positions.insert(descriptor.name.clone(), attributes.len()).is_some() {
                return Err(SchemaError::DuplicateAttribute(descriptor.name));
            }
            attributes.push(descriptor);
        }
        let metadata = derive_metadata(&attributes)?;

        tracing::debug!(
            attributes = attributes.len(),
            partition_key = %metadata.primary_partition_key(),
            "built table schema for {}",
            std::any::type_name::<T>()
        );

        Ok(TableSchema {
            attributes,
            positions,
            metadata,
        })
    }
}

/// Immutable mapping between record type `T` and wire items.
pub struct TableSchema<T> {
    attributes: Vec<AttributeDescriptor<T>>,
    positions: HashMap<String, usize>,
    metadata: TableMetadata,
}

impl<T> fmt::Debug for TableSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableSchema")
            .field("record", &std::any::type_name::<T>())
            .field("attributes", &self.attributes)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl<T: 'static> TableSchema<T> {
    /// Start declaring a schema.
    #[must_use]
    pub fn builder() -> TableSchemaBuilder<T> {
        TableSchemaBuilder {
            attributes: Vec::new(),
            provider: None,
        }
    }
}

impl<T> TableSchema<T> {
    /// Convert a record into a wire item.
    ///
    /// Absent values are omitted when `ignore_nulls` is `true` and emitted as
    /// null markers otherwise.
    pub fn item_from(&self, record: &T, ignore_nulls: bool) -> Result<Item, ConversionError> {
        let mut item = Item::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            match attr.read(record)? {
                Some(value) => {
                    item.insert(attr.name.clone(), value);
                }
                None if !ignore_nulls => {
                    item.insert(attr.name.clone(), AttributeValue::null());
                }
                None => {}
            }
        }
        Ok(item)
    }

    /// Convert a wire item into a record. Unmapped attributes are ignored and
    /// missing attributes keep the record's default.
    pub fn record_from(&self, item: &Item) -> Result<T, ConversionError>
    where
        T: Default,
    {
        let mut record = T::default();
        for attr in &self.attributes {
            match item.get(&attr.name) {
                None => {}
                Some(value) if value.is_null() => attr.write(&mut record, None)?,
                Some(value) => attr.write(&mut record, Some(value))?,
            }
        }
        Ok(record)
    }

    /// Read and convert one attribute of a record.
    pub fn attribute_value(&self, record: &T, name: &str) -> EnhancedResult<Option<AttributeValue>> {
        let attr = self
            .descriptor(name)
            .ok_or_else(|| SchemaError::UnknownAttribute(name.to_owned()))?;
        Ok(attr.read(record)?)
    }

    /// Descriptor of the named attribute.
    #[must_use]
    pub fn descriptor(&self, name: &str) -> Option<&AttributeDescriptor<T>> {
        self.positions.get(name).map(|&i| &self.attributes[i])
    }

    /// Wire type of the named attribute.
    #[must_use]
    pub fn converter_type(&self, name: &str) -> Option<AttributeValueType> {
        self.descriptor(name).map(AttributeDescriptor::value_type)
    }

    /// Wire names in declaration order.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.iter().map(|a| a.name.as_str()).collect()
    }

    /// Attributes whose update behavior is not the default.
    #[must_use]
    pub fn update_behaviors(&self) -> HashMap<String, UpdateBehavior> {
        self.attributes
            .iter()
            .filter(|a| a.update_behavior != UpdateBehavior::WriteAlways)
            .map(|a| (a.name.clone(), a.update_behavior))
            .collect()
    }

    /// Key layout and tagged attributes.
    #[must_use]
    pub fn table_metadata(&self) -> &TableMetadata {
        &self.metadata
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;

    use super::*;

    #[derive(Debug, Default, Clone, PartialEq)]
    pub(crate) struct Order {
        pub(crate) customer: String,
        pub(crate) order_id: Option<String>,
        pub(crate) total: Option<i64>,
        pub(crate) note: Option<String>,
        pub(crate) tags: Option<HashSet<String>>,
        pub(crate) status: Option<String>,
        pub(crate) created_by: Option<String>,
        pub(crate) version: Option<i64>,
    }

    pub(crate) fn order_schema() -> TableSchema<Order> {
        TableSchema::<Order>::builder()
            .attribute(
                Attribute::new("customer", |o: &Order| Some(o.customer.clone()), |o, v| {
                    o.customer = v.unwrap_or_default();
                })
                .partition_key(),
            )
            .attribute(
                Attribute::new("order_id", |o: &Order| o.order_id.clone(), |o, v| o.order_id = v)
                    .sort_key(),
            )
            .attribute(Attribute::new("total", |o: &Order| o.total, |o, v| o.total = v))
            .attribute(Attribute::new("note", |o: &Order| o.note.clone(), |o, v| o.note = v))
            .attribute(Attribute::new("tags", |o: &Order| o.tags.clone(), |o, v| o.tags = v))
            .attribute(
                Attribute::new("status", |o: &Order| o.status.clone(), |o, v| o.status = v)
                    .secondary_partition_key("by_status")
                    .secondary_sort_key("by_customer_status"),
            )
            .attribute(
                Attribute::new("created_by", |o: &Order| o.created_by.clone(), |o, v| o.created_by = v)
                    .update_behavior(UpdateBehavior::WriteIfNotExists),
            )
            .attribute(Attribute::new("version", |o: &Order| o.version, |o, v| o.version = v).version())
            .build()
            .expect("valid schema")
    }

    pub(crate) fn sample_order() -> Order {
        Order {
            customer: "c1".to_owned(),
            order_id: Some("o1".to_owned()),
            total: Some(250),
            note: None,
            tags: Some(["rush".to_owned()].into_iter().collect()),
            status: Some("OPEN".to_owned()),
            created_by: Some("alice".to_owned()),
            version: None,
        }
    }

    #[test]
    fn test_should_round_trip_record() {
        let schema = order_schema();
        let order = sample_order();
        let item = schema.item_from(&order, true).expect("item");
        assert_eq!(item.get("total"), Some(&AttributeValue::N("250".to_owned())));
        assert!(!item.contains_key("note"));
        assert_eq!(schema.record_from(&item).expect("record"), order);
    }

    #[test]
    fn test_should_emit_null_markers_when_preserving_nulls() {
        let schema = order_schema();
        let item = schema.item_from(&sample_order(), false).expect("item");
        assert_eq!(item.get("note"), Some(&AttributeValue::null()));
        assert_eq!(item.get("version"), Some(&AttributeValue::null()));
    }

    #[test]
    fn test_should_ignore_unmapped_and_nulls_on_read() {
        let schema = order_schema();
        let mut item = schema.item_from(&sample_order(), true).expect("item");
        item.insert("legacy".to_owned(), AttributeValue::Bool(true));
        item.insert("status".to_owned(), AttributeValue::null());
        let order = schema.record_from(&item).expect("record");
        assert_eq!(order.status, None);
        assert_eq!(order.customer, "c1");
    }

    #[test]
    fn test_should_report_failing_attribute_on_read() {
        let schema = order_schema();
        let mut item = Item::new();
        item.insert("customer".to_owned(), AttributeValue::S("c".to_owned()));
        item.insert("total".to_owned(), AttributeValue::S("lots".to_owned()));
        let err = schema.record_from(&item).expect_err("bad total");
        assert!(err.to_string().contains("'total'"));
    }

    #[test]
    fn test_should_derive_table_metadata() {
        let schema = order_schema();
        let meta = schema.table_metadata();
        assert_eq!(meta.primary_partition_key(), "customer");
        assert_eq!(meta.primary_sort_key(), Some("order_id"));
        assert_eq!(meta.version_attribute(), Some("version"));
        assert_eq!(meta.index_names(), vec!["by_customer_status", "by_status"]);
        let by_status = meta.index("by_status").expect("index");
        assert_eq!(by_status.partition_key(), "status");
        assert_eq!(by_status.sort_key(), None);
        let local = meta.index("by_customer_status").expect("index");
        assert_eq!(local.partition_key(), "customer");
        assert_eq!(local.sort_key(), Some("status"));
        assert!(meta.index("nope").is_err());
        assert_eq!(meta.all_key_attributes(), vec!["customer", "order_id", "status"]);
        assert_eq!(
            schema.update_behaviors().get("created_by"),
            Some(&UpdateBehavior::WriteIfNotExists)
        );
        assert_eq!(schema.converter_type("tags"), Some(AttributeValueType::Ss));
    }

    #[test]
    fn test_should_reject_duplicate_attribute() {
        let err = TableSchema::<Order>::builder()
            .attribute(Attribute::new("id", |o: &Order| Some(o.customer.clone()), |_, _| {}).partition_key())
            .attribute(Attribute::new("id", |o: &Order| o.note.clone(), |_, _| {}))
            .build()
            .expect_err("duplicate");
        assert_eq!(err, SchemaError::DuplicateAttribute("id".to_owned()));
    }

    #[test]
    fn test_should_reject_two_partition_keys() {
        let err = TableSchema::<Order>::builder()
            .attribute(Attribute::new("a", |o: &Order| Some(o.customer.clone()), |_, _| {}).partition_key())
            .attribute(Attribute::new("b", |o: &Order| o.note.clone(), |_, _| {}).partition_key())
            .build()
            .expect_err("two partition keys");
        assert!(matches!(err, SchemaError::DuplicateKeyRole { role: "partition key", .. }));
    }

    #[test]
    fn test_should_reject_two_versions_and_missing_partition_key() {
        let err = TableSchema::<Order>::builder()
            .attribute(Attribute::new("a", |o: &Order| Some(o.customer.clone()), |_, _| {}).partition_key())
            .attribute(Attribute::new("v1", |o: &Order| o.version, |_, _| {}).version())
            .attribute(Attribute::new("v2", |o: &Order| o.total, |_, _| {}).version())
            .build()
            .expect_err("two versions");
        assert!(matches!(err, SchemaError::DuplicateVersionAttribute { .. }));

        let err = TableSchema::<Order>::builder()
            .attribute(Attribute::new("a", |o: &Order| o.note.clone(), |_, _| {}))
            .build()
            .expect_err("no partition key");
        assert_eq!(err, SchemaError::MissingPartitionKey);
    }

    #[test]
    fn test_should_reject_unsupported_type_at_build() {
        #[derive(Debug, Clone)]
        struct Opaque;
        let err = TableSchema::<Order>::builder()
            .attribute(Attribute::new("a", |o: &Order| Some(o.customer.clone()), |_, _| {}).partition_key())
            .attribute(Attribute::new("blob", |_: &Order| Some(Opaque), |_, _: Option<Opaque>| {}))
            .build()
            .expect_err("unsupported");
        assert!(matches!(err, SchemaError::UnsupportedType { ref attribute, .. } if attribute == "blob"));
    }
}
