//! Typed attribute mapping and expression composition for DynamoDB-style
//! stores.
//!
//! A [`TableSchema`] maps a record type to wire items. An
//! [`EnhancedClient`] binds schemas to tables and turns record-level calls
//! (get, put, update, delete, batch and transactional variants) into wire
//! requests. Each request is composed from the record itself, the configured
//! [`Extension`]s and any caller-supplied expressions. Composition never sends
//! anything when two contributors disagree.
//!
//! The crate does not talk to a network. Requests are dispatched through the
//! [`WireClient`] trait; `dynamap-local` provides an in-memory implementation.
#![allow(clippy::doc_markdown)]

pub mod client;
pub mod config;
pub mod converter;
pub mod error;
pub mod expression;
pub mod extension;
pub mod key;
pub mod operation;
pub mod schema;
pub mod table;

pub use client::{WireClient, WireFuture};
pub use config::EnhancedConfig;
pub use error::{EnhancedError, EnhancedResult};
pub use expression::{Expression, UpdateExpression};
pub use extension::Extension;
pub use key::Key;
pub use schema::{Attribute, PRIMARY_INDEX, TableSchema};
pub use table::{EnhancedClient, MappedTable};
