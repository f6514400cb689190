//! In-memory DynamoDB-compatible store for dynamap.
//!
//! [`LocalClient`] implements [`dynamap_core::WireClient`] over tables held in
//! memory. It parses and evaluates condition, update and projection
//! expressions, applies writes atomically and reports transaction
//! cancellations per sub-request. Tables are registered directly with
//! [`LocalClient::create_table`].
#![allow(clippy::doc_markdown)]

pub mod client;
pub mod config;
pub mod error;
pub mod expression;
pub mod storage;

pub use client::LocalClient;
pub use config::LocalConfig;
