//! Wire-level model types for dynamap.
//!
//! Items, expression placeholder maps, request/response shapes and the wire
//! error type exchanged with a DynamoDB-compatible store. The shapes follow the
//! `awsJson1_0` protocol so serde derives produce the exact wire JSON.
// "DynamoDB" appears in virtually every doc comment in this crate.
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]
#![allow(missing_docs)]

pub mod attribute_value;
pub mod error;
pub mod input;
pub mod operations;
pub mod output;
pub mod types;

pub use attribute_value::{AttributeValue, AttributeValueError, Item};
pub use error::{DynamoDBError, DynamoDBErrorCode};
pub use operations::DynamoDBOperation;
