//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between SDK `AttributeValue` maps and the
//! engine's [`Item`]. These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, PutRequest, WriteRequest as SdkWriteRequest};
use keyway_core::storage::{Result, StoreError, WriteRequest};
use keyway_core::value::{AttrValue, Item};

pub type SdkItem = HashMap<String, AttributeValue>;

pub fn to_attribute_value(value: &AttrValue) -> AttributeValue {
    match value {
        AttrValue::S(s) => AttributeValue::S(s.clone()),
        AttrValue::N(n) => AttributeValue::N(n.clone()),
        AttrValue::B(b) => AttributeValue::B(Blob::new(b.clone())),
        AttrValue::Null => AttributeValue::Null(true),
    }
}

/// Key-relevant scalar types only; documents, lists and sets are rejected.
pub fn from_attribute_value(name: &str, value: AttributeValue) -> Result<AttrValue> {
    match value {
        AttributeValue::S(s) => Ok(AttrValue::S(s)),
        AttributeValue::N(n) => Ok(AttrValue::N(n)),
        AttributeValue::B(b) => Ok(AttrValue::B(b.into_inner())),
        AttributeValue::Null(_) => Ok(AttrValue::Null),
        other => Err(StoreError::Decode(format!(
            "Unsupported attribute type for {}: {:?}",
            name, other
        ))),
    }
}

pub fn to_sdk_item(item: &Item) -> SdkItem {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute_value(value)))
        .collect()
}

pub fn from_sdk_item(item: SdkItem) -> Result<Item> {
    item.into_iter()
        .map(|(name, value)| {
            let value = from_attribute_value(&name, value)?;
            Ok((name, value))
        })
        .collect()
}

pub fn to_sdk_write(request: &WriteRequest) -> Result<SdkWriteRequest> {
    let built = match request {
        WriteRequest::Put(item) => SdkWriteRequest::builder().put_request(
            PutRequest::builder()
                .set_item(Some(to_sdk_item(item)))
                .build()
                .map_err(|e| StoreError::backend(format!("Invalid put request: {}", e)))?,
        ),
        WriteRequest::Delete(key) => SdkWriteRequest::builder().delete_request(
            DeleteRequest::builder()
                .set_key(Some(to_sdk_item(key)))
                .build()
                .map_err(|e| StoreError::backend(format!("Invalid delete request: {}", e)))?,
        ),
    };
    Ok(built.build())
}

pub fn from_sdk_write(request: SdkWriteRequest) -> Result<WriteRequest> {
    if let Some(put) = request.put_request {
        return Ok(WriteRequest::Put(from_sdk_item(put.item)?));
    }
    if let Some(delete) = request.delete_request {
        return Ok(WriteRequest::Delete(from_sdk_item(delete.key)?));
    }
    Err(StoreError::Decode(
        "Unprocessed write request carries neither a put nor a delete".to_string(),
    ))
}
