//! DynamoDB error mapping.
//!
//! Maps AWS SDK errors to `StoreError` from `keyway_core::storage`. A missing
//! table or index becomes a `Schema` error; throttling and server faults are
//! marked retryable.

use std::fmt::Debug;

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::delete_item::DeleteItemError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use keyway_core::storage::{Result, StoreError, WriteOutcome};

fn table_not_found(table: &str) -> StoreError {
    StoreError::Schema(format!(
        "Table {} (or the requested index) does not exist",
        table
    ))
}

fn throughput_exceeded() -> StoreError {
    StoreError::retryable("Throughput exceeded, please retry")
}

fn request_limit_exceeded() -> StoreError {
    StoreError::retryable("Request limit exceeded, please retry")
}

fn internal_server_error() -> StoreError {
    StoreError::retryable("DynamoDB internal server error")
}

/// Map a GetItem SDK error to StoreError.
pub fn map_get_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<GetItemError, R>,
    table: &str,
) -> StoreError {
    match err.into_service_error() {
        GetItemError::ResourceNotFoundException(_) => table_not_found(table),
        GetItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        GetItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        GetItemError::InternalServerError(_) => internal_server_error(),
        err => StoreError::backend(format!("GetItem failed: {:?}", err)),
    }
}

/// Map a PutItem SDK error to a write outcome.
///
/// A failed condition is an expected result, not an error.
pub fn map_put_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<PutItemError, R>,
    table: &str,
) -> Result<WriteOutcome> {
    let err = match err.into_service_error() {
        PutItemError::ConditionalCheckFailedException(_) => {
            return Ok(WriteOutcome::ConditionFailed)
        }
        PutItemError::ResourceNotFoundException(_) => table_not_found(table),
        PutItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        PutItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        PutItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::backend("Item collection size limit exceeded")
        }
        PutItemError::TransactionConflictException(_) => {
            StoreError::retryable("Transaction conflict, please retry")
        }
        PutItemError::InternalServerError(_) => internal_server_error(),
        err => StoreError::backend(format!("PutItem failed: {:?}", err)),
    };
    Err(err)
}

/// Map a DeleteItem SDK error to StoreError.
pub fn map_delete_item_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<DeleteItemError, R>,
    table: &str,
) -> StoreError {
    match err.into_service_error() {
        DeleteItemError::ResourceNotFoundException(_) => table_not_found(table),
        DeleteItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        DeleteItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        DeleteItemError::TransactionConflictException(_) => {
            StoreError::retryable("Transaction conflict, please retry")
        }
        DeleteItemError::InternalServerError(_) => internal_server_error(),
        err => StoreError::backend(format!("DeleteItem failed: {:?}", err)),
    }
}

/// Map a Query SDK error to StoreError.
pub fn map_query_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<QueryError, R>,
    table: &str,
) -> StoreError {
    match err.into_service_error() {
        QueryError::ResourceNotFoundException(_) => table_not_found(table),
        QueryError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        QueryError::RequestLimitExceeded(_) => request_limit_exceeded(),
        QueryError::InternalServerError(_) => internal_server_error(),
        err => StoreError::backend(format!("Query failed: {:?}", err)),
    }
}

/// Map a Scan SDK error to StoreError.
pub fn map_scan_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<ScanError, R>,
    table: &str,
) -> StoreError {
    match err.into_service_error() {
        ScanError::ResourceNotFoundException(_) => table_not_found(table),
        ScanError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        ScanError::RequestLimitExceeded(_) => request_limit_exceeded(),
        ScanError::InternalServerError(_) => internal_server_error(),
        err => StoreError::backend(format!("Scan failed: {:?}", err)),
    }
}

/// Map a BatchWriteItem SDK error to StoreError.
pub fn map_batch_write_error<R: Debug + Send + Sync + 'static>(
    err: SdkError<BatchWriteItemError, R>,
    table: &str,
) -> StoreError {
    match err.into_service_error() {
        BatchWriteItemError::ResourceNotFoundException(_) => table_not_found(table),
        BatchWriteItemError::ProvisionedThroughputExceededException(_) => throughput_exceeded(),
        BatchWriteItemError::RequestLimitExceeded(_) => request_limit_exceeded(),
        BatchWriteItemError::ItemCollectionSizeLimitExceededException(_) => {
            StoreError::backend("Item collection size limit exceeded")
        }
        BatchWriteItemError::InternalServerError(_) => internal_server_error(),
        err => StoreError::backend(format!("BatchWriteItem failed: {:?}", err)),
    }
}
