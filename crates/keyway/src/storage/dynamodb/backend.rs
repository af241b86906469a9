//! DynamoDB backend implementation.
//!
//! Implements the `Backend` trait from `keyway_core::storage` using DynamoDB.

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;

use keyway_core::query::{ReadRequest, Rendered};
use keyway_core::storage::{Backend, Condition, Page, Result, WriteOutcome, WriteRequest};
use keyway_core::value::Item;

use super::client::create_client;
use super::conversions::{
    from_sdk_item, from_sdk_write, to_attribute_value, to_sdk_item, to_sdk_write, SdkItem,
};
use super::error::{
    map_batch_write_error, map_delete_item_error, map_get_item_error, map_put_item_error,
    map_query_error, map_scan_error,
};
use crate::config::AwsConfig;

/// DynamoDB-based backend.
#[derive(Debug, Clone)]
pub struct DynamoDbBackend {
    client: Client,
}

impl DynamoDbBackend {
    /// Creates a new backend with the given DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a new backend from `AWS_ENDPOINT_URL` / `AWS_REGION`.
    pub async fn from_env() -> Self {
        Self::connect(&AwsConfig::from_env()).await
    }

    pub async fn connect(config: &AwsConfig) -> Self {
        Self::new(create_client(config).await)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn page_limit(limit: Option<usize>) -> Option<i32> {
    limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX))
}

fn attribute_values(rendered: &Rendered) -> SdkItem {
    rendered
        .values
        .iter()
        .map(|(placeholder, value)| (placeholder.clone(), to_attribute_value(value)))
        .collect()
}

fn into_page(items: Option<Vec<SdkItem>>, last_evaluated_key: Option<SdkItem>) -> Result<Page> {
    Ok(Page {
        items: items
            .unwrap_or_default()
            .into_iter()
            .map(from_sdk_item)
            .collect::<Result<Vec<_>>>()?,
        last_evaluated_key: last_evaluated_key.map(from_sdk_item).transpose()?,
    })
}

#[async_trait]
impl Backend for DynamoDbBackend {
    async fn put_item(
        &self,
        table: &str,
        item: Item,
        condition: Option<Condition>,
    ) -> Result<WriteOutcome> {
        let mut request = self
            .client
            .put_item()
            .table_name(table)
            .set_item(Some(to_sdk_item(&item)));

        if let Some(Condition::AttributeNotExists(name)) = condition {
            request = request
                .condition_expression("attribute_not_exists(#c)")
                .expression_attribute_names("#c", name);
        }

        match request.send().await {
            Ok(_) => Ok(WriteOutcome::Written),
            Err(e) => map_put_item_error(e, table),
        }
    }

    async fn get_item(&self, table: &str, key: &Item, consistent: bool) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_sdk_item(key)))
            .consistent_read(consistent)
            .send()
            .await
            .map_err(|e| map_get_item_error(e, table))?;

        result.item.map(from_sdk_item).transpose()
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<()> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_sdk_item(key)))
            .send()
            .await
            .map_err(|e| map_delete_item_error(e, table))?;

        Ok(())
    }

    async fn query(&self, request: &ReadRequest) -> Result<Page> {
        let rendered = request.render();
        let values = attribute_values(&rendered);

        let result = self
            .client
            .query()
            .table_name(&request.table)
            .set_index_name(request.index.clone())
            .set_key_condition_expression(rendered.key_condition)
            .set_filter_expression(rendered.filter)
            .set_expression_attribute_names(Some(rendered.names))
            .set_expression_attribute_values(Some(values))
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(to_sdk_item))
            .set_limit(page_limit(request.limit))
            .scan_index_forward(request.scan_forward)
            .consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(|e| map_query_error(e, &request.table))?;

        tracing::debug!(
            table = %request.table,
            index = ?request.index,
            count = result.count,
            scanned = result.scanned_count,
            "Query page"
        );
        into_page(result.items, result.last_evaluated_key)
    }

    async fn scan(&self, request: &ReadRequest) -> Result<Page> {
        let mut scan = self
            .client
            .scan()
            .table_name(&request.table)
            .set_index_name(request.index.clone())
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(to_sdk_item))
            .set_limit(page_limit(request.limit))
            .consistent_read(request.consistent_read);

        // DynamoDB rejects empty placeholder maps.
        let rendered = request.render();
        if rendered.filter.is_some() {
            let values = attribute_values(&rendered);
            scan = scan
                .set_filter_expression(rendered.filter)
                .set_expression_attribute_names(Some(rendered.names))
                .set_expression_attribute_values(Some(values));
        }

        let result = scan
            .send()
            .await
            .map_err(|e| map_scan_error(e, &request.table))?;

        tracing::debug!(
            table = %request.table,
            index = ?request.index,
            count = result.count,
            "Scan page"
        );
        into_page(result.items, result.last_evaluated_key)
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>> {
        let writes = requests
            .iter()
            .map(to_sdk_write)
            .collect::<Result<Vec<_>>>()?;

        let result = self
            .client
            .batch_write_item()
            .request_items(table, writes)
            .send()
            .await
            .map_err(|e| map_batch_write_error(e, table))?;

        result
            .unprocessed_items
            .and_then(|mut unprocessed| unprocessed.remove(table))
            .unwrap_or_default()
            .into_iter()
            .map(from_sdk_write)
            .collect()
    }
}
