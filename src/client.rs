use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::types::{DeleteRequest, KeySchemaElement, WriteRequest};
use std::future::Future;
use std::sync::Arc;

use crate::error::StoreError;
use crate::table::{ItemKey, Projection, ScanPage};

/// Capabilities a purge needs from a table store
///
/// Implemented for [`aws_sdk_dynamodb::Client`]; tests substitute an in-memory
/// store. Implementations report failures without retrying them, except for
/// whatever retry policy the transport itself applies.
///
/// # Example
///
/// ```rust,no_run
/// use dynamo_purge::client::TableClient;
///
/// async fn example(client: aws_sdk_dynamodb::Client) -> Result<(), dynamo_purge::StoreError> {
///     let elements = client.describe_key_schema("users").await?;
///     println!("{} key attributes", elements.len());
///     Ok(())
/// }
/// ```
pub trait TableClient: Send + Sync {
    /// Key schema elements of the table, as returned by `DescribeTable`
    fn describe_key_schema(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Vec<KeySchemaElement>, StoreError>> + Send;

    /// Fetch one scan page restricted to `projection`
    ///
    /// `exclusive_start_key` is the `last_evaluated_key` of the previous page, or
    /// `None` for the first page.
    fn scan_page(
        &self,
        table: &str,
        projection: &Projection,
        exclusive_start_key: Option<ItemKey>,
        limit: Option<i32>,
    ) -> impl Future<Output = Result<ScanPage, StoreError>> + Send;

    /// Delete `keys` in one batched request and return the keys the store did not process
    fn batch_delete(
        &self,
        table: &str,
        keys: Vec<ItemKey>,
    ) -> impl Future<Output = Result<Vec<ItemKey>, StoreError>> + Send;
}

impl TableClient for DynamoDbClient {
    async fn describe_key_schema(&self, table: &str) -> Result<Vec<KeySchemaElement>, StoreError> {
        let output = self.describe_table().table_name(table).send().await?;

        Ok(output
            .table
            .and_then(|description| description.key_schema)
            .unwrap_or_default())
    }

    async fn scan_page(
        &self,
        table: &str,
        projection: &Projection,
        exclusive_start_key: Option<ItemKey>,
        limit: Option<i32>,
    ) -> Result<ScanPage, StoreError> {
        let output = self
            .scan()
            .table_name(table)
            .projection_expression(&projection.expression)
            .set_expression_attribute_names(Some(projection.names.clone()))
            .set_exclusive_start_key(exclusive_start_key)
            .set_limit(limit)
            .send()
            .await?;

        Ok(ScanPage {
            items: output.items.unwrap_or_default(),
            // An empty map would restart the scan from the beginning
            last_evaluated_key: output.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }

    async fn batch_delete(&self, table: &str, keys: Vec<ItemKey>) -> Result<Vec<ItemKey>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut write_ops: Vec<WriteRequest> = Vec::with_capacity(keys.len());

        for key in keys {
            let delete_request = DeleteRequest::builder().set_key(Some(key)).build()?;

            write_ops.push(
                WriteRequest::builder()
                    .set_delete_request(Some(delete_request))
                    .build(),
            );
        }

        let output = self
            .batch_write_item()
            .request_items(table, write_ops)
            .send()
            .await?;

        let unprocessed = output
            .unprocessed_items
            .and_then(|mut tables| tables.remove(table))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|request| request.delete_request)
            .map(|request| request.key)
            .collect();

        Ok(unprocessed)
    }
}

impl<T: TableClient> TableClient for Arc<T> {
    fn describe_key_schema(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Vec<KeySchemaElement>, StoreError>> + Send {
        (**self).describe_key_schema(table)
    }

    fn scan_page(
        &self,
        table: &str,
        projection: &Projection,
        exclusive_start_key: Option<ItemKey>,
        limit: Option<i32>,
    ) -> impl Future<Output = Result<ScanPage, StoreError>> + Send {
        (**self).scan_page(table, projection, exclusive_start_key, limit)
    }

    fn batch_delete(
        &self,
        table: &str,
        keys: Vec<ItemKey>,
    ) -> impl Future<Output = Result<Vec<ItemKey>, StoreError>> + Send {
        (**self).batch_delete(table, keys)
    }
}
