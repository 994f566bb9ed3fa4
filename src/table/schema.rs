use tracing::debug;

use crate::client::TableClient;
use crate::error::{Error, StoreError};
use crate::table::helpers::request;
use crate::table::types::{KeySchema, RequestOptions};

/// Resolve the key schema of `table` with a single `DescribeTable` call
///
/// Failures are surfaced as [`Error::SchemaUnavailable`] and never retried here.
pub async fn resolve<C>(client: &C, table: &str, options: &RequestOptions) -> Result<KeySchema, Error>
where
    C: TableClient,
{
    let elements = request::bounded(client.describe_key_schema(table), options)
        .await
        .map_err(|source| match source {
            StoreError::Cancelled => Error::Cancelled { deleted: 0 },
            source => Error::SchemaUnavailable {
                table: table.to_string(),
                source,
            },
        })?;

    let schema = KeySchema::from_elements(&elements).ok_or_else(|| Error::SchemaUnavailable {
        table: table.to_string(),
        source: StoreError::MissingKeySchema(table.to_string()),
    })?;

    debug!(
        table,
        partition_key = schema.partition_key(),
        sort_key = ?schema.sort_key(),
        "resolved key schema"
    );

    Ok(schema)
}
