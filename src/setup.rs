use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::operation::create_table::{CreateTableError, CreateTableOutput};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, KeySchemaElement, KeyType, ProvisionedThroughput, ScalarAttributeType,
};

use crate::error::StoreError;
use crate::table::KeySchema;

/// Create a string-keyed table laid out by `schema`
///
/// An already existing table is not an error. Intended for tests against
/// LocalStack or DynamoDB Local.
pub async fn create_table(
    client: &DynamoDbClient,
    table: &str,
    schema: &KeySchema,
) -> Result<CreateTableOutput, StoreError> {
    let mut builder = client
        .create_table()
        .table_name(table)
        .provisioned_throughput(
            ProvisionedThroughput::builder()
                .read_capacity_units(10)
                .write_capacity_units(10)
                .build()?,
        );

    let key_types = [KeyType::Hash, KeyType::Range];
    for (name, key_type) in schema.attribute_names().zip(key_types) {
        builder = builder
            .key_schema(
                KeySchemaElement::builder()
                    .attribute_name(name)
                    .key_type(key_type)
                    .build()?,
            )
            .attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(name)
                    .attribute_type(ScalarAttributeType::S)
                    .build()?,
            );
    }

    match builder.send().await {
        Ok(output) => Ok(output),
        Err(e) => {
            if let Some(CreateTableError::ResourceInUseException(_)) = e.as_service_error() {
                // Table already exists
                return Ok(CreateTableOutput::builder().build());
            }
            Err(e.into())
        }
    }
}
