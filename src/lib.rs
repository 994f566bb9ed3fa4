//! # DynamoDB Table Purge
//!
//! Deletes every item of a DynamoDB table without deleting the table itself:
//! - Key schema discovery via `DescribeTable`
//! - Paginated full-table scans projected down to the key attributes
//! - Batched deletes of up to 25 keys per `BatchWriteItem` request
//! - Automatic retry of unprocessed items with exponential backoff
//! - Bounded concurrency, request timeouts and cooperative cancellation
//!
//! ## Features
//!
//! - **Injected client**: the engine only talks to a [`TableClient`], so tests can
//!   substitute an in-memory store for `aws_sdk_dynamodb::Client`
//! - **Typed partial failure**: unprocessed keys are tracked exactly, never
//!   reduced to a success flag
//! - **Progress on failure**: every terminal [`Error`] reports how many items were
//!   deleted before the run stopped
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dynamo_purge::{ConnectOptions, Error, PurgeConfig, Purger, connect};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let client = connect(&ConnectOptions {
//!         profile: Some("dev".to_string()),
//!         region: Some("eu-west-1".to_string()),
//!         endpoint_url: None,
//!     })
//!     .await;
//!
//!     let purger = Purger::with_config(
//!         client,
//!         PurgeConfig {
//!             concurrency: 4,
//!             ..PurgeConfig::default()
//!         },
//!     );
//!
//!     let result = purger.purge("sessions").await?;
//!     println!("deleted {} items in {} batches", result.deleted, result.batches);
//!
//!     Ok(())
//! }
//! ```
#![deny(
    warnings,
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    deprecated,
    unknown_lints,
    unreachable_code,
    unused_mut
)]

mod error;
pub use error::{Error, StoreError};

/// Table client capability set and its DynamoDB binding
pub mod client;

/// Deletion engine: schema resolution, scanning, batching and orchestration
pub mod table;

/// Table setup utilities for testing
pub mod setup;

// Re-export main types for convenience
pub use client::TableClient;
pub use table::{
    BatchDeleter, BatchId, DeleteBatch, ItemKey, KeySchema, PurgeConfig, Purger, RetryConfig,
    RunResult,
};

// Re-export aws-config types for configuration
pub use aws_config::{BehaviorVersion, Region, SdkConfig};

use aws_sdk_dynamodb::Client as DynamoDbClient;

/// Endpoint used when the profile is `localstack`
pub const LOCALSTACK_ENDPOINT: &str = "http://127.0.0.1:4566";

/// Where and as whom to connect to DynamoDB
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    /// Shared config profile used for credentials
    pub profile: Option<String>,
    /// AWS region; falls back to the default provider chain
    pub region: Option<String>,
    /// Endpoint override, e.g. DynamoDB Local
    pub endpoint_url: Option<String>,
}

impl ConnectOptions {
    fn is_localstack(&self) -> bool {
        self.profile.as_deref() == Some("localstack")
            || std::env::var("AWS_PROFILE").unwrap_or_default() == "localstack"
    }

    fn endpoint(&self) -> Option<&str> {
        match (&self.endpoint_url, self.is_localstack()) {
            (Some(url), _) => Some(url),
            (None, true) => Some(LOCALSTACK_ENDPOINT),
            (None, false) => None,
        }
    }
}

/// Load AWS configuration with sensible defaults
///
/// It configures:
/// - Adaptive retry mode with 3 max attempts
/// - Exponential backoff starting at 1 second
/// - Connect timeout: 3 seconds
/// - Read timeout: 20 seconds
/// - Operation timeout: 60 seconds
/// - LocalStack support via the `localstack` profile
pub async fn aws_config_defaults(options: &ConnectOptions) -> SdkConfig {
    use aws_types::sdk_config::{RetryConfig as SdkRetryConfig, TimeoutConfig};
    use std::time::Duration;

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(3))
        .read_timeout(Duration::from_secs(20))
        .operation_timeout(Duration::from_secs(60))
        .build();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .retry_config(
            SdkRetryConfig::adaptive()
                .with_max_attempts(3)
                .with_initial_backoff(Duration::from_secs(1)),
        )
        .timeout_config(timeout_config);

    if let Some(profile) = &options.profile {
        loader = loader.profile_name(profile);
    }

    if let Some(region) = &options.region {
        loader = loader.region(Region::new(region.clone()));
    }

    if let Some(endpoint) = options.endpoint() {
        loader = loader.endpoint_url(endpoint);
    }

    loader.load().await
}

/// Build a DynamoDB client from [`aws_config_defaults`]
///
/// The client is handed to a [`Purger`]; nothing is kept globally.
pub async fn connect(options: &ConnectOptions) -> DynamoDbClient {
    let config = aws_config_defaults(options).await;
    DynamoDbClient::new(&config)
}
