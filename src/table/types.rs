use aws_sdk_dynamodb::types::{AttributeValue, KeySchemaElement, KeyType};
use std::{collections::HashMap, fmt, time::Duration};
use tokio_util::sync::CancellationToken;

use crate::table::helpers::{batch_processor, retry_config};

/// Maximum number of write requests DynamoDB accepts in one `BatchWriteItem` call
pub const MAX_BATCH_SIZE: usize = batch_processor::BATCH_WRITE_SIZE;

/// Key attributes of a single stored item, by attribute name
pub type ItemKey = HashMap<String, AttributeValue>;

/// Ordered key attribute names of a table: partition key, then optional sort key
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySchema {
    partition_key: String,
    sort_key: Option<String>,
}

impl KeySchema {
    /// Build a key schema from attribute names
    pub fn new(partition_key: impl Into<String>, sort_key: Option<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key,
        }
    }

    /// Extract the key schema from a table description's key elements.
    ///
    /// The HASH element becomes the partition key regardless of where it appears
    /// in the response. Returns `None` when no HASH element is present.
    pub fn from_elements(elements: &[KeySchemaElement]) -> Option<Self> {
        let attribute = |key_type: KeyType| {
            elements
                .iter()
                .find(|element| *element.key_type() == key_type)
                .map(|element| element.attribute_name().to_string())
        };

        let partition_key = attribute(KeyType::Hash)?;
        Some(Self::new(partition_key, attribute(KeyType::Range)))
    }

    /// Partition key attribute name
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Sort key attribute name, if the table has one
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Key attribute names in schema order
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.as_str()).chain(self.sort_key.as_deref())
    }

    /// Check whether `name` is one of the key attributes
    pub fn contains(&self, name: &str) -> bool {
        self.attribute_names().any(|key| key == name)
    }

    /// Projection expression that requests only the key attributes.
    ///
    /// Names are always aliased (`#k0`, `#k1`) so reserved words such as `name`
    /// or `user` can be projected.
    pub fn projection(&self) -> Projection {
        let mut names = HashMap::new();
        let placeholders: Vec<String> = self
            .attribute_names()
            .enumerate()
            .map(|(index, name)| {
                let placeholder = format!("#k{index}");
                let _ = names.insert(placeholder.clone(), name.to_string());
                placeholder
            })
            .collect();

        Projection {
            expression: placeholders.join(", "),
            names,
        }
    }

    /// Drop every attribute that is not part of the key
    pub fn retain_key(&self, mut item: ItemKey) -> ItemKey {
        item.retain(|name, _| self.contains(name));
        item
    }
}

/// A projection expression together with its attribute name aliases
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    /// Comma separated placeholders, e.g. `#k0, #k1`
    pub expression: String,
    /// Placeholder to attribute name
    pub names: HashMap<String, String>,
}

impl Projection {
    /// Attribute names the projection requests, in expression order
    pub fn attributes(&self) -> Vec<&str> {
        self.expression
            .split(',')
            .filter_map(|placeholder| self.names.get(placeholder.trim()))
            .map(String::as_str)
            .collect()
    }
}

/// One page of a key-projected scan
#[derive(Clone, Debug, Default)]
pub struct ScanPage {
    /// Items returned in this page
    pub items: Vec<ItemKey>,
    /// Continuation token; `None` when the table is exhausted
    pub last_evaluated_key: Option<ItemKey>,
}

/// Sequence number of a delete batch within one run, in emission order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId(pub usize);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Keys submitted together in one batched delete request
#[derive(Clone, Debug, PartialEq)]
pub struct DeleteBatch {
    /// Position of the batch in the run
    pub id: BatchId,
    /// Keys to delete, at most [`MAX_BATCH_SIZE`]
    pub keys: Vec<ItemKey>,
}

impl DeleteBatch {
    /// Number of keys in the batch
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if the batch holds no keys
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Retry configuration for unprocessed batch items
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of resubmissions after the first attempt
    pub max_retries: usize,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (0-based)
    pub fn delay(&self, attempt: usize) -> Duration {
        retry_config::retry_delay(attempt, self.initial_delay, self.max_delay)
    }
}

impl Default for RetryConfig {
    /// 5 retries with exponential backoff: 100ms, 200ms, 400ms, 800ms, 1600ms
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// Timeout and cancellation applied to every store call
#[derive(Clone, Debug)]
pub struct RequestOptions {
    /// Upper bound for a single store call
    pub timeout: Duration,
    /// Aborts pending calls and backoff waits when cancelled
    pub cancel: CancellationToken,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cancel: CancellationToken::new(),
        }
    }
}

/// Tuning for a purge run
#[derive(Clone, Debug)]
pub struct PurgeConfig {
    /// Keys per delete batch, clamped to `1..=MAX_BATCH_SIZE`
    pub batch_size: usize,
    /// Scan page limit; `None` lets the store decide
    pub page_size: Option<i32>,
    /// Maximum number of batches in flight
    pub concurrency: usize,
    /// Backoff policy for unprocessed items
    pub retry: RetryConfig,
    /// Upper bound for a single store call
    pub request_timeout: Duration,
}

impl Default for PurgeConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            page_size: None,
            concurrency: 1,
            retry: RetryConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of draining a single batch
#[must_use = "batch outcomes carry the deleted count"]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Batch that was drained
    pub id: BatchId,
    /// Keys deleted
    pub deleted: usize,
    /// Submissions made, including the first
    pub attempts: usize,
}

/// Summary of a successful purge run
#[must_use = "run results carry the deleted count"]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunResult {
    /// Items deleted
    pub deleted: usize,
    /// Batches drained
    pub batches: usize,
    /// Resubmissions of unprocessed items across all batches
    pub retry_count: usize,
    /// Total execution time
    pub total_duration: Duration,
}

impl RunResult {
    pub(crate) fn record(&mut self, outcome: &BatchOutcome) {
        self.deleted += outcome.deleted;
        self.batches += 1;
        self.retry_count += outcome.attempts.saturating_sub(1);
    }
}
