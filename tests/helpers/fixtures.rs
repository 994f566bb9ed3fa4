/// In-memory table store used in place of DynamoDB
///
/// Behaves like a single DynamoDB table: items ordered by key, projected scans
/// paged by `LastEvaluatedKey`, and batched deletes that can be scripted to leave
/// keys unprocessed or to fail outright. Every call is recorded for assertions.
use aws_sdk_dynamodb::types::{AttributeValue, KeySchemaElement, KeyType};
use dynamo_purge::table::{Projection, ScanPage};
use dynamo_purge::{ItemKey, KeySchema, StoreError, TableClient};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A full stored item, key and non-key attributes
pub type Item = HashMap<String, AttributeValue>;

/// How the store answers one `batch_delete` call
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub enum DeleteReply {
    /// Delete every key
    Accept,
    /// Delete all but the last `n` keys and hand those back as unprocessed
    Unprocess(usize),
    /// Leave every key unprocessed
    UnprocessAll,
    /// Fail the request with a hard error
    Fail(&'static str),
}

#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    schema: KeySchema,
    key_elements: Vec<KeySchemaElement>,
    max_page: usize,
    ignore_projection: bool,
    describe_error: Option<&'static str>,
    scan_error_on_page: Option<usize>,
    scan_latency: Duration,
    empty_pages: AtomicUsize,
    latency: Duration,
    default_reply: DeleteReply,
    replies: Mutex<VecDeque<DeleteReply>>,
    items: Mutex<BTreeMap<String, Item>>,
    scan_calls: AtomicUsize,
    projections: Mutex<Vec<Vec<String>>>,
    batch_sizes: Mutex<Vec<usize>>,
    deleted_keys: Mutex<Vec<ItemKey>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryTable {
    /// Empty table named `name` keyed by `schema`, returning at most 1000 items per page
    pub fn new(name: &str, schema: KeySchema) -> Self {
        let key_types = [KeyType::Hash, KeyType::Range];
        let key_elements = schema
            .attribute_names()
            .zip(key_types)
            .map(|(attribute, key_type)| key_element(attribute, key_type))
            .collect();

        Self {
            name: name.to_string(),
            schema,
            key_elements,
            max_page: 1000,
            ignore_projection: false,
            describe_error: None,
            scan_error_on_page: None,
            scan_latency: Duration::ZERO,
            empty_pages: AtomicUsize::new(0),
            latency: Duration::ZERO,
            default_reply: DeleteReply::Accept,
            replies: Mutex::new(VecDeque::new()),
            items: Mutex::new(BTreeMap::new()),
            scan_calls: AtomicUsize::new(0),
            projections: Mutex::new(Vec::new()),
            batch_sizes: Mutex::new(Vec::new()),
            deleted_keys: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Store-imposed page size cap
    pub fn with_max_page(mut self, max_page: usize) -> Self {
        self.max_page = max_page;
        self
    }

    /// Return whole items from scans, as a store ignoring projections would
    pub fn ignoring_projection(mut self) -> Self {
        self.ignore_projection = true;
        self
    }

    /// Replace the key elements reported by `describe_key_schema`
    pub fn with_key_elements(mut self, key_elements: Vec<KeySchemaElement>) -> Self {
        self.key_elements = key_elements;
        self
    }

    /// Fail `describe_key_schema` with `message`
    pub fn failing_describe(mut self, message: &'static str) -> Self {
        self.describe_error = Some(message);
        self
    }

    /// Fail the `page`-th scan request (1-based)
    pub fn failing_scan_on_page(mut self, page: usize) -> Self {
        self.scan_error_on_page = Some(page);
        self
    }

    /// Delay every `scan_page` call
    pub fn with_scan_latency(mut self, latency: Duration) -> Self {
        self.scan_latency = latency;
        self
    }

    /// Answer the first `count` scans with no items but a continuation token
    pub fn with_empty_pages(self, count: usize) -> Self {
        self.empty_pages.store(count, Ordering::SeqCst);
        self
    }

    /// Delay every `batch_delete` call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answers for the next `batch_delete` calls, in order
    pub fn with_replies(self, replies: impl IntoIterator<Item = DeleteReply>) -> Self {
        self.replies.lock().unwrap().extend(replies);
        self
    }

    /// Answer used once the scripted replies run out
    pub fn otherwise(mut self, reply: DeleteReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Insert `count` items with key and payload attributes
    pub fn with_items(self, count: usize) -> Self {
        for index in 0..count {
            self.put(sample_item(&self.schema, index));
        }
        self
    }

    /// Insert or replace an item
    pub fn put(&self, item: Item) {
        let id = self.id_of(&item);
        self.items.lock().unwrap().insert(id, item);
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    /// Attribute names requested by each scan call
    pub fn projections(&self) -> Vec<Vec<String>> {
        self.projections.lock().unwrap().clone()
    }

    /// Number of keys submitted by each `batch_delete` call, retries included
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().unwrap().clone()
    }

    /// Keys deleted so far, in deletion order
    pub fn deleted_keys(&self) -> Vec<ItemKey> {
        self.deleted_keys.lock().unwrap().clone()
    }

    /// Highest number of concurrent `batch_delete` calls observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn id_of(&self, item: &Item) -> String {
        self.schema
            .attribute_names()
            .map(|name| match item.get(name) {
                Some(AttributeValue::S(value)) => value.clone(),
                Some(AttributeValue::N(value)) => value.clone(),
                Some(other) => format!("{other:?}"),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }

    fn check_table(&self, table: &str) -> Result<(), StoreError> {
        if table == self.name {
            Ok(())
        } else {
            Err(StoreError::Other(format!(
                "ResourceNotFoundException: table {table} not found"
            )))
        }
    }

    fn remove(&self, keys: &[ItemKey]) {
        let mut items = self.items.lock().unwrap();
        let mut deleted = self.deleted_keys.lock().unwrap();
        for key in keys {
            if items.remove(&self.id_of(key)).is_some() {
                deleted.push(key.clone());
            }
        }
    }
}

impl TableClient for MemoryTable {
    async fn describe_key_schema(&self, table: &str) -> Result<Vec<KeySchemaElement>, StoreError> {
        self.check_table(table)?;
        match self.describe_error {
            Some(message) => Err(StoreError::Other(message.to_string())),
            None => Ok(self.key_elements.clone()),
        }
    }

    async fn scan_page(
        &self,
        table: &str,
        projection: &Projection,
        exclusive_start_key: Option<ItemKey>,
        limit: Option<i32>,
    ) -> Result<ScanPage, StoreError> {
        self.check_table(table)?;

        let page = self.scan_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let attributes: Vec<String> = projection
            .attributes()
            .into_iter()
            .map(String::from)
            .collect();
        self.projections.lock().unwrap().push(attributes.clone());

        if !self.scan_latency.is_zero() {
            tokio::time::sleep(self.scan_latency).await;
        }

        let empty = self
            .empty_pages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if empty {
            // Empty strings sort before every stored key
            let resume = exclusive_start_key.unwrap_or_else(|| {
                self.schema
                    .attribute_names()
                    .map(|name| (name.to_string(), AttributeValue::S(String::new())))
                    .collect()
            });
            return Ok(ScanPage {
                items: Vec::new(),
                last_evaluated_key: Some(resume),
            });
        }

        if self.scan_error_on_page == Some(page) {
            return Err(StoreError::Other(
                "ProvisionedThroughputExceededException".to_string(),
            ));
        }

        let page_limit = limit
            .map(|limit| limit as usize)
            .unwrap_or(usize::MAX)
            .min(self.max_page);
        let start = exclusive_start_key.as_ref().map(|key| self.id_of(key));

        let items = self.items.lock().unwrap();
        let mut remaining: Vec<&Item> = items
            .iter()
            .filter(|(id, _)| start.as_ref().is_none_or(|start| *id > start))
            .map(|(_, item)| item)
            .take(page_limit.saturating_add(1))
            .collect();

        let more = remaining.len() > page_limit;
        remaining.truncate(page_limit);

        let last_evaluated_key = if more {
            remaining.last().map(|item| self.schema.retain_key((*item).clone()))
        } else {
            None
        };

        let page_items = remaining
            .into_iter()
            .map(|item| {
                if self.ignore_projection {
                    item.clone()
                } else {
                    item.iter()
                        .filter(|(name, _)| attributes.contains(*name))
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect()
                }
            })
            .collect();

        Ok(ScanPage {
            items: page_items,
            last_evaluated_key,
        })
    }

    async fn batch_delete(&self, table: &str, keys: Vec<ItemKey>) -> Result<Vec<ItemKey>, StoreError> {
        self.check_table(table)?;

        if keys.is_empty() || keys.len() > 25 {
            return Err(StoreError::Other(format!(
                "ValidationException: {} write requests",
                keys.len()
            )));
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.batch_sizes.lock().unwrap().push(keys.len());
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.clone());

        let result = match reply {
            DeleteReply::Accept => {
                self.remove(&keys);
                Ok(Vec::new())
            }
            DeleteReply::Unprocess(count) => {
                let split = keys.len().saturating_sub(count);
                self.remove(&keys[..split]);
                Ok(keys[split..].to_vec())
            }
            DeleteReply::UnprocessAll => Ok(keys),
            DeleteReply::Fail(message) => Err(StoreError::Other(message.to_string())),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Key schema element as DynamoDB describes it
pub fn key_element(attribute: &str, key_type: KeyType) -> KeySchemaElement {
    KeySchemaElement::builder()
        .attribute_name(attribute)
        .key_type(key_type)
        .build()
        .unwrap()
}

/// Item number `index` for `schema`, with two non-key attributes
pub fn sample_item(schema: &KeySchema, index: usize) -> Item {
    let mut item = Item::new();
    item.insert(
        schema.partition_key().to_string(),
        AttributeValue::S(format!("user{index:05}")),
    );
    if let Some(sort_key) = schema.sort_key() {
        item.insert(
            sort_key.to_string(),
            AttributeValue::S(format!("order{:03}", index % 7)),
        );
    }
    item.insert("payload".to_string(), AttributeValue::S("x".repeat(64)));
    item.insert("count".to_string(), AttributeValue::N(index.to_string()));
    item
}
