use futures_util::{StreamExt, stream};
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::client::TableClient;
use crate::error::{Error, StoreError};
use crate::table::helpers::{batch_processor, request};
use crate::table::types::{BatchId, BatchOutcome, DeleteBatch, ItemKey, RequestOptions, RetryConfig};

/// Group a key stream into delete batches of `cap` keys
///
/// Keys keep their arrival order and are neither deduplicated nor reordered.
/// Every batch holds exactly `cap` keys except possibly the last one. `cap` is
/// clamped to `1..=MAX_BATCH_SIZE`.
///
/// An error from `keys` is forwarded as soon as it arrives and ends the stream;
/// keys gathered for the unfinished batch are dropped with it.
pub fn chunk<S>(keys: S, cap: usize) -> impl Stream<Item = Result<DeleteBatch, StoreError>> + Send
where
    S: Stream<Item = Result<ItemKey, StoreError>> + Send,
{
    let cap = batch_processor::batch_size(cap);

    stream::unfold(
        (Box::pin(keys), 0usize, false),
        move |(mut keys, next_id, exhausted)| async move {
            if exhausted {
                return None;
            }

            let mut group = Vec::with_capacity(cap);
            while group.len() < cap {
                match keys.next().await {
                    Some(Ok(key)) => group.push(key),
                    Some(Err(e)) => return Some((Err(e), (keys, next_id, true))),
                    None => break,
                }
            }

            if group.is_empty() {
                return None;
            }

            // A short group means the source ended
            let exhausted = group.len() < cap;
            let batch = DeleteBatch {
                id: BatchId(next_id),
                keys: group,
            };

            Some((Ok(batch), (keys, next_id + 1, exhausted)))
        },
    )
}

/// Submits delete batches and drains the unprocessed items the store hands back
#[derive(Debug)]
pub struct BatchDeleter<'a, C> {
    client: &'a C,
    retry: RetryConfig,
    options: RequestOptions,
}

impl<'a, C> BatchDeleter<'a, C>
where
    C: TableClient,
{
    /// Create a deleter issuing requests through `client`
    pub fn new(client: &'a C, retry: RetryConfig, options: RequestOptions) -> Self {
        Self {
            client,
            retry,
            options,
        }
    }

    /// Delete every key of `batch`
    ///
    /// The batch is submitted as one `BatchWriteItem` request. Keys returned as
    /// unprocessed are resubmitted on their own after an exponential backoff
    /// (see [`RetryConfig`]), up to `max_retries` times.
    ///
    /// # Errors
    ///
    /// * [`Error::BatchRequestFailed`] - a submission failed outright; not retried
    /// * [`Error::BatchDrainIncomplete`] - keys were still unprocessed when the
    ///   retry budget ran out
    /// * [`Error::Cancelled`] - the cancellation token fired during a request or
    ///   a backoff wait
    ///
    /// `deleted` in each error counts the keys of this batch confirmed deleted.
    pub async fn execute(&self, table: &str, batch: DeleteBatch) -> Result<BatchOutcome, Error> {
        let DeleteBatch { id, keys } = batch;
        let total = keys.len();
        let mut pending = keys;
        let mut attempts = 0;

        while !pending.is_empty() {
            let deleted = total.saturating_sub(pending.len());

            if attempts > 0 {
                let delay = self.retry.delay(attempts - 1);
                warn!(
                    table,
                    batch = %id,
                    unprocessed = pending.len(),
                    retry = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "store left items unprocessed, retrying"
                );

                if request::backoff(delay, &self.options.cancel).await.is_err() {
                    return Err(Error::Cancelled { deleted });
                }
            }

            attempts += 1;

            let submitted = self.client.batch_delete(table, pending.clone());
            pending = match request::bounded(submitted, &self.options).await {
                Ok(unprocessed) => unprocessed,
                Err(StoreError::Cancelled) => return Err(Error::Cancelled { deleted }),
                Err(source) => {
                    return Err(Error::BatchRequestFailed {
                        batch: id,
                        deleted,
                        undeleted: pending,
                        source,
                    });
                }
            };

            if !pending.is_empty() && attempts > self.retry.max_retries {
                warn!(
                    table,
                    batch = %id,
                    unprocessed = pending.len(),
                    attempts,
                    "retry budget exhausted"
                );

                return Err(Error::BatchDrainIncomplete {
                    batch: id,
                    deleted: total.saturating_sub(pending.len()),
                    undeleted: pending,
                });
            }
        }

        debug!(table, batch = %id, deleted = total, attempts, "batch drained");

        Ok(BatchOutcome {
            id,
            deleted: total,
            attempts,
        })
    }
}
