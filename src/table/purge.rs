use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::future::Future;
use std::pin::{Pin, pin};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::client::TableClient;
use crate::error::Error;
use crate::table::batch::{BatchDeleter, chunk};
use crate::table::scan::scan;
use crate::table::schema::resolve;
use crate::table::types::{BatchOutcome, PurgeConfig, RequestOptions, RunResult};

type BatchFuture<'f> = Pin<Box<dyn Future<Output = Result<BatchOutcome, Error>> + Send + 'f>>;

/// Deletes every item of a table through an injected [`TableClient`]
///
/// # Example
///
/// ```rust,no_run
/// use dynamo_purge::{ConnectOptions, Error, Purger, connect};
///
/// async fn example() -> Result<(), Error> {
///     let client = connect(&ConnectOptions {
///         profile: Some("dev".to_string()),
///         region: Some("eu-west-1".to_string()),
///         endpoint_url: None,
///     })
///     .await;
///
///     let result = Purger::new(client).purge("sessions").await?;
///     println!("deleted {} items", result.deleted);
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Purger<C> {
    client: C,
    config: PurgeConfig,
}

impl<C> Purger<C>
where
    C: TableClient,
{
    /// Create a purger with the default [`PurgeConfig`]
    pub fn new(client: C) -> Self {
        Self::with_config(client, PurgeConfig::default())
    }

    /// Create a purger with a custom configuration
    pub fn with_config(client: C, config: PurgeConfig) -> Self {
        Self { client, config }
    }

    /// The injected table client
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The run configuration
    pub fn config(&self) -> &PurgeConfig {
        &self.config
    }

    /// Delete every item currently stored in `table`
    pub async fn purge(&self, table: &str) -> Result<RunResult, Error> {
        self.purge_with_cancel(table, CancellationToken::new()).await
    }

    /// Delete every item of `table`, stopping promptly once `cancel` fires
    ///
    /// Resolves the key schema, scans keys page by page, groups them into
    /// batches and drains up to `concurrency` batches at a time. The first
    /// failure stops the scan, cancels batches still in flight and is returned
    /// with the number of items deleted so far. Completed deletions are not
    /// rolled back.
    ///
    /// The table must not be written to during the run; items added mid-scan
    /// may survive it.
    #[instrument(skip_all, fields(table = %table))]
    pub async fn purge_with_cancel(
        &self,
        table: &str,
        cancel: CancellationToken,
    ) -> Result<RunResult, Error> {
        let started = Instant::now();
        let config = &self.config;

        let schema = resolve(
            &self.client,
            table,
            &RequestOptions {
                timeout: config.request_timeout,
                cancel: cancel.clone(),
            },
        )
        .await?;

        // Cancelled on the first failure, stopping the scan and all in-flight batches
        let run = RequestOptions {
            timeout: config.request_timeout,
            cancel: cancel.child_token(),
        };

        let keys = scan(&self.client, table, &schema, config.page_size, run.clone());
        let mut batches = pin!(chunk(keys, config.batch_size));
        let deleter = BatchDeleter::new(&self.client, config.retry.clone(), run.clone());

        let concurrency = config.concurrency.max(1);
        let mut in_flight: FuturesUnordered<BatchFuture<'_>> = FuturesUnordered::new();
        let mut result = RunResult::default();
        let mut source_done = false;
        let mut failure: Option<Error> = None;

        loop {
            let pulling = failure.is_none() && !source_done && in_flight.len() < concurrency;

            tokio::select! {
                next = batches.next(), if pulling => match next {
                    Some(Ok(batch)) => {
                        debug!(batch = %batch.id, size = batch.len(), "submitting batch");
                        in_flight.push(Box::pin(deleter.execute(table, batch)));
                    }
                    Some(Err(source)) => {
                        run.cancel.cancel();
                        failure = Some(Error::from_scan(source));
                    }
                    None => source_done = true,
                },
                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => match outcome {
                    Ok(outcome) => result.record(&outcome),
                    Err(err) => {
                        result.deleted += err.deleted();
                        if failure.is_none() {
                            run.cancel.cancel();
                            failure = Some(err);
                        } else {
                            debug!(error = %err, "batch stopped after run failure");
                        }
                    }
                },
                else => break,
            }
        }

        result.total_duration = started.elapsed();

        match failure {
            Some(err) => {
                let err = err.with_deleted(result.deleted);
                warn!(
                    deleted = result.deleted,
                    batch = ?err.batch(),
                    error = %err,
                    "purge stopped"
                );
                Err(err)
            }
            None => {
                info!(
                    deleted = result.deleted,
                    batches = result.batches,
                    retries = result.retry_count,
                    duration_ms = result.total_duration.as_millis() as u64,
                    "purge complete"
                );
                Ok(result)
            }
        }
    }
}
