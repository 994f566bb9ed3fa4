/// Retry configuration for batch operations
pub(crate) mod retry_config {
    use std::time::Duration;

    /// Calculate retry delay with exponential backoff
    ///
    /// # Arguments
    /// * `attempt` - The retry attempt number (0-based)
    /// * `initial` - Initial delay duration
    /// * `max` - Maximum delay duration
    ///
    /// # Returns
    /// Duration to wait before retrying
    pub(crate) fn retry_delay(attempt: usize, initial: Duration, max: Duration) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(u32::MAX as usize) as u32);
        let delay_ms = (initial.as_millis() as u64).saturating_mul(factor);
        let capped_delay = delay_ms.min(max.as_millis() as u64);
        Duration::from_millis(capped_delay)
    }
}

/// Batch processing limits
pub(crate) mod batch_processor {
    /// Standard batch size for DynamoDB write operations
    pub(crate) const BATCH_WRITE_SIZE: usize = 25;

    /// Clamp a requested batch size into the range DynamoDB accepts
    pub(crate) fn batch_size(requested: usize) -> usize {
        requested.clamp(1, BATCH_WRITE_SIZE)
    }
}

/// Timeout and cancellation for store calls
pub(crate) mod request {
    use std::future::Future;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::error::StoreError;
    use crate::table::types::RequestOptions;

    /// Run a store call bounded by the request timeout and the cancellation token
    ///
    /// Cancellation is checked first, so an already-cancelled token never issues
    /// the call.
    pub(crate) async fn bounded<T, F>(call: F, options: &RequestOptions) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::select! {
            biased;
            _ = options.cancel.cancelled() => Err(StoreError::Cancelled),
            result = tokio::time::timeout(options.timeout, call) => match result {
                Ok(result) => result,
                Err(_) => Err(StoreError::Timeout(options.timeout)),
            },
        }
    }

    /// Sleep for `delay` unless cancelled first
    pub(crate) async fn backoff(
        delay: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), StoreError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
