use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::batch_write_item::BatchWriteItemError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::scan::ScanError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::table::{BatchId, ItemKey};

type DynamoDescribeTableError = SdkError<DescribeTableError, Response>;
type DynamoScanError = SdkError<ScanError, Response>;
type DynamoBatchWriteItemError = SdkError<BatchWriteItemError, Response>;
type DynamoCreateTableError = SdkError<CreateTableError, Response>;

/// Failure reported by a table client for a single store call
#[derive(Debug)]
pub enum StoreError {
    /// DynamoDB request builder error
    BuildError(BuildError),
    /// DynamoDB DescribeTable operation error
    DynamoDescribeTableError(DynamoDescribeTableError),
    /// DynamoDB Scan operation error
    DynamoScanError(DynamoScanError),
    /// DynamoDB BatchWriteItem operation error
    DynamoBatchWriteItemError(DynamoBatchWriteItemError),
    /// DynamoDB CreateTable operation error
    DynamoCreateTableError(DynamoCreateTableError),
    /// The table description did not name a partition key
    MissingKeySchema(String),
    /// The call did not finish within the request timeout
    Timeout(Duration),
    /// The caller cancelled the call
    Cancelled,
    /// Any other client failure, used by non-SDK table clients
    Other(String),
}

macro_rules! impl_from_error {
    ($name:ident) => {
        impl From<$name> for StoreError {
            fn from(e: $name) -> Self {
                StoreError::$name(e)
            }
        }
    };
}

impl_from_error!(BuildError);
impl_from_error!(DynamoDescribeTableError);
impl_from_error!(DynamoScanError);
impl_from_error!(DynamoBatchWriteItemError);
impl_from_error!(DynamoCreateTableError);

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
            StoreError::DynamoDescribeTableError(e) => {
                write!(f, "DynamoDB DescribeTable operation failed: {}", e)
            }
            StoreError::DynamoScanError(e) => write!(f, "DynamoDB Scan operation failed: {}", e),
            StoreError::DynamoBatchWriteItemError(e) => {
                write!(f, "DynamoDB BatchWriteItem operation failed: {}", e)
            }
            StoreError::DynamoCreateTableError(e) => {
                write!(f, "DynamoDB CreateTable operation failed: {}", e)
            }
            StoreError::MissingKeySchema(table) => {
                write!(f, "table '{}' has no partition key in its description", table)
            }
            StoreError::Timeout(timeout) => {
                write!(f, "request timed out after {}ms", timeout.as_millis())
            }
            StoreError::Cancelled => write!(f, "request cancelled"),
            StoreError::Other(message) => write!(f, "table client error: {}", message),
        }
    }
}

impl StdError for StoreError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StoreError::BuildError(e) => Some(e),
            StoreError::DynamoDescribeTableError(e) => Some(e),
            StoreError::DynamoScanError(e) => Some(e),
            StoreError::DynamoBatchWriteItemError(e) => Some(e),
            StoreError::DynamoCreateTableError(e) => Some(e),
            _ => None,
        }
    }
}

/// Terminal failure of a purge run
///
/// Every variant except [`Error::SchemaUnavailable`] carries the number of items
/// deleted before the run stopped. Deletions are not rolled back.
#[derive(Debug)]
pub enum Error {
    /// The table's key layout could not be learned; nothing was deleted
    SchemaUnavailable {
        /// Table that was described
        table: String,
        /// Underlying client failure
        source: StoreError,
    },
    /// Enumerating the table failed part way through
    ScanFailed {
        /// Items deleted before the scan broke
        deleted: usize,
        /// Underlying client failure
        source: StoreError,
    },
    /// Submitting a batch failed with a hard error
    BatchRequestFailed {
        /// Batch that failed
        batch: BatchId,
        /// Items deleted before the run stopped
        deleted: usize,
        /// Keys of the failing batch that were not confirmed deleted
        undeleted: Vec<ItemKey>,
        /// Underlying client failure
        source: StoreError,
    },
    /// The retry budget ran out with keys still unprocessed
    BatchDrainIncomplete {
        /// Batch that could not be drained
        batch: BatchId,
        /// Items deleted before the run stopped
        deleted: usize,
        /// Keys the store never processed
        undeleted: Vec<ItemKey>,
    },
    /// The caller cancelled the run
    Cancelled {
        /// Items deleted before cancellation took effect
        deleted: usize,
    },
}

impl Error {
    /// Number of items confirmed deleted before the failure
    ///
    /// Only deletions the store acknowledged are counted. A request abandoned by
    /// cancellation or a timeout may still have been applied, so the real number
    /// can be higher.
    pub fn deleted(&self) -> usize {
        match self {
            Error::SchemaUnavailable { .. } => 0,
            Error::ScanFailed { deleted, .. }
            | Error::BatchRequestFailed { deleted, .. }
            | Error::BatchDrainIncomplete { deleted, .. }
            | Error::Cancelled { deleted } => *deleted,
        }
    }

    /// Identity of the batch that stopped the run, if a batch did
    pub fn batch(&self) -> Option<BatchId> {
        match self {
            Error::BatchRequestFailed { batch, .. } | Error::BatchDrainIncomplete { batch, .. } => {
                Some(*batch)
            }
            _ => None,
        }
    }

    /// Keys known to remain in the table after the failure
    pub fn undeleted(&self) -> &[ItemKey] {
        match self {
            Error::BatchRequestFailed { undeleted, .. }
            | Error::BatchDrainIncomplete { undeleted, .. } => undeleted,
            _ => &[],
        }
    }

    /// Check if the run stopped because the caller cancelled it
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Map a failure of the key scan, keeping cancellation distinct.
    pub(crate) fn from_scan(source: StoreError) -> Self {
        match source {
            StoreError::Cancelled => Error::Cancelled { deleted: 0 },
            source => Error::ScanFailed { deleted: 0, source },
        }
    }

    /// Replace the progress count with the run-wide total.
    pub(crate) fn with_deleted(mut self, total: usize) -> Self {
        match &mut self {
            Error::SchemaUnavailable { .. } => {}
            Error::ScanFailed { deleted, .. }
            | Error::BatchRequestFailed { deleted, .. }
            | Error::BatchDrainIncomplete { deleted, .. }
            | Error::Cancelled { deleted } => *deleted = total,
        }
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SchemaUnavailable { table, source } => {
                write!(f, "key schema of table '{}' unavailable: {}", table, source)
            }
            Error::ScanFailed { deleted, source } => {
                write!(f, "scan failed after {} deleted items: {}", deleted, source)
            }
            Error::BatchRequestFailed {
                batch,
                deleted,
                source,
                ..
            } => write!(
                f,
                "batch {} request failed after {} deleted items: {}",
                batch, deleted, source
            ),
            Error::BatchDrainIncomplete {
                batch,
                deleted,
                undeleted,
            } => write!(
                f,
                "batch {} left {} items unprocessed after retries ({} deleted)",
                batch,
                undeleted.len(),
                deleted
            ),
            Error::Cancelled { deleted } => {
                write!(f, "purge cancelled after {} deleted items", deleted)
            }
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::SchemaUnavailable { source, .. }
            | Error::ScanFailed { source, .. }
            | Error::BatchRequestFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
