mod batch;
pub(crate) mod helpers;
mod purge;
mod scan;
mod schema;
mod types;

pub use batch::{BatchDeleter, chunk};
pub use purge::Purger;
pub use scan::scan;
pub use schema::resolve;
pub use types::{
    BatchId, BatchOutcome, DeleteBatch, ItemKey, KeySchema, MAX_BATCH_SIZE, Projection,
    PurgeConfig, RequestOptions, RetryConfig, RunResult, ScanPage,
};
