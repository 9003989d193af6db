//! Jobs shipped with the service.

pub mod sample;
pub mod transaction;

pub use sample::{SAMPLE_JOB, SampleJob};
pub use transaction::{TRANSACTION_JOB, TransactionJob};

use std::sync::Arc;

use crate::external::ExternalApi;
use crate::job::Job;
use crate::store::WorkClaimStore;

/// Every bundled job, wired to the given store and external service.
pub fn bundled_jobs(
    store: Arc<dyn WorkClaimStore>,
    api: Arc<dyn ExternalApi>,
) -> Vec<Arc<dyn Job>> {
    vec![
        Arc::new(TransactionJob::new(Arc::clone(&store), Arc::clone(&api))),
        Arc::new(SampleJob::new(store, api)),
    ]
}
