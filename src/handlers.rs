use std::sync::Arc;

use crate::jobs::JobProvider;

mod notify_commit;

pub use notify_commit::{NotifyOutcome, notify_commit};

/// What every request handler has access to.
pub struct Context {
    pub jobs: Arc<dyn JobProvider>,
}

impl Context {
    pub fn new(jobs: Arc<dyn JobProvider>) -> Context {
        Context { jobs }
    }
}
