//! Per-request context recycled through the pool.

use uuid::Uuid;

use crate::pool::Resource;

/// Reusable per-request handle. Carries a session id used to build
/// correlation ids, so a request can be traced back to the context that
/// issued it.
#[derive(Debug, Clone)]
pub struct RequestContext {
    session: Uuid,
    served: u64,
}

impl RequestContext {
    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Requests issued through this context so far.
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Correlation id for the next request, e.g. `"<session>-3"`.
    pub fn next_request_id(&mut self) -> String {
        self.served += 1;
        format!("{}-{}", self.session, self.served)
    }
}

impl Resource for RequestContext {
    fn create() -> Self {
        Self {
            session: Uuid::new_v4(),
            served: 0,
        }
    }
}
