//! Job queue for promise reactions.
//!
//! ## Ordering
//!
//! - FIFO: first queued, first executed
//! - Jobs enqueued during a drain run in the same drain
//!
//! ## Error handling
//!
//! - A failing job is logged and the drain continues
//! - Only the first error is returned to the caller

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::VmResult;
use crate::object::JsObject;
use crate::promise::PromiseReaction;
use crate::realm::Realm;
use crate::value::Value;

/// Host job callback
pub type HostJob = Box<dyn FnOnce(&Realm) -> VmResult<()> + Send>;

/// A queued job
pub enum Job {
    /// PromiseReactionJob
    Reaction {
        reaction: PromiseReaction,
        argument: Value,
    },
    /// PromiseResolveThenableJob
    ResolveThenable {
        promise: Arc<JsObject>,
        thenable: Value,
        then: Value,
    },
    /// Host-defined job (finalization callbacks, host tasks)
    Host(HostJob),
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reaction { argument, .. } => write!(f, "Job::Reaction({argument:?})"),
            Self::ResolveThenable { thenable, .. } => {
                write!(f, "Job::ResolveThenable({thenable:?})")
            }
            Self::Host(_) => write!(f, "Job::Host"),
        }
    }
}

/// FIFO queue of jobs
pub struct JobQueue {
    queue: Mutex<VecDeque<Job>>,
    len: AtomicUsize,
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            len: AtomicUsize::new(0),
        }
    }

    pub fn enqueue(&self, job: Job) {
        let mut queue = self.queue.lock();
        queue.push_back(job);
        self.len.store(queue.len(), Ordering::Release);
    }

    pub fn dequeue(&self) -> Option<Job> {
        let mut queue = self.queue.lock();
        let job = queue.pop_front();
        self.len.store(queue.len(), Ordering::Release);
        job
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all pending jobs
    pub fn clear(&self) {
        let mut queue = self.queue.lock();
        queue.clear();
        self.len.store(0, Ordering::Release);
    }
}
