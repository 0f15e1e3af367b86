//! Reply handles for a single task.
//!
//! Every task gets exactly one terminal reply. The [`Responder`] holds a
//! settle-once flag shared by all of its clones: the first `done` or
//! `error` wins, anything after it is logged and dropped.

use anyhow::Result;
use mcore::{Message, Response, TaskId};
use serde_json::Value;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::mpsc;

/// Error sent when every handle to an unsettled task has been dropped.
pub const DROPPED_REPLY: &str = "endpoint dropped its reply without settling";

/// Reply handle for one task.
#[derive(Clone)]
pub struct Responder {
    inner: Arc<Inner>,
}

struct Inner {
    id: TaskId,
    outbox: mpsc::UnboundedSender<Message>,
    settled: AtomicBool,
}

impl Inner {
    fn send(&self, response: Response) {
        // The orchestrator may be gone; a reply nobody reads is fine.
        let _ = self.outbox.send(Message::reply(self.id, response));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !*self.settled.get_mut() {
            tracing::warn!("task {}: {DROPPED_REPLY}", self.id);
            self.send(Response::Error(DROPPED_REPLY.into()));
        }
    }
}

impl Responder {
    pub(crate) fn new(id: TaskId, outbox: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                outbox,
                settled: AtomicBool::new(false),
            }),
        }
    }

    /// The task this responder answers.
    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    /// Whether a terminal reply has been sent.
    pub fn is_settled(&self) -> bool {
        self.inner.settled.load(Ordering::Acquire)
    }

    /// Send a progress reply. Dropped once the task has settled.
    pub fn progress(&self, data: Value) {
        if self.is_settled() {
            tracing::warn!("task {}: progress after settlement dropped", self.id());
            return;
        }
        self.inner.send(Response::Progress(data));
    }

    /// Settle with `Done`. Returns `false` if already settled.
    pub fn done(&self, data: Value) -> bool {
        self.settle(Response::Done(data))
    }

    /// Settle with `Error`. Returns `false` if already settled.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.settle(Response::Error(message.into()))
    }

    fn settle(&self, response: Response) -> bool {
        if self
            .inner
            .settled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("task {}: second terminal reply dropped", self.id());
            return false;
        }
        self.inner.send(response);
        true
    }
}

type ResumeFn<S> = Box<dyn FnOnce(&mut S) -> Result<Value> + Send>;

/// Work handed back to the dispatcher loop to finish a deferred task
/// against the worker state.
pub(crate) struct Resumption<S> {
    pub responder: Responder,
    pub run: ResumeFn<S>,
}

/// Completion handle given to deferred endpoints.
///
/// Settle directly with [`Deferred::done`] / [`Deferred::error`], or
/// finish on the worker thread with [`Deferred::resume`]. Dropping it
/// unsettled replies with [`DROPPED_REPLY`].
pub struct Deferred<S> {
    responder: Responder,
    resume: mpsc::UnboundedSender<Resumption<S>>,
}

impl<S> Deferred<S> {
    pub(crate) fn new(responder: Responder, resume: mpsc::UnboundedSender<Resumption<S>>) -> Self {
        Self { responder, resume }
    }

    /// The underlying responder.
    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    /// Send a progress reply.
    pub fn progress(&self, data: Value) {
        self.responder.progress(data);
    }

    /// Settle with `Done`.
    pub fn done(self, data: Value) {
        self.responder.done(data);
    }

    /// Settle with `Error`.
    pub fn error(self, message: impl Into<String>) {
        self.responder.error(message);
    }

    /// Run `f` on the dispatcher loop with the worker state and settle
    /// with its result, as a sync endpoint would.
    pub fn resume(self, f: impl FnOnce(&mut S) -> Result<Value> + Send + 'static) {
        let resumption = Resumption {
            responder: self.responder,
            run: Box::new(f),
        };
        if self.resume.send(resumption).is_err() {
            // Dropping the resumption settles the task with an error.
            tracing::warn!("dispatcher stopped before a deferred task could resume");
        }
    }
}
