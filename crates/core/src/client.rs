//! Sending side of the task protocol.
//!
//! A [`Client`] allocates task ids, pushes tasks into a worker inbox and
//! routes the worker's replies back to the matching [`Call`]. Replies
//! arrive over one channel per worker, so for a given worker they are
//! observed in the order the worker produced them.

use crate::protocol::{Message, Response, Task, TaskId};
use compact_str::CompactString;
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::sync::{mpsc, watch};

type Pending = Arc<Mutex<BTreeMap<TaskId, mpsc::UnboundedSender<Response>>>>;

/// Why a call did not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CallError {
    /// The worker answered with a terminal `Error`.
    #[error("{0}")]
    Remote(String),
    /// The worker went away before answering.
    #[error("worker disconnected")]
    Disconnected,
}

/// Cloneable handle for issuing tasks to one worker.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    inbox: mpsc::UnboundedSender<Task>,
    pending: Pending,
    next_id: AtomicU64,
    bound: watch::Receiver<BTreeSet<CompactString>>,
}

impl Client {
    /// Connect to a worker's inbox and outbox.
    ///
    /// Spawns the reply router on the current tokio runtime.
    pub fn connect(
        inbox: mpsc::UnboundedSender<Task>,
        outbox: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        let pending: Pending = Arc::default();
        let (bound_tx, bound) = watch::channel(BTreeSet::new());
        tokio::spawn(route(outbox, Arc::clone(&pending), bound_tx));
        Self {
            inner: Arc::new(Inner {
                inbox,
                pending,
                next_id: AtomicU64::new(1),
                bound,
            }),
        }
    }

    /// Send a task. Replies are read from the returned [`Call`].
    pub fn call(&self, name: impl Into<CompactString>, data: Value) -> Result<Call, CallError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        // Register before sending so a fast reply always finds its call.
        self.inner.pending.lock().insert(id, tx);
        if self.inner.inbox.send(Task::new(id, name, data)).is_err() {
            self.inner.pending.lock().remove(&id);
            return Err(CallError::Disconnected);
        }
        Ok(Call { id, rx })
    }

    /// Whether the worker has announced the named capability.
    pub fn is_bound(&self, name: &str) -> bool {
        self.inner.bound.borrow().contains(name)
    }

    /// Every capability announced so far.
    pub fn bound(&self) -> BTreeSet<CompactString> {
        self.inner.bound.borrow().clone()
    }

    /// Wait until the worker announces the named capability.
    pub async fn wait_bound(&self, name: &str) -> Result<(), CallError> {
        let mut rx = self.inner.bound.clone();
        rx.wait_for(|set| set.contains(name))
            .await
            .map(|_| ())
            .map_err(|_| CallError::Disconnected)
    }
}

/// Replies to one task.
#[derive(Debug)]
pub struct Call {
    id: TaskId,
    rx: mpsc::UnboundedReceiver<Response>,
}

impl Call {
    /// The task id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Next reply, `None` once the terminal reply has been taken or the
    /// worker is gone.
    pub async fn next(&mut self) -> Option<Response> {
        self.rx.recv().await
    }

    /// Drive the call to its terminal reply, feeding progress payloads to
    /// `on_progress` in order.
    pub async fn settle(mut self, mut on_progress: impl FnMut(Value)) -> Result<Value, CallError> {
        while let Some(response) = self.rx.recv().await {
            match response {
                Response::Progress(data) => on_progress(data),
                Response::Done(data) => return Ok(data),
                Response::Error(message) => return Err(CallError::Remote(message)),
            }
        }
        Err(CallError::Disconnected)
    }
}

async fn route(
    mut outbox: mpsc::UnboundedReceiver<Message>,
    pending: Pending,
    bound: watch::Sender<BTreeSet<CompactString>>,
) {
    while let Some(msg) = outbox.recv().await {
        match msg {
            Message::Bound { name } => {
                tracing::debug!("capability bound: {name}");
                bound.send_modify(|set| {
                    set.insert(name);
                });
            }
            Message::Reply { id, response } => {
                let tx = {
                    let mut table = pending.lock();
                    if response.is_terminal() {
                        table.remove(&id)
                    } else {
                        table.get(&id).cloned()
                    }
                };
                match tx {
                    Some(tx) => {
                        // The caller may have stopped listening; that is allowed.
                        let _ = tx.send(response);
                    }
                    None => tracing::debug!("dropping reply for unknown task {id}"),
                }
            }
        }
    }
    tracing::debug!("worker outbox closed");
    pending.lock().clear();
}
