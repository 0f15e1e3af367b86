//! Worker threads.
//!
//! Each worker runs on its own OS thread with a current-thread tokio
//! runtime, so its handlers never run concurrently with each other.

use crate::dispatcher::Dispatcher;
use anyhow::{Result, anyhow};
use compact_str::CompactString;
use mcore::{Client, Message, Task};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

/// Raw channels to a running worker.
pub struct Link {
    /// Tasks to the worker.
    pub inbox: mpsc::UnboundedSender<Task>,
    /// Announcements and replies from the worker.
    pub outbox: mpsc::UnboundedReceiver<Message>,
}

impl Link {
    /// Attach a [`Client`]. Must be called within a tokio runtime.
    pub fn connect(self) -> Client {
        Client::connect(self.inbox, self.outbox)
    }
}

/// A running worker and its client.
pub struct WorkerHandle {
    client: Client,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// The client for this worker.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Give up the thread handle and keep only the client. The worker
    /// exits once every clone of the client is dropped.
    pub fn into_client(self) -> Client {
        self.client
    }

    /// Drop this handle's client and wait for the worker thread to exit.
    ///
    /// Blocks until every other clone of the client has been dropped too.
    pub fn join(self) -> Result<()> {
        drop(self.client);
        self.thread
            .join()
            .map_err(|_| anyhow!("worker thread panicked"))
    }
}

/// Start a worker thread and return its raw channels.
///
/// `setup` runs on the worker thread inside its runtime: it binds
/// endpoints and builds the state the dispatcher serves with. If it
/// fails, the worker exits and its channels close.
pub fn launch<S, F>(name: &str, setup: F) -> Result<(Link, JoinHandle<()>)>
where
    S: 'static,
    F: FnOnce(&mut Dispatcher<S>) -> Result<S> + Send + 'static,
{
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let label = CompactString::from(name);

    let thread = thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!("{label}: failed to build runtime: {e}");
                    return;
                }
            };
            runtime.block_on(async move {
                let mut dispatcher = Dispatcher::new(label.clone(), outbox_tx);
                match setup(&mut dispatcher) {
                    Ok(state) => dispatcher.run(state, inbox_rx).await,
                    Err(e) => tracing::error!("{label}: setup failed: {e:#}"),
                }
            });
        })?;

    Ok((
        Link {
            inbox: inbox_tx,
            outbox: outbox_rx,
        },
        thread,
    ))
}

/// Start a worker thread and connect a client to it.
///
/// Must be called within a tokio runtime; the client's reply router is
/// spawned on it.
pub fn spawn<S, F>(name: &str, setup: F) -> Result<WorkerHandle>
where
    S: 'static,
    F: FnOnce(&mut Dispatcher<S>) -> Result<S> + Send + 'static,
{
    let (link, thread) = launch(name, setup)?;
    Ok(WorkerHandle {
        client: link.connect(),
        thread,
    })
}
