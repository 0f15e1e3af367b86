//! Worker-side task dispatch.
//!
//! A [`Dispatcher`] owns the endpoint table for one worker. Endpoints are
//! bound before the worker starts and cannot change afterwards; each
//! binding is announced to the orchestrator as it happens. Tasks are
//! handled one at a time in arrival order on the worker's own thread.

use crate::responder::{Deferred, Responder, Resumption};
use anyhow::{Result, anyhow};
use compact_str::CompactString;
use mcore::{Capability, Message, Task};
use serde_json::Value;
use std::{
    any::Any,
    collections::BTreeMap,
    panic::{AssertUnwindSafe, catch_unwind},
};
use tokio::sync::mpsc;

type SyncFn<S> = Box<dyn Fn(&mut S, Value, &Responder) -> Result<Value>>;
type DeferredFn<S> = Box<dyn Fn(&mut S, Value, Deferred<S>) -> Result<()>>;

enum Kind<S> {
    Sync(SyncFn<S>),
    Deferred(DeferredFn<S>),
}

/// A registered task handler.
///
/// Whether a handler settles on return or later is fixed when the
/// endpoint is built, not inferred from what the handler does.
pub struct Endpoint<S> {
    kind: Kind<S>,
}

impl<S> Endpoint<S> {
    /// A handler that settles on return.
    ///
    /// `Ok(value)` is sent as `Done(value)` unless the handler already
    /// settled through the responder; `Err` is sent as `Error`.
    pub fn sync(f: impl Fn(&mut S, Value, &Responder) -> Result<Value> + 'static) -> Self {
        Self {
            kind: Kind::Sync(Box::new(f)),
        }
    }

    /// A handler that settles later through its [`Deferred`].
    ///
    /// Returning `Err` settles the task immediately with `Error`.
    pub fn deferred(f: impl Fn(&mut S, Value, Deferred<S>) -> Result<()> + 'static) -> Self {
        Self {
            kind: Kind::Deferred(Box::new(f)),
        }
    }
}

/// Endpoint table and message loop for one worker.
pub struct Dispatcher<S> {
    name: CompactString,
    endpoints: BTreeMap<Capability, Endpoint<S>>,
    outbox: mpsc::UnboundedSender<Message>,
    resume_tx: mpsc::UnboundedSender<Resumption<S>>,
    resume_rx: mpsc::UnboundedReceiver<Resumption<S>>,
}

impl<S> Dispatcher<S> {
    /// A dispatcher replying on `outbox`.
    pub fn new(name: impl Into<CompactString>, outbox: mpsc::UnboundedSender<Message>) -> Self {
        let (resume_tx, resume_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            endpoints: BTreeMap::new(),
            outbox,
            resume_tx,
            resume_rx,
        }
    }

    /// The worker name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an endpoint and announce it.
    ///
    /// A capability can be bound once; later bindings are ignored.
    pub fn bind(&mut self, capability: Capability, endpoint: Endpoint<S>) -> &mut Self {
        if self.endpoints.contains_key(&capability) {
            tracing::warn!("{}: {capability} already bound, ignoring", self.name);
            return self;
        }
        self.endpoints.insert(capability, endpoint);
        let _ = self.outbox.send(Message::Bound {
            name: capability.into(),
        });
        self
    }

    /// Capabilities bound so far.
    pub fn capabilities(&self) -> impl Iterator<Item = Capability> + '_ {
        self.endpoints.keys().copied()
    }

    /// Serve tasks from `inbox` until it closes, then finish every
    /// deferred task still in flight.
    ///
    /// Deferred work resuming on the loop takes priority over new tasks.
    /// Each live [`Deferred`] holds a resume sender, so the drain ends
    /// once all of them have settled or been dropped.
    pub async fn run(mut self, mut state: S, mut inbox: mpsc::UnboundedReceiver<Task>) {
        tracing::debug!("{}: serving {} endpoints", self.name, self.endpoints.len());
        loop {
            tokio::select! {
                biased;
                Some(resumption) = self.resume_rx.recv() => resume(&mut state, resumption),
                task = inbox.recv() => match task {
                    Some(task) => self.dispatch(&mut state, task),
                    None => break,
                },
            }
        }

        tracing::debug!("{}: inbox closed, draining deferred tasks", self.name);
        let Self {
            name,
            resume_tx,
            mut resume_rx,
            ..
        } = self;
        drop(resume_tx);
        while let Some(resumption) = resume_rx.recv().await {
            resume(&mut state, resumption);
        }
        tracing::debug!("{name}: stopped");
    }

    /// Handle one task to completion or to its deferral point.
    pub fn dispatch(&self, state: &mut S, task: Task) {
        let responder = Responder::new(task.id, self.outbox.clone());
        let endpoint = task
            .name
            .parse::<Capability>()
            .ok()
            .and_then(|capability| self.endpoints.get(&capability));
        let Some(endpoint) = endpoint else {
            tracing::debug!("{}: no endpoint for {}", self.name, task.name);
            responder.error(format!("no registered endpoint: {}", task.name));
            return;
        };

        tracing::trace!("{}: task {} {}", self.name, task.id, task.name);
        match &endpoint.kind {
            Kind::Sync(f) => {
                let result = guarded(|| f(state, task.data, &responder));
                settle(&responder, result);
            }
            Kind::Deferred(f) => {
                let deferred = Deferred::new(responder.clone(), self.resume_tx.clone());
                if let Err(e) = guarded(|| f(state, task.data, deferred)) {
                    responder.error(format!("{e:#}"));
                }
            }
        }
    }
}

fn resume<S>(state: &mut S, resumption: Resumption<S>) {
    let Resumption { responder, run } = resumption;
    let result = guarded(|| run(state));
    settle(&responder, result);
}

fn settle(responder: &Responder, result: Result<Value>) {
    match result {
        Ok(_) if responder.is_settled() => {}
        Ok(value) => {
            responder.done(value);
        }
        Err(e) => {
            responder.error(format!("{e:#}"));
        }
    }
}

/// Run a handler, turning a panic into an error.
fn guarded<T>(f: impl FnOnce() -> Result<T>) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(anyhow!("handler panicked: {}", panic_message(payload.as_ref())))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
