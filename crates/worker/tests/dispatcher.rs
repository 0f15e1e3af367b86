//! Dispatcher contract tests against raw worker channels.

use anyhow::bail;
use mcore::{Capability, Message, Response, Task, TaskId};
use meshwork_worker::{DROPPED_REPLY, Dispatcher, Endpoint, Link, launch};
use serde_json::{Value, json};
use tokio::sync::mpsc;

/// A worker whose state counts `widget_load` invocations, with a few
/// misbehaving endpoints bound under spare capability names.
fn fixture() -> Raw {
    let (link, _thread) = launch("test-worker", |d: &mut Dispatcher<u64>| {
        d.bind(
            Capability::WidgetLoad,
            Endpoint::sync(|count, data, _| {
                *count += 1;
                Ok(json!({ "echo": data, "count": *count }))
            }),
        );
        // Ignored: a capability binds once.
        d.bind(
            Capability::WidgetLoad,
            Endpoint::sync(|_, _, _| Ok(json!("shadowed"))),
        );
        d.bind(
            Capability::TraceCompute,
            Endpoint::sync(|_, _, r| {
                r.progress(json!(1));
                r.done(json!("first"));
                r.done(json!("second"));
                r.error("third");
                r.progress(json!(2));
                Ok(json!("returned"))
            }),
        );
        d.bind(
            Capability::TraceClear,
            Endpoint::sync(|_, _, _| panic!("boom")),
        );
        d.bind(
            Capability::WidgetRemove,
            Endpoint::sync(|_, _, _| bail!("widget 9 is not loaded")),
        );
        d.bind(
            Capability::SupportCompute,
            Endpoint::deferred(|_, _, deferred| {
                drop(deferred);
                Ok(())
            }),
        );
        d.bind(
            Capability::SupportClear,
            Endpoint::deferred(|_, _, deferred| {
                tokio::spawn(async move {
                    tokio::task::yield_now().await;
                    deferred.resume(|count| {
                        *count += 100;
                        Ok(json!(*count))
                    });
                });
                Ok(())
            }),
        );
        d.bind(
            Capability::PolygonUnion,
            Endpoint::deferred(|_, _, deferred| {
                tokio::spawn(async move {
                    deferred.progress(json!("working"));
                    deferred.resume(|_| panic!("resumed badly"));
                });
                Ok(())
            }),
        );
        Ok(0)
    })
    .unwrap();
    Raw {
        link,
        next: 0,
        bound: Vec::new(),
    }
}

struct Raw {
    link: Link,
    next: TaskId,
    bound: Vec<String>,
}

impl Raw {
    fn send(&mut self, name: &str, data: Value) -> TaskId {
        self.next += 1;
        self.link
            .inbox
            .send(Task::new(self.next, name, data))
            .unwrap();
        self.next
    }

    /// Every reply up to and including the terminal reply of `last`.
    async fn replies_until(&mut self, last: TaskId) -> Vec<(TaskId, Response)> {
        let mut out = Vec::new();
        loop {
            match self.link.outbox.recv().await.unwrap() {
                Message::Bound { name } => self.bound.push(name.to_string()),
                Message::Reply { id, response } => {
                    let terminal = response.is_terminal();
                    out.push((id, response));
                    if id == last && terminal {
                        return out;
                    }
                }
            }
        }
    }

    /// Replies for `id` only, fenced by a follow-up task so that anything
    /// the worker would emit late has already been observed.
    async fn exchange(&mut self, name: &str, data: Value) -> Vec<Response> {
        let id = self.send(name, data);
        let fence = self.send("widget_load", Value::Null);
        self.replies_until(fence)
            .await
            .into_iter()
            .filter(|(reply, _)| *reply == id)
            .map(|(_, response)| response)
            .collect()
    }
}

#[tokio::test]
async fn replies_follow_submission_order() {
    let mut raw = fixture();
    let ids: Vec<_> = (0..20).map(|i| raw.send("widget_load", json!(i))).collect();
    let replies = raw.replies_until(*ids.last().unwrap()).await;

    let order: Vec<_> = replies.iter().map(|(id, _)| *id).collect();
    assert_eq!(order, ids);
    for (i, (_, response)) in replies.into_iter().enumerate() {
        assert_eq!(
            response,
            Response::Done(json!({ "echo": i, "count": i + 1 }))
        );
    }
}

#[tokio::test]
async fn bindings_are_announced_once() {
    let mut raw = fixture();
    let id = raw.send("widget_load", Value::Null);
    raw.replies_until(id).await;
    assert_eq!(
        raw.bound,
        vec![
            "widget_load",
            "trace_compute",
            "trace_clear",
            "widget_remove",
            "support_compute",
            "support_clear",
            "polygon_union",
        ]
    );
}

#[tokio::test]
async fn second_terminal_reply_is_dropped() {
    let mut raw = fixture();
    let replies = raw.exchange("trace_compute", Value::Null).await;
    assert_eq!(
        replies,
        vec![Response::Progress(json!(1)), Response::Done(json!("first"))]
    );
}

#[tokio::test]
async fn unknown_names_touch_nothing() {
    let mut raw = fixture();
    assert_eq!(
        raw.exchange("mesh_explode", json!({ "id": 1 })).await,
        vec![Response::Error("no registered endpoint: mesh_explode".into())]
    );
    // Known capability, but not bound on this worker.
    assert_eq!(
        raw.exchange("widgets_clear", Value::Null).await,
        vec![Response::Error("no registered endpoint: widgets_clear".into())]
    );

    // Only the two fence tasks reached the counting endpoint.
    let replies = raw.exchange("widget_load", json!("probe")).await;
    assert_eq!(
        replies,
        vec![Response::Done(json!({ "echo": "probe", "count": 3 }))]
    );
}

#[tokio::test]
async fn panicking_handler_keeps_worker_alive() {
    let mut raw = fixture();
    let replies = raw.exchange("trace_clear", Value::Null).await;
    assert_eq!(replies, vec![Response::Error("handler panicked: boom".into())]);

    let replies = raw.exchange("widget_load", json!(7)).await;
    assert!(matches!(replies.as_slice(), [Response::Done(_)]));
}

#[tokio::test]
async fn handler_error_becomes_error_reply() {
    let mut raw = fixture();
    let replies = raw.exchange("widget_remove", json!({ "id": 9 })).await;
    assert_eq!(
        replies,
        vec![Response::Error("widget 9 is not loaded".into())]
    );
}

#[tokio::test]
async fn dropped_deferred_settles_once() {
    let mut raw = fixture();
    let replies = raw.exchange("support_compute", Value::Null).await;
    assert_eq!(replies, vec![Response::Error(DROPPED_REPLY.into())]);
}

#[tokio::test]
async fn resumed_work_sees_worker_state() {
    let mut raw = fixture();
    let id = raw.send("support_clear", Value::Null);
    let replies = raw.replies_until(id).await;
    assert_eq!(replies, vec![(id, Response::Done(json!(100)))]);

    let replies = raw.exchange("widget_load", Value::Null).await;
    assert_eq!(
        replies,
        vec![Response::Done(json!({ "echo": null, "count": 101 }))]
    );
}

#[tokio::test]
async fn panicking_resumption_becomes_error() {
    let mut raw = fixture();
    let id = raw.send("polygon_union", Value::Null);
    let replies = raw.replies_until(id).await;
    assert_eq!(
        replies,
        vec![
            (id, Response::Progress(json!("working"))),
            (id, Response::Error("handler panicked: resumed badly".into())),
        ]
    );
}

#[tokio::test]
async fn worker_exits_when_inbox_closes() {
    let (link, thread) = launch("short-lived", |d: &mut Dispatcher<()>| {
        d.bind(Capability::WidgetsClear, Endpoint::sync(|_, _, _| Ok(Value::Null)));
        Ok(())
    })
    .unwrap();
    let Link { inbox, mut outbox } = link;
    drop(inbox);
    thread.join().unwrap();

    // The announcement was sent, then the channel closed.
    assert!(matches!(outbox.recv().await, Some(Message::Bound { .. })));
    assert!(outbox.recv().await.is_none());
}

#[tokio::test]
async fn deferred_work_finishes_after_inbox_closes() {
    let (outbox_tx, mut outbox) = mpsc::unbounded_channel();
    let (inbox, inbox_rx) = mpsc::unbounded_channel();
    let mut dispatcher: Dispatcher<u64> = Dispatcher::new("draining", outbox_tx);
    dispatcher.bind(
        Capability::SupportCompute,
        Endpoint::deferred(|_, _, deferred| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                deferred.resume(|count| {
                    *count += 1;
                    Ok(json!(*count))
                });
            });
            Ok(())
        }),
    );

    inbox.send(Task::new(1, "support_compute", Value::Null)).unwrap();
    inbox.send(Task::new(2, "support_compute", Value::Null)).unwrap();
    drop(inbox);
    dispatcher.run(0, inbox_rx).await;

    assert!(matches!(outbox.recv().await, Some(Message::Bound { .. })));
    let mut replies = Vec::new();
    while let Some(msg) = outbox.recv().await {
        replies.push(msg);
    }
    assert_eq!(
        replies,
        vec![
            Message::reply(1, Response::Done(json!(1))),
            Message::reply(2, Response::Done(json!(2))),
        ]
    );
}
