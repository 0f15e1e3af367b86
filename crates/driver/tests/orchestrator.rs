//! Orchestrator tests against a scripted worker and a real one.

use geo::Area;
use mcore::{
    Capability, Client, Mesh, MeshworkConfig, Message, Response, Task,
    payload::{Delta, DeltaBatch, SUPPORTS, SupportSettings, TRACES, TraceSettings},
};
use meshwork_driver::{DriverError, Orchestrator};
use serde_json::{Value, json};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::mpsc;

type Seen = Arc<Mutex<Vec<Task>>>;

/// A worker that acknowledges cache tasks and answers everything else
/// with `script`. Every task it receives is recorded.
fn scripted(script: impl Fn(&Task) -> Response + Send + 'static) -> (Client, Seen) {
    let (inbox_tx, mut inbox_rx) = mpsc::unbounded_channel::<Task>();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let seen = Seen::default();
    let record = seen.clone();
    tokio::spawn(async move {
        while let Some(task) = inbox_rx.recv().await {
            let response = match task.name.as_str() {
                "widget_load" | "widget_remove" | "widgets_clear" => Response::Done(json!({})),
                _ => script(&task),
            };
            record.lock().unwrap().push(task.clone());
            let _ = outbox_tx.send(Message::reply(task.id, response));
        }
    });
    (Client::connect(inbox_tx, outbox_rx), seen)
}

fn done(deltas: Vec<Delta>) -> Response {
    Response::Done(serde_json::to_value(DeltaBatch { deltas }).unwrap())
}

fn mesh() -> Mesh {
    Mesh::cuboid([0.0; 3], [1.0; 3])
}

async fn tracked(client: Client, ids: &[u64]) -> Orchestrator {
    let orchestrator = Orchestrator::new(client);
    for &id in ids {
        orchestrator.load(id, mesh()).await.unwrap();
    }
    orchestrator
}

#[tokio::test]
async fn merge_leaves_unreported_ids_untouched() {
    let (client, _) = scripted(|task| match task.name.as_str() {
        "support_compute" => done(
            [2, 3, 5]
                .map(|id| Delta::set(id, SUPPORTS, json!("s")))
                .to_vec(),
        ),
        _ => done(vec![
            Delta::set(2, TRACES, json!("t2")),
            Delta::set(5, TRACES, json!("t5")),
        ]),
    });
    let orchestrator = tracked(client, &[2, 3, 5]).await;

    orchestrator
        .invoke(Capability::SupportCompute, &(), [2, 3, 5], |_| {})
        .await
        .unwrap();
    let merged = orchestrator
        .invoke(Capability::TraceCompute, &(), [2, 3, 5], |_| {})
        .await
        .unwrap();

    assert_eq!(merged, vec![2, 5]);
    let three = orchestrator.widget(3).unwrap();
    assert_eq!(three.derived(TRACES), None);
    assert_eq!(three.derived(SUPPORTS), Some(&json!("s")));
    assert_eq!(
        orchestrator.widget(5).unwrap().derived(TRACES),
        Some(&json!("t5"))
    );
}

#[tokio::test]
async fn payload_is_ids_and_settings_only() {
    let (client, seen) = scripted(|_| done(Vec::new()));
    let orchestrator = tracked(client, &[1, 2]).await;

    let settings = TraceSettings { min_area: 2.5 };
    orchestrator
        .compute_traces(&settings, [2, 1], |_| {})
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    let task = seen.last().unwrap();
    assert_eq!(task.name, "trace_compute");
    assert_eq!(
        task.data,
        json!({ "ids": [1, 2], "settings": { "min_area": 2.5 } })
    );
}

#[tokio::test]
async fn error_leaves_mirror_and_alerts_once() {
    let (client, seen) = scripted(|_| Response::Error("widget 7 is not loaded".into()));
    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = alerts.clone();
    let orchestrator = tracked(client, &[7])
        .await
        .with_alert(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let err = orchestrator
        .compute_supports(&SupportSettings::default(), [7], |_| {})
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DriverError::Remote { capability: Capability::SupportCompute, ref message }
            if message == "widget 7 is not loaded"
    ));
    assert_eq!(alerts.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.widget(7).unwrap().features().count(), 0);

    // No automatic retry: load plus one attempt.
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_reply_merges_nothing() {
    let (client, _) = scripted(|_| Response::Done(json!({ "deltas": [{ "id": 1 }] })));
    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = alerts.clone();
    let orchestrator = tracked(client, &[1]).await.with_alert(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let err = orchestrator
        .compute_traces(&TraceSettings::default(), [1], |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Payload { .. }));
    assert_eq!(alerts.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.widget(1).unwrap().features().count(), 0);
}

#[tokio::test]
async fn null_clears_and_untracked_ids_are_skipped() {
    let (client, _) = scripted(|task| match task.name.as_str() {
        "trace_clear" => done(vec![Delta::cleared(1, TRACES)]),
        _ => done(vec![
            Delta::set(1, TRACES, json!("t")),
            Delta::set(9, TRACES, json!("ghost")),
        ]),
    });
    let orchestrator = tracked(client, &[1]).await;

    let merged = orchestrator
        .compute_traces(&TraceSettings::default(), [1], |_| {})
        .await
        .unwrap();
    assert_eq!(merged, vec![1]);
    assert!(orchestrator.widget(9).is_none());

    orchestrator.clear_traces([1]).await.unwrap();
    assert_eq!(orchestrator.widget(1).unwrap().derived(TRACES), None);
}

#[tokio::test]
async fn remove_and_clear_update_the_mirror() {
    let (client, seen) = scripted(|_| done(Vec::new()));
    let orchestrator = tracked(client, &[1, 2, 3]).await;

    assert!(orchestrator.remove(2).await.unwrap());
    assert!(!orchestrator.remove(2).await.unwrap());
    assert_eq!(orchestrator.ids(), vec![1, 3]);

    orchestrator.clear().await.unwrap();
    assert!(orchestrator.ids().is_empty());

    let names: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|t| t.name.to_string())
        .collect();
    assert_eq!(
        names[3..],
        ["widget_remove", "widget_remove", "widgets_clear"]
    );
}

#[tokio::test]
async fn end_to_end_with_a_worker() {
    let mut config = MeshworkConfig::default();
    config.worker.minions = 2;
    config.union.chunk = 1;
    let handle = worker::spawn_primary(&config).unwrap();
    let orchestrator = Orchestrator::new(handle.client().clone());

    orchestrator
        .load(1, Mesh::cuboid([0.0, 0.0, 2.0], [2.0, 2.0, 1.0]))
        .await
        .unwrap();
    orchestrator
        .load(2, Mesh::cuboid([5.0, 0.0, 0.0], [1.0, 3.0, 1.0]))
        .await
        .unwrap();

    let mut progress = Vec::<Value>::new();
    let merged = orchestrator
        .compute_traces(&TraceSettings::default(), [1, 2], |p| progress.push(p))
        .await
        .unwrap();
    assert_eq!(merged, vec![1, 2]);
    assert_eq!(progress.len(), 2);
    let traces = orchestrator.traces(2).unwrap().unwrap();
    assert!((traces.unsigned_area() - 3.0).abs() < 1e-9);

    orchestrator
        .compute_supports(&SupportSettings::default(), [1], |_| {})
        .await
        .unwrap();
    let supports = orchestrator.supports(1).unwrap().unwrap();
    assert!((supports.unsigned_area() - 4.0).abs() < 1e-6);

    // The worker forgets removed widgets too.
    orchestrator.remove(1).await.unwrap();
    let err = orchestrator
        .invoke(Capability::TraceCompute, &(), [1], |_| {})
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Remote { .. }));
    assert!(matches!(
        orchestrator.polygons(1, TRACES),
        Err(DriverError::Unknown(1))
    ));

    orchestrator.clear_supports([]).await.unwrap();
}
