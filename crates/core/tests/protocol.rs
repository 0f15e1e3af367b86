//! Wire shape tests for tasks and replies.

use meshwork_core::{Message, Response, Task};
use serde_json::json;

#[test]
fn task_wire_shape() {
    let task = Task::new(7, "trace_compute", json!({ "ids": [2, 5] }));
    assert_eq!(
        serde_json::to_value(&task).unwrap(),
        json!({ "id": 7, "task": "trace_compute", "data": { "ids": [2, 5] } })
    );
}

#[test]
fn task_without_data() {
    let task: Task = serde_json::from_value(json!({ "id": 1, "task": "widgets_clear" })).unwrap();
    assert_eq!(task.name.as_str(), "widgets_clear");
    assert!(task.data.is_null());
}

#[test]
fn reply_wire_shapes() {
    let cases = [
        (
            Message::Bound {
                name: "polygon_union".into(),
            },
            json!({ "bind": "polygon_union" }),
        ),
        (
            Message::reply(4, Response::Progress(json!({ "done": 1 }))),
            json!({ "id": 4, "done": false, "data": { "done": 1 } }),
        ),
        (
            Message::reply(4, Response::Done(json!([1, 2]))),
            json!({ "id": 4, "done": true, "data": [1, 2] }),
        ),
        (
            Message::reply(5, Response::Error("boom".into())),
            json!({ "id": 5, "error": "boom" }),
        ),
    ];

    for (msg, wire) in cases {
        assert_eq!(serde_json::to_value(&msg).unwrap(), wire);
        let back: Message = serde_json::from_value(wire).unwrap();
        assert_eq!(back, msg);
    }
}

#[test]
fn done_without_data_is_null() {
    let msg: Message = serde_json::from_value(json!({ "id": 2, "done": true })).unwrap();
    assert_eq!(msg, Message::reply(2, Response::Done(serde_json::Value::Null)));
}

#[test]
fn terminal_classification() {
    assert!(!Response::Progress(json!(null)).is_terminal());
    assert!(Response::Done(json!(null)).is_terminal());
    assert!(Response::Error(String::new()).is_terminal());
}
