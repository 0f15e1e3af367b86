//! Task and reply types exchanged between an orchestrator and a worker.
//!
//! The string-keyed wire shape only exists at the serde boundary:
//!
//! - task: `{"id": 7, "task": "trace_compute", "data": {..}}`
//! - progress: `{"id": 7, "done": false, "data": {..}}`
//! - done: `{"id": 7, "done": true, "data": {..}}`
//! - error: `{"id": 7, "error": "message"}`
//! - announcement: `{"bind": "trace_compute"}`

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sender-allocated task identifier.
pub type TaskId = u64;

/// Stable widget identifier shared by the orchestrator and its workers.
pub type WidgetId = u64;

/// A named unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Identifier replies are matched against.
    pub id: TaskId,
    /// Capability name selecting the handler.
    #[serde(rename = "task")]
    pub name: CompactString,
    /// Opaque payload.
    #[serde(default)]
    pub data: Value,
}

impl Task {
    /// Create a task.
    pub fn new(id: TaskId, name: impl Into<CompactString>, data: Value) -> Self {
        Self {
            id,
            name: name.into(),
            data,
        }
    }
}

/// One reply to a task.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Intermediate result; zero or more per task.
    Progress(Value),
    /// Terminal success.
    Done(Value),
    /// Terminal failure.
    Error(String),
}

impl Response {
    /// Whether this response ends its task.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Everything a worker sends back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Wire", into = "Wire")]
pub enum Message {
    /// A capability became available on the worker.
    Bound { name: CompactString },
    /// A reply to the task with the given id.
    Reply { id: TaskId, response: Response },
}

impl Message {
    /// Build a reply message.
    pub fn reply(id: TaskId, response: Response) -> Self {
        Self::Reply { id, response }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Wire {
    Bind {
        bind: CompactString,
    },
    Failure {
        id: TaskId,
        error: String,
    },
    Reply {
        id: TaskId,
        done: bool,
        #[serde(default)]
        data: Value,
    },
}

impl From<Message> for Wire {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Bound { name } => Wire::Bind { bind: name },
            Message::Reply { id, response } => match response {
                Response::Progress(data) => Wire::Reply {
                    id,
                    done: false,
                    data,
                },
                Response::Done(data) => Wire::Reply {
                    id,
                    done: true,
                    data,
                },
                Response::Error(error) => Wire::Failure { id, error },
            },
        }
    }
}

impl From<Wire> for Message {
    fn from(wire: Wire) -> Self {
        match wire {
            Wire::Bind { bind } => Message::Bound { name: bind },
            Wire::Failure { id, error } => Message::reply(id, Response::Error(error)),
            Wire::Reply { id, done, data } => {
                let response = if done {
                    Response::Done(data)
                } else {
                    Response::Progress(data)
                };
                Message::reply(id, response)
            }
        }
    }
}
