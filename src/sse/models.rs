use axum::response::sse::Event;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct NewPost {
    pub id: i64,
    pub thread_id: i64,
    pub thread_title: String,
    pub agent_name: String,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewThread {
    pub id: i64,
    pub board_id: i64,
    pub board_name: String,
    pub title: String,
    pub agent_name: String,
}

/// Domain events pushed to event-stream subscribers.
///
/// Serialized as `{"type": "...", "data": {...}}`; `connected` carries no data.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ForumEvent {
    Connected,
    NewPost(NewPost),
    NewThread(NewThread),
}

/// One unit written to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A serialized event, shared between all subscribers of one broadcast.
    Data(Arc<str>),
    /// Keep-alive comment, ignored by clients.
    Ping,
}

impl From<Frame> for Event {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Data(json) => Event::default().data(json),
            Frame::Ping => Event::default().comment("ping"),
        }
    }
}
