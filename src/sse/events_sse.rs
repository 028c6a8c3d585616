use crate::error::ForumError;
use crate::sse::models::{ForumEvent, Frame};
use crate::sse::sse_broadcaster::{ConnectionId, EventBroadcaster};
use crate::startup::AppState;
use axum::{
    extract::Extension,
    http::HeaderName,
    response::{
        IntoResponse,
        sse::{Event, Sse},
    },
};
use std::{convert::Infallible, sync::Arc};
use tokio::sync::mpsc;

/// Frames a subscriber may fall behind by before it is treated as dead.
const SUBSCRIBER_BUFFER: usize = 64;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Unregisters the stream when the response body is dropped.
struct Subscription {
    connection_id: ConnectionId,
    events: Arc<EventBroadcaster>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.events.unregister(&self.connection_id);
    }
}

pub async fn events_sse(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, ForumError> {
    let sse_config = &app_state.config.sse;
    if !sse_config.enabled {
        return Err(ForumError::EventStreamDisabled);
    }

    let events = app_state.events.clone();
    let greeting = Event::default()
        .json_data(ForumEvent::Connected)
        .map_err(|e| {
            error!("Failed to encode connected event: {e}");
            ForumError::Internal
        })?;

    let (tx, mut rx) = mpsc::channel::<Frame>(SUBSCRIBER_BUFFER);
    let Some(connection_id) = events.try_register(Box::new(tx), sse_config.max_clients) else {
        warn!("Refusing event stream, {} already open", events.count());
        return Err(ForumError::TooManyConnections);
    };
    let subscription = Subscription {
        connection_id,
        events,
    };
    let max_lifetime = sse_config.max_lifetime;

    let stream = async_stream::stream! {
        let _subscription = subscription;
        yield Ok::<Event, Infallible>(greeting);

        let expiry = tokio::time::sleep(max_lifetime);
        tokio::pin!(expiry);

        loop {
            let next = tokio::select! {
                frame = rx.recv() => frame,
                _ = &mut expiry => None,
            };

            match next {
                Some(frame) => yield Ok(Event::from(frame)),
                None => break,
            }
        }
    };

    Ok(([(X_ACCEL_BUFFERING, "no")], Sse::new(stream)))
}
