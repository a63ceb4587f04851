pub mod autofix;
pub mod edition;
pub mod health;
pub mod issues;
pub mod scan;
pub mod schedules;
pub mod server;
pub mod settings;

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Bridge an engine event queue onto an SSE response. A keepalive line is
/// emitted when no event occurs within 30 seconds.
pub fn event_stream<T: Serialize + Send + 'static>(
    receiver: UnboundedReceiver<T>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = UnboundedReceiverStream::new(receiver).map(|event| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().comment("serialization error")))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keepalive"),
    )
}
