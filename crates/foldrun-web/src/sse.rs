//! Server-Sent Events (SSE) streaming of pipeline progress.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use foldrun_core::events::PipelineEvent;
use futures_core::Stream;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::state::SharedState;

/// SSE endpoint. Clients subscribe here for run progress; each event is
/// named after its `type` so browsers can attach per-kind listeners.
pub async fn sse_handler(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.subscribe();
    // Lagged receivers drop the missed events and keep streaming.
    let stream = BroadcastStream::new(rx).filter_map(|result| result.ok().and_then(|event| to_sse(&event)).map(Ok));

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

fn to_sse(event: &PipelineEvent) -> Option<Event> {
    match Event::default().event(event.kind()).json_data(event) {
        Ok(sse) => Some(sse),
        Err(e) => {
            warn!(kind = event.kind(), error = %e, "Dropping unserializable pipeline event");
            None
        }
    }
}
