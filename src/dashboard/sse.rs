//! Server-sent log feed

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::Stream;
use tokio::sync::broadcast;

use super::state::DashboardState;
use crate::engine::RunEvent;

fn to_sse(event: &RunEvent) -> Event {
    let data = event.payload().to_string();
    match event.name() {
        Some(name) => Event::default().event(name).data(data),
        None => Event::default().data(data),
    }
}

/// `GET /api/feed`: replays the log history, then streams run events
pub async fn feed(
    State(state): State<DashboardState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.feed.subscribe();
    let history = state.history();

    let stream = async_stream::stream! {
        yield Ok(Event::default().comment("connected"));

        for line in history {
            yield Ok(to_sse(&RunEvent::Log(line)));
        }

        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(to_sse(&event)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Feed subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
