//! The `GET /deltas` SSE feed.
//!
//! Bridges the resolver's broadcast broker onto one `text/event-stream`
//! response per subscriber. Each delta becomes a named SSE event. A
//! subscriber that falls behind the broker's buffer gets a `gap` event
//! with the missed count and must refetch whatever it renders before
//! trusting the stream again.

use andon_core::{
  delta::Delta,
  store::{HierarchyStore, IssueStore},
};
use axum::{
  extract::State,
  response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::{
  Stream, StreamExt as _,
  wrappers::{BroadcastStream, errors::BroadcastStreamRecvError},
};

use crate::{AppState, auth::Authenticated};

pub async fn stream<S>(
  State(state): State<AppState<S>>,
  _auth: Authenticated,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static>
where
  S: HierarchyStore + IssueStore + Clone + Send + Sync + 'static,
{
  let receiver = state.resolver.broker().subscribe();
  let events = BroadcastStream::new(receiver).map(|next| {
    let delta = match next {
      Ok(delta) => delta,
      Err(BroadcastStreamRecvError::Lagged(missed)) => Delta::Gap { missed },
    };
    Event::default().event(delta.kind()).json_data(&delta)
  });
  Sse::new(events).keep_alive(KeepAlive::default())
}
