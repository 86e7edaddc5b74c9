//! Stream-serving boundary: turns a broker subscription into an SSE response.

use std::{
    convert::Infallible,
    time::{Duration, SystemTime},
};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        format_system_time,
        sse::{EVENT_HEARTBEAT, HeartbeatEvent, ServerEvent},
    },
    error::ServiceError,
    state::{SharedState, Subscription},
};

/// Subscribe to `match_id` after checking that the match exists.
pub async fn subscribe_match(
    state: &SharedState,
    match_id: Uuid,
) -> Result<Subscription, ServiceError> {
    let store = state.require_match_store().await?;
    store.get_by_id(match_id).await?;
    Ok(state.broker().subscribe(match_id).await?)
}

/// Convert a subscription into an SSE response.
///
/// A forwarder task relays broker events, interleaves heartbeats, and
/// unsubscribes once the client goes away or the broker closes the queue.
pub fn to_sse_stream(
    state: SharedState,
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<ServerEvent>(8);
    let settings = state.config().stream.clone();

    tokio::spawn(forward(state, subscription, tx, settings.heartbeat_interval));

    let stream = ReceiverStream::new(rx).map(|payload| {
        Ok::<_, Infallible>(Event::default().event(payload.event).data(payload.data))
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(settings.keep_alive)
            .text("keep-alive"),
    )
}

/// Relay loop; returns after unsubscribing.
pub async fn forward(
    state: SharedState,
    mut subscription: Subscription,
    tx: mpsc::Sender<ServerEvent>,
    heartbeat_every: Duration,
) {
    let match_id = subscription.match_id;
    let mut heartbeat = interval_at(Instant::now() + heartbeat_every, heartbeat_every);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = tx.closed() => break,
            received = subscription.recv() => match received {
                Some(payload) => {
                    if tx.send(payload).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = heartbeat.tick() => {
                let clients = state.broker().subscriber_count(match_id).await;
                let payload = HeartbeatEvent {
                    timestamp: format_system_time(SystemTime::now()),
                    clients,
                };
                match ServerEvent::json(EVENT_HEARTBEAT, &payload) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(%match_id, error = %err, "failed to serialise heartbeat"),
                }
            }
        }
    }

    state
        .broker()
        .unsubscribe(match_id, subscription.id)
        .await;
    info!(%match_id, subscriber_id = %subscription.id, "match stream disconnected");
}
