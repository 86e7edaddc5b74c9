//! In-process publish/subscribe hub for live match events.
//!
//! A single worker task owns every subscriber queue. Callers talk to it over a
//! bounded intake channel, so subscribe, unsubscribe and publish are applied
//! one at a time in arrival order without any lock on the subscriber map.
//!
//! Delivery is at-most-once: nothing is persisted or replayed, a publisher
//! never waits longer than the publish timeout, and a subscriber that cannot
//! take an event within the delivery timeout misses that event but stays
//! subscribed.

use std::{collections::HashMap, time::SystemTime};

use thiserror::Error;
use tokio::{
    sync::{
        Mutex,
        mpsc::{self, error::SendTimeoutError},
        oneshot, watch,
    },
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::BrokerSettings,
    dto::{
        format_system_time,
        sse::{ConnectedEvent, EVENT_CONNECTED, ServerEvent},
    },
};

/// The broker worker has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("broadcast broker is shut down")]
pub struct BrokerClosed;

/// Registration handed to a stream. Dropping it does not unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    /// Subscriber identifier, needed to unsubscribe.
    pub id: Uuid,
    /// Match the subscription listens to.
    pub match_id: Uuid,
    /// Delivery queue; yields `None` once unsubscribed or shut down.
    pub receiver: mpsc::Receiver<ServerEvent>,
}

impl Subscription {
    /// Next delivered event.
    pub async fn recv(&mut self) -> Option<ServerEvent> {
        self.receiver.recv().await
    }
}

enum Command {
    Subscribe {
        match_id: Uuid,
        reply: oneshot::Sender<Subscription>,
    },
    Unsubscribe {
        match_id: Uuid,
        subscriber_id: Uuid,
    },
    Publish {
        match_id: Uuid,
        event: ServerEvent,
    },
    Count {
        match_id: Uuid,
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the broker worker.
pub struct Broker {
    intake: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    settings: BrokerSettings,
}

impl Broker {
    /// Spawn the worker on the current Tokio runtime.
    pub fn spawn(settings: BrokerSettings) -> Self {
        let (intake, commands) = mpsc::channel(settings.intake_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = Worker {
            subscribers: HashMap::new(),
            settings: settings.clone(),
        };
        let handle = tokio::spawn(worker.run(commands, shutdown_rx));

        Self {
            intake,
            shutdown,
            worker: Mutex::new(Some(handle)),
            settings,
        }
    }

    /// Register a new subscriber for `match_id`.
    ///
    /// The returned queue already holds the `connected` event.
    pub async fn subscribe(&self, match_id: Uuid) -> Result<Subscription, BrokerClosed> {
        let (reply, response) = oneshot::channel();
        self.intake
            .send(Command::Subscribe { match_id, reply })
            .await
            .map_err(|_| BrokerClosed)?;
        response.await.map_err(|_| BrokerClosed)
    }

    /// Remove a subscriber and close its queue. Unknown ids are ignored.
    pub async fn unsubscribe(&self, match_id: Uuid, subscriber_id: Uuid) {
        let command = Command::Unsubscribe {
            match_id,
            subscriber_id,
        };
        if self.intake.send(command).await.is_err() {
            debug!(%match_id, %subscriber_id, "unsubscribe after broker shutdown");
        }
    }

    /// Hand `event` to the worker for fan-out to subscribers of `match_id`.
    ///
    /// Waits at most the publish timeout for intake space, then drops the event.
    pub async fn publish(&self, match_id: Uuid, event: ServerEvent) {
        let event_name = event.event.clone();
        let command = Command::Publish { match_id, event };
        match self
            .intake
            .send_timeout(command, self.settings.publish_timeout)
            .await
        {
            Ok(()) => {}
            Err(SendTimeoutError::Timeout(_)) => {
                debug!(%match_id, event = %event_name, "broker intake full; event dropped");
            }
            Err(SendTimeoutError::Closed(_)) => {
                debug!(%match_id, event = %event_name, "broker shut down; event dropped");
            }
        }
    }

    /// Number of live subscribers for `match_id`; zero after shutdown.
    pub async fn subscriber_count(&self, match_id: Uuid) -> usize {
        let (reply, response) = oneshot::channel();
        if self
            .intake
            .send(Command::Count { match_id, reply })
            .await
            .is_err()
        {
            return 0;
        }
        response.await.unwrap_or(0)
    }

    /// Stop the worker, closing every subscriber queue. Later publishes are no-ops.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!(error = %err, "broker worker terminated abnormally");
            }
        }
    }
}

struct Worker {
    subscribers: HashMap<Uuid, HashMap<Uuid, mpsc::Sender<ServerEvent>>>,
    settings: BrokerSettings,
}

impl Worker {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
            }
        }

        let open: usize = self.subscribers.values().map(HashMap::len).sum();
        self.subscribers.clear();
        commands.close();
        info!(subscribers = open, "broadcast broker stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Subscribe { match_id, reply } => self.subscribe(match_id, reply),
            Command::Unsubscribe {
                match_id,
                subscriber_id,
            } => self.unsubscribe(match_id, subscriber_id),
            Command::Publish { match_id, event } => self.fan_out(match_id, event).await,
            Command::Count { match_id, reply } => {
                let _ = reply.send(self.count(match_id));
            }
        }
    }

    fn subscribe(&mut self, match_id: Uuid, reply: oneshot::Sender<Subscription>) {
        let subscriber_id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(self.settings.subscriber_capacity.max(1));

        let connected = ServerEvent::json(EVENT_CONNECTED, &ConnectedEvent {
            match_id,
            client_id: subscriber_id,
            timestamp: format_system_time(SystemTime::now()),
        });
        match connected {
            Ok(event) => {
                // Fresh queue with capacity >= 1.
                let _ = sender.try_send(event);
            }
            Err(err) => warn!(%match_id, error = %err, "failed to serialise connected event"),
        }

        let subscription = Subscription {
            id: subscriber_id,
            match_id,
            receiver,
        };
        if reply.send(subscription).is_err() {
            return;
        }

        self.subscribers
            .entry(match_id)
            .or_default()
            .insert(subscriber_id, sender);
        debug!(%match_id, %subscriber_id, clients = self.count(match_id), "subscriber added");
    }

    fn unsubscribe(&mut self, match_id: Uuid, subscriber_id: Uuid) {
        let Some(subscribers) = self.subscribers.get_mut(&match_id) else {
            return;
        };
        if subscribers.remove(&subscriber_id).is_some() {
            debug!(%match_id, %subscriber_id, "subscriber removed");
        }
        if subscribers.is_empty() {
            self.subscribers.remove(&match_id);
        }
    }

    async fn fan_out(&mut self, match_id: Uuid, event: ServerEvent) {
        let Some(subscribers) = self.subscribers.get_mut(&match_id) else {
            return;
        };

        let mut gone = Vec::new();
        for (subscriber_id, sender) in subscribers.iter() {
            match sender
                .send_timeout(event.clone(), self.settings.delivery_timeout)
                .await
            {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => {
                    debug!(
                        %match_id,
                        %subscriber_id,
                        event = %event.event,
                        "subscriber too slow; event skipped"
                    );
                }
                Err(SendTimeoutError::Closed(_)) => gone.push(*subscriber_id),
            }
        }

        for subscriber_id in gone {
            subscribers.remove(&subscriber_id);
        }
        if subscribers.is_empty() {
            self.subscribers.remove(&match_id);
        }
    }

    fn count(&self, match_id: Uuid) -> usize {
        self.subscribers.get(&match_id).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn settings(subscriber_capacity: usize) -> BrokerSettings {
        BrokerSettings {
            intake_capacity: 16,
            subscriber_capacity,
            publish_timeout: Duration::from_millis(100),
            delivery_timeout: Duration::from_secs(1),
        }
    }

    fn event(name: &str) -> ServerEvent {
        ServerEvent::new(name, "{}")
    }

    #[tokio::test]
    async fn connected_event_comes_first() {
        let broker = Broker::spawn(settings(4));
        let match_id = Uuid::new_v4();

        let mut subscription = broker.subscribe(match_id).await.unwrap();
        broker.publish(match_id, event("score_updated")).await;

        let first = subscription.recv().await.unwrap();
        assert_eq!(first.event, EVENT_CONNECTED);
        assert!(first.data.contains(&subscription.id.to_string()));
        assert_eq!(subscription.recv().await.unwrap().event, "score_updated");
    }

    #[tokio::test]
    async fn delivery_order_matches_publish_order() {
        let broker = Broker::spawn(settings(8));
        let match_id = Uuid::new_v4();
        let mut subscription = broker.subscribe(match_id).await.unwrap();

        for name in ["match_started", "goal_scored", "score_updated"] {
            broker.publish(match_id, event(name)).await;
        }

        subscription.recv().await.unwrap();
        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(subscription.recv().await.unwrap().event);
        }
        assert_eq!(received, ["match_started", "goal_scored", "score_updated"]);
    }

    #[tokio::test]
    async fn unsubscribed_client_receives_nothing_more() {
        let broker = Broker::spawn(settings(4));
        let match_id = Uuid::new_v4();
        let mut subscription = broker.subscribe(match_id).await.unwrap();

        broker.unsubscribe(match_id, subscription.id).await;
        broker.publish(match_id, event("score_updated")).await;

        assert_eq!(subscription.recv().await.unwrap().event, EVENT_CONNECTED);
        assert!(subscription.recv().await.is_none());
        assert_eq!(broker.subscriber_count(match_id).await, 0);

        // Idempotent.
        broker.unsubscribe(match_id, subscription.id).await;
    }

    #[tokio::test]
    async fn late_subscriber_gets_no_replay() {
        let broker = Broker::spawn(settings(4));
        let match_id = Uuid::new_v4();

        broker.publish(match_id, event("match_started")).await;
        let mut subscription = broker.subscribe(match_id).await.unwrap();
        broker.publish(match_id, event("score_updated")).await;

        assert_eq!(subscription.recv().await.unwrap().event, EVENT_CONNECTED);
        assert_eq!(subscription.recv().await.unwrap().event, "score_updated");
    }

    #[tokio::test]
    async fn events_are_isolated_per_match() {
        let broker = Broker::spawn(settings(4));
        let (first_match, second_match) = (Uuid::new_v4(), Uuid::new_v4());
        let mut first = broker.subscribe(first_match).await.unwrap();
        let mut second = broker.subscribe(second_match).await.unwrap();

        broker.publish(first_match, event("goal_scored")).await;
        broker.publish(second_match, event("match_ended")).await;

        first.recv().await.unwrap();
        second.recv().await.unwrap();
        assert_eq!(first.recv().await.unwrap().event, "goal_scored");
        assert_eq!(second.recv().await.unwrap().event, "match_ended");
        assert_eq!(broker.subscriber_count(first_match).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_subscriber_is_skipped_not_disconnected() {
        let broker = Broker::spawn(settings(1));
        let match_id = Uuid::new_v4();

        // Queue of one, already holding the connected event.
        let mut slow = broker.subscribe(match_id).await.unwrap();
        broker.publish(match_id, event("goal_scored")).await;
        // Commands are handled in order, so this returns after the fan-out above.
        assert_eq!(broker.subscriber_count(match_id).await, 1);

        assert_eq!(slow.recv().await.unwrap().event, EVENT_CONNECTED);
        broker.publish(match_id, event("score_updated")).await;
        assert_eq!(slow.recv().await.unwrap().event, "score_updated");
    }

    #[tokio::test(start_paused = true)]
    async fn publish_is_dropped_when_intake_stays_full() {
        let broker = Broker::spawn(BrokerSettings {
            intake_capacity: 1,
            ..settings(1)
        });
        let match_id = Uuid::new_v4();
        let mut slow = broker.subscribe(match_id).await.unwrap();

        // The worker blocks delivering this one; the queue still holds `connected`.
        broker.publish(match_id, event("match_started")).await;
        // Occupies the only intake slot.
        broker.publish(match_id, event("goal_scored")).await;

        let started = tokio::time::Instant::now();
        broker.publish(match_id, event("score_updated")).await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_secs(1));

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(slow.recv().await.unwrap().event);
        }
        assert_eq!(received, [EVENT_CONNECTED, "match_started", "goal_scored"]);
        assert_eq!(broker.subscriber_count(match_id).await, 1);
        assert!(slow.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn shutdown_closes_streams_and_ignores_publishes() {
        let broker = Broker::spawn(settings(4));
        let match_id = Uuid::new_v4();
        let mut subscription = broker.subscribe(match_id).await.unwrap();

        broker.shutdown().await;
        broker.publish(match_id, event("score_updated")).await;

        assert_eq!(subscription.recv().await.unwrap().event, EVENT_CONNECTED);
        assert!(subscription.recv().await.is_none());
        assert_eq!(broker.subscriber_count(match_id).await, 0);
        assert_eq!(broker.subscribe(match_id).await.unwrap_err(), BrokerClosed);
    }

    #[tokio::test]
    async fn dropped_receivers_are_pruned_on_publish() {
        let broker = Broker::spawn(settings(4));
        let match_id = Uuid::new_v4();
        let subscription = broker.subscribe(match_id).await.unwrap();
        drop(subscription);

        broker.publish(match_id, event("score_updated")).await;
        assert_eq!(broker.subscriber_count(match_id).await, 0);
    }
}
