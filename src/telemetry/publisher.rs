//! # Telemetry Publisher
//!
//! One-way fan-out of telemetry events to any number of subscribers.
//!
//! Publishing never waits on a subscriber. Each attached subscriber runs on
//! its own task behind a bounded broadcast queue; a subscriber that falls
//! behind loses the oldest events and a subscriber that fails only logs.

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::TelemetryEvent;
use crate::error::Result;

/// Default number of events buffered per subscriber
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Consumer of telemetry events (UI bridge, CSV sink, map position feed)
pub trait TelemetrySubscriber: Send + 'static {
    /// Short name used in log messages
    fn name(&self) -> &str;

    /// Handle one event. Errors are logged and the subscriber keeps running.
    fn on_event(&mut self, event: &TelemetryEvent) -> Result<()>;
}

/// Broadcast hub for telemetry events
#[derive(Debug, Clone)]
pub struct TelemetryPublisher {
    sender: broadcast::Sender<TelemetryEvent>,
}

impl TelemetryPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Hand an event to all current subscribers without blocking
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: TelemetryEvent) -> usize {
        match self.sender.send(event) {
            Ok(count) => count,
            Err(_) => {
                debug!("No telemetry subscribers, event dropped");
                0
            }
        }
    }

    /// Raw receiver for consumers that drive their own loop
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Run a subscriber on its own task until the publisher is dropped
    pub fn attach<S: TelemetrySubscriber>(&self, mut subscriber: S) -> JoinHandle<()> {
        let mut receiver = self.sender.subscribe();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Err(e) = subscriber.on_event(&event) {
                            warn!("Subscriber {} failed: {}", subscriber.name(), e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Subscriber {} lagged, skipped {} events", subscriber.name(), skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Publisher closed, stopping subscriber {}", subscriber.name());
                        break;
                    }
                }
            }
        })
    }
}

impl Default for TelemetryPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
