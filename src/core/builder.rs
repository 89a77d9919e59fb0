//! # Orchestrator construction.
//!
//! [`OrchestratorBuilder`] collects the configuration, the backend and the
//! event subscribers. `build` creates the bus and, when subscribers are set,
//! spawns the listener that fans bus events out to them.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::orchestrator::Orchestrator;
use crate::{
    call::ControlRef,
    config::Config,
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    cfg: Config,
    control: ControlRef,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl OrchestratorBuilder {
    pub fn new(cfg: Config, control: ControlRef) -> Self {
        Self {
            cfg,
            control,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive lifecycle events through dedicated workers with
    /// bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Builds the orchestrator and starts the subscriber listener.
    ///
    /// Must be called from within a Tokio runtime when subscribers are set.
    pub fn build(self) -> Arc<Orchestrator> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        if !self.subscribers.is_empty() {
            subscriber_listener(&bus, SubscriberSet::new(self.subscribers));
        }
        Arc::new(Orchestrator::new_internal(
            self.cfg,
            self.control,
            bus,
            CancellationToken::new(),
        ))
    }
}

/// Forwards bus events to the subscriber set until the bus closes.
fn subscriber_listener(bus: &Bus, set: SubscriberSet) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => set.emit(&ev),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "subscriber listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        set.shutdown().await;
    });
}
