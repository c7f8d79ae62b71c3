use std::sync::Arc;
use std::time::Duration;

use beqwatch_core::config::Config;
use beqwatch_core::types::Device;
use beqwatch_engine::{Collaborators, EventOrchestrator, StatusEvent};
use tokio::sync::{broadcast, mpsc};

use crate::webhook::WebhookFilters;
use crate::worker::QueuedEvent;

/// How long a webhook may wait for room in the event queue.
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(3);

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<EventOrchestrator>,
    pub queue: mpsc::Sender<QueuedEvent>,
    pub status: broadcast::Sender<StatusEvent>,
    /// Devices discovered at startup.
    pub devices: Arc<Vec<Device>>,
    pub filters: Arc<WebhookFilters>,
    pub enqueue_timeout: Duration,
}

impl AppState {
    /// Wire the orchestrator and spawn the event worker that feeds it.
    pub fn start(config: &Config, collaborators: Collaborators, devices: Vec<Device>) -> Self {
        let (status, _) = broadcast::channel(256);
        let names = devices.iter().map(|d| d.name.clone()).collect();
        let orchestrator = EventOrchestrator::new(config, names, collaborators, status.clone());

        let (queue, rx) = mpsc::channel(config.server.event_queue);
        tokio::spawn(crate::worker::run(rx, Arc::clone(&orchestrator)));

        Self {
            orchestrator,
            queue,
            status,
            devices: Arc::new(devices),
            filters: Arc::new(WebhookFilters::from_config(&config.plex)),
            enqueue_timeout: ENQUEUE_TIMEOUT,
        }
    }
}
