use std::sync::Arc;

use beqwatch_core::types::Event;
use beqwatch_engine::EventOrchestrator;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, info_span};

/// An accepted webhook waiting for the worker.
#[derive(Debug)]
pub struct QueuedEvent {
    pub id: String,
    pub event: Event,
}

impl QueuedEvent {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event,
        }
    }
}

/// Drain the event queue in arrival order.
///
/// Only one worker exists, so events for a session reach the orchestrator in
/// the order the webhooks arrived. `play` is not awaited here: it waits on the
/// HDMI sync, and the pause/resume webhooks that wait provokes must still be
/// dispatched meanwhile.
pub async fn run(mut rx: mpsc::Receiver<QueuedEvent>, orchestrator: Arc<EventOrchestrator>) {
    while let Some(QueuedEvent { id, event }) = rx.recv().await {
        let action = event.action;
        let span = info_span!("event", id = %id, action = %action);
        let handle = orchestrator.dispatch(event).instrument(span.clone()).await;
        if let Some(handle) = handle {
            tokio::spawn(
                async move {
                    if let Err(e) = handle.await {
                        error!(error = %e, "event handler panicked");
                    }
                }
                .instrument(span),
            );
        }
    }
    info!("event queue closed, worker exiting");
}
