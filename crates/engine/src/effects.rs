//! Fire-and-forget side effects around playback: lights, volume hints,
//! status broadcasts and notifications.
//!
//! Nothing here is awaited by the orchestrator. Each effect runs in its own
//! task and logs its own failure.

use std::sync::Arc;

use beqwatch_clients::{EventSink, Notifier};
use beqwatch_core::types::{CodecName, MediaType, SessionKey};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Status changes published to in-process subscribers (the SSE stream).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum StatusEvent {
    #[serde(rename = "playing")]
    Playing { player_uuid: String, playing: bool },
    #[serde(rename = "lights")]
    Lights { on: bool },
    #[serde(rename = "volume_hint")]
    VolumeHint { media_type: MediaType },
    #[serde(rename = "profile_loaded")]
    ProfileLoaded {
        player_uuid: String,
        title: String,
        codec: CodecName,
        entry_id: String,
        dry_run: bool,
    },
    #[serde(rename = "profile_unloaded")]
    ProfileUnloaded { player_uuid: String },
    #[serde(rename = "sync_started")]
    SyncStarted { player_uuid: String },
    #[serde(rename = "sync_finished")]
    SyncFinished { player_uuid: String, outcome: String },
}

pub const LIGHTS_EVENT: &str = "beqwatch_lights";
pub const VOLUME_EVENT: &str = "beqwatch_volume";
pub const PLAYING_EVENT: &str = "beqwatch_playing";

pub struct AmbientEffects {
    sink: Option<Arc<dyn EventSink>>,
    notifier: Option<Arc<dyn Notifier>>,
    trigger_lights: bool,
    trigger_volume: bool,
    status: broadcast::Sender<StatusEvent>,
}

impl AmbientEffects {
    pub fn new(
        sink: Option<Arc<dyn EventSink>>,
        notifier: Option<Arc<dyn Notifier>>,
        trigger_lights: bool,
        trigger_volume: bool,
        status: broadcast::Sender<StatusEvent>,
    ) -> Self {
        Self {
            sink,
            notifier,
            trigger_lights,
            trigger_volume,
            status,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.status.subscribe()
    }

    /// Broadcast to subscribers. No subscribers is fine.
    pub fn publish(&self, event: StatusEvent) {
        if self.status.send(event).is_err() {
            debug!("no status subscribers");
        }
    }

    fn fire(&self, event_type: &'static str, data: serde_json::Value) {
        let Some(sink) = self.sink.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = sink.fire_event(event_type, data).await {
                warn!(event_type, error = %e, "failed to fire home automation event");
            }
        });
    }

    pub fn lights(&self, on: bool) {
        self.publish(StatusEvent::Lights { on });
        if self.trigger_lights {
            self.fire(LIGHTS_EVENT, json!({ "state": if on { "on" } else { "off" } }));
        }
    }

    pub fn volume_hint(&self, media_type: MediaType) {
        self.publish(StatusEvent::VolumeHint { media_type });
        if self.trigger_volume {
            self.fire(VOLUME_EVENT, json!({ "media_type": media_type.as_str() }));
        }
    }

    pub fn playing_status(&self, key: &SessionKey, playing: bool) {
        self.publish(StatusEvent::Playing {
            player_uuid: key.player_uuid.clone(),
            playing,
        });
        self.fire(
            PLAYING_EVENT,
            json!({ "player_uuid": key.player_uuid, "playing": playing }),
        );
    }

    pub fn notify(&self, message: String) {
        let Some(notifier) = self.notifier.clone() else {
            debug!(message = %message, "no notifier configured");
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&message).await {
                warn!(error = %e, "failed to send notification");
            }
        });
    }
}
