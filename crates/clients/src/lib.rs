//! Collaborators the orchestrator talks to, and their concrete clients.

pub mod denon;
pub mod homeassistant;
pub mod plex;

use beqwatch_core::config::SyncSource;
use beqwatch_core::types::{CodecName, Edition, Event, PlaybackAction};
use thiserror::Error;

pub use denon::DenonClient;
pub use homeassistant::HomeAssistantClient;
pub use plex::PlexClient;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{service} returned {status}")]
    Status { service: &'static str, status: u16 },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// What the media server knows about the item being played.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaDetails {
    /// `CodecName::Empty` when the item has no audio stream.
    pub codec: CodecName,
    pub edition: Edition,
    pub tmdb: Option<String>,
}

/// Metadata lookups against the media server that sent the event.
#[async_trait::async_trait]
pub trait MediaServer: Send + Sync {
    /// Look the item up once and derive codec, edition and TMDB id from it.
    async fn media_details(&self, event: &Event) -> Result<MediaDetails, ClientError>;
}

/// Remote control of the active player.
#[async_trait::async_trait]
pub trait PlaybackControl: Send + Sync {
    async fn playback(&self, action: PlaybackAction) -> Result<(), ClientError>;
}

/// AVR reporting the decoded surround mode.
#[async_trait::async_trait]
pub trait AvrCodecSource: Send + Sync {
    async fn surround_mode(&self) -> Result<String, ClientError>;
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), ClientError>;
}

/// Reads whether the display chain reports a locked signal.
#[async_trait::async_trait]
pub trait SignalReader: Send + Sync {
    async fn signal_present(&self, entity: &str, source: SyncSource) -> Result<bool, ClientError>;
}

/// Home automation event bus.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn fire_event(
        &self,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), ClientError>;
}
