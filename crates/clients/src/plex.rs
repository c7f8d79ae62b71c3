//! Plex Media Server client.
//!
//! Item metadata comes from the server's JSON API; playback commands go to the
//! player itself on port 32500.

use std::time::Duration;

use async_trait::async_trait;
use beqwatch_core::config::PlexConfig;
use beqwatch_core::types::{CodecName, Edition, Event, PlaybackAction};
use beqwatch_media::{codec, edition, ids};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{ClientError, MediaDetails, MediaServer, PlaybackControl};

const PLAYER_PORT: u16 = 32500;
const AUDIO_STREAM: u32 = 2;

pub struct PlexClient {
    base_url: String,
    token: String,
    player_address: String,
    player_machine_id: String,
    client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
struct LibraryResponse {
    #[serde(rename = "MediaContainer", default)]
    container: MediaContainer,
}

#[derive(Debug, Default, Deserialize)]
struct MediaContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<LibraryItem>,
}

/// The subset of a Plex library item this service uses.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub edition_title: String,
    #[serde(rename = "Guid", default)]
    pub guids: Vec<Guid>,
    #[serde(rename = "Media", default)]
    pub media: Vec<Media>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Guid {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Media {
    #[serde(rename = "Part", default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub file: String,
    #[serde(rename = "Stream", default)]
    pub streams: Vec<Stream>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    #[serde(default)]
    pub stream_type: u32,
    #[serde(default)]
    pub display_title: String,
    #[serde(default)]
    pub extended_display_title: String,
}

impl LibraryItem {
    fn first_part(&self) -> Option<&Part> {
        self.media.first().and_then(|m| m.parts.first())
    }

    pub fn file_name(&self) -> &str {
        self.first_part().map(|p| p.file.as_str()).unwrap_or("")
    }

    /// First audio stream of the first part; that is the track being played.
    pub fn audio_stream(&self) -> Option<&Stream> {
        self.first_part()?
            .streams
            .iter()
            .find(|s| s.stream_type == AUDIO_STREAM)
    }

    pub fn audio_codec(&self) -> Option<CodecName> {
        let file = self.file_name();
        let file = (!file.is_empty()).then_some(file);
        self.audio_stream().map(|s| {
            codec::normalize_with_file(&s.display_title, &s.extended_display_title, file)
        })
    }

    pub fn edition(&self) -> Edition {
        edition::resolve(&self.edition_title, self.file_name())
    }

    pub fn tmdb_id(&self) -> Option<String> {
        ids::extract_tmdb_id(self.guids.iter().map(|g| g.id.as_str()))
    }
}

impl PlexClient {
    pub fn new(config: &PlexConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            player_address: config.player_address.clone(),
            player_machine_id: config.player_machine_id.clone(),
            client,
        }
    }

    /// Fetch library metadata for the item in `event`.
    pub async fn library_item(&self, event: &Event) -> Result<LibraryItem, ClientError> {
        let key = &event.metadata.key;
        if key.is_empty() {
            return Err(ClientError::Protocol("event has no library key".into()));
        }
        if self.base_url.is_empty() {
            return Err(ClientError::NotConfigured("plex url".into()));
        }

        let url = format!("{}{}", self.base_url, key);
        debug!(url = %url, "Plex metadata request");

        let resp = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Plex-Token", &self.token)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClientError::Status {
                service: "plex",
                status: resp.status().as_u16(),
            });
        }

        let body: LibraryResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::Decode(format!("plex metadata: {e}")))?;

        body.container
            .metadata
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Protocol(format!("no metadata for {key}")))
    }

    fn player_base(&self) -> Result<String, ClientError> {
        let addr = self.player_address.trim().trim_end_matches('/');
        if addr.is_empty() {
            return Err(ClientError::NotConfigured("plex player address".into()));
        }
        if addr.contains("://") {
            Ok(addr.to_string())
        } else {
            Ok(format!("http://{addr}:{PLAYER_PORT}"))
        }
    }
}

#[async_trait]
impl MediaServer for PlexClient {
    async fn media_details(&self, event: &Event) -> Result<MediaDetails, ClientError> {
        let item = self.library_item(event).await?;
        let codec = item.audio_codec().unwrap_or_else(|| {
            warn!(title = %item.title, "no audio stream in plex metadata");
            CodecName::Empty
        });
        let details = MediaDetails {
            codec,
            edition: item.edition(),
            tmdb: item.tmdb_id(),
        };
        debug!(title = %item.title, codec = %details.codec, edition = %details.edition, "details from plex metadata");
        Ok(details)
    }
}

#[async_trait]
impl PlaybackControl for PlexClient {
    async fn playback(&self, action: PlaybackAction) -> Result<(), ClientError> {
        // The target identifier must be the player's machine id, not the server's.
        let url = format!("{}/player/playback/{}", self.player_base()?, action.as_str());
        debug!(url = %url, action = %action, "Plex playback command");

        let resp = self
            .client
            .get(&url)
            .query(&[("X-Plex-Target-Client-Identifier", &self.player_machine_id)])
            .header("X-Plex-Token", &self.token)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClientError::Status {
                service: "plex player",
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}
