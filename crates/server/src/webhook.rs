//! Plex webhook payloads and the filters applied before an event is queued.

use beqwatch_core::config::PlexConfig;
use beqwatch_core::types::{Action, Event, MediaType, Metadata, string_or_number};
use beqwatch_media::ids;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PlexWebhook {
    pub event: String,
    #[serde(rename = "Account", default)]
    pub account: PlexAccount,
    #[serde(rename = "Server", default)]
    pub server: PlexServer,
    #[serde(rename = "Player", default)]
    pub player: PlexPlayer,
    #[serde(rename = "Metadata", default)]
    pub metadata: PlexMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlexAccount {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlexServer {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlexPlayer {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "publicAddress", default)]
    pub public_address: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlexMetadata {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub key: String,
    /// Agent GUID, e.g. `plex://movie/5d77...` or a legacy themoviedb agent URI.
    #[serde(default)]
    pub guid: String,
    #[serde(rename = "Guid", default)]
    pub guids: Vec<PlexGuid>,
    #[serde(rename = "editionTitle", default)]
    pub edition_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlexGuid {
    #[serde(default)]
    pub id: String,
}

impl PlexWebhook {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn into_event(self) -> Event {
        let meta = self.metadata;
        let tmdb = ids::extract_tmdb_id(
            meta.guids
                .iter()
                .map(|g| g.id.as_str())
                .chain(std::iter::once(meta.guid.as_str())),
        );
        Event {
            action: Action::from_plex_event(&self.event),
            server_uuid: self.server.uuid,
            player_uuid: self.player.uuid,
            account_id: self.account.id,
            metadata: Metadata {
                media_type: MediaType::from_label(&meta.kind),
                title: meta.title,
                year: meta.year,
                key: meta.key,
                tmdb,
                edition_title: meta.edition_title.filter(|e| !e.is_empty()),
                ..Default::default()
            },
        }
    }
}

/// Why a webhook was accepted but not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    UnsupportedEvent,
    UnsupportedMediaType,
    PlayerNotAllowed,
    OwnerMismatch,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookFilters {
    /// Empty allows every player.
    pub device_uuids: Vec<String>,
    /// Empty allows every account.
    pub owner_name: String,
}

impl WebhookFilters {
    pub fn from_config(config: &PlexConfig) -> Self {
        Self {
            device_uuids: config.device_uuid_filter.clone(),
            owner_name: config.owner_name_filter.clone(),
        }
    }

    pub fn check(&self, hook: &PlexWebhook) -> Result<(), IgnoreReason> {
        if !self.device_uuids.is_empty() && !self.device_uuids.iter().any(|u| *u == hook.player.uuid) {
            return Err(IgnoreReason::PlayerNotAllowed);
        }
        if !self.owner_name.is_empty() && !self.owner_name.eq_ignore_ascii_case(&hook.account.title) {
            return Err(IgnoreReason::OwnerMismatch);
        }
        Ok(())
    }
}

/// Checks that apply to any decoded event, whatever the source.
pub fn check_event(event: &Event) -> Result<(), IgnoreReason> {
    if event.action == Action::Unknown {
        return Err(IgnoreReason::UnsupportedEvent);
    }
    match event.metadata.media_type {
        MediaType::Movie | MediaType::Episode => Ok(()),
        MediaType::Other => Err(IgnoreReason::UnsupportedMediaType),
    }
}
