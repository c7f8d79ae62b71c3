//! Recording fakes for the orchestrator's collaborators.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use beqwatch_clients::{
    AvrCodecSource, ClientError, MediaDetails, MediaServer, Notifier, PlaybackControl,
    SignalReader,
};
use beqwatch_core::config::SyncSource;
use beqwatch_core::types::{
    Action, CodecName, Device, Edition, Event, MediaType, Metadata, PlaybackAction, SearchRequest,
};
use beqwatch_ezbeq::{EzBeqError, LoadedProfile, ProfileBackend};

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileCall {
    Load { searched: bool, entry_id: String, codec: CodecName },
    Unload,
}

/// Records device writes in the order they complete.
#[derive(Default)]
pub struct FakeProfiles {
    pub calls: Mutex<Vec<ProfileCall>>,
    pub not_found: bool,
    /// How long a catalog search takes.
    pub search_delay: Duration,
    /// How long writing a profile to the devices takes.
    pub apply_delay: Duration,
}

impl FakeProfiles {
    pub fn calls(&self) -> Vec<ProfileCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn loads(&self) -> Vec<ProfileCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ProfileCall::Load { .. }))
            .collect()
    }

    pub fn unload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ProfileCall::Unload))
            .count()
    }
}

#[async_trait]
impl ProfileBackend for FakeProfiles {
    async fn resolve_profile(&self, req: &mut SearchRequest) -> Result<LoadedProfile, EzBeqError> {
        if !req.has_cached_profile() {
            req.skip_search = false;
        }
        let searched = !req.skip_search;
        if searched {
            tokio::time::sleep(self.search_delay).await;
            if self.not_found {
                return Err(EzBeqError::NotFoundInCatalog);
            }
            req.entry_id = format!("entry-{}", req.tmdb);
            req.mv_adjust = -1.5;
        }
        Ok(LoadedProfile {
            entry_id: req.entry_id.clone(),
            mv_adjust: req.mv_adjust,
            codec: req.codec,
            title: req.title.clone(),
            author: String::new(),
            searched,
            dry_run: req.dry_run,
        })
    }

    async fn apply_profile(
        &self,
        _req: &SearchRequest,
        profile: &LoadedProfile,
    ) -> Result<(), EzBeqError> {
        tokio::time::sleep(self.apply_delay).await;
        self.calls.lock().unwrap().push(ProfileCall::Load {
            searched: profile.searched,
            entry_id: profile.entry_id.clone(),
            codec: profile.codec,
        });
        Ok(())
    }

    async fn unload_profile(&self, _req: &SearchRequest) -> Result<(), EzBeqError> {
        self.calls.lock().unwrap().push(ProfileCall::Unload);
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, EzBeqError> {
        Ok(vec![Device {
            name: "minidsp".into(),
            ..Default::default()
        }])
    }
}

#[derive(Default)]
pub struct FakePlayer {
    pub actions: Mutex<Vec<PlaybackAction>>,
}

impl FakePlayer {
    pub fn actions(&self) -> Vec<PlaybackAction> {
        self.actions.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaybackControl for FakePlayer {
    async fn playback(&self, action: PlaybackAction) -> Result<(), ClientError> {
        self.actions.lock().unwrap().push(action);
        Ok(())
    }
}

pub struct FakeMediaServer {
    pub codec: CodecName,
    pub edition: Edition,
    pub tmdb: Option<String>,
    pub lookups: Mutex<usize>,
}

impl FakeMediaServer {
    pub fn new(codec: CodecName, edition: Edition, tmdb: Option<&str>) -> Self {
        Self {
            codec,
            edition,
            tmdb: tmdb.map(str::to_string),
            lookups: Mutex::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl MediaServer for FakeMediaServer {
    async fn media_details(&self, _event: &Event) -> Result<MediaDetails, ClientError> {
        *self.lookups.lock().unwrap() += 1;
        Ok(MediaDetails {
            codec: self.codec,
            edition: self.edition,
            tmdb: self.tmdb.clone(),
        })
    }
}

/// An AVR that always reports the same surround mode.
pub struct FakeAvr {
    pub mode: String,
}

#[async_trait]
impl AvrCodecSource for FakeAvr {
    async fn surround_mode(&self) -> Result<String, ClientError> {
        Ok(self.mode.clone())
    }
}

/// Replays scripted answers; the last one repeats.
pub struct ScriptedSignal {
    pub answers: Mutex<VecDeque<Result<bool, String>>>,
    pub reads: Mutex<usize>,
}

impl ScriptedSignal {
    pub fn new(answers: Vec<Result<bool, String>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            reads: Mutex::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }
}

#[async_trait]
impl SignalReader for ScriptedSignal {
    async fn signal_present(&self, _entity: &str, _source: SyncSource) -> Result<bool, ClientError> {
        *self.reads.lock().unwrap() += 1;
        let mut answers = self.answers.lock().unwrap();
        let answer = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().cloned()
        };
        match answer {
            Some(Ok(v)) => Ok(v),
            Some(Err(e)) => Err(ClientError::Network(e)),
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub messages: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn notify(&self, message: &str) -> Result<(), ClientError> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

pub fn event(action: Action, media_type: MediaType, codec: &str) -> Event {
    Event {
        action,
        server_uuid: "server-1".into(),
        player_uuid: "player-1".into(),
        account_id: "1".into(),
        metadata: Metadata {
            media_type,
            title: "Dune".into(),
            year: 2021,
            key: "/library/metadata/42".into(),
            codec: codec.into(),
            tmdb: Some("438631".into()),
            ..Default::default()
        },
    }
}

pub fn movie(action: Action) -> Event {
    event(action, MediaType::Movie, "Atmos")
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
