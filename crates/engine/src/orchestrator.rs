//! Routes playback events to handlers and sequences codec lookup, catalog
//! search, profile load/unload and the HDMI sync wait for each session.
//!
//! Events for one session must arrive in order; the server feeds them from a
//! single worker. `play` runs in its own task so that the pause/resume
//! webhooks caused by the sync wait can be seen (and ignored) meanwhile.
//!
//! Device writes (load and unload) are serialized. A load re-checks its ticket
//! after taking the write lock, so a `stop` or `pause` that cancelled it while
//! the catalog search was running always has the last word on the devices.

use std::sync::Arc;

use beqwatch_clients::{
    AvrCodecSource, EventSink, MediaDetails, MediaServer, Notifier, PlaybackControl, SignalReader,
};
use beqwatch_core::config::{Config, EzBeqConfig};
use beqwatch_core::types::{
    Action, CodecName, Event, MediaType, PlaybackAction, SearchRequest, SessionKey,
    SessionState,
};
use beqwatch_ezbeq::{EzBeqError, ProfileBackend};
use beqwatch_media::{codec, edition};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::effects::{AmbientEffects, StatusEvent};
use crate::hdmi_sync::{HdmiSyncCoordinator, SyncOutcome};
use crate::session::{SessionManager, SessionSnapshot, SessionTicket};

/// External services. `None` means the integration is disabled.
#[derive(Default, Clone)]
pub struct Collaborators {
    pub profiles: Option<Arc<dyn ProfileBackend>>,
    pub media_server: Option<Arc<dyn MediaServer>>,
    pub player: Option<Arc<dyn PlaybackControl>>,
    pub avr: Option<Arc<dyn AvrCodecSource>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub signal: Option<Arc<dyn SignalReader>>,
    pub events: Option<Arc<dyn EventSink>>,
}

pub struct EventOrchestrator {
    ezbeq: EzBeqConfig,
    devices: Vec<String>,
    sessions: Arc<SessionManager>,
    sync: HdmiSyncCoordinator,
    effects: AmbientEffects,
    profiles: Option<Arc<dyn ProfileBackend>>,
    media_server: Option<Arc<dyn MediaServer>>,
    player: Option<Arc<dyn PlaybackControl>>,
    avr: Option<Arc<dyn AvrCodecSource>>,
    device_writes: Mutex<()>,
}

impl EventOrchestrator {
    pub fn new(
        config: &Config,
        devices: Vec<String>,
        collaborators: Collaborators,
        status: broadcast::Sender<StatusEvent>,
    ) -> Arc<Self> {
        let sessions = Arc::new(SessionManager::new());
        let sync = HdmiSyncCoordinator::new(
            config.hdmi_sync.clone(),
            collaborators.player.clone(),
            collaborators.signal.clone(),
            Arc::clone(&sessions),
        );
        let effects = AmbientEffects::new(
            collaborators.events.clone(),
            collaborators.notifier.clone(),
            config.home_assistant.trigger_lights,
            config.home_assistant.trigger_volume,
            status,
        );
        Arc::new(Self {
            ezbeq: config.ezbeq.clone(),
            devices,
            sessions,
            sync,
            effects,
            profiles: collaborators.profiles,
            media_server: collaborators.media_server,
            player: collaborators.player,
            avr: collaborators.avr,
            device_writes: Mutex::new(()),
        })
    }

    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        self.sessions.snapshot().await
    }

    pub async fn session_state(&self, key: &SessionKey) -> SessionState {
        self.sessions.state(key).await
    }

    /// Route one event.
    ///
    /// Session state changes are applied before this returns. `play` continues in
    /// a spawned task whose handle is returned; other actions complete inline.
    pub async fn dispatch(self: &Arc<Self>, event: Event) -> Option<JoinHandle<()>> {
        let key = event.session_key();
        debug!(action = %event.action, session = %key, title = %event.metadata.title, "dispatching event");

        match event.action {
            Action::Play => {
                let initial = if self.sync.enabled() {
                    SessionState::SyncingHdmi
                } else {
                    SessionState::Playing
                };
                let ticket = self.sessions.begin_play(&key, initial).await;
                let this = Arc::clone(self);
                Some(tokio::spawn(async move { this.handle_play(event, ticket).await }))
            }
            Action::Pause => {
                self.handle_pause(&key).await;
                None
            }
            Action::Resume => {
                self.handle_resume(&event).await;
                None
            }
            Action::Stop => {
                self.handle_stop(&key).await;
                None
            }
            Action::Scrobble => {
                self.handle_scrobble(&key).await;
                None
            }
            Action::Unknown => {
                debug!(session = %key, "dropping unsupported action");
                None
            }
        }
    }

    async fn handle_play(self: Arc<Self>, event: Event, ticket: SessionTicket) {
        info!(session = %ticket.key, title = %event.metadata.title, year = event.metadata.year, "play");
        self.effects.lights(false);
        self.effects.volume_hint(event.metadata.media_type);
        self.effects.playing_status(&ticket.key, true);

        let use_avr = self.ezbeq.use_avr_codec && self.avr.is_some();
        // The AVR can only report the codec once the chain has locked.
        let sync = if use_avr {
            self.run_sync(&ticket).await;
            None
        } else {
            Some(self.spawn_sync(&ticket))
        };

        self.play_profile(&event, &ticket, use_avr).await;

        if let Some(handle) = sync {
            if let Err(e) = handle.await {
                error!(session = %ticket.key, error = %e, "HDMI sync task failed");
            }
        }
    }

    fn spawn_sync(self: &Arc<Self>, ticket: &SessionTicket) -> JoinHandle<SyncOutcome> {
        let this = Arc::clone(self);
        let ticket = ticket.clone();
        tokio::spawn(async move { this.run_sync(&ticket).await })
    }

    async fn run_sync(&self, ticket: &SessionTicket) -> SyncOutcome {
        if !self.sync.enabled() {
            return SyncOutcome::Disabled;
        }
        self.effects.publish(StatusEvent::SyncStarted {
            player_uuid: ticket.key.player_uuid.clone(),
        });
        let outcome = self.sync.wait_for_sync(ticket).await;
        self.effects.publish(StatusEvent::SyncFinished {
            player_uuid: ticket.key.player_uuid.clone(),
            outcome: outcome.as_str().to_string(),
        });
        outcome
    }

    async fn play_profile(&self, event: &Event, ticket: &SessionTicket, use_avr: bool) {
        let Some(profiles) = self.profiles.as_deref() else {
            return;
        };

        if !self.sessions.is_current(ticket).await {
            debug!(session = %ticket.key, "play superseded before unload");
            return;
        }
        // a movie profile must never survive into the next title
        self.unload(profiles, &ticket.key, &self.base_request(event)).await;

        let Some(mut req) = self.resolve_request(event, Some(ticket), use_avr).await else {
            return;
        };

        if !self.sessions.is_current(ticket).await {
            debug!(session = %ticket.key, "play superseded before load");
            return;
        }
        self.load(profiles, ticket, &mut req).await;
    }

    /// Resolve codec, edition and TMDB id into a load request.
    /// `None` means no profile should be loaded for this title.
    async fn resolve_request(
        &self,
        event: &Event,
        ticket: Option<&SessionTicket>,
        use_avr: bool,
    ) -> Option<SearchRequest> {
        let meta = &event.metadata;
        let mut req = self.base_request(event);
        let details = self.media_details(event).await;

        let codec = self.resolve_codec(event, details.codec, ticket, use_avr).await?;
        if codec.is_empty() {
            warn!(title = %meta.title, "unknown audio codec, not loading BEQ");
            return None;
        }
        req.codec = codec;
        req.edition = details.edition;

        match meta.media_type {
            MediaType::Episode if !self.ezbeq.tv_beq_enabled => {
                info!(title = %meta.title, "TV BEQ disabled, skipping episode");
                return None;
            }
            MediaType::Other => {
                debug!(title = %meta.title, "not a movie or episode, skipping");
                return None;
            }
            _ => {}
        }

        let tmdb = meta
            .tmdb
            .clone()
            .filter(|t| !t.is_empty())
            .or(details.tmdb.filter(|t| !t.is_empty()));
        let Some(tmdb) = tmdb else {
            warn!(title = %meta.title, "no TMDB id, not loading BEQ");
            return None;
        };
        req.tmdb = tmdb;
        Some(req)
    }

    async fn resolve_codec(
        &self,
        event: &Event,
        from_media: CodecName,
        ticket: Option<&SessionTicket>,
        use_avr: bool,
    ) -> Option<CodecName> {
        if !use_avr {
            return Some(from_media);
        }
        let avr = self.avr.as_deref()?;

        if let Some(ticket) = ticket {
            tokio::select! {
                _ = ticket.cancel.cancelled() => {
                    debug!(session = %ticket.key, "cancelled while waiting for AVR");
                    return None;
                }
                _ = tokio::time::sleep(self.ezbeq.avr_settle) => {}
            }
        }

        let from_avr = match avr.surround_mode().await {
            Ok(mode) => codec::map_avr_codec(&mode),
            Err(e) => {
                warn!(error = %e, "AVR codec read failed, using media server codec");
                return Some(from_media);
            }
        };
        debug!(avr = %from_avr, media = %from_media, "codec from AVR");

        match from_media.merge_avr(from_avr) {
            Some(merged) => Some(merged),
            None => {
                warn!(avr = %from_avr, media = %from_media, title = %event.metadata.title, "codec mismatch between AVR and media server");
                self.effects.notify(format!(
                    "Codec mismatch for {}: AVR reports {}, media server reports {}",
                    event.metadata.title, from_avr, from_media
                ));
                if self.ezbeq.stop_on_codec_mismatch {
                    self.playback(PlaybackAction::Stop).await;
                    return None;
                }
                Some(from_media)
            }
        }
    }

    /// One media server lookup per event. Without a media server the webhook
    /// metadata is all there is.
    async fn media_details(&self, event: &Event) -> MediaDetails {
        let meta = &event.metadata;
        if let Some(server) = &self.media_server {
            return server.media_details(event).await.unwrap_or_else(|e| {
                error!(title = %meta.title, error = %e, "media server lookup failed");
                MediaDetails::default()
            });
        }
        let raw = &meta.codec;
        MediaDetails {
            codec: CodecName::from_catalog_str(raw).unwrap_or_else(|| {
                codec::normalize_with_file(raw, raw, meta.file_name.as_deref())
            }),
            edition: edition::resolve(
                meta.edition_title.as_deref().unwrap_or(""),
                meta.file_name.as_deref().unwrap_or(""),
            ),
            tmdb: None,
        }
    }

    fn base_request(&self, event: &Event) -> SearchRequest {
        SearchRequest {
            year: event.metadata.year,
            preferred_authors: self.ezbeq.preferred_authors.clone(),
            dry_run: self.ezbeq.dry_run,
            media_type: event.metadata.media_type,
            devices: self.devices.clone(),
            slots: self.ezbeq.slots.clone(),
            title: event.metadata.title.clone(),
            ..Default::default()
        }
    }

    /// Search, then write under the device lock if the ticket survived the search.
    async fn load(&self, profiles: &dyn ProfileBackend, ticket: &SessionTicket, req: &mut SearchRequest) {
        let resolved = tokio::select! {
            _ = ticket.cancel.cancelled() => {
                debug!(session = %ticket.key, "cancelled during catalog search");
                return;
            }
            resolved = profiles.resolve_profile(req) => resolved,
        };
        let result = match resolved {
            Ok(profile) => {
                let _writes = self.device_writes.lock().await;
                if !self.sessions.is_current(ticket).await {
                    debug!(session = %ticket.key, entry_id = %profile.entry_id, "superseded before device write");
                    return;
                }
                profiles.apply_profile(req, &profile).await.map(|()| profile)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(loaded) => {
                self.sessions.store_profile(ticket, req).await;
                self.effects.publish(StatusEvent::ProfileLoaded {
                    player_uuid: ticket.key.player_uuid.clone(),
                    title: loaded.title.clone(),
                    codec: loaded.codec,
                    entry_id: loaded.entry_id.clone(),
                    dry_run: loaded.dry_run,
                });
                if self.ezbeq.notify_on_load {
                    self.effects.notify(loaded.describe());
                }
            }
            Err(EzBeqError::NotFoundInCatalog) => {
                warn!(title = %req.title, codec = %req.codec, "no BEQ profile in catalog");
                if self.ezbeq.notify_on_load {
                    self.effects
                        .notify(format!("No BEQ profile found for {} ({})", req.title, req.codec));
                }
            }
            Err(e) => {
                error!(title = %req.title, error = %e, "failed to load BEQ profile");
                if self.ezbeq.notify_on_load {
                    self.effects
                        .notify(format!("Failed to load BEQ profile for {}: {e}", req.title));
                }
            }
        }
    }

    async fn unload(&self, profiles: &dyn ProfileBackend, key: &SessionKey, req: &SearchRequest) {
        let _writes = self.device_writes.lock().await;
        match profiles.unload_profile(req).await {
            Ok(()) => self.effects.publish(StatusEvent::ProfileUnloaded {
                player_uuid: key.player_uuid.clone(),
            }),
            Err(e) => error!(session = %key, error = %e, "failed to unload BEQ profile"),
        }
    }

    async fn unload_session(&self, key: &SessionKey) {
        let Some(profiles) = self.profiles.as_deref() else {
            return;
        };
        let req = SearchRequest {
            dry_run: self.ezbeq.dry_run,
            devices: self.devices.clone(),
            slots: self.ezbeq.slots.clone(),
            ..Default::default()
        };
        self.unload(profiles, key, &req).await;
    }

    async fn playback(&self, action: PlaybackAction) {
        if let Some(player) = &self.player {
            if let Err(e) = player.playback(action).await {
                warn!(action = %action, error = %e, "playback command failed");
            }
        }
    }

    async fn handle_pause(&self, key: &SessionKey) {
        if self.sessions.state(key).await.suppresses_webhooks() {
            debug!(session = %key, "pause during HDMI sync ignored");
            return;
        }
        info!(session = %key, "pause");
        self.sessions.cancel(key).await;
        self.sessions.set_state(key, SessionState::Paused, Action::Pause).await;
        self.unload_session(key).await;
        self.effects.lights(true);
        self.effects.playing_status(key, false);
    }

    async fn handle_resume(&self, event: &Event) {
        let key = event.session_key();
        if self.sessions.state(&key).await.suppresses_webhooks() {
            debug!(session = %key, "resume during HDMI sync ignored");
            return;
        }
        info!(session = %key, "resume");
        let ticket = self.sessions.begin_resume(&key).await;
        self.effects.lights(false);
        self.effects.playing_status(&key, true);

        let Some(profiles) = self.profiles.as_deref() else {
            return;
        };

        let mut req = match self.sessions.cached_request(&key).await {
            Some(mut cached) if cached.has_cached_profile() => {
                cached.skip_search = true;
                cached
            }
            _ => {
                debug!(session = %key, "no cached profile, looking up codec again");
                match self.resolve_request(event, Some(&ticket), false).await {
                    Some(req) => req,
                    None => return,
                }
            }
        };

        self.unload(profiles, &key, &req).await;
        if !self.sessions.is_current(&ticket).await {
            debug!(session = %key, "resume superseded before load");
            return;
        }
        self.load(profiles, &ticket, &mut req).await;
    }

    async fn handle_stop(&self, key: &SessionKey) {
        info!(session = %key, "stop");
        self.sessions.cancel(key).await;
        self.sessions.finish(key, Action::Stop).await;
        self.unload_session(key).await;
        self.effects.lights(true);
        self.effects.playing_status(key, false);
    }

    async fn handle_scrobble(&self, key: &SessionKey) {
        info!(session = %key, "scrobble");
        self.sessions.cancel(key).await;
        self.unload_session(key).await;
        self.effects.playing_status(key, false);
        self.sessions.finish(key, Action::Scrobble).await;
    }
}
