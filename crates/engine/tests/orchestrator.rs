mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use beqwatch_clients::{AvrCodecSource, MediaServer};
use beqwatch_core::config::{Config, SyncSource};
use beqwatch_core::types::{Action, CodecName, Edition, MediaType, PlaybackAction, SessionState};
use beqwatch_engine::{Collaborators, EventOrchestrator, StatusEvent};
use common::{
    FakeAvr, FakeMediaServer, FakeNotifier, FakePlayer, FakeProfiles, ProfileCall, event, movie,
};
use tokio::sync::broadcast;

struct Harness {
    orchestrator: Arc<EventOrchestrator>,
    profiles: Arc<FakeProfiles>,
    player: Arc<FakePlayer>,
    notifier: Arc<FakeNotifier>,
    status: broadcast::Receiver<StatusEvent>,
}

fn config(sync_secs: Option<u64>) -> Config {
    let mut config = Config::default();
    config.ezbeq.enabled = true;
    config.ezbeq.notify_on_load = true;
    if let Some(secs) = sync_secs {
        config.hdmi_sync.enabled = true;
        config.hdmi_sync.source = SyncSource::Time;
        config.hdmi_sync.seconds = Duration::from_secs(secs);
        config.hdmi_sync.resume_grace = Duration::from_millis(20);
    }
    config
}

fn harness(config: Config, media_server: Option<Arc<FakeMediaServer>>) -> Harness {
    harness_with(config, FakeProfiles::default(), |c| {
        c.media_server = media_server.map(|m| m as Arc<dyn MediaServer>);
    })
}

fn harness_with(
    config: Config,
    profiles: FakeProfiles,
    extra: impl FnOnce(&mut Collaborators),
) -> Harness {
    let profiles = Arc::new(profiles);
    let player = Arc::new(FakePlayer::default());
    let notifier = Arc::new(FakeNotifier::default());
    let mut collaborators = Collaborators {
        profiles: Some(profiles.clone()),
        player: Some(player.clone()),
        notifier: Some(notifier.clone()),
        ..Default::default()
    };
    extra(&mut collaborators);
    let (tx, status) = broadcast::channel(64);
    let orchestrator =
        EventOrchestrator::new(&config, vec!["minidsp".into()], collaborators, tx);
    Harness {
        orchestrator,
        profiles,
        player,
        notifier,
        status,
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn play_unloads_then_loads_and_caches() {
    let h = harness(config(None), None);
    let handle = h.orchestrator.dispatch(movie(Action::Play)).await.unwrap();
    handle.await.unwrap();

    assert_eq!(
        h.profiles.calls(),
        vec![
            ProfileCall::Unload,
            ProfileCall::Load {
                searched: true,
                entry_id: "entry-438631".into(),
                codec: CodecName::Atmos,
            },
        ]
    );
    let sessions = h.orchestrator.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].state, SessionState::Playing);
    assert_eq!(sessions[0].entry_id.as_deref(), Some("entry-438631"));
}

#[tokio::test]
async fn media_server_codec_and_tmdb_are_used() {
    let media = Arc::new(FakeMediaServer::new(
        CodecName::AtmosMaybe,
        Edition::Extended,
        Some("603"),
    ));
    let h = harness(config(None), Some(media.clone()));
    let mut ev = movie(Action::Play);
    ev.metadata.tmdb = None;
    h.orchestrator.dispatch(ev).await.unwrap().await.unwrap();

    assert_eq!(media.lookups(), 1);
    assert_eq!(
        h.profiles.loads(),
        vec![ProfileCall::Load {
            searched: true,
            entry_id: "entry-603".into(),
            codec: CodecName::AtmosMaybe,
        }]
    );
}

#[tokio::test]
async fn episode_without_tv_beq_only_unloads() {
    let h = harness(config(None), None);
    let ev = event(Action::Play, MediaType::Episode, "Atmos");
    h.orchestrator.dispatch(ev).await.unwrap().await.unwrap();

    assert_eq!(h.profiles.calls(), vec![ProfileCall::Unload]);
}

#[tokio::test]
async fn episode_with_tv_beq_loads() {
    let mut cfg = config(None);
    cfg.ezbeq.tv_beq_enabled = true;
    let h = harness(cfg, None);
    let ev = event(Action::Play, MediaType::Episode, "DD+ Atmos");
    h.orchestrator.dispatch(ev).await.unwrap().await.unwrap();

    assert_eq!(h.profiles.loads().len(), 1);
}

#[tokio::test]
async fn unknown_codec_skips_load() {
    let h = harness(config(None), None);
    let ev = event(Action::Play, MediaType::Movie, "Opus");
    h.orchestrator.dispatch(ev).await.unwrap().await.unwrap();

    assert_eq!(h.profiles.calls(), vec![ProfileCall::Unload]);
}

#[tokio::test]
async fn catalog_miss_is_not_fatal() {
    let profiles = FakeProfiles {
        not_found: true,
        ..Default::default()
    };
    let h = harness_with(config(None), profiles, |_| {});
    h.orchestrator
        .dispatch(movie(Action::Play))
        .await
        .unwrap()
        .await
        .unwrap();
    settle().await;

    let sessions = h.orchestrator.sessions().await;
    assert_eq!(sessions[0].state, SessionState::Playing);
    assert_eq!(sessions[0].entry_id, None);
    let messages = h.notifier.messages.lock().unwrap().clone();
    assert!(messages.iter().any(|m| m.contains("No BEQ profile")));
}

#[tokio::test]
async fn pause_during_hdmi_sync_is_ignored() {
    let h = harness(config(Some(1)), None);
    let handle = h.orchestrator.dispatch(movie(Action::Play)).await.unwrap();

    // the coordinator's own pause comes back as a webhook
    assert!(h.orchestrator.dispatch(movie(Action::Pause)).await.is_none());
    let key = movie(Action::Pause).session_key();
    assert_eq!(
        h.orchestrator.session_state(&key).await,
        SessionState::SyncingHdmi
    );
    assert!(h.orchestrator.dispatch(movie(Action::Resume)).await.is_none());

    handle.await.unwrap();

    // only the safety unload of the play itself
    assert_eq!(h.profiles.unload_count(), 1);
    assert_eq!(h.profiles.loads().len(), 1);
    assert_eq!(
        h.player.actions(),
        vec![PlaybackAction::Pause, PlaybackAction::Play]
    );
    assert_eq!(h.orchestrator.session_state(&key).await, SessionState::Playing);
}

#[tokio::test]
async fn pause_then_resume_reuses_cached_profile() {
    let h = harness(config(None), None);
    h.orchestrator
        .dispatch(movie(Action::Play))
        .await
        .unwrap()
        .await
        .unwrap();

    assert!(h.orchestrator.dispatch(movie(Action::Pause)).await.is_none());
    let key = movie(Action::Pause).session_key();
    assert_eq!(h.orchestrator.session_state(&key).await, SessionState::Paused);

    assert!(h.orchestrator.dispatch(movie(Action::Resume)).await.is_none());
    assert_eq!(h.orchestrator.session_state(&key).await, SessionState::Playing);

    let loads = h.profiles.loads();
    assert_eq!(loads.len(), 2);
    assert_eq!(
        loads[1],
        ProfileCall::Load {
            searched: false,
            entry_id: "entry-438631".into(),
            codec: CodecName::Atmos,
        }
    );
    // safety unload, pause, resume
    assert_eq!(h.profiles.unload_count(), 3);
}

#[tokio::test]
async fn resume_without_cache_looks_up_again() {
    let h = harness(config(None), None);
    assert!(h.orchestrator.dispatch(movie(Action::Resume)).await.is_none());

    assert_eq!(
        h.profiles.loads(),
        vec![ProfileCall::Load {
            searched: true,
            entry_id: "entry-438631".into(),
            codec: CodecName::Atmos,
        }]
    );
}

#[tokio::test]
async fn stop_cancels_sync_and_clears_cache() {
    let h = harness(config(Some(30)), None);
    let handle = h.orchestrator.dispatch(movie(Action::Play)).await.unwrap();
    settle().await;

    let started = Instant::now();
    assert!(h.orchestrator.dispatch(movie(Action::Stop)).await.is_none());
    handle.await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    let key = movie(Action::Stop).session_key();
    assert_eq!(h.orchestrator.session_state(&key).await, SessionState::Idle);
    let sessions = h.orchestrator.sessions().await;
    assert_eq!(sessions[0].entry_id, None);
    assert_eq!(sessions[0].last_action, Action::Stop);
    assert_eq!(h.player.actions().last(), Some(&PlaybackAction::Play));
}

#[tokio::test]
async fn newer_play_supersedes_older() {
    let h = harness(config(None), None);
    let first = h.orchestrator.dispatch(movie(Action::Play)).await.unwrap();
    let mut second_event = movie(Action::Play);
    second_event.metadata.tmdb = Some("603".into());
    let second = h.orchestrator.dispatch(second_event).await.unwrap();
    first.await.unwrap();
    second.await.unwrap();

    let sessions = h.orchestrator.sessions().await;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].entry_id.as_deref(), Some("entry-603"));
}

#[tokio::test]
async fn scrobble_unloads_and_goes_idle() {
    let h = harness(config(None), None);
    h.orchestrator
        .dispatch(movie(Action::Play))
        .await
        .unwrap()
        .await
        .unwrap();
    assert!(h.orchestrator.dispatch(movie(Action::Scrobble)).await.is_none());

    let key = movie(Action::Scrobble).session_key();
    assert_eq!(h.orchestrator.session_state(&key).await, SessionState::Idle);
    assert_eq!(h.profiles.unload_count(), 2);
}

#[tokio::test]
async fn unknown_action_is_dropped() {
    let h = harness(config(None), None);
    assert!(h.orchestrator.dispatch(movie(Action::Unknown)).await.is_none());
    assert!(h.profiles.calls().is_empty());
    assert!(h.orchestrator.sessions().await.is_empty());
}

#[tokio::test]
async fn play_publishes_status_events() {
    let mut h = harness(config(None), None);
    h.orchestrator
        .dispatch(movie(Action::Play))
        .await
        .unwrap()
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(ev) = h.status.try_recv() {
        seen.push(ev);
    }
    assert!(seen.iter().any(|e| matches!(e, StatusEvent::Lights { on: false })));
    assert!(seen.iter().any(|e| matches!(e, StatusEvent::Playing { playing: true, .. })));
    assert!(seen.iter().any(|e| matches!(e, StatusEvent::ProfileLoaded { .. })));
}

fn slow_search() -> FakeProfiles {
    FakeProfiles {
        search_delay: Duration::from_millis(300),
        ..Default::default()
    }
}

#[tokio::test]
async fn stop_during_catalog_search_leaves_devices_unloaded() {
    let h = harness_with(config(None), slow_search(), |_| {});
    let play = h.orchestrator.dispatch(movie(Action::Play)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.orchestrator.dispatch(movie(Action::Stop)).await.is_none());
    play.await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(h.profiles.calls(), vec![ProfileCall::Unload, ProfileCall::Unload]);
    let sessions = h.orchestrator.sessions().await;
    assert_eq!(sessions[0].state, SessionState::Idle);
    assert_eq!(sessions[0].entry_id, None);
}

#[tokio::test]
async fn pause_during_catalog_search_leaves_devices_unloaded() {
    let h = harness_with(config(None), slow_search(), |_| {});
    let play = h.orchestrator.dispatch(movie(Action::Play)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(h.orchestrator.dispatch(movie(Action::Pause)).await.is_none());
    play.await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert!(h.profiles.loads().is_empty());
    assert_eq!(h.profiles.calls().last(), Some(&ProfileCall::Unload));
    let key = movie(Action::Pause).session_key();
    assert_eq!(h.orchestrator.session_state(&key).await, SessionState::Paused);
}

#[tokio::test]
async fn stop_waits_for_an_in_flight_device_write() {
    let profiles = FakeProfiles {
        apply_delay: Duration::from_millis(200),
        ..Default::default()
    };
    let h = harness_with(config(None), profiles, |_| {});
    let play = h.orchestrator.dispatch(movie(Action::Play)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // the PATCH is already on the wire; the unload must land after it
    assert!(h.orchestrator.dispatch(movie(Action::Stop)).await.is_none());
    play.await.unwrap();

    let calls = h.profiles.calls();
    assert_eq!(calls.len(), 3);
    assert!(matches!(calls[1], ProfileCall::Load { .. }));
    assert_eq!(calls[2], ProfileCall::Unload);
    // the load finished after its ticket was cancelled, so nothing is cached
    assert_eq!(h.orchestrator.sessions().await[0].entry_id, None);
}

fn avr_harness(cfg: Config, media_codec: CodecName, avr_mode: &str) -> Harness {
    let media = Arc::new(FakeMediaServer::new(media_codec, Edition::None, Some("438631")));
    let avr = Arc::new(FakeAvr {
        mode: avr_mode.into(),
    });
    harness_with(cfg, FakeProfiles::default(), |c| {
        c.media_server = Some(media as Arc<dyn MediaServer>);
        c.avr = Some(avr as Arc<dyn AvrCodecSource>);
    })
}

fn avr_config() -> Config {
    let mut cfg = config(None);
    cfg.ezbeq.use_avr_codec = true;
    cfg.ezbeq.avr_settle = Duration::from_millis(10);
    cfg.ezbeq.stop_on_codec_mismatch = true;
    cfg
}

async fn play_and_wait(h: &Harness) {
    h.orchestrator
        .dispatch(movie(Action::Play))
        .await
        .unwrap()
        .await
        .unwrap();
}

#[tokio::test]
async fn avr_dd_plus_keeps_media_hypotheses() {
    let h = avr_harness(avr_config(), CodecName::DdPlusAtmos51Maybe, "DOLBY DIGITAL +");
    play_and_wait(&h).await;

    assert_eq!(
        h.profiles.loads(),
        vec![ProfileCall::Load {
            searched: true,
            entry_id: "entry-438631".into(),
            codec: CodecName::DdPlusAtmos51Maybe,
        }]
    );
    assert!(h.player.actions().is_empty());
}

#[tokio::test]
async fn avr_atmos_over_dd_plus_is_dd_plus_atmos() {
    let h = avr_harness(avr_config(), CodecName::DdPlusAtmos, "DOLBY ATMOS");
    play_and_wait(&h).await;

    assert_eq!(
        h.profiles.loads(),
        vec![ProfileCall::Load {
            searched: true,
            entry_id: "entry-438631".into(),
            codec: CodecName::DdPlusAtmos,
        }]
    );
}

#[tokio::test]
async fn avr_atmos_settles_truehd_guess() {
    let h = avr_harness(avr_config(), CodecName::AtmosMaybe, "DOLBY ATMOS");
    play_and_wait(&h).await;

    assert!(matches!(
        h.profiles.loads()[..],
        [ProfileCall::Load { codec: CodecName::Atmos, .. }]
    ));
}

#[tokio::test]
async fn avr_codec_mismatch_stops_playback() {
    let h = avr_harness(avr_config(), CodecName::DtsX, "DOLBY ATMOS");
    play_and_wait(&h).await;
    settle().await;

    assert!(h.profiles.loads().is_empty());
    assert_eq!(h.player.actions(), vec![PlaybackAction::Stop]);
    let messages = h.notifier.messages.lock().unwrap().clone();
    assert!(messages.iter().any(|m| m.contains("Codec mismatch")));
}

#[tokio::test]
async fn avr_codec_mismatch_without_stop_keeps_media_codec() {
    let mut cfg = avr_config();
    cfg.ezbeq.stop_on_codec_mismatch = false;
    let h = avr_harness(cfg, CodecName::DtsX, "DOLBY ATMOS");
    play_and_wait(&h).await;

    assert!(matches!(
        h.profiles.loads()[..],
        [ProfileCall::Load { codec: CodecName::DtsX, .. }]
    ));
    assert!(h.player.actions().is_empty());
}
