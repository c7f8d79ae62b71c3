use std::sync::Arc;

use beqwatch_clients::{PlaybackControl, SignalReader};
use beqwatch_core::config::{HdmiSyncConfig, SyncSource};
use beqwatch_core::types::PlaybackAction;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::session::{SessionManager, SessionTicket};

/// How a sync wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Disabled,
    /// Fixed delay elapsed.
    Elapsed,
    Signal,
    TimedOut,
    ReadFailed,
    Cancelled,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Elapsed => "elapsed",
            Self::Signal => "signal",
            Self::TimedOut => "timed_out",
            Self::ReadFailed => "read_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Pauses the player while the display chain locks onto the new signal, then resumes it.
pub struct HdmiSyncCoordinator {
    config: HdmiSyncConfig,
    player: Option<Arc<dyn PlaybackControl>>,
    signal: Option<Arc<dyn SignalReader>>,
    sessions: Arc<SessionManager>,
}

impl HdmiSyncCoordinator {
    pub fn new(
        config: HdmiSyncConfig,
        player: Option<Arc<dyn PlaybackControl>>,
        signal: Option<Arc<dyn SignalReader>>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            config,
            player,
            signal,
            sessions,
        }
    }

    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    async fn send(&self, action: PlaybackAction) {
        let Some(player) = &self.player else {
            debug!(action = %action, "no player control configured");
            return;
        };
        if let Err(e) = player.playback(action).await {
            warn!(action = %action, error = %e, "playback command failed");
        }
    }

    /// Wait for the display chain to sync.
    ///
    /// While waiting the session is in `SyncingHdmi`, so webhook pause/resume
    /// caused by our own pause is ignored. Once paused, the player is always
    /// resumed, whatever ends the wait.
    pub async fn wait_for_sync(&self, ticket: &SessionTicket) -> SyncOutcome {
        if !self.config.enabled {
            return SyncOutcome::Disabled;
        }
        if ticket.cancel.is_cancelled() {
            self.sessions.finish_sync(ticket).await;
            return SyncOutcome::Cancelled;
        }

        self.sessions.enter_sync(ticket).await;
        info!(session = %ticket.key, source = %self.config.source, "waiting for HDMI sync");
        self.send(PlaybackAction::Pause).await;

        let outcome = match self.config.source {
            SyncSource::Time => {
                tokio::select! {
                    _ = ticket.cancel.cancelled() => SyncOutcome::Cancelled,
                    _ = sleep(self.config.seconds) => SyncOutcome::Elapsed,
                }
            }
            source => self.poll_signal(ticket, source).await,
        };

        self.send(PlaybackAction::Play).await;
        // absorbs the late webhook for our own resume
        sleep(self.config.resume_grace).await;
        self.sessions.finish_sync(ticket).await;

        info!(session = %ticket.key, outcome = outcome.as_str(), "HDMI sync finished");
        outcome
    }

    async fn poll_signal(&self, ticket: &SessionTicket, source: SyncSource) -> SyncOutcome {
        let Some(reader) = &self.signal else {
            warn!("HDMI sync source needs a signal reader, none configured");
            return SyncOutcome::ReadFailed;
        };
        let deadline = Instant::now() + self.config.timeout;

        loop {
            if ticket.cancel.is_cancelled() {
                return SyncOutcome::Cancelled;
            }
            match reader.signal_present(&self.config.entity, source).await {
                Ok(true) => return SyncOutcome::Signal,
                Ok(false) => debug!(entity = %self.config.entity, "no signal yet"),
                Err(e) => {
                    warn!(entity = %self.config.entity, error = %e, "signal read failed, assuming not synced");
                    return SyncOutcome::ReadFailed;
                }
            }
            if Instant::now() >= deadline {
                warn!(entity = %self.config.entity, "HDMI sync timed out");
                return SyncOutcome::TimedOut;
            }
            tokio::select! {
                _ = ticket.cancel.cancelled() => return SyncOutcome::Cancelled,
                _ = sleep(self.config.poll_interval) => {}
            }
        }
    }
}
