use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use beqwatch_core::types::{Action, CodecName, SearchRequest, SessionKey, SessionState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One (player, server) playback session.
struct Session {
    state: SessionState,
    cancel: CancellationToken,
    generation: u64,
    /// Last loaded profile; reused by `resume`.
    request: Option<SearchRequest>,
    last_action: Action,
    updated_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            cancel: CancellationToken::new(),
            generation: 0,
            request: None,
            last_action: Action::Unknown,
            updated_at: Utc::now(),
        }
    }

    fn touch(&mut self, action: Action) {
        self.last_action = action;
        self.updated_at = Utc::now();
    }

    fn transition(&mut self, key: &SessionKey, next: SessionState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            debug!(session = %key, from = %self.state, to = %next, "ignoring illegal session transition");
            false
        }
    }
}

/// Handle held by work started for one generation of a session.
///
/// Superseded work sees `is_current` turn false and must not commit visible effects.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub key: SessionKey,
    pub generation: u64,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub player_uuid: String,
    pub server_uuid: String,
    pub state: SessionState,
    pub title: Option<String>,
    pub codec: Option<CodecName>,
    pub entry_id: Option<String>,
    pub mv_adjust: Option<f64>,
    pub last_action: Action,
    pub updated_at: DateTime<Utc>,
}

/// Per-session state and cancellation, keyed by (player, server).
pub struct SessionManager {
    sessions: Arc<Mutex<HashMap<SessionKey, Session>>>,
    next_generation: AtomicU64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Start a new generation for `key`: cancel the previous one and hand out a fresh token.
    async fn renew(&self, key: &SessionKey, next: SessionState, action: Action) -> SessionTicket {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(key.clone()).or_insert_with(Session::new);
        session.cancel.cancel();
        session.cancel = CancellationToken::new();
        session.generation = generation;
        session.transition(key, next);
        session.touch(action);
        SessionTicket {
            key: key.clone(),
            generation,
            cancel: session.cancel.clone(),
        }
    }

    /// A `play` supersedes whatever ran before. The cached profile is dropped.
    pub async fn begin_play(&self, key: &SessionKey, initial: SessionState) -> SessionTicket {
        let ticket = self.renew(key, initial, Action::Play).await;
        if let Some(session) = self.sessions.lock().await.get_mut(key) {
            session.request = None;
        }
        ticket
    }

    /// A `resume` starts a new generation in `Playing`, keeping the cached profile.
    pub async fn begin_resume(&self, key: &SessionKey) -> SessionTicket {
        self.renew(key, SessionState::Playing, Action::Resume).await
    }

    pub async fn state(&self, key: &SessionKey) -> SessionState {
        self.sessions
            .lock()
            .await
            .get(key)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    /// Apply a transition if legal. Returns whether it was applied.
    pub async fn set_state(&self, key: &SessionKey, next: SessionState, action: Action) -> bool {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(key.clone()).or_insert_with(Session::new);
        session.touch(action);
        session.transition(key, next)
    }

    pub async fn cancel(&self, key: &SessionKey) {
        if let Some(session) = self.sessions.lock().await.get(key) {
            session.cancel.cancel();
        }
    }

    pub async fn is_current(&self, ticket: &SessionTicket) -> bool {
        if ticket.cancel.is_cancelled() {
            return false;
        }
        self.sessions
            .lock()
            .await
            .get(&ticket.key)
            .is_some_and(|s| s.generation == ticket.generation)
    }

    /// Enter `SyncingHdmi` for the ticket's generation. Idempotent.
    pub async fn enter_sync(&self, ticket: &SessionTicket) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&ticket.key) {
            Some(s) if s.generation == ticket.generation => {
                s.state == SessionState::SyncingHdmi || s.transition(&ticket.key, SessionState::SyncingHdmi)
            }
            _ => false,
        }
    }

    /// Leave `SyncingHdmi`, unless something else already moved the session on.
    pub async fn finish_sync(&self, ticket: &SessionTicket) {
        let mut sessions = self.sessions.lock().await;
        if let Some(s) = sessions.get_mut(&ticket.key) {
            if s.generation == ticket.generation && s.state == SessionState::SyncingHdmi {
                s.transition(&ticket.key, SessionState::Playing);
                s.updated_at = Utc::now();
            }
        }
    }

    /// Record the profile just loaded, if the ticket is still current.
    pub async fn store_profile(&self, ticket: &SessionTicket, request: &SearchRequest) -> bool {
        if ticket.cancel.is_cancelled() {
            return false;
        }
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&ticket.key) {
            Some(s) if s.generation == ticket.generation => {
                s.request = Some(request.clone());
                s.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    pub async fn cached_request(&self, key: &SessionKey) -> Option<SearchRequest> {
        self.sessions
            .lock()
            .await
            .get(key)
            .and_then(|s| s.request.clone())
    }

    /// Return to `Idle` and forget the cached profile.
    pub async fn finish(&self, key: &SessionKey, action: Action) {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.entry(key.clone()).or_insert_with(Session::new);
        if session.state != SessionState::Idle {
            session.transition(key, SessionState::Idle);
        }
        session.request = None;
        session.touch(action);
    }

    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.lock().await;
        let mut out: Vec<SessionSnapshot> = sessions
            .iter()
            .map(|(key, s)| SessionSnapshot {
                player_uuid: key.player_uuid.clone(),
                server_uuid: key.server_uuid.clone(),
                state: s.state,
                title: s.request.as_ref().map(|r| r.title.clone()),
                codec: s.request.as_ref().map(|r| r.codec),
                entry_id: s.request.as_ref().map(|r| r.entry_id.clone()),
                mv_adjust: s.request.as_ref().map(|r| r.mv_adjust),
                last_action: s.last_action,
                updated_at: s.updated_at,
            })
            .collect();
        out.sort_by(|a, b| {
            (&a.player_uuid, &a.server_uuid).cmp(&(&b.player_uuid, &b.server_uuid))
        });
        out
    }
}
