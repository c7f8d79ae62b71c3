use serde::{Deserialize, Deserializer, Serialize};

/// Playback action carried by a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Play,
    Pause,
    Resume,
    Stop,
    Scrobble,
    #[serde(other)]
    Unknown,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Scrobble => "scrobble",
            Self::Unknown => "unknown",
        }
    }

    /// Map a Plex webhook event name (`media.play`, ...) to an action.
    pub fn from_plex_event(event: &str) -> Self {
        match event {
            "media.play" => Self::Play,
            "media.pause" => Self::Pause,
            "media.resume" => Self::Resume,
            "media.stop" => Self::Stop,
            "media.scrobble" => Self::Scrobble,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command sent to the active media player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackAction {
    Play,
    Pause,
    Stop,
}

impl PlaybackAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Stop => "stop",
        }
    }
}

impl std::fmt::Display for PlaybackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Library item type reported by the media server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Episode,
    #[default]
    #[serde(other)]
    Other,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::Episode => "episode",
            Self::Other => "other",
        }
    }

    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("movie") {
            Self::Movie
        } else if label.eq_ignore_ascii_case("episode") {
            Self::Episode
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical audio codec names, spelled the way the ezBEQ catalog spells them.
///
/// The three `*Maybe` values are ambiguous classes produced from vendor metadata
/// that cannot be resolved locally; see [`CodecName::search_hypotheses`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecName {
    #[serde(rename = "Atmos")]
    Atmos,
    #[serde(rename = "DD+ Atmos")]
    DdPlusAtmos,
    #[serde(rename = "DD+")]
    DdPlus,
    #[serde(rename = "DD+ 5.1")]
    DdPlus51,
    #[serde(rename = "DD+ 7.1")]
    DdPlus71,
    #[serde(rename = "TrueHD 7.1")]
    TrueHd71,
    #[serde(rename = "TrueHD 6.1")]
    TrueHd61,
    #[serde(rename = "TrueHD 5.1")]
    TrueHd51,
    #[serde(rename = "DTS-X")]
    DtsX,
    #[serde(rename = "DTS-HD MA 7.1")]
    DtsHdMa71,
    #[serde(rename = "DTS-HD MA 5.1")]
    DtsHdMa51,
    #[serde(rename = "DTS-HD HR 7.1")]
    DtsHdHr71,
    #[serde(rename = "DTS-HD HR 5.1")]
    DtsHdHr51,
    #[serde(rename = "DTS 5.1")]
    Dts51,
    #[serde(rename = "LPCM 7.1")]
    Lpcm71,
    #[serde(rename = "LPCM 5.1")]
    Lpcm51,
    #[serde(rename = "LPCM 2.0")]
    Lpcm20,
    #[serde(rename = "AAC 2.0")]
    Aac20,
    #[serde(rename = "AC3 5.1")]
    Ac351,
    #[serde(rename = "Stereo")]
    Stereo,
    #[serde(rename = "AtmosMaybe")]
    AtmosMaybe,
    #[serde(rename = "DD+Atmos5.1Maybe")]
    DdPlusAtmos51Maybe,
    #[serde(rename = "DD+Atmos7.1Maybe")]
    DdPlusAtmos71Maybe,
    #[default]
    #[serde(rename = "Empty", other)]
    Empty,
}

impl CodecName {
    pub const ALL: [CodecName; 24] = [
        Self::Atmos,
        Self::DdPlusAtmos,
        Self::DdPlus,
        Self::DdPlus51,
        Self::DdPlus71,
        Self::TrueHd71,
        Self::TrueHd61,
        Self::TrueHd51,
        Self::DtsX,
        Self::DtsHdMa71,
        Self::DtsHdMa51,
        Self::DtsHdHr71,
        Self::DtsHdHr51,
        Self::Dts51,
        Self::Lpcm71,
        Self::Lpcm51,
        Self::Lpcm20,
        Self::Aac20,
        Self::Ac351,
        Self::Stereo,
        Self::AtmosMaybe,
        Self::DdPlusAtmos51Maybe,
        Self::DdPlusAtmos71Maybe,
        Self::Empty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Atmos => "Atmos",
            Self::DdPlusAtmos => "DD+ Atmos",
            Self::DdPlus => "DD+",
            Self::DdPlus51 => "DD+ 5.1",
            Self::DdPlus71 => "DD+ 7.1",
            Self::TrueHd71 => "TrueHD 7.1",
            Self::TrueHd61 => "TrueHD 6.1",
            Self::TrueHd51 => "TrueHD 5.1",
            Self::DtsX => "DTS-X",
            Self::DtsHdMa71 => "DTS-HD MA 7.1",
            Self::DtsHdMa51 => "DTS-HD MA 5.1",
            Self::DtsHdHr71 => "DTS-HD HR 7.1",
            Self::DtsHdHr51 => "DTS-HD HR 5.1",
            Self::Dts51 => "DTS 5.1",
            Self::Lpcm71 => "LPCM 7.1",
            Self::Lpcm51 => "LPCM 5.1",
            Self::Lpcm20 => "LPCM 2.0",
            Self::Aac20 => "AAC 2.0",
            Self::Ac351 => "AC3 5.1",
            Self::Stereo => "Stereo",
            Self::AtmosMaybe => "AtmosMaybe",
            Self::DdPlusAtmos51Maybe => "DD+Atmos5.1Maybe",
            Self::DdPlusAtmos71Maybe => "DD+Atmos7.1Maybe",
            Self::Empty => "Empty",
        }
    }

    /// Case-insensitive lookup of a catalog spelling.
    pub fn from_catalog_str(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }

    /// Ordered concrete codecs to try against the catalog.
    ///
    /// The stronger literal comes first so that titles which really are plain
    /// TrueHD/DD+ are not claimed as Atmos. `Empty` yields nothing.
    pub fn search_hypotheses(self) -> Vec<CodecName> {
        match self {
            Self::AtmosMaybe => vec![Self::TrueHd71, Self::Atmos],
            Self::DdPlusAtmos51Maybe => vec![Self::DdPlus51, Self::DdPlusAtmos],
            Self::DdPlusAtmos71Maybe => vec![Self::DdPlus71, Self::DdPlusAtmos],
            Self::Empty => Vec::new(),
            concrete => vec![concrete],
        }
    }

    pub fn is_ambiguous(self) -> bool {
        self.search_hypotheses().len() > 1
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn is_dd_plus(self) -> bool {
        matches!(
            self,
            Self::DdPlus
                | Self::DdPlus51
                | Self::DdPlus71
                | Self::DdPlusAtmos
                | Self::DdPlusAtmos51Maybe
                | Self::DdPlusAtmos71Maybe
        )
    }

    pub fn is_true_hd(self) -> bool {
        matches!(
            self,
            Self::TrueHd71 | Self::TrueHd61 | Self::TrueHd51 | Self::AtmosMaybe
        )
    }

    /// Combine the media server's codec (`self`) with what the AVR decodes.
    ///
    /// The AVR only knows the stream family ("Dolby Atmos", "Dolby Digital +"),
    /// the media server knows the container track. The result is the most
    /// specific codec both agree on, or `None` when they describe different
    /// streams. An `Empty` side defers to the other.
    pub fn merge_avr(self, avr: CodecName) -> Option<CodecName> {
        if avr.is_empty() || self == avr {
            return Some(self);
        }
        if self.is_empty() {
            return Some(avr);
        }
        match avr {
            Self::DdPlus if self.is_dd_plus() => Some(self),
            Self::Atmos if self.is_dd_plus() => Some(Self::DdPlusAtmos),
            Self::Atmos if self.is_true_hd() => Some(Self::Atmos),
            _ if self.search_hypotheses().contains(&avr) => Some(avr),
            _ if avr.search_hypotheses().contains(&self) => Some(self),
            _ => None,
        }
    }
}

impl std::fmt::Display for CodecName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release edition of a title. `None` means no edition constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edition {
    Extended,
    Unrated,
    Theatrical,
    Ultimate,
    Director,
    Criterion,
    Special,
    #[default]
    #[serde(other)]
    None,
}

impl Edition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extended => "Extended",
            Self::Unrated => "Unrated",
            Self::Theatrical => "Theatrical",
            Self::Ultimate => "Ultimate",
            Self::Director => "Director",
            Self::Criterion => "Criterion",
            Self::Special => "Special",
            Self::None => "None",
        }
    }
}

impl std::fmt::Display for Edition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media metadata attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "type", default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    /// Same as the item id for Jellyfin, the library key for Plex.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub codec: String,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmdb: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition_title: Option<String>,
}

/// A decoded playback webhook. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub action: Action,
    #[serde(default)]
    pub server_uuid: String,
    #[serde(default)]
    pub player_uuid: String,
    /// Plex sends a number, Jellyfin a string.
    #[serde(default, deserialize_with = "string_or_number")]
    pub account_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Event {
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(&self.player_uuid, &self.server_uuid)
    }
}

/// Identity of one playback session: a (player, server) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub player_uuid: String,
    pub server_uuid: String,
}

impl SessionKey {
    pub fn new(player_uuid: &str, server_uuid: &str) -> Self {
        Self {
            player_uuid: player_uuid.to_string(),
            server_uuid: server_uuid.to_string(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.player_uuid, self.server_uuid)
    }
}

/// Per-session playback state owned by the orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Playing,
    SyncingHdmi,
    Paused,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::SyncingHdmi => "syncing_hdmi",
            Self::Paused => "paused",
        }
    }

    /// Legal transitions of the session state machine.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            // a new play always supersedes whatever ran before
            (_, Playing | SyncingHdmi) => true,
            (Playing, Paused) => true,
            (Playing | SyncingHdmi | Paused, Idle) => true,
            _ => false,
        }
    }

    /// Webhook-driven pause/resume is ignored while the sync handshake owns the player.
    pub fn suppresses_webhooks(self) -> bool {
        matches!(self, Self::SyncingHdmi)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session-scoped catalog search and load request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchRequest {
    pub tmdb: String,
    pub year: i32,
    pub codec: CodecName,
    pub preferred_authors: Vec<String>,
    pub edition: Edition,
    pub skip_search: bool,
    pub entry_id: String,
    pub mv_adjust: f64,
    pub dry_run: bool,
    pub media_type: MediaType,
    pub devices: Vec<String>,
    pub slots: Vec<u32>,
    pub title: String,
}

impl SearchRequest {
    /// A cached profile exists only when both the entry id and the gain are non-zero.
    pub fn has_cached_profile(&self) -> bool {
        !self.entry_id.is_empty() && self.mv_adjust != 0.0
    }
}

/// One candidate returned by the catalog search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub sort_title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub audio_types: Vec<String>,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub mv_adjust: f64,
    #[serde(default)]
    pub edition: String,
    #[serde(rename = "theMovieDB", default, deserialize_with = "string_or_number")]
    pub tmdb_id: String,
    #[serde(default)]
    pub author: String,
}

/// A DSP device known to ezBEQ.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "masterVolume", alias = "mastervolume", default)]
    pub master_volume: f64,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub slots: Vec<DeviceSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSlot {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub last: String,
    #[serde(default)]
    pub active: bool,
}

/// Accept a JSON string, number or null and keep it as text.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Str(s)) => s,
        Some(Raw::Int(i)) => i.to_string(),
        Some(Raw::Float(f)) => f.to_string(),
        None => String::new(),
    })
}
