use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub ezbeq: EzBeqConfig,
    pub hdmi_sync: HdmiSyncConfig,
    pub home_assistant: HomeAssistantConfig,
    pub plex: PlexConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Capacity of the inbound webhook queue.
    pub event_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:9292".to_string(),
            event_queue: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EzBeqConfig {
    pub enabled: bool,
    pub url: String,
    pub dry_run: bool,
    pub tv_beq_enabled: bool,
    pub preferred_authors: Vec<String>,
    pub slots: Vec<u32>,
    pub notify_on_load: bool,
    pub use_avr_codec: bool,
    pub avr_address: String,
    pub avr_settle: Duration,
    pub stop_on_codec_mismatch: bool,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for EzBeqConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "http://localhost:8080".to_string(),
            dry_run: false,
            tv_beq_enabled: false,
            preferred_authors: Vec::new(),
            slots: vec![1],
            notify_on_load: false,
            use_avr_codec: false,
            avr_address: String::new(),
            avr_settle: Duration::from_secs(5),
            stop_on_codec_mismatch: false,
            retry_attempts: 5,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Where the HDMI sync coordinator learns that the display chain has locked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SyncSource {
    /// Fixed delay.
    #[default]
    Time,
    /// Video processor remote entity (`attributes.is_signal`).
    Remote,
    /// JVC projector remote entity (`attributes.signal_status`).
    Jvc,
    /// `binary_sensor` entity, `on` means signal.
    Sensor,
}

impl SyncSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Remote => "remote",
            Self::Jvc => "jvc",
            Self::Sensor => "sensor",
        }
    }

    /// Home Assistant entity domain polled for this source.
    pub fn entity_domain(self) -> &'static str {
        match self {
            Self::Time => "",
            Self::Remote | Self::Jvc => "remote",
            Self::Sensor => "binary_sensor",
        }
    }
}

impl FromStr for SyncSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" => Ok(Self::Time),
            "remote" | "envy" => Ok(Self::Remote),
            "jvc" => Ok(Self::Jvc),
            "sensor" | "binary_sensor" => Ok(Self::Sensor),
            other => Err(format!("unknown sync source: {other}")),
        }
    }
}

impl std::fmt::Display for SyncSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HdmiSyncConfig {
    pub enabled: bool,
    pub source: SyncSource,
    /// Fixed wait for [`SyncSource::Time`].
    pub seconds: Duration,
    pub entity: String,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub resume_grace: Duration,
}

impl Default for HdmiSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source: SyncSource::Time,
            seconds: Duration::from_secs(5),
            entity: String::new(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            resume_grace: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HomeAssistantConfig {
    pub enabled: bool,
    pub url: String,
    pub token: String,
    pub notify_endpoint: String,
    pub trigger_lights: bool,
    pub trigger_volume: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PlexConfig {
    pub enabled: bool,
    pub url: String,
    pub token: String,
    pub player_address: String,
    pub player_machine_id: String,
    pub device_uuid_filter: Vec<String>,
    pub owner_name_filter: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Invalid values keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);
        let d = Config::default();

        let server = ServerConfig {
            bind: env.string("BEQWATCH_BIND", &d.server.bind),
            event_queue: env.parse("BEQWATCH_EVENT_QUEUE", d.server.event_queue).max(1),
        };

        let ezbeq = EzBeqConfig {
            enabled: env.flag("BEQWATCH_EZBEQ_ENABLED", d.ezbeq.enabled),
            url: env
                .string("BEQWATCH_EZBEQ_URL", &d.ezbeq.url)
                .trim_end_matches('/')
                .to_string(),
            dry_run: env.flag("BEQWATCH_EZBEQ_DRY_RUN", d.ezbeq.dry_run),
            tv_beq_enabled: env.flag("BEQWATCH_EZBEQ_TV_ENABLED", d.ezbeq.tv_beq_enabled),
            preferred_authors: env
                .get("BEQWATCH_EZBEQ_PREFERRED_AUTHORS")
                .map(|v| split_authors(&v))
                .unwrap_or_default(),
            slots: env.list("BEQWATCH_EZBEQ_SLOTS", d.ezbeq.slots.clone()),
            notify_on_load: env.flag("BEQWATCH_EZBEQ_NOTIFY_ON_LOAD", d.ezbeq.notify_on_load),
            use_avr_codec: env.flag("BEQWATCH_EZBEQ_USE_AVR_CODEC", d.ezbeq.use_avr_codec),
            avr_address: env.string("BEQWATCH_AVR_ADDRESS", &d.ezbeq.avr_address),
            avr_settle: env.secs("BEQWATCH_AVR_SETTLE_SECS", d.ezbeq.avr_settle),
            stop_on_codec_mismatch: env.flag(
                "BEQWATCH_EZBEQ_STOP_ON_CODEC_MISMATCH",
                d.ezbeq.stop_on_codec_mismatch,
            ),
            retry_attempts: env
                .parse("BEQWATCH_EZBEQ_RETRY_ATTEMPTS", d.ezbeq.retry_attempts)
                .max(1),
            retry_delay: env.millis("BEQWATCH_EZBEQ_RETRY_DELAY_MS", d.ezbeq.retry_delay),
        };

        let hdmi_sync = HdmiSyncConfig {
            enabled: env.flag("BEQWATCH_HDMI_SYNC_ENABLED", d.hdmi_sync.enabled),
            source: env.parse("BEQWATCH_HDMI_SYNC_SOURCE", d.hdmi_sync.source),
            seconds: env.secs("BEQWATCH_HDMI_SYNC_SECONDS", d.hdmi_sync.seconds),
            entity: env.string("BEQWATCH_HDMI_SYNC_ENTITY", &d.hdmi_sync.entity),
            timeout: env.secs("BEQWATCH_HDMI_SYNC_TIMEOUT_SECS", d.hdmi_sync.timeout),
            poll_interval: env.millis("BEQWATCH_HDMI_SYNC_POLL_MS", d.hdmi_sync.poll_interval),
            resume_grace: env.millis("BEQWATCH_HDMI_SYNC_RESUME_GRACE_MS", d.hdmi_sync.resume_grace),
        };

        let home_assistant = HomeAssistantConfig {
            enabled: env.flag("BEQWATCH_HA_ENABLED", false),
            url: env
                .string("BEQWATCH_HA_URL", "")
                .trim_end_matches('/')
                .to_string(),
            token: env.string("BEQWATCH_HA_TOKEN", ""),
            notify_endpoint: env
                .string("BEQWATCH_HA_NOTIFY_ENDPOINT", "")
                .trim_start_matches("notify.")
                .to_string(),
            trigger_lights: env.flag("BEQWATCH_HA_TRIGGER_LIGHTS", false),
            trigger_volume: env.flag("BEQWATCH_HA_TRIGGER_VOLUME", false),
        };

        let plex = PlexConfig {
            enabled: env.flag("BEQWATCH_PLEX_ENABLED", false),
            url: env
                .string("BEQWATCH_PLEX_URL", "")
                .trim_end_matches('/')
                .to_string(),
            token: env.string("BEQWATCH_PLEX_TOKEN", ""),
            player_address: env.string("BEQWATCH_PLEX_PLAYER_ADDRESS", ""),
            player_machine_id: env.string("BEQWATCH_PLEX_PLAYER_MACHINE_ID", ""),
            device_uuid_filter: env.list("BEQWATCH_PLEX_DEVICE_UUID_FILTER", Vec::new()),
            owner_name_filter: env.string("BEQWATCH_PLEX_OWNER_NAME_FILTER", ""),
        };

        Self {
            server,
            ezbeq,
            hdmi_sync,
            home_assistant,
            plex,
        }
    }
}

/// Comma separated authors; empty or `none` means no author filter.
pub fn split_authors(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("none"))
        .map(str::to_string)
        .collect()
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    warn!(key, value = %v, "invalid boolean, using default");
                    default
                }
            },
        }
    }

    fn parse<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr,
    {
        match self.get(key) {
            None => default,
            Some(v) if v.is_empty() => default,
            Some(v) => v.parse().unwrap_or_else(|_| {
                warn!(key, value = %v, "invalid value, using default");
                default
            }),
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parse(key, default.as_secs()))
    }

    fn millis(&self, key: &str, default: Duration) -> Duration {
        Duration::from_millis(self.parse(key, default.as_millis() as u64))
    }

    fn list<T>(&self, key: &str, default: Vec<T>) -> Vec<T>
    where
        T: FromStr,
    {
        let Some(raw) = self.get(key) else {
            return default;
        };
        let mut out = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.parse() {
                Ok(v) => out.push(v),
                Err(_) => {
                    warn!(key, value = %part, "invalid list entry, using default");
                    return default;
                }
            }
        }
        if out.is_empty() { default } else { out }
    }
}
