use std::sync::Arc;

use beqwatch_clients::{DenonClient, HomeAssistantClient, PlexClient};
use beqwatch_core::config::{Config, EzBeqConfig};
use beqwatch_core::types::{Device, SearchRequest};
use beqwatch_engine::Collaborators;
use beqwatch_ezbeq::{EzBeqClient, ProfileBackend, RetryPolicy};
use tracing::{info, warn};

/// Build the clients for every enabled integration.
pub fn build_collaborators(config: &Config) -> Collaborators {
    let mut c = Collaborators::default();

    if config.ezbeq.enabled {
        let retry = RetryPolicy {
            attempts: config.ezbeq.retry_attempts,
            delay: config.ezbeq.retry_delay,
        };
        c.profiles = Some(Arc::new(EzBeqClient::new(&config.ezbeq.url, retry)));
        info!(url = %config.ezbeq.url, dry_run = config.ezbeq.dry_run, "ezBEQ enabled");
    }

    if config.plex.enabled {
        let plex = Arc::new(PlexClient::new(&config.plex));
        c.media_server = Some(plex.clone());
        c.player = Some(plex);
        info!(url = %config.plex.url, "Plex enabled");
    }

    if config.home_assistant.enabled {
        let ha = Arc::new(HomeAssistantClient::new(&config.home_assistant));
        c.notifier = Some(ha.clone());
        c.signal = Some(ha.clone());
        c.events = Some(ha);
        info!(url = %config.home_assistant.url, "Home Assistant enabled");
    }

    if config.ezbeq.use_avr_codec {
        if config.ezbeq.avr_address.is_empty() {
            warn!("AVR codec lookup enabled but no AVR address configured");
        } else {
            c.avr = Some(Arc::new(DenonClient::new(&config.ezbeq.avr_address)));
        }
    }

    c
}

/// List the ezBEQ devices and clear every configured slot on them, so no
/// profile from a previous run stays loaded.
///
/// Failures are logged; the server still starts with whatever was found.
pub async fn discover_devices(profiles: &dyn ProfileBackend, config: &EzBeqConfig) -> Vec<Device> {
    let devices = match profiles.list_devices().await {
        Ok(devices) => devices,
        Err(e) => {
            warn!(error = %e, "failed to list ezBEQ devices");
            return Vec::new();
        }
    };
    if devices.is_empty() {
        warn!("ezBEQ reports no devices, profiles cannot be loaded");
        return devices;
    }

    let req = SearchRequest {
        devices: devices.iter().map(|d| d.name.clone()).collect(),
        slots: config.slots.clone(),
        dry_run: config.dry_run,
        ..Default::default()
    };
    match profiles.unload_profile(&req).await {
        Ok(()) => info!(devices = ?req.devices, slots = ?req.slots, "cleared ezBEQ slots"),
        Err(e) => warn!(error = %e, "startup unload failed"),
    }
    devices
}
