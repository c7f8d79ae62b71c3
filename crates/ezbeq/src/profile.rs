use beqwatch_core::types::{CodecName, SearchRequest};
use reqwest::Method;
use serde::Serialize;
use tracing::{debug, info};

use crate::{EzBeqClient, EzBeqError};

/// What a successful load applied (or would have applied, in dry-run mode).
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProfile {
    pub entry_id: String,
    pub mv_adjust: f64,
    pub codec: CodecName,
    pub title: String,
    pub author: String,
    /// False when a cached entry was reused.
    pub searched: bool,
    pub dry_run: bool,
}

impl LoadedProfile {
    pub fn describe(&self) -> String {
        let prefix = if self.dry_run { "Dry run: would load" } else { "Loaded" };
        let author = if self.author.is_empty() {
            String::new()
        } else {
            format!(" by {}", self.author)
        };
        format!(
            "{prefix} BEQ profile {} ({}){author}, entry {}, master volume adjust {}",
            self.title, self.codec, self.entry_id, self.mv_adjust
        )
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DevicePatch {
    mute: bool,
    master_volume: f64,
    slots: Vec<SlotPatch>,
}

#[derive(Debug, Serialize)]
struct SlotPatch {
    id: String,
    active: bool,
    gains: [f64; 2],
    mutes: [bool; 2],
    entry: String,
}

fn slots_or_default(slots: &[u32]) -> Vec<u32> {
    if slots.is_empty() { vec![1] } else { slots.to_vec() }
}

fn device_patch(req: &SearchRequest) -> DevicePatch {
    DevicePatch {
        mute: false,
        master_volume: 0.0,
        slots: slots_or_default(&req.slots)
            .into_iter()
            .map(|slot| SlotPatch {
                id: slot.to_string(),
                active: true,
                gains: [req.mv_adjust, req.mv_adjust],
                mutes: [false, false],
                entry: req.entry_id.clone(),
            })
            .collect(),
    }
}

impl EzBeqClient {
    /// Pick the profile for `req`: the cached entry when `skip_search` allows it,
    /// otherwise the best catalog match.
    pub async fn resolve(&self, req: &mut SearchRequest) -> Result<LoadedProfile, EzBeqError> {
        if req.devices.is_empty() {
            return Err(EzBeqError::Validation("no ezbeq devices".into()));
        }
        if req.tmdb.is_empty() {
            return Err(EzBeqError::Validation("no tmdb id".into()));
        }
        if !req.has_cached_profile() {
            req.skip_search = false;
        }

        let mut author = String::new();
        let mut title = req.title.clone();
        if req.skip_search {
            debug!(entry_id = %req.entry_id, "reusing cached profile");
        } else {
            let found = self.search_catalog(req).await?;
            req.entry_id = found.entry.id;
            req.mv_adjust = found.entry.mv_adjust;
            req.codec = found.codec;
            author = found.entry.author;
            if !found.entry.title.is_empty() {
                title = found.entry.title;
            }
        }

        Ok(LoadedProfile {
            entry_id: req.entry_id.clone(),
            mv_adjust: req.mv_adjust,
            codec: req.codec,
            title,
            author,
            searched: !req.skip_search,
            dry_run: req.dry_run,
        })
    }

    /// PATCH the resolved entry onto every device. Dry runs only log.
    pub async fn apply(&self, req: &SearchRequest, profile: &LoadedProfile) -> Result<(), EzBeqError> {
        if req.dry_run {
            info!("{}", profile.describe());
            return Ok(());
        }
        if req.devices.is_empty() {
            return Err(EzBeqError::Validation("no ezbeq devices".into()));
        }

        let body = serde_json::to_value(device_patch(req))
            .map_err(|e| EzBeqError::Decode(format!("encode patch: {e}")))?;
        for device in &req.devices {
            let path = format!("/api/2/devices/{device}");
            self.send_with_retry(Method::PATCH, &path, &[], Some(&body))
                .await?;
            debug!(device = %device, entry_id = %req.entry_id, "profile written");
        }

        info!(entry_id = %profile.entry_id, codec = %profile.codec, devices = req.devices.len(), "BEQ profile loaded");
        Ok(())
    }

    /// Clear every (device, slot) pair. A slot that is already empty is not an error.
    pub async fn unload(&self, req: &SearchRequest) -> Result<(), EzBeqError> {
        if req.dry_run {
            debug!("dry run, skipping unload");
            return Ok(());
        }
        if req.devices.is_empty() {
            return Err(EzBeqError::Validation("no ezbeq devices".into()));
        }

        for device in &req.devices {
            for slot in slots_or_default(&req.slots) {
                let path = format!("/api/1/devices/{device}/filter/{slot}");
                match self.send_with_retry(Method::DELETE, &path, &[], None).await {
                    Ok(_) => debug!(device = %device, slot, "profile unloaded"),
                    Err(EzBeqError::NotFound { .. }) => {
                        debug!(device = %device, slot, "no profile to unload")
                    }
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_body_has_one_slot_per_index() {
        let req = SearchRequest {
            entry_id: "abc".into(),
            mv_adjust: -2.5,
            slots: vec![1, 2],
            ..Default::default()
        };
        let json = serde_json::to_value(device_patch(&req)).unwrap();
        assert_eq!(json["mute"], false);
        assert_eq!(json["masterVolume"], 0.0);
        let slots = json["slots"].as_array().unwrap();
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1]["id"], "2");
        assert_eq!(slots[0]["gains"], serde_json::json!([-2.5, -2.5]));
        assert_eq!(slots[0]["mutes"], serde_json::json!([false, false]));
        assert_eq!(slots[0]["entry"], "abc");
        assert_eq!(slots[0]["active"], true);
    }

    #[test]
    fn no_slots_defaults_to_first() {
        let json = serde_json::to_value(device_patch(&SearchRequest::default())).unwrap();
        assert_eq!(json["slots"][0]["id"], "1");
    }

    #[test]
    fn dry_run_description() {
        let p = LoadedProfile {
            entry_id: "e1".into(),
            mv_adjust: -1.0,
            codec: CodecName::Atmos,
            title: "Dune".into(),
            author: "aron7awol".into(),
            searched: true,
            dry_run: true,
        };
        let text = p.describe();
        assert!(text.starts_with("Dry run: would load"));
        assert!(text.contains("aron7awol"));
    }
}
