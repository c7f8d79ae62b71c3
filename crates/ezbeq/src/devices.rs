use std::collections::BTreeMap;

use beqwatch_core::types::Device;
use reqwest::Method;

use crate::{EzBeqClient, EzBeqError};

impl EzBeqClient {
    /// Enumerate devices. ezBEQ answers with a map keyed by device name.
    pub async fn devices(&self) -> Result<Vec<Device>, EzBeqError> {
        let body = self
            .send_with_retry(Method::GET, "/api/2/devices", &[], None)
            .await?;
        parse_devices(&body)
    }
}

pub(crate) fn parse_devices(body: &str) -> Result<Vec<Device>, EzBeqError> {
    let map: BTreeMap<String, Device> =
        serde_json::from_str(body).map_err(|e| EzBeqError::Decode(format!("devices: {e}")))?;
    Ok(map
        .into_iter()
        .map(|(name, mut device)| {
            if device.name.is_empty() {
                device.name = name;
            }
            device
        })
        .collect())
}
