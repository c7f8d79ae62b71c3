//! Home Assistant REST client: notifications, entity state, events.

use std::time::Duration;

use async_trait::async_trait;
use beqwatch_core::config::{HomeAssistantConfig, SyncSource};
use serde::Deserialize;
use tracing::debug;

use crate::{ClientError, EventSink, Notifier, SignalReader};

pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    notify_endpoint: String,
    client: reqwest::Client,
}

#[derive(Debug, Default, Deserialize)]
struct EntityState {
    #[serde(default)]
    state: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

fn truthy(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

impl EntityState {
    fn signal_present(&self, source: SyncSource) -> bool {
        match source {
            SyncSource::Remote => truthy(self.attributes.get("is_signal")),
            SyncSource::Jvc => truthy(self.attributes.get("signal_status")),
            SyncSource::Sensor => self.state.eq_ignore_ascii_case("on"),
            SyncSource::Time => false,
        }
    }
}

impl HomeAssistantClient {
    pub fn new(config: &HomeAssistantConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            notify_endpoint: config.notify_endpoint.clone(),
            client,
        }
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Home Assistant request");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClientError::Status {
                service: "home assistant",
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn entity_state(&self, entity_id: &str) -> Result<EntityState, ClientError> {
        let url = format!("{}/api/states/{}", self.base_url, entity_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ClientError::Status {
                service: "home assistant",
                status: resp.status().as_u16(),
            });
        }

        resp.json()
            .await
            .map_err(|e| ClientError::Decode(format!("entity {entity_id}: {e}")))
    }
}

#[async_trait]
impl Notifier for HomeAssistantClient {
    async fn notify(&self, message: &str) -> Result<(), ClientError> {
        if self.notify_endpoint.is_empty() {
            return Err(ClientError::NotConfigured("notify endpoint".into()));
        }
        let path = format!("/api/services/notify/{}", self.notify_endpoint);
        self.post(&path, &serde_json::json!({ "message": message }))
            .await
    }
}

#[async_trait]
impl SignalReader for HomeAssistantClient {
    async fn signal_present(&self, entity: &str, source: SyncSource) -> Result<bool, ClientError> {
        if source == SyncSource::Time {
            return Err(ClientError::NotConfigured(
                "time sync source has no entity".into(),
            ));
        }
        let entity_id = format!("{}.{}", source.entity_domain(), entity);
        let state = self.entity_state(&entity_id).await?;
        let present = state.signal_present(source);
        debug!(entity = %entity_id, present, "signal state");
        Ok(present)
    }
}

#[async_trait]
impl EventSink for HomeAssistantClient {
    async fn fire_event(
        &self,
        event_type: &str,
        data: serde_json::Value,
    ) -> Result<(), ClientError> {
        self.post(&format!("/api/events/{event_type}"), &data).await
    }
}
