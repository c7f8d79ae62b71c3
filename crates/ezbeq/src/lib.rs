//! ezBEQ client: catalog search, device status and profile load/unload.

pub mod catalog;
pub mod devices;
pub mod http;
pub mod profile;

use std::time::Duration;

use beqwatch_core::types::{Device, SearchRequest};
use thiserror::Error;

pub use http::RetryPolicy;
pub use profile::LoadedProfile;

#[derive(Error, Debug)]
pub enum EzBeqError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("no matching entry in catalog")]
    NotFoundInCatalog,
    #[error("endpoint not found: {endpoint}")]
    NotFound { endpoint: String },
    #[error("ezbeq returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Profile operations the orchestrator needs from ezBEQ.
///
/// A load is split in two so callers can drop a stale result between the
/// catalog search and the device write.
#[async_trait::async_trait]
pub trait ProfileBackend: Send + Sync {
    /// Validate the request and search the catalog, unless a cached profile can
    /// be reused. On success `req` carries the entry id and gain to apply.
    /// Nothing is written to the devices.
    async fn resolve_profile(&self, req: &mut SearchRequest) -> Result<LoadedProfile, EzBeqError>;

    /// Write a resolved profile to every device in `req`.
    async fn apply_profile(
        &self,
        req: &SearchRequest,
        profile: &LoadedProfile,
    ) -> Result<(), EzBeqError>;

    /// Resolve then apply.
    async fn load_profile(&self, req: &mut SearchRequest) -> Result<LoadedProfile, EzBeqError> {
        let profile = self.resolve_profile(req).await?;
        self.apply_profile(req, &profile).await?;
        Ok(profile)
    }

    /// Clear every configured slot on every device.
    async fn unload_profile(&self, req: &SearchRequest) -> Result<(), EzBeqError>;

    async fn list_devices(&self) -> Result<Vec<Device>, EzBeqError>;
}

pub struct EzBeqClient {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl EzBeqClient {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl ProfileBackend for EzBeqClient {
    async fn resolve_profile(&self, req: &mut SearchRequest) -> Result<LoadedProfile, EzBeqError> {
        self.resolve(req).await
    }

    async fn apply_profile(
        &self,
        req: &SearchRequest,
        profile: &LoadedProfile,
    ) -> Result<(), EzBeqError> {
        self.apply(req, profile).await
    }

    async fn unload_profile(&self, req: &SearchRequest) -> Result<(), EzBeqError> {
        self.unload(req).await
    }

    async fn list_devices(&self) -> Result<Vec<Device>, EzBeqError> {
        self.devices().await
    }
}
