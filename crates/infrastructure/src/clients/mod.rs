//! Reference `DeviceClient` implementations over HTTP.
//!
//! Gen1 devices expose flat `/settings` endpoints with form-encoded
//! writes; gen2/gen3 devices speak JSON-RPC on `/rpc`. Both are built
//! through [`StaticClientFactory`], which maps device ids to endpoints.

mod gen1;
mod gen2;

pub use gen1::Gen1HttpClient;
pub use gen2::Gen2RpcClient;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use domain::client::{DeviceClient, DeviceClientFactory, Generation};
use domain::error::{ConfigError, Result};
use tokio_util::sync::CancellationToken;

pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Where one device lives on the network
#[derive(Debug, Clone)]
pub struct DeviceEndpoint {
    pub address: String,
    pub generation: Generation,
    pub credentials: Option<(String, String)>,
}

impl DeviceEndpoint {
    pub fn new(address: impl Into<String>, generation: Generation) -> Self {
        Self {
            address: address.into(),
            generation,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), pass.into()));
        self
    }
}

/// Factory over a fixed endpoint table. Each call builds an independent
/// client so bulk operations never share connections across devices.
pub struct StaticClientFactory {
    endpoints: HashMap<String, DeviceEndpoint>,
    http: reqwest::Client,
}

impl StaticClientFactory {
    pub fn new(endpoints: HashMap<String, DeviceEndpoint>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::transport("failed to build http client", e))?;
        Ok(Self { endpoints, http })
    }
}

#[async_trait]
impl DeviceClientFactory for StaticClientFactory {
    async fn client_for(&self, device_id: &str) -> Result<Box<dyn DeviceClient>> {
        let endpoint = self
            .endpoints
            .get(device_id)
            .ok_or_else(|| ConfigError::DeviceNotFound(device_id.to_string()))?;

        Ok(match endpoint.generation.wire_dialect() {
            Generation::Gen1 => Box::new(Gen1HttpClient::new(self.http.clone(), endpoint.clone())),
            _ => Box::new(Gen2RpcClient::new(self.http.clone(), endpoint.clone())),
        })
    }
}

/// Await a transport future, aborting at the next await point when the
/// caller cancels. An in-flight write completes on the device side either
/// way; this only stops us from issuing more work.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = std::result::Result<T, reqwest::Error>>,
    context: &str,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ConfigError::Cancelled),
        result = fut => result.map_err(|e| ConfigError::transport(context, e)),
    }
}
