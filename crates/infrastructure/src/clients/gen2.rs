//! JSON-RPC client for generation-2/3 devices.

use async_trait::async_trait;
use domain::client::{DeviceClient, DeviceInfo, Generation};
use domain::error::{ConfigError, Result};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DeviceEndpoint, cancellable};

pub struct Gen2RpcClient {
    http: reqwest::Client,
    endpoint: DeviceEndpoint,
}

impl Gen2RpcClient {
    pub fn new(http: reqwest::Client, endpoint: DeviceEndpoint) -> Self {
        Self { http, endpoint }
    }

    async fn rpc(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let mut body = json!({"id": 1, "method": method});
        if let Some(params) = params {
            body["params"] = params;
        }

        let mut request = self
            .http
            .post(format!("http://{}/rpc", self.endpoint.address))
            .json(&body);
        if let Some((user, pass)) = &self.endpoint.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        debug!(method = %method, address = %self.endpoint.address, "rpc call");
        let response = cancellable(cancel, request.send(), "failed to reach device").await?;
        let response = response
            .error_for_status()
            .map_err(|e| ConfigError::transport("device returned an error status", e))?;
        let envelope: Value =
            cancellable(cancel, response.json(), "failed to parse rpc response").await?;

        if let Some(error) = envelope.get("error") {
            return Err(ConfigError::transport(
                &format!("rpc {} failed", method),
                error.to_string(),
            ));
        }
        Ok(envelope.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl DeviceClient for Gen2RpcClient {
    async fn get_info(&self, cancel: &CancellationToken) -> Result<DeviceInfo> {
        let info = self.rpc("Shelly.GetDeviceInfo", None, cancel).await?;
        let generation = match info.get("gen").and_then(Value::as_u64) {
            Some(3) => Generation::Gen3,
            _ => Generation::Gen2,
        };
        Ok(DeviceInfo {
            id: string_at(&info, "id").unwrap_or_default(),
            generation,
            model: string_at(&info, "model").unwrap_or_default(),
            firmware: string_at(&info, "fw_id").unwrap_or_default(),
            mac: string_at(&info, "mac").unwrap_or_default(),
            auth_enabled: info
                .get("auth_en")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    async fn get_config(&self, cancel: &CancellationToken) -> Result<Value> {
        self.rpc("Shelly.GetConfig", None, cancel).await
    }

    /// Each component key in the group payload becomes one SetConfig RPC:
    /// `switch:0` goes to `Switch.SetConfig` with the channel id, plain
    /// components to `<Component>.SetConfig`, and `auth` to
    /// `Shelly.SetAuth`.
    async fn set_config(
        &self,
        group: &str,
        payload: &Value,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some(entries) = payload.as_object() else {
            return Err(ConfigError::transport(
                "failed to encode settings group",
                format!("group {} payload is not an object", group),
            ));
        };

        for (key, config) in entries {
            if key == "auth" {
                self.rpc("Shelly.SetAuth", Some(config.clone()), cancel)
                    .await?;
                continue;
            }

            let (method, params) = match key.split_once(':') {
                Some((component, index)) => {
                    let id: u32 = index.parse().map_err(|_| {
                        ConfigError::transport(
                            "failed to encode settings group",
                            format!("bad component key '{}'", key),
                        )
                    })?;
                    (
                        format!("{}.SetConfig", capitalize(component)),
                        json!({"id": id, "config": config}),
                    )
                }
                None => (
                    format!("{}.SetConfig", rpc_component(key)),
                    json!({"config": config}),
                ),
            };
            self.rpc(&method, Some(params), cancel).await?;
        }
        Ok(())
    }

    async fn reboot(&self, cancel: &CancellationToken) -> Result<()> {
        self.rpc("Shelly.Reboot", None, cancel).await.map(|_| ())
    }

    async fn test_connection(&self, cancel: &CancellationToken) -> Result<()> {
        self.rpc("Shelly.GetDeviceInfo", None, cancel)
            .await
            .map(|_| ())
    }

    fn generation(&self) -> Generation {
        self.endpoint.generation
    }

    fn address(&self) -> &str {
        &self.endpoint.address
    }
}

fn rpc_component(key: &str) -> &'static str {
    match key {
        "sys" => "Sys",
        "wifi" => "WiFi",
        "mqtt" => "MQTT",
        "cloud" => "Cloud",
        "eth" => "Eth",
        "ble" => "BLE",
        _ => "Sys",
    }
}

fn capitalize(component: &str) -> String {
    let mut chars = component.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
