//! HTTP client for generation-1 devices (flat settings endpoints).

use async_trait::async_trait;
use domain::client::{DeviceClient, DeviceInfo, Generation};
use domain::error::{ConfigError, Result};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{DeviceEndpoint, cancellable};

pub struct Gen1HttpClient {
    http: reqwest::Client,
    endpoint: DeviceEndpoint,
}

impl Gen1HttpClient {
    pub fn new(http: reqwest::Client, endpoint: DeviceEndpoint) -> Self {
        Self { http, endpoint }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.endpoint.address, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self.http.get(self.url(path));
        if let Some((user, pass)) = &self.endpoint.credentials {
            request = request.basic_auth(user, Some(pass));
        }
        request
    }

    fn post_form(&self, path: &str, form: &[(String, String)]) -> reqwest::RequestBuilder {
        let mut request = self.http.post(self.url(path)).form(form);
        if let Some((user, pass)) = &self.endpoint.credentials {
            request = request.basic_auth(user, Some(pass));
        }
        request
    }

    async fn fetch_json(&self, path: &str, cancel: &CancellationToken) -> Result<Value> {
        let response = cancellable(cancel, self.get(path).send(), "failed to reach device").await?;
        let response = response
            .error_for_status()
            .map_err(|e| ConfigError::transport("device returned an error status", e))?;
        cancellable(cancel, response.json(), "failed to parse device response").await
    }

    async fn submit(
        &self,
        path: &str,
        form: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(path = %path, fields = form.len(), "writing gen1 settings");
        let response = cancellable(
            cancel,
            self.post_form(path, form).send(),
            "failed to reach device",
        )
        .await?;
        response
            .error_for_status()
            .map_err(|e| ConfigError::transport("device rejected settings", e))?;
        Ok(())
    }
}

#[async_trait]
impl DeviceClient for Gen1HttpClient {
    async fn get_info(&self, cancel: &CancellationToken) -> Result<DeviceInfo> {
        let identity = self.fetch_json("/shelly", cancel).await?;
        Ok(DeviceInfo {
            id: string_at(&identity, "mac").unwrap_or_default(),
            generation: Generation::Gen1,
            model: string_at(&identity, "type").unwrap_or_default(),
            firmware: string_at(&identity, "fw").unwrap_or_default(),
            mac: string_at(&identity, "mac").unwrap_or_default(),
            auth_enabled: identity
                .get("auth")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }

    async fn get_config(&self, cancel: &CancellationToken) -> Result<Value> {
        self.fetch_json("/settings", cancel).await
    }

    /// A wire group fans out to the subsystem endpoints it touches:
    /// nested sections post to `/settings/<subsystem>`, channel arrays to
    /// `/settings/<subsystem>/<index>`, and flat keys to `/settings`.
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

        let mut flat: Vec<(String, String)> = Vec::new();
        for (key, value) in entries {
            match (subsystem_path(key), value) {
                (Some(path), Value::Array(items)) => {
                    for (index, item) in items.iter().enumerate() {
                        let form = flatten(item);
                        self.submit(&format!("{}/{}", path, index), &form, cancel)
                            .await?;
                    }
                }
                (Some(path), value) => {
                    let form = flatten(value);
                    self.submit(path, &form, cancel).await?;
                }
                (None, value) => flat.push((key.clone(), scalar_to_form(value))),
            }
        }

        if !flat.is_empty() {
            self.submit("/settings", &flat, cancel).await?;
        }
        Ok(())
    }

    async fn reboot(&self, cancel: &CancellationToken) -> Result<()> {
        let response =
            cancellable(cancel, self.get("/reboot").send(), "failed to reach device").await?;
        response
            .error_for_status()
            .map_err(|e| ConfigError::transport("reboot request failed", e))?;
        Ok(())
    }

    async fn test_connection(&self, cancel: &CancellationToken) -> Result<()> {
        self.fetch_json("/shelly", cancel).await.map(|_| ())
    }

    fn generation(&self) -> Generation {
        Generation::Gen1
    }

    fn address(&self) -> &str {
        &self.endpoint.address
    }
}

fn subsystem_path(wire_key: &str) -> Option<&'static str> {
    match wire_key {
        "wifi_sta" => Some("/settings/sta"),
        "wifi_ap" => Some("/settings/ap"),
        "mqtt" => Some("/settings/mqtt"),
        "login" => Some("/settings/login"),
        "cloud" => Some("/settings/cloud"),
        "coiot" => Some("/settings/coiot"),
        "sntp" => Some("/settings/sntp"),
        "relays" => Some("/settings/relay"),
        "inputs" => Some("/settings/input"),
        "rollers" => Some("/settings/roller"),
        _ => None,
    }
}

/// Gen1 write endpoints take urlencoded scalars, one level deep.
fn flatten(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), scalar_to_form(v)))
            .collect(),
        other => vec![("value".to_string(), scalar_to_form(other))],
    }
}

fn scalar_to_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
