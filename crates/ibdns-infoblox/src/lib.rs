// # Infoblox Record Store
//
// This crate implements `RecordStore` over the Infoblox WAPI REST interface.
//
// ## Behavior
//
// - One HTTP request per store call
// - No retry, backoff or caching: every failure goes straight back to the
//   reconciler
// - HTTP basic authentication; the password never appears in logs or
//   `Debug` output
// - Optional TLS verification bypass for grid masters with self-signed
//   certificates
//
// ## API Reference
//
// Base path: `<url>/wapi/v<version>/`
//
// - Create: POST `record:<type>?_return_fields=...` with the record body
// - Read: GET `<_ref>?_return_fields=...`
// - Update: PUT `<_ref>?_return_fields=...` with the mutable fields
// - Delete: DELETE `<_ref>`
//
// Create, update and delete answer with the object's `_ref`, either as a
// bare JSON string or inside the returned object.

use async_trait::async_trait;
use ibdns_core::config::StoreConfig;
use ibdns_core::record::{RecordBody, RecordType, RemoteRecord};
use ibdns_core::traits::{RecordStore, RecordStoreFactory};
use ibdns_core::{Error, Result};
use serde_json::Value;
use std::time::Duration;

/// Store type name used in configuration and the registry
pub const STORE_NAME: &str = "infoblox";

/// WAPI object type for a record type
pub fn object_type(record_type: RecordType) -> &'static str {
    match record_type {
        RecordType::A => "record:a",
        RecordType::Aaaa => "record:aaaa",
        RecordType::Cname => "record:cname",
        RecordType::Host => "record:host",
    }
}

/// Error document returned by WAPI on failure
#[derive(Debug, serde::Deserialize)]
struct WapiError {
    #[serde(rename = "Error", default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl WapiError {
    fn message(&self) -> Option<String> {
        self.text.clone().or_else(|| self.error.clone())
    }

    fn is_not_found(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| code.ends_with("NotFound"))
            || self
                .error
                .as_deref()
                .is_some_and(|e| e.contains("NotFoundError"))
    }
}

/// Infoblox WAPI record store
pub struct InfobloxStore {
    /// `<url>/wapi/v<version>`, without a trailing slash
    base_url: String,

    username: String,

    /// ⚠️ NEVER log this value
    password: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for InfobloxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfobloxStore")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl InfobloxStore {
    /// Create a new Infoblox store
    ///
    /// # Parameters
    ///
    /// - `url`: Grid master URL, e.g. `https://gridmaster.example.com`
    /// - `wapi_version`: WAPI version, e.g. `2.7`
    /// - `ssl_verify`: Verify the grid master's TLS certificate
    /// - `timeout`: Per-request timeout
    pub fn new(
        url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        wapi_version: &str,
        ssl_verify: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.is_empty() || password.is_empty() {
            return Err(Error::config("Infoblox username and password are required"));
        }

        if !ssl_verify {
            tracing::warn!("TLS certificate verification disabled for {}", url);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!ssl_verify)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: format!("{}/wapi/v{}", url.trim_end_matches('/'), wapi_version),
            username,
            password,
            client,
        })
    }

    /// Base URL of the WAPI endpoint
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        return_fields: &[&str],
    ) -> reqwest::RequestBuilder {
        let request = self
            .client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password));

        if return_fields.is_empty() {
            request
        } else {
            request.query(&[("_return_fields", return_fields.join(","))])
        }
    }

    /// Send a request and decode the JSON answer
    ///
    /// `what` names the operation in error messages.
    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                Error::provider(STORE_NAME, format!("Failed to parse response: {}", e))
            });
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        Err(status_error(status, &body, what))
    }

    async fn send_for_ref(&self, request: reqwest::RequestBuilder, what: &str) -> Result<String> {
        let value = self.send(request, what).await?;
        reference_from(&value)
    }
}

/// Map a non-success response to an error
fn status_error(status: reqwest::StatusCode, body: &str, what: &str) -> Error {
    let wapi = serde_json::from_str::<WapiError>(body).ok();
    let detail = wapi
        .as_ref()
        .and_then(WapiError::message)
        .unwrap_or_else(|| body.to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid credentials or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(format!("{}: {}", what, detail)),
        _ if wapi.as_ref().is_some_and(WapiError::is_not_found) => {
            Error::not_found(format!("{}: {}", what, detail))
        }
        _ => Error::provider(
            STORE_NAME,
            format!("{} failed: {} - {}", what, status, detail),
        ),
    }
}

/// Extract `_ref` from a bare string or a returned object
fn reference_from(value: &Value) -> Result<String> {
    match value {
        Value::String(reference) => Ok(reference.clone()),
        Value::Object(object) => object
            .get("_ref")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::provider(STORE_NAME, "Invalid response format: missing _ref")
            }),
        _ => Err(Error::provider(
            STORE_NAME,
            "Invalid response format: expected a reference",
        )),
    }
}

#[async_trait]
impl RecordStore for InfobloxStore {
    async fn create_record(
        &self,
        record_type: RecordType,
        body: &RecordBody,
        return_fields: &[&str],
    ) -> Result<String> {
        let object = object_type(record_type);
        tracing::debug!("POST {} for {}", object, body.name());

        let request = self
            .request(reqwest::Method::POST, object, return_fields)
            .json(body);
        self.send_for_ref(request, &format!("Create {}", object))
            .await
    }

    async fn get_record(
        &self,
        record_type: RecordType,
        id: &str,
        return_fields: &[&str],
    ) -> Result<RemoteRecord> {
        tracing::debug!("GET {} ({})", id, object_type(record_type));

        let request = self.request(reqwest::Method::GET, id, return_fields);
        let value = self.send(request, &format!("Get {}", id)).await?;

        // Searches answer with a list; a reference lookup with one object
        let value = match value {
            Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
            Value::Array(_) => {
                return Err(Error::not_found(format!("Get {}: no such record", id)));
            }
            other => other,
        };

        serde_json::from_value(value).map_err(|e| {
            Error::provider(STORE_NAME, format!("Failed to parse record {}: {}", id, e))
        })
    }

    async fn update_record(
        &self,
        record_type: RecordType,
        id: &str,
        body: &RecordBody,
        return_fields: &[&str],
    ) -> Result<String> {
        tracing::debug!("PUT {} ({})", id, object_type(record_type));

        let request = self
            .request(reqwest::Method::PUT, id, return_fields)
            .json(body);
        self.send_for_ref(request, &format!("Update {}", id)).await
    }

    async fn delete_record(&self, record_type: RecordType, id: &str) -> Result<()> {
        tracing::debug!("DELETE {} ({})", id, object_type(record_type));

        let request = self.request(reqwest::Method::DELETE, id, &[]);
        self.send(request, &format!("Delete {}", id)).await?;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// Factory for creating Infoblox stores
pub struct InfobloxFactory;

impl RecordStoreFactory for InfobloxFactory {
    fn create(&self, config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
        match config {
            StoreConfig::Infoblox {
                url,
                username,
                password,
                wapi_version,
                ssl_verify,
                timeout_secs,
            } => {
                config.validate()?;
                Ok(Box::new(InfobloxStore::new(
                    url,
                    username.clone(),
                    password.clone(),
                    wapi_version,
                    *ssl_verify,
                    Duration::from_secs(*timeout_secs),
                )?))
            }
            _ => Err(Error::config("Invalid config for Infoblox store")),
        }
    }
}

/// Register the Infoblox store with a registry
///
/// # Example
///
/// ```rust
/// use ibdns_core::StoreRegistry;
///
/// let registry = StoreRegistry::new();
/// ibdns_infoblox::register(&registry);
/// assert!(registry.has_store("infoblox"));
/// ```
pub fn register(registry: &ibdns_core::StoreRegistry) {
    registry.register_store(STORE_NAME, Box::new(InfobloxFactory));
}
