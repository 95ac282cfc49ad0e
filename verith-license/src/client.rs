//! Client for the remote licensing authority.
//!
//! Speaks the Lemon Squeezy license API:
//! - `POST /v1/licenses/activate` exchanges a key for an activation instance
//! - `POST /v1/licenses/validate` reports whether a key is still honoured
//!
//! Each endpoint has its own response type; the two are never decoded
//! through a shared loosely-typed structure.

use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult};
use crate::record::mask_key;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// The operations the license manager needs from the licensing server.
pub trait LicenseApi: Send + Sync {
    /// Activates `key` for the instance called `instance_name`.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Network`] on transport failure,
    /// [`LicenseError::Protocol`] on an unreadable response,
    /// [`LicenseError::ActivationRejected`] when the server declines the key.
    fn activate(&self, key: &str, instance_name: &str) -> LicenseResult<ActivationReceipt>;

    /// Asks whether `key` (optionally bound to `instance_id`) is still valid.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Network`] on transport failure,
    /// [`LicenseError::Protocol`] on an unreadable response.
    fn validate(&self, key: &str, instance_id: Option<&str>) -> LicenseResult<ValidationVerdict>;
}

/// License status as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteLicenseStatus {
    Active,
    Inactive,
    Expired,
    Disabled,
    #[serde(other)]
    Unknown,
}

/// License key object embedded in both responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteLicenseKey {
    #[serde(default)]
    pub status: Option<RemoteLicenseStatus>,
    #[serde(default)]
    pub key: Option<String>,
}

/// Activation instance object embedded in both responses.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteInstance {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `POST /v1/licenses/activate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivateResponse {
    #[serde(default)]
    pub activated: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, alias = "license")]
    pub license_key: Option<RemoteLicenseKey>,
    #[serde(default)]
    pub instance: Option<RemoteInstance>,
}

/// Body of `POST /v1/licenses/validate`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateResponse {
    #[serde(default)]
    pub valid: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, alias = "license")]
    pub license_key: Option<RemoteLicenseKey>,
    #[serde(default)]
    pub instance: Option<RemoteInstance>,
}

/// A successful activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReceipt {
    /// Instance id assigned by the server, if it sent one.
    pub instance_id: Option<String>,
    /// Status of the key right after activation, if reported.
    pub status: Option<RemoteLicenseStatus>,
}

/// The server's answer to a revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationVerdict {
    /// The server's `valid` flag.
    pub valid: bool,
    /// Effective status of the key.
    pub status: RemoteLicenseStatus,
}

impl ValidationVerdict {
    /// Only an `active` key keeps the local license active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RemoteLicenseStatus::Active
    }
}

impl ActivateResponse {
    /// Interprets the response.
    ///
    /// # Errors
    ///
    /// [`LicenseError::ActivationRejected`] for a server-side error or
    /// `activated = false`, [`LicenseError::Protocol`] when the body says neither.
    pub fn into_receipt(self) -> LicenseResult<ActivationReceipt> {
        if let Some(message) = self.error.filter(|m| !m.trim().is_empty()) {
            return Err(LicenseError::ActivationRejected(message));
        }
        match self.activated {
            Some(true) => Ok(ActivationReceipt {
                instance_id: self.instance.map(|i| i.id).filter(|id| !id.is_empty()),
                status: self.license_key.and_then(|k| k.status),
            }),
            Some(false) => Err(LicenseError::ActivationRejected(
                "the key is valid but could not be activated (activation limit reached?)"
                    .to_string(),
            )),
            None => Err(LicenseError::Protocol(
                "activation response has neither `activated` nor `error`".to_string(),
            )),
        }
    }
}

impl ValidateResponse {
    /// Interprets the response.
    ///
    /// A remote error still carries the key's status when the server knows
    /// it ("expired"); otherwise the key counts as inactive.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Protocol`] when the body has neither `valid` nor `error`.
    pub fn into_verdict(self) -> LicenseResult<ValidationVerdict> {
        let reported = self.license_key.and_then(|k| k.status);
        let has_error = self.error.is_some_and(|m| !m.trim().is_empty());

        if has_error {
            return Ok(ValidationVerdict {
                valid: false,
                status: reported.unwrap_or(RemoteLicenseStatus::Inactive),
            });
        }

        match self.valid {
            Some(true) => Ok(ValidationVerdict {
                valid: true,
                status: reported.unwrap_or(RemoteLicenseStatus::Active),
            }),
            Some(false) => Ok(ValidationVerdict {
                valid: false,
                status: match reported {
                    Some(RemoteLicenseStatus::Active) | None => RemoteLicenseStatus::Inactive,
                    Some(other) => other,
                },
            }),
            None => Err(LicenseError::Protocol(
                "validation response has neither `valid` nor `error`".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct ActivateRequest<'a> {
    license_key: &'a str,
    instance_name: &'a str,
}

#[derive(Debug, Serialize)]
struct ValidateRequest<'a> {
    license_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instance_id: Option<&'a str>,
}

/// Blocking HTTP client for the Lemon Squeezy license API.
///
/// Must not be used from inside an async runtime; run it on a plain thread
/// (or `spawn_blocking`).
#[derive(Debug, Clone)]
pub struct LemonSqueezyClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    activation_timeout: Duration,
    validation_timeout: Duration,
}

impl LemonSqueezyClient {
    /// Creates a client from the API settings in `config`.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Network`] if the HTTP client cannot be initialised
    /// (e.g. no TLS backend).
    pub fn new(config: &LicenseConfig) -> LicenseResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("verith-license/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LicenseError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            activation_timeout: Duration::from_secs(config.activation_timeout_secs),
            validation_timeout: Duration::from_secs(config.validation_timeout_secs),
        })
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/v1/licenses/{action}", self.base_url)
    }

    /// POSTs `body` as JSON and returns the response text of any
    /// non-infrastructure status.
    fn post_json<T: Serialize>(
        &self,
        url: &str,
        body: &T,
        timeout: Duration,
    ) -> LicenseResult<String> {
        let mut request = self
            .client
            .post(url)
            .timeout(timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                LicenseError::Network(format!("request to {url} timed out after {timeout:?}"))
            } else {
                LicenseError::Network(format!("licensing server unreachable: {e}"))
            }
        })?;

        let status = response.status();
        if is_infrastructure_failure(status) {
            return Err(LicenseError::Network(format!("licensing server returned {status}")));
        }

        response
            .text()
            .map_err(|e| LicenseError::Network(format!("failed to read response body: {e}")))
    }
}

/// Statuses that describe the path to the server or our own credentials,
/// not the license. A rejected API key must never read as a revoked license.
fn is_infrastructure_failure(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

impl LicenseApi for LemonSqueezyClient {
    fn activate(&self, key: &str, instance_name: &str) -> LicenseResult<ActivationReceipt> {
        let url = self.endpoint("activate");
        debug!(
            "Activating license {} as instance {instance_name:?}",
            mask_key(key).unwrap_or_default()
        );

        let body = self.post_json(
            &url,
            &ActivateRequest {
                license_key: key,
                instance_name,
            },
            self.activation_timeout,
        )?;

        let response: ActivateResponse = serde_json::from_str(&body)
            .map_err(|e| LicenseError::Protocol(format!("invalid activation response: {e}")))?;
        response.into_receipt()
    }

    fn validate(&self, key: &str, instance_id: Option<&str>) -> LicenseResult<ValidationVerdict> {
        let url = self.endpoint("validate");
        debug!("Validating license {}", mask_key(key).unwrap_or_default());

        let body = self.post_json(
            &url,
            &ValidateRequest {
                license_key: key,
                instance_id: instance_id.filter(|id| !id.is_empty()),
            },
            self.validation_timeout,
        )?;

        let response: ValidateResponse = serde_json::from_str(&body)
            .map_err(|e| LicenseError::Protocol(format!("invalid validation response: {e}")))?;
        response.into_verdict()
    }
}
