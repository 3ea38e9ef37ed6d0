//! Configuration types for the bridge oracle.

use std::{fmt, path::Path, time::Duration};

use alloy_primitives::Address;
use bridge_relay_client::RelayClient;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    decoder::{DEPOSIT_EVENT_SIGNATURE, EventDecoder},
    error::{Error, Result},
    eth_source::EthLedgerSource,
    relay_loop::RelaySettings,
    retry::RetryPolicy,
};

/// Environment variable overriding `destination.api_key`.
pub const API_KEY_ENV: &str = "DESTINATION_API_KEY";

/// Oracle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Chain id of the source ledger, reported in relay payloads.
    pub source_chain_id: u64,
    /// Wait between polls that returned no logs.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Port of the Prometheus exporter. Disabled when absent.
    pub metrics_port: Option<u16>,
    /// Source ledger.
    pub source: SourceConfig,
    /// Destination relay endpoint.
    pub destination: DestinationConfig,
    /// Backoff between delivery attempts of one deposit.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Backoff between reconnection attempts to the source ledger.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

/// Source ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// HTTP JSON-RPC URL.
    pub rpc_url: Url,
    /// Bridge contract address.
    pub contract_address: Address,
    /// Deposit event signature, hashed into topic0.
    #[serde(default = "default_event_signature")]
    pub event_signature: String,
    /// First block to scan. Defaults to the head at startup.
    pub start_block: Option<u64>,
    /// Timeout of a single RPC request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Blocks covered by one `eth_getLogs` request.
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
}

/// Destination relay endpoint configuration.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationConfig {
    /// Relay endpoint URL.
    pub url: Url,
    /// API key sent in the `X-API-KEY` header.
    #[serde(default)]
    pub api_key: String,
    /// Timeout of a single relay request.
    #[serde(default = "default_destination_timeout_ms")]
    pub timeout_ms: u64,
}

impl fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("url", &self.url.as_str())
            .field("timeout_ms", &self.timeout_ms)
            .finish_non_exhaustive()
    }
}

/// Delivery retry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Attempts per deposit, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: 3,
        }
    }
}

/// Reconnection backoff configuration. Reconnection never gives up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconnectConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 15_000,
            max_delay_ms: 120_000,
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_event_signature() -> String {
    DEPOSIT_EVENT_SIGNATURE.to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_block_range() -> u64 {
    1_000
}

fn default_destination_timeout_ms() -> u64 {
    10_000
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml_edit::de::from_str(s)?)
    }

    /// Replaces the destination API key when `api_key` is set and not blank.
    pub fn override_api_key(&mut self, api_key: Option<String>) {
        if let Some(api_key) = api_key.filter(|key| !key.trim().is_empty()) {
            self.destination.api_key = api_key;
        }
    }

    /// Checks values deserialization cannot.
    pub fn validate(&self) -> Result<()> {
        check_http_url("source.rpc_url", &self.source.rpc_url)?;
        check_http_url("destination.url", &self.destination.url)?;
        check_event_signature(&self.source.event_signature)?;

        if self.destination.api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "destination.api_key is empty, set it in the config file or via {API_KEY_ENV}"
            )));
        }

        for (name, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("source.request_timeout_ms", self.source.request_timeout_ms),
            ("source.max_block_range", self.source.max_block_range),
            ("destination.timeout_ms", self.destination.timeout_ms),
            ("retry.base_delay_ms", self.retry.base_delay_ms),
            ("reconnect.base_delay_ms", self.reconnect.base_delay_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be greater than zero".to_string(),
            ));
        }

        for (name, base, max) in [
            ("retry", self.retry.base_delay_ms, self.retry.max_delay_ms),
            (
                "reconnect",
                self.reconnect.base_delay_ms,
                self.reconnect.max_delay_ms,
            ),
        ] {
            if base > max {
                return Err(Error::Config(format!(
                    "{name}.base_delay_ms ({base}) exceeds {name}.max_delay_ms ({max})"
                )));
            }
        }

        Ok(())
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            rpc_url: self.source.rpc_url.clone(),
            contract: self.source.contract_address,
            decoder: EventDecoder::new(&self.source.event_signature),
            source_chain_id: self.source_chain_id,
            start_block: self.source.start_block,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            delivery_policy: RetryPolicy::new(
                Duration::from_millis(self.retry.base_delay_ms),
                Duration::from_millis(self.retry.max_delay_ms),
                self.retry.max_attempts,
            ),
            reconnect_policy: RetryPolicy::unbounded(
                Duration::from_millis(self.reconnect.base_delay_ms),
                Duration::from_millis(self.reconnect.max_delay_ms),
            ),
        }
    }

    pub fn ledger_source(&self) -> EthLedgerSource {
        EthLedgerSource::new(
            Duration::from_millis(self.source.request_timeout_ms),
            self.source.max_block_range,
        )
    }

    pub fn relay_client(&self) -> Result<RelayClient> {
        Ok(
            RelayClient::new(self.destination.url.clone(), &self.destination.api_key)?
                .with_timeout(Duration::from_millis(self.destination.timeout_ms)),
        )
    }
}

fn check_http_url(name: &str, url: &Url) -> Result<()> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::Config(format!(
            "{name} must be an http(s) URL, got scheme '{scheme}'"
        ))),
    }
}

/// Accepts `Name(type,...)` with an identifier name and no whitespace.
fn check_event_signature(signature: &str) -> Result<()> {
    let invalid = || {
        Error::Config(format!(
            "source.event_signature '{signature}' is not of the form Name(type,...)"
        ))
    };

    let (name, params) = signature.split_once('(').ok_or_else(invalid)?;
    let params = params.strip_suffix(')').ok_or_else(invalid)?;

    let mut name_chars = name.chars();
    let starts_ok = name_chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !starts_ok || !name_chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid());
    }
    if params.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    Ok(())
}
