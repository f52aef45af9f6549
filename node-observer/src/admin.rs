use std::time::Duration;

use log::{debug, warn};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::model::{BlockType, ReturnType};

pub const KILL_NODE_ON_PRODUCER_PATH: &str = "v1/test_control/kill_node_on_producer";
pub const GET_RUNTIME_OPTIONS_PATH: &str = "v1/producer/get_runtime_options";
pub const UPDATE_RUNTIME_OPTIONS_PATH: &str = "v1/producer/update_runtime_options";

/// Configuration for the admin HTTP client
#[derive(Debug, Clone)]
pub struct AdminClientConfig {
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
}

impl Default for AdminClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

/// Body of an admin endpoint answer, in the shape the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminResponse {
    Json(Value),
    Raw(String),
}

impl AdminResponse {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

impl std::fmt::Display for AdminResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(value) => write!(f, "{}", value),
            Self::Raw(text) => write!(f, "{}", text),
        }
    }
}

/// Client for the node's administrative HTTP endpoints.
pub struct AdminClient {
    client: Client,
    base_url: Url,
}

impl AdminClient {
    pub fn new(endpoint: &str) -> ClientResult<Self> {
        Self::with_config(endpoint, AdminClientConfig::default())
    }

    /// Accepts `host:port` as well as a full URL.
    pub fn with_config(endpoint: &str, config: AdminClientConfig) -> ClientResult<Self> {
        let base_url = parse_endpoint(endpoint)?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Asks the node to kill itself when `producer` reaches position
    /// `where_in_sequence` of its round, counted on head or LIB.
    pub async fn kill_node_on_producer(
        &self,
        producer: &str,
        where_in_sequence: u32,
        block_type: BlockType,
        return_type: ReturnType,
    ) -> ClientResult<AdminResponse> {
        if producer.trim().is_empty() {
            return Err(ClientError::InvalidArgument(
                "producer must not be empty".to_string(),
            ));
        }
        let body = kill_node_on_producer_body(producer, where_in_sequence, block_type);
        self.send(Method::POST, KILL_NODE_ON_PRODUCER_PATH, Some(body), return_type)
            .await
    }

    pub async fn get_producer_runtime_options(
        &self,
        return_type: ReturnType,
    ) -> ClientResult<AdminResponse> {
        self.send(Method::POST, GET_RUNTIME_OPTIONS_PATH, None, return_type)
            .await
    }

    pub async fn update_runtime_options(
        &self,
        subjective_ram_size: u64,
        subjective_reserved_ram_size: u64,
        ram_load_multiplier: u64,
        return_type: ReturnType,
    ) -> ClientResult<AdminResponse> {
        let body = update_runtime_options_body(
            subjective_ram_size,
            subjective_reserved_ram_size,
            ram_load_multiplier,
        );
        self.send(Method::POST, UPDATE_RUNTIME_OPTIONS_PATH, Some(body), return_type)
            .await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        return_type: ReturnType,
    ) -> ClientResult<AdminResponse> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::InvalidArgument(format!("invalid admin path {}: {}", path, e)))?;
        debug!("Admin request {} {} body: {:?}", method, url, body);

        let mut request = self.client.request(method, url.clone());
        if let Some(body) = &body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("Admin request to {} failed with HTTP {}: {}", url, status.as_u16(), text);
            return Err(ClientError::backend(
                path,
                format!(
                    "HTTP error {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown error")
                ),
            ));
        }

        parse_response(path, &text, return_type)
    }
}

fn parse_endpoint(endpoint: &str) -> ClientResult<Url> {
    let endpoint = endpoint.trim();
    if endpoint.is_empty() {
        return Err(ClientError::InvalidArgument(
            "admin endpoint must not be empty".to_string(),
        ));
    }
    let full = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    };
    Url::parse(&full)
        .map_err(|e| ClientError::InvalidArgument(format!("invalid admin endpoint {}: {}", endpoint, e)))
}

pub fn kill_node_on_producer_body(
    producer: &str,
    where_in_sequence: u32,
    block_type: BlockType,
) -> Value {
    // The endpoint expects the flag as a string.
    let based_on_lib = if block_type == BlockType::Lib { "true" } else { "false" };
    json!({
        "producer": producer,
        "where_in_sequence": where_in_sequence,
        "based_on_lib": based_on_lib,
    })
}

pub fn update_runtime_options_body(
    subjective_ram_size: u64,
    subjective_reserved_ram_size: u64,
    ram_load_multiplier: u64,
) -> Value {
    json!({
        "subjective_ram_size": subjective_ram_size,
        "subjective_reserved_ram_size": subjective_reserved_ram_size,
        "ram_load_multiplier": ram_load_multiplier,
    })
}

fn parse_response(path: &str, text: &str, return_type: ReturnType) -> ClientResult<AdminResponse> {
    match return_type {
        ReturnType::Raw => Ok(AdminResponse::Raw(text.to_string())),
        ReturnType::Json => serde_json::from_str(text)
            .map(AdminResponse::Json)
            .map_err(|e| ClientError::protocol(path, format!("invalid JSON: {}", e), text)),
    }
}
