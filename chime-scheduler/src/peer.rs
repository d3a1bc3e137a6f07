//! Peer bot HTTP client
//!
//! Resolves a bot name to its base URL and issues the configured call.
//! Every request shares one `reqwest::Client` carrying the per-call timeout
//! and the bot-to-bot API key header.

use std::collections::HashMap;
use std::time::Duration;

use chime_core::domain::job::HttpMethod;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;
use thiserror::Error;

/// Header carrying the shared bot API key
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("no base URL configured for bot '{0}'")]
    UnknownBot(String),

    #[error(transparent)]
    Request(#[from] reqwest::Error),

    #[error("invalid peer client configuration: {0}")]
    Config(String),
}

/// HTTP client for calls into peer bots
#[derive(Debug, Clone)]
pub struct PeerClient {
    client: Client,
    peers: HashMap<String, String>,
}

impl PeerClient {
    /// Build a client for the given bot registry
    pub fn new(
        peers: HashMap<String, String>,
        timeout: Duration,
        api_key: Option<&str>,
    ) -> Result<Self, PeerError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(key)
                .map_err(|_| PeerError::Config("API key is not a valid header value".to_string()))?;
            headers.insert(API_KEY_HEADER, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let peers = peers
            .into_iter()
            .map(|(bot, url)| (bot, url.trim_end_matches('/').to_string()))
            .collect();

        Ok(Self { client, peers })
    }

    /// Full URL for an endpoint on a bot
    pub fn url_for(&self, bot: &str, endpoint: &str) -> Result<String, PeerError> {
        let base = self
            .peers
            .get(bot)
            .ok_or_else(|| PeerError::UnknownBot(bot.to_string()))?;

        if endpoint.starts_with('/') {
            Ok(format!("{}{}", base, endpoint))
        } else {
            Ok(format!("{}/{}", base, endpoint))
        }
    }

    /// Issue one call; POST and PUT carry an empty JSON object
    pub async fn send(
        &self,
        bot: &str,
        method: HttpMethod,
        endpoint: &str,
    ) -> Result<reqwest::Response, PeerError> {
        let url = self.url_for(bot, endpoint)?;

        let mut request = match method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
            HttpMethod::Delete => self.client.delete(&url),
        };
        if method.sends_body() {
            request = request.json(&json!({}));
        }

        Ok(request.send().await?)
    }
}
