//! Bearer token sources for the Google APIs.

use std::env;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ApiError;

/// Host of the GCE/GKE metadata server, overridable through `GCE_METADATA_HOST`.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const METADATA_TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
/// Tokens are refreshed this long before the expiry the server reported.
const EXPIRY_MARGIN_SECS: u64 = 60;

/// Something that can hand out an OAuth2 access token.
pub trait TokenSource {
    fn token(&self) -> Result<String, ApiError>;
}

/// A fixed, externally provisioned access token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Result<String, ApiError> {
        if self.0.trim().is_empty() {
            return Err(ApiError::Auth {
                reason: "access token is empty".to_string(),
            });
        }
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Tokens for the default service account, read from the metadata server.
#[derive(Debug)]
pub struct MetadataServerToken {
    http: Client,
    url: Url,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    pub fn new(host: &str, timeout: Duration) -> Result<Self, ApiError> {
        let url = Url::parse(&format!("http://{}{}", host, METADATA_TOKEN_PATH))?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url,
            cached: Mutex::new(None),
        })
    }

    /// Uses `GCE_METADATA_HOST` when set, the well-known host otherwise.
    pub fn from_env(timeout: Duration) -> Result<Self, ApiError> {
        let host =
            env::var("GCE_METADATA_HOST").unwrap_or_else(|_| DEFAULT_METADATA_HOST.to_string());
        Self::new(&host, timeout)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn fetch(&self) -> Result<CachedToken, ApiError> {
        debug!("Requesting access token from {}", self.url);
        let response = self
            .http
            .get(self.url.clone())
            .header("Metadata-Flavor", "Google")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Auth {
                reason: format!("metadata server answered HTTP {}", status.as_u16()),
            });
        }

        let body: TokenResponse = response.json().map_err(|e| ApiError::Auth {
            reason: format!("invalid token response: {}", e),
        })?;
        let lifetime = Duration::from_secs(body.expires_in.saturating_sub(EXPIRY_MARGIN_SECS));

        Ok(CachedToken {
            access_token: body.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}

impl TokenSource for MetadataServerToken {
    fn token(&self) -> Result<String, ApiError> {
        let mut cached = self.cached.lock().map_err(|_| ApiError::Auth {
            reason: "token cache lock poisoned".to_string(),
        })?;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.fetch()?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }
}

/// Picks the explicit token when one is configured, the metadata server otherwise.
pub fn token_source(
    access_token: Option<String>,
    timeout: Duration,
) -> Result<Box<dyn TokenSource + Send + Sync>, ApiError> {
    match access_token {
        Some(token) => Ok(Box::new(StaticToken::new(token))),
        None => Ok(Box::new(MetadataServerToken::from_env(timeout)?)),
    }
}
