//! Blocking REST client for Compute Engine v1 and Cloud SQL Admin v1beta4.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::auth::TokenSource;
use super::{
    ComputeApi, DatabaseInstance, ListResponse, SqlAdminApi, SslCert, SslCertificate,
    TargetHttpsProxy,
};
use crate::error::ApiError;

pub const COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1/";
pub const SQLADMIN_BASE_URL: &str = "https://sqladmin.googleapis.com/sql/v1beta4/";

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Authenticated client shared by every scrape.
pub struct GcpClient {
    http: Client,
    tokens: Box<dyn TokenSource + Send + Sync>,
    compute_base: Url,
    sqladmin_base: Url,
}

impl GcpClient {
    pub fn new(
        tokens: Box<dyn TokenSource + Send + Sync>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            tokens,
            compute_base: Url::parse(COMPUTE_BASE_URL)?,
            sqladmin_base: Url::parse(SQLADMIN_BASE_URL)?,
        })
    }

    /// Points the client at other endpoints, e.g. a private API gateway.
    pub fn with_base_urls(mut self, compute: Url, sqladmin: Url) -> Self {
        self.compute_base = compute;
        self.sqladmin_base = sqladmin;
        self
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let token = self.tokens.token()?;
        debug!("GET {}", url);

        let response = self.http.get(url.clone()).bearer_auth(token).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        response.json::<T>().map_err(|e| ApiError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    // Follows nextPageToken until the listing is exhausted.
    fn list_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, ApiError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut page_url = url.clone();
            if let Some(token) = &page_token {
                page_url.query_pairs_mut().append_pair("pageToken", token);
            }

            let page: ListResponse<T> = self.get_json(page_url)?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Appends path segments to `base`, percent-encoding each of them.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

impl ComputeApi for GcpClient {
    fn list_ssl_certificates(&self, project: &str) -> Result<Vec<SslCertificate>, ApiError> {
        let url = endpoint(
            &self.compute_base,
            &["projects", project, "global", "sslCertificates"],
        )?;
        self.list_all(url)
    }

    fn list_target_https_proxies(
        &self,
        project: &str,
    ) -> Result<Vec<TargetHttpsProxy>, ApiError> {
        let url = endpoint(
            &self.compute_base,
            &["projects", project, "global", "targetHttpsProxies"],
        )?;
        self.list_all(url)
    }

    fn get_ssl_certificate(&self, project: &str, name: &str) -> Result<SslCertificate, ApiError> {
        let url = endpoint(
            &self.compute_base,
            &["projects", project, "global", "sslCertificates", name],
        )?;
        self.get_json(url)
    }
}

impl SqlAdminApi for GcpClient {
    fn list_instances(&self, project: &str) -> Result<Vec<DatabaseInstance>, ApiError> {
        let url = endpoint(&self.sqladmin_base, &["projects", project, "instances"])?;
        self.list_all(url)
    }

    fn list_ssl_certs(&self, project: &str, instance: &str) -> Result<Vec<SslCert>, ApiError> {
        let url = endpoint(
            &self.sqladmin_base,
            &["projects", project, "instances", instance, "sslCerts"],
        )?;
        self.list_all(url)
    }
}
