// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Civitai registry client.
//!
//! Resolves a model version id to its [`VersionRecord`] with a single GET.
//!
//! # Example
//!
//! ```no_run
//! use civitai_dl::registry::RegistryClient;
//!
//! let client = RegistryClient::new()?;
//! let record = client.resolve_version("368189")?;
//! println!("{} -> {}", record.name, record.download_url);
//! # Ok::<(), civitai_dl::FetchError>(())
//! ```

pub mod types;

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::error::{FetchError, Result};

pub use types::{FileEntry, ImageEntry, PreviewKind, VersionRecord};

/// Default model-version endpoint; the version id is appended.
pub const DEFAULT_API_BASE: &str = "https://civitai.com/api/v1/model-versions/";

/// Default timeout for establishing connections (in seconds).
pub(crate) const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every request.
pub(crate) const USER_AGENT: &str = concat!("civitai-dl/", env!("CARGO_PKG_VERSION"));

/// Build the blocking HTTP client shared by the registry and the fetcher.
///
/// Only the connect phase is bounded; model files can take hours to stream.
pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| FetchError::Network {
            url: String::new(),
            message: format!("failed to create HTTP client: {}", e),
        })
}

/// Client for the model-version endpoint.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    base_url: String,
    client: Client,
}

impl RegistryClient {
    /// Create a client for the public Civitai API.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_API_BASE)
    }

    /// Create a client for a custom endpoint, e.g. `http://127.0.0.1:8080/api/v1/model-versions/`.
    ///
    /// A trailing slash is added when missing.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Ok(Self {
            base_url,
            client: http_client()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and decode the record for `version_id`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] when the request cannot be sent or the body read
    /// - [`FetchError::Registry`] for any status other than 200
    /// - [`FetchError::Decode`] when the body does not match [`VersionRecord`]
    pub fn resolve_version(&self, version_id: &str) -> Result<VersionRecord> {
        let url = format!("{}{}", self.base_url, version_id);
        debug!("Resolving model version via {}", url);

        let response = self.client.get(&url).send().map_err(|e| FetchError::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Registry {
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|e| FetchError::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let record: VersionRecord =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        info!(
            "Resolved version {} of model {} ({}, {} preview(s))",
            record.id,
            record.model_id,
            record.name,
            record.images.len()
        );
        Ok(record)
    }
}
