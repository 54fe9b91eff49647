// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Streaming file downloads.
//!
//! [`FileFetcher`] streams a URL into a temporary file next to the destination
//! and renames it into place once the body is complete, so a destination path
//! never holds a half-written file. The server may rename the file through a
//! `content-disposition` header; the returned path is the one actually written.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::StatusCode;
use tracing::{debug, warn};

use crate::error::{FetchError, Result};
use crate::registry::http_client;
use crate::utils::redact_token;

/// Size of the copy buffer.
const CHUNK_SIZE: usize = 64 * 1024;

/// Creation mode for downloaded files, before the umask is applied.
#[cfg(unix)]
const FILE_MODE: u32 = 0o666;

/// Progress notifications emitted while a file is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchEvent<'a> {
    /// Headers received; `file_name` is the final name on disk.
    Started { file_name: &'a str, total: Option<u64> },
    /// Bytes written so far.
    Progress { downloaded: u64 },
    /// File renamed into place.
    Finished { path: &'a Path },
}

/// Downloads single files to disk.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    client: Client,
}

impl FileFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: http_client()?,
        })
    }

    /// Download `url` to `dest` and return the path actually written.
    pub fn fetch(&self, dest: &Path, url: &str) -> Result<PathBuf> {
        self.fetch_with_progress(dest, url, |_| {})
    }

    /// Like [`fetch`](Self::fetch), reporting progress through `on_event`.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] when the request fails or the body breaks off
    /// - [`FetchError::HttpStatus`] for any status other than 200
    /// - [`FetchError::Filesystem`] when the file cannot be created or written
    pub fn fetch_with_progress<F>(&self, dest: &Path, url: &str, mut on_event: F) -> Result<PathBuf>
    where
        F: FnMut(FetchEvent<'_>),
    {
        let display_url = redact_token(url);
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| FetchError::filesystem(&parent, e))?;

        debug!("Fetching {} -> {}", display_url, dest.display());
        let mut response = self.client.get(url).send().map_err(|e| FetchError::Network {
            url: display_url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus {
                url: display_url,
                status: status.as_u16(),
            });
        }

        let header_name = match response.headers().get(CONTENT_DISPOSITION) {
            Some(value) => match value.to_str() {
                Ok(value) => filename_from_disposition(value),
                Err(_) => {
                    warn!("Ignoring non-ASCII content-disposition from {}", display_url);
                    None
                }
            },
            None => None,
        };
        let final_path = match header_name {
            Some(name) => {
                debug!("Server named the file {}", name);
                parent.join(name)
            }
            None => dest.to_path_buf(),
        };

        let file_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        on_event(FetchEvent::Started {
            file_name: &file_name,
            total: response.content_length(),
        });

        let mut builder = tempfile::Builder::new();
        builder.prefix(".civitai-dl-").suffix(".part");
        // Mode of a plain File::create: 0666 minus umask
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(FILE_MODE));
        }
        let mut temp = builder
            .tempfile_in(&parent)
            .map_err(|e| FetchError::filesystem(&parent, e))?;

        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut downloaded = 0u64;
        loop {
            let n = response.read(&mut buf).map_err(|e| FetchError::Network {
                url: display_url.clone(),
                message: e.to_string(),
            })?;
            if n == 0 {
                break;
            }
            temp.write_all(&buf[..n])
                .map_err(|e| FetchError::filesystem(temp.path(), e))?;
            downloaded += n as u64;
            on_event(FetchEvent::Progress { downloaded });
        }
        temp.flush().map_err(|e| FetchError::filesystem(temp.path(), e))?;

        temp.persist(&final_path)
            .map_err(|e| FetchError::filesystem(&final_path, e.error))?;

        debug!("Saved {} bytes to {}", downloaded, final_path.display());
        on_event(FetchEvent::Finished { path: &final_path });
        Ok(final_path)
    }
}

/// Extract the file name from a `content-disposition` header value.
///
/// A quoted value is taken up to its closing quote, so it may contain `;`. An
/// unquoted value ends at the next `;`. Only the last path component is kept so
/// the name stays inside the target directory.
///
/// ```
/// use civitai_dl::download::filename_from_disposition;
///
/// assert_eq!(
///     filename_from_disposition(r#"attachment; filename="foo.safetensors""#),
///     Some("foo.safetensors".to_string())
/// );
/// assert_eq!(filename_from_disposition("inline"), None);
/// ```
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let rest = rest.trim_start();
    let value = match rest.chars().next() {
        Some(quote @ ('"' | '\'')) => {
            let inner = &rest[1..];
            inner.split(quote).next().unwrap_or_default()
        }
        _ => rest.split(';').next().unwrap_or_default().trim(),
    };
    let name = value.rsplit(['/', '\\']).next().unwrap_or_default().trim();

    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}
