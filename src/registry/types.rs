// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wire types for the Civitai model-version endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// One release of a model, as returned by `/api/v1/model-versions/<id>`.
///
/// Unknown fields are ignored. This is also the shape written to the
/// `.civitai.info` sidecar.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: u64,
    #[serde(rename = "modelId")]
    pub model_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
}

/// A file attached to a version. Informational: only the version's top-level
/// `downloadUrl` is fetched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: u64,
    #[serde(rename = "sizeKB", default)]
    pub size_kb: f64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "downloadUrl", default)]
    pub download_url: String,
}

/// A preview image or video attached to a version.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Preview media kinds that produce a sidecar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewKind {
    Image,
    Video,
}

impl ImageEntry {
    /// `None` for media types that are not saved.
    pub fn preview_kind(&self) -> Option<PreviewKind> {
        match self.kind.as_str() {
            "image" => Some(PreviewKind::Image),
            "video" => Some(PreviewKind::Video),
            _ => None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
