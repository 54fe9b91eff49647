// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Placement of a model and its sidecars into the model tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::fetcher::{FetchEvent, FileFetcher};
use super::layout::{OutputLayout, PlacedArtifacts};
use crate::config::Config;
use crate::error::{Artifact, FetchError, Result};
use crate::reference::check_model_type;
use crate::registry::{PreviewKind, VersionRecord};
use crate::utils::with_token;

/// Extension of the provisional model file name.
const PROVISIONAL_EXTENSION: &str = "safetensors";

/// Where models go and how downloads are authorised.
#[derive(Clone, PartialEq, Eq)]
pub struct PlacementSettings {
    /// Root of the model tree; models land in `<base_dir>/<model_type>/`.
    pub base_dir: PathBuf,
    /// API token appended to the primary download URL.
    pub token: String,
}

impl std::fmt::Debug for PlacementSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementSettings")
            .field("base_dir", &self.base_dir)
            .field("token", &crate::utils::mask_sensitive(&self.token, 4))
            .finish()
    }
}

impl From<&Config> for PlacementSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_dir: config.base_model_path(),
            token: config.token().to_string(),
        }
    }
}

/// Downloads a model version and writes its sidecars.
///
/// Steps run strictly in order and the first failure aborts the rest. Files
/// already written stay on disk.
#[derive(Debug, Clone)]
pub struct ArtifactPlacer {
    fetcher: FileFetcher,
    settings: PlacementSettings,
}

impl ArtifactPlacer {
    pub fn new(fetcher: FileFetcher, settings: PlacementSettings) -> Self {
        Self { fetcher, settings }
    }

    pub fn settings(&self) -> &PlacementSettings {
        &self.settings
    }

    /// Download `record` into `<base_dir>/<model_type>/`.
    ///
    /// The token from [`PlacementSettings`] is only added to the request URL.
    /// `.civitai.info` is written from `record` as given, so its `downloadUrl`
    /// never carries the token.
    ///
    /// # Errors
    ///
    /// [`FetchError::InvalidReference`] when `model_type` is not a single
    /// directory name. Otherwise the first failing step, with fetch failures
    /// wrapped in [`FetchError::Download`].
    pub fn place(&self, model_type: &str, version_id: &str, record: &VersionRecord) -> Result<PlacedArtifacts> {
        self.place_with_progress(model_type, version_id, record, |_| {})
    }

    /// Like [`place`](Self::place), forwarding every fetch's progress to `on_event`.
    pub fn place_with_progress<F>(
        &self,
        model_type: &str,
        version_id: &str,
        record: &VersionRecord,
        mut on_event: F,
    ) -> Result<PlacedArtifacts>
    where
        F: FnMut(FetchEvent<'_>),
    {
        check_model_type(model_type)?;
        let model_dir = self.settings.base_dir.join(model_type);
        fs::create_dir_all(&model_dir).map_err(|e| FetchError::filesystem(&model_dir, e))?;

        // The record keeps the bare URL so the token never reaches .civitai.info
        let download_url = with_token(&record.download_url, &self.settings.token);
        let provisional = provisional_path(&model_dir, version_id);

        let primary = self
            .fetcher
            .fetch_with_progress(&provisional, &download_url, &mut on_event)
            .map_err(|e| FetchError::download(Artifact::Primary, e))?;
        info!("Saved model to {}", primary.display());

        let layout = OutputLayout::from_primary(&primary);
        let mut sidecars = Vec::new();

        for image in &record.images {
            let Some(kind) = image.preview_kind() else {
                debug!("Skipping preview {} of type {:?}", image.url, image.kind);
                continue;
            };
            let which = match kind {
                PreviewKind::Image => Artifact::PreviewImage,
                PreviewKind::Video => Artifact::PreviewVideo,
            };
            let saved = self
                .fetcher
                .fetch_with_progress(&layout.preview(kind), &image.url, &mut on_event)
                .map_err(|e| FetchError::download(which, e))?;
            sidecars.push(saved);
        }

        let metadata_path = layout.metadata();
        let metadata = serde_json::to_string_pretty(record)
            .map_err(|e| FetchError::filesystem(&metadata_path, e))?;
        fs::write(&metadata_path, metadata).map_err(|e| FetchError::filesystem(&metadata_path, e))?;
        debug!("Wrote {}", metadata_path.display());
        sidecars.push(metadata_path);

        if !record.description.is_empty() {
            let description_path = layout.description();
            fs::write(&description_path, record.description.as_bytes())
                .map_err(|e| FetchError::filesystem(&description_path, e))?;
            debug!("Wrote {}", description_path.display());
            sidecars.push(description_path);
        }

        Ok(PlacedArtifacts {
            directory: layout.directory().to_path_buf(),
            primary,
            sidecars,
        })
    }
}

/// Name used for the model file until the server reports the real one.
fn provisional_path(model_dir: &Path, version_id: &str) -> PathBuf {
    let stem: String = version_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    model_dir.join(format!("{}.{}", stem, PROVISIONAL_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_path() {
        assert_eq!(
            provisional_path(Path::new("/m/loras"), "368189"),
            PathBuf::from("/m/loras/368189.safetensors")
        );
        assert_eq!(
            provisional_path(Path::new("/m/loras"), "../x"),
            PathBuf::from("/m/loras/___x.safetensors")
        );
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::from_yaml("civitai:\n  token: tok\ncomfyui:\n  base_model_path: /srv/models\n").unwrap();
        let settings = PlacementSettings::from(&config);
        assert_eq!(settings.base_dir, PathBuf::from("/srv/models"));
        assert_eq!(settings.token, "tok");
        assert!(!format!("{:?}", settings).contains("tok\""));
    }

    #[test]
    fn test_model_type_cannot_leave_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("models");
        let placer = ArtifactPlacer::new(
            FileFetcher::new().unwrap(),
            PlacementSettings {
                base_dir: base,
                token: "tok".to_string(),
            },
        );
        let record = VersionRecord {
            download_url: "http://127.0.0.1:9/never".to_string(),
            ..Default::default()
        };

        let outside = dir.path().join("outside");
        for model_type in [outside.to_str().unwrap(), "..", ".", "loras/../../x", ""] {
            let err = placer.place(model_type, "1", &record).unwrap_err();
            assert!(matches!(err, FetchError::InvalidReference(_)), "{}: {:?}", model_type, err);
        }
        assert!(!outside.exists());
        assert!(!dir.path().join("models").exists());
    }

    #[test]
    fn test_unwritable_base_dir_fails_before_download() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"x").unwrap();

        let placer = ArtifactPlacer::new(
            FileFetcher::new().unwrap(),
            PlacementSettings {
                base_dir: blocker,
                token: "tok".to_string(),
            },
        );
        let record = VersionRecord {
            download_url: "http://127.0.0.1:9/never".to_string(),
            ..Default::default()
        };
        let err = placer.place("loras", "1", &record).unwrap_err();
        assert!(matches!(err, FetchError::Filesystem { .. }), "{:?}", err);
    }
}
