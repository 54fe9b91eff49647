// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Output paths for a placed model.

use std::path::{Path, PathBuf};

use crate::registry::PreviewKind;

/// Sidecar suffix for preview images.
pub const PREVIEW_IMAGE_SUFFIX: &str = ".preview.png";
/// Sidecar suffix for preview videos.
pub const PREVIEW_VIDEO_SUFFIX: &str = ".preview.mp4";
/// Sidecar suffix for the JSON version record.
pub const METADATA_SUFFIX: &str = ".civitai.info";
/// Sidecar suffix for the model description.
pub const DESCRIPTION_SUFFIX: &str = ".description.txt";

/// Where the sidecars of a saved model go.
///
/// Built from the path the primary file was actually saved to, so every
/// sidecar shares the server-chosen stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    directory: PathBuf,
    base_name: String,
}

impl OutputLayout {
    /// `models/loras/foo.safetensors` gives directory `models/loras` and base name `foo`.
    pub fn from_primary(primary: &Path) -> Self {
        let directory = primary.parent().map(Path::to_path_buf).unwrap_or_default();
        let base_name = primary
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            directory,
            base_name,
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// `<directory>/<base_name><suffix>`
    pub fn sidecar(&self, suffix: &str) -> PathBuf {
        self.directory.join(format!("{}{}", self.base_name, suffix))
    }

    pub fn preview(&self, kind: PreviewKind) -> PathBuf {
        match kind {
            PreviewKind::Image => self.sidecar(PREVIEW_IMAGE_SUFFIX),
            PreviewKind::Video => self.sidecar(PREVIEW_VIDEO_SUFFIX),
        }
    }

    pub fn metadata(&self) -> PathBuf {
        self.sidecar(METADATA_SUFFIX)
    }

    pub fn description(&self) -> PathBuf {
        self.sidecar(DESCRIPTION_SUFFIX)
    }
}

/// Everything a placement wrote, in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedArtifacts {
    /// Directory holding the model and its sidecars.
    pub directory: PathBuf,
    /// The model file.
    pub primary: PathBuf,
    /// Previews, metadata and description.
    pub sidecars: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_from_primary() {
        let layout = OutputLayout::from_primary(Path::new("/models/loras/foo.safetensors"));
        assert_eq!(layout.directory(), Path::new("/models/loras"));
        assert_eq!(layout.base_name(), "foo");
        assert_eq!(
            layout.preview(PreviewKind::Image),
            PathBuf::from("/models/loras/foo.preview.png")
        );
        assert_eq!(
            layout.preview(PreviewKind::Video),
            PathBuf::from("/models/loras/foo.preview.mp4")
        );
        assert_eq!(layout.metadata(), PathBuf::from("/models/loras/foo.civitai.info"));
        assert_eq!(layout.description(), PathBuf::from("/models/loras/foo.description.txt"));
    }

    #[test]
    fn test_only_last_extension_is_removed() {
        let layout = OutputLayout::from_primary(Path::new("models/vae/sdxl.vae.safetensors"));
        assert_eq!(layout.base_name(), "sdxl.vae");
    }

    #[test]
    fn test_name_without_extension() {
        let layout = OutputLayout::from_primary(Path::new("models/checkpoints/model"));
        assert_eq!(layout.base_name(), "model");
        assert_eq!(layout.metadata(), PathBuf::from("models/checkpoints/model.civitai.info"));
    }
}
