// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! civitai-dl - Civitai model downloader library
//!
//! Resolves a Civitai model reference and lays the model out the way ComfyUI
//! expects it:
//!
//! **Reference** -> **Registry** -> **Model file** -> **Previews, metadata, description**
//!
//! # Core Modules
//!
//! - [`reference`] - AIR and URL parsing into a model type and version id
//! - [`registry`] - Model-version lookups against the Civitai API
//! - [`download`] - Streaming downloads and sidecar placement
//! - [`config`] - YAML configuration (token, model tree root)
//! - [`error`] - Error taxonomy and user-facing formatting
//! - [`utils`] - Token masking for logs

pub mod config;
pub mod download;
pub mod error;
pub mod reference;
pub mod registry;
pub mod utils;

use tracing::info;

pub use config::Config;
pub use download::{ArtifactPlacer, FetchEvent, FileFetcher, OutputLayout, PlacedArtifacts, PlacementSettings};
pub use error::{Artifact, ErrorBuilder, FetchError};
pub use reference::{Invocation, ModelReference, ReferenceKind};
pub use registry::{FileEntry, ImageEntry, RegistryClient, VersionRecord};
pub use utils::mask_sensitive;

/// Resolve `reference` and place the model under the configured model tree.
///
/// Runs the whole sequence: registry lookup, model download, previews,
/// metadata and description. Nothing touches the disk if the lookup fails.
pub fn download_model<F>(reference: &ModelReference, config: &Config, on_event: F) -> error::Result<PlacedArtifacts>
where
    F: FnMut(FetchEvent<'_>),
{
    let model_type = reference.require_model_type()?;
    config.validate()?;

    let registry = RegistryClient::with_base_url(config.api_base())?;
    let record = registry.resolve_version(reference.version_id())?;

    let placer = ArtifactPlacer::new(FileFetcher::new()?, PlacementSettings::from(config));
    let placed = placer.place_with_progress(model_type, reference.version_id(), &record, on_event)?;

    info!(
        "Placed {} with {} sidecar(s) in {}",
        placed.primary.display(),
        placed.sidecars.len(),
        placed.directory.display()
    );
    Ok(placed)
}
