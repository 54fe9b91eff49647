// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Download and placement of model files
//!
//! This module turns a resolved [`VersionRecord`](crate::registry::VersionRecord)
//! into files on disk:
//! - the model file, named by the server when it sends `content-disposition`
//! - `.preview.png` / `.preview.mp4` sidecars for each preview image or video
//! - a `.civitai.info` JSON copy of the version record
//! - a `.description.txt` when the version has a description
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ ArtifactPlacer  │────▶│ FileFetcher     │
//! │ (step sequence) │     │ (temp + rename) │
//! └────────┬────────┘     └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ OutputLayout    │
//! │ (sidecar names) │
//! └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use civitai_dl::config::Config;
//! use civitai_dl::download::{ArtifactPlacer, FileFetcher, PlacementSettings};
//! use civitai_dl::registry::RegistryClient;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::load("config.yaml")?;
//! let record = RegistryClient::with_base_url(config.api_base())?.resolve_version("368189")?;
//!
//! let placer = ArtifactPlacer::new(FileFetcher::new()?, PlacementSettings::from(&config));
//! let placed = placer.place("loras", "368189", &record)?;
//! println!("Saved to {}", placed.directory.display());
//! # Ok(())
//! # }
//! ```

pub mod fetcher;
pub mod layout;
pub mod placer;

// Re-export commonly used items
pub use fetcher::{filename_from_disposition, FetchEvent, FileFetcher};
pub use layout::{OutputLayout, PlacedArtifacts};
pub use placer::{ArtifactPlacer, PlacementSettings};
