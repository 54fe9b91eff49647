// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Model reference parsing.
//!
//! A model can be referenced two ways on the command line:
//!
//! - an AIR (`urn:air:sdxl:lora:civitai:328553@368189`), which carries both the
//!   model type and the version id
//! - a Civitai URL (`https://civitai.com/models/328553?modelVersionId=368189`),
//!   which carries only an id, so the model type must come from the caller
//!
//! # Example
//!
//! ```
//! use civitai_dl::reference::{parse, ReferenceKind};
//!
//! let reference = parse("urn:air:sdxl:lora:civitai:328553@368189", "").unwrap();
//! assert_eq!(reference.kind(), ReferenceKind::Air);
//! assert_eq!(reference.model_type(), Some("lora"));
//! assert_eq!(reference.version_id(), "368189");
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{FetchError, Result};

/// Prefix that marks an AIR identifier.
pub const AIR_PREFIX: &str = "urn:air:";

/// Index of the model type among the `:`-separated AIR segments.
const AIR_TYPE_SEGMENT: usize = 3;

static DOWNLOAD_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^/?#]+/api/download/models/(\d+)(?:[/?#]|$)").expect("static regex")
});

static MODEL_PAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^/?#]+/models/(\d+)(?:[/?#]|$)").expect("static regex")
});

static VERSION_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]modelVersionId=(\d+)(?:[&#]|$)").expect("static regex"));

/// The syntax a reference was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A Civitai web or download URL.
    DirectUrl,
    /// An `urn:air:` identifier.
    Air,
}

/// A parsed model reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReference {
    kind: ReferenceKind,
    model_type: Option<String>,
    version_id: String,
    raw_url: Option<String>,
}

impl ModelReference {
    pub fn kind(&self) -> ReferenceKind {
        self.kind
    }

    /// Model type, e.g. `lora` or `checkpoints`. `None` for a URL given without one.
    pub fn model_type(&self) -> Option<&str> {
        self.model_type.as_deref()
    }

    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    /// The original URL, for [`ReferenceKind::DirectUrl`] references.
    pub fn raw_url(&self) -> Option<&str> {
        self.raw_url.as_deref()
    }

    /// Model type, failing when none was given or derived, or when it is not a
    /// single directory name (see [`check_model_type`]).
    pub fn require_model_type(&self) -> Result<&str> {
        let model_type = self.model_type().ok_or_else(|| {
            FetchError::InvalidReference(
                "no model type given; pass it as the first argument, e.g. `civitai-dl loras <url>`"
                    .to_string(),
            )
        })?;
        check_model_type(model_type)?;
        Ok(model_type)
    }
}

/// Make sure a model type names exactly one directory below the model root.
///
/// Absolute paths, path separators and `.`/`..` are rejected, since any of
/// them would move the output out of `<base>/<model_type>/`.
pub fn check_model_type(model_type: &str) -> Result<()> {
    let reason = if model_type.is_empty() {
        Some("is empty")
    } else if model_type == "." || model_type == ".." {
        Some("refers to a parent or current directory")
    } else if model_type.contains(['/', '\\']) || Path::new(model_type).is_absolute() {
        Some("must be a single directory name, not a path")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(FetchError::InvalidReference(format!(
            "model type {:?} {}",
            model_type, reason
        ))),
        None => Ok(()),
    }
}

/// Parse a raw reference.
///
/// `positional_model_type` is the type the user typed on the command line, or
/// an empty string. For AIR references a non-empty positional type wins over
/// the type encoded in the AIR.
pub fn parse(arg: &str, positional_model_type: &str) -> Result<ModelReference> {
    let arg = arg.trim();
    let positional = Some(positional_model_type.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    if arg.starts_with(AIR_PREFIX) {
        parse_air(arg, positional)
    } else {
        parse_url(arg, positional)
    }
}

fn parse_air(arg: &str, positional: Option<String>) -> Result<ModelReference> {
    let segments: Vec<&str> = arg.split(':').collect();
    if segments.len() <= AIR_TYPE_SEGMENT + 1 {
        return Err(FetchError::InvalidReference(format!(
            "{} is too short, expected urn:air:<ecosystem>:<type>:<source>:<model>@<version>",
            arg
        )));
    }

    let last = segments[segments.len() - 1];
    let version_id = match last.split_once('@') {
        Some((_, version)) if !version.is_empty() => version.to_string(),
        _ => {
            return Err(FetchError::InvalidReference(format!(
                "{} has no version, expected <model>@<version> at the end",
                arg
            )))
        }
    };

    let air_type = segments[AIR_TYPE_SEGMENT];
    let model_type = match positional {
        Some(t) => t,
        None if air_type.is_empty() || air_type.contains('@') => {
            return Err(FetchError::InvalidReference(format!(
                "{} has no model type segment",
                arg
            )))
        }
        None => air_type.to_string(),
    };

    Ok(ModelReference {
        kind: ReferenceKind::Air,
        model_type: Some(model_type),
        version_id,
        raw_url: None,
    })
}

fn parse_url(arg: &str, positional: Option<String>) -> Result<ModelReference> {
    let version_id = if let Some(caps) = DOWNLOAD_URL.captures(arg) {
        caps[1].to_string()
    } else if let Some(caps) = MODEL_PAGE_URL.captures(arg) {
        match VERSION_PARAM.captures(arg) {
            Some(version) => version[1].to_string(),
            None => caps[1].to_string(),
        }
    } else {
        return Err(FetchError::InvalidReference(format!(
            "no numeric id found in {}",
            arg
        )));
    };

    debug!("Parsed URL reference {} -> version {}", arg, version_id);

    Ok(ModelReference {
        kind: ReferenceKind::DirectUrl,
        model_type: positional,
        version_id,
        raw_url: Some(arg.to_string()),
    })
}

/// The two positional command-line arguments, sorted into type and reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Model type given positionally; empty when it must come from the AIR.
    pub model_type: String,
    /// The URL or AIR to resolve.
    pub identifier: String,
    /// The first argument was itself an AIR. Its type is taken from the AIR and
    /// the second argument is not used.
    pub is_air_first_arg: bool,
}

impl Invocation {
    /// Sort `<model_type> <model_url|AIR>` arguments.
    ///
    /// The AIR check is a prefix test on the raw first token, done before any
    /// other parsing.
    pub fn from_args(first: &str, second: &str) -> Self {
        if first.starts_with(AIR_PREFIX) {
            debug!("First argument is an AIR, ignoring second argument {:?}", second);
            Self {
                model_type: String::new(),
                identifier: first.to_string(),
                is_air_first_arg: true,
            }
        } else {
            Self {
                model_type: first.to_string(),
                identifier: second.to_string(),
                is_air_first_arg: false,
            }
        }
    }

    /// Parse the identifier and make sure a model type is known.
    pub fn resolve(&self) -> Result<ModelReference> {
        let reference = parse(&self.identifier, &self.model_type)?;
        reference.require_model_type()?;
        Ok(reference)
    }
}
