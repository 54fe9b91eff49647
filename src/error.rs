// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Error types and user-facing error formatting for civitai-dl.
//!
//! Library code returns [`FetchError`]. The binary turns it into a formatted
//! message with possible causes and suggested fixes via [`FetchError::report`].

use std::fmt;
use std::path::{Path, PathBuf};

/// Which download of a placement failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// The model file itself.
    Primary,
    /// A `.preview.png` sidecar.
    PreviewImage,
    /// A `.preview.mp4` sidecar.
    PreviewVideo,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "model file"),
            Self::PreviewImage => write!(f, "preview image"),
            Self::PreviewVideo => write!(f, "preview video"),
        }
    }
}

/// Errors produced while resolving and downloading a model.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Config file missing, malformed, or without a token.
    Config(String),
    /// The model reference could not be parsed.
    InvalidReference(String),
    /// Transport-level failure (DNS, connect, TLS, broken body).
    Network { url: String, message: String },
    /// The registry answered with a non-200 status.
    Registry { status: u16 },
    /// The registry body was not the expected JSON.
    Decode(String),
    /// A download answered with a non-200 status.
    HttpStatus { url: String, status: u16 },
    /// Creating a directory or writing a file failed.
    Filesystem { path: PathBuf, message: String },
    /// The primary artifact or a sidecar download failed.
    Download { which: Artifact, source: Box<FetchError> },
}

impl FetchError {
    pub(crate) fn filesystem(path: impl AsRef<Path>, err: impl fmt::Display) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn download(which: Artifact, source: FetchError) -> Self {
        Self::Download {
            which,
            source: Box::new(source),
        }
    }

    /// HTTP status carried by this error, looking through `Download` wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Registry { status } | Self::HttpStatus { status, .. } => Some(*status),
            Self::Download { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Build the user-facing message with causes and fixes.
    pub fn report(&self) -> String {
        match self {
            Self::Config(msg) => ErrorBuilder::new(format!("Configuration error: {}", msg))
                .cause("config.yaml is missing or not in the working directory")
                .cause("civitai.token is empty")
                .fix("Pass the file explicitly: civitai-dl --config /path/to/config.yaml ...")
                .fix("Create an API key at https://civitai.com/user/account and set civitai.token")
                .build(),
            Self::InvalidReference(msg) => ErrorBuilder::new(format!("Invalid model reference: {}", msg))
                .cause("The URL does not contain a numeric model or version id")
                .cause("The AIR is not of the form urn:air:<eco>:<type>:<source>:<model>@<version>")
                .fix("Copy the AIR from the model page, e.g. urn:air:sdxl:lora:civitai:328553@368189")
                .fix("Or use a URL like https://civitai.com/models/4201?modelVersionId=130072")
                .build(),
            Self::Network { .. } => ErrorBuilder::new(self.to_string())
                .cause("No network connection")
                .cause("civitai.com is unreachable or blocked")
                .fix("Check your connection and try again")
                .build(),
            Self::Registry { status } => {
                let mut builder = ErrorBuilder::new(self.to_string());
                builder = match status {
                    404 => builder
                        .cause("The version id does not exist or was removed")
                        .fix("Check the modelVersionId on the model page"),
                    401 | 403 => builder
                        .cause("The model requires authentication or early access")
                        .fix("Check that civitai.token is valid"),
                    _ => builder
                        .cause("The registry is having trouble")
                        .fix("Try again later"),
                };
                builder.build()
            }
            Self::Decode(_) => ErrorBuilder::new(self.to_string())
                .cause("The registry API changed or returned an error page")
                .fix("Re-run with -v to see the request details")
                .build(),
            Self::HttpStatus { status, .. } if *status == 401 || *status == 403 => {
                ErrorBuilder::new(self.to_string())
                    .cause("The token was rejected")
                    .cause("The model requires accepting its license on the website first")
                    .fix("Check that civitai.token is valid")
                    .build()
            }
            Self::HttpStatus { .. } => ErrorBuilder::new(self.to_string())
                .cause("The file is no longer hosted")
                .fix("Try again later")
                .build(),
            Self::Filesystem { .. } => ErrorBuilder::new(self.to_string())
                .cause("comfyui.base_model_path is not writable")
                .cause("The disk is full")
                .fix("Check permissions and free space on the target directory")
                .build(),
            Self::Download { which, source } => {
                let title = format!("Failed to download {}", which);
                let mut builder = ErrorBuilder::new(title).cause(source.to_string());
                if *which != Artifact::Primary {
                    builder = builder.cause("The model file was saved; its sidecars are incomplete");
                }
                builder.fix("Re-run the same command, existing files are overwritten").build()
            }
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::InvalidReference(msg) => write!(f, "Invalid model reference: {}", msg),
            Self::Network { url, message } => write!(f, "Network error fetching {}: {}", url, message),
            Self::Registry { status } => write!(f, "Registry returned HTTP {}", status),
            Self::Decode(msg) => write!(f, "Failed to decode registry response: {}", msg),
            Self::HttpStatus { url, status } => write!(f, "HTTP {} for {}", status, url),
            Self::Filesystem { path, message } => write!(f, "{}: {}", path.display(), message),
            Self::Download { which, source } => write!(f, "Failed to download {}: {}", which, source),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Download { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Convenience alias for library results.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Formats an error message with title, causes and fixes.
///
/// ```
/// use civitai_dl::error::format_error;
///
/// let error = format_error(
///     "Registry returned HTTP 404",
///     &["The version id does not exist"],
///     &["Check the modelVersionId on the model page"],
/// );
/// assert!(error.starts_with("[✗] Registry returned HTTP 404"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = format!("[✗] {}", title);

    if !causes.is_empty() {
        output.push_str("\n\nPossible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
    }

    if !fixes.is_empty() {
        output.push_str(if causes.is_empty() { "\n\n" } else { "\n" });
        output.push_str("Try these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
    }

    output.trim_end().to_string()
}

/// Builder for constructing formatted error messages.
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    /// Create a new error builder with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    /// Add a possible cause.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a suggested fix.
    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    /// Build the formatted error message.
    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let error = format_error("Test Error", &["Cause 1", "Cause 2"], &["Fix 1", "Fix 2"]);

        assert!(error.contains("[✗] Test Error"));
        assert!(error.contains("Possible causes:"));
        assert!(error.contains("  - Cause 1"));
        assert!(error.contains("  - Cause 2"));
        assert!(error.contains("Try these fixes:"));
        assert!(error.contains("  1. Fix 1"));
        assert!(error.contains("  2. Fix 2"));
    }

    #[test]
    fn test_empty_causes_and_fixes() {
        let error = format_error("Empty test", &[], &[]);
        assert_eq!(error, "[✗] Empty test");
    }

    #[test]
    fn test_error_builder_display() {
        let builder = ErrorBuilder::new("Display test").cause("Cause").fix("Fix");

        let error = format!("{}", builder);
        assert!(error.contains("[✗] Display test"));
        assert!(error.contains("  - Cause"));
        assert!(error.contains("  1. Fix"));
    }

    #[test]
    fn test_status_looks_through_download() {
        let err = FetchError::download(
            Artifact::PreviewImage,
            FetchError::HttpStatus {
                url: "https://image.civitai.com/x.png".to_string(),
                status: 503,
            },
        );
        assert_eq!(err.status(), Some(503));
        assert_eq!(FetchError::Registry { status: 404 }.status(), Some(404));
        assert_eq!(FetchError::Decode("eof".into()).status(), None);
    }

    #[test]
    fn test_sidecar_report_mentions_saved_model() {
        let err = FetchError::download(
            Artifact::PreviewVideo,
            FetchError::Network {
                url: "https://image.civitai.com/x.mp4".to_string(),
                message: "connection reset".to_string(),
            },
        );
        let report = err.report();
        assert!(report.starts_with("[✗] Failed to download preview video"));
        assert!(report.contains("connection reset"));
        assert!(report.contains("The model file was saved"));
    }

    #[test]
    fn test_registry_404_report() {
        let report = FetchError::Registry { status: 404 }.report();
        assert!(report.contains("Registry returned HTTP 404"));
        assert!(report.contains("does not exist"));
    }
}
