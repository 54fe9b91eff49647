// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Utility functions for civitai-dl.
//!
//! Helpers that keep API tokens out of logs and terminal output.

use std::sync::LazyLock;
use regex::Regex;

static TOKEN_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([?&]token=)[^&#]*").expect("static regex"));

/// Mask a sensitive string (like API keys) for logging.
///
/// Shows only the first `visible_prefix` characters and replaces the rest with "...".
/// Values no longer than the prefix are masked completely.
///
/// # Examples
///
/// ```
/// use civitai_dl::utils::mask_sensitive;
///
/// let token = "0123456789abcdef0123456789abcdef";
/// assert_eq!(mask_sensitive(token, 4), "0123...");
/// ```
pub fn mask_sensitive(input: &str, visible_prefix: usize) -> String {
    if input.chars().count() <= visible_prefix {
        return "...".to_string();
    }

    let prefix: String = input.chars().take(visible_prefix).collect();
    format!("{}...", prefix)
}

/// Replace the value of a `token=` query parameter in a URL with a masked form.
///
/// ```
/// use civitai_dl::utils::redact_token;
///
/// let url = "https://civitai.com/api/download/models/1?token=abcdef123456";
/// assert_eq!(redact_token(url), "https://civitai.com/api/download/models/1?token=abcd...");
/// ```
pub fn redact_token(url: &str) -> String {
    TOKEN_PARAM
        .replace_all(url, |caps: &regex::Captures<'_>| {
            let value = &caps[0][caps[1].len()..];
            format!("{}{}", &caps[1], mask_sensitive(value, 4))
        })
        .into_owned()
}

/// Append an API token to a URL as a `token` query parameter.
pub fn with_token(url: &str, token: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", url, separator, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_sensitive() {
        assert_eq!(mask_sensitive("sk-or-v1-secret123", 8), "sk-or-v1...");
        assert_eq!(mask_sensitive("", 8), "...");
    }

    #[test]
    fn test_mask_sensitive_hides_short_values() {
        assert_eq!(mask_sensitive("short", 8), "...");
        assert_eq!(mask_sensitive("abcd", 4), "...");
        assert_eq!(mask_sensitive("abcde", 4), "abcd...");
        assert_eq!(mask_sensitive("ééé", 4), "...");
    }

    #[test]
    fn test_redact_short_token() {
        assert_eq!(
            redact_token("https://civitai.com/api/download/models/9?token=abc"),
            "https://civitai.com/api/download/models/9?token=..."
        );
    }

    #[test]
    fn test_redact_token_keeps_other_params() {
        let url = "https://civitai.com/api/download/models/9?type=Model&token=supersecret&format=SafeTensor";
        assert_eq!(
            redact_token(url),
            "https://civitai.com/api/download/models/9?type=Model&token=supe...&format=SafeTensor"
        );
    }

    #[test]
    fn test_redact_token_without_token() {
        let url = "https://civitai.com/api/v1/model-versions/9";
        assert_eq!(redact_token(url), url);
    }

    #[test]
    fn test_with_token() {
        assert_eq!(
            with_token("https://civitai.com/api/download/models/9", "abc"),
            "https://civitai.com/api/download/models/9?token=abc"
        );
        assert_eq!(
            with_token("https://civitai.com/api/download/models/9?type=Model", "abc"),
            "https://civitai.com/api/download/models/9?type=Model&token=abc"
        );
    }
}
