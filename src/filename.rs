//! Output filename resolution
//!
//! A HEAD probe asks the server for a `Content-Disposition` filename. When that
//! does not work out, the URL's basename is used, and as a last resort a
//! timestamped `model_<millis>.safetensors` name is synthesized. Resolution never
//! fails.

use crate::config::Config;
use crate::error::Result;
use crate::types::Platform;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION, REFERER, USER_AGENT};
use std::time::Duration;

/// Browser-like User-Agent sent to model hosts
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Accept header sent with probes and downloads
pub const ACCEPT_BINARY: &str = "application/octet-stream, */*";

/// Referer expected by a platform, if any
pub fn referer_for(platform: Platform) -> Option<&'static str> {
    match platform {
        Platform::Civitai => Some("https://civitai.com/"),
        Platform::Huggingface => Some("https://huggingface.co/"),
        Platform::Other => None,
    }
}

/// Append `token=<token>` to a civitai URL unless it already carries one
pub fn with_civitai_token(url: &str, platform: Platform, token: Option<&str>) -> String {
    let Some(token) = token else {
        return url.to_string();
    };
    if platform != Platform::Civitai || url.contains("token=") {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}token={}", urlencoding::encode(token))
}

/// Resolves the name a download should be saved under
#[derive(Clone, Debug)]
pub struct FilenameResolver {
    client: reqwest::Client,
    civitai_token: Option<String>,
}

impl FilenameResolver {
    /// Build a resolver with the configured HEAD timeout and civitai token
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_timeout(config.queue.head_timeout, config.tokens.civitai_token())
    }

    /// Build a resolver with an explicit timeout
    pub fn with_timeout(timeout: Duration, civitai_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            civitai_token,
        })
    }

    /// Resolve a filename for `url`; never fails
    pub async fn resolve(&self, url: &str, platform: Platform) -> String {
        match self.probe(url, platform).await {
            Ok(Some(name)) => {
                tracing::debug!(url = %url, filename = %name, "filename from Content-Disposition");
                return name;
            }
            Ok(None) => {
                tracing::debug!(url = %url, "no Content-Disposition filename, using URL");
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "HEAD probe failed, using URL");
            }
        }
        fallback_filename(url)
    }

    async fn probe(&self, url: &str, platform: Platform) -> Result<Option<String>> {
        let target = with_civitai_token(url, platform, self.civitai_token.as_deref());

        let mut request = self
            .client
            .head(&target)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, ACCEPT_BINARY);
        if let Some(referer) = referer_for(platform) {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await?;
        let name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_disposition);
        Ok(name)
    }
}

/// Extract the filename from a `Content-Disposition` value
///
/// `filename*` (RFC 5987) wins over `filename`. Quotes are stripped, percent
/// escapes decoded, and any directory part dropped.
pub fn parse_content_disposition(header_value: &str) -> Option<String> {
    let mut plain: Option<String> = None;

    for param in header_value.split(';') {
        let Some((name, value)) = param.trim().split_once('=') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim();

        if name == "filename*" {
            let encoded = match value.split_once("''") {
                Some((_charset, rest)) => rest,
                None => value,
            };
            if let Some(decoded) = decode_value(encoded) {
                return Some(decoded);
            }
        } else if name == "filename"
            && let Some(decoded) = decode_value(value)
        {
            plain = Some(decoded);
        }
    }

    plain
}

fn decode_value(raw: &str) -> Option<String> {
    let unquoted = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let decoded = urlencoding::decode(unquoted)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| unquoted.to_string());
    sanitize(&decoded)
}

/// Keep only the last path component and reject names that are not files
fn sanitize(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

/// Filename derived without the network
///
/// The URL's last path segment (query stripped, percent-decoded) if it has an
/// extension, else `model_<unix millis>.safetensors`.
pub fn fallback_filename(url: &str) -> String {
    url_basename(url).unwrap_or_else(synthesized_filename)
}

fn url_basename(url: &str) -> Option<String> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    let last = path.rsplit('/').next()?;
    let decoded = urlencoding::decode(last)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| last.to_string());
    let name = sanitize(&decoded)?;
    let has_extension = name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty());
    has_extension.then_some(name)
}

fn synthesized_filename() -> String {
    format!("model_{}.safetensors", chrono::Utc::now().timestamp_millis())
}
