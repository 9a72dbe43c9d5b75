//! Retrieval backends
//!
//! A backend turns one [`Job`](crate::types::Job) into a file on disk. The
//! queue only talks to the [`RetrievalBackend`] trait:
//!
//! - [`Aria2Backend`]: multi-connection segment downloader (`aria2c`)
//! - [`HfCliBackend`]: Hugging Face CLI with hf_transfer, for repository URLs
//! - [`UnavailableBackend`]: stand-in when a binary is missing
//!
//! Binaries are taken from [`ToolsConfig`](crate::config::ToolsConfig) first,
//! then searched on `PATH` when `search_path` is set.

mod process;
mod repo;
mod segment;
mod traits;
mod unavailable;

pub use repo::{HfCliBackend, RepoFile, parse_repo_url};
pub use segment::{Aria2Backend, segment_args};
pub use traits::{BackendOutcome, RetrievalBackend};
pub use unavailable::UnavailableBackend;

use crate::config::Config;
use crate::error::Result;
use std::sync::Arc;

/// Build the segment downloader for `config`
pub fn discover_segment_backend(config: &Config) -> Result<Arc<dyn RetrievalBackend>> {
    let backend: Arc<dyn RetrievalBackend> = if let Some(ref path) = config.tools.aria2_path {
        Arc::new(Aria2Backend::new(path.clone(), config)?)
    } else if config.tools.search_path {
        match Aria2Backend::from_path(config)? {
            Some(backend) => Arc::new(backend),
            None => Arc::new(UnavailableBackend::new("aria2c")),
        }
    } else {
        Arc::new(UnavailableBackend::new("aria2c"))
    };

    tracing::info!(
        backend = backend.name(),
        binary = ?backend.binary(),
        "segment downloader initialized"
    );
    Ok(backend)
}

/// Build the repository transfer client for `config`
pub fn discover_repo_backend(config: &Config) -> Arc<dyn RetrievalBackend> {
    let backend: Arc<dyn RetrievalBackend> = if let Some(ref path) = config.tools.hf_cli_path {
        Arc::new(HfCliBackend::new(path.clone(), config))
    } else if config.tools.search_path {
        HfCliBackend::from_path(config)
            .map(|b| Arc::new(b) as Arc<dyn RetrievalBackend>)
            .unwrap_or_else(|| Arc::new(UnavailableBackend::new("hf")))
    } else {
        Arc::new(UnavailableBackend::new("hf"))
    };

    tracing::info!(
        backend = backend.name(),
        binary = ?backend.binary(),
        "repository transfer client initialized"
    );
    backend
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn explicit_paths_win() {
        let mut config = Config::default();
        config.tools.aria2_path = Some(PathBuf::from("/opt/aria2/aria2c"));
        config.tools.hf_cli_path = Some(PathBuf::from("/opt/hf/bin/hf"));

        let segment = discover_segment_backend(&config).unwrap();
        assert_eq!(segment.binary(), Some(Path::new("/opt/aria2/aria2c")));

        let repo = discover_repo_backend(&config);
        assert_eq!(repo.binary(), Some(Path::new("/opt/hf/bin/hf")));
    }

    #[test]
    fn disabled_search_yields_unavailable() {
        let mut config = Config::default();
        config.tools.search_path = false;

        let segment = discover_segment_backend(&config).unwrap();
        assert!(segment.binary().is_none());
        assert_eq!(segment.name(), "aria2c");

        let repo = discover_repo_backend(&config);
        assert!(repo.binary().is_none());
        assert_eq!(repo.name(), "hf");
    }
}
