//! Environment and query-source configuration

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use postseed_core::{DirResources, EmbeddedResources, QueryStore};
use tracing::{debug, info, warn};

/// What happened when looking for a `.env` file.
#[derive(Debug)]
pub enum DotenvOutcome {
    Loaded(PathBuf),
    NotFound,
    Failed(String),
}

impl DotenvOutcome {
    fn classify(result: std::result::Result<PathBuf, dotenvy::Error>) -> Self {
        match result {
            Ok(path) => Self::Loaded(path),
            Err(err) if err.not_found() => Self::NotFound,
            Err(err) => Self::Failed(err.to_string()),
        }
    }

    /// Report the outcome. Call once the subscriber is installed.
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => debug!("Loaded .env from {}", path.display()),
            Self::NotFound => debug!("No .env file found, using environment only"),
            Self::Failed(err) => warn!("Failed to load .env: {}", err),
        }
    }
}

/// Load `.env` from the current directory, if there is one.
///
/// dotenvy never overwrites variables that are already set, so the real
/// environment always wins. This runs before argument parsing (clap reads
/// `DATABASE_URL` from the environment) and so before logging exists; the
/// caller logs the returned outcome later.
pub fn load_dotenv() -> DotenvOutcome {
    DotenvOutcome::classify(dotenvy::dotenv())
}

/// Resolve the database URL from the flag/env value.
pub fn database_url(value: Option<String>) -> Result<String> {
    value
        .filter(|url| !url.trim().is_empty())
        .context("DATABASE_URL not set (pass --database-url or set it in the environment)")
}

/// Load the query registry from `dir`, or from the bundled queries when
/// no directory is given.
pub fn load_queries(dir: Option<&Path>) -> Result<QueryStore> {
    let store = match dir {
        Some(dir) => {
            info!("Loading queries from {}", dir.display());
            QueryStore::load(&DirResources::new(dir), "")
                .with_context(|| format!("loading queries from {}", dir.display()))?
        }
        None => QueryStore::load(&EmbeddedResources::bundled(), EmbeddedResources::DIR)
            .context("loading bundled queries")?,
    };
    Ok(store)
}
