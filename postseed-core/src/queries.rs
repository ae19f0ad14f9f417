//! Named SQL query registry.
//!
//! All query files are read once, up front, so call sites never deal with a
//! missing file or a read error.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{Error, LoadError, Result};
use crate::resources::ResourceSet;

/// File suffix a resource needs to be registered as a query.
pub const QUERY_SUFFIX: &str = ".sql";

/// Immutable mapping from query name to query text.
#[derive(Debug, Clone, Default)]
pub struct QueryStore {
    queries: HashMap<String, String>,
}

impl QueryStore {
    /// Load every `*.sql` resource directly under `dir`.
    ///
    /// The name of each query is its file name without the suffix, so
    /// `sql/insert_user.sql` becomes `insert_user`. Nested directories are not
    /// searched. Any read failure or duplicate name fails the whole load.
    pub fn load<R: ResourceSet + ?Sized>(
        resources: &R,
        dir: &str,
    ) -> std::result::Result<Self, LoadError> {
        let dir = dir.trim_end_matches('/');
        let names = resources.list(dir).map_err(|source| LoadError::List {
            dir: dir.to_string(),
            source,
        })?;

        let mut queries = HashMap::new();
        for path in names {
            let Some(name) = query_name(&path, dir) else {
                continue;
            };
            if queries.contains_key(name) {
                return Err(LoadError::Duplicate {
                    name: name.to_string(),
                    path,
                });
            }

            let text = resources.read(&path).map_err(|source| LoadError::Read {
                name: path.clone(),
                source,
            })?;
            debug!(query = name, path = %path, "registered query");
            queries.insert(name.to_string(), text);
        }

        info!("loaded {} queries from {:?}", queries.len(), dir);
        Ok(Self { queries })
    }

    /// Query text registered under `name`, or `""` when there is none.
    ///
    /// Prefer [`QueryStore::require`] when the name comes from anywhere but a
    /// constant that was already checked with [`QueryStore::validate`].
    pub fn get(&self, name: &str) -> &str {
        self.queries.get(name).map(String::as_str).unwrap_or_default()
    }

    /// Query text registered under `name`.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.queries
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::missing_query(name))
    }

    /// Check that every name in `names` is registered.
    pub fn validate(&self, names: &[&str]) -> Result<()> {
        for name in names {
            self.require(name)?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.queries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.queries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Query name for `path` if it is a query file directly inside `dir`.
fn query_name<'a>(path: &'a str, dir: &str) -> Option<&'a str> {
    let file = if dir.is_empty() {
        path
    } else {
        path.strip_prefix(dir)?.strip_prefix('/')?
    };
    if file.contains('/') {
        return None;
    }
    let name = file.strip_suffix(QUERY_SUFFIX)?;
    (!name.is_empty()).then_some(name)
}
