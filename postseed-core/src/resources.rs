//! Text resources that query files are loaded from.
//!
//! A [`ResourceSet`] only knows how to list names and read a name. The query
//! registry never touches the filesystem directly, so the same loader works
//! for files bundled into the binary, a directory on disk, or an in-memory
//! map in tests.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Read-only collection of named text resources.
///
/// Names are `/`-separated paths relative to the root of the set
/// (e.g. `sql/insert_user.sql`).
pub trait ResourceSet {
    /// Names of the resources directly inside `dir` (`""` is the root).
    /// Nested directories are not descended into.
    fn list(&self, dir: &str) -> io::Result<Vec<String>>;

    /// Full text of one resource.
    fn read(&self, name: &str) -> io::Result<String>;
}

impl<T: ResourceSet + ?Sized> ResourceSet for &T {
    fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        (**self).list(dir)
    }

    fn read(&self, name: &str) -> io::Result<String> {
        (**self).read(name)
    }
}

/// Query files compiled into the binary.
static BUNDLED: &[(&str, &str)] = &[
    ("sql/insert_user.sql", include_str!("../sql/insert_user.sql")),
    ("sql/insert_post.sql", include_str!("../sql/insert_post.sql")),
    ("sql/user_posts.sql", include_str!("../sql/user_posts.sql")),
    ("sql/upsert_user.sql", include_str!("../sql/upsert_user.sql")),
    ("sql/upsert_post.sql", include_str!("../sql/upsert_post.sql")),
];

/// Resources embedded at build time.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedResources {
    files: &'static [(&'static str, &'static str)],
}

impl EmbeddedResources {
    /// Directory the bundled query files live under.
    pub const DIR: &'static str = "sql";

    /// The query files shipped with this crate.
    pub fn bundled() -> Self {
        Self { files: BUNDLED }
    }
}

impl ResourceSet for EmbeddedResources {
    fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        Ok(self
            .files
            .iter()
            .map(|(name, _)| *name)
            .filter(|name| is_direct_child(name, dir))
            .map(str::to_string)
            .collect())
    }

    fn read(&self, name: &str) -> io::Result<String> {
        self.files
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, text)| (*text).to_string())
            .ok_or_else(|| not_found(name))
    }
}

/// Resources read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceSet for DirResources {
    /// Symlinks are listed whatever they point at; a link that does not
    /// resolve to a readable file fails later, on read.
    fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        let dir = dir.trim_matches('/');
        let mut names = Vec::new();
        for entry in WalkDir::new(self.root.join(dir))
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let file = entry.file_name().to_string_lossy();
            let name = if dir.is_empty() {
                file.into_owned()
            } else {
                format!("{dir}/{file}")
            };
            names.push(name);
        }
        Ok(names)
    }

    fn read(&self, name: &str) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(name))
    }
}

/// In-memory resources, mostly for tests.
///
/// An entry holding `None` is listed but fails to read.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    files: BTreeMap<String, Option<String>>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), Some(text.into()));
        self
    }

    /// Register a name whose reads always fail.
    pub fn insert_unreadable(&mut self, name: impl Into<String>) -> &mut Self {
        self.files.insert(name.into(), None);
        self
    }
}

impl<N, T> FromIterator<(N, T)> for MemoryResources
where
    N: Into<String>,
    T: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, T)>>(iter: I) -> Self {
        let mut resources = Self::new();
        for (name, text) in iter {
            resources.insert(name, text);
        }
        resources
    }
}

impl ResourceSet for MemoryResources {
    fn list(&self, dir: &str) -> io::Result<Vec<String>> {
        Ok(self
            .files
            .keys()
            .filter(|name| is_direct_child(name, dir))
            .cloned()
            .collect())
    }

    fn read(&self, name: &str) -> io::Result<String> {
        match self.files.get(name) {
            Some(Some(text)) => Ok(text.clone()),
            Some(None) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{name} is not readable"),
            )),
            None => Err(not_found(name)),
        }
    }
}

/// Whether `name` sits directly inside `dir`.
fn is_direct_child(name: &str, dir: &str) -> bool {
    let dir = dir.trim_matches('/');
    let rest = if dir.is_empty() {
        Some(name)
    } else {
        name.strip_prefix(dir).and_then(|rest| rest.strip_prefix('/'))
    };
    rest.is_some_and(|file| !file.is_empty() && !file.contains('/'))
}

fn not_found(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no resource named {name}"))
}
