//! Sources for imported files.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Maps a logical import path to source text.
///
/// Implementations must answer consistently for the duration of one compile.
/// They may block; the compiler imposes no timeout.
pub trait ImportResolver {
    fn resolve(&self, path: &str) -> Option<String>;
}

impl<F> ImportResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, path: &str) -> Option<String> {
        self(path)
    }
}

/// In-memory resolver.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    files: BTreeMap<String, String>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.files.insert(path.into(), source.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapResolver {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        MapResolver {
            files: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl ImportResolver for MapResolver {
    fn resolve(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }
}

/// Looks imports up under a list of include roots, first hit wins.
#[derive(Debug, Clone, Default)]
pub struct FsResolver {
    roots: Vec<PathBuf>,
}

impl FsResolver {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        FsResolver {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// The first existing file for `path` under the include roots.
    pub fn locate(&self, path: &str) -> Option<PathBuf> {
        if !is_relative_import(path) {
            tracing::debug!(path, "import path escapes the include roots");
            return None;
        }
        self.roots
            .iter()
            .map(|root| root.join(path))
            .find(|candidate| candidate.is_file())
    }
}

impl ImportResolver for FsResolver {
    fn resolve(&self, path: &str) -> Option<String> {
        let file = self.locate(path)?;
        match std::fs::read_to_string(&file) {
            Ok(source) => {
                tracing::debug!(path, file = %file.display(), "resolved import from disk");
                Some(source)
            }
            Err(e) => {
                tracing::warn!(file = %file.display(), error = %e, "unreadable import");
                None
            }
        }
    }
}

/// Logical paths are relative and never climb out of their root.
fn is_relative_import(path: &str) -> bool {
    !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
