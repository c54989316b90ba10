//! Snapshot of the on-disk artifact tree.
//!
//! The engine never walks the output directory itself; callers load a
//! snapshot and pass it into every call. Writes go through
//! [`ArtifactTree::write_atomic`] so a cancelled run never leaves a
//! half-written file behind.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::error::{CoreError, CoreResult};

/// Text files under an output directory, keyed by `/`-separated relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactTree {
    root: PathBuf,
    files: BTreeMap<String, String>,
    /// Files that exist but are not valid UTF-8
    unreadable: BTreeSet<String>,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

impl ArtifactTree {
    /// An empty tree rooted at `root`.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
            unreadable: BTreeSet::new(),
        }
    }

    /// A tree with the given files, without touching the disk.
    pub fn from_files<I, P, C>(root: impl Into<PathBuf>, files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            root: root.into(),
            files: files
                .into_iter()
                .map(|(p, c)| (p.into(), c.into()))
                .collect(),
            unreadable: BTreeSet::new(),
        }
    }

    /// Load every text file under `root`. Hidden entries are skipped and
    /// files that are not valid UTF-8 are only recorded by path. A missing
    /// root is an empty tree.
    pub fn load(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        let mut tree = Self::empty(root.clone());
        if !root.exists() {
            debug!("Output directory {:?} does not exist yet", root);
            return Ok(tree);
        }

        for entry in WalkDir::new(&root)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
                CoreError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let key = relative_key(relative);
            let bytes = fs::read(entry.path()).map_err(|e| CoreError::io(entry.path(), e))?;
            match String::from_utf8(bytes) {
                Ok(content) => {
                    tree.files.insert(key, content);
                }
                Err(_) => {
                    debug!("{:?} is not valid UTF-8", entry.path());
                    tree.unreadable.insert(key);
                }
            }
        }

        debug!(
            "Loaded {} files from {:?} ({} unreadable)",
            tree.files.len(),
            root,
            tree.unreadable.len()
        );
        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|c| c.as_str())
    }

    /// Path and content of a file, both borrowed from the tree.
    pub fn get_entry(&self, path: &str) -> Option<(&str, &str)> {
        self.files
            .get_key_value(path)
            .map(|(p, c)| (p.as_str(), c.as_str()))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Whether a file exists at `path` but could not be read as text.
    pub fn is_unreadable(&self, path: &str) -> bool {
        self.unreadable.contains(path)
    }

    /// Record an unreadable file without touching the disk.
    pub fn with_unreadable(mut self, path: impl Into<String>) -> Self {
        self.unreadable.insert(path.into());
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|p| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Absolute location of a relative artifact path, refusing paths that
    /// would leave the root.
    pub fn resolve(&self, path: &str) -> CoreResult<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(CoreError::OutsideTree(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Write an artifact through a temporary file in the target directory.
    pub fn write_atomic(&self, path: &str, content: &str) -> CoreResult<PathBuf> {
        let target = self.resolve(path)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&parent).map_err(|e| CoreError::io(&parent, e))?;

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| CoreError::io(&parent, e))?;
        temp.write_all(content.as_bytes())
            .map_err(|e| CoreError::io(temp.path(), e))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| CoreError::io(temp.path(), e))?;
        temp.persist(&target)
            .map_err(|e| CoreError::io(&target, e.error))?;

        debug!("Wrote {:?}", target);
        Ok(target)
    }
}

fn relative_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
