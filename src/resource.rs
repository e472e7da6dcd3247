use anyhow::{Context, Result, bail};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Read access to changelog files, used by the loader for the source and
/// everything it includes.
pub trait ResourceAccessor {
    /// Contents of the changelog at `path`.
    fn read_to_string(&self, path: &str) -> Result<String>;

    /// Files below the directory `path`, recursively, sorted, with each
    /// entry spelled as `path` joined with its relative name.
    fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Key under which two spellings of the same file compare equal.
    fn identity(&self, path: &str) -> String {
        path.to_string()
    }
}

/// Resolves relative paths against a fixed root directory.
#[derive(Debug, Clone)]
pub struct FileSystemResourceAccessor {
    root: PathBuf,
}

impl FileSystemResourceAccessor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Accessor rooted at the process working directory.
    pub fn current_dir() -> Result<Self> {
        let root = std::env::current_dir().context("failed to read working directory")?;
        Ok(Self::new(root))
    }

    /// Absolute, lexically normalized location of `path`.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.trim().is_empty() {
            bail!("empty resource path");
        }
        let resolved = Path::new(path)
            .absolutize_from(&self.root)
            .with_context(|| format!("cannot resolve {path} under {}", self.root.display()))?;
        Ok(resolved.into_owned())
    }
}

impl ResourceAccessor for FileSystemResourceAccessor {
    fn read_to_string(&self, path: &str) -> Result<String> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .with_context(|| format!("failed to read {}", resolved.display()))
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path)?;
        if !dir.is_dir() {
            bail!("not a directory: {}", dir.display());
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&dir)?;
            files.push(join_resource_path(path, &rel.to_string_lossy()));
        }
        Ok(files)
    }

    fn identity(&self, path: &str) -> String {
        self.resolve(path)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| path.to_string())
    }
}

/// Join changelog paths with `/`, the separator changelogs are written with.
pub fn join_resource_path(base: &str, rel: &str) -> String {
    let rel = rel.replace('\\', "/");
    if base.is_empty() || Path::new(&rel).is_absolute() {
        return rel;
    }
    format!("{}/{}", base.trim_end_matches(['/', '\\']), rel)
}

/// Directory part of a changelog path, `""` when it has none.
pub fn parent_of(path: &str) -> String {
    Path::new(path)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}
