//! Scope loaders: what one code-loading scope can see.

use log::debug;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

const ARCHIVE_SEPARATOR: &str = "!/";

/// Physical location a loader reports for a relative resource path.
///
/// Tagged by kind so roots are opened without inspecting URL schemes later.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceLocation {
    /// A file or directory on the local filesystem.
    Filesystem(PathBuf),
    /// A file or directory inside a zip-format archive (`.jar`, `.zip`).
    Archived { archive: PathBuf, entry: String },
}

impl ResourceLocation {
    /// Converts a `file:` or `jar:file:<archive>!/<entry>` URL.
    ///
    /// Percent escapes are decoded in both the archive path and the entry.
    ///
    /// Returns `None` for malformed URLs, other schemes, and archive URLs
    /// without an entry path.
    pub fn from_url(raw: &str) -> Option<Self> {
        let url = match Url::parse(raw.trim()) {
            Ok(url) => url,
            Err(err) => {
                debug!("event=resource_url module=scope status=skipped reason=malformed error={err}");
                return None;
            }
        };

        match url.scheme() {
            "file" => url.to_file_path().ok().map(Self::Filesystem),
            "jar" => {
                let (outer, entry) = url.path().split_once(ARCHIVE_SEPARATOR)?;
                let entry = urlencoding::decode(entry).ok()?;
                let entry = entry.trim_matches('/');
                if entry.is_empty() {
                    return None;
                }
                let archive_url = Url::parse(outer).ok()?;
                if archive_url.scheme() != "file" {
                    return None;
                }
                let archive = archive_url.to_file_path().ok()?;
                Some(Self::Archived {
                    archive,
                    entry: entry.to_string(),
                })
            }
            other => {
                debug!("event=resource_url module=scope status=skipped reason=unsupported_scheme scheme={other}");
                None
            }
        }
    }
}

impl Display for ResourceLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filesystem(path) => write!(f, "{}", path.display()),
            Self::Archived { archive, entry } => {
                write!(f, "{}{ARCHIVE_SEPARATOR}{entry}", archive.display())
            }
        }
    }
}

/// Resolves relative resource paths for one scope.
///
/// Implemented by the host's plugin subsystem; `ClassPath` is the built-in
/// implementation.
pub trait ResourceLoader: Send + Sync {
    /// Locations visible through this scope's own entries only.
    fn find_own_resources(&self, relative: &str) -> Vec<ResourceLocation>;

    /// Locations visible through this scope and everything it delegates to.
    ///
    /// Defaults to the scope's own view for loaders without delegation.
    fn find_resources(&self, relative: &str) -> Vec<ResourceLocation> {
        self.find_own_resources(relative)
    }
}

/// One class-path element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClassPathEntry {
    Directory(PathBuf),
    Archive(PathBuf),
}

impl ClassPathEntry {
    /// Classifies `path`: an existing directory stays a directory even when
    /// named like an archive (exploded plugin); otherwise `.jar`/`.zip` are
    /// archives and anything else is a directory.
    pub fn detect(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.is_dir() && is_archive_name(&path) {
            Self::Archive(path)
        } else {
            Self::Directory(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::Archive(path) => path,
        }
    }

    /// Returns where `relative` would live under this entry, if it can.
    ///
    /// Directory entries are checked on disk. Archive entries only check
    /// that the archive exists; the entry itself is verified when opened.
    pub fn resolve(&self, relative: &str) -> Option<ResourceLocation> {
        let relative = relative.trim_matches('/');
        if relative.is_empty() {
            return None;
        }
        match self {
            Self::Directory(dir) => {
                let candidate = relative
                    .split('/')
                    .fold(dir.clone(), |path, segment| path.join(segment));
                candidate
                    .exists()
                    .then_some(ResourceLocation::Filesystem(candidate))
            }
            Self::Archive(archive) => archive.is_file().then(|| ResourceLocation::Archived {
                archive: archive.clone(),
                entry: relative.to_string(),
            }),
        }
    }
}

fn is_archive_name(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Ordered class path with optional parent delegation.
#[derive(Clone, Default)]
pub struct ClassPath {
    entries: Vec<ClassPathEntry>,
    parent: Option<Arc<dyn ResourceLoader>>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a class path that delegates to `parent` for the aggregate view.
    pub fn with_parent(parent: Arc<dyn ResourceLoader>) -> Self {
        Self {
            entries: Vec::new(),
            parent: Some(parent),
        }
    }

    pub fn push(&mut self, entry: ClassPathEntry) {
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// Builder-style `push`.
    pub fn entry(mut self, entry: ClassPathEntry) -> Self {
        self.push(entry);
        self
    }

    /// Builder-style `push` with kind detection.
    pub fn path(self, path: impl Into<PathBuf>) -> Self {
        self.entry(ClassPathEntry::detect(path))
    }

    pub fn entries(&self) -> &[ClassPathEntry] {
        &self.entries
    }
}

impl ResourceLoader for ClassPath {
    fn find_own_resources(&self, relative: &str) -> Vec<ResourceLocation> {
        self.entries
            .iter()
            .filter_map(|entry| entry.resolve(relative))
            .collect()
    }

    fn find_resources(&self, relative: &str) -> Vec<ResourceLocation> {
        let mut found = match &self.parent {
            Some(parent) => parent.find_resources(relative),
            None => Vec::new(),
        };
        for location in self.find_own_resources(relative) {
            if !found.contains(&location) {
                found.push(location);
            }
        }
        found
    }
}

impl std::fmt::Debug for ClassPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassPath")
            .field("entries", &self.entries)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
