//! Scope resource locator.
//!
//! # Responsibility
//! - Turn loader-reported locations into openable roots.
//! - Give directory roots and archive roots one traversal capability.
//!
//! # Invariants
//! - Missing files, missing archive entries and malformed locations yield no
//!   root and no diagnostic.
//! - Unexpected I/O failures (unreadable or corrupt archive) are reported and
//!   that location contributes no root; other locations still resolve.
//! - An archive root owns its open archive handle; dropping the root closes
//!   it, on every exit path.
//! - The same location is never opened twice in one resolution.

use crate::diagnostics::Diagnostics;
use crate::scope::loader::{ResourceLoader, ResourceLocation};
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Which part of a loader's view to resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Only the scope's own class-path entries.
    Own,
    /// The scope plus everything it delegates to.
    Aggregate,
}

/// Callback used to visit one index file: display name and a line reader.
pub type VisitFile<'a> = dyn FnMut(&str, &mut dyn BufRead) -> io::Result<()> + 'a;

/// A resolved, opened location that may hold index resources.
#[derive(Debug)]
pub enum Root {
    Directory(DirectoryRoot),
    Archive(ArchiveRoot),
}

impl Root {
    /// Human-readable location for logs and diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Directory(root) => root.path.display().to_string(),
            Self::Archive(root) => format!("{}!/{}", root.archive_path.display(), root.entry),
        }
    }

    /// Visits the index files of this root, one level deep.
    ///
    /// A root naming a file is visited as that single file. A root naming a
    /// directory visits its immediate child files; nested directories are
    /// skipped. Files are visited in name order.
    ///
    /// Returns how many files were visited.
    pub fn visit_files(&mut self, visit: &mut VisitFile<'_>) -> io::Result<usize> {
        match self {
            Self::Directory(root) => root.visit_files(visit),
            Self::Archive(root) => root.visit_files(visit),
        }
    }
}

/// Root on the local filesystem (a file or a directory).
#[derive(Debug)]
pub struct DirectoryRoot {
    path: PathBuf,
}

impl DirectoryRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn visit_files(&mut self, visit: &mut VisitFile<'_>) -> io::Result<usize> {
        let metadata = match fs::metadata(&self.path) {
            Ok(metadata) => metadata,
            // Removed between resolution and read.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err),
        };

        if metadata.is_file() {
            visit_path(&self.path, visit)?;
            return Ok(1);
        }

        let mut files = Vec::new();
        for child in fs::read_dir(&self.path)? {
            let child = child?.path();
            if child.is_file() {
                files.push(child);
            }
        }
        files.sort();

        for file in &files {
            visit_path(file, visit)?;
        }
        Ok(files.len())
    }
}

fn visit_path(path: &Path, visit: &mut VisitFile<'_>) -> io::Result<()> {
    let mut reader = BufReader::new(File::open(path)?);
    visit(&path.display().to_string(), &mut reader)
}

/// Root inside a zip-format archive, holding the open archive.
pub struct ArchiveRoot {
    archive_path: PathBuf,
    entry: String,
    archive: ZipArchive<BufReader<File>>,
    files: Vec<String>,
}

impl ArchiveRoot {
    /// Opens `archive_path` and checks that `entry` exists inside it.
    ///
    /// Returns `Ok(None)` when the archive file or the entry is missing.
    ///
    /// # Errors
    /// - Returns an error when the archive cannot be read or is not a valid
    ///   zip archive.
    pub fn open(archive_path: &Path, entry: &str) -> io::Result<Option<Self>> {
        let file = match File::open(archive_path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        let archive = ZipArchive::new(BufReader::new(file)).map_err(io::Error::from)?;

        let entry = entry.trim_matches('/').to_string();
        let files = archive_index_files(archive.file_names(), &entry);
        let exists = !files.is_empty()
            || archive
                .file_names()
                .any(|name| name.trim_end_matches('/') == entry);
        if !exists {
            return Ok(None);
        }

        Ok(Some(Self {
            archive_path: archive_path.to_path_buf(),
            entry,
            archive,
            files,
        }))
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    fn visit_files(&mut self, visit: &mut VisitFile<'_>) -> io::Result<usize> {
        for name in &self.files {
            let file = self.archive.by_name(name).map_err(io::Error::from)?;
            let mut reader = BufReader::new(file);
            let display = format!("{}!/{}", self.archive_path.display(), name);
            visit(&display, &mut reader)?;
        }
        Ok(self.files.len())
    }
}

impl std::fmt::Debug for ArchiveRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveRoot")
            .field("archive_path", &self.archive_path)
            .field("entry", &self.entry)
            .field("files", &self.files)
            .finish()
    }
}

/// Selects archive file names that are `entry` itself or its immediate
/// children, sorted.
fn archive_index_files<'a>(names: impl Iterator<Item = &'a str>, entry: &str) -> Vec<String> {
    let prefix = format!("{entry}/");
    let mut files: Vec<String> = names
        .filter(|name| !name.ends_with('/'))
        .filter(|name| {
            *name == entry
                || name
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
        })
        .map(str::to_string)
        .collect();
    files.sort();
    files
}

/// Resolves scope loaders into opened roots.
pub struct ScopeResourceLocator<'a> {
    diagnostics: &'a dyn Diagnostics,
}

impl<'a> ScopeResourceLocator<'a> {
    pub fn new(diagnostics: &'a dyn Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// Resolves `relative` through `loader` into zero or more roots.
    ///
    /// Never fails: locations that cannot be opened are skipped, and only
    /// unexpected I/O failures are reported.
    pub fn locate_roots(
        &self,
        loader: &dyn ResourceLoader,
        relative: &str,
        visibility: Visibility,
    ) -> Vec<Root> {
        let locations = match visibility {
            Visibility::Own => loader.find_own_resources(relative),
            Visibility::Aggregate => loader.find_resources(relative),
        };

        let mut seen = Vec::with_capacity(locations.len());
        let mut roots = Vec::new();
        for location in locations {
            if seen.contains(&location) {
                continue;
            }
            if let Some(root) = self.open_root(&location) {
                roots.push(root);
            }
            seen.push(location);
        }

        if roots.is_empty() {
            debug!("event=locate_roots module=locator status=empty resource={relative}");
        } else {
            debug!(
                "event=locate_roots module=locator status=ok resource={} roots={}",
                relative,
                roots.len()
            );
        }
        roots
    }

    /// Opens one location, swallowing benign conditions.
    pub fn open_root(&self, location: &ResourceLocation) -> Option<Root> {
        match try_open_root(location) {
            Ok(Some(root)) => Some(root),
            Ok(None) => {
                debug!("event=open_root module=locator status=skipped reason=not_found location={location}");
                None
            }
            Err(err) => {
                self.diagnostics
                    .report(&format!("cannot open extension index root `{location}`: {err}"));
                None
            }
        }
    }
}

fn try_open_root(location: &ResourceLocation) -> io::Result<Option<Root>> {
    match location {
        ResourceLocation::Filesystem(path) => {
            if path.exists() {
                Ok(Some(Root::Directory(DirectoryRoot { path: path.clone() })))
            } else {
                Ok(None)
            }
        }
        ResourceLocation::Archived { archive, entry } => {
            Ok(ArchiveRoot::open(archive, entry)?.map(Root::Archive))
        }
    }
}
