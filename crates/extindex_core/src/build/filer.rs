//! Build output resource access with per-cycle open tracking.

use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Filer access errors.
#[derive(Debug)]
pub enum FilerError {
    /// The resource does not exist yet.
    NotFound(String),
    /// The resource was already created in this cycle.
    AlreadyOpened(String),
    /// The cycle was closed; no more resources can be opened.
    Closed,
    /// The relative path is empty or escapes the output root.
    InvalidPath(String),
    Io { path: PathBuf, source: io::Error },
}

impl FilerError {
    /// Whether this condition is part of a normal build lifecycle.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::AlreadyOpened(_) | Self::Closed
        )
    }
}

impl Display for FilerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(value) => write!(f, "resource not found: {value}"),
            Self::AlreadyOpened(value) => {
                write!(f, "resource already opened in this cycle: {value}")
            }
            Self::Closed => write!(f, "filer is closed for this cycle"),
            Self::InvalidPath(value) => write!(f, "invalid resource path: {value}"),
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
        }
    }
}

impl Error for FilerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct FilerState {
    created: BTreeSet<String>,
    closed: bool,
}

/// Resources under one build output root, for one build cycle.
///
/// A resource may be read before it is created, but not after, and it may
/// be created at most once per cycle.
#[derive(Debug)]
pub struct Filer {
    output_root: PathBuf,
    state: Mutex<FilerState>,
}

impl Filer {
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        Self {
            output_root: output_root.into(),
            state: Mutex::new(FilerState::default()),
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Creates (or truncates) a resource for writing, creating parent
    /// directories as needed.
    pub fn create_resource(&self, relative: &str) -> Result<BufWriter<File>, FilerError> {
        let (key, path) = self.resolve(relative)?;
        {
            let mut state = self.lock_state();
            if state.closed {
                return Err(FilerError::Closed);
            }
            if !state.created.insert(key.clone()) {
                return Err(FilerError::AlreadyOpened(key));
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| FilerError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let file = File::create(&path).map_err(|source| FilerError::Io { path, source })?;
        Ok(BufWriter::new(file))
    }

    /// Opens an existing resource for reading.
    pub fn open_resource(&self, relative: &str) -> Result<BufReader<File>, FilerError> {
        let (key, path) = self.resolve(relative)?;
        self.ensure_readable(&key)?;

        match File::open(&path) {
            Ok(file) => Ok(BufReader::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(FilerError::NotFound(key)),
            Err(source) => Err(FilerError::Io { path, source }),
        }
    }

    /// Lists immediate child files of a resource directory, sorted by name.
    pub fn list_resources(&self, relative_dir: &str) -> Result<Vec<String>, FilerError> {
        let (key, path) = self.resolve(relative_dir)?;
        self.ensure_readable(&key)?;

        let read_dir = match fs::read_dir(&path) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(FilerError::NotFound(key))
            }
            Err(source) => return Err(FilerError::Io { path, source }),
        };

        let mut names = Vec::new();
        for child in read_dir {
            let child = child.map_err(|source| FilerError::Io {
                path: path.clone(),
                source,
            })?;
            if child.path().is_file() {
                if let Some(name) = child.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Ends the current cycle.
    pub fn close(&self) {
        self.lock_state().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    fn ensure_readable(&self, key: &str) -> Result<(), FilerError> {
        let state = self.lock_state();
        if state.closed {
            return Err(FilerError::Closed);
        }
        if state.created.contains(key) {
            return Err(FilerError::AlreadyOpened(key.to_string()));
        }
        Ok(())
    }

    fn resolve(&self, relative: &str) -> Result<(String, PathBuf), FilerError> {
        let key = normalize_relative(relative)
            .ok_or_else(|| FilerError::InvalidPath(relative.to_string()))?;
        let path = key
            .split('/')
            .fold(self.output_root.clone(), |path, segment| path.join(segment));
        Ok((key, path))
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FilerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Normalizes a `/`-separated relative path; `None` if it could escape the
/// output root.
fn normalize_relative(relative: &str) -> Option<String> {
    let trimmed = relative.trim();
    if trimmed.is_empty() || trimmed.starts_with('/') || trimmed.contains('\\') {
        return None;
    }
    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty()
        || segments
            .iter()
            .any(|segment| *segment == "." || *segment == ".." || segment.contains(':'))
    {
        return None;
    }
    Some(segments.join("/"))
}
