//! Candidate filtering: source extension and ignore prefixes.
//!
//! Both filters are silent. A candidate that fails either one is simply
//! not a source file as far as the preloader is concerned.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Extension recognized when none is configured.
pub const DEFAULT_EXTENSION: &str = "php";

/// Case-sensitive suffix after the last `.` of the file name.
///
/// Unlike [`Path::extension`], a leading dot counts: `.php` has the
/// extension `php`. A name ending in `.` has an empty extension.
pub fn extension_of(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.rfind('.').map(|i| &name[i + 1..])
}

/// Whether `path` carries exactly the recognized extension.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    extension_of(path) == Some(extension)
}

/// Path prefixes excluded from loading.
///
/// Matching is plain byte-prefix matching on the path as spelled, so a
/// rule `src/Legacy` also excludes `src/LegacyBridge.php`.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<PathBuf>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule if the path is currently readable.
    ///
    /// Returns `false` (and stores nothing) when it is not.
    pub fn try_add(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if !is_readable(&path) {
            return false;
        }
        self.rules.push(path);
        true
    }

    /// Whether `path` starts with any stored rule.
    pub fn matches(&self, path: &Path) -> bool {
        let candidate = path.as_os_str().as_encoded_bytes();
        self.rules
            .iter()
            .any(|rule| candidate.starts_with(rule.as_os_str().as_encoded_bytes()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.rules.iter().map(PathBuf::as_path)
    }
}

/// Whether `path` exists and can be opened for reading.
///
/// Directories count as readable when they can be listed.
pub fn is_readable(path: &Path) -> bool {
    if path.as_os_str() == OsStr::new("") {
        return false;
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::read_dir(path).is_ok(),
        Ok(_) => std::fs::File::open(path).is_ok(),
        Err(_) => false,
    }
}
