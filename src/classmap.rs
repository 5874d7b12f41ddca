//! Generated class maps.
//!
//! A class map is produced by a dependency manager and maps class
//! identifiers to the files that define them. The preloader only cares
//! about the values: every mapped file becomes an extra root path.
//!
//! Two formats are understood:
//!
//! - Composer's `autoload_classmap.php`, a PHP file returning an array of
//!   `'Class\\Name' => $vendorDir . '/pkg/src/Name.php'` entries.
//! - A JSON object whose values are path strings.
//!
//! A missing file is an empty map, not an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Where Composer writes its class map, relative to the project root.
pub const DEFAULT_CLASS_MAP: &str = "vendor/composer/autoload_classmap.php";

/// Errors that can occur while reading a class map.
#[derive(Debug, Error)]
pub enum ClassMapError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed class map {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Ordered class-name to file-path mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassMap {
    entries: Vec<(String, PathBuf)>,
}

impl ClassMap {
    /// An empty map.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a class map from disk.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as a
    /// Composer PHP class map. Returns an empty map if `path` does not exist.
    pub fn read(path: &Path) -> Result<Self, ClassMapError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::empty()),
            Err(e) => {
                return Err(ClassMapError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let parsed = if is_json {
            Self::from_json_str(&content)
        } else {
            // $vendorDir and $baseDir are derived from the absolute location
            // of the map, the same way `dirname(__DIR__)` resolves them.
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let dir = fs::canonicalize(dir).map_err(|e| ClassMapError::Io {
                path: dir.to_path_buf(),
                source: e,
            })?;
            Self::from_php_str(&content, &dir)
        };

        parsed.map_err(|message| ClassMapError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Parse a JSON object of `"Class" => "path"` pairs, preserving file order.
    pub fn from_json_str(content: &str) -> Result<Self, String> {
        let object: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let mut entries = Vec::with_capacity(object.len());
        for (class, value) in object {
            match value {
                serde_json::Value::String(path) => entries.push((class, PathBuf::from(path))),
                other => {
                    return Err(format!(
                        "value for `{class}` must be a string, found {other}"
                    ))
                }
            }
        }

        Ok(Self { entries })
    }

    /// Parse a Composer `autoload_classmap.php`.
    ///
    /// `dir` is the directory containing the map (`vendor/composer`).
    /// Lines without a `=>` entry are skipped.
    pub fn from_php_str(content: &str, dir: &Path) -> Result<Self, String> {
        let vendor_dir = dir.parent().unwrap_or(dir);
        let base_dir = vendor_dir.parent().unwrap_or(vendor_dir);
        let vars = PhpVars {
            dir: dir.to_string_lossy().into_owned(),
            vendor_dir: vendor_dir.to_string_lossy().into_owned(),
            base_dir: base_dir.to_string_lossy().into_owned(),
        };

        let mut entries = Vec::new();
        for (index, line) in content.lines().enumerate() {
            let Some((key, value)) = line.split_once("=>") else {
                continue;
            };
            let line_no = index + 1;

            let class = parse_php_string(key.trim())
                .ok_or_else(|| format!("line {line_no}: expected quoted class name"))?;

            let expr = value.trim().trim_end_matches(',').trim_end();
            let path = eval_concat(expr, &vars)
                .map_err(|term| format!("line {line_no}: unsupported term `{term}`"))?;

            entries.push((class, PathBuf::from(path)));
        }

        Ok(Self { entries })
    }

    /// Number of mapped classes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the file for a class name.
    pub fn get(&self, class: &str) -> Option<&Path> {
        self.entries
            .iter()
            .find(|(name, _)| name == class)
            .map(|(_, path)| path.as_path())
    }

    /// Mapped file paths, in map order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|(_, path)| path.as_path())
    }

    /// Consume the map, yielding its file paths in map order.
    pub fn into_paths(self) -> Vec<PathBuf> {
        self.entries.into_iter().map(|(_, path)| path).collect()
    }
}

struct PhpVars {
    dir: String,
    vendor_dir: String,
    base_dir: String,
}

/// Evaluate `$vendorDir . '/x.php'` style concatenations.
/// On failure returns the offending term.
fn eval_concat(expr: &str, vars: &PhpVars) -> Result<String, String> {
    let mut out = String::new();
    for term in split_concat(expr) {
        let term = term.trim();
        match term {
            "$vendorDir" => out.push_str(&vars.vendor_dir),
            "$baseDir" => out.push_str(&vars.base_dir),
            "__DIR__" => out.push_str(&vars.dir),
            _ => match parse_php_string(term) {
                Some(literal) => out.push_str(&literal),
                None => return Err(term.to_string()),
            },
        }
    }
    Ok(out)
}

/// Split on `.` operators that sit outside of string literals.
fn split_concat(expr: &str) -> Vec<&str> {
    let mut terms = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in expr.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '.') => {
                terms.push(&expr[start..i]);
                start = i + 1;
            }
            (None, _) => {}
        }
    }
    terms.push(&expr[start..]);
    terms
}

/// Unquote a single- or double-quoted PHP string literal.
fn parse_php_string(s: &str) -> Option<String> {
    let quote = s.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = s.strip_prefix(quote)?.strip_suffix(quote)?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if next == '\\' || next == quote => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    Some(out)
}
