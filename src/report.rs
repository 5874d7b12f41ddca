//! Diagnostics and the end-of-run report.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during report formatting.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A locally recovered condition worth telling the operator about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An ignore rule named a path that could not be read; the rule was dropped.
    IgnoreRejected { path: PathBuf },
    /// A file whose canonical path was already loaded.
    Skipped { path: PathBuf },
    /// The loader raised a fault for this file.
    LoadFailed { path: PathBuf, message: String },
    /// A directory could not be enumerated.
    WalkFailed { path: PathBuf, message: String },
}

impl Diagnostic {
    /// Path the diagnostic is about.
    pub fn path(&self) -> &Path {
        match self {
            Diagnostic::IgnoreRejected { path }
            | Diagnostic::Skipped { path }
            | Diagnostic::LoadFailed { path, .. }
            | Diagnostic::WalkFailed { path, .. } => path.as_path(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::IgnoreRejected { path } => {
                write!(f, "[Preloader] Failed to ignore path `{}`", path.display())
            }
            Diagnostic::Skipped { path } => {
                write!(f, "[Preloader] Skipped `{}`", path.display())
            }
            Diagnostic::LoadFailed { path, message } => {
                write!(f, "[Preloader] Failed to load `{}`: {}", path.display(), message)
            }
            Diagnostic::WalkFailed { path, message } => {
                write!(
                    f,
                    "[Preloader] Failed to read directory `{}`: {}",
                    path.display(),
                    message
                )
            }
        }
    }
}

/// Snapshot of what a load pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
    /// Number of files loaded.
    pub count: usize,
    /// Loaded paths, in load order, as first spelled.
    pub included: Vec<PathBuf>,
    /// Everything that was skipped or failed with a message.
    pub diagnostics: Vec<Diagnostic>,
}

impl PreloadReport {
    pub fn failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::LoadFailed { .. }))
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One path per line followed by a summary.
    #[default]
    Text,
    /// JSON for programmatic access.
    Json,
}

/// Render a report.
pub fn format_report(report: &PreloadReport, format: OutputFormat) -> Result<String, OutputError> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(report)?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for path in &report.included {
                out.push_str(&path.display().to_string());
                out.push('\n');
            }
            let failed = report.failures().count();
            out.push_str(&format!(
                "[Preloader] Preloaded {} {}",
                report.count,
                if report.count == 1 { "file" } else { "files" }
            ));
            if failed > 0 {
                out.push_str(&format!(", {failed} failed"));
            }
            out.push('\n');
            Ok(out)
        }
    }
}
