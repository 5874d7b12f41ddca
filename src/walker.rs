//! Depth-first expansion of root paths into candidate files.
//!
//! Uses the `ignore` crate's walker with every filter turned off: hidden
//! files, `.gitignore` and friends are all visited. Entries come back in
//! whatever order the filesystem yields them unless sorting is requested.

use std::error::Error as _;
use std::io;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// Options for directory expansion.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Sort directory entries by file name instead of using enumeration order.
    pub sort_entries: bool,
    /// Descend into symlinked directories.
    pub follow_symlinks: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            sort_entries: false,
            follow_symlinks: true,
        }
    }
}

impl WalkOptions {
    /// Options with deterministic, name-sorted traversal.
    pub fn sorted() -> Self {
        Self {
            sort_entries: true,
            ..Default::default()
        }
    }
}

/// Item produced while expanding a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    /// A non-directory path to hand to the load gate.
    File(PathBuf),
    /// A directory (or entry) that could not be read. Traversal continues.
    Error { path: PathBuf, message: String },
}

/// Strip trailing `/` from a configured root, keeping a bare `/` intact.
pub fn trim_root(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) => {
            let trimmed = s.trim_end_matches('/');
            if trimmed.is_empty() && !s.is_empty() {
                PathBuf::from("/")
            } else {
                PathBuf::from(trimmed)
            }
        }
        None => path.to_path_buf(),
    }
}

/// Expand `root` into candidate files, depth-first.
///
/// A root that is not a directory (including one that does not exist) is
/// yielded as-is; the load gate decides what to do with it.
///
/// # Examples
///
/// ```no_run
/// use preload::walker::{expand, WalkEvent, WalkOptions};
/// use std::path::Path;
///
/// for event in expand(Path::new("src"), &WalkOptions::default()) {
///     if let WalkEvent::File(path) = event {
///         println!("{}", path.display());
///     }
/// }
/// ```
pub fn expand(root: &Path, options: &WalkOptions) -> impl Iterator<Item = WalkEvent> {
    if !root.is_dir() {
        return either::Either::Left(std::iter::once(WalkEvent::File(root.to_path_buf())));
    }

    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .hidden(false)
        .follow_links(options.follow_symlinks);

    if options.sort_entries {
        builder.sort_by_file_name(|a, b| a.cmp(b));
    }

    let fallback = root.to_path_buf();
    let walker = builder.build();

    either::Either::Right(walker.filter_map(move |result| match result {
        Ok(entry) => {
            if entry.depth() == 0 {
                return None;
            }
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if is_dir {
                None
            } else {
                Some(WalkEvent::File(entry.into_path()))
            }
        }
        Err(err) => {
            let (path, message) = describe_error(&err);
            match path {
                // A dangling symlink fails to stat but is still a file entry.
                Some(path) if is_dangling_entry(&err, &path) => Some(WalkEvent::File(path)),
                path => Some(WalkEvent::Error {
                    path: path.unwrap_or_else(|| fallback.clone()),
                    message,
                }),
            }
        }
    }))
}

/// Whether a walk error refers to an entry that exists but cannot be
/// resolved, such as a symlink whose target is gone.
fn is_dangling_entry(err: &ignore::Error, path: &Path) -> bool {
    !is_loop(err) && std::fs::symlink_metadata(path).is_ok() && !path.is_dir()
}

fn is_loop(err: &ignore::Error) -> bool {
    match err {
        ignore::Error::Loop { .. } => true,
        ignore::Error::WithPath { err, .. }
        | ignore::Error::WithDepth { err, .. }
        | ignore::Error::WithLineNumber { err, .. } => is_loop(err),
        _ => false,
    }
}

/// Collect only the candidate files under `root`, dropping walk errors.
pub fn candidates(root: &Path, options: &WalkOptions) -> Vec<PathBuf> {
    expand(root, options)
        .filter_map(|event| match event {
            WalkEvent::File(path) => Some(path),
            WalkEvent::Error { .. } => None,
        })
        .collect()
}

/// Peel path/depth wrappers off an `ignore` error.
///
/// The message comes from the underlying `io::Error` when there is one,
/// so it does not repeat the path.
fn describe_error(err: &ignore::Error) -> (Option<PathBuf>, String) {
    match err {
        ignore::Error::WithPath { path, err: inner } => {
            let message = match inner.io_error() {
                Some(io_err) => io_message(io_err),
                None => describe_error(inner).1,
            };
            (Some(path.clone()), message)
        }
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            describe_error(err)
        }
        ignore::Error::Loop { child, .. } => (Some(child.clone()), err.to_string()),
        ignore::Error::Partial(errs) if !errs.is_empty() => describe_error(&errs[0]),
        other => (None, other.to_string()),
    }
}

/// walkdir hides its own error inside the `io::Error`; report the root cause.
fn io_message(io_err: &io::Error) -> String {
    match io_err.get_ref().and_then(|inner| inner.source()) {
        Some(source) => source.to_string(),
        None => io_err.to_string(),
    }
}

/// Minimal Either so the two expansion shapes share one return type.
mod either {
    pub enum Either<L, R> {
        Left(L),
        Right(R),
    }

    impl<L, R, T> Iterator for Either<L, R>
    where
        L: Iterator<Item = T>,
        R: Iterator<Item = T>,
    {
        type Item = T;

        fn next(&mut self) -> Option<Self::Item> {
            match self {
                Either::Left(l) => l.next(),
                Either::Right(r) => r.next(),
            }
        }
    }
}
