//! The preloader: path registry, load gate, and running stats.
//!
//! A [`Preloader`] is configured once, run once with [`Preloader::load`],
//! and then queried. Every per-file failure is downgraded to a
//! [`Diagnostic`]; nothing escapes `load`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::classmap::{ClassMap, DEFAULT_CLASS_MAP};
use crate::errors::PreloadError;
use crate::filter::{has_extension, IgnoreRules, DEFAULT_EXTENSION};
use crate::loader::FileLoader;
use crate::report::{Diagnostic, PreloadReport};
use crate::walker::{expand, trim_root, WalkEvent, WalkOptions};

/// Preloader configuration.
#[derive(Debug, Clone)]
pub struct PreloadOptions {
    /// The single recognized source extension, without the dot.
    pub extension: String,
    /// Class map whose values become extra roots. `None` disables discovery.
    pub class_map: Option<PathBuf>,
    /// Directory traversal options.
    pub walk: WalkOptions,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_string(),
            class_map: Some(PathBuf::from(DEFAULT_CLASS_MAP)),
            walk: WalkOptions::default(),
        }
    }
}

impl PreloadOptions {
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn class_map(mut self, path: impl Into<PathBuf>) -> Self {
        self.class_map = Some(path.into());
        self
    }

    pub fn no_class_map(mut self) -> Self {
        self.class_map = None;
        self
    }

    /// Sort directory entries by name for a reproducible load order.
    pub fn sort_entries(mut self, sort: bool) -> Self {
        self.walk.sort_entries = sort;
        self
    }
}

/// Walks configured roots and loads every matching file once.
///
/// # Examples
///
/// ```no_run
/// use preload::{Preloader, PreloadOptions, ReadLoader};
///
/// let mut preloader = Preloader::with_options(
///     ReadLoader::new(),
///     ["src"],
///     PreloadOptions::default().no_class_map(),
/// )
/// .unwrap()
/// .ignore(["src/Legacy"]);
///
/// preloader.load();
/// println!("preloaded {} files", preloader.count());
/// ```
pub struct Preloader<L> {
    loader: L,
    options: PreloadOptions,
    paths: Vec<PathBuf>,
    ignores: IgnoreRules,
    count: usize,
    included: Vec<PathBuf>,
    loaded: HashSet<PathBuf>,
    diagnostics: Vec<Diagnostic>,
}

impl<L: FileLoader> Preloader<L> {
    /// Create a preloader with default options.
    ///
    /// Explicit paths come first, followed by every file listed in the
    /// Composer class map at its default location (if present).
    pub fn new<I, P>(loader: L, paths: I) -> Result<Self, PreloadError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::with_options(loader, paths, PreloadOptions::default())
    }

    /// Create a preloader with explicit options.
    ///
    /// Fails only if the configured class map exists but cannot be read.
    pub fn with_options<I, P>(
        loader: L,
        paths: I,
        options: PreloadOptions,
    ) -> Result<Self, PreloadError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut roots: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();

        if let Some(map_path) = &options.class_map {
            let map = ClassMap::read(map_path)?;
            log::debug!(
                "class map {} lists {} files",
                map_path.display(),
                map.len()
            );
            roots.extend(map.into_paths());
        }

        Ok(Self {
            loader,
            options,
            paths: roots,
            ignores: IgnoreRules::new(),
            count: 0,
            included: Vec::new(),
            loaded: HashSet::new(),
            diagnostics: Vec::new(),
        })
    }

    /// Add more root paths.
    pub fn paths<I, P>(mut self, more: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.paths.extend(more.into_iter().map(Into::into));
        self
    }

    /// Exclude every candidate whose path starts with one of `names`.
    ///
    /// Names that are not readable right now are rejected with a diagnostic.
    pub fn ignore<I, P>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        for name in names {
            let name = name.into();
            if !self.ignores.try_add(name.clone()) {
                self.emit(Diagnostic::IgnoreRejected { path: name });
            }
        }
        self
    }

    /// Expand every root and load each matching file.
    pub fn load(&mut self) {
        let roots = self.paths.clone();
        let walk = self.options.walk.clone();
        for root in roots {
            let root = trim_root(&root);
            for event in expand(&root, &walk) {
                match event {
                    WalkEvent::File(path) => self.load_file(path),
                    WalkEvent::Error { path, .. } if self.ignores.matches(&path) => {}
                    WalkEvent::Error { path, message } => {
                        self.emit(Diagnostic::WalkFailed { path, message })
                    }
                }
            }
        }
        log::info!("preloaded {} files", self.count);
    }

    /// Filter, de-duplicate, load, and record a single candidate.
    fn load_file(&mut self, path: PathBuf) {
        if !has_extension(&path, &self.options.extension) {
            return;
        }
        if self.ignores.matches(&path) {
            return;
        }

        // A path that cannot be resolved is still handed to the loader,
        // which produces the real fault message.
        let canonical = std::fs::canonicalize(&path).ok();
        if canonical.as_ref().is_some_and(|c| self.loaded.contains(c)) {
            self.emit(Diagnostic::Skipped { path });
            return;
        }

        if let Err(e) = self.loader.load(&path) {
            self.emit(Diagnostic::LoadFailed {
                path,
                message: e.to_string(),
            });
            return;
        }

        log::debug!("loaded {}", path.display());
        if let Some(canonical) = canonical {
            self.loaded.insert(canonical);
        }
        self.included.push(path);
        self.count += 1;
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }
}

impl<L> Preloader<L> {
    /// Number of files loaded so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Loaded paths in load order, as first spelled.
    pub fn list(&self) -> &[PathBuf] {
        &self.included
    }

    /// Configured roots, explicit first, class map entries after.
    pub fn roots(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Accepted ignore rules.
    pub fn ignores(&self) -> impl Iterator<Item = &Path> {
        self.ignores.iter()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn options(&self) -> &PreloadOptions {
        &self.options
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Snapshot the current stats.
    pub fn report(&self) -> PreloadReport {
        PreloadReport {
            count: self.count,
            included: self.included.clone(),
            diagnostics: self.diagnostics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::LoadError;
    use std::fs;
    use tempfile::TempDir;

    /// Records every path it is asked to load; fails for names containing "bad".
    #[derive(Default)]
    struct RecordingLoader {
        calls: Vec<PathBuf>,
    }

    impl FileLoader for RecordingLoader {
        fn load(&mut self, path: &Path) -> Result<(), LoadError> {
            self.calls.push(path.to_path_buf());
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.contains("bad") {
                return Err(LoadError::Other("PHP Parse error: unexpected '}'".to_string()));
            }
            if !path.exists() {
                return Err(LoadError::Other(format!("no such file: {}", path.display())));
            }
            Ok(())
        }
    }

    fn preloader<P: Into<PathBuf>>(
        paths: impl IntoIterator<Item = P>,
    ) -> Preloader<RecordingLoader> {
        Preloader::with_options(
            RecordingLoader::default(),
            paths,
            PreloadOptions::default().no_class_map(),
        )
        .unwrap()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "<?php\n").unwrap();
    }

    fn assert_consistent<L>(p: &Preloader<L>) {
        assert_eq!(p.count(), p.list().len());
    }

    #[test]
    fn test_empty_before_load() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.php"));

        let p = preloader([dir.path()]);
        assert_eq!(p.count(), 0);
        assert!(p.list().is_empty());
    }

    #[test]
    fn test_overlapping_roots_load_once() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/Foo.php"));

        let mut p = preloader([dir.path().join("src"), dir.path().to_path_buf()]);
        p.load();

        assert_eq!(p.count(), 1);
        assert_eq!(p.list(), &[dir.path().join("src/Foo.php")]);
        assert_eq!(p.loader().calls.len(), 1);
        assert_eq!(
            p.diagnostics(),
            &[Diagnostic::Skipped {
                path: dir.path().join("src/Foo.php")
            }]
        );
        assert_consistent(&p);
    }

    #[test]
    fn test_same_root_twice() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.php"));

        let mut p = preloader([dir.path(), dir.path()]);
        p.load();

        assert_eq!(p.count(), 1);
        assert_consistent(&p);
    }

    #[test]
    fn test_extension_filter_is_silent() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.php"));
        touch(&dir.path().join("b.txt"));
        touch(&dir.path().join("c"));

        let mut p = preloader([dir.path()]);
        p.load();

        assert_eq!(p.loader().calls, vec![dir.path().join("a.php")]);
        assert_eq!(p.count(), 1);
        assert!(p.diagnostics().is_empty());
    }

    #[test]
    fn test_custom_extension() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.php"));
        touch(&dir.path().join("b.inc"));

        let mut p = Preloader::with_options(
            RecordingLoader::default(),
            [dir.path()],
            PreloadOptions::default().no_class_map().extension("inc"),
        )
        .unwrap();
        p.load();

        assert_eq!(p.list(), &[dir.path().join("b.inc")]);
    }

    #[test]
    fn test_ignore_prefix_skips_subdirectory_only() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("legacy/Old.php"));
        touch(&dir.path().join("legacy/deep/Older.php"));
        touch(&dir.path().join("modern/New.php"));

        let mut p = preloader([dir.path()]).ignore([dir.path().join("legacy")]);
        p.load();

        assert_eq!(p.list(), &[dir.path().join("modern/New.php")]);
        assert!(p.diagnostics().is_empty());
        assert_consistent(&p);
    }

    #[test]
    fn test_unreadable_ignore_is_rejected() {
        let dir = TempDir::new().unwrap();
        let future = dir.path().join("later");

        let p = preloader([dir.path()]).ignore([future.clone()]);
        assert_eq!(p.ignores().count(), 0);
        assert_eq!(
            p.diagnostics(),
            &[Diagnostic::IgnoreRejected {
                path: future.clone()
            }]
        );

        // Created after configuration: still loaded.
        touch(&future.join("x.php"));
        let mut p = p;
        p.load();
        assert_eq!(p.list(), &[future.join("x.php")]);
    }

    #[test]
    fn test_fault_isolation() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("bad.php"));
        touch(&dir.path().join("good.php"));

        let mut p = preloader([dir.path()]);
        p.load();

        assert_eq!(p.count(), 1);
        assert_eq!(p.list(), &[dir.path().join("good.php")]);
        assert_eq!(p.loader().calls.len(), 2);

        let failures: Vec<_> = p
            .diagnostics()
            .iter()
            .filter(|d| matches!(d, Diagnostic::LoadFailed { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(
            failures[0].to_string(),
            format!(
                "[Preloader] Failed to load `{}`: PHP Parse error: unexpected '}}'",
                dir.path().join("bad.php").display()
            )
        );
        assert_consistent(&p);
    }

    #[test]
    fn test_failed_file_can_be_retried_under_another_root() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("bad.php"));

        let mut p = preloader([dir.path(), dir.path()]);
        p.load();

        // Not recorded as loaded, so the second visit tries again.
        assert_eq!(p.loader().calls.len(), 2);
        assert_eq!(p.count(), 0);
        assert_consistent(&p);
    }

    #[test]
    fn test_missing_file_root_reports_load_failure() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("Gone.php");

        let mut p = preloader([missing.clone()]);
        p.load();

        assert_eq!(p.count(), 0);
        assert!(matches!(
            &p.diagnostics()[0],
            Diagnostic::LoadFailed { path, .. } if *path == missing
        ));
    }

    #[test]
    fn test_missing_directory_root_is_silent() {
        let mut p = preloader(["/nonexistent/preload/dir"]);
        p.load();

        assert_eq!(p.count(), 0);
        assert!(p.diagnostics().is_empty());
        assert!(p.loader().calls.is_empty());
    }

    #[test]
    fn test_trailing_slash_is_stripped() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/a.php"));

        let root = format!("{}/", dir.path().join("src").display());
        let mut p = preloader([root]);
        p.load();

        assert_eq!(p.list(), &[dir.path().join("src/a.php")]);
    }

    #[test]
    fn test_first_spelling_wins() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/Foo.php"));

        let plain = dir.path().join("src/Foo.php");
        let dotted = dir.path().join("src/./Foo.php");
        let mut p = preloader([plain.clone(), dotted.clone()]);
        p.load();

        assert_eq!(p.list(), &[plain]);
        assert_eq!(p.diagnostics(), &[Diagnostic::Skipped { path: dotted }]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_duplicate_is_skipped() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/Foo.php"));
        touch(&dir.path().join("src/Bar.txt"));
        std::os::unix::fs::symlink(
            dir.path().join("src/Foo.php"),
            dir.path().join("src/Baz.php"),
        )
        .unwrap();

        let mut p = preloader([dir.path().join("src")]);
        p.load();

        // Enumeration order decides which spelling is kept.
        assert_eq!(p.count(), 1);
        assert_eq!(p.diagnostics().len(), 1);
        assert!(matches!(p.diagnostics()[0], Diagnostic::Skipped { .. }));
        let kept = &p.list()[0];
        assert!(kept.ends_with("Foo.php") || kept.ends_with("Baz.php"));
        assert_consistent(&p);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlinks_go_through_the_gate() {
        use std::os::unix::fs::symlink;

        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("legacy")).unwrap();
        symlink(dir.path().join("gone.txt"), src.join("notes.txt")).unwrap();
        symlink(dir.path().join("gone.php"), src.join("legacy/Gone.php")).unwrap();
        symlink(dir.path().join("lost.php"), src.join("Lost.php")).unwrap();

        let mut p = preloader([src.clone()]).ignore([src.join("legacy")]);
        p.load();

        // Extension and ignore filters stay silent; the .php link reaches the loader.
        assert_eq!(p.loader().calls, vec![src.join("Lost.php")]);
        assert_eq!(p.count(), 0);
        assert_eq!(p.diagnostics().len(), 1);
        assert!(matches!(
            &p.diagnostics()[0],
            Diagnostic::LoadFailed { path, .. } if *path == src.join("Lost.php")
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_reported_and_siblings_load() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.php"));
        fs::create_dir(dir.path().join("sub")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("sub/back")).unwrap();

        let mut p = preloader([dir.path()]);
        p.load();

        assert_eq!(p.list(), &[dir.path().join("a.php")]);
        let walk_failures: Vec<_> = p
            .diagnostics()
            .iter()
            .filter(|d| matches!(d, Diagnostic::WalkFailed { .. }))
            .collect();
        assert_eq!(walk_failures.len(), 1);
        assert!(walk_failures[0].path().ends_with("sub/back"));
        assert_consistent(&p);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_does_not_stop_the_walk() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("locked/hidden.php"));
        touch(&dir.path().join("open/Visible.php"));
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still list the directory; nothing to check then.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let mut p = preloader([dir.path()]);
        p.load();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(p.list(), &[dir.path().join("open/Visible.php")]);
        let failure = p
            .diagnostics()
            .iter()
            .find(|d| matches!(d, Diagnostic::WalkFailed { .. }))
            .unwrap();
        assert_eq!(failure.path(), locked.as_path());
        match failure {
            Diagnostic::WalkFailed { message, .. } => {
                assert!(!message.contains(&*locked.to_string_lossy()));
            }
            _ => unreachable!(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_failure_under_ignore_prefix_is_silent() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.php"));
        fs::create_dir(dir.path().join("vendor")).unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("vendor/back")).unwrap();

        let mut p = preloader([dir.path()]).ignore([dir.path().join("vendor")]);
        p.load();

        assert_eq!(p.list(), &[dir.path().join("a.php")]);
        assert!(p.diagnostics().is_empty());
    }

    #[test]
    fn test_paths_chain_appends() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a/one.php"));
        touch(&dir.path().join("b/two.php"));

        let mut p = preloader([dir.path().join("a")]).paths([dir.path().join("b")]);
        p.load();

        assert_eq!(
            p.roots(),
            &[dir.path().join("a"), dir.path().join("b")]
        );
        assert_eq!(
            p.list(),
            &[dir.path().join("a/one.php"), dir.path().join("b/two.php")]
        );
    }

    #[test]
    fn test_class_map_roots_follow_explicit_paths() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("src/Explicit.php"));
        touch(&dir.path().join("lib/Mapped.php"));
        let map = dir.path().join("classmap.json");
        fs::write(
            &map,
            format!(
                r#"{{"Mapped": "{}"}}"#,
                dir.path().join("lib/Mapped.php").display()
            ),
        )
        .unwrap();

        let mut p = Preloader::with_options(
            RecordingLoader::default(),
            [dir.path().join("src")],
            PreloadOptions::default().class_map(&map),
        )
        .unwrap();
        p.load();

        assert_eq!(
            p.roots(),
            &[dir.path().join("src"), dir.path().join("lib/Mapped.php")]
        );
        assert_eq!(
            p.list(),
            &[
                dir.path().join("src/Explicit.php"),
                dir.path().join("lib/Mapped.php"),
            ]
        );
    }

    #[test]
    fn test_missing_class_map_is_empty() {
        let dir = TempDir::new().unwrap();

        let p = Preloader::with_options(
            RecordingLoader::default(),
            [dir.path()],
            PreloadOptions::default().class_map(dir.path().join("nope.php")),
        )
        .unwrap();

        assert_eq!(p.roots(), &[dir.path().to_path_buf()]);
        assert!(p.diagnostics().is_empty());
    }

    #[test]
    fn test_malformed_class_map_fails_construction() {
        let dir = TempDir::new().unwrap();
        let map = dir.path().join("classmap.json");
        fs::write(&map, "not json").unwrap();

        let result = Preloader::with_options(
            RecordingLoader::default(),
            [dir.path()],
            PreloadOptions::default().class_map(&map),
        );
        assert!(matches!(result, Err(PreloadError::ClassMap(_))));
    }

    #[test]
    fn test_sorted_load_order() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("c.php"));
        touch(&dir.path().join("a.php"));
        touch(&dir.path().join("b/inner.php"));

        let mut p = Preloader::with_options(
            RecordingLoader::default(),
            [dir.path()],
            PreloadOptions::default().no_class_map().sort_entries(true),
        )
        .unwrap();
        p.load();

        assert_eq!(
            p.list(),
            &[
                dir.path().join("a.php"),
                dir.path().join("b/inner.php"),
                dir.path().join("c.php"),
            ]
        );
    }

    #[test]
    fn test_report_snapshot() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("a.php"));
        touch(&dir.path().join("bad.php"));

        let mut p = preloader([dir.path()]);
        p.load();
        let report = p.report();

        assert_eq!(report.count, 1);
        assert_eq!(report.included, p.list());
        assert_eq!(report.failures().count(), 1);
    }
}
