//! Preload - warm up an interpreter's source cache at process start.
//!
//! Preload walks a set of root paths, keeps files with the recognized
//! source extension, drops anything under an ignore prefix, and hands each
//! remaining file to a [`FileLoader`] exactly once. It records how many
//! files were loaded and which paths were included.
//!
//! # Quick Start
//!
//! ```no_run
//! use preload::{Preloader, ReadLoader};
//!
//! // Roots plus everything in vendor/composer/autoload_classmap.php
//! let mut preloader = Preloader::new(ReadLoader::new(), ["src", "app"])
//!     .unwrap()
//!     .ignore(["src/Legacy"]);
//!
//! preloader.load();
//!
//! println!("Preloaded {} files", preloader.count());
//! for path in preloader.list() {
//!     println!("  {}", path.display());
//! }
//! ```
//!
//! # Modules
//!
//! - [`preloader`] - Path registry, load gate, and stats
//! - [`walker`] - Depth-first directory expansion
//! - [`filter`] - Extension and ignore-prefix filters
//! - [`loader`] - Loading strategies behind the [`FileLoader`] trait
//! - [`classmap`] - Composer / JSON class map discovery
//! - [`report`] - Diagnostics and report rendering

pub mod classmap;
pub mod errors;
pub mod filter;
pub mod loader;
pub mod preloader;
pub mod report;
pub mod walker;

// Re-export key types at crate root for convenience
pub use classmap::{ClassMap, ClassMapError};
pub use errors::PreloadError;
pub use loader::{CommandLoader, FileLoader, LoadError, NoopLoader, ReadLoader};
pub use preloader::{PreloadOptions, Preloader};
pub use report::{format_report, Diagnostic, OutputFormat, PreloadReport};
pub use walker::{WalkEvent, WalkOptions};
