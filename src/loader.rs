//! File loading strategies.
//!
//! The preloader decides which files to load; a [`FileLoader`] decides
//! what loading means. Two loaders ship with the crate:
//!
//! - [`ReadLoader`] reads each file fully, warming the OS page cache.
//! - [`CommandLoader`] hands each file to an external interpreter
//!   (for example `php -l` or an opcache compile script).

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;

/// A fault raised while loading a single file.
///
/// The `Display` output is the message interpolated into
/// "failed to load" diagnostics.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{message} ({status})")]
    Command { status: ExitStatus, message: String },

    #[error("{0}")]
    Other(String),
}

impl LoadError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Capability to load one source file into the running process.
pub trait FileLoader {
    /// Load `path`. Any error is reported and the file is not counted.
    fn load(&mut self, path: &Path) -> Result<(), LoadError>;
}

impl<L: FileLoader + ?Sized> FileLoader for &mut L {
    fn load(&mut self, path: &Path) -> Result<(), LoadError> {
        (**self).load(path)
    }
}

impl<L: FileLoader + ?Sized> FileLoader for Box<L> {
    fn load(&mut self, path: &Path) -> Result<(), LoadError> {
        (**self).load(path)
    }
}

/// Reads each file into memory and discards it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadLoader {
    bytes_read: u64,
}

impl ReadLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes read so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl FileLoader for ReadLoader {
    fn load(&mut self, path: &Path) -> Result<(), LoadError> {
        let content = std::fs::read(path).map_err(|e| LoadError::io(path, e))?;
        self.bytes_read += content.len() as u64;
        Ok(())
    }
}

/// Runs an external command with the file path appended as the last argument.
///
/// A non-zero exit status is a load fault; its message is the trimmed
/// stderr, or stdout when stderr is empty.
#[derive(Debug, Clone)]
pub struct CommandLoader {
    program: String,
    args: Vec<String>,
}

impl CommandLoader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from an argv-style list. Returns `None` when `argv` is empty.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut iter = argv.into_iter().map(Into::into);
        let program = iter.next()?;
        Some(Self {
            program,
            args: iter.collect(),
        })
    }

    /// Parse a whitespace-separated command line such as `"php -l"`.
    ///
    /// Rejects blank input.
    pub fn parse(command: &str) -> Result<Self, String> {
        Self::from_argv(command.split_whitespace())
            .ok_or_else(|| "command must not be empty".to_string())
    }

    /// Append a fixed argument placed before the file path.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl FileLoader for CommandLoader {
    fn load(&mut self, path: &Path) -> Result<(), LoadError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .map_err(|e| LoadError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if stderr.trim().is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr.trim().to_string()
        };

        Err(LoadError::Command {
            status: output.status,
            message,
        })
    }
}

/// Accepts every file without touching it. Used for dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLoader;

impl FileLoader for NoopLoader {
    fn load(&mut self, _path: &Path) -> Result<(), LoadError> {
        Ok(())
    }
}
