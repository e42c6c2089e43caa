//! Temporary log files.
//!
//! Every `kiln build` gets its own log named `<prefix>-<tool>.<random>.log` under the host
//! temporary directory. The file is created with exclusive-create semantics, so two builds
//! racing on the same directory can never end up sharing a log, and it is never removed
//! afterwards.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

const RANDOM_LEN: usize = 6;
const SUFFIX: &str = ".log";

/// An open, write-only log file and its absolute path.
#[derive(Debug)]
pub struct LogFile {
    pub path: PathBuf,
    pub file: File,
}

impl LogFile {
    /// A second handle to the same file, for the router to write through.
    pub fn writer(&self) -> io::Result<File> {
        self.file.try_clone()
    }
}

/// Allocates unique log files in one directory.
#[derive(Debug, Clone)]
pub struct TemporaryLogChannel {
    dir: PathBuf,
    prefix: String,
}

impl TemporaryLogChannel {
    pub fn in_dir(dir: impl Into<PathBuf>, prefix: &str, tool: &str) -> Self {
        Self {
            dir: dir.into(),
            prefix: format!("{}-{}.", prefix, tool),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create and open a fresh log file.
    ///
    /// Name selection and opening happen in one step; on failure nothing is left behind.
    pub fn create(&self) -> io::Result<LogFile> {
        let dir = std::path::absolute(&self.dir)?;
        let named = tempfile::Builder::new()
            .prefix(&self.prefix)
            .suffix(SUFFIX)
            .rand_bytes(RANDOM_LEN)
            .tempfile_in(&dir)?;

        // Persist: the log outlives this process.
        let (file, path) = named.keep()?;
        tracing::debug!(path = %path.display(), "created log file");
        Ok(LogFile { path, file })
    }
}
