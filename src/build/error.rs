use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by the external build tool.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The tool ran and reported failure for one or more schemes
    #[error("{0}")]
    Failed(String),

    #[error("failed to read build output: {0}")]
    Output(#[source] io::Error),

    #[error("build interrupted")]
    Interrupted,

    #[error("build tool exited without reporting a result")]
    Disconnected,
}

/// Terminal error of a `kiln build` invocation.
#[derive(Debug, Error)]
pub enum Error {
    /// The temporary log file could not be created. No build was attempted.
    #[error("could not create a log file in {}: {source}", dir.display())]
    FileSystem {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    /// A captured chunk could not be written to the log.
    #[error("could not write build output to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
