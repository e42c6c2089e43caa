//! `kiln build` handler.
//!
//! Loads `kiln.toml`, wires Ctrl-C into the build's interrupt flag, runs the orchestrator and
//! turns its result into terminal output. A non-zero exit status comes from returning the
//! error to `main`.

use anyhow::{Context, Result};
use colored::*;
use std::io;

use crate::build::{BuildError, BuildOrchestrator, CommandBuildTool, Error, Interrupt};
use crate::config::{RawBuildOptions, load_config};

pub fn handle_build(configuration: Option<String>, scheme: Option<String>) -> Result<()> {
    let current_dir = std::env::current_dir().context("Failed to read current directory")?;
    let config = load_config(&current_dir)?;
    let tool = CommandBuildTool::new(config.tool());

    let interrupt = Interrupt::new();
    {
        let interrupt = interrupt.clone();
        if let Err(e) = ctrlc::set_handler(move || interrupt.trigger()) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    let raw = RawBuildOptions {
        configuration: configuration.unwrap_or_default(),
        scheme: scheme.unwrap_or_default(),
    };
    let orchestrator = BuildOrchestrator::new(&tool, config)
        .directory(&current_dir)
        .interrupt(interrupt)
        .progress(console::Term::stderr().is_term());

    let mut stdout = io::stdout();
    match orchestrator.run(&raw, &mut stdout) {
        Ok(()) => {
            println!("{} Build succeeded", "✓".green());
            Ok(())
        }
        Err(e) => {
            println!("{}", hint(&e, tool.program()));
            Err(anyhow::Error::new(e).context("Build failed"))
        }
    }
}

fn hint(err: &Error, program: &str) -> String {
    match err {
        Error::Build(BuildError::Launch { .. }) => format!(
            "{} Could not run {}.\n   Install it, or set {} in {}.",
            "x".red(),
            program.bold(),
            "[build] tool".yellow(),
            "kiln.toml".yellow()
        ),
        Error::Build(BuildError::Interrupted) => {
            format!("{} Build interrupted by user.", "!".yellow())
        }
        Error::FileSystem { .. } => format!(
            "{} Could not create a log file. Check {} in {}.",
            "x".red(),
            "[log] dir".yellow(),
            "kiln.toml".yellow()
        ),
        Error::Write { path, .. } => format!(
            "{} Could not write build output to {}, so the log is incomplete.\n   Check free disk space and permissions for {} in {}.",
            "x".red(),
            path.display(),
            "[log] dir".yellow(),
            "kiln.toml".yellow()
        ),
        Error::Build(_) => format!("{} See the log above for the full build output.", "x".red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn plain(err: &Error) -> String {
        colored::control::set_override(false);
        hint(err, "xcodebuild")
    }

    #[test]
    fn test_write_failure_points_at_log_dir() {
        let err = Error::Write {
            path: PathBuf::from("/tmp/kiln-xcodebuild.abc123.log"),
            source: io::Error::new(io::ErrorKind::StorageFull, "no space left"),
        };
        let text = plain(&err);
        assert!(text.contains("/tmp/kiln-xcodebuild.abc123.log"), "{}", text);
        assert!(text.contains("disk space"), "{}", text);
        assert!(text.contains("[log] dir"), "{}", text);
        assert!(!text.contains("See the log above"), "{}", text);
    }

    #[test]
    fn test_build_failure_points_at_log() {
        let err = Error::Build(BuildError::Failed("scheme SchemeX failed".into()));
        assert!(plain(&err).contains("See the log above"));
    }

    #[test]
    fn test_launch_failure_names_program() {
        let err = Error::Build(BuildError::Launch {
            program: "xcodebuild".into(),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        });
        let text = plain(&err);
        assert!(text.contains("Could not run xcodebuild"), "{}", text);
        assert!(text.contains("[build] tool"), "{}", text);
    }
}
