//! External build tool invocation.
//!
//! A [`BuildTool`] starts a build and hands back two streams: the tool's raw stdout and a
//! completion signal. [`CommandBuildTool`] is the process-backed implementation that drives
//! `xcodebuild` (or any tool that takes the same arguments).

use super::error::BuildError;
use super::stream::{Completion, CompletionSender, OutputSender, OutputStream};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const CHUNK_SIZE: usize = 8 * 1024;
const REAP_TICK: Duration = Duration::from_millis(20);

/// A running build: ordered stdout chunks plus the terminal result.
#[derive(Debug)]
pub struct BuildInvocation {
    pub output: OutputStream,
    pub completion: Completion,
}

pub trait BuildTool {
    /// Short name, used in the log file name and the announcement.
    fn name(&self) -> &str;

    /// Start building `directory` with `configuration`, either one scheme or all of them.
    fn build_in_directory(
        &self,
        directory: &Path,
        configuration: &str,
        scheme: Option<&str>,
    ) -> Result<BuildInvocation, BuildError>;
}

/// Runs an external build program as a child process.
#[derive(Debug, Clone)]
pub struct CommandBuildTool {
    program: String,
    name: String,
}

impl CommandBuildTool {
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        let name = Path::new(&program)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| program.clone());
        Self { program, name }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self, directory: &Path, configuration: &str, scheme: Option<&str>) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(directory);
        cmd.arg("-configuration").arg(configuration);
        match scheme {
            Some(scheme) => cmd.arg("-scheme").arg(scheme),
            None => cmd.arg("-alltargets"),
        };
        cmd.arg("build");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl BuildTool for CommandBuildTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn build_in_directory(
        &self,
        directory: &Path,
        configuration: &str,
        scheme: Option<&str>,
    ) -> Result<BuildInvocation, BuildError> {
        let mut child = self
            .command(directory, configuration, scheme)
            .spawn()
            .map_err(|source| BuildError::Launch {
                program: self.program.clone(),
                source,
            })?;
        tracing::debug!(program = %self.program, pid = child.id(), "spawned build tool");

        let stdout = child.stdout.take().ok_or_else(|| BuildError::Launch {
            program: self.program.clone(),
            source: io::Error::other("stdout was not captured"),
        })?;

        let child = Arc::new(Mutex::new(child));
        let (chunks, output) = OutputStream::channel();
        let (done, completion) = Completion::channel();
        let label = match scheme {
            Some(scheme) => format!("scheme {}", scheme),
            None => "all schemes".to_string(),
        };

        {
            let child = Arc::clone(&child);
            thread::spawn(move || pump(stdout, &chunks, &child, &label, done));
        }

        // Disposal kills whatever is still running; reaping stays with the pump thread.
        let output = output.on_dispose(move || {
            if let Ok(mut child) = child.lock() {
                let _ = child.kill();
            }
        });

        Ok(BuildInvocation { output, completion })
    }
}

fn pump(
    mut stdout: ChildStdout,
    chunks: &OutputSender,
    child: &Mutex<Child>,
    label: &str,
    done: CompletionSender,
) {
    let mut buf = [0u8; CHUNK_SIZE];
    let mut read_error = None;
    loop {
        match stdout.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if !chunks.send(&buf[..n]) {
                    tracing::debug!("output unsubscribed, no longer forwarding");
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                read_error = Some(e);
                break;
            }
        }
    }
    drop(stdout);

    let status = loop {
        // Never hold the lock while blocked, so the dispose hook can still kill the child.
        let polled = match child.lock() {
            Ok(mut child) => child.try_wait(),
            Err(_) => Err(io::Error::other("build tool handle poisoned")),
        };
        match polled {
            Ok(Some(status)) => break Ok(status),
            Ok(None) => thread::sleep(REAP_TICK),
            Err(e) => break Err(e),
        }
    };

    match (status, read_error) {
        (Err(e), _) | (Ok(_), Some(e)) => done.fail(BuildError::Output(e)),
        (Ok(status), None) if status.success() => {
            tracing::debug!(label = %label, "build tool finished");
            done.succeed();
        }
        (Ok(status), None) => {
            done.fail(BuildError::Failed(format!("{} failed ({})", label, status)));
        }
    }
}
