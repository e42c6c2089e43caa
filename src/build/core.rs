use super::error::{BuildError, Error, Result};
use super::log::{LogFile, TemporaryLogChannel};
use super::router::{BuildOutputRouter, Subscription};
use super::stream::Completion;
use super::tool::BuildTool;
use crate::config::{BuildOptions, KilnConfig, RawBuildOptions};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often the blocking wait looks at write faults and interrupts.
const WAIT_TICK: Duration = Duration::from_millis(50);

/// Cancellation flag shared with a signal handler.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Opens the writer that build output is routed into.
type OpenSink<'a> = Box<dyn Fn(&LogFile) -> io::Result<Box<dyn Write + Send>> + 'a>;

/// What ended the blocking wait.
#[derive(Debug)]
enum Wake {
    Completed(Result<(), BuildError>),
    Faulted,
    Interrupted,
}

/// Drives one `kiln build`: log file, build request, output routing, and the final wait.
pub struct BuildOrchestrator<'a> {
    tool: &'a dyn BuildTool,
    config: KilnConfig,
    channel: TemporaryLogChannel,
    directory: Option<PathBuf>,
    interrupt: Interrupt,
    progress: bool,
    sink: Option<OpenSink<'a>>,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(tool: &'a dyn BuildTool, config: KilnConfig) -> Self {
        let channel =
            TemporaryLogChannel::in_dir(config.log_dir(), config.log_prefix(), tool.name());
        Self {
            tool,
            config,
            channel,
            directory: None,
            interrupt: Interrupt::new(),
            progress: false,
            sink: None,
        }
    }

    /// Build this directory instead of the current one.
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = Some(dir.into());
        self
    }

    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Show a spinner on stderr while waiting.
    pub fn progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    /// Route output into a writer of our choosing instead of the log file itself.
    ///
    /// The log file is still created and announced; `open` receives it and returns the sink.
    pub fn log_sink(
        mut self,
        open: impl Fn(&LogFile) -> io::Result<Box<dyn Write + Send>> + 'a,
    ) -> Self {
        self.sink = Some(Box::new(open));
        self
    }

    fn open_sink(&self, log: &LogFile) -> io::Result<Box<dyn Write + Send>> {
        match &self.sink {
            Some(open) => open(log),
            None => Ok(Box::new(log.writer()?)),
        }
    }

    /// Run one build and block until it is done.
    ///
    /// The log location is announced on `out` once the build is under way. The subscription
    /// feeding the log is disposed exactly once on every path out of this function.
    pub fn run(&self, raw: &RawBuildOptions, out: &mut dyn Write) -> Result<()> {
        let options = BuildOptions::resolve(raw, &self.config);
        let directory = match &self.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().map_err(|source| Error::FileSystem {
                dir: PathBuf::from("."),
                source,
            })?,
        };

        let log = self.channel.create().map_err(|source| Error::FileSystem {
            dir: self.channel.dir().to_path_buf(),
            source,
        })?;
        let writer = self.open_sink(&log).map_err(|source| Error::FileSystem {
            dir: self.channel.dir().to_path_buf(),
            source,
        })?;

        tracing::debug!(
            directory = %directory.display(),
            configuration = %options.configuration,
            scheme = options.scheme.as_deref().unwrap_or("<all>"),
            "requesting build"
        );
        let invocation = self.tool.build_in_directory(
            &directory,
            &options.configuration,
            options.scheme.as_deref(),
        )?;

        let mut subscription = BuildOutputRouter::new(writer).route(invocation.output);

        if let Err(e) = writeln!(
            out,
            "{} output can be found in {}\n",
            self.tool.name(),
            log.path.display()
        ) {
            tracing::warn!(error = %e, "could not print log location");
        }

        let wake = self.wait(invocation.completion, &subscription);
        let routed = subscription.dispose();
        let result = settle(wake, routed, &log.path);
        match &result {
            Ok(()) => tracing::debug!("build succeeded"),
            Err(e) => tracing::debug!(error = %e, "build failed"),
        }
        result
    }

    /// Block until the build completes, the router faults, or we are interrupted.
    fn wait(&self, mut completion: Completion, subscription: &Subscription) -> Wake {
        let spinner = self.progress.then(|| spinner(self.tool.name()));

        let wake = loop {
            if self.interrupt.is_triggered() {
                break Wake::Interrupted;
            }
            match completion.wait_timeout(WAIT_TICK) {
                Ok(result) => break Wake::Completed(result),
                Err(pending) => completion = pending,
            }
            if subscription.has_faulted() {
                break Wake::Faulted;
            }
        };

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        wake
    }
}

fn spinner(tool: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("Running {}...", tool));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Reduce the wait outcome and the router's result to one result. The first failure wins.
fn settle(wake: Wake, routed: io::Result<()>, log_path: &Path) -> Result<()> {
    match (wake, routed) {
        (Wake::Completed(Err(e)), _) => Err(e.into()),
        (Wake::Interrupted, _) => Err(BuildError::Interrupted.into()),
        (_, Err(source)) => Err(Error::Write {
            path: log_path.to_path_buf(),
            source,
        }),
        (Wake::Faulted, Ok(())) => Err(Error::Write {
            path: log_path.to_path_buf(),
            source: io::Error::other("output router stopped"),
        }),
        (Wake::Completed(Ok(())), Ok(())) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broken() -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::StorageFull, "no space"))
    }

    #[test]
    fn test_interrupt_is_shared() {
        let interrupt = Interrupt::new();
        let clone = interrupt.clone();
        assert!(!interrupt.is_triggered());
        clone.trigger();
        assert!(interrupt.is_triggered());
    }

    #[test]
    fn test_settle_success() {
        assert!(settle(Wake::Completed(Ok(())), Ok(()), Path::new("x.log")).is_ok());
    }

    #[test]
    fn test_write_error_overrides_success() {
        let err = settle(Wake::Completed(Ok(())), broken(), Path::new("x.log")).unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }

    #[test]
    fn test_fault_reports_write_error() {
        let err = settle(Wake::Faulted, broken(), Path::new("x.log")).unwrap_err();
        match err {
            Error::Write { path, source } => {
                assert_eq!(path, Path::new("x.log"));
                assert_eq!(source.kind(), io::ErrorKind::StorageFull);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_build_error_comes_first() {
        let wake = Wake::Completed(Err(BuildError::Failed("SchemeX failed".into())));
        let err = settle(wake, broken(), Path::new("x.log")).unwrap_err();
        assert_eq!(err.to_string(), "SchemeX failed");
    }

    #[test]
    fn test_interrupted() {
        let err = settle(Wake::Interrupted, Ok(()), Path::new("x.log")).unwrap_err();
        assert!(matches!(err, Error::Build(BuildError::Interrupted)));
    }
}
