mod core;
mod error;
mod log;
mod router;
mod stream;
mod tool;

pub use self::core::{BuildOrchestrator, Interrupt};
pub use error::{BuildError, Error, Result};
pub use log::{LogFile, TemporaryLogChannel};
pub use router::{BuildOutputRouter, Subscription};
pub use stream::{Completion, CompletionSender, OutputChunk, OutputSender, OutputStream};
pub use tool::{BuildInvocation, BuildTool, CommandBuildTool};
