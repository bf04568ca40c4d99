//! Worker process stream handling.
//!
//! A worker is a long-lived child process speaking a line protocol: plain
//! text commands on stdin, one JSON event per line on stdout, free-form
//! diagnostics on stderr. Each attachment owns reader, writer, stderr and
//! exit-monitor tasks sharing one cancellation token.
//!
//! Submodules:
//! - `codec`: [`LineFramer`](codec::LineFramer) and the `tokio_util` codec built on it.
//! - `protocol`: inbound [`WorkerEvent`](protocol::WorkerEvent) decoding and
//!   outbound [`WorkerCommand`](protocol::WorkerCommand) encoding.
//! - `reader`: stdout and stderr read tasks.
//! - `writer`: stdin write task.
//! - `spawner`: process launch and exit monitoring.

pub mod codec;
pub mod protocol;
pub mod reader;
pub mod spawner;
pub mod writer;

use protocol::WorkerEvent;

/// Events delivered from worker tasks to the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// A decoded stdout message.
    Worker(WorkerEvent),
    /// The worker process terminated.
    WorkerExited {
        /// Process exit code; `None` when killed by a signal or unknown.
        code: Option<i32>,
        /// Human-readable description of the exit.
        reason: String,
    },
}

impl BridgeEvent {
    /// Whether this is an exit that should be reported to the user.
    #[must_use]
    pub fn is_abnormal_exit(&self) -> bool {
        matches!(self, Self::WorkerExited { code, .. } if *code != Some(0))
    }
}
