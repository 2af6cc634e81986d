use std::fmt;

use crate::error::{Error, Result};

/// Lifecycle of a capture session
///
/// ```text
/// Configured --start--> Streaming --stop--> Stopped --start--> Streaming
///     ^                                        |
///     +-------------release_buffers------------+
/// ```
///
/// `Closed` is terminal and reached through `close()` or by dropping the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Configured,
    Streaming,
    Stopped,
}

/// Public session calls that are gated by the current [`State`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    NegotiateFormat,
    SetFrameInterval,
    AllocateBuffers,
    ReleaseBuffers,
    Start,
    Stop,
    GetFrame,
}

impl State {
    /// Whether `op` may be issued in this state
    pub fn permits(self, op: Operation) -> bool {
        use Operation::*;
        use State::*;

        matches!(
            (self, op),
            (Configured, NegotiateFormat)
                | (Configured, SetFrameInterval)
                | (Configured, AllocateBuffers)
                | (Configured, ReleaseBuffers)
                | (Configured, Start)
                | (Stopped, SetFrameInterval)
                | (Stopped, ReleaseBuffers)
                | (Stopped, Start)
                | (Streaming, Stop)
                | (Streaming, GetFrame)
        )
    }

    pub(crate) fn check(self, op: Operation) -> Result<()> {
        if self.permits(op) {
            Ok(())
        } else {
            Err(Error::InvalidStateTransition {
                operation: op,
                state: self,
            })
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Closed => "closed",
            State::Configured => "configured",
            State::Streaming => "streaming",
            State::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::NegotiateFormat => "negotiate format",
            Operation::SetFrameInterval => "set frame interval",
            Operation::AllocateBuffers => "allocate buffers",
            Operation::ReleaseBuffers => "release buffers",
            Operation::Start => "start streaming",
            Operation::Stop => "stop streaming",
            Operation::GetFrame => "get frame",
        };
        f.write_str(name)
    }
}
