//! Host-side error types.

use std::fmt;

use thiserror::Error;

/// Structured record of a script-level error that escaped a dispatched task.
///
/// `message` is always present; the location fields are filled in when the
/// engine can attribute the throw to a script position.
#[derive(Debug, Clone, Default)]
pub struct ScriptError {
    pub message: String,
    /// Text of the offending source line.
    pub source_line: Option<String>,
    /// Resource name (URL) of the script the error originated in.
    pub resource_name: Option<String>,
    /// 1-based line number.
    pub line: Option<u32>,
    /// 0-based column of the start of the offending range.
    pub column: Option<u32>,
    /// Length of the offending range, in characters.
    pub length: Option<u32>,
    /// Engine-formatted stack trace.
    pub stack: Option<String>,
}

impl ScriptError {
    /// A message-only error, used for host-level failures that did not
    /// originate in the engine.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        if let (Some(name), Some(line)) = (&self.resource_name, self.line) {
            write!(f, " ({name}:{line}")?;
            if let Some(column) = self.column {
                write!(f, ":{column}")?;
            }
            f.write_str(")")?;
        }
        if let Some(stack) = &self.stack {
            write!(f, "\n{stack}")?;
        }
        Ok(())
    }
}

/// Failures of the host itself, as opposed to script-level errors.
#[derive(Debug, Error)]
pub enum HostError {
    /// The execution thread has shut down and no longer accepts work.
    #[error("the execution thread is no longer accepting work")]
    QueueClosed,
}
