//! Exit codes for the `hdfs-sink` binary.

use crate::commands::CommandError;

/// Exit code constants.
pub mod codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Invalid arguments.
    pub const INVALID_ARGS: i32 = 1;
    /// Input could not be read.
    pub const IO_ERROR: i32 = 2;
    /// Configuration could not be loaded or is invalid.
    pub const CONFIG_ERROR: i32 = 3;
    /// The transport could not start.
    pub const TRANSPORT_ERROR: i32 = 4;
    /// Input was read to the end but some records were not written.
    pub const SEND_FAILURES: i32 = 5;
}

/// Map a CommandError to an exit code.
pub fn exit_code(error: &CommandError) -> i32 {
    match error {
        CommandError::InvalidArgument(_) => codes::INVALID_ARGS,
        CommandError::Config(_) => codes::CONFIG_ERROR,
        CommandError::OpenInput { .. } | CommandError::Read(_) => codes::IO_ERROR,
        CommandError::Client(_) | CommandError::Transport(_) => codes::TRANSPORT_ERROR,
    }
}
