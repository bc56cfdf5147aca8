use std::ffi::OsStr;
use std::process::Command;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command line")]
    Empty,

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("{program} produced output that is not valid UTF-8")]
    Utf8 { program: String },
}

/// Runs an external command and returns its standard output
pub trait CommandExecutor {
    fn execute(&self, argv: &[&OsStr]) -> Result<String, ExecError>;
}

/// Blocking executor backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemExecutor {
    fn execute(&self, argv: &[&OsStr]) -> Result<String, ExecError> {
        let (program, args) = argv.split_first().ok_or(ExecError::Empty)?;
        let name = program.to_string_lossy().into_owned();
        trace!(program = %name, ?args, "running command");

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| ExecError::Spawn {
                program: name.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ExecError::Status {
                program: name,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ExecError::Utf8 { program: name })
    }
}
