//! Running external converters
//!
//! HEIF input is handed to a command-line tool. A program that is not
//! installed and a program that exits non-zero map to different error codes.

use crate::error::{Error, ErrorCode, Result};
use std::ffi::OsStr;
use std::io;
use std::process::{Command, Output, Stdio};

/// Captured output of a finished child process
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit status was zero
    pub success: bool,
    /// Exit code, -1 when killed by a signal
    pub exit_code: i32,
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
}

impl From<Output> for CommandResult {
    fn from(output: Output) -> Self {
        let text = |bytes: &[u8]| String::from_utf8_lossy(bytes).into_owned();
        Self {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: text(&output.stdout),
            stderr: text(&output.stderr),
        }
    }
}

impl CommandResult {
    /// What the program said, stderr first; converters report problems there
    pub fn diagnostics(&self) -> String {
        [self.stderr.trim(), self.stdout.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Fail with [`ErrorCode::CommandFailed`] unless the exit status was zero
    pub fn into_checked(self, program: &str) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let mut err = Error::new(
            ErrorCode::CommandFailed,
            format!("{program} exited with code {}", self.exit_code),
        );
        let said = self.diagnostics();
        if !said.is_empty() {
            err = err.with_context(said);
        }
        Err(err)
    }
}

/// Run `program` to completion with stdin closed, capturing its output.
///
/// Only a failure to start is an error here; check the exit status with
/// [`CommandResult::into_checked`].
pub fn run_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> Result<CommandResult> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map(CommandResult::from)
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::command_not_found(program),
            _ => Error::process(format!("could not start {program}: {e}")).with_source(e),
        })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout() {
        let result = run_command("echo", &["heic"]).unwrap();
        assert!(result.success);
        assert_eq!(result.stdout.trim(), "heic");
    }

    #[test]
    fn test_missing_program_is_command_not_found() {
        let err = run_command("heif-convert-does-not-exist", &["in.heic", "out.png"]).unwrap_err();
        assert_eq!(err.code, ErrorCode::CommandNotFound);
        assert!(err.suggestion.unwrap().contains("heif-convert-does-not-exist"));
    }

    #[test]
    fn test_nonzero_exit_keeps_stderr() {
        let result = run_command("sh", &["-c", "echo 'bad ftyp box' >&2; exit 3"]).unwrap();
        assert_eq!(result.exit_code, 3);

        let err = result.into_checked("sh").unwrap_err();
        assert_eq!(err.code, ErrorCode::CommandFailed);
        assert_eq!(err.message, "sh exited with code 3");
        assert_eq!(err.context.as_deref(), Some("bad ftyp box"));
    }

    #[test]
    fn test_silent_failure_has_no_context() {
        let err = run_command("false", &[] as &[&str]).unwrap().into_checked("false").unwrap_err();
        assert!(err.context.is_none());
    }

    #[test]
    fn test_diagnostics_order() {
        let result = CommandResult {
            success: false,
            exit_code: 1,
            stdout: "wrote 0 bytes\n".to_string(),
            stderr: "unsupported codec\n".to_string(),
        };
        assert_eq!(result.diagnostics(), "unsupported codec\nwrote 0 bytes");
    }
}
