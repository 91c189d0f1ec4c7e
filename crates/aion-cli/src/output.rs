/// Pipe-safe stdout helpers for CLI output.
///
/// Rust's `println!` panics on broken pipe (EPIPE). This module provides
/// `write_stdout` which converts broken pipe errors into a clean process
/// exit, matching standard Unix tool behavior (`cat`, `head`, `grep`).
use std::io::{self, Write};

/// Reset SIGPIPE to default behavior on Unix.
///
/// Rust sets SIGPIPE to SIG_IGN by default, which causes write() to return
/// EPIPE instead of killing the process. Resetting to SIG_DFL restores
/// standard Unix pipe behavior: the process is terminated silently when
/// writing to a closed pipe.
///
/// This is the same approach used by ripgrep, fd, and other robust Rust CLIs.
pub fn reset_sigpipe() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// Write a string to stdout, exiting cleanly on broken pipe.
///
/// Returns `Ok(())` on success. On `BrokenPipe`, calls `std::process::exit(0)`
/// immediately — the consumer already got what it needed. Other IO errors
/// are propagated as `anyhow::Error`.
pub fn write_stdout(s: &str) -> anyhow::Result<()> {
    let result = (|| -> io::Result<()> {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(s.as_bytes())?;
        handle.write_all(b"\n")?;
        handle.flush()
    })();

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            std::process::exit(0);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to write to stdout: {e}")),
    }
}

/// Check whether an `anyhow::Error` chain contains a broken pipe IO error.
///
/// Used in the top-level error handler to exit cleanly if a broken pipe
/// propagated through `?` before being caught by `write_stdout`.
pub fn is_broken_pipe(err: &anyhow::Error) -> bool {
    for cause in err.chain() {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::BrokenPipe {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_broken_pipe_detects_broken_pipe() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let anyhow_err = anyhow::Error::new(io_err);
        assert!(is_broken_pipe(&anyhow_err));
    }

    #[test]
    fn test_is_broken_pipe_rejects_other_errors() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let anyhow_err = anyhow::Error::new(io_err);
        assert!(!is_broken_pipe(&anyhow_err));
    }

    #[test]
    fn test_is_broken_pipe_detects_nested_broken_pipe() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let anyhow_err: anyhow::Error = anyhow::anyhow!("write failed").context(io_err.to_string());
        // String context loses the type — only direct IO errors are detected
        assert!(!is_broken_pipe(&anyhow_err));

        // Direct wrapping preserves the type
        let io_err2 = io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed");
        let anyhow_err2 = anyhow::Error::new(io_err2).context("write failed");
        assert!(is_broken_pipe(&anyhow_err2));
    }

    #[test]
    fn test_write_stdout_succeeds_with_valid_output() {
        // write_stdout to actual stdout should work in test context
        // (stdout is connected to the test harness, not a broken pipe)
        assert!(write_stdout("hello").is_ok());
    }
}
