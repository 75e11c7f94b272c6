//! External command execution
//!
//! FreeIPMI tools are launched as child processes. A non-zero exit status
//! is reported with the captured stderr. Children are spawned with
//! `kill_on_drop`, so a caller that stops awaiting (deadline expiry) also
//! stops the process instead of leaving it orphaned.

use futures::future::BoxFuture;
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Runs an executable and returns its stdout
pub trait CommandRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<u8>, CommandError>>;
}

/// Spawns real child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run<'a>(
        &'a self,
        program: &'a str,
        args: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<u8>, CommandError>> {
        Box::pin(async move {
            // arguments carry credentials, only the program name is logged
            debug!(program, "executing command");
            let output = AsyncCommand::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| CommandError::Launch {
                    program: program.to_string(),
                    source,
                })?;

            if output.status.success() {
                Ok(output.stdout)
            } else {
                Err(CommandError::Failed {
                    program: program.to_string(),
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        })
    }
}

#[cfg(test)]
mod mock {
    use super::*;
    use ipmi_devkit::MockRunner;

    impl CommandRunner for MockRunner {
        fn run<'a>(
            &'a self,
            program: &'a str,
            args: &'a [String],
        ) -> BoxFuture<'a, Result<Vec<u8>, CommandError>> {
            Box::pin(async move {
                self.respond(program, args)
                    .await
                    .map_err(|stderr| CommandError::Failed {
                        program: program.to_string(),
                        status: "exit status: 1".to_string(),
                        stderr,
                    })
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stdout_is_returned() {
        let out = ProcessRunner
            .run("echo", &["Hello World".to_string()])
            .await
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&out).trim(), "Hello World");
    }

    #[tokio::test]
    async fn test_non_zero_exit_carries_stderr() {
        let args = vec!["-c".to_string(), "echo boom >&2; exit 3".to_string()];
        let err = ProcessRunner.run("sh", &args).await.unwrap_err();
        match err {
            CommandError::Failed { program, stderr, .. } => {
                assert_eq!(program, "sh");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_is_launch_error() {
        let err = ProcessRunner
            .run("ipmi-exporter-no-such-binary", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Launch { .. }));
    }

    #[tokio::test]
    async fn test_dropped_future_does_not_block() {
        let args = vec!["5".to_string()];
        let started = std::time::Instant::now();
        let res = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            ProcessRunner.run("sleep", &args),
        )
        .await;
        assert!(res.is_err());
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }
}
