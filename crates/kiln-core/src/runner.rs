//! Bounded subprocess execution with line-streamed output
//!
//! Every external process the pipeline spawns, install commands and generated
//! code alike, goes through this runner: stdout and stderr are merged line by
//! line into a single transcript in arrival order, each line is forwarded to a
//! log sink as it appears, and the whole run is held under one wall-clock
//! deadline. On expiry the child is killed and reaped, and the output
//! collected so far is returned with the timeout error.

use crate::errors::ExecError;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

/// Receives process output lines as they arrive.
pub trait LogSink: Send + Sync {
    fn line(&self, line: &str);
}

/// Default sink that forwards lines to the `log` facade.
pub struct StdLogSink;

impl LogSink for StdLogSink {
    fn line(&self, line: &str) {
        log::info!("[exec] {}", line);
    }
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    pub exit_code: Option<i32>,
    pub output: String,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub struct ProcessRunner {
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs `program` with `args`, streaming merged stdout/stderr to `sink`
    /// and blocking until the child exits or the deadline passes.
    pub async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        sink: &dyn LogSink,
    ) -> Result<RunOutput, ExecError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| ExecError::SpawnFailed {
            program: program.to_string(),
            message: e.to_string(),
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }

        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut output = String::new();

        loop {
            tokio::select! {
                received = rx.recv() => match received {
                    Some(line) => {
                        sink.line(&line);
                        output.push_str(&line);
                        output.push('\n');
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => {
                    log::warn!("Process '{}' exceeded {}s deadline, killing", program, self.timeout.as_secs());
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return Err(ExecError::Timeout {
                        timeout_secs: self.timeout.as_secs(),
                        output,
                    });
                }
            }
        }

        // Pipes are closed; the child normally exits immediately after, but
        // the wait itself stays under the same deadline.
        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(ExecError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                    output,
                });
            }
        };

        Ok(RunOutput {
            exit_code: status.code(),
            output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CollectingSink {
        lines: Mutex<Vec<String>>,
    }

    impl CollectingSink {
        fn new() -> Self {
            Self {
                lines: Mutex::new(Vec::new()),
            }
        }
    }

    impl LogSink for CollectingSink {
        fn line(&self, line: &str) {
            self.lines.lock().unwrap().push(line.to_string());
        }
    }

    fn runner() -> ProcessRunner {
        let _ = env_logger::builder().is_test(true).try_init();
        ProcessRunner::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let sink = CollectingSink::new();
        let result = runner()
            .run("echo", &["hello".to_string()], None, &sink)
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(0));
        assert!(result.success());
        assert_eq!(result.output, "hello\n");
        assert_eq!(sink.lines.lock().unwrap().as_slice(), ["hello"]);
    }

    #[tokio::test]
    async fn test_run_merges_stderr() {
        let sink = CollectingSink::new();
        let result = runner()
            .run(
                "sh",
                &["-c".to_string(), "echo out; echo err >&2".to_string()],
                None,
                &sink,
            )
            .await
            .unwrap();

        assert!(result.output.contains("out"));
        assert!(result.output.contains("err"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let sink = StdLogSink;
        let result = runner()
            .run("sh", &["-c".to_string(), "exit 3".to_string()], None, &sink)
            .await
            .unwrap();

        assert_eq!(result.exit_code, Some(3));
        assert!(!result.success());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let sink = StdLogSink;
        let err = runner()
            .run("definitely-not-a-binary-kiln", &[], None, &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_child_and_keeps_output() {
        let sink = CollectingSink::new();
        let runner = ProcessRunner::new(Duration::from_millis(300));
        let err = runner
            .run(
                "sh",
                &["-c".to_string(), "echo started; sleep 30".to_string()],
                None,
                &sink,
            )
            .await
            .unwrap_err();

        match err {
            ExecError::Timeout { output, .. } => assert!(output.contains("started")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_respects_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CollectingSink::new();
        let result = runner()
            .run("pwd", &[], Some(dir.path()), &sink)
            .await
            .unwrap();

        let reported = result.output.trim();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(reported).canonicalize().unwrap(),
            expected
        );
    }
}
