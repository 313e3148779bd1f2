//! Child-process code runner with a wall-clock budget
//!
//! The code fragment is written to the interpreter's stdin, so it reaches the
//! child byte-for-byte: no shell is involved and nothing needs quoting.

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Semaphore;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::SandboxConfig;
use crate::metrics::{SANDBOX_DURATION, SANDBOX_EXECUTIONS};

/// Return code reported when the budget is exceeded
pub const TIMEOUT_RETURNCODE: i32 = -1;

/// Return code reported for launch failures and other runner faults
pub const FAULT_RETURNCODE: i32 = 1;

/// Observable effects of one sandboxed execution
///
/// `returncode` is the only success signal: 0 on success, -1 on timeout,
/// the interpreter's exit status otherwise (1 for runner faults).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
}

impl SandboxExecutionResult {
    /// Result for an execution that exceeded `budget`
    pub fn timeout(budget: Duration) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!(
                "TimeoutError: Code execution exceeded {} seconds.",
                format_budget(budget)
            ),
            returncode: TIMEOUT_RETURNCODE,
        }
    }

    /// Result for a fault outside the executed code (e.g., launch failure)
    pub fn fault(description: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: description.into(),
            returncode: FAULT_RETURNCODE,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.returncode == 0
    }

    pub fn timed_out(&self) -> bool {
        self.returncode == TIMEOUT_RETURNCODE
    }

    fn status_label(&self) -> &'static str {
        match self.returncode {
            0 => "success",
            TIMEOUT_RETURNCODE => "timeout",
            _ => "error",
        }
    }
}

/// Runs code fragments in isolated interpreter processes
#[derive(Debug)]
pub struct SandboxedCodeRunner {
    config: SandboxConfig,
    /// Concurrency ceiling, when configured
    permits: Option<Arc<Semaphore>>,
}

impl SandboxedCodeRunner {
    pub fn new(config: SandboxConfig) -> Self {
        let permits = config
            .max_concurrent
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        Self { config, permits }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Budget applied when the caller does not name one
    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout()
    }

    /// Execute `code` with the configured default budget
    pub async fn run_default(&self, code: &str) -> SandboxExecutionResult {
        self.run(code, self.default_timeout()).await
    }

    /// Execute `code`, waiting at most `timeout` for it to finish
    ///
    /// Never fails: timeouts and runner faults are reported through
    /// `returncode` and `stderr`. No process started by this call is left
    /// running when it returns.
    pub async fn run(&self, code: &str, timeout: Duration) -> SandboxExecutionResult {
        let span = info_span!(
            "sandbox_execution",
            interpreter = %self.config.interpreter,
            code_len = code.len(),
            timeout_secs = timeout.as_secs_f64(),
            otel.name = "sandbox_execution"
        );

        async {
            let _permit = match &self.permits {
                Some(permits) => match permits.clone().acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(e) => {
                        return SandboxExecutionResult::fault(format!("sandbox unavailable: {}", e))
                    }
                },
                None => None,
            };

            let start = Instant::now();
            let (result, status) = match self.execute(code, timeout).await {
                Ok(result) => {
                    let status = result.status_label();
                    (result, status)
                }
                Err(e) => {
                    warn!(error = %e, "Sandbox execution fault");
                    (SandboxExecutionResult::fault(e.to_string()), "fault")
                }
            };

            let elapsed = start.elapsed();
            SANDBOX_DURATION.observe(elapsed.as_secs_f64());
            SANDBOX_EXECUTIONS.with_label_values(&[status]).inc();
            info!(
                returncode = result.returncode,
                status,
                duration_ms = elapsed.as_secs_f64() * 1000.0,
                "Sandbox execution finished"
            );

            result
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, code: &str, timeout: Duration) -> std::io::Result<SandboxExecutionResult> {
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.args(&self.config.interpreter_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Leader of a fresh process group, so descendants can be signalled together
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("failed to launch `{}`: {}", self.config.interpreter, e),
            )
        })?;
        let pid = child.id();
        debug!(pid, "Sandbox child spawned");

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.config.max_output_bytes;

        // Completion means the leader exited and both pipes reached EOF. A
        // background process that inherits stdout or stderr therefore holds
        // the run open until the budget expires, and the run is reported as
        // a timeout with its partial output discarded.
        let waited = tokio::time::timeout(timeout, async {
            let (_, stdout, stderr, ()) = tokio::join!(
                feed_stdin(stdin, code),
                read_capped(stdout, limit),
                read_capped(stderr, limit),
                leader_exited(&mut child),
            );
            (stdout, stderr)
        })
        .await;

        // Whatever happened, nothing from this group outlives the call. The
        // leader is not reaped yet, so the group id cannot have been recycled.
        if let Some(pid) = pid {
            kill_process_group(pid);
        }

        match waited {
            Ok((stdout, stderr)) => {
                let status = child.wait().await?;
                let stdout = stdout?.into_text(limit);
                let mut stderr = stderr?.into_text(limit);

                let returncode = match status.code() {
                    Some(code) => code,
                    None => {
                        if !stderr.is_empty() {
                            stderr.push('\n');
                        }
                        stderr.push_str(&describe_termination(&status));
                        FAULT_RETURNCODE
                    }
                };

                Ok(SandboxExecutionResult {
                    stdout,
                    stderr,
                    returncode,
                })
            }
            Err(_) => {
                warn!(pid, timeout_secs = timeout.as_secs_f64(), "Sandbox execution timed out");
                // Group already got SIGKILL; this reaps the direct child
                if let Err(e) = child.kill().await {
                    debug!(pid, error = %e, "Reaping timed-out child failed");
                }
                Ok(SandboxExecutionResult::timeout(timeout))
            }
        }
    }
}

/// Bytes read from one output stream, up to the cap
#[derive(Debug, Default)]
struct CapturedOutput {
    bytes: Vec<u8>,
    truncated: bool,
}

impl CapturedOutput {
    fn into_text(self, limit: usize) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).trim().to_string();
        if self.truncated {
            text.push_str(&format!("\n... [output truncated at {} bytes]", limit));
        }
        text
    }
}

async fn feed_stdin(stdin: Option<ChildStdin>, code: &str) {
    let Some(mut stdin) = stdin else {
        return;
    };
    if let Err(e) = stdin.write_all(code.as_bytes()).await {
        // The interpreter may exit before reading everything
        if e.kind() != std::io::ErrorKind::BrokenPipe {
            debug!(error = %e, "Writing code to sandbox stdin failed");
        }
    }
    // Dropping stdin closes it; the interpreter starts once it sees EOF
}

/// Drain `pipe` to EOF, keeping at most `limit` bytes
async fn read_capped<R>(pipe: Option<R>, limit: usize) -> std::io::Result<CapturedOutput>
where
    R: AsyncRead + Unpin,
{
    let mut captured = CapturedOutput::default();
    let Some(mut pipe) = pipe else {
        return Ok(captured);
    };

    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.truncated = true;
        }
        captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
    }

    Ok(captured)
}

/// Resolve once the group leader has exited, leaving it unreaped
#[cfg(any(target_os = "linux", target_os = "android"))]
async fn leader_exited(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::wait::{waitid, Id, WaitPidFlag};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let pid = Pid::from_raw(pid as i32);

    let observed = tokio::task::spawn_blocking(move || loop {
        match waitid(Id::Pid(pid), WaitPidFlag::WEXITED | WaitPidFlag::WNOWAIT) {
            Err(Errno::EINTR) => continue,
            other => return other.map(|_| ()),
        }
    })
    .await;

    match observed {
        Ok(Ok(())) | Ok(Err(Errno::ECHILD)) => {}
        Ok(Err(e)) => {
            debug!(error = %e, "waitid failed; falling back to reaping the leader");
            let _ = child.wait().await;
        }
        Err(e) => {
            debug!(error = %e, "waitid task failed; falling back to reaping the leader");
            let _ = child.wait().await;
        }
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
async fn leader_exited(child: &mut Child) {
    let _ = child.wait().await;
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "Killed sandbox process group"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, error = %e, "Failed to kill sandbox process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

#[cfg(unix)]
fn describe_termination(status: &std::process::ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(signal) => format!("terminated by signal {}", signal),
        None => "terminated without an exit status".to_string(),
    }
}

#[cfg(not(unix))]
fn describe_termination(_status: &std::process::ExitStatus) -> String {
    "terminated without an exit status".to_string()
}

fn format_budget(budget: Duration) -> String {
    if budget.subsec_nanos() == 0 {
        budget.as_secs().to_string()
    } else {
        format!("{:.3}", budget.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_result_names_budget() {
        let result = SandboxExecutionResult::timeout(Duration::from_secs(5));
        assert_eq!(result.returncode, -1);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.contains("Timeout"));
        assert!(result.stderr.contains("5 seconds"));
        assert!(result.timed_out());
    }

    #[test]
    fn test_fractional_budget_formatting() {
        assert_eq!(format_budget(Duration::from_millis(1500)), "1.500");
        assert_eq!(format_budget(Duration::from_secs(60)), "60");
    }

    #[test]
    fn test_result_serializes_with_wire_field_names() {
        let result = SandboxExecutionResult {
            stdout: "hi".to_string(),
            stderr: String::new(),
            returncode: 0,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["stdout"], "hi");
        assert_eq!(value["stderr"], "");
        assert_eq!(value["returncode"], 0);
    }

    #[tokio::test]
    async fn test_read_capped_truncates_but_drains() {
        let data = vec![b'x'; 100];
        let captured = read_capped(Some(&data[..]), 10).await.unwrap();
        assert_eq!(captured.bytes.len(), 10);
        assert!(captured.truncated);

        let text = captured.into_text(10);
        assert!(text.starts_with("xxxxxxxxxx"));
        assert!(text.contains("[output truncated at 10 bytes]"));
    }

    #[tokio::test]
    async fn test_read_capped_trims_surrounding_whitespace() {
        let data = b"\n  hello world \n\n";
        let captured = read_capped(Some(&data[..]), 1024).await.unwrap();
        assert!(!captured.truncated);
        assert_eq!(captured.into_text(1024), "hello world");
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported_not_raised() {
        let runner = SandboxedCodeRunner::new(SandboxConfig {
            interpreter: "definitely-not-an-interpreter-3f9a".to_string(),
            ..SandboxConfig::default()
        });

        let result = runner.run("print(1)", Duration::from_secs(5)).await;
        assert_eq!(result.returncode, FAULT_RETURNCODE);
        assert!(result.stdout.is_empty());
        assert!(result.stderr.contains("failed to launch"));
    }
}
