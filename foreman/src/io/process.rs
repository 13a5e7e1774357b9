//! Child-process helper with timeout, cancellation, and bounded output.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, warn};
use wait_timeout::ChildExt;

/// How often the wait loop re-checks the cancel flag.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
    pub canceled: bool,
}

/// Optional per-line observer for child stdout (live streaming sink).
pub type LineSink<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Run a command with a timeout, capturing stdout/stderr without risking pipe
/// deadlocks. Output is read concurrently while the child runs;
/// `output_limit_bytes` bounds what is kept in memory (the pipes are still
/// drained past the limit). When `on_stdout_line` is set, each stdout line is
/// handed to it as it arrives; the full (bounded) stdout is still returned.
///
/// The wait loop polls `is_canceled` and kills the child when it fires, so a
/// cancellation takes effect without waiting out the timeout.
pub fn run_command(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
    is_canceled: &dyn Fn() -> bool,
    on_stdout_line: Option<LineSink<'_>>,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let mut timed_out = false;
    let mut canceled = false;

    let (status, (stdout, stdout_truncated), (stderr, stderr_truncated)) =
        thread::scope(|scope| -> Result<_> {
            let stdout_handle = scope
                .spawn(|| read_lines_limited(stdout, output_limit_bytes, on_stdout_line));
            let stderr_handle = scope.spawn(|| read_stream_limited(stderr, output_limit_bytes));

            let status = wait_with_cancel(
                &mut child,
                timeout,
                is_canceled,
                &mut timed_out,
                &mut canceled,
            )?;

            let stdout = stdout_handle
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))?
                .context("read stdout")?;
            let stderr = stderr_handle
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))?
                .context("read stderr")?;
            Ok((status, stdout, stderr))
        })?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, canceled, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
        canceled,
    })
}

fn wait_with_cancel(
    child: &mut Child,
    timeout: Duration,
    is_canceled: &dyn Fn() -> bool,
    timed_out: &mut bool,
    canceled: &mut bool,
) -> Result<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        if is_canceled() {
            warn!("cancellation requested, killing child");
            *canceled = true;
            child.kill().context("kill command")?;
            return child.wait().context("wait command after kill");
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            *timed_out = true;
            child.kill().context("kill command")?;
            return child.wait().context("wait command after kill");
        }
        let slice = remaining.min(CANCEL_POLL_INTERVAL);
        if let Some(status) = child.wait_timeout(slice).context("wait for command")? {
            return Ok(status);
        }
    }
}

/// Read a stream line-by-line with a size limit, handing each line to the
/// sink as it arrives.
fn read_lines_limited<R: Read>(
    reader: R,
    limit: usize,
    sink: Option<LineSink<'_>>,
) -> Result<(Vec<u8>, usize)> {
    let mut buf_reader = BufReader::new(reader);
    let mut collected = Vec::new();
    let mut truncated = 0usize;

    loop {
        let mut line = Vec::new();
        let n = buf_reader
            .read_until(b'\n', &mut line)
            .context("read line")?;
        if n == 0 {
            break;
        }
        if let Some(sink) = sink {
            let text = String::from_utf8_lossy(&line);
            sink(text.trim_end_matches('\n'));
        }
        let remaining = limit.saturating_sub(collected.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            collected.extend_from_slice(&line[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((collected, truncated))
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
