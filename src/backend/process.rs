//! Subprocess plumbing shared by the CLI backends

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// Upper bound for a `--version` style probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `binary args...` and report whether it exited successfully
pub(crate) async fn probe_binary(binary: &Path, args: &[&str]) -> bool {
    let status = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(PROBE_TIMEOUT, status).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            tracing::debug!(binary = %binary.display(), error = %e, "probe failed to run");
            false
        }
        Err(_) => {
            tracing::debug!(binary = %binary.display(), "probe timed out");
            false
        }
    }
}

/// Terminate a child, escalating to a kill after `grace`
pub(crate) async fn stop_child(child: &mut Child, grace: Duration) {
    let signalled = child.id().is_some_and(crate::utils::terminate_process);

    if signalled {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(?status, "subprocess exited after terminate");
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed waiting for terminated subprocess");
            }
            Err(_) => {
                tracing::warn!(grace_ms = grace.as_millis() as u64, "subprocess ignored terminate, killing");
            }
        }
    }

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "kill failed, subprocess likely already gone");
    }
}

/// Line reader that treats `\r` as a line break
///
/// Console progress readouts redraw in place with carriage returns, so a
/// newline-only reader would see nothing until the transfer ends.
pub(crate) struct ConsoleLines<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
}

impl<R: AsyncRead + Unpin> ConsoleLines<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            pending: Vec::new(),
        }
    }

    /// Next non-empty line, or `None` at end of stream
    ///
    /// Partial input is kept in `self`, so dropping the future between
    /// reads loses nothing.
    pub(crate) async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_pending()));
            }

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(pos) => {
                    self.pending.extend_from_slice(&available[..pos]);
                    self.inner.consume(pos + 1);
                    if !self.pending.is_empty() {
                        return Ok(Some(self.take_pending()));
                    }
                }
                None => {
                    let len = available.len();
                    self.pending.extend_from_slice(available);
                    self.inner.consume(len);
                }
            }
        }
    }

    fn take_pending(&mut self) -> String {
        String::from_utf8_lossy(&std::mem::take(&mut self.pending)).into_owned()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_on_carriage_returns_and_newlines() {
        let input: &[u8] = b"first\r\nsecond\rthird\n\n\rlast";
        let mut lines = ConsoleLines::new(input);

        let mut seen = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            seen.push(line);
        }
        assert_eq!(seen, vec!["first", "second", "third", "last"]);
    }

    #[tokio::test]
    async fn empty_stream_ends_immediately() {
        let mut lines = ConsoleLines::new(&b""[..]);
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn probe_of_missing_binary_is_false() {
        let missing = Path::new("/nonexistent/model-dl-probe-binary");
        assert!(!probe_binary(missing, &["--version"]).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_child_ends_sleeping_process() {
        let mut child = Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        stop_child(&mut child, Duration::from_secs(2)).await;
        let status = child.try_wait().unwrap();
        assert!(status.is_some(), "child should have exited");
    }
}
