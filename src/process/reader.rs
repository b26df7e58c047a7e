// src/process/reader.rs

//! The per-process output reader task.
//!
//! Exactly one reader runs per started [`ProcessHandle`](super::ProcessHandle).
//! It drains stdout and stderr concurrently into a single ordered channel,
//! whether or not anybody is consuming lines, so the child never stalls on a
//! full pipe buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::sink::LineSink;

/// Line-oriented reader that tolerates non-UTF-8 output.
///
/// The partial line is kept in `buf` between calls, so `next()` can be used
/// as a `select!` branch and re-polled after losing a race.
struct LineStream<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineStream<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next complete line, `None` at EOF or on a read error.
    async fn next(&mut self) -> Option<String> {
        match self.reader.read_until(b'\n', &mut self.buf).await {
            Ok(0) if self.buf.is_empty() => None,
            Ok(_) => {
                let line = decode_line(&self.buf);
                self.buf.clear();
                Some(line)
            }
            Err(e) => {
                debug!(error = %e, "output pipe read failed; treating as EOF");
                None
            }
        }
    }
}

fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    while end > 0 && (raw[end - 1] == b'\n' || raw[end - 1] == b'\r') {
        end -= 1;
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Where the reader sends what it reads.
pub(crate) struct ReaderOutput {
    pub label: String,
    pub lines: mpsc::UnboundedSender<String>,
    pub shutdown: Arc<AtomicBool>,
    /// Tee target; `Some` when echo is enabled.
    pub echo: Option<Arc<dyn LineSink>>,
}

async fn next_from<R: AsyncRead + Unpin>(stream: &mut Option<LineStream<R>>) -> Option<String> {
    match stream {
        Some(s) => s.next().await,
        None => None,
    }
}

/// Drain both pipes until they are closed or the shutdown flag is raised.
pub(crate) async fn read_merged(
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    out: ReaderOutput,
) {
    let mut stdout = stdout.map(LineStream::new);
    let mut stderr = stderr.map(LineStream::new);
    let mut forwarded: u64 = 0;

    while stdout.is_some() || stderr.is_some() {
        let line = tokio::select! {
            line = next_from(&mut stdout), if stdout.is_some() => {
                if line.is_none() {
                    stdout = None;
                }
                line
            }
            line = next_from(&mut stderr), if stderr.is_some() => {
                if line.is_none() {
                    stderr = None;
                }
                line
            }
        };

        let Some(line) = line else { continue };

        if out.shutdown.load(Ordering::SeqCst) {
            debug!(label = %out.label, "shutdown flag set; reader stops forwarding");
            break;
        }

        trace!(label = %out.label, "output: {}", line);
        if let Some(sink) = &out.echo {
            sink.write_line(&out.label, &line);
        }
        forwarded += 1;

        if out.lines.send(line).is_err() {
            // Handle dropped; nothing left to forward to.
            break;
        }
    }

    debug!(label = %out.label, forwarded, "output reader finished");
}
