//! Summarization collaborator.
//!
//! Summaries come from an external bridge subprocess speaking a JSON-lines
//! request/response protocol on stdin/stdout. The bridge announces itself
//! with a `ready` message, then answers one `result` or `error` line per
//! `summarize` request. Summarization is best-effort: callers retry a
//! bounded number of times and fall back to the original text.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use bookdex_shared::{BookdexError, Result};

/// Boundary to whatever can shorten a paragraph.
pub trait Summarizer {
    /// Summarize `text` into roughly `min_words..=max_words` words.
    fn summarize(&self, text: &str, min_words: usize, max_words: usize) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Request message sent to the bridge.
#[derive(Debug, serde::Serialize)]
#[serde(tag = "type")]
enum RequestMessage<'a> {
    #[serde(rename = "summarize")]
    Summarize {
        id: u64,
        text: &'a str,
        min_words: usize,
        max_words: usize,
    },
    #[serde(rename = "shutdown")]
    Shutdown,
}

/// Response message received from the bridge.
#[derive(Debug, serde::Deserialize)]
#[serde(tag = "type")]
enum ResponseMessage {
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "result")]
    Result { id: u64, summary: String },
    #[serde(rename = "error")]
    Error {
        #[allow(dead_code)]
        id: u64,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Bridge summarizer
// ---------------------------------------------------------------------------

/// Running bridge subprocess with its pipe handles.
struct Bridge {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

/// Subprocess-backed [`Summarizer`].
///
/// The bridge is spawned lazily on the first request and reused for the
/// rest of the pipeline run; a shutdown message is sent when the summarizer
/// is dropped.
pub struct BridgeSummarizer {
    cmd: String,
    script: String,
    bridge: Mutex<Option<Bridge>>,
}

impl BridgeSummarizer {
    pub fn new(cmd: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            script: script.into(),
            bridge: Mutex::new(None),
        }
    }

    fn spawn(&self) -> Result<Bridge> {
        info!(cmd = %self.cmd, script = %self.script, "starting summarizer bridge");

        let mut command = Command::new(&self.cmd);
        if !self.script.is_empty() {
            command.arg(&self.script);
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BookdexError::Summarize(format!("bridge spawn: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BookdexError::Summarize("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BookdexError::Summarize("bridge stdout unavailable".into()))?;

        let mut bridge = Bridge {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 0,
        };

        // The bridge must announce readiness before taking requests.
        match read_response(&mut bridge)? {
            ResponseMessage::Ready => Ok(bridge),
            other => Err(BookdexError::Summarize(format!(
                "bridge sent {other:?} before ready"
            ))),
        }
    }
}

impl Summarizer for BridgeSummarizer {
    fn summarize(&self, text: &str, min_words: usize, max_words: usize) -> Result<String> {
        let mut guard = self
            .bridge
            .lock()
            .map_err(|_| BookdexError::Summarize("bridge lock poisoned".into()))?;

        if guard.is_none() {
            *guard = Some(self.spawn()?);
        }
        let bridge = guard.as_mut().expect("bridge just ensured");

        bridge.next_id += 1;
        let id = bridge.next_id;
        let request = RequestMessage::Summarize {
            id,
            text,
            min_words,
            max_words,
        };

        if let Err(e) = write_request(bridge, &request) {
            // A broken pipe means the bridge died; drop it so the next call
            // respawns instead of failing forever.
            *guard = None;
            return Err(e);
        }

        match read_response(bridge) {
            Ok(ResponseMessage::Result { id: got, summary }) if got == id => {
                debug!(id, chars = summary.len(), "summary received");
                Ok(summary)
            }
            Ok(ResponseMessage::Error { error, .. }) => {
                Err(BookdexError::Summarize(format!("bridge error: {error}")))
            }
            Ok(other) => Err(BookdexError::Summarize(format!(
                "bridge sent unexpected {other:?}"
            ))),
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }
}

impl Drop for BridgeSummarizer {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.bridge.lock() {
            if let Some(mut bridge) = guard.take() {
                let _ = write_request(&mut bridge, &RequestMessage::Shutdown);
                let _ = bridge.child.wait();
            }
        }
    }
}

fn write_request(bridge: &mut Bridge, request: &RequestMessage<'_>) -> Result<()> {
    let line = serde_json::to_string(request)
        .map_err(|e| BookdexError::Summarize(format!("request serialization: {e}")))?;
    bridge
        .stdin
        .write_all(line.as_bytes())
        .and_then(|()| bridge.stdin.write_all(b"\n"))
        .and_then(|()| bridge.stdin.flush())
        .map_err(|e| BookdexError::Summarize(format!("bridge write: {e}")))
}

fn read_response(bridge: &mut Bridge) -> Result<ResponseMessage> {
    let mut line = String::new();
    let n = bridge
        .stdout
        .read_line(&mut line)
        .map_err(|e| BookdexError::Summarize(format!("bridge read: {e}")))?;
    if n == 0 {
        return Err(BookdexError::Summarize("bridge closed its stdout".into()));
    }

    serde_json::from_str(line.trim()).map_err(|e| {
        BookdexError::Summarize(format!("bridge sent unparsable response: {e}"))
    })
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Bounded-retry wrapper: `retries` extra attempts, then `None`.
///
/// Failures are logged and swallowed — summarization is an enrichment, not
/// a requirement, and the caller falls back to the original text.
pub fn summarize_with_retry(
    summarizer: &dyn Summarizer,
    text: &str,
    min_words: usize,
    max_words: usize,
    retries: u32,
) -> Option<String> {
    for attempt in 0..=retries {
        match summarizer.summarize(text, min_words, max_words) {
            Ok(summary) => return Some(summary),
            Err(e) => {
                warn!(attempt, error = %e, "summarization attempt failed");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Summarizer that fails a fixed number of times before succeeding.
    struct Flaky {
        failures_left: AtomicUsize,
    }

    impl Summarizer for Flaky {
        fn summarize(&self, text: &str, _min: usize, max: usize) -> Result<String> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BookdexError::Summarize("transient".into()));
            }
            Ok(text.split_whitespace().take(max).collect::<Vec<_>>().join(" "))
        }
    }

    #[test]
    fn retry_recovers_from_transient_failure() {
        let flaky = Flaky {
            failures_left: AtomicUsize::new(1),
        };
        let summary = summarize_with_retry(&flaky, "one two three four", 1, 2, 1);
        assert_eq!(summary.as_deref(), Some("one two"));
    }

    #[test]
    fn retry_gives_up_after_budget() {
        let flaky = Flaky {
            failures_left: AtomicUsize::new(5),
        };
        let summary = summarize_with_retry(&flaky, "text", 1, 2, 1);
        assert_eq!(summary, None);
    }

    #[test]
    fn missing_bridge_command_errors() {
        let bridge = BridgeSummarizer::new("bookdex-no-such-command", "");
        let err = bridge.summarize("text", 10, 20).expect_err("must fail");
        assert!(matches!(err, BookdexError::Summarize(_)));
    }
}
