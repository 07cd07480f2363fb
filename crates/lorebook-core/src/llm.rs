//! The language model seam. The store never calls a model itself; callers
//! build a `PromptRequest`, pass it to a `LanguageModel`, and save the answer.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use thiserror::Error;

use crate::prompt::PromptRequest;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Failed to start model command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Model command failed ({status}): {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Model output was not valid UTF-8")]
    Encoding,

    #[error("I/O error talking to model: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not encode request: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Fragments = Box<dyn Iterator<Item = Result<String, LlmError>> + Send>;

pub trait LanguageModel {
    /// Run the request to completion and return the whole answer.
    fn complete(&self, request: &PromptRequest) -> Result<String, LlmError>;

    /// Answer as a sequence of text fragments.
    fn stream(&self, request: &PromptRequest) -> Result<Fragments, LlmError> {
        let answer = self.complete(request)?;
        Ok(Box::new(std::iter::once(Ok(answer))))
    }
}

/// Normalise characters some models emit in streamed Chinese text.
pub fn clean_fragment(text: &str) -> String {
    text.chars()
        .filter(|&c| c != '\u{200b}')
        .map(|c| match c {
            '\u{ff0c}' => ',',
            '\u{a0}' | '\u{3000}' => ' ',
            other => other,
        })
        .collect()
}

/// A model behind a shell command: the request goes to stdin as JSON and
/// stdout is the answer, one fragment per line when streamed.
#[derive(Debug, Clone)]
pub struct CommandModel {
    command: String,
}

impl CommandModel {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    fn spawn(&self, request: &PromptRequest) -> Result<Running, LlmError> {
        let payload = serde_json::to_vec(request)?;

        let mut child = shell(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| LlmError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(&payload) {
                    tracing::debug!("Model command closed stdin early: {e}");
                }
            });
        }

        // stdout and stderr are read concurrently so neither pipe can fill up.
        let stderr = child.stderr.take().map(|mut err| {
            std::thread::spawn(move || {
                let mut raw = Vec::new();
                err.read_to_end(&mut raw).map(|_| raw)
            })
        });

        tracing::debug!("Started model command `{}`", self.command);
        Ok(Running { child, stderr })
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// A started model command whose stderr is being collected in the background.
struct Running {
    child: Child,
    stderr: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl Running {
    /// Wait for the command and turn a non-zero exit into `LlmError::Failed`.
    fn finish(mut self) -> Result<(), LlmError> {
        let status = self.child.wait()?;
        let stderr = match self.stderr.take().map(JoinHandle::join) {
            Some(Ok(read)) => read?,
            Some(Err(_)) => {
                return Err(LlmError::Io(std::io::Error::other(
                    "stderr reader panicked",
                )))
            }
            None => Vec::new(),
        };
        if !status.success() {
            return Err(LlmError::Failed {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    fn abort(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl LanguageModel for CommandModel {
    fn complete(&self, request: &PromptRequest) -> Result<String, LlmError> {
        let mut running = self.spawn(request)?;
        let mut raw = Vec::new();
        if let Some(mut out) = running.child.stdout.take() {
            out.read_to_end(&mut raw)?;
        }
        running.finish()?;
        let text = String::from_utf8(raw).map_err(|_| LlmError::Encoding)?;
        Ok(clean_fragment(text.trim_end()))
    }

    fn stream(&self, request: &PromptRequest) -> Result<Fragments, LlmError> {
        let mut running = self.spawn(request)?;
        let Some(stdout) = running.child.stdout.take() else {
            running.abort();
            return Err(LlmError::Io(std::io::Error::other(
                "model command has no stdout",
            )));
        };
        Ok(Box::new(CommandStream {
            running: Some(running),
            lines: BufReader::new(stdout),
        }))
    }
}

struct CommandStream {
    /// Taken once stdout is exhausted and the exit status checked.
    running: Option<Running>,
    lines: BufReader<ChildStdout>,
}

impl Iterator for CommandStream {
    type Item = Result<String, LlmError>;

    fn next(&mut self) -> Option<Self::Item> {
        let running = self.running.take()?;
        let mut line = String::new();
        match self.lines.read_line(&mut line) {
            Ok(0) => running.finish().err().map(Err),
            Ok(_) => {
                self.running = Some(running);
                let line = line.trim_end_matches(['\r', '\n']);
                Some(Ok(clean_fragment(line)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                running.abort();
                Some(Err(LlmError::Encoding))
            }
            Err(e) => {
                running.abort();
                Some(Err(e.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    impl LanguageModel for Canned {
        fn complete(&self, _request: &PromptRequest) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_clean_fragment() {
        assert_eq!(clean_fragment("江湖\u{200b}\u{ff0c}a\u{a0}b\u{3000}c"), "江湖,a b c");
    }

    #[test]
    fn test_default_stream_is_single_fragment() {
        let request = PromptRequest::build("ctx", "q");
        let fragments: Vec<String> = Canned("answer")
            .stream(&request)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(fragments, vec!["answer"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_model_reads_request_from_stdin() {
        // Echo back the role of the first message from the JSON on stdin.
        let model = CommandModel::new(
            "grep -o '\"role\":\"system\"' | head -n 1; printf 'line\\343\\200\\200two\\n'",
        );
        let request = PromptRequest::build("ctx", "q");
        let answer = model.complete(&request).unwrap();
        assert_eq!(answer, "\"role\":\"system\"\nline two");

        let fragments: Vec<String> = model
            .stream(&request)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(fragments, vec!["\"role\":\"system\"", "line two"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_command_model_drains_large_stderr() {
        use std::sync::mpsc;
        use std::time::Duration;

        // Far more than a pipe buffer holds.
        let noisy = "cat >/dev/null; head -c 200000 /dev/zero | tr '\\0' x >&2";
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let request = PromptRequest::build("ctx", "q");
            let ok = CommandModel::new(format!("{noisy}; echo answer"));
            let answer = ok.complete(&request);
            let streamed = ok
                .stream(&request)
                .and_then(|fragments| fragments.collect::<Result<Vec<String>, _>>());
            let failed = CommandModel::new(format!("{noisy}; exit 2")).complete(&request);
            let _ = tx.send((answer, streamed, failed));
        });

        let (answer, streamed, failed) = rx
            .recv_timeout(Duration::from_secs(30))
            .expect("model command did not finish");
        assert_eq!(answer.unwrap(), "answer");
        assert_eq!(streamed.unwrap(), vec!["answer"]);
        match failed {
            Err(LlmError::Failed { stderr, .. }) => assert_eq!(stderr.len(), 200_000),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_command_model_failure() {
        let model = CommandModel::new("cat >/dev/null; echo boom >&2; exit 3");
        let request = PromptRequest::build("ctx", "q");
        match model.complete(&request) {
            Err(LlmError::Failed { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("expected failure, got {other:?}"),
        }

        let results: Vec<_> = model.stream(&request).unwrap().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(LlmError::Failed { .. })));
    }
}
