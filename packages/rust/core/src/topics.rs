//! Topic-model bridge.
//!
//! Embedding and clustering run in an external process (see
//! `packages/py/topic-bridge/bridge.py`) that speaks a JSON-lines protocol on
//! stdin/stdout. Stage 2 only depends on the [`TopicModel`] trait, so tests
//! substitute an in-process fake.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use reviewtopics_shared::{Result, ReviewTopicsError, TopicId, TopicsConfig};

// ---------------------------------------------------------------------------
// TopicModel trait
// ---------------------------------------------------------------------------

/// Parameters for one fit, forwarded verbatim to the model process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicParams {
    /// Sentence-embedding model name.
    pub embedding_model: String,
    /// HDBSCAN `min_samples`.
    pub min_samples: u32,
    /// HDBSCAN `min_cluster_size`.
    pub min_cluster_size: u32,
    pub calculate_probabilities: bool,
    /// Document language hint.
    pub language: String,
}

impl TopicParams {
    pub fn from_config(topics: &TopicsConfig, language: &str) -> Self {
        Self {
            embedding_model: topics.embedding_model.clone(),
            min_samples: topics.min_samples,
            min_cluster_size: topics.min_cluster_size,
            calculate_probabilities: topics.calculate_probabilities,
            language: language.to_string(),
        }
    }
}

/// A fit-and-assign topic model.
pub trait TopicModel {
    /// Fit on `documents` and return one topic per document, in order.
    fn fit_transform(&mut self, documents: &[String], params: &TopicParams)
    -> Result<Vec<TopicId>>;

    /// Persist the fitted model at `path`. Returns where it was written.
    fn save(&mut self, path: &Path, serialization: &str) -> Result<PathBuf>;
}

// ---------------------------------------------------------------------------
// Protocol types
// ---------------------------------------------------------------------------

/// Request message sent to the bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RequestMessage<'a> {
    FitTransform {
        id: String,
        documents: &'a [String],
        params: &'a TopicParams,
    },
    Save {
        id: String,
        path: String,
        serialization: &'a str,
    },
    Shutdown,
}

/// Response message received from the bridge.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseMessage {
    Ready,
    Topics {
        id: String,
        topics: Vec<TopicId>,
    },
    Saved {
        id: String,
        path: String,
    },
    Error {
        #[serde(default)]
        #[allow(dead_code)]
        id: Option<String>,
        error: String,
    },
}

// ---------------------------------------------------------------------------
// Bridge process
// ---------------------------------------------------------------------------

/// How to launch the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interpreter or executable (e.g. `python3`).
    pub bridge_cmd: String,
    /// Script passed as the first argument.
    pub bridge_script: String,
    /// Working directory for the process; inherits ours when `None`.
    pub working_dir: Option<PathBuf>,
}

impl BridgeConfig {
    pub fn from_config(topics: &TopicsConfig) -> Self {
        Self {
            bridge_cmd: topics.bridge_cmd.clone(),
            bridge_script: topics.bridge_script.clone(),
            working_dir: None,
        }
    }
}

/// [`TopicModel`] backed by the bridge subprocess.
///
/// The process is stopped by [`BridgeTopicModel::shutdown`], or killed on drop.
pub struct BridgeTopicModel {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    request_counter: u64,
    closed: bool,
}

impl BridgeTopicModel {
    /// Spawn the bridge and wait for its `ready` line.
    #[instrument(skip_all, fields(cmd = %config.bridge_cmd, script = %config.bridge_script))]
    pub fn spawn(config: &BridgeConfig) -> Result<Self> {
        info!("spawning topic-model bridge");

        let mut command = Command::new(&config.bridge_cmd);
        command
            .arg(&config.bridge_script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            ReviewTopicsError::TopicModel(format!(
                "failed to spawn bridge: {e}. Is `{}` installed?",
                config.bridge_cmd
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ReviewTopicsError::TopicModel("failed to capture bridge stdin".into())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ReviewTopicsError::TopicModel("failed to capture bridge stdout".into())
        })?;

        let mut bridge = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            request_counter: 0,
            closed: false,
        };

        match bridge.read_message()? {
            ResponseMessage::Ready => {
                info!("bridge is ready");
                Ok(bridge)
            }
            other => Err(ReviewTopicsError::TopicModel(format!(
                "expected ready message, got: {other:?}"
            ))),
        }
    }

    /// Ask the bridge to exit and wait for it.
    pub fn shutdown(mut self) -> Result<()> {
        self.closed = true;
        if let Err(e) = self.write_message(&RequestMessage::Shutdown) {
            warn!(error = %e, "could not send shutdown to bridge");
        }

        match self.child.wait() {
            Ok(status) => {
                info!(?status, "bridge exited");
                Ok(())
            }
            Err(e) => Err(ReviewTopicsError::TopicModel(format!(
                "bridge wait error: {e}"
            ))),
        }
    }

    fn next_id(&mut self) -> String {
        self.request_counter += 1;
        format!("req-{}", self.request_counter)
    }

    fn write_message(&mut self, message: &RequestMessage<'_>) -> Result<()> {
        let json = serde_json::to_string(message).map_err(|e| {
            ReviewTopicsError::TopicModel(format!("failed to serialize request: {e}"))
        })?;

        writeln!(self.stdin, "{json}").map_err(|e| {
            ReviewTopicsError::TopicModel(format!("failed to write to bridge stdin: {e}"))
        })?;
        self.stdin.flush().map_err(|e| {
            ReviewTopicsError::TopicModel(format!("failed to flush bridge stdin: {e}"))
        })
    }

    fn read_message(&mut self) -> Result<ResponseMessage> {
        let mut line = String::new();
        self.reader
            .read_line(&mut line)
            .map_err(|e| ReviewTopicsError::TopicModel(format!("bridge read error: {e}")))?;

        if line.is_empty() {
            return Err(ReviewTopicsError::TopicModel(
                "bridge closed stdout unexpectedly".into(),
            ));
        }

        serde_json::from_str(line.trim()).map_err(|e| {
            ReviewTopicsError::TopicModel(format!(
                "invalid bridge response: {e} (got: {})",
                truncate(line.trim(), 200)
            ))
        })
    }

    /// Send `message` and read the reply, rejecting replies to other requests.
    fn request(&mut self, id: &str, message: &RequestMessage<'_>) -> Result<ResponseMessage> {
        self.write_message(message)?;
        let reply = self.read_message()?;
        match &reply {
            ResponseMessage::Error { error, .. } => {
                return Err(ReviewTopicsError::TopicModel(error.clone()));
            }
            ResponseMessage::Ready => {
                return Err(ReviewTopicsError::TopicModel(
                    "unexpected ready message".into(),
                ));
            }
            ResponseMessage::Topics { id: reply_id, .. }
            | ResponseMessage::Saved { id: reply_id, .. } => {
                if reply_id != id {
                    return Err(ReviewTopicsError::TopicModel(format!(
                        "response id {reply_id} does not match request {id}"
                    )));
                }
            }
        }
        Ok(reply)
    }
}

impl TopicModel for BridgeTopicModel {
    #[instrument(skip_all, fields(documents = documents.len()))]
    fn fit_transform(
        &mut self,
        documents: &[String],
        params: &TopicParams,
    ) -> Result<Vec<TopicId>> {
        let id = self.next_id();
        debug!(%id, model = %params.embedding_model, "sending fit_transform");
        let message = RequestMessage::FitTransform {
            id: id.clone(),
            documents,
            params,
        };

        match self.request(&id, &message)? {
            ResponseMessage::Topics { topics, .. } => Ok(topics),
            other => Err(ReviewTopicsError::TopicModel(format!(
                "expected topics, got: {other:?}"
            ))),
        }
    }

    #[instrument(skip(self))]
    fn save(&mut self, path: &Path, serialization: &str) -> Result<PathBuf> {
        let id = self.next_id();
        let message = RequestMessage::Save {
            id: id.clone(),
            path: path.display().to_string(),
            serialization,
        };

        match self.request(&id, &message)? {
            ResponseMessage::Saved { path, .. } => Ok(PathBuf::from(path)),
            other => Err(ReviewTopicsError::TopicModel(format!(
                "expected saved, got: {other:?}"
            ))),
        }
    }
}

impl Drop for BridgeTopicModel {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Truncate a string for log and error output.
fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
