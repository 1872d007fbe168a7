//! Shared test fixtures for executor, dispatcher and loop tests.
//!
//! Keeping tiny but reusable doubles here prevents each test module from
//! rebuilding ad-hoc temp dirs, scripted models, confirmers and sinks.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::api::ModelClient;
use crate::error::ApiError;
use crate::tools::confirm::Confirmer;
use crate::tools::{ToolInvocation, ToolResult};
use crate::types::ChatRequest;
use crate::ui::RenderSink;

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temporary directory fixture with best-effort cleanup.
///
/// This helper is intentionally simple and std-only so unit tests can use it
/// without introducing new dependencies.
#[derive(Debug)]
pub struct TestTempDir {
    path: PathBuf,
}

impl TestTempDir {
    /// Create a unique temporary directory with a readable prefix.
    pub fn new(prefix: &str) -> Self {
        let suffix = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let dir = std::env::temp_dir().join(format!(
            "loco-{prefix}-{}-{millis}-{suffix}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("failed to create temporary fixture directory");
        Self { path: dir }
    }

    /// Root directory path for this fixture.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a child path under the fixture root.
    pub fn child(&self, relative: &str) -> PathBuf {
        self.path.join(relative)
    }

    /// Child path as a `String`, the form tool parameters take.
    pub fn child_str(&self, relative: &str) -> String {
        self.child(relative).to_string_lossy().into_owned()
    }

    /// Write UTF-8 text to a child path, creating parent directories as needed.
    pub fn write_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.child(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent directories for fixture");
        }
        fs::write(&path, content).expect("failed to write fixture file");
        path
    }
}

impl Drop for TestTempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

/// Model double that replays canned replies and records every request.
///
/// Once the script runs out it keeps returning `fallback` (if set), which
/// makes "the model never stops calling tools" tests easy to write.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ApiError>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `text` forever.
    pub fn repeating(text: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: Some(text.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ApiError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ApiError> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());
        let next = self.replies.lock().expect("replies lock").pop_front();
        match (next, &self.fallback) {
            (Some(reply), _) => reply,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(ApiError::InvalidResponse(
                "scripted model has no more replies".into(),
            )),
        }
    }
}

/// Confirmer double answering from a pre-scripted approve/deny sequence.
///
/// Declines once the script is exhausted.
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<(String, String)>>,
}

impl ScriptedConfirmer {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every `(tool, description)` pair asked so far.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts.lock().expect("prompts lock").clone()
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, tool: &str, description: &str) -> bool {
        self.prompts
            .lock()
            .expect("prompts lock")
            .push((tool.to_string(), description.to_string()));
        self.answers
            .lock()
            .expect("answers lock")
            .pop_front()
            .unwrap_or(false)
    }
}

/// Render sink that records what the loop reported instead of printing.
#[derive(Default)]
pub struct RecordingSink {
    answers: Mutex<Vec<String>>,
    commentary: Mutex<Vec<String>>,
    results: Mutex<Vec<(String, ToolResult)>>,
}

impl RecordingSink {
    pub fn answers(&self) -> Vec<String> {
        self.answers.lock().expect("answers lock").clone()
    }

    pub fn commentary_lines(&self) -> Vec<String> {
        self.commentary.lock().expect("commentary lock").clone()
    }

    /// Number of failed tool results reported.
    pub fn failures(&self) -> usize {
        self.results
            .lock()
            .expect("results lock")
            .iter()
            .filter(|(_, r)| !r.succeeded)
            .count()
    }
}

impl RenderSink for RecordingSink {
    fn commentary(&self, text: &str) {
        self.commentary
            .lock()
            .expect("commentary lock")
            .push(text.to_string());
    }

    fn tool_call(&self, _invocation: &ToolInvocation) {}

    fn tool_result(&self, invocation: &ToolInvocation, result: &ToolResult) {
        self.results
            .lock()
            .expect("results lock")
            .push((invocation.name.clone(), result.clone()));
    }

    fn answer(&self, text: &str) {
        self.answers
            .lock()
            .expect("answers lock")
            .push(text.to_string());
    }

    fn warn(&self, _msg: &str) {}

    fn error(&self, _msg: &str) {}

    fn info(&self, _msg: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_fixture_writes_and_resolves_paths() {
        let fixture = TestTempDir::new("fixture");
        let file = fixture.write_text("nested/file.txt", "hello");
        assert_eq!(fs::read_to_string(file).unwrap(), "hello");
    }

    #[tokio::test]
    async fn scripted_model_replays_then_falls_back() {
        let request = ChatRequest {
            model: "m".into(),
            messages: Vec::new(),
            temperature: None,
        };
        let model = ScriptedModel::new(["one"]);
        assert_eq!(model.complete(&request).await.unwrap(), "one");
        assert!(model.complete(&request).await.is_err());
        assert_eq!(model.calls(), 2);

        let forever = ScriptedModel::repeating("again");
        assert_eq!(forever.complete(&request).await.unwrap(), "again");
        assert_eq!(forever.complete(&request).await.unwrap(), "again");
    }

    #[test]
    fn scripted_confirmer_declines_after_script() {
        let confirmer = ScriptedConfirmer::new([true]);
        assert!(confirmer.confirm("Write", "create a"));
        assert!(!confirmer.confirm("Write", "create b"));
        assert_eq!(confirmer.prompts().len(), 2);
    }
}
