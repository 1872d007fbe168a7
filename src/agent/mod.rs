//! Core agentic loop.
//!
//! The [`Agent`] drives the conversation: it sends the history to the model,
//! parses tool-call markup out of each reply, runs the requested tools one
//! after another through the [`Dispatcher`] and feeds the results back,
//! until the model answers without tool calls or the iteration cap is hit.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::ModelClient;
use crate::config::Config;
use crate::error::{AgentError, ToolError};
use crate::prompt::{render_system_prompt, SystemPromptParams};
use crate::tools::dispatch::Dispatcher;
use crate::tools::{parser, CancelSignal, ToolInvocation, ToolResult};
use crate::types::{ChatRequest, Message, Role};
use crate::ui::RenderSink;

mod results;

use results::{format_not_run_turn, format_results_turn};

/// Reason attached to invocations skipped after an interrupt.
const SKIPPED_AFTER_INTERRUPT: &str = "not started: the turn was interrupted";

/// How a user turn ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The model answered without requesting tools.
    Answered(String),
    /// The user interrupted the turn (Ctrl-C).
    Cancelled,
}

/// History plus the tool-round counter for the current user message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    /// User, assistant and tool-result turns. The system prompt is kept apart.
    pub turns: Vec<Message>,
    /// Tool rounds used since the last user message.
    pub iteration_count: usize,
}

/// The conversation loop for one interactive session.
pub struct Agent {
    client: Arc<dyn ModelClient>,
    dispatcher: Dispatcher,
    sink: Arc<dyn RenderSink>,
    model: String,
    temperature: Option<f64>,
    max_tool_iterations: usize,
    system_prompt: String,
    state: ConversationState,
    cancel: CancelSignal,
}

impl Agent {
    /// Build an agent; the system prompt is rendered once, here.
    pub fn new(
        config: &Config,
        client: Arc<dyn ModelClient>,
        dispatcher: Dispatcher,
        sink: Arc<dyn RenderSink>,
    ) -> Self {
        let working_directory = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| ".".to_string());
        let auxiliary = dispatcher.auxiliary_tools();
        let custom = config.agent.system_prompt.as_str();
        let system_prompt = render_system_prompt(SystemPromptParams {
            working_directory: &working_directory,
            auxiliary_tools: &auxiliary,
            custom_instructions: Some(custom),
        });

        Self {
            client,
            dispatcher,
            sink,
            model: config.model.name.clone(),
            temperature: config.model.temperature,
            max_tool_iterations: config.agent.max_tool_iterations,
            system_prompt,
            state: ConversationState::default(),
            cancel: CancelSignal::never(),
        }
    }

    /// Interrupt flag observed while waiting on the model and on tools.
    pub fn set_cancel_signal(&mut self, cancel: CancelSignal) {
        self.cancel = cancel;
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Forget all turns (`/clear`).
    pub fn reset(&mut self) {
        self.state = ConversationState::default();
    }

    pub fn set_safe_mode(&mut self, enabled: bool) {
        self.dispatcher.policy_mut().safe_mode = enabled;
    }

    pub fn set_auto_approve(&mut self, enabled: bool) {
        self.dispatcher.policy_mut().auto_approve = enabled;
    }

    /// Send a user message and run the full agentic loop.
    ///
    /// Returns the model's final answer. Tool failures are folded back into
    /// the conversation; only model transport errors and the iteration cap
    /// end the turn with an error.
    ///
    /// History never ends on an assistant turn with unanswered tool calls,
    /// nor on a user message the model never saw a reply to.
    pub async fn send(&mut self, user_input: &str) -> Result<Reply, AgentError> {
        self.state.turns.push(Message::user(user_input));
        self.state.iteration_count = 0;

        loop {
            if self.cancel.is_cancelled() {
                self.drop_unanswered_user_turn();
                return Ok(Reply::Cancelled);
            }

            let request = self.request();
            debug!(
                model = %request.model,
                turns = request.messages.len(),
                iteration = self.state.iteration_count,
                "requesting completion"
            );
            let text = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("model request interrupted");
                    self.drop_unanswered_user_turn();
                    return Ok(Reply::Cancelled);
                }
                response = self.client.complete(&request) => response?,
            };

            let parsed = parser::parse(&text);
            self.state.turns.push(Message::assistant(text));

            if !parsed.has_invocations() {
                self.sink.answer(&parsed.commentary);
                return Ok(Reply::Answered(parsed.commentary));
            }

            self.state.iteration_count += 1;
            if self.state.iteration_count > self.max_tool_iterations {
                warn!(limit = self.max_tool_iterations, "tool iteration limit reached");
                let reason = format!("tool iteration limit ({}) reached", self.max_tool_iterations);
                self.state.turns.push(Message::tool_result(format_not_run_turn(
                    &parsed.invocations,
                    &reason,
                )));
                return Err(AgentError::MaxIterationsReached {
                    limit: self.max_tool_iterations,
                });
            }

            if !parsed.commentary.is_empty() {
                self.sink.commentary(&parsed.commentary);
            }
            let batch = self.run_batch(parsed.invocations).await;
            self.state
                .turns
                .push(Message::tool_result(format_results_turn(&batch)));

            if self.cancel.is_cancelled() {
                return Ok(Reply::Cancelled);
            }
        }
    }

    /// An interrupt before the model replied leaves the user message
    /// orphaned; forget it rather than send two user turns in a row later.
    fn drop_unanswered_user_turn(&mut self) {
        if self
            .state
            .turns
            .last()
            .is_some_and(|turn| turn.role == Role::User)
        {
            self.state.turns.pop();
        }
    }

    fn request(&self) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.state.turns.len() + 1);
        messages.push(Message::system(self.system_prompt.clone()));
        messages.extend(self.state.turns.iter().cloned());
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
        }
    }

    /// Execute invocations strictly in order. One failure never stops the
    /// rest; an interrupt marks every remaining invocation as skipped.
    async fn run_batch(
        &self,
        invocations: Vec<ToolInvocation>,
    ) -> Vec<(ToolInvocation, ToolResult)> {
        let mut batch = Vec::with_capacity(invocations.len());
        for invocation in invocations {
            let result = if self.cancel.is_cancelled() {
                ToolResult::failure(ToolError::Cancelled(SKIPPED_AFTER_INTERRUPT.into()))
            } else {
                self.sink.tool_call(&invocation);
                self.dispatcher.dispatch(&invocation, &self.cancel).await
            };
            self.sink.tool_result(&invocation, &result);
            batch.push((invocation, result));
        }
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::tools::confirm::{AutoApprove, Confirmer};
    use crate::tools::policy::SafetyPolicy;
    use crate::testsupport::{RecordingSink, ScriptedConfirmer, ScriptedModel, TestTempDir};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::watch;

    /// A model server that never answers.
    struct StalledModel;

    #[async_trait]
    impl ModelClient for StalledModel {
        async fn complete(&self, _request: &ChatRequest) -> Result<String, ApiError> {
            std::future::pending().await
        }
    }

    fn agent_with(
        model: Arc<dyn ModelClient>,
        confirmer: Arc<dyn Confirmer>,
        max_tool_iterations: usize,
    ) -> (Agent, Arc<RecordingSink>) {
        let mut config = Config::default();
        config.agent.max_tool_iterations = max_tool_iterations;
        agent_with_config(&config, model, confirmer)
    }

    fn agent_with_config(
        config: &Config,
        model: Arc<dyn ModelClient>,
        confirmer: Arc<dyn Confirmer>,
    ) -> (Agent, Arc<RecordingSink>) {
        let dispatcher = Dispatcher::new(
            config.tools.clone(),
            SafetyPolicy::from_config(&config.safety),
            confirmer,
        );
        let sink = Arc::new(RecordingSink::default());
        let agent = Agent::new(config, model, dispatcher, sink.clone());
        (agent, sink)
    }

    /// Raise the interrupt flag after `delay`, from another task.
    fn interrupt_after(delay: Duration) -> CancelSignal {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(true);
        });
        CancelSignal::new(rx)
    }

    fn glob_call(pattern: &str) -> String {
        format!(
            "Looking.\n<tool_call><tool_name>Glob</tool_name><parameters><pattern>{pattern}</pattern></parameters></tool_call>"
        )
    }

    #[tokio::test]
    async fn plain_reply_is_the_answer() {
        let model = Arc::new(ScriptedModel::new(["Hello there."]));
        let (mut agent, sink) = agent_with(model.clone(), Arc::new(AutoApprove), 10);

        let reply = agent.send("hi").await.unwrap();

        assert_eq!(reply, Reply::Answered("Hello there.".into()));
        assert_eq!(model.calls(), 1);
        assert_eq!(agent.state().turns.len(), 2);
        assert_eq!(sink.answers(), vec!["Hello there.".to_string()]);
        let request = &model.requests()[0];
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("<tool_call>"));
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_before_the_answer() {
        let fixture = TestTempDir::new("agent-loop");
        fixture.write_text("notes.md", "x");
        let model = Arc::new(ScriptedModel::new([
            glob_call(&format!("{}/*.md", fixture.path().display())),
            "Found notes.md.".to_string(),
        ]));
        let (mut agent, sink) = agent_with(model.clone(), Arc::new(AutoApprove), 10);

        let reply = agent.send("list markdown").await.unwrap();

        assert_eq!(reply, Reply::Answered("Found notes.md.".into()));
        assert_eq!(model.calls(), 2);
        let second = &model.requests()[1];
        let results = second.messages.last().unwrap();
        assert_eq!(results.role, Role::ToolResult);
        assert!(results.content.starts_with("<tool_results>"));
        assert!(results.content.contains("status=\"ok\""));
        assert!(results.content.contains("notes.md"));
        assert_eq!(sink.commentary_lines(), vec!["Looking.".to_string()]);
        assert_eq!(agent.state().iteration_count, 1);
    }

    #[tokio::test]
    async fn loop_stops_after_limit_plus_one_model_calls() {
        let fixture = TestTempDir::new("agent-limit");
        let pattern = format!("{}/*.none", fixture.path().display());
        let model = Arc::new(ScriptedModel::repeating(glob_call(&pattern)));
        let (mut agent, _) = agent_with(model.clone(), Arc::new(AutoApprove), 3);

        let err = agent.send("loop forever").await.unwrap_err();

        assert!(matches!(err, AgentError::MaxIterationsReached { limit: 3 }));
        assert_eq!(model.calls(), 4);

        // The unexecuted request still gets an answer in history.
        let last = agent.state().turns.last().unwrap();
        assert_eq!(last.role, Role::ToolResult);
        assert_eq!(last.content.matches("<tool_result ").count(), 1);
        assert!(
            last.content.contains("error: not run: tool iteration limit (3) reached"),
            "{}",
            last.content
        );
        assert!(!last.content.contains("status=\"ok\""));
    }

    #[tokio::test]
    async fn iteration_count_resets_per_user_message() {
        let fixture = TestTempDir::new("agent-reset");
        let pattern = format!("{}/*.none", fixture.path().display());
        let model = Arc::new(ScriptedModel::new([
            glob_call(&pattern),
            "done".to_string(),
            glob_call(&pattern),
            "done again".to_string(),
        ]));
        let (mut agent, _) = agent_with(model, Arc::new(AutoApprove), 1);
        assert_eq!(
            agent.send("one").await.unwrap(),
            Reply::Answered("done".into())
        );
        assert_eq!(
            agent.send("two").await.unwrap(),
            Reply::Answered("done again".into())
        );
    }

    #[tokio::test]
    async fn transport_error_propagates() {
        let model = Arc::new(ScriptedModel::failing(ApiError::status(500, "boom", None)));
        let (mut agent, _) = agent_with(model, Arc::new(AutoApprove), 10);
        let err = agent.send("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Api(_)));
    }

    #[tokio::test]
    async fn declined_confirmation_is_reported_to_the_model() {
        let fixture = TestTempDir::new("agent-decline");
        let target = fixture.child_str("out.txt");
        let write = format!(
            "<tool_call><tool_name>Write</tool_name><parameters><file_path>{target}</file_path><content>x</content></parameters></tool_call>"
        );
        let model = Arc::new(ScriptedModel::new([write, "ok, not writing".to_string()]));
        let confirmer = Arc::new(ScriptedConfirmer::new([false]));
        let (mut agent, sink) = agent_with(model.clone(), confirmer, 10);

        let reply = agent.send("write it").await.unwrap();

        assert_eq!(reply, Reply::Answered("ok, not writing".into()));
        assert!(!fixture.child("out.txt").exists());
        let requests = model.requests();
        let results = &requests[1].messages.last().unwrap().content;
        assert!(results.contains("error: cancelled by user: "), "{results}");
        assert_eq!(sink.failures(), 1);
    }

    #[tokio::test]
    async fn interrupt_before_tools_cancels_the_turn() {
        let model = Arc::new(ScriptedModel::new([glob_call("/nonexistent/*.md"), "unused".to_string()]));
        let (mut agent, sink) = agent_with(model.clone(), Arc::new(AutoApprove), 10);
        let (tx, rx) = watch::channel(true);
        agent.set_cancel_signal(CancelSignal::new(rx));

        let reply = agent.send("hi").await.unwrap();

        assert_eq!(reply, Reply::Cancelled);
        assert_eq!(model.calls(), 0);
        assert!(sink.answers().is_empty());
        assert!(agent.state().turns.is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn interrupt_while_waiting_on_the_model_forgets_the_message() {
        let (mut agent, sink) = agent_with(Arc::new(StalledModel), Arc::new(AutoApprove), 10);
        agent.set_cancel_signal(interrupt_after(Duration::from_millis(100)));

        let reply = tokio::time::timeout(Duration::from_secs(10), agent.send("hello?"))
            .await
            .expect("send should return once interrupted")
            .unwrap();

        assert_eq!(reply, Reply::Cancelled);
        assert!(agent.state().turns.is_empty());
        assert!(sink.answers().is_empty());
    }

    #[tokio::test]
    async fn interrupt_mid_batch_reports_every_call() {
        let fixture = TestTempDir::new("agent-mid-batch");
        let untouched = fixture.child_str("later.txt");
        let batch = format!(
            "Three steps.\n\
             <tool_call><tool_name>Bash</tool_name><parameters><command>sleep 30</command></parameters></tool_call>\n\
             <tool_call><tool_name>Write</tool_name><parameters><file_path>{untouched}</file_path><content>x</content></parameters></tool_call>\n\
             <tool_call><tool_name>Glob</tool_name><parameters><pattern>*.md</pattern></parameters></tool_call>"
        );
        let model = Arc::new(ScriptedModel::new([batch, "unused".to_string()]));
        let mut config = Config::default();
        config.safety.safe_mode = false;
        config.safety.auto_approve = true;
        let (mut agent, sink) = agent_with_config(&config, model.clone(), Arc::new(AutoApprove));
        agent.set_cancel_signal(interrupt_after(Duration::from_millis(300)));

        let reply = tokio::time::timeout(Duration::from_secs(20), agent.send("do three things"))
            .await
            .expect("the shell command should be killed on interrupt")
            .unwrap();

        assert_eq!(reply, Reply::Cancelled);
        assert_eq!(model.calls(), 1);
        assert!(!fixture.child("later.txt").exists());
        assert_eq!(sink.failures(), 3);

        let turns = &agent.state().turns;
        assert_eq!(turns.len(), 3);
        let results = &turns[2];
        assert_eq!(results.role, Role::ToolResult);
        assert_eq!(results.content.matches("<tool_result ").count(), 3);

        let entries: Vec<&str> = results.content.split("</tool_result>").collect();
        assert!(entries[0].contains("index=\"1\" name=\"Bash\" status=\"error\""));
        assert!(entries[0].contains("error: interrupted: `sleep 30` was killed"), "{}", entries[0]);
        for (entry, name) in entries[1..3].iter().zip(["Write", "Glob"]) {
            assert!(entry.contains(&format!("name=\"{name}\" status=\"error\"")), "{entry}");
            assert!(
                entry.contains(&format!("error: cancelled by user: {SKIPPED_AFTER_INTERRUPT}")),
                "{entry}"
            );
        }
    }

    #[test]
    fn toggles_and_reset_update_state() {
        let model = Arc::new(ScriptedModel::new(Vec::<String>::new()));
        let (mut agent, _) = agent_with(model, Arc::new(AutoApprove), 10);
        agent.set_safe_mode(false);
        agent.set_auto_approve(true);
        assert!(!agent.dispatcher().policy().safe_mode);
        assert!(agent.dispatcher().policy().auto_approve);

        agent.state.turns.push(Message::user("x"));
        agent.state.iteration_count = 2;
        agent.reset();
        assert_eq!(agent.state(), &ConversationState::default());
    }
}
