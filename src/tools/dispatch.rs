//! Routes one invocation to its executor.
//!
//! Every call produces exactly one [`ToolResult`]: validation problems,
//! policy denials, refusals and execution failures all come back as failed
//! results, never as `Err`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::ToolsConfig;
use crate::error::ToolError;
use crate::mcp::{params_to_arguments, AuxiliaryTools};

use super::confirm::{Approval, Confirmer};
use super::policy::{SafetyDecision, SafetyPolicy};
use super::shell::{self, CommandArgs};
use super::{files, search, BuiltinTool, CancelSignal, ToolInvocation, ToolResult, ToolTarget};

/// Executes invocations against built-in tools and auxiliary servers.
pub struct Dispatcher {
    tools: ToolsConfig,
    policy: SafetyPolicy,
    confirmer: Arc<dyn Confirmer>,
    auxiliary: Option<Arc<dyn AuxiliaryTools>>,
}

impl Dispatcher {
    pub fn new(tools: ToolsConfig, policy: SafetyPolicy, confirmer: Arc<dyn Confirmer>) -> Self {
        Self {
            tools,
            policy,
            confirmer,
            auxiliary: None,
        }
    }

    /// Attach an auxiliary tool server collaborator for `server.tool` names.
    pub fn with_auxiliary(mut self, auxiliary: Arc<dyn AuxiliaryTools>) -> Self {
        self.auxiliary = Some(auxiliary);
        self
    }

    pub fn policy(&self) -> &SafetyPolicy {
        &self.policy
    }

    /// Runtime toggles (`/safe`, `/approve`) mutate the policy in place.
    pub fn policy_mut(&mut self) -> &mut SafetyPolicy {
        &mut self.policy
    }

    /// `(name, description)` for every auxiliary tool currently exposed.
    pub fn auxiliary_tools(&self) -> Vec<(String, String)> {
        self.auxiliary
            .as_ref()
            .map(|aux| aux.tool_descriptions())
            .unwrap_or_default()
    }

    /// Policy decision for one invocation, without executing it.
    pub fn decide(&self, invocation: &ToolInvocation) -> SafetyDecision {
        let target = ToolTarget::resolve(&invocation.name);
        let command = match &target {
            ToolTarget::Builtin(BuiltinTool::RunCommand) => self
                .tools
                .aliases
                .lookup_trimmed(&invocation.parameters, super::aliases::Param::Command),
            _ => None,
        };
        self.policy.decide(&target, command)
    }

    /// Execute one invocation and return its (truncated) result.
    pub async fn dispatch(&self, invocation: &ToolInvocation, cancel: &CancelSignal) -> ToolResult {
        info!(tool = %invocation.name, params = %invocation.received_parameters(), "dispatching tool");
        let result = ToolResult::from(self.run(invocation, cancel).await);
        debug!(
            tool = %invocation.name,
            succeeded = result.succeeded,
            error_kind = result.error.as_ref().map(ToolError::kind),
            bytes = result.output.len(),
            "tool finished"
        );
        result.truncated(self.tools.max_output_bytes)
    }

    async fn run(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancelSignal,
    ) -> Result<ToolResult, ToolError> {
        match ToolTarget::resolve(&invocation.name) {
            ToolTarget::Unknown(name) => Err(ToolError::NotFound(format!(
                "`{name}` (available: {})",
                self.available_names()
            ))),
            ToolTarget::Builtin(tool) => self.run_builtin(tool, invocation, cancel).await,
            ToolTarget::Auxiliary { server, tool } => {
                self.run_auxiliary(&server, &tool, invocation).await
            }
        }
    }

    async fn run_builtin(
        &self,
        tool: BuiltinTool,
        invocation: &ToolInvocation,
        cancel: &CancelSignal,
    ) -> Result<ToolResult, ToolError> {
        let aliases = &self.tools.aliases;
        match tool {
            BuiltinTool::RunCommand => {
                // Validate before the policy sees the command so a missing
                // parameter is reported as such rather than as a denial.
                let args = CommandArgs::from_invocation(
                    invocation,
                    aliases,
                    Duration::from_secs(self.tools.command_timeout_secs),
                )?;
                let approval = self.gate(tool, Some(&args.command))?;
                shell::run_command(&args, &self.tools.shell, &approval, cancel).await
            }
            BuiltinTool::ReadFile => {
                self.gate(tool, None)?;
                files::read_file(invocation, aliases).await
            }
            BuiltinTool::WriteFile => {
                let approval = self.gate(tool, None)?;
                files::write_file(invocation, aliases, &approval).await
            }
            BuiltinTool::EditFile => {
                let approval = self.gate(tool, None)?;
                files::edit_file(invocation, aliases, &self.tools.backup_suffix, &approval).await
            }
            BuiltinTool::FindFiles => {
                self.gate(tool, None)?;
                search::find_files(invocation, aliases, self.tools.max_search_results).await
            }
            BuiltinTool::SearchContent => {
                self.gate(tool, None)?;
                search::search_content(invocation, aliases, self.tools.max_search_results).await
            }
        }
    }

    async fn run_auxiliary(
        &self,
        server: &str,
        tool: &str,
        invocation: &ToolInvocation,
    ) -> Result<ToolResult, ToolError> {
        let Some(auxiliary) = &self.auxiliary else {
            return Err(ToolError::NotFound(format!(
                "`{server}.{tool}`: no auxiliary tool servers are running"
            )));
        };
        let target = ToolTarget::Auxiliary {
            server: server.to_string(),
            tool: tool.to_string(),
        };
        let decision = self.policy.decide(&target, None);
        if let SafetyDecision::Denied(reason) = decision {
            return Err(ToolError::Denied(reason));
        }
        let approval = Approval::new(
            decision.needs_confirmation(),
            &invocation.name,
            &*self.confirmer,
        );
        let arguments = params_to_arguments(&invocation.parameters);
        approval.obtain(&format!("call {server}.{tool} with {arguments}"))?;
        let output = auxiliary.call(server, tool, arguments).await?;
        Ok(ToolResult::success(output))
    }

    /// Apply the policy to a built-in tool and build its confirmation gate.
    fn gate(&self, tool: BuiltinTool, command: Option<&str>) -> Result<Approval<'_>, ToolError> {
        match self.policy.decide(&ToolTarget::Builtin(tool), command) {
            SafetyDecision::Denied(reason) => Err(ToolError::Denied(reason)),
            decision => Ok(Approval::new(
                decision.needs_confirmation(),
                tool.display_name(),
                &*self.confirmer,
            )),
        }
    }

    fn available_names(&self) -> String {
        super::BUILTIN_TOOLS
            .iter()
            .map(|spec| spec.display_name.to_string())
            .chain(self.auxiliary_tools().into_iter().map(|(name, _)| name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::{ScriptedConfirmer, TestTempDir};
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn dispatcher(safe_mode: bool, auto_approve: bool, confirmer: Arc<dyn Confirmer>) -> Dispatcher {
        Dispatcher::new(
            ToolsConfig::default(),
            SafetyPolicy::new(safe_mode, auto_approve, vec!["echo".into(), "ls".into()]),
            confirmer,
        )
    }

    #[tokio::test]
    async fn safe_mode_denies_unlisted_command_without_spawning() {
        let fixture = TestTempDir::new("dispatch-deny");
        let marker = fixture.child_str("spawned");
        let confirmer = Arc::new(ScriptedConfirmer::new([true]));
        let d = dispatcher(true, false, confirmer.clone());
        let inv = ToolInvocation::new("Bash")
            .with_param("command", format!("rm -rf /tmp/x; touch {marker}"));

        let result = d.dispatch(&inv, &CancelSignal::never()).await;

        assert!(!result.succeeded);
        assert!(matches!(result.error, Some(ToolError::Denied(_))));
        assert!(confirmer.prompts().is_empty());
        assert!(!fixture.child("spawned").exists());
    }

    #[tokio::test]
    async fn allowlisted_command_runs_after_confirmation() {
        let confirmer = Arc::new(ScriptedConfirmer::new([true]));
        let d = dispatcher(true, false, confirmer.clone());
        let inv = ToolInvocation::new("run_command").with_param("command", "echo hi");
        let result = d.dispatch(&inv, &CancelSignal::never()).await;
        assert!(result.succeeded, "{result:?}");
        assert_eq!(result.exit_status, Some(0));
        assert_eq!(result.output.trim(), "hi");
        assert_eq!(confirmer.prompts().len(), 1);
    }

    #[tokio::test]
    async fn declined_allowlisted_redirect_leaves_file_untouched() {
        let fixture = TestTempDir::new("dispatch-redirect");
        fixture.write_text("victim.txt", "precious\n");
        let config = crate::config::Config::default();
        let confirmer = Arc::new(ScriptedConfirmer::new([false]));
        let d = Dispatcher::new(
            config.tools.clone(),
            SafetyPolicy::from_config(&config.safety),
            confirmer.clone(),
        );
        let inv = ToolInvocation::new("Bash").with_param(
            "command",
            format!("echo clobbered > {}", fixture.child_str("victim.txt")),
        );

        let result = d.dispatch(&inv, &CancelSignal::never()).await;

        assert!(matches!(result.error, Some(ToolError::Cancelled(_))), "{result:?}");
        assert_eq!(confirmer.prompts().len(), 1);
        assert_eq!(
            std::fs::read_to_string(fixture.child("victim.txt")).unwrap(),
            "precious\n"
        );
    }

    #[tokio::test]
    async fn missing_command_is_a_validation_failure_listing_params() {
        let d = dispatcher(true, false, Arc::new(ScriptedConfirmer::new([])));
        let inv = ToolInvocation::new("Bash").with_param("cmnd", "ls");
        let result = d.dispatch(&inv, &CancelSignal::never()).await;
        match result.error {
            Some(ToolError::InvalidArguments(msg)) => assert!(msg.contains("cmnd"), "{msg}"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let d = dispatcher(true, false, Arc::new(ScriptedConfirmer::new([])));
        let result = d
            .dispatch(&ToolInvocation::new("Frobnicate"), &CancelSignal::never())
            .await;
        assert!(matches!(result.error, Some(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn declined_write_is_cancelled_and_leaves_disk_untouched() {
        let fixture = TestTempDir::new("dispatch-decline");
        let confirmer = Arc::new(ScriptedConfirmer::new([false]));
        let d = dispatcher(true, false, confirmer.clone());
        let inv = ToolInvocation::new("Write")
            .with_param("file_path", fixture.child_str("new.txt"))
            .with_param("content", "x\n");

        let result = d.dispatch(&inv, &CancelSignal::never()).await;

        assert!(matches!(result.error, Some(ToolError::Cancelled(_))));
        assert_eq!(confirmer.prompts().len(), 1);
        assert!(!fixture.child("new.txt").exists());
    }

    #[tokio::test]
    async fn auto_approve_skips_prompt_for_writes() {
        let fixture = TestTempDir::new("dispatch-auto");
        let confirmer = Arc::new(ScriptedConfirmer::new([]));
        let d = dispatcher(true, true, confirmer.clone());
        let inv = ToolInvocation::new("write_file")
            .with_param("path", fixture.child_str("a.txt"))
            .with_param("content", "a\n");
        let result = d.dispatch(&inv, &CancelSignal::never()).await;
        assert!(result.succeeded, "{result:?}");
        assert!(confirmer.prompts().is_empty());
    }

    #[tokio::test]
    async fn output_is_truncated_to_budget() {
        let mut tools = ToolsConfig::default();
        tools.max_output_bytes = 8;
        let d = Dispatcher::new(
            tools,
            SafetyPolicy::new(true, true, vec!["printf".into()]),
            Arc::new(ScriptedConfirmer::new([])),
        );
        let inv = ToolInvocation::new("Bash").with_param("command", "printf 'abcdefghijklmnop'");
        let result = d.dispatch(&inv, &CancelSignal::never()).await;
        assert_eq!(result.output, "abcdefgh...[truncated]");
    }

    #[test]
    fn decide_reads_command_through_aliases() {
        let d = dispatcher(true, false, Arc::new(ScriptedConfirmer::new([])));
        let inv = ToolInvocation::new("Bash").with_param("cmd", "rm x");
        assert!(matches!(d.decide(&inv), SafetyDecision::Denied(_)));
        let inv = ToolInvocation::new("Bash").with_param("cmd", "ls -la");
        assert_eq!(d.decide(&inv), SafetyDecision::RequiresConfirmation);
    }

    #[derive(Default)]
    struct FakeServer {
        calls: Mutex<Vec<(String, String, serde_json::Value)>>,
    }

    #[async_trait]
    impl AuxiliaryTools for FakeServer {
        async fn call(
            &self,
            server: &str,
            tool: &str,
            arguments: serde_json::Value,
        ) -> Result<String, ToolError> {
            self.calls
                .lock()
                .unwrap()
                .push((server.into(), tool.into(), arguments));
            if tool == "broken" {
                return Err(ToolError::ExecutionFailed("server said no".into()));
            }
            Ok("weather: sunny".into())
        }

        fn tool_descriptions(&self) -> Vec<(String, String)> {
            vec![("weather.today".into(), "Today's forecast".into())]
        }
    }

    #[tokio::test]
    async fn namespaced_names_route_to_auxiliary_server() {
        let server = Arc::new(FakeServer::default());
        let d = dispatcher(true, true, Arc::new(ScriptedConfirmer::new([])))
            .with_auxiliary(server.clone());
        let inv = ToolInvocation::new("weather.today")
            .with_param("city", "Oslo")
            .with_param("days", "2");

        let result = d.dispatch(&inv, &CancelSignal::never()).await;

        assert!(result.succeeded);
        assert_eq!(result.output, "weather: sunny");
        let calls = server.calls.lock().unwrap();
        assert_eq!(calls[0].0, "weather");
        assert_eq!(calls[0].1, "today");
        assert_eq!(calls[0].2, serde_json::json!({"city": "Oslo", "days": 2}));
        assert_eq!(d.auxiliary_tools().len(), 1);
    }

    #[tokio::test]
    async fn auxiliary_failures_and_missing_servers_become_results() {
        let d = dispatcher(true, true, Arc::new(ScriptedConfirmer::new([])));
        let result = d
            .dispatch(&ToolInvocation::new("weather.today"), &CancelSignal::never())
            .await;
        assert!(matches!(result.error, Some(ToolError::NotFound(_))));

        let d = d.with_auxiliary(Arc::new(FakeServer::default()));
        let result = d
            .dispatch(&ToolInvocation::new("weather.broken"), &CancelSignal::never())
            .await;
        assert_eq!(
            result.error,
            Some(ToolError::ExecutionFailed("server said no".into()))
        );
    }

    #[tokio::test]
    async fn auxiliary_calls_require_confirmation_without_auto_approve() {
        let confirmer = Arc::new(ScriptedConfirmer::new([false]));
        let d = dispatcher(true, false, confirmer.clone())
            .with_auxiliary(Arc::new(FakeServer::default()));
        let result = d
            .dispatch(&ToolInvocation::new("weather.today"), &CancelSignal::never())
            .await;
        assert!(matches!(result.error, Some(ToolError::Cancelled(_))));
        assert_eq!(confirmer.prompts()[0].0, "weather.today");
    }
}
