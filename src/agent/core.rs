//! Core agent loop controller
//!
//! The controller owns the transcript and drives it through an explicit state
//! machine:
//!
//! ```text
//! Seeded -> AwaitingModel -> DispatchingTools -> AwaitingModel ... -> Terminated
//! ```
//!
//! Backend failures consume a retry budget that is never replenished; tool
//! failures go back to the model as results and cost nothing. A run always
//! ends in exactly one terminal state.

use crate::agent::{extract, Conversation, FinalAnswer, ModelTurn};
use crate::config::{AgentConfig, ExecutionPolicy, ToolChoiceMode, ToolsConfig};
use crate::error::{IconAgentError, Result};
use crate::providers::{Provider, TokenUsage};
use crate::tools::{Tool, ToolDispatcher, ToolRegistry};

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Retries left for backend failures over the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
    consumed: u32,
}

impl RetryBudget {
    /// Create a budget permitting `max_retries` retries
    ///
    /// # Examples
    ///
    /// ```
    /// use iconagent::agent::RetryBudget;
    ///
    /// let mut budget = RetryBudget::new(1);
    /// assert!(budget.try_consume());
    /// assert!(!budget.try_consume());
    /// assert_eq!(budget.consumed(), 1);
    /// ```
    pub fn new(max_retries: u32) -> Self {
        Self {
            remaining: max_retries,
            consumed: 0,
        }
    }

    /// Take one retry if any is left
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.consumed += 1;
        true
    }

    /// Retries still available
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Retries used so far
    pub fn consumed(&self) -> u32 {
        self.consumed
    }
}

/// How a run ended
#[derive(Debug)]
pub enum TerminalState {
    /// The model replied without tool calls; this is its final turn
    Success(ModelTurn),
    /// The run failed for the given reason
    Failure(IconAgentError),
}

/// Outcome and bookkeeping of one run
#[derive(Debug)]
pub struct AgentRun {
    /// Terminal state
    pub state: TerminalState,
    /// Full transcript, including the final model turn on success
    pub conversation: Conversation,
    /// Model replies received
    pub model_turns: usize,
    /// Backend requests issued, including failed ones
    pub backend_calls: usize,
    /// Retries consumed
    pub retries_used: u32,
    /// Token usage summed over all replies that reported it
    pub usage: TokenUsage,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl AgentRun {
    /// Whether the run ended in success
    pub fn is_success(&self) -> bool {
        matches!(self.state, TerminalState::Success(_))
    }

    /// The final model turn, if the run succeeded
    pub fn final_turn(&self) -> Option<&ModelTurn> {
        match &self.state {
            TerminalState::Success(turn) => Some(turn),
            TerminalState::Failure(_) => None,
        }
    }

    /// The failure reason, if the run failed
    pub fn failure(&self) -> Option<&IconAgentError> {
        match &self.state {
            TerminalState::Failure(err) => Some(err),
            TerminalState::Success(_) => None,
        }
    }

    /// Convert into the final turn or the failure reason
    pub fn into_result(self) -> std::result::Result<ModelTurn, IconAgentError> {
        match self.state {
            TerminalState::Success(turn) => Ok(turn),
            TerminalState::Failure(err) => Err(err),
        }
    }
}

/// Mutable state of one run; local to the controller's task
struct RunState {
    conversation: Conversation,
    budget: RetryBudget,
    model_turns: usize,
    backend_calls: usize,
    usage: TokenUsage,
}

/// The agent loop controller
///
/// # Examples
///
/// ```no_run
/// use iconagent::agent::Agent;
/// use iconagent::config::{AgentConfig, ProviderConfig, ToolsConfig};
/// use iconagent::providers::create_provider;
/// use iconagent::tools::ToolRegistry;
/// use std::sync::Arc;
///
/// # async fn example() -> iconagent::error::Result<()> {
/// let provider = create_provider(&ProviderConfig::default(), None)?;
/// let agent = Agent::new(
///     provider,
///     Arc::new(ToolRegistry::new()),
///     AgentConfig::default(),
///     &ToolsConfig::default(),
/// )?;
/// let answer = agent.find("Find the Acme Corp logo").await?;
/// println!("{}", answer.to_html());
/// # Ok(())
/// # }
/// ```
pub struct Agent {
    provider: Arc<dyn Provider>,
    dispatcher: ToolDispatcher,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    ///
    /// # Errors
    ///
    /// Returns `Config` if `max_turns` is zero or a forced tool choice names
    /// a capability missing from the registry
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
        tools_config: &ToolsConfig,
    ) -> Result<Self> {
        if config.max_turns == 0 {
            return Err(
                IconAgentError::Config("max_turns must be greater than 0".to_string()).into(),
            );
        }
        if let ToolChoiceMode::Forced(name) = &config.policy.tool_choice {
            if registry.lookup(name).is_err() {
                return Err(IconAgentError::Config(format!(
                    "forced tool choice '{}' is not a registered capability",
                    name
                ))
                .into());
            }
        }

        Ok(Self {
            provider,
            dispatcher: ToolDispatcher::new(registry, tools_config),
            config,
        })
    }

    /// The backend this agent talks to
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// The agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the loop to a terminal state
    pub async fn run(&self, goal: impl Into<String>) -> AgentRun {
        self.run_with_cancel(goal, CancellationToken::new()).await
    }

    /// Run the loop, stopping early when `cancel` fires or the deadline passes
    ///
    /// In-flight backend and tool futures are dropped on cancellation and
    /// their results discarded.
    pub async fn run_with_cancel(
        &self,
        goal: impl Into<String>,
        cancel: CancellationToken,
    ) -> AgentRun {
        let start = Instant::now();
        let deadline = Duration::from_secs(self.config.timeout_seconds);
        let mut run = RunState {
            conversation: Conversation::seeded(goal),
            budget: RetryBudget::new(self.config.max_retries),
            model_turns: 0,
            backend_calls: 0,
            usage: TokenUsage::default(),
        };

        info!(
            agent.event = "seeded",
            agent.provider = self.provider.name(),
            agent.max_turns = self.config.max_turns,
            agent.retries_left = run.budget.remaining(),
            "Starting agent run"
        );

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                Err(IconAgentError::Cancelled("run cancelled by caller".to_string()))
            }
            result = tokio::time::timeout(deadline, self.drive(&mut run)) => {
                result.unwrap_or(Err(IconAgentError::Timeout {
                    seconds: self.config.timeout_seconds,
                }))
            }
        };

        let state = match outcome {
            Ok(turn) => {
                info!(
                    agent.event = "terminated",
                    agent.outcome = "success",
                    agent.turn = run.model_turns,
                    agent.retries_used = run.budget.consumed(),
                    "Agent run succeeded"
                );
                TerminalState::Success(turn)
            }
            Err(err) => {
                warn!(
                    agent.event = "terminated",
                    agent.outcome = "failure",
                    agent.turn = run.model_turns,
                    agent.retries_used = run.budget.consumed(),
                    error = %err,
                    "Agent run failed"
                );
                TerminalState::Failure(err)
            }
        };

        AgentRun {
            state,
            conversation: run.conversation,
            model_turns: run.model_turns,
            backend_calls: run.backend_calls,
            retries_used: run.budget.consumed(),
            usage: run.usage,
            duration: start.elapsed(),
        }
    }

    /// Run the loop and extract the image reference from the final reply
    ///
    /// # Errors
    ///
    /// Returns the run's failure reason, or `UnparsableAnswer` if the final
    /// reply holds no usable `img` tag
    pub async fn find(
        &self,
        goal: impl Into<String>,
    ) -> std::result::Result<FinalAnswer, IconAgentError> {
        let turn = self.run(goal).await.into_result()?;
        extract(&turn)
    }

    async fn drive(&self, run: &mut RunState) -> std::result::Result<ModelTurn, IconAgentError> {
        loop {
            // AwaitingModel
            if run.model_turns == self.config.max_turns {
                return Err(IconAgentError::TurnLimitExceeded {
                    limit: self.config.max_turns,
                });
            }

            let policy = self.policy_for(run.model_turns);
            let tools: Vec<Tool> = self.dispatcher.registry().list().cloned().collect();

            run.backend_calls += 1;
            debug!(
                agent.event = "model_call",
                agent.turn = run.model_turns + 1,
                agent.retries_left = run.budget.remaining(),
                agent.tool_count = tools.len(),
                "Requesting model turn"
            );

            let response = match self
                .provider
                .complete(run.conversation.turns(), &tools, &policy)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    let err = into_backend_error(e);
                    if !err.is_backend_error() {
                        return Err(err);
                    }
                    if run.budget.try_consume() {
                        warn!(
                            agent.event = "retry",
                            agent.turn = run.model_turns + 1,
                            agent.retries_left = run.budget.remaining(),
                            error = %err,
                            "Backend call failed, retrying"
                        );
                        continue;
                    }
                    return Err(IconAgentError::RetryBudgetExhausted {
                        retries: run.budget.consumed(),
                        last_error: err.to_string(),
                    });
                }
            };

            run.model_turns += 1;
            if let Some(usage) = &response.usage {
                run.usage.accumulate(usage);
            }

            let turn = response.turn;
            debug!(
                agent.event = "model_reply",
                agent.turn = run.model_turns,
                agent.tool_calls = turn.tool_calls.len(),
                "Model turn received"
            );

            if !turn.has_tool_calls() {
                run.conversation.push_model_turn(turn.clone());
                return Ok(turn);
            }

            // DispatchingTools
            let calls = turn.tool_calls.clone();
            run.conversation.push_model_turn(turn);
            if run.model_turns == self.config.max_turns {
                return Err(IconAgentError::TurnLimitExceeded {
                    limit: self.config.max_turns,
                });
            }
            for call in &calls {
                debug!(
                    agent.event = "tool_dispatch",
                    tool.name = %call.name,
                    tool.call_id = %call.id,
                    "Dispatching tool call"
                );
            }

            let results = self.dispatcher.execute(&calls).await;
            for result in &results {
                debug!(
                    agent.event = "tool_result",
                    tool.name = %result.tool_name,
                    tool.call_id = %result.call_id,
                    tool.error = result.is_error(),
                    "Tool call returned"
                );
            }
            run.conversation.push_tool_results(results);
        }
    }

    /// Policy for the request following `model_turns` replies
    ///
    /// A forced tool choice only applies until the model has replied once,
    /// otherwise it could never produce a final answer.
    fn policy_for(&self, model_turns: usize) -> ExecutionPolicy {
        let mut policy = self.config.policy.clone();
        if model_turns > 0 && matches!(policy.tool_choice, ToolChoiceMode::Forced(_)) {
            policy.tool_choice = ToolChoiceMode::Auto;
        }
        policy
    }
}

/// Recover the error kind from a provider error; untyped errors count as
/// backend unavailability
fn into_backend_error(err: anyhow::Error) -> IconAgentError {
    match err.downcast::<IconAgentError>() {
        Ok(err) => err,
        Err(other) => IconAgentError::BackendUnavailable(other.to_string()),
    }
}
