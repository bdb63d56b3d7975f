//! ReAct query orchestrator.
//!
//! Answers a question about a document by alternating between the reasoning
//! engine and the tools in a [`ToolRegistry`]. Each iteration sends the
//! prompt plus the transcript so far to the engine and parses the reply as
//! either an action (`Action:` / `Action Input:`) or a `Final Answer:`.
//!
//! ```text
//! Thinking ──action──▶ Acting ──observation──▶ Thinking
//!    │                                            │
//!    ├─final answer (after ≥1 tool call)──▶ Answering
//!    └─iteration budget spent────────────▶ ForcedStop
//! ```
//!
//! Malformed replies, unknown tool names and premature final answers all
//! become observations and the loop continues. The budget counts engine
//! calls, so the loop always terminates.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::{DocentError, Result};
use crate::tool::{ToolRegistry, RETRIEVE_INFORMATION};

/// Returned to callers whenever answering fails.
pub const GENERIC_FAILURE: &str = "I'm sorry, an error occurred while processing your query.";

/// Output of a run that spent its iteration budget without an answer.
pub const FORCED_STOP_FALLBACK: &str = "Agent stopped due to iteration limit or time limit.";

const FINAL_ANSWER: &str = "Final Answer:";
const ACTION: &str = "Action:";
const ACTION_INPUT: &str = "Action Input:";

const SYSTEM_PREAMBLE: &str = "You are a helpful assistant with access to a document database. \
Use the available tools to retrieve relevant information and assist the user. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

const FORMAT_INSTRUCTIONS: &str = "RESPONSE FORMAT INSTRUCTIONS
----------------------------

When responding to me, please output a response in one of two formats:

**Option 1:**
Use this if you want to use a tool:
Thought: (your thought process)
Action: the action to take, should be one of [{tool_names}]
Action Input: (the input to the action)

**Option 2:**
Use this if you want to respond directly to the human:
Thought: (your thought process)
Final Answer: (your final answer to the human)

Please use Option 1 if you need to use a tool, and Option 2 if you can answer directly.
You must use the retrieve_information tool at least once before providing a Final Answer.
If the initial retrieval doesn't provide enough information, use the tool again with a refined query.
After using the tool, you must provide a Final Answer based on the information retrieved.
Always cite the source of information in your Final Answer, including the document name and page number if available.
Use the format (Source: [document name], Page: [page number]) for citations.
If multiple sources are used, cite each one.";

/// Produces the next reasoning step from a prompt.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn reason(&self, prompt: &str) -> Result<String>;
}

/// A parsed engine reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Action { tool: String, input: String },
    FinalAnswer(String),
}

/// Parse an engine reply into an action or a final answer.
///
/// Replies carrying both, neither, or an empty answer fail with `Parsing`.
pub fn parse_reply(text: &str) -> Result<Decision> {
    let action = parse_action(text);
    let answer = text
        .find(FINAL_ANSWER)
        .map(|i| text[i + FINAL_ANSWER.len()..].trim().to_string());

    match (action, answer) {
        (Some(_), Some(_)) => Err(DocentError::Parsing(
            "output contains both a final answer and a parse-able action".to_string(),
        )),
        (Some((tool, input)), None) => Ok(Decision::Action { tool, input }),
        (None, Some(answer)) if answer.is_empty() => Err(DocentError::Parsing(
            "Invalid Format: 'Final Answer:' is empty".to_string(),
        )),
        (None, Some(answer)) => Ok(Decision::FinalAnswer(answer)),
        (None, None) if text.contains(ACTION) => Err(DocentError::Parsing(
            "Invalid Format: Missing 'Action Input:' after 'Action:'".to_string(),
        )),
        (None, None) => Err(DocentError::Parsing(
            "Invalid Format: Missing 'Action:' after 'Thought:'".to_string(),
        )),
    }
}

fn parse_action(text: &str) -> Option<(String, String)> {
    let start = text.find(ACTION)? + ACTION.len();
    let rest = &text[start..];
    let split = rest.find(ACTION_INPUT)?;

    let tool = rest[..split].trim();
    if tool.is_empty() {
        return None;
    }
    let input = rest[split + ACTION_INPUT.len()..]
        .split("\nObservation")
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"')
        .to_string();
    Some((tool.to_string(), input))
}

/// What the orchestrator did with one engine reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    /// A registered tool was invoked.
    Tool { name: String, input: String },
    /// The engine named a tool that is not registered.
    UnknownTool { name: String, input: String },
    /// A final answer arrived before any tool call and was sent back.
    PrematureAnswer(String),
    /// The reply could not be parsed.
    InvalidFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStep {
    /// Raw engine reply for this step.
    pub log: String,
    pub action: StepAction,
    pub observation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    Answered,
    ForcedStop,
}

/// Result of one query: the answer text, the transcript and how the loop ended.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub output: String,
    pub steps: Vec<AgentStep>,
    pub terminal: Terminal,
}

enum LoopState {
    Thinking,
    Acting {
        tool: String,
        input: String,
        log: String,
    },
    Answering(String),
    ForcedStop,
}

pub struct Agent {
    engine: Arc<dyn ReasoningEngine>,
    tools: ToolRegistry,
    max_iterations: usize,
}

impl Agent {
    pub fn new(engine: Arc<dyn ReasoningEngine>, tools: ToolRegistry, max_iterations: usize) -> Self {
        Self {
            engine,
            tools,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Answer `question` about `context_filename`. Never fails: every error
    /// becomes [`GENERIC_FAILURE`].
    pub async fn answer(&self, question: &str, context_filename: &str) -> String {
        match self.run(question, context_filename).await {
            Ok(run) => {
                info!(
                    terminal = ?run.terminal,
                    steps = run.steps.len(),
                    "query answered"
                );
                run.output
            }
            Err(e) => {
                error!(error = %e, "error processing query");
                GENERIC_FAILURE.to_string()
            }
        }
    }

    /// Drive the loop to completion. Engine and tool failures propagate.
    pub async fn run(&self, question: &str, context_filename: &str) -> Result<AgentRun> {
        let mut steps: Vec<AgentStep> = Vec::new();
        let mut iterations = 0usize;
        let mut tool_calls = 0usize;
        let mut last_answer: Option<String> = None;
        let mut state = LoopState::Thinking;

        loop {
            state = match state {
                LoopState::Thinking if iterations >= self.max_iterations => LoopState::ForcedStop,
                LoopState::Thinking => {
                    iterations += 1;
                    let prompt = self.render_prompt(question, context_filename, &steps);
                    let reply = self.engine.reason(&prompt).await?;
                    debug!(iteration = iterations, reply = %reply, "reasoning step");

                    match parse_reply(&reply) {
                        Ok(Decision::Action { tool, input }) => LoopState::Acting {
                            tool,
                            input,
                            log: reply,
                        },
                        Ok(Decision::FinalAnswer(answer)) if tool_calls > 0 => {
                            LoopState::Answering(answer)
                        }
                        Ok(Decision::FinalAnswer(answer)) => {
                            last_answer = Some(answer.clone());
                            steps.push(AgentStep {
                                log: reply,
                                action: StepAction::PrematureAnswer(answer),
                                observation: format!(
                                    "You must use the {} tool at least once before providing a Final Answer.",
                                    RETRIEVE_INFORMATION
                                ),
                            });
                            LoopState::Thinking
                        }
                        Err(e) => {
                            debug!(error = %e, "unparsable reasoning output");
                            let observation = match e {
                                DocentError::Parsing(msg) => msg,
                                other => other.to_string(),
                            };
                            steps.push(AgentStep {
                                log: reply,
                                action: StepAction::InvalidFormat,
                                observation,
                            });
                            LoopState::Thinking
                        }
                    }
                }
                LoopState::Acting { tool, input, log } => {
                    let step = match self.tools.find(&tool) {
                        Some(t) => {
                            tool_calls += 1;
                            let observation = t.invoke(&input).await?;
                            debug!(tool = %tool, input = %input, "tool invoked");
                            AgentStep {
                                log,
                                action: StepAction::Tool { name: tool, input },
                                observation,
                            }
                        }
                        None => AgentStep {
                            log,
                            observation: format!(
                                "{} is not a valid tool, try one of [{}].",
                                tool,
                                self.tools.names()
                            ),
                            action: StepAction::UnknownTool { name: tool, input },
                        },
                    };
                    steps.push(step);
                    LoopState::Thinking
                }
                LoopState::Answering(output) => {
                    return Ok(AgentRun {
                        output,
                        steps,
                        terminal: Terminal::Answered,
                    });
                }
                LoopState::ForcedStop => {
                    info!(iterations, "iteration budget spent, stopping agent");
                    return Ok(AgentRun {
                        output: last_answer.unwrap_or_else(|| FORCED_STOP_FALLBACK.to_string()),
                        steps,
                        terminal: Terminal::ForcedStop,
                    });
                }
            };
        }
    }

    /// System instructions, the question and the transcript so far.
    fn render_prompt(&self, question: &str, context_filename: &str, steps: &[AgentStep]) -> String {
        let mut prompt = format!(
            "{}\n\n{}\n\nTools available:\n{}\n\nRemember to always cite your sources in the Final Answer.\n\n\
             Question: {}\n\nThis information comes from the file: {}\n\n\
             Please answer the question based on the given context.\n\n",
            SYSTEM_PREAMBLE,
            FORMAT_INSTRUCTIONS.replace("{tool_names}", &self.tools.names()),
            self.tools.describe(),
            question,
            context_filename,
        );
        for step in steps {
            prompt.push_str(step.log.trim_end());
            prompt.push_str("\nObservation: ");
            prompt.push_str(&step.observation);
            prompt.push('\n');
        }
        prompt.push_str("Thought:");
        prompt
    }
}
