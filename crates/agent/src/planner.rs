//! Planner — turns the goal, context, and history into the next [`Plan`].
//!
//! The model reply is coerced into the closed `Plan` sum type at the parse
//! boundary. A malformed reply gets exactly one retry with a stricter
//! instruction appended; a second failure surfaces [`PlanError::Unparsable`].

use coachloop_core::capability::CapabilitySchema;
use coachloop_core::context::UserContext;
use coachloop_core::error::{PlanError, Result};
use coachloop_core::json::{extract_json, reply_preview};
use coachloop_core::llm::{CompletionClient, CompletionOptions};
use coachloop_core::session::{IterationRecord, Plan};
use coachloop_config::AgentConfig;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

const PLANNER_SYSTEM: &str = "\
You are the planning module of a personal learning coach. Each turn you \
decide the single next action toward the user's goal.

Reply with ONE JSON object and nothing else. The object must have an \
\"action_type\" field set to exactly one of:

- \"TOOL_CALL\" — invoke a capability. Fields: \"capability\" (name), \
\"arguments\" (object matching its input schema), \"reasoning\" (one line).
- \"COMPLETE\" — the goal is achieved. Fields: \"summary\" (what was done), \
\"result\" (structured payload for the caller).
- \"CLARIFY\" — the goal is too ambiguous to act on. Field: \"question\".
- \"PLAN_APPROVAL\" — external research needs sign-off. Field: \"plan\" \
with \"goal\" and \"searches\" (array of {\"query\", \"rationale\"}).

Prefer local capabilities over external research. Ask for approval before \
anything that reaches outside the user's own content.";

const STRICT_SUFFIX: &str = "\n\nYour previous reply could not be parsed. \
Reply with ONLY the JSON object. No prose, no markdown fences, no \
explanation before or after.";

const REFLECT_SYSTEM: &str = "\
You review one step of a learning-coach agent. In two or three sentences, \
say whether the action's result moved the goal forward, whether it fits \
this learner's level and topics, and what (if anything) is still missing. \
Plain text only.";

pub struct Planner {
    client: Arc<dyn CompletionClient>,
    config: AgentConfig,
}

impl Planner {
    pub fn new(client: Arc<dyn CompletionClient>, config: AgentConfig) -> Self {
        Self { client, config }
    }

    /// Decide the next action. One stricter retry on an unparsable reply.
    pub async fn plan(
        &self,
        goal: &str,
        context: &UserContext,
        capabilities: &[CapabilitySchema],
        history: &[IterationRecord],
        last_reflection: Option<&str>,
    ) -> Result<Plan> {
        let user_prompt = self.render_prompt(goal, context, capabilities, history, last_reflection);
        let options = CompletionOptions::default().with_temperature(self.config.planner_temperature);

        let completion = self
            .client
            .complete(PLANNER_SYSTEM, &user_prompt, options.clone())
            .await
            .map_err(coachloop_core::error::Error::from)?;

        match Self::parse_plan(&completion.text) {
            Ok(plan) => Ok(plan),
            Err(first_err) => {
                warn!(error = %first_err, "Plan reply unparsable, retrying with strict instruction");
                let strict_system = format!("{PLANNER_SYSTEM}{STRICT_SUFFIX}");
                let retry = self
                    .client
                    .complete(&strict_system, &user_prompt, options)
                    .await
                    .map_err(coachloop_core::error::Error::from)?;
                Self::parse_plan(&retry.text).map_err(Into::into)
            }
        }
    }

    /// Advisory review of one step, folded into the next planning prompt.
    ///
    /// Reflection is best-effort: a failing review degrades to empty text
    /// rather than aborting the loop.
    pub async fn reflect(
        &self,
        plan: &Plan,
        observation: &str,
        goal: &str,
        context: &UserContext,
    ) -> String {
        let user_prompt = format!(
            "Goal: {goal}\nLearner: week {}, topics: {}, level: {}\n\nAction taken: {}\nResult: {observation}",
            context.week,
            context.topics_joined(),
            context.difficulty,
            plan.action_type(),
        );
        match self
            .client
            .complete(
                REFLECT_SYSTEM,
                &user_prompt,
                CompletionOptions::default().with_temperature(self.config.planner_temperature),
            )
            .await
        {
            Ok(completion) => completion.text,
            Err(e) => {
                warn!(error = %e, "Reflection failed, continuing without it");
                String::new()
            }
        }
    }

    fn parse_plan(text: &str) -> std::result::Result<Plan, PlanError> {
        let value = extract_json(text).ok_or_else(|| PlanError::Unparsable {
            preview: reply_preview(text),
        })?;
        if let Some(action) = value.get("action_type").and_then(|a| a.as_str()) {
            if !matches!(
                action,
                "TOOL_CALL" | "COMPLETE" | "CLARIFY" | "PLAN_APPROVAL"
            ) {
                return Err(PlanError::UnknownAction(action.to_string()));
            }
        }
        let plan: Plan = serde_json::from_value(value).map_err(|e| {
            debug!(error = %e, "Plan shape mismatch");
            PlanError::Unparsable {
                preview: reply_preview(text),
            }
        })?;
        Ok(plan)
    }

    fn render_prompt(
        &self,
        goal: &str,
        context: &UserContext,
        capabilities: &[CapabilitySchema],
        history: &[IterationRecord],
        last_reflection: Option<&str>,
    ) -> String {
        let mut prompt = format!(
            "GOAL: {goal}\n\nLEARNER:\n- id: {}\n- week: {}\n- topics: {}\n- level: {}\n",
            context.user_id,
            context.week,
            context.topics_joined(),
            context.difficulty,
        );

        prompt.push_str("\nCAPABILITIES:\n");
        for schema in capabilities {
            let approval = if schema.requires_approval {
                " (requires approval)"
            } else {
                ""
            };
            let _ = writeln!(
                prompt,
                "- {}{approval}: {}\n  input: {}",
                schema.name, schema.description, schema.input_schema
            );
        }

        if history.is_empty() {
            prompt.push_str("\nHISTORY: none yet. This is iteration 1.\n");
        } else {
            prompt.push_str("\nHISTORY:\n");
            for record in history {
                let _ = writeln!(
                    prompt,
                    "{}. {} -> {}",
                    record.iteration,
                    record.plan.action_type(),
                    record.observation
                );
            }
        }

        if let Some(reflection) = last_reflection.filter(|r| !r.trim().is_empty()) {
            let _ = writeln!(prompt, "\nLAST REVIEW: {reflection}");
        }

        prompt.push_str("\nDecide the next action. Reply with one JSON object.");
        prompt
    }
}
