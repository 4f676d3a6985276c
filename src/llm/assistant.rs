use crate::config::AssistantConfig;
use crate::error::Result;
use crate::executor::Execution;
use crate::llm::agent::{answer_with_summary, answer_with_tools, AnswerMode};
use crate::llm::types::LlmClient;
use crate::order_query::try_order_query;
use crate::period::today_in;
use crate::plan::Plan;
use crate::table::TransactionTable;
use chrono::NaiveDate;
use chrono_tz::Tz;
use log::{info, warn};
use serde::Serialize;

/// Which strategy produced a [`TurnAnswer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    FastPath,
    Tools,
    Fallback,
    /// Every strategy failed; `text` explains briefly.
    Diagnostic,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnAnswer {
    pub source: AnswerSource,
    pub text: String,
    /// The validated plan, when the router was consulted.
    pub plan: Option<Plan>,
    pub execution: Option<Execution>,
}

/// Answers one question per call: fast path, then tools, then the summary
/// fallback. Never fails a turn.
pub struct QueryAssistant<L: LlmClient> {
    llm: L,
    config: AssistantConfig,
    tz: Tz,
}

impl<L: LlmClient> QueryAssistant<L> {
    pub fn new(llm: L, config: AssistantConfig) -> Result<Self> {
        config.validate()?;
        let tz = config.tz()?;
        Ok(Self { llm, config, tz })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Answers with today's date in the configured timezone.
    pub fn answer(&self, table: &TransactionTable, query: &str) -> TurnAnswer {
        self.answer_on(table, query, today_in(self.tz))
    }

    pub fn answer_on(&self, table: &TransactionTable, query: &str, today: NaiveDate) -> TurnAnswer {
        if let Some(text) = try_order_query(table, query) {
            info!("Answered '{}' from the order fast path", query);
            return TurnAnswer {
                source: AnswerSource::FastPath,
                text,
                plan: None,
                execution: None,
            };
        }

        let mut plan = None;
        match answer_with_tools(
            table,
            query,
            &self.llm,
            &self.config.router_model,
            &self.config.narrator_model,
            today,
            &self.config.timezone,
        ) {
            Ok(tools) if tools.mode == AnswerMode::Tools && !tools.answer.trim().is_empty() => {
                if !tools.unsupported_amounts.is_empty() {
                    warn!(
                        "Narration cites amounts missing from the facts: {:?}",
                        tools.unsupported_amounts
                    );
                }
                info!("Answered '{}' with tool {}", query, tools.plan.tool);
                return TurnAnswer {
                    source: AnswerSource::Tools,
                    text: tools.answer.trim().to_string(),
                    plan: Some(tools.plan),
                    execution: tools.execution,
                };
            }
            Ok(tools) => {
                info!("No tool answer for '{}', using summary fallback", query);
                plan = Some(tools.plan);
            }
            Err(e) => warn!("Tools path failed, using summary fallback: {}", e),
        }

        match answer_with_summary(table, query, &self.llm, &self.config.fallback_model, today) {
            Ok(text) => TurnAnswer {
                source: AnswerSource::Fallback,
                text,
                plan,
                execution: None,
            },
            Err(e) => {
                warn!("Summary fallback failed: {}", e);
                TurnAnswer {
                    source: AnswerSource::Diagnostic,
                    text: format!(
                        "Sorry, I could not answer that right now: {}",
                        e.user_message()
                    ),
                    plan,
                    execution: None,
                }
            }
        }
    }
}
