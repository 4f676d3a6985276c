use crate::error::LlmError;
use crate::executor::{execute_plan, Execution};
use crate::llm::narrator::{run_narrator, unsupported_amounts, Facts};
use crate::llm::prompts::fallback_system_prompt;
use crate::llm::router::run_router;
use crate::llm::types::{ChatMessage, LlmClient};
use crate::plan::{validate_plan, Plan};
use crate::summary::TableSummary;
use crate::table::TransactionTable;
use chrono::NaiveDate;
use log::{debug, info};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerMode {
    Tools,
    /// No tool fits; the caller should use another strategy.
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolAnswer {
    pub mode: AnswerMode,
    pub plan: Plan,
    pub errors: Vec<String>,
    pub execution: Option<Execution>,
    /// Empty in fallback mode.
    pub answer: String,
    /// Currency amounts in `answer` that the facts do not contain.
    pub unsupported_amounts: Vec<f64>,
}

impl ToolAnswer {
    fn fallback(plan: Plan, errors: Vec<String>) -> Self {
        Self {
            mode: AnswerMode::Fallback,
            plan,
            errors,
            execution: None,
            answer: String::new(),
            unsupported_amounts: Vec::new(),
        }
    }
}

/// Router, validator, executor and narrator in sequence.
///
/// At most two model calls. Model failures are returned to the caller; an
/// empty tool result is still narrated.
pub fn answer_with_tools(
    table: &TransactionTable,
    user_input: &str,
    llm: &dyn LlmClient,
    router_model: &str,
    narrator_model: &str,
    today: NaiveDate,
    timezone: &str,
) -> Result<ToolAnswer, LlmError> {
    let raw = run_router(llm, user_input, router_model, today, timezone)?;
    let validation = validate_plan(&raw, today);
    let plan = validation.plan;
    let errors = validation.errors;

    if plan.is_none() {
        debug!("Router chose no tool for '{}'", user_input);
        return Ok(ToolAnswer::fallback(plan, errors));
    }

    let execution = execute_plan(table, &plan);
    info!("Plan {} executed", plan.tool);

    let answer = run_narrator(llm, user_input, &execution, narrator_model)?;
    let facts = serde_json::to_value(Facts::new(user_input, &execution)).unwrap_or_default();
    let unsupported = unsupported_amounts(&answer, &facts);

    Ok(ToolAnswer {
        mode: AnswerMode::Tools,
        plan,
        errors,
        execution: Some(execution),
        answer,
        unsupported_amounts: unsupported,
    })
}

/// Answers from a whole-table summary when no tool applies.
pub fn answer_with_summary(
    table: &TransactionTable,
    user_input: &str,
    llm: &dyn LlmClient,
    model: &str,
    today: NaiveDate,
) -> Result<String, LlmError> {
    let summary = TableSummary::from_table(table);
    let json = serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string());
    let context = format!(
        "The user's transaction data:\n\nJSON:\n{}\n\nText:\n{}",
        json,
        summary.to_text()
    );

    let messages = [
        ChatMessage::system(fallback_system_prompt(today)),
        ChatMessage::system(context),
        ChatMessage::user(user_input),
    ];
    let text = llm.generate(&messages, model)?;
    let text = text.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_string())
}
