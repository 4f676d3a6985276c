use crate::error::LlmError;
use crate::llm::prompts::router_system_prompt;
use crate::llm::types::{ChatMessage, LlmClient};
use chrono::NaiveDate;
use log::debug;
use serde_json::{json, Value};

/// The JSON object in `text`: the whole trimmed text when it is braced,
/// otherwise the span from the first `{` to the last `}`.
fn extract_json(text: &str) -> Option<&str> {
    let text = text.trim();
    if text.starts_with('{') && text.ends_with('}') {
        return Some(text);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Parses raw router output. Anything unparseable becomes the `none` plan.
pub fn parse_router_output(text: &str) -> Value {
    let raw = extract_json(text).unwrap_or("{}");
    serde_json::from_str(raw).unwrap_or_else(|e| {
        debug!("Router output is not JSON ({}): {}", e, text);
        json!({"tool": "none", "args": {}})
    })
}

/// Asks the router model for a plan. The result is untrusted and must go
/// through [`crate::plan::validate_plan`].
pub fn run_router(
    llm: &dyn LlmClient,
    query: &str,
    model: &str,
    today: NaiveDate,
    timezone: &str,
) -> Result<Value, LlmError> {
    let messages = [
        ChatMessage::system(router_system_prompt(today, timezone)),
        ChatMessage::user(query),
    ];
    let text = llm.generate(&messages, model)?;
    Ok(parse_router_output(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_clean_json() {
        let plan = parse_router_output(r#" {"tool":"get_latest","args":{"n":2}} "#);
        assert_eq!(plan, json!({"tool": "get_latest", "args": {"n": 2}}));
    }

    #[test]
    fn test_extracts_json_from_chatter() {
        let text = "Sure! Here is the plan:\n```json\n{\"tool\":\"none\",\"args\":{}}\n```\nHope it helps.";
        assert_eq!(parse_router_output(text), json!({"tool": "none", "args": {}}));
    }

    #[test]
    fn test_garbage_becomes_none_plan() {
        assert_eq!(
            parse_router_output("{not json at all}"),
            json!({"tool": "none", "args": {}})
        );
        assert_eq!(parse_router_output("} backwards {"), json!({}));
    }

    #[test]
    fn test_no_braces_yields_empty_object() {
        assert_eq!(parse_router_output("I cannot help with that."), json!({}));
        assert_eq!(parse_router_output(""), json!({}));
    }
}
