use crate::error::LlmError;
use crate::executor::Execution;
use crate::llm::prompts::NARRATOR_SYSTEM_PROMPT;
use crate::llm::types::{ChatMessage, LlmClient};
use crate::plan::ToolName;
use crate::tools::ToolResult;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;

static PREFIXED_AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"€\s?(\d+(?:[.,]\d+)*)").unwrap());

static SUFFIXED_AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)*)\s?(€|eur\b)").unwrap());

/// Everything the narrator may cite.
#[derive(Debug, Clone, Serialize)]
pub struct Facts<'a> {
    pub user_query: &'a str,
    pub tool: ToolName,
    pub args: &'a Map<String, Value>,
    pub result: Option<&'a ToolResult>,
}

impl<'a> Facts<'a> {
    pub fn new(user_query: &'a str, execution: &'a Execution) -> Self {
        Self {
            user_query,
            tool: execution.tool,
            args: &execution.args,
            result: execution.result.as_ref(),
        }
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Phrases an execution as an answer to `query`.
pub fn run_narrator(
    llm: &dyn LlmClient,
    query: &str,
    execution: &Execution,
    model: &str,
) -> Result<String, LlmError> {
    let facts = Facts::new(query, execution);
    let messages = [
        ChatMessage::system(NARRATOR_SYSTEM_PROMPT.trim()),
        ChatMessage::user(format!("FACTS:\n{}", facts.to_pretty_json())),
    ];
    llm.generate(&messages, model)
}

/// Currency amounts written in `narration` that appear nowhere in `facts`.
///
/// Recognises `€12.50`, `12,50 €` and `12.50 EUR`; comparison is at cent
/// precision and ignores sign.
pub fn unsupported_amounts(narration: &str, facts: &Value) -> Vec<f64> {
    let mut known = HashSet::new();
    collect_cents(facts, &mut known);

    let mut seen = HashSet::new();
    let mut unsupported = Vec::new();
    for raw in currency_amounts(narration) {
        let Some(amount) = parse_amount(raw) else {
            continue;
        };
        let cents = to_cents(amount);
        if !known.contains(&cents) && seen.insert(cents) {
            unsupported.push(amount);
        }
    }
    unsupported
}

/// Number texts carrying a currency marker, in order of appearance.
///
/// A `€` directly before a number belongs to that number, so `3 €99.00`
/// yields `99.00` and never `3`.
fn currency_amounts(narration: &str) -> Vec<&str> {
    let prefixed: Vec<(usize, usize, &str)> = PREFIXED_AMOUNT_RE
        .captures_iter(narration)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.start(), whole.end(), caps.get(1)?.as_str()))
        })
        .collect();

    let mut found: Vec<(usize, &str)> = prefixed
        .iter()
        .map(|&(start, _, raw)| (start, raw))
        .collect();
    for caps in SUFFIXED_AMOUNT_RE.captures_iter(narration) {
        let (Some(number), Some(marker)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let claimed = prefixed.iter().any(|&(start, end, _)| {
            marker.start() == start || (start..end).contains(&number.start())
        });
        if !claimed {
            found.push((number.start(), number.as_str()));
        }
    }

    found.sort_by_key(|&(start, _)| start);
    found.into_iter().map(|(_, raw)| raw).collect()
}

fn to_cents(amount: f64) -> i64 {
    (amount.abs() * 100.0).round() as i64
}

fn collect_cents(value: &Value, out: &mut HashSet<i64>) {
    match value {
        Value::Number(n) => {
            if let Some(x) = n.as_f64() {
                out.insert(to_cents(x));
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_cents(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_cents(v, out)),
        _ => {}
    }
}

/// Reads `1,234.56`, `1.234,56`, `12,50` and `12.50`.
fn parse_amount(raw: &str) -> Option<f64> {
    let raw = raw.trim_end_matches(['.', ',']);
    let last_comma = raw.rfind(',');
    let last_dot = raw.rfind('.');
    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => raw.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => raw.replace(',', ""),
        (Some(c), None) => {
            let decimals = raw.len() - c - 1;
            if raw.matches(',').count() == 1 && decimals <= 2 {
                raw.replace(',', ".")
            } else {
                raw.replace(',', "")
            }
        }
        (None, Some(_)) if raw.matches('.').count() > 1 => raw.replace('.', ""),
        _ => raw.to_string(),
    };
    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("12.50"), Some(12.5));
        assert_eq!(parse_amount("12,50"), Some(12.5));
        assert_eq!(parse_amount("1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("1.234,56"), Some(1234.56));
        assert_eq!(parse_amount("2,618"), Some(2618.0));
        assert_eq!(parse_amount("30."), Some(30.0));
    }

    #[test]
    fn test_supported_amounts_pass() {
        let facts = json!({"result": {"summary": {"sum_eur": 30.0, "avg_eur": 15.0}}});
        let narration = "You spent €30.00 at Prisma, on average 15,00 € per visit.";
        assert!(unsupported_amounts(narration, &facts).is_empty());
    }

    #[test]
    fn test_invented_amounts_flagged() {
        let facts = json!({"result": {"summary": {"sum_eur": 30.0}}});
        let narration = "Total €30.00. Cutting back could save 12.75 EUR, or even €12.75 monthly.";
        assert_eq!(unsupported_amounts(narration, &facts), vec![12.75]);
    }

    #[test]
    fn test_bare_numbers_ignored() {
        let facts = json!({});
        assert!(unsupported_amounts("You made 3 purchases in 2025.", &facts).is_empty());
    }

    #[test]
    fn test_year_before_amount_is_not_an_amount() {
        let facts = json!({"result": {"summary": {"sum_eur": 18.0}}});
        let narration = "In February 2025, €18.00 went to Prisma.";
        assert!(unsupported_amounts(narration, &facts).is_empty());
    }

    #[test]
    fn test_euro_sign_binds_to_following_number() {
        let facts = json!({"result": {"summary": {"sum_eur": 30.0}}});
        let narration = "You made 3 €99.00 purchases.";
        assert_eq!(unsupported_amounts(narration, &facts), vec![99.0]);
    }

    #[test]
    fn test_amount_with_both_markers_counted_once() {
        let facts = json!({});
        assert_eq!(unsupported_amounts("€12.50 EUR", &facts), vec![12.5]);
        assert_eq!(currency_amounts("Paid 1.234,56 € and €7."), vec!["1.234,56", "7"]);
    }

    #[test]
    fn test_facts_payload_shape() {
        let execution = Execution {
            tool: ToolName::None,
            args: Map::new(),
            result: None,
        };
        let facts = Facts::new("hello", &execution);
        let value: Value = serde_json::from_str(&facts.to_pretty_json()).unwrap();
        assert_eq!(
            value,
            json!({"user_query": "hello", "tool": "none", "args": {}, "result": null})
        );
    }
}
