//! Tool vocabulary, plans, and the validator that sanitizes untrusted plans.
//!
//! A plan arrives as an arbitrary JSON value produced by a language model.
//! [`validate_plan`] is total: whatever the input, it returns a well-formed
//! [`Plan`] whose arguments match the chosen tool's schema, plus the list of
//! problems it corrected along the way.

use crate::period::expand_period;
use chrono::NaiveDate;
use log::debug;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::LazyLock;

pub const DEFAULT_LATEST_N: usize = 1;
pub const DEFAULT_LATEST_OFFSET: usize = 0;
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MIN_AMOUNT: f64 = 100.0;
pub const DEFAULT_MONTHS: u32 = 6;
pub const DEFAULT_MIN_COUNT: usize = 3;
pub const DEFAULT_GROUP_FIELD: &str = "category";

const MAX_TEXT_LEN: usize = 60;
const MAX_FIELD_NAME_LEN: usize = 30;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap());

/// The closed set of operations a plan may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Sentinel for "no safe plan"; never executed.
    None,
    GetLatest,
    SumByMerchant,
    SumByCategory,
    TopTransactions,
    GroupByMonth,
    OutliersLarge,
    RecurringMerchants,
    MerchantBreakdown,
    CategoryTrend,
}

impl ToolName {
    pub const ALL: [ToolName; 10] = [
        ToolName::None,
        ToolName::GetLatest,
        ToolName::SumByMerchant,
        ToolName::SumByCategory,
        ToolName::TopTransactions,
        ToolName::GroupByMonth,
        ToolName::OutliersLarge,
        ToolName::RecurringMerchants,
        ToolName::MerchantBreakdown,
        ToolName::CategoryTrend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::None => "none",
            ToolName::GetLatest => "get_latest",
            ToolName::SumByMerchant => "sum_by_merchant",
            ToolName::SumByCategory => "sum_by_category",
            ToolName::TopTransactions => "top_transactions",
            ToolName::GroupByMonth => "group_by_month",
            ToolName::OutliersLarge => "outliers_large",
            ToolName::RecurringMerchants => "recurring_merchants",
            ToolName::MerchantBreakdown => "merchant_breakdown",
            ToolName::CategoryTrend => "category_trend",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Argument list as shown to the router model; `?` marks optional fields.
    pub fn signature(&self) -> &'static str {
        match self {
            ToolName::None => "none",
            ToolName::GetLatest => "get_latest (n, offset)",
            ToolName::SumByMerchant => {
                "sum_by_merchant (merchant_substr, period?, start_date?, end_date?)"
            }
            ToolName::SumByCategory => "sum_by_category (category, period?, start_date?, end_date?)",
            ToolName::TopTransactions => {
                "top_transactions (n, period?, start_date?, end_date?, category?, merchant_substr?)"
            }
            ToolName::GroupByMonth => {
                "group_by_month (period?, start_date?, end_date?, field?, top_k?)"
            }
            ToolName::OutliersLarge => "outliers_large (min_amount, period?, start_date?, end_date?)",
            ToolName::RecurringMerchants => "recurring_merchants (months, min_count)",
            ToolName::MerchantBreakdown => {
                "merchant_breakdown (merchant_substr, by?, period?, start_date?, end_date?)"
            }
            ToolName::CategoryTrend => "category_trend (category, months)",
        }
    }

    fn fields(&self) -> &'static [FieldSpec] {
        match self {
            ToolName::None => &[],
            ToolName::GetLatest => GET_LATEST_FIELDS,
            ToolName::SumByMerchant => SUM_BY_MERCHANT_FIELDS,
            ToolName::SumByCategory => SUM_BY_CATEGORY_FIELDS,
            ToolName::TopTransactions => TOP_TRANSACTIONS_FIELDS,
            ToolName::GroupByMonth => GROUP_BY_MONTH_FIELDS,
            ToolName::OutliersLarge => OUTLIERS_LARGE_FIELDS,
            ToolName::RecurringMerchants => RECURRING_MERCHANTS_FIELDS,
            ToolName::MerchantBreakdown => MERCHANT_BREAKDOWN_FIELDS,
            ToolName::CategoryTrend => CATEGORY_TREND_FIELDS,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool name plus its argument mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub tool: ToolName,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl Plan {
    pub fn none() -> Self {
        Self {
            tool: ToolName::None,
            args: Map::new(),
        }
    }

    pub fn is_none(&self) -> bool {
        self.tool == ToolName::None
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("tool".to_string(), Value::String(self.tool.as_str().to_string()));
        obj.insert("args".to_string(), Value::Object(self.args.clone()));
        Value::Object(obj)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanValidation {
    /// True when the plan names a real tool and nothing had to be corrected.
    pub ok: bool,
    pub plan: Plan,
    pub errors: Vec<String>,
}

enum TextRule {
    /// Empty value rejects the whole plan.
    Required,
    /// Empty value becomes null.
    Optional,
    /// Empty value becomes the given default.
    Defaulted(&'static str),
}

enum FieldRule {
    Int { default: i64, lo: i64, hi: i64 },
    Float { default: f64, lo: f64, hi: f64 },
    Text { max_len: usize, rule: TextRule },
    Date,
}

struct FieldSpec {
    name: &'static str,
    rule: FieldRule,
}

const fn int(name: &'static str, default: i64, lo: i64, hi: i64) -> FieldSpec {
    FieldSpec {
        name,
        rule: FieldRule::Int { default, lo, hi },
    }
}

const fn text(name: &'static str, max_len: usize, rule: TextRule) -> FieldSpec {
    FieldSpec {
        name,
        rule: FieldRule::Text { max_len, rule },
    }
}

const fn date(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        rule: FieldRule::Date,
    }
}

const GET_LATEST_FIELDS: &[FieldSpec] = &[
    int("n", DEFAULT_LATEST_N as i64, 1, 10),
    int("offset", DEFAULT_LATEST_OFFSET as i64, 0, 50),
];

const SUM_BY_MERCHANT_FIELDS: &[FieldSpec] = &[
    text("merchant_substr", MAX_TEXT_LEN, TextRule::Required),
    date("start_date"),
    date("end_date"),
];

const SUM_BY_CATEGORY_FIELDS: &[FieldSpec] = &[
    text("category", MAX_TEXT_LEN, TextRule::Required),
    date("start_date"),
    date("end_date"),
];

const TOP_TRANSACTIONS_FIELDS: &[FieldSpec] = &[
    int("n", DEFAULT_TOP_N as i64, 1, 50),
    date("start_date"),
    date("end_date"),
    text("category", MAX_TEXT_LEN, TextRule::Optional),
    text("merchant_substr", MAX_TEXT_LEN, TextRule::Optional),
];

const GROUP_BY_MONTH_FIELDS: &[FieldSpec] = &[
    date("start_date"),
    date("end_date"),
    text(
        "field",
        MAX_FIELD_NAME_LEN,
        TextRule::Defaulted(DEFAULT_GROUP_FIELD),
    ),
    int("top_k", DEFAULT_TOP_K as i64, 1, 10),
];

const OUTLIERS_LARGE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "min_amount",
        rule: FieldRule::Float {
            default: DEFAULT_MIN_AMOUNT,
            lo: 0.0,
            hi: 1_000_000.0,
        },
    },
    date("start_date"),
    date("end_date"),
];

const RECURRING_MERCHANTS_FIELDS: &[FieldSpec] = &[
    int("months", DEFAULT_MONTHS as i64, 1, 24),
    int("min_count", DEFAULT_MIN_COUNT as i64, 2, 20),
];

const MERCHANT_BREAKDOWN_FIELDS: &[FieldSpec] = &[
    text("merchant_substr", MAX_TEXT_LEN, TextRule::Required),
    text(
        "by",
        MAX_FIELD_NAME_LEN,
        TextRule::Defaulted(DEFAULT_GROUP_FIELD),
    ),
    date("start_date"),
    date("end_date"),
];

const CATEGORY_TREND_FIELDS: &[FieldSpec] = &[
    text("category", MAX_TEXT_LEN, TextRule::Required),
    int("months", DEFAULT_MONTHS as i64, 1, 24),
];

/// Sanitizes an untrusted plan. Never fails.
///
/// Relative `period` tokens are expanded against `today` before the
/// date fields are checked. The returned plan only carries the fields of
/// the chosen tool's schema. Callers execute the plan whenever its tool is
/// not `none`, even if `ok` is false.
pub fn validate_plan(raw: &Value, today: NaiveDate) -> PlanValidation {
    let mut errors = Vec::new();

    let Some(obj) = raw.as_object() else {
        errors.push("plan must be an object".to_string());
        return finish(Plan::none(), errors);
    };

    let tool = match obj.get("tool") {
        None | Some(Value::Null) => Some(ToolName::None),
        Some(Value::String(name)) if name.trim().is_empty() => Some(ToolName::None),
        Some(Value::String(name)) => {
            let name = name.trim();
            let tool = ToolName::parse(name);
            if tool.is_none() {
                errors.push(format!("Unknown tool: {}", truncate_chars(name, MAX_TEXT_LEN)));
            }
            tool
        }
        Some(other) => {
            errors.push(format!(
                "Unknown tool: {}",
                truncate_chars(&other.to_string(), MAX_TEXT_LEN)
            ));
            None
        }
    };
    let Some(tool) = tool else {
        return finish(Plan::none(), errors);
    };

    let mut args = match obj.get("args") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args.clone(),
        Some(_) => {
            errors.push("args must be an object".to_string());
            Map::new()
        }
    };

    if let Some(period) = args.get("period") {
        let normalized = match period {
            Value::Null => Value::Null,
            other => Value::String(stringify(other).trim().to_string()),
        };
        args.insert("period".to_string(), normalized);
        args = expand_period(args, today);
    }

    let mut cleaned = Map::new();
    for field in tool.fields() {
        let value = args.get(field.name);
        let sanitized = match &field.rule {
            FieldRule::Int { default, lo, hi } => {
                let n = match value {
                    None => *default,
                    Some(v) => coerce_int(v).unwrap_or_else(|| {
                        errors.push(format!("{} must be int", field.name));
                        *default
                    }),
                };
                Value::from(n.clamp(*lo, *hi))
            }
            FieldRule::Float { default, lo, hi } => {
                let x = match value {
                    None => *default,
                    Some(v) => coerce_float(v).unwrap_or_else(|| {
                        errors.push(format!("{} must be number", field.name));
                        *default
                    }),
                };
                Value::from(x.clamp(*lo, *hi))
            }
            FieldRule::Text { max_len, rule } => {
                let s = value.map(normalize_text(*max_len)).unwrap_or_default();
                match (s.is_empty(), rule) {
                    (true, TextRule::Required) => {
                        errors.push(format!("{} required", field.name));
                        return finish(Plan::none(), errors);
                    }
                    (true, TextRule::Optional) => Value::Null,
                    (true, TextRule::Defaulted(default)) => Value::String((*default).to_string()),
                    (false, _) => Value::String(s),
                }
            }
            FieldRule::Date => match value.map(stringify) {
                None => Value::Null,
                Some(s) if s.trim().is_empty() => Value::Null,
                Some(s) if DATE_RE.is_match(s.trim()) => Value::String(s.trim().to_string()),
                Some(_) => {
                    errors.push(format!("{} must be YYYY-MM-DD", field.name));
                    Value::Null
                }
            },
        };
        cleaned.insert(field.name.to_string(), sanitized);
    }

    finish(
        Plan {
            tool,
            args: cleaned,
        },
        errors,
    )
}

fn finish(plan: Plan, errors: Vec<String>) -> PlanValidation {
    if !errors.is_empty() {
        debug!("Plan for '{}' corrected: {}", plan.tool, errors.join("; "));
    }
    PlanValidation {
        ok: plan.tool != ToolName::None && errors.is_empty(),
        plan,
        errors,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn normalize_text(max_len: usize) -> impl Fn(&Value) -> String {
    move |value| {
        let s = stringify(value);
        truncate_chars(s.trim(), max_len).trim_end().to_string()
    }
}

fn truncate_chars(s: &str, max_len: usize) -> &str {
    match s.char_indices().nth(max_len) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|x| x.is_finite()).map(|x| x.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    let x = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    x.is_finite().then_some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn validate(raw: Value) -> PlanValidation {
        validate_plan(&raw, today())
    }

    #[test]
    fn test_get_latest_defaults_and_clamps() {
        let v = validate(json!({"tool": "get_latest", "args": {}}));
        assert!(v.ok);
        assert_eq!(v.plan.args, json!({"n": 1, "offset": 0}).as_object().cloned().unwrap());

        let v = validate(json!({"tool": "get_latest", "args": {"n": 99, "offset": -4}}));
        assert!(v.ok);
        assert_eq!(v.plan.args["n"], 10);
        assert_eq!(v.plan.args["offset"], 0);
    }

    #[test]
    fn test_int_coercion_accepts_strings_and_floats() {
        let v = validate(json!({"tool": "get_latest", "args": {"n": " 3 ", "offset": 2.9}}));
        assert!(v.ok);
        assert_eq!(v.plan.args["n"], 3);
        assert_eq!(v.plan.args["offset"], 2);
    }

    #[test]
    fn test_int_coercion_failure_records_error_and_defaults() {
        let v = validate(json!({"tool": "get_latest", "args": {"n": "three", "offset": null}}));
        assert!(!v.ok);
        assert_eq!(v.plan.tool, ToolName::GetLatest);
        assert_eq!(v.plan.args["n"], 1);
        assert_eq!(v.plan.args["offset"], 0);
        assert_eq!(v.errors, vec!["n must be int", "offset must be int"]);
    }

    #[test]
    fn test_unknown_tool_becomes_none() {
        let v = validate(json!({"tool": "drop_table", "args": {"n": 1}}));
        assert!(!v.ok);
        assert_eq!(v.plan, Plan::none());
        assert_eq!(v.errors, vec!["Unknown tool: drop_table"]);
    }

    #[test]
    fn test_missing_tool_is_none_without_error() {
        let v = validate(json!({}));
        assert!(!v.ok);
        assert!(v.plan.is_none());
        assert!(v.errors.is_empty());
    }

    #[test]
    fn test_non_object_args_are_replaced() {
        let v = validate(json!({"tool": "recurring_merchants", "args": [1, 2]}));
        assert_eq!(v.plan.tool, ToolName::RecurringMerchants);
        assert_eq!(v.plan.args["months"], 6);
        assert_eq!(v.plan.args["min_count"], 3);
        assert_eq!(v.errors, vec!["args must be an object"]);
    }

    #[test]
    fn test_required_merchant_missing_rejects_plan() {
        for args in [json!({}), json!({"merchant_substr": "   "}), json!({"merchant_substr": null})] {
            let v = validate(json!({"tool": "sum_by_merchant", "args": args}));
            assert!(!v.ok);
            assert_eq!(v.plan.tool, ToolName::None);
            assert!(v.plan.args.is_empty());
            assert_eq!(v.errors, vec!["merchant_substr required"]);
        }
    }

    #[test]
    fn test_required_category_missing_rejects_category_tools() {
        for tool in ["sum_by_category", "category_trend"] {
            let v = validate(json!({"tool": tool, "args": {"category": ""}}));
            assert_eq!(v.plan.tool, ToolName::None);
        }
        let v = validate(json!({"tool": "merchant_breakdown", "args": {"by": "card"}}));
        assert_eq!(v.plan.tool, ToolName::None);
    }

    #[test]
    fn test_period_is_expanded_before_date_checks() {
        let v = validate(json!({
            "tool": "sum_by_merchant",
            "args": {"merchant_substr": "Prisma", "period": " last_month "}
        }));
        assert!(v.ok);
        assert_eq!(v.plan.args["start_date"], "2025-05-01");
        assert_eq!(v.plan.args["end_date"], "2025-05-31");
        assert!(v.plan.args.get("period").is_none());
    }

    #[test]
    fn test_unknown_period_fails_open() {
        let v = validate(json!({
            "tool": "sum_by_category",
            "args": {"category": "Groceries", "period": "someday"}
        }));
        assert!(v.ok);
        assert_eq!(v.plan.args["start_date"], Value::Null);
        assert_eq!(v.plan.args["end_date"], Value::Null);
    }

    #[test]
    fn test_malformed_dates_are_nulled() {
        let v = validate(json!({
            "tool": "outliers_large",
            "args": {"min_amount": "250", "start_date": "2025/01/01", "end_date": "2025-02-01"}
        }));
        assert!(!v.ok);
        assert_eq!(v.plan.args["min_amount"], 250.0);
        assert_eq!(v.plan.args["start_date"], Value::Null);
        assert_eq!(v.plan.args["end_date"], "2025-02-01");
        assert_eq!(v.errors, vec!["start_date must be YYYY-MM-DD"]);
    }

    #[test]
    fn test_float_clamped_and_non_finite_rejected() {
        let v = validate(json!({"tool": "outliers_large", "args": {"min_amount": 5e9}}));
        assert_eq!(v.plan.args["min_amount"], 1_000_000.0);

        let v = validate(json!({"tool": "outliers_large", "args": {"min_amount": "NaN"}}));
        assert_eq!(v.plan.args["min_amount"], DEFAULT_MIN_AMOUNT);
        assert_eq!(v.errors, vec!["min_amount must be number"]);
    }

    #[test]
    fn test_strings_trimmed_and_capped() {
        let long = "x".repeat(200);
        let v = validate(json!({"tool": "sum_by_merchant", "args": {"merchant_substr": long}}));
        assert_eq!(v.plan.args["merchant_substr"].as_str().unwrap().chars().count(), 60);

        let v = validate(json!({"tool": "group_by_month", "args": {"field": "  ", "top_k": 0}}));
        assert_eq!(v.plan.args["field"], "category");
        assert_eq!(v.plan.args["top_k"], 1);
    }

    #[test]
    fn test_optional_filters_become_null() {
        let v = validate(json!({
            "tool": "top_transactions",
            "args": {"n": 5, "category": "", "merchant_substr": " Lidl "}
        }));
        assert!(v.ok);
        assert_eq!(v.plan.args["category"], Value::Null);
        assert_eq!(v.plan.args["merchant_substr"], "Lidl");
    }

    #[test]
    fn test_extraneous_arguments_are_dropped() {
        let v = validate(json!({
            "tool": "category_trend",
            "args": {"category": "Groceries", "months": 3, "sql": "DROP TABLE"}
        }));
        assert!(v.ok);
        assert!(v.plan.args.get("sql").is_none());
    }

    #[test]
    fn test_never_fails_on_hostile_shapes() {
        let inputs = vec![
            json!(null),
            json!("get_latest"),
            json!([{"tool": "get_latest"}]),
            json!({"tool": 42}),
            json!({"tool": {"nested": true}, "args": "x"}),
            json!({"tool": "get_latest", "args": {"n": [1], "offset": {"a": 1}}}),
            json!({"tool": "group_by_month", "args": {"period": ["this_month"], "top_k": true}}),
            json!({"tool": "sum_by_merchant", "args": {"merchant_substr": {"$ne": null}}}),
            json!({"tool": "recurring_merchants", "args": {"months": 1e308, "min_count": -1e308}}),
        ];
        for input in inputs {
            let v = validate(input);
            assert_eq!(v.ok, v.plan.tool != ToolName::None && v.errors.is_empty());
        }
    }

    #[test]
    fn test_validation_is_idempotent() {
        let inputs = vec![
            json!({"tool": "get_latest", "args": {"n": "7", "offset": 100}}),
            json!({"tool": "sum_by_merchant", "args": {"merchant_substr": format!(" {}  tail", "a".repeat(57)), "period": "this_year"}}),
            json!({"tool": "top_transactions", "args": {"n": 0.5, "start_date": "bad"}}),
            json!({"tool": "group_by_month", "args": {"field": "", "top_k": "x"}}),
            json!({"tool": "outliers_large", "args": {"min_amount": 12}}),
            json!({"tool": "merchant_breakdown", "args": {"merchant_substr": "K-", "by": null}}),
            json!({"tool": "nope"}),
        ];
        for input in inputs {
            let first = validate(input);
            let second = validate(first.plan.to_value());
            assert_eq!(first.plan, second.plan);
            assert!(second.errors.is_empty());
        }
    }
}
