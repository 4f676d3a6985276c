use crate::plan::{Plan, ToolName};
use crate::table::TransactionTable;
use crate::tools::{
    self, CategorySumArgs, CategoryTrendArgs, GroupByMonthArgs, LatestArgs,
    MerchantBreakdownArgs, MerchantSumArgs, OutliersArgs, RecurringArgs, ToolResult,
    TopTransactionsArgs,
};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// A plan bound to typed arguments for one tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    GetLatest(LatestArgs),
    SumByMerchant(MerchantSumArgs),
    SumByCategory(CategorySumArgs),
    TopTransactions(TopTransactionsArgs),
    GroupByMonth(GroupByMonthArgs),
    OutliersLarge(OutliersArgs),
    RecurringMerchants(RecurringArgs),
    MerchantBreakdown(MerchantBreakdownArgs),
    CategoryTrend(CategoryTrendArgs),
}

impl ToolCall {
    /// `None` for the `none` tool or when the arguments do not fit the tool.
    pub fn from_plan(plan: &Plan) -> Option<Self> {
        let args = &plan.args;
        match plan.tool {
            ToolName::None => None,
            ToolName::GetLatest => typed(args).map(ToolCall::GetLatest),
            ToolName::SumByMerchant => typed(args).map(ToolCall::SumByMerchant),
            ToolName::SumByCategory => typed(args).map(ToolCall::SumByCategory),
            ToolName::TopTransactions => typed(args).map(ToolCall::TopTransactions),
            ToolName::GroupByMonth => typed(args).map(ToolCall::GroupByMonth),
            ToolName::OutliersLarge => typed(args).map(ToolCall::OutliersLarge),
            ToolName::RecurringMerchants => typed(args).map(ToolCall::RecurringMerchants),
            ToolName::MerchantBreakdown => typed(args).map(ToolCall::MerchantBreakdown),
            ToolName::CategoryTrend => typed(args).map(ToolCall::CategoryTrend),
        }
    }

    pub fn tool(&self) -> ToolName {
        match self {
            ToolCall::GetLatest(_) => ToolName::GetLatest,
            ToolCall::SumByMerchant(_) => ToolName::SumByMerchant,
            ToolCall::SumByCategory(_) => ToolName::SumByCategory,
            ToolCall::TopTransactions(_) => ToolName::TopTransactions,
            ToolCall::GroupByMonth(_) => ToolName::GroupByMonth,
            ToolCall::OutliersLarge(_) => ToolName::OutliersLarge,
            ToolCall::RecurringMerchants(_) => ToolName::RecurringMerchants,
            ToolCall::MerchantBreakdown(_) => ToolName::MerchantBreakdown,
            ToolCall::CategoryTrend(_) => ToolName::CategoryTrend,
        }
    }

    pub fn run(&self, table: &TransactionTable) -> ToolResult {
        match self {
            ToolCall::GetLatest(a) => tools::get_latest(table, a.n, a.offset),
            ToolCall::SumByMerchant(a) => tools::sum_by_merchant(
                table,
                &a.merchant_substr,
                a.start_date.as_deref(),
                a.end_date.as_deref(),
            ),
            ToolCall::SumByCategory(a) => tools::sum_by_category(
                table,
                &a.category,
                a.start_date.as_deref(),
                a.end_date.as_deref(),
            ),
            ToolCall::TopTransactions(a) => tools::top_transactions(table, a),
            ToolCall::GroupByMonth(a) => tools::group_by_month(table, a),
            ToolCall::OutliersLarge(a) => tools::outliers_large(
                table,
                a.min_amount,
                a.start_date.as_deref(),
                a.end_date.as_deref(),
            ),
            ToolCall::RecurringMerchants(a) => {
                tools::recurring_merchants(table, a.months, a.min_count)
            }
            ToolCall::MerchantBreakdown(a) => tools::merchant_breakdown(table, a),
            ToolCall::CategoryTrend(a) => tools::category_trend(table, &a.category, a.months),
        }
    }
}

fn typed<T: DeserializeOwned>(args: &Map<String, Value>) -> Option<T> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|e| warn!("Arguments do not fit tool schema: {}", e))
        .ok()
}

/// Outcome of running a validated plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Execution {
    pub tool: ToolName,
    pub args: Map<String, Value>,
    /// Absent for the `none` tool.
    pub result: Option<ToolResult>,
}

/// Runs `plan` against `table`. Deterministic and free of side effects.
pub fn execute_plan(table: &TransactionTable, plan: &Plan) -> Execution {
    let result = ToolCall::from_plan(plan).map(|call| {
        debug!("Executing {} over {} transactions", call.tool(), table.len());
        call.run(table)
    });
    Execution {
        tool: plan.tool,
        args: plan.args.clone(),
        result,
    }
}
