//! Deterministic query tools over a [`TransactionTable`].
//!
//! Every tool is a pure function of the table and its typed arguments and
//! returns a [`ToolResult`]: a summary, a capped list of rows, and the amount
//! column the numbers were computed from.

use crate::plan::{
    DEFAULT_GROUP_FIELD, DEFAULT_LATEST_N, DEFAULT_LATEST_OFFSET, DEFAULT_MIN_AMOUNT,
    DEFAULT_MIN_COUNT, DEFAULT_MONTHS, DEFAULT_TOP_K, DEFAULT_TOP_N,
};
use crate::period::DATE_FORMAT;
use crate::table::{AmountColumn, ColumnSet, TextColumn, Transaction, TransactionTable};
use chrono::{Months, NaiveDate, NaiveDateTime, NaiveTime};
use schemars::JsonSchema;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};

const TX_ROW_LIMIT: usize = 50;
const GROUP_MONTH_CAP: usize = 12;
const RECURRING_ROW_LIMIT: usize = 30;
const BREAKDOWN_ROW_LIMIT: usize = 20;
const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn default_latest_n() -> usize {
    DEFAULT_LATEST_N
}
fn default_top_n() -> usize {
    DEFAULT_TOP_N
}
fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_min_amount() -> f64 {
    DEFAULT_MIN_AMOUNT
}
fn default_months() -> u32 {
    DEFAULT_MONTHS
}
fn default_min_count() -> usize {
    DEFAULT_MIN_COUNT
}
fn default_group_field() -> String {
    DEFAULT_GROUP_FIELD.to_string()
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LatestArgs {
    #[serde(default = "default_latest_n")]
    #[schemars(description = "How many transactions to return, 1 to 10")]
    pub n: usize,

    #[serde(default)]
    #[schemars(description = "How many of the newest transactions to skip first, 0 to 50")]
    pub offset: usize,
}

impl Default for LatestArgs {
    fn default() -> Self {
        Self {
            n: DEFAULT_LATEST_N,
            offset: DEFAULT_LATEST_OFFSET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MerchantSumArgs {
    #[schemars(description = "Case-insensitive fragment of the merchant name")]
    pub merchant_substr: String,

    #[serde(default)]
    #[schemars(description = "Inclusive start date, YYYY-MM-DD")]
    pub start_date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Inclusive end date, YYYY-MM-DD")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategorySumArgs {
    #[schemars(description = "Category name, matched case-insensitively")]
    pub category: String,

    #[serde(default)]
    #[schemars(description = "Inclusive start date, YYYY-MM-DD")]
    pub start_date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Inclusive end date, YYYY-MM-DD")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TopTransactionsArgs {
    #[serde(default = "default_top_n")]
    #[schemars(description = "How many transactions to return, 1 to 50")]
    pub n: usize,

    #[serde(default)]
    #[schemars(description = "Inclusive start date, YYYY-MM-DD")]
    pub start_date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Inclusive end date, YYYY-MM-DD")]
    pub end_date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Only transactions in this category")]
    pub category: Option<String>,

    #[serde(default)]
    #[schemars(description = "Only merchants containing this fragment")]
    pub merchant_substr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GroupByMonthArgs {
    #[serde(default)]
    #[schemars(description = "Inclusive start date, YYYY-MM-DD")]
    pub start_date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Inclusive end date, YYYY-MM-DD")]
    pub end_date: Option<String>,

    #[serde(default = "default_group_field")]
    #[schemars(description = "Column to group by: category, 2nd category, card or merchant")]
    pub field: String,

    #[serde(default = "default_top_k")]
    #[schemars(description = "Groups kept per month, 1 to 10")]
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OutliersArgs {
    #[serde(default = "default_min_amount")]
    #[schemars(description = "Smallest amount in EUR to include")]
    pub min_amount: f64,

    #[serde(default)]
    #[schemars(description = "Inclusive start date, YYYY-MM-DD")]
    pub start_date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Inclusive end date, YYYY-MM-DD")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RecurringArgs {
    #[serde(default = "default_months")]
    #[schemars(description = "Look-back window in calendar months, 1 to 24")]
    pub months: u32,

    #[serde(default = "default_min_count")]
    #[schemars(description = "Minimum number of transactions per merchant, 2 to 20")]
    pub min_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MerchantBreakdownArgs {
    #[schemars(description = "Case-insensitive fragment of the merchant name")]
    pub merchant_substr: String,

    #[serde(default = "default_group_field")]
    #[schemars(description = "Column to split the merchant's spending by")]
    pub by: String,

    #[serde(default)]
    #[schemars(description = "Inclusive start date, YYYY-MM-DD")]
    pub start_date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Inclusive end date, YYYY-MM-DD")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryTrendArgs {
    #[schemars(description = "Category name, matched case-insensitively")]
    pub category: String,

    #[serde(default = "default_months")]
    #[schemars(description = "Look-back window in calendar months, 1 to 24")]
    pub months: u32,
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BasicStats {
    pub count: usize,
    pub sum_eur: f64,
    pub avg_eur: f64,
    pub median_eur: f64,
    pub max_eur: f64,
}

impl BasicStats {
    pub fn from_amounts(amounts: &[f64]) -> Self {
        if amounts.is_empty() {
            return Self::default();
        }
        let sum: f64 = amounts.iter().sum();
        let max = amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            count: amounts.len(),
            sum_eur: sum,
            avg_eur: sum / amounts.len() as f64,
            median_eur: median(amounts),
            max_eur: max,
        }
    }
}

pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TopFilters {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
    pub merchant_substr: Option<String>,
}

/// Per-tool summary, serialized with a `label` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "label", rename_all = "snake_case")]
pub enum ToolSummary {
    Latest {
        n: usize,
        offset: usize,
        #[serde(flatten)]
        stats: BasicStats,
    },
    SumByMerchant {
        merchant_substr: String,
        start_date: Option<String>,
        end_date: Option<String>,
        #[serde(flatten)]
        stats: BasicStats,
    },
    SumByCategory {
        category: String,
        start_date: Option<String>,
        end_date: Option<String>,
        #[serde(flatten)]
        stats: BasicStats,
    },
    TopTransactions {
        n: usize,
        filters: TopFilters,
        #[serde(flatten)]
        stats: BasicStats,
    },
    GroupByMonth {
        field: String,
        top_k: usize,
        start_date: Option<String>,
        end_date: Option<String>,
    },
    OutliersLarge {
        min_amount: f64,
        start_date: Option<String>,
        end_date: Option<String>,
        #[serde(flatten)]
        stats: BasicStats,
    },
    RecurringMerchants {
        months: u32,
        min_count: usize,
        found: usize,
    },
    MerchantBreakdown {
        merchant_substr: String,
        by: String,
        start_date: Option<String>,
        end_date: Option<String>,
        #[serde(flatten)]
        stats: BasicStats,
    },
    CategoryTrend {
        category: String,
        months: u32,
        start_from: Option<String>,
    },
}

impl ToolSummary {
    pub fn stats(&self) -> Option<&BasicStats> {
        match self {
            ToolSummary::Latest { stats, .. }
            | ToolSummary::SumByMerchant { stats, .. }
            | ToolSummary::SumByCategory { stats, .. }
            | ToolSummary::TopTransactions { stats, .. }
            | ToolSummary::OutliersLarge { stats, .. }
            | ToolSummary::MerchantBreakdown { stats, .. } => Some(stats),
            ToolSummary::GroupByMonth { .. }
            | ToolSummary::RecurringMerchants { .. }
            | ToolSummary::CategoryTrend { .. } => None,
        }
    }
}

/// A transaction as shown to the narrator.
///
/// Serializes only the columns the table has, with the amount under the name
/// of the table's amount column.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub dt: NaiveDateTime,
    pub merchant: String,
    pub amount: f64,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub card: Option<String>,
    pub notes: Option<String>,
    amount_col: AmountColumn,
    columns: ColumnSet,
}

impl TransactionRow {
    pub fn from_transaction(table: &TransactionTable, tx: &Transaction) -> Self {
        Self {
            dt: tx.dt(),
            merchant: tx.merchant.clone(),
            amount: table.amount_of(tx),
            category: tx.category.clone(),
            subcategory: tx.subcategory.clone(),
            card: tx.card.clone(),
            notes: tx.notes.clone(),
            amount_col: table.amount_column(),
            columns: table.columns(),
        }
    }
}

impl Serialize for TransactionRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("dt", &self.dt.format(DT_FORMAT).to_string())?;
        map.serialize_entry("merchant", &self.merchant)?;
        map.serialize_entry(self.amount_col.as_str(), &self.amount)?;
        let optional = [
            (TextColumn::Category, &self.category),
            (TextColumn::Subcategory, &self.subcategory),
            (TextColumn::Card, &self.card),
            (TextColumn::Notes, &self.notes),
        ];
        for (column, value) in optional {
            if self.columns.has(column) {
                map.serialize_entry(column.name(), value)?;
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResultRow {
    Transaction(TransactionRow),
    MonthGroup {
        month: String,
        field: String,
        value: Option<String>,
        sum_eur: f64,
    },
    Recurring {
        merchant: String,
        txn_count: usize,
        months_active: usize,
        sum_eur: f64,
    },
    Breakdown {
        by: String,
        value: Option<String>,
        sum_eur: f64,
    },
    MonthTotal {
        month: String,
        sum_eur: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResultMeta {
    pub amount_col: AmountColumn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub summary: ToolSummary,
    pub rows: Vec<ResultRow>,
    pub meta: ResultMeta,
}

impl ToolResult {
    fn new(table: &TransactionTable, summary: ToolSummary, rows: Vec<ResultRow>) -> Self {
        Self {
            summary,
            rows,
            meta: ResultMeta {
                amount_col: table.amount_column(),
            },
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_ymd(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// Rows whose timestamp falls within the inclusive date range. Missing or
/// unparseable bounds impose no limit.
fn filter_by_date<'a>(
    table: &'a TransactionTable,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Vec<&'a Transaction> {
    let start = start_date
        .and_then(parse_ymd)
        .map(|d| d.and_time(NaiveTime::MIN));
    let end = end_date
        .and_then(parse_ymd)
        .and_then(|d| d.succ_opt())
        .map(|d| d.and_time(NaiveTime::MIN));

    table
        .rows()
        .iter()
        .filter(|tx| {
            let dt = tx.dt();
            start.map_or(true, |s| dt >= s) && end.map_or(true, |e| dt < e)
        })
        .collect()
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn eq_ci(value: Option<&str>, expected: &str) -> bool {
    value.is_some_and(|v| v.to_lowercase() == expected.to_lowercase())
}

fn month_key(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m").to_string()
}

fn sort_by_dt_desc(txs: &mut [&Transaction]) {
    txs.sort_by_key(|tx| std::cmp::Reverse(tx.dt()));
}

fn sort_by_amount_desc(table: &TransactionTable, txs: &mut [&Transaction]) {
    txs.sort_by(|a, b| table.amount_of(b).total_cmp(&table.amount_of(a)));
}

fn stats_of(table: &TransactionTable, txs: &[&Transaction]) -> BasicStats {
    let amounts: Vec<f64> = txs.iter().map(|tx| table.amount_of(tx)).collect();
    BasicStats::from_amounts(&amounts)
}

fn tx_rows(table: &TransactionTable, txs: &[&Transaction], limit: usize) -> Vec<ResultRow> {
    txs.iter()
        .take(limit)
        .map(|tx| ResultRow::Transaction(TransactionRow::from_transaction(table, tx)))
        .collect()
}

/// Falls back to `category` when the table lacks the requested column.
fn group_column(table: &TransactionTable, field: &str) -> TextColumn {
    TextColumn::parse(field)
        .filter(|c| table.columns().has(*c))
        .unwrap_or(TextColumn::Category)
}

fn sum_groups<'a, I>(table: &TransactionTable, column: TextColumn, txs: I) -> Vec<(Option<String>, f64)>
where
    I: IntoIterator<Item = &'a Transaction>,
{
    let mut groups: BTreeMap<Option<String>, f64> = BTreeMap::new();
    for tx in txs {
        let key = column.value(tx).map(str::to_string);
        *groups.entry(key).or_insert(0.0) += table.amount_of(tx);
    }
    let mut groups: Vec<_> = groups.into_iter().collect();
    groups.sort_by(|a, b| b.1.total_cmp(&a.1));
    groups
}

fn window_start(max_dt: NaiveDateTime, months: u32) -> NaiveDateTime {
    max_dt
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDateTime::MIN)
}

// ============================================================================
// Tools
// ============================================================================

/// The `n` newest transactions after skipping `offset`.
pub fn get_latest(table: &TransactionTable, n: usize, offset: usize) -> ToolResult {
    let slice: Vec<&Transaction> = table
        .sorted_by_dt_desc()
        .into_iter()
        .skip(offset)
        .take(n)
        .collect();
    let summary = ToolSummary::Latest {
        n,
        offset,
        stats: stats_of(table, &slice),
    };
    ToolResult::new(table, summary, tx_rows(table, &slice, n))
}

pub fn sum_by_merchant(
    table: &TransactionTable,
    merchant_substr: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> ToolResult {
    let mut sub: Vec<&Transaction> = filter_by_date(table, start_date, end_date)
        .into_iter()
        .filter(|tx| contains_ci(&tx.merchant, merchant_substr))
        .collect();
    sort_by_dt_desc(&mut sub);
    let summary = ToolSummary::SumByMerchant {
        merchant_substr: merchant_substr.to_string(),
        start_date: start_date.map(str::to_string),
        end_date: end_date.map(str::to_string),
        stats: stats_of(table, &sub),
    };
    ToolResult::new(table, summary, tx_rows(table, &sub, TX_ROW_LIMIT))
}

pub fn sum_by_category(
    table: &TransactionTable,
    category: &str,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> ToolResult {
    let mut sub: Vec<&Transaction> = filter_by_date(table, start_date, end_date)
        .into_iter()
        .filter(|tx| eq_ci(tx.category.as_deref(), category))
        .collect();
    sort_by_dt_desc(&mut sub);
    let summary = ToolSummary::SumByCategory {
        category: category.to_string(),
        start_date: start_date.map(str::to_string),
        end_date: end_date.map(str::to_string),
        stats: stats_of(table, &sub),
    };
    ToolResult::new(table, summary, tx_rows(table, &sub, TX_ROW_LIMIT))
}

/// Largest transactions, optionally narrowed by category and merchant.
pub fn top_transactions(table: &TransactionTable, args: &TopTransactionsArgs) -> ToolResult {
    let category = args.category.as_deref().filter(|c| !c.is_empty());
    let merchant = args.merchant_substr.as_deref().filter(|m| !m.is_empty());

    let mut sub: Vec<&Transaction> =
        filter_by_date(table, args.start_date.as_deref(), args.end_date.as_deref())
            .into_iter()
            .filter(|tx| category.map_or(true, |c| eq_ci(tx.category.as_deref(), c)))
            .filter(|tx| merchant.map_or(true, |m| contains_ci(&tx.merchant, m)))
            .collect();
    sort_by_amount_desc(table, &mut sub);
    sub.truncate(args.n);

    let summary = ToolSummary::TopTransactions {
        n: args.n,
        filters: TopFilters {
            start_date: args.start_date.clone(),
            end_date: args.end_date.clone(),
            category: args.category.clone(),
            merchant_substr: args.merchant_substr.clone(),
        },
        stats: stats_of(table, &sub),
    };
    ToolResult::new(table, summary, tx_rows(table, &sub, args.n))
}

/// Per-month totals of the `top_k` largest groups of `field`.
pub fn group_by_month(table: &TransactionTable, args: &GroupByMonthArgs) -> ToolResult {
    let column = group_column(table, &args.field);
    let sub = filter_by_date(table, args.start_date.as_deref(), args.end_date.as_deref());

    let mut by_month: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for tx in sub {
        by_month.entry(month_key(tx.dt())).or_default().push(tx);
    }

    let mut rows = Vec::new();
    for (month, txs) in by_month {
        for (value, sum) in sum_groups(table, column, txs).into_iter().take(args.top_k) {
            rows.push(ResultRow::MonthGroup {
                month: month.clone(),
                field: column.name().to_string(),
                value,
                sum_eur: sum,
            });
        }
    }
    rows.truncate(GROUP_MONTH_CAP * args.top_k);

    let summary = ToolSummary::GroupByMonth {
        field: column.name().to_string(),
        top_k: args.top_k,
        start_date: args.start_date.clone(),
        end_date: args.end_date.clone(),
    };
    ToolResult::new(table, summary, rows)
}

pub fn outliers_large(
    table: &TransactionTable,
    min_amount: f64,
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> ToolResult {
    let mut sub: Vec<&Transaction> = filter_by_date(table, start_date, end_date)
        .into_iter()
        .filter(|tx| table.amount_of(tx) >= min_amount)
        .collect();
    sort_by_amount_desc(table, &mut sub);
    let summary = ToolSummary::OutliersLarge {
        min_amount,
        start_date: start_date.map(str::to_string),
        end_date: end_date.map(str::to_string),
        stats: stats_of(table, &sub),
    };
    ToolResult::new(table, summary, tx_rows(table, &sub, TX_ROW_LIMIT))
}

#[derive(Default)]
struct MerchantActivity {
    count: usize,
    sum: f64,
    months: BTreeSet<String>,
}

/// Merchants seen at least `min_count` times in two or more distinct months
/// within `months` calendar months of the newest transaction.
pub fn recurring_merchants(table: &TransactionTable, months: u32, min_count: usize) -> ToolResult {
    let Some(max_dt) = table.max_dt() else {
        let summary = ToolSummary::RecurringMerchants {
            months,
            min_count,
            found: 0,
        };
        return ToolResult::new(table, summary, Vec::new());
    };
    let start = window_start(max_dt, months);

    let mut activity: BTreeMap<&str, MerchantActivity> = BTreeMap::new();
    for tx in table.rows().iter().filter(|tx| tx.dt() >= start) {
        let entry = activity.entry(tx.merchant.as_str()).or_default();
        entry.count += 1;
        entry.sum += table.amount_of(tx);
        entry.months.insert(month_key(tx.dt()));
    }

    let mut recurring: Vec<(&str, MerchantActivity)> = activity
        .into_iter()
        .filter(|(_, a)| a.count >= min_count && a.months.len() >= 2)
        .collect();
    recurring.sort_by(|a, b| {
        b.1.months
            .len()
            .cmp(&a.1.months.len())
            .then(b.1.sum.total_cmp(&a.1.sum))
    });

    let rows: Vec<ResultRow> = recurring
        .into_iter()
        .take(RECURRING_ROW_LIMIT)
        .map(|(merchant, a)| ResultRow::Recurring {
            merchant: merchant.to_string(),
            txn_count: a.count,
            months_active: a.months.len(),
            sum_eur: a.sum,
        })
        .collect();

    let summary = ToolSummary::RecurringMerchants {
        months,
        min_count,
        found: rows.len(),
    };
    ToolResult::new(table, summary, rows)
}

pub fn merchant_breakdown(table: &TransactionTable, args: &MerchantBreakdownArgs) -> ToolResult {
    let column = group_column(table, &args.by);
    let sub: Vec<&Transaction> =
        filter_by_date(table, args.start_date.as_deref(), args.end_date.as_deref())
            .into_iter()
            .filter(|tx| contains_ci(&tx.merchant, &args.merchant_substr))
            .collect();

    let rows = sum_groups(table, column, sub.iter().copied())
        .into_iter()
        .take(BREAKDOWN_ROW_LIMIT)
        .map(|(value, sum)| ResultRow::Breakdown {
            by: column.name().to_string(),
            value,
            sum_eur: sum,
        })
        .collect();

    let summary = ToolSummary::MerchantBreakdown {
        merchant_substr: args.merchant_substr.clone(),
        by: column.name().to_string(),
        start_date: args.start_date.clone(),
        end_date: args.end_date.clone(),
        stats: stats_of(table, &sub),
    };
    ToolResult::new(table, summary, rows)
}

/// Monthly totals of one category, oldest month first.
pub fn category_trend(table: &TransactionTable, category: &str, months: u32) -> ToolResult {
    let Some(max_dt) = table.max_dt() else {
        let summary = ToolSummary::CategoryTrend {
            category: category.to_string(),
            months,
            start_from: None,
        };
        return ToolResult::new(table, summary, Vec::new());
    };
    let start = window_start(max_dt, months);

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for tx in table
        .rows()
        .iter()
        .filter(|tx| tx.dt() >= start && eq_ci(tx.category.as_deref(), category))
    {
        *totals.entry(month_key(tx.dt())).or_insert(0.0) += table.amount_of(tx);
    }

    let rows = totals
        .into_iter()
        .map(|(month, sum)| ResultRow::MonthTotal {
            month,
            sum_eur: sum,
        })
        .collect();

    let summary = ToolSummary::CategoryTrend {
        category: category.to_string(),
        months,
        start_from: Some(start.date().format(DATE_FORMAT).to_string()),
    };
    ToolResult::new(table, summary, rows)
}

/// JSON schemas of every tool's arguments, keyed by tool name.
pub fn argument_schemas() -> serde_json::Value {
    let mut schemas = serde_json::Map::new();
    let mut add = |name: &str, schema: schemars::schema::RootSchema| {
        if let Ok(value) = serde_json::to_value(schema) {
            schemas.insert(name.to_string(), value);
        }
    };
    add("get_latest", schemars::schema_for!(LatestArgs));
    add("sum_by_merchant", schemars::schema_for!(MerchantSumArgs));
    add("sum_by_category", schemars::schema_for!(CategorySumArgs));
    add("top_transactions", schemars::schema_for!(TopTransactionsArgs));
    add("group_by_month", schemars::schema_for!(GroupByMonthArgs));
    add("outliers_large", schemars::schema_for!(OutliersArgs));
    add("recurring_merchants", schemars::schema_for!(RecurringArgs));
    add("merchant_breakdown", schemars::schema_for!(MerchantBreakdownArgs));
    add("category_trend", schemars::schema_for!(CategoryTrendArgs));
    serde_json::Value::Object(schemas)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn groceries_table() -> TransactionTable {
        TransactionTable::new(vec![
            Transaction::new(d(2025, 1, 10), "Prisma", 12.0).with_category("Groceries"),
            Transaction::new(d(2025, 2, 5), "Prisma", 18.0).with_category("Groceries"),
            Transaction::new(d(2025, 2, 20), "Alepa", 30.0).with_category("Groceries"),
        ])
    }

    #[test]
    fn test_sum_by_merchant_with_range() {
        let table = groceries_table();
        let result = sum_by_merchant(&table, "prisma", Some("2025-01-01"), Some("2025-02-28"));
        let stats = result.summary.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.sum_eur, 30.0);
        assert_eq!(stats.median_eur, 15.0);
        assert_eq!(result.rows.len(), 2);

        let first = serde_json::to_value(&result.rows[0]).unwrap();
        assert_eq!(first["dt"], "2025-02-05 00:00:00");
        assert_eq!(first["amount"], 18.0);
    }

    #[test]
    fn test_end_date_includes_whole_day() {
        let table = TransactionTable::new(vec![
            Transaction::new(d(2025, 3, 31), "Late", 5.0)
                .with_time(NaiveTime::from_hms_opt(23, 59, 0).unwrap()),
            Transaction::new(d(2025, 4, 1), "Next", 7.0),
        ]);
        let result = sum_by_merchant(&table, "", Some("2025-03-01"), Some("2025-03-31"));
        assert_eq!(result.summary.stats().unwrap().count, 1);
        assert_eq!(result.summary.stats().unwrap().sum_eur, 5.0);
    }

    #[test]
    fn test_unparseable_date_bound_is_ignored() {
        let table = groceries_table();
        let result = sum_by_category(&table, "GROCERIES", Some("garbage"), None);
        assert_eq!(result.summary.stats().unwrap().count, 3);
    }

    #[test]
    fn test_adjusted_amount_used_everywhere() {
        let table = TransactionTable::new(vec![
            Transaction::new(d(2025, 1, 1), "Rent Oy", 1000.0)
                .with_adjusted_amount(500.0)
                .with_category("Housing"),
            Transaction::new(d(2025, 1, 2), "Cafe", 4.0)
                .with_adjusted_amount(4.0)
                .with_category("Food"),
        ]);

        let outliers = outliers_large(&table, 600.0, None, None);
        assert_eq!(outliers.summary.stats().unwrap().count, 0);

        let top = top_transactions(
            &table,
            &TopTransactionsArgs {
                n: 1,
                start_date: None,
                end_date: None,
                category: None,
                merchant_substr: None,
            },
        );
        assert_eq!(top.meta.amount_col, AmountColumn::AdjustedAmount);
        let row = serde_json::to_value(&top.rows[0]).unwrap();
        assert_eq!(row["adjusted_amount"], 500.0);
        assert!(row.get("amount").is_none());
        assert_eq!(top.summary.stats().unwrap().sum_eur, 500.0);
    }

    #[test]
    fn test_get_latest_offset() {
        let table = groceries_table();
        let result = get_latest(&table, 1, 1);
        let row = serde_json::to_value(&result.rows[0]).unwrap();
        assert_eq!(row["merchant"], "Prisma");
        assert_eq!(row["dt"], "2025-02-05 00:00:00");

        let past_end = get_latest(&table, 5, 10);
        assert!(past_end.rows.is_empty());
        assert_eq!(past_end.summary.stats().unwrap().count, 0);
    }

    #[test]
    fn test_recurring_requires_two_months() {
        let table = TransactionTable::new(vec![
            Transaction::new(d(2025, 1, 5), "Netflix", 10.0),
            Transaction::new(d(2025, 2, 5), "Netflix", 10.0),
            Transaction::new(d(2025, 2, 15), "Netflix", 10.0),
            Transaction::new(d(2025, 2, 1), "Fair", 50.0),
            Transaction::new(d(2025, 2, 2), "Fair", 50.0),
            Transaction::new(d(2025, 2, 3), "Fair", 50.0),
        ]);
        let result = recurring_merchants(&table, 6, 3);
        assert_eq!(
            serde_json::to_value(&result.rows).unwrap(),
            json!([{"merchant": "Netflix", "txn_count": 3, "months_active": 2, "sum_eur": 30.0}])
        );
        assert_eq!(
            serde_json::to_value(&result.summary).unwrap(),
            json!({"label": "recurring_merchants", "months": 6, "min_count": 3, "found": 1})
        );
    }

    #[test]
    fn test_recurring_window_uses_calendar_months() {
        let table = TransactionTable::new(vec![
            Transaction::new(d(2024, 12, 31), "Gym", 30.0),
            Transaction::new(d(2025, 1, 31), "Gym", 30.0),
            Transaction::new(d(2025, 2, 28), "Gym", 30.0),
            Transaction::new(d(2025, 3, 31), "Gym", 30.0),
        ]);
        // 2025-03-31 minus two months is 2025-01-31
        let result = recurring_merchants(&table, 2, 3);
        assert_eq!(
            serde_json::to_value(&result.rows[0]).unwrap()["txn_count"],
            3
        );
    }

    #[test]
    fn test_group_by_month_top_k_and_fallback_field() {
        let table = TransactionTable::new(vec![
            Transaction::new(d(2025, 1, 10), "Prisma", 12.0).with_category("Groceries"),
            Transaction::new(d(2025, 1, 11), "VR", 40.0).with_category("Travel"),
            Transaction::new(d(2025, 2, 5), "Prisma", 18.0).with_category("Groceries"),
        ]);
        let result = group_by_month(
            &table,
            &GroupByMonthArgs {
                start_date: None,
                end_date: None,
                field: "card".to_string(),
                top_k: 1,
            },
        );
        assert_eq!(
            serde_json::to_value(&result.rows).unwrap(),
            json!([
                {"month": "2025-01", "field": "category", "value": "Travel", "sum_eur": 40.0},
                {"month": "2025-02", "field": "category", "value": "Groceries", "sum_eur": 18.0}
            ])
        );
    }

    #[test]
    fn test_merchant_breakdown_counts_missing_group() {
        let table = TransactionTable::new(vec![
            Transaction::new(d(2025, 1, 1), "K-Market", 10.0).with_category("Groceries"),
            Transaction::new(d(2025, 1, 2), "K-Market", 6.0),
            Transaction::new(d(2025, 1, 3), "K-Rauta", 90.0).with_category("Home"),
        ]);
        let args = MerchantBreakdownArgs {
            merchant_substr: "k-market".to_string(),
            by: "category".to_string(),
            start_date: None,
            end_date: None,
        };
        let result = merchant_breakdown(&table, &args);
        assert_eq!(
            serde_json::to_value(&result.rows).unwrap(),
            json!([
                {"by": "category", "value": "Groceries", "sum_eur": 10.0},
                {"by": "category", "value": null, "sum_eur": 6.0}
            ])
        );
        assert_eq!(result.summary.stats().unwrap().count, 2);
    }

    #[test]
    fn test_category_trend_ascending_months() {
        let table = groceries_table();
        let result = category_trend(&table, "groceries", 6);
        assert_eq!(
            serde_json::to_value(&result.rows).unwrap(),
            json!([
                {"month": "2025-01", "sum_eur": 12.0},
                {"month": "2025-02", "sum_eur": 48.0}
            ])
        );
        assert_eq!(
            serde_json::to_value(&result.summary).unwrap()["start_from"],
            "2024-08-20"
        );
    }

    #[test]
    fn test_empty_table_results() {
        let table = TransactionTable::default();
        assert!(category_trend(&table, "Food", 3).rows.is_empty());
        assert!(recurring_merchants(&table, 3, 2).rows.is_empty());
        let latest = get_latest(&table, 1, 0);
        assert_eq!(latest.summary.stats().unwrap().count, 0);
        assert_eq!(latest.summary.stats().unwrap().sum_eur, 0.0);
    }

    #[test]
    fn test_row_omits_absent_columns() {
        let table = TransactionTable::new(vec![Transaction::new(d(2025, 1, 1), "Shop", 1.5)
            .with_category("Misc")]);
        let result = get_latest(&table, 1, 0);
        let row = serde_json::to_value(&result.rows[0]).unwrap();
        assert_eq!(
            row,
            json!({"dt": "2025-01-01 00:00:00", "merchant": "Shop", "amount": 1.5, "category": "Misc"})
        );
    }

    #[test]
    fn test_argument_schemas_cover_tools() {
        let schemas = argument_schemas();
        assert_eq!(schemas.as_object().unwrap().len(), 9);
        assert!(schemas["sum_by_merchant"]["properties"]["merchant_substr"].is_object());
    }
}
