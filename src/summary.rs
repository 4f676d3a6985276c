//! Aggregate overview of a whole table, used as context when no tool fits.

use crate::period::DateRange;
use crate::table::{TextColumn, TransactionTable};
use crate::tools::median;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

const TOP_SUBCATEGORIES: usize = 20;
const TOP_MERCHANTS: usize = 20;
const TEXT_CATEGORIES: usize = 10;
const TEXT_MONTHS: usize = 6;
const TEXT_MERCHANTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedTotal {
    pub name: String,
    pub sum_eur: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub total_spending: f64,
    pub total_transactions: usize,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyStatistics {
    pub average_monthly: f64,
    pub median_monthly: f64,
    pub highest_month: NamedTotal,
    pub lowest_month: NamedTotal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableSummary {
    pub overview: Overview,
    pub by_category: Vec<NamedTotal>,
    /// Ascending `YYYY-MM`.
    pub by_month: Vec<NamedTotal>,
    /// `"<category> - <2nd category>"`, largest first.
    pub by_subcategory: Vec<NamedTotal>,
    pub top_merchants: Vec<NamedTotal>,
    pub statistics: Option<MonthlyStatistics>,
}

fn sorted_desc(totals: BTreeMap<String, f64>, limit: usize) -> Vec<NamedTotal> {
    let mut totals: Vec<NamedTotal> = totals
        .into_iter()
        .map(|(name, sum_eur)| NamedTotal { name, sum_eur })
        .collect();
    totals.sort_by(|a, b| b.sum_eur.total_cmp(&a.sum_eur));
    totals.truncate(limit);
    totals
}

impl TableSummary {
    pub fn from_table(table: &TransactionTable) -> Self {
        if table.is_empty() {
            return Self::default();
        }
        let columns = table.columns();

        let mut categories = BTreeMap::new();
        let mut months = BTreeMap::new();
        let mut subcategories = BTreeMap::new();
        let mut merchants = BTreeMap::new();
        let mut total = 0.0;

        for tx in table.rows() {
            let amount = table.amount_of(tx);
            total += amount;
            *months.entry(tx.date.format("%Y-%m").to_string()).or_insert(0.0) += amount;
            *merchants.entry(tx.merchant.clone()).or_insert(0.0) += amount;
            if let Some(category) = TextColumn::Category.value(tx) {
                *categories.entry(category.to_string()).or_insert(0.0) += amount;
                if let Some(sub) = TextColumn::Subcategory.value(tx) {
                    *subcategories
                        .entry(format!("{} - {}", category, sub))
                        .or_insert(0.0) += amount;
                }
            }
        }

        let dates = table.rows().iter().map(|tx| tx.date);
        let date_range = dates
            .clone()
            .min()
            .zip(dates.max())
            .map(|(start, end)| DateRange { start, end });

        let by_month: Vec<NamedTotal> = months
            .into_iter()
            .map(|(name, sum_eur)| NamedTotal { name, sum_eur })
            .collect();

        Self {
            overview: Overview {
                total_spending: total,
                total_transactions: table.len(),
                date_range,
            },
            by_category: if columns.category {
                sorted_desc(categories, usize::MAX)
            } else {
                Vec::new()
            },
            by_subcategory: if columns.subcategory {
                sorted_desc(subcategories, TOP_SUBCATEGORIES)
            } else {
                Vec::new()
            },
            top_merchants: sorted_desc(merchants, TOP_MERCHANTS),
            statistics: monthly_statistics(&by_month),
            by_month,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.overview.total_transactions == 0
    }

    /// Plain-text rendering for the fallback prompt.
    pub fn to_text(&self) -> String {
        if self.is_empty() {
            return "No transaction data available.".to_string();
        }
        let total = self.overview.total_spending;
        let mut out = String::from("=== TRANSACTION SUMMARY ===\n\n");
        let _ = writeln!(out, "Total spent: {}", format_eur(total));
        let _ = writeln!(out, "Transactions: {}", self.overview.total_transactions);
        if let Some(range) = &self.overview.date_range {
            let _ = writeln!(out, "Date range: {} - {}", range.start, range.end);
        }

        if !self.by_category.is_empty() {
            out.push_str("\n=== SPENDING BY CATEGORY ===\n");
            for entry in self.by_category.iter().take(TEXT_CATEGORIES) {
                let pct = if total > 0.0 {
                    entry.sum_eur / total * 100.0
                } else {
                    0.0
                };
                let _ = writeln!(out, "- {}: {} ({:.1}%)", entry.name, format_eur(entry.sum_eur), pct);
            }
        }

        if !self.by_month.is_empty() {
            out.push_str("\n=== SPENDING BY MONTH ===\n");
            let skip = self.by_month.len().saturating_sub(TEXT_MONTHS);
            for entry in self.by_month.iter().skip(skip) {
                let _ = writeln!(out, "- {}: {}", entry.name, format_eur(entry.sum_eur));
            }
        }

        if let Some(stats) = &self.statistics {
            out.push_str("\n=== STATISTICS ===\n");
            let _ = writeln!(out, "Monthly average: {}", format_eur(stats.average_monthly));
            let _ = writeln!(out, "Monthly median: {}", format_eur(stats.median_monthly));
            let _ = writeln!(
                out,
                "Highest month: {} ({})",
                stats.highest_month.name,
                format_eur(stats.highest_month.sum_eur)
            );
            let _ = writeln!(
                out,
                "Lowest month: {} ({})",
                stats.lowest_month.name,
                format_eur(stats.lowest_month.sum_eur)
            );
        }

        if !self.top_merchants.is_empty() {
            out.push_str("\n=== TOP 10 MERCHANTS ===\n");
            for entry in self.top_merchants.iter().take(TEXT_MERCHANTS) {
                let _ = writeln!(out, "- {}: {}", entry.name, format_eur(entry.sum_eur));
            }
        }

        out.trim_end().to_string()
    }
}

fn monthly_statistics(by_month: &[NamedTotal]) -> Option<MonthlyStatistics> {
    let first = by_month.first()?;
    let sums: Vec<f64> = by_month.iter().map(|m| m.sum_eur).collect();

    // First occurrence wins on ties
    let mut highest = first;
    let mut lowest = first;
    for month in by_month {
        if month.sum_eur > highest.sum_eur {
            highest = month;
        }
        if month.sum_eur < lowest.sum_eur {
            lowest = month;
        }
    }

    Some(MonthlyStatistics {
        average_monthly: sums.iter().sum::<f64>() / sums.len() as f64,
        median_monthly: median(&sums),
        highest_month: highest.clone(),
        lowest_month: lowest.clone(),
    })
}

/// `€1,234.50`; negative values render as `€-5.00`.
pub fn format_eur(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (int_part, frac) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && formatted != "0.00" { "-" } else { "" };
    format!("€{}{}.{}", sign, grouped, frac)
}
