use crate::error::{AssistantError, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One normalized transaction as produced by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    pub merchant: String,
    pub amount: f64,
    /// `amount` scaled by the cost-allocation fraction found in the notes.
    #[serde(default)]
    pub adjusted_amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "2nd category")]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub card: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Transaction {
    pub fn new(date: NaiveDate, merchant: impl Into<String>, amount: f64) -> Self {
        Self {
            date,
            time: None,
            merchant: merchant.into(),
            amount,
            adjusted_amount: None,
            category: None,
            subcategory: None,
            card: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_time(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    #[must_use]
    pub fn with_adjusted_amount(mut self, adjusted_amount: f64) -> Self {
        self.adjusted_amount = Some(adjusted_amount);
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    #[must_use]
    pub fn with_card(mut self, card: impl Into<String>) -> Self {
        self.card = Some(card.into());
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Combined date and time; midnight when the row carries no time.
    pub fn dt(&self) -> NaiveDateTime {
        self.date.and_time(self.time.unwrap_or(NaiveTime::MIN))
    }
}

/// Which amount definition a table aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AmountColumn {
    Amount,
    AdjustedAmount,
}

impl AmountColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmountColumn::Amount => "amount",
            AmountColumn::AdjustedAmount => "adjusted_amount",
        }
    }
}

/// Text columns the query tools can match on or group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TextColumn {
    #[serde(rename = "merchant")]
    Merchant,
    #[serde(rename = "category")]
    Category,
    #[serde(rename = "2nd category")]
    Subcategory,
    #[serde(rename = "card")]
    Card,
    #[serde(rename = "notes")]
    Notes,
}

impl TextColumn {
    /// Accepts the column header as well as a few spellings models tend to produce.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "merchant" => Some(TextColumn::Merchant),
            "category" => Some(TextColumn::Category),
            "2nd category" | "2nd_category" | "subcategory" | "sub_category" => {
                Some(TextColumn::Subcategory)
            }
            "card" => Some(TextColumn::Card),
            "notes" => Some(TextColumn::Notes),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TextColumn::Merchant => "merchant",
            TextColumn::Category => "category",
            TextColumn::Subcategory => "2nd category",
            TextColumn::Card => "card",
            TextColumn::Notes => "notes",
        }
    }

    pub fn value<'a>(&self, tx: &'a Transaction) -> Option<&'a str> {
        match self {
            TextColumn::Merchant => Some(tx.merchant.as_str()),
            TextColumn::Category => tx.category.as_deref(),
            TextColumn::Subcategory => tx.subcategory.as_deref(),
            TextColumn::Card => tx.card.as_deref(),
            TextColumn::Notes => tx.notes.as_deref(),
        }
    }
}

/// Optional columns present in a table. `date`, `merchant` and `amount` always are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnSet {
    pub time: bool,
    pub adjusted_amount: bool,
    pub category: bool,
    pub subcategory: bool,
    pub card: bool,
    pub notes: bool,
}

impl ColumnSet {
    pub fn infer(rows: &[Transaction]) -> Self {
        Self {
            time: rows.iter().any(|r| r.time.is_some()),
            adjusted_amount: rows.iter().any(|r| r.adjusted_amount.is_some()),
            category: rows.iter().any(|r| r.category.is_some()),
            subcategory: rows.iter().any(|r| r.subcategory.is_some()),
            card: rows.iter().any(|r| r.card.is_some()),
            notes: rows.iter().any(|r| r.notes.is_some()),
        }
    }

    pub fn has(&self, column: TextColumn) -> bool {
        match column {
            TextColumn::Merchant => true,
            TextColumn::Category => self.category,
            TextColumn::Subcategory => self.subcategory,
            TextColumn::Card => self.card,
            TextColumn::Notes => self.notes,
        }
    }
}

/// Read-only transaction dataset the query layer runs against.
#[derive(Debug, Clone, Default)]
pub struct TransactionTable {
    rows: Vec<Transaction>,
    columns: ColumnSet,
}

impl TransactionTable {
    pub fn new(rows: Vec<Transaction>) -> Self {
        let columns = ColumnSet::infer(&rows);
        Self { rows, columns }
    }

    /// Use when the provider knows its schema, e.g. an `adjusted_amount`
    /// column that happens to be empty in every row.
    pub fn with_columns(rows: Vec<Transaction>, columns: ColumnSet) -> Self {
        Self { rows, columns }
    }

    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = TransactionRecord>,
    {
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(idx, record)| record.into_transaction(idx))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(rows))
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> ColumnSet {
        self.columns
    }

    pub fn amount_column(&self) -> AmountColumn {
        if self.columns.adjusted_amount {
            AmountColumn::AdjustedAmount
        } else {
            AmountColumn::Amount
        }
    }

    /// The value every aggregation uses for `tx`.
    ///
    /// A missing adjusted amount inside an adjusted table means the
    /// allocation was undefined, which is a 100% allocation.
    pub fn amount_of(&self, tx: &Transaction) -> f64 {
        match self.amount_column() {
            AmountColumn::AdjustedAmount => tx.adjusted_amount.unwrap_or(tx.amount),
            AmountColumn::Amount => tx.amount,
        }
    }

    pub fn max_dt(&self) -> Option<NaiveDateTime> {
        self.rows.iter().map(Transaction::dt).max()
    }

    /// Newest first; rows sharing a timestamp keep their table order.
    pub fn sorted_by_dt_desc(&self) -> Vec<&Transaction> {
        let mut sorted: Vec<&Transaction> = self.rows.iter().collect();
        sorted.sort_by_key(|tx| std::cmp::Reverse(tx.dt()));
        sorted
    }
}

/// A processed transaction row in its exported text form (one CSV line).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub merchant: String,
    pub amount: f64,
    #[serde(default)]
    pub adjusted_amount: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "2nd category")]
    pub subcategory: Option<String>,
    #[serde(default)]
    pub card: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TransactionRecord {
    fn into_transaction(self, row: usize) -> Result<Transaction> {
        let date_part = self.date.split_whitespace().next().unwrap_or("");
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| {
            AssistantError::InvalidTransaction {
                row,
                details: format!("invalid date '{}', expected YYYY-MM-DD", self.date),
            }
        })?;

        Ok(Transaction {
            date,
            time: self.time.as_deref().and_then(parse_time),
            merchant: self.merchant,
            amount: self.amount,
            adjusted_amount: self.adjusted_amount,
            category: non_empty(self.category),
            subcategory: non_empty(self.subcategory),
            card: non_empty(self.card),
            notes: non_empty(self.notes),
        })
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_dt_defaults_to_midnight() {
        let tx = Transaction::new(d(2025, 1, 10), "Prisma", 12.0);
        assert_eq!(tx.dt(), d(2025, 1, 10).and_hms_opt(0, 0, 0).unwrap());

        let tx = tx.with_time(NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        assert_eq!(tx.dt(), d(2025, 1, 10).and_hms_opt(23, 59, 0).unwrap());
    }

    #[test]
    fn test_amount_column_follows_adjusted_presence() {
        let plain = TransactionTable::new(vec![Transaction::new(d(2025, 1, 1), "A", 10.0)]);
        assert_eq!(plain.amount_column(), AmountColumn::Amount);

        let adjusted = TransactionTable::new(vec![
            Transaction::new(d(2025, 1, 1), "A", 10.0).with_adjusted_amount(5.0),
            Transaction::new(d(2025, 1, 2), "B", 8.0),
        ]);
        assert_eq!(adjusted.amount_column(), AmountColumn::AdjustedAmount);
        assert_eq!(adjusted.amount_of(&adjusted.rows()[0]), 5.0);
        // Undefined allocation counts in full
        assert_eq!(adjusted.amount_of(&adjusted.rows()[1]), 8.0);
    }

    #[test]
    fn test_sorted_by_dt_desc_uses_time() {
        let table = TransactionTable::new(vec![
            Transaction::new(d(2025, 1, 10), "Morning", 1.0)
                .with_time(NaiveTime::from_hms_opt(8, 0, 0).unwrap()),
            Transaction::new(d(2025, 1, 10), "Evening", 2.0)
                .with_time(NaiveTime::from_hms_opt(20, 0, 0).unwrap()),
            Transaction::new(d(2025, 1, 9), "Yesterday", 3.0),
        ]);
        let merchants: Vec<&str> = table
            .sorted_by_dt_desc()
            .iter()
            .map(|tx| tx.merchant.as_str())
            .collect();
        assert_eq!(merchants, vec!["Evening", "Morning", "Yesterday"]);
    }

    #[test]
    fn test_from_records_parses_text_fields() {
        let table = TransactionTable::from_records(vec![TransactionRecord {
            date: "2025-03-04 00:00:00".to_string(),
            time: Some("15:30:21".to_string()),
            merchant: "K-Market".to_string(),
            amount: 40.0,
            adjusted_amount: Some(20.0),
            category: Some("Groceries".to_string()),
            subcategory: Some("   ".to_string()),
            card: None,
            notes: Some("shared".to_string()),
        }])
        .unwrap();

        let tx = &table.rows()[0];
        assert_eq!(tx.dt(), d(2025, 3, 4).and_hms_opt(15, 30, 21).unwrap());
        assert_eq!(tx.subcategory, None);
        assert!(table.columns().adjusted_amount);
        assert!(!table.columns().subcategory);
    }

    #[test]
    fn test_from_records_rejects_bad_date() {
        let result = TransactionTable::from_records(vec![TransactionRecord {
            date: "04/03/2025".to_string(),
            merchant: "K-Market".to_string(),
            amount: 1.0,
            ..Default::default()
        }]);
        assert!(matches!(
            result,
            Err(AssistantError::InvalidTransaction { row: 0, .. })
        ));
    }

    #[test]
    fn test_text_column_parse_aliases() {
        assert_eq!(TextColumn::parse("2nd category"), Some(TextColumn::Subcategory));
        assert_eq!(TextColumn::parse(" Subcategory "), Some(TextColumn::Subcategory));
        assert_eq!(TextColumn::parse("weekday"), None);
    }
}
