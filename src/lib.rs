//! # Spending Assistant
//!
//! Natural-language questions over a personal transaction table, answered
//! without letting a language model touch the data.
//!
//! ## Core Concepts
//!
//! - **Plan**: a tool name plus arguments, proposed by a router model and
//!   sanitized by [`validate_plan`] before anything runs
//! - **Period tokens**: relative ranges such as `last_month`, expanded into
//!   concrete dates against an injected "today"
//! - **Tools**: deterministic aggregations over the table (sums, top lists,
//!   monthly groupings, recurring merchants, trends)
//! - **Facts**: the execution result handed to a narrator model, which may
//!   only phrase what the facts contain
//! - **Fast path**: order-based questions ("latest", "second to last") are
//!   answered by a sorted scan with no model call at all
//!
//! ## Example
//!
//! ```rust,ignore
//! use spending_assistant::*;
//! use chrono::NaiveDate;
//!
//! let table = TransactionTable::new(vec![
//!     Transaction::new(NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(), "Prisma", 12.0)
//!         .with_category("Groceries"),
//! ]);
//!
//! let config = AssistantConfig::from_env()?;
//! let client = OpenAiClient::from_env(&config)?;
//! let assistant = QueryAssistant::new(client, config)?;
//!
//! let answer = assistant.answer(&table, "How much did I spend at Prisma last month?");
//! println!("[{:?}] {}", answer.source, answer.text);
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod order_query;
pub mod period;
pub mod plan;
pub mod summary;
pub mod table;
pub mod tools;

pub use config::AssistantConfig;
pub use error::{AssistantError, LlmError, Result};
pub use executor::{execute_plan, Execution, ToolCall};
pub use llm::*;
pub use order_query::{answer_order_query, detect_order_query, try_order_query, OrderQuery};
pub use period::{expand_period, today_in, DateRange, Period, REFERENCE_TIMEZONE};
pub use plan::{validate_plan, Plan, PlanValidation, ToolName};
pub use summary::TableSummary;
pub use table::{AmountColumn, ColumnSet, TextColumn, Transaction, TransactionRecord, TransactionTable};
pub use tools::{BasicStats, ResultRow, ToolResult, ToolSummary};
