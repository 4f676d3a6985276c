//! Deterministic answers to order-based questions ("latest", "second to last").
//!
//! These questions are answered by a sorted scan of the table without any
//! model call. Matching is token based: English keywords must match a whole
//! word, Finnish ones a word prefix so inflected forms ("viimeisintä") count.
//! "last", "previous" and "next" are ignored when followed by a time unit or
//! a number. Plain substring matching would answer "how much did I spend
//! last month" with the newest row; with this guard such period questions go
//! to the tools path instead.

use crate::table::{Transaction, TransactionTable};

struct Keyword {
    word: &'static str,
    prefix: bool,
    /// Not an order keyword when followed by a time unit or a number.
    guarded: bool,
}

const fn en(word: &'static str, guarded: bool) -> Keyword {
    Keyword {
        word,
        prefix: false,
        guarded,
    }
}

const fn fi(word: &'static str, guarded: bool) -> Keyword {
    Keyword {
        word,
        prefix: true,
        guarded,
    }
}

const KEYWORDS: &[Keyword] = &[
    en("latest", false),
    en("newest", false),
    en("last", true),
    en("previous", true),
    en("next", true),
    fi("viimeisin", false),
    fi("uusin", false),
    fi("viimeinen", true),
    fi("vika", false),
    fi("edellinen", true),
    fi("seuraava", true),
];

const THIRD: &[&str] = &["third", "kolmanneksi"];
const SECOND: &[&str] = &["second", "toiseksi", "previous", "edellinen"];

const UNIT_WORDS: &[&str] = &[
    "day", "days", "week", "weeks", "weekend", "month", "months", "quarter", "quarters", "year",
    "years",
];
const UNIT_PREFIXES: &[&str] = &["kuu", "viiko", "viikk", "vuo", "päiv"];

/// A detected order-based question: which transaction, counted from the newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderQuery {
    pub index: usize,
}

impl OrderQuery {
    pub fn label(&self) -> &'static str {
        match self.index {
            0 => "Latest",
            1 => "Second-to-last",
            _ => "Third-to-last",
        }
    }
}

fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_time_unit(token: &str) -> bool {
    token.chars().all(|c| c.is_ascii_digit())
        || UNIT_WORDS.contains(&token)
        || UNIT_PREFIXES.iter().any(|p| token.starts_with(p))
}

fn matches(keyword: &Keyword, token: &str) -> bool {
    if keyword.prefix {
        token.starts_with(keyword.word)
    } else {
        token == keyword.word
    }
}

/// Returns the requested position when `query` is an order-based question.
pub fn detect_order_query(query: &str) -> Option<OrderQuery> {
    let tokens = tokenize(query);
    let mut found = false;
    let mut index = 0;

    for (i, token) in tokens.iter().enumerate() {
        let Some(keyword) = KEYWORDS.iter().find(|k| matches(k, token)) else {
            if THIRD.contains(&token.as_str()) {
                index = index.max(2);
            } else if token == "second" || token == "toiseksi" {
                index = index.max(1);
            }
            continue;
        };
        if keyword.guarded && tokens.get(i + 1).is_some_and(|next| is_time_unit(next)) {
            continue;
        }
        found = true;
        if SECOND.iter().any(|s| token.starts_with(s)) {
            index = index.max(1);
        }
    }

    found.then_some(OrderQuery { index })
}

/// `<dt> | <merchant> | €<amount> | <category> / <2nd category>`
pub fn format_transaction(table: &TransactionTable, tx: &Transaction) -> String {
    format!(
        "{} | {} | €{:.2} | {} / {}",
        tx.dt().format("%Y-%m-%d %H:%M:%S"),
        tx.merchant,
        table.amount_of(tx),
        tx.category.as_deref().unwrap_or(""),
        tx.subcategory.as_deref().unwrap_or(""),
    )
}

pub fn answer_order_query(table: &TransactionTable, query: OrderQuery) -> String {
    match table.sorted_by_dt_desc().get(query.index) {
        Some(tx) => format!(
            "{} transaction: {}",
            query.label(),
            format_transaction(table, tx)
        ),
        None => format!(
            "Not enough transactions found. The table holds {} transactions.",
            table.len()
        ),
    }
}

/// The fast-path answer, or `None` when the question is not order based or
/// the table is empty.
pub fn try_order_query(table: &TransactionTable, query: &str) -> Option<String> {
    if table.is_empty() {
        return None;
    }
    detect_order_query(query).map(|q| answer_order_query(table, q))
}
