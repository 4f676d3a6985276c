use dotenv::dotenv;
use spending_assistant::{
    AnswerSource, AssistantConfig, OpenAiClient, QueryAssistant, TransactionRecord,
    TransactionTable,
};
use std::error::Error;
use std::io::{self, Write};

const DEFAULT_CSV_PATH: &str = "data/transactions.csv";

fn load_table(path: &str) -> Result<TransactionTable, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader
        .deserialize::<TransactionRecord>()
        .collect::<Result<Vec<_>, _>>()?;
    let table = TransactionTable::from_records(records)?;

    if table.is_empty() {
        return Err(format!("{} contains no transactions", path).into());
    }

    Ok(table)
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CSV_PATH.to_string());

    println!("💬 Starting Transaction Chat...\n");

    let table = load_table(&path)?;
    println!(
        "✅ Loaded {} transactions from {} (amounts: {}).\n",
        table.len(),
        path,
        table.amount_column().as_str()
    );

    let config = AssistantConfig::from_env()?;
    let client = OpenAiClient::from_env(&config)?;
    let assistant = QueryAssistant::new(client, config)?;

    println!("🤖 Ready! Ask about your spending (type 'quit' to exit).");
    println!("------------------------------------------------------------------");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let prompt = input.trim();

        if prompt.eq_ignore_ascii_case("quit") || prompt.eq_ignore_ascii_case("exit") {
            break;
        }

        if prompt.is_empty() {
            continue;
        }

        println!("\nThinking...");

        let answer = assistant.answer(&table, prompt);
        let tag = match answer.source {
            AnswerSource::FastPath => "fast path",
            AnswerSource::Tools => "tools",
            AnswerSource::Fallback => "summary",
            AnswerSource::Diagnostic => "error",
        };
        if let Some(plan) = &answer.plan {
            println!("🔧 {} {}", plan.tool, serde_json::Value::Object(plan.args.clone()));
        }
        println!("\n[{}] {}\n", tag, answer.text);
        println!("------------------------------------------------------------------");
    }

    Ok(())
}
