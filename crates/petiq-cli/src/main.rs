//! petiq command line: fetch UK Parliament petition data and query it in
//! natural language.

mod display;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use petiq_ai::{OpenAiClient, QueryInterpreter};
use petiq_core::{CoercionWarning, PetitionRecord, TableSummary};
use petiq_fetch::{DEFAULT_ENDPOINT, FetchClient};

const SAMPLE_QUESTIONS: &str = "\
Sample questions:
  petiq ask \"Show me petitions with over 100,000 signatures\"
  petiq ask \"Find petitions related to healthcare or NHS\"
  petiq ask \"Show closed petitions about environment or climate\"
  petiq ask \"Which petitions have the highest signature counts?\"";

#[derive(Parser)]
#[command(
    name = "petiq",
    version,
    about = "Query UK Parliament petition data in natural language"
)]
struct Cli {
    /// Petition data endpoint URL.
    #[arg(
        long,
        env = "PETIQ_ENDPOINT",
        default_value = DEFAULT_ENDPOINT,
        hide_default_value = true,
        global = true
    )]
    endpoint: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the petition table and print a dataset overview.
    Fetch {
        /// Rows to show in the top-petitions table.
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Write the full table to a CSV file.
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },
    /// Ask a free-text question about the petition data.
    #[command(after_help = SAMPLE_QUESTIONS)]
    Ask {
        /// The question to interpret.
        question: String,
        /// Chat model used to interpret the question.
        #[arg(long, env = "OPENAI_MODEL", default_value = petiq_ai::DEFAULT_MODEL)]
        model: String,
        /// Rows to print from the matched set.
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Write the matched rows to a CSV file.
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::debug!("petiq v{}", env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();

    match cli.command {
        Command::Fetch { limit, csv } => run_fetch(cli.endpoint, limit, csv).await,
        Command::Ask {
            question,
            model,
            limit,
            csv,
        } => run_ask(cli.endpoint, question, model, limit, csv).await,
    }
}

async fn run_fetch(endpoint: String, limit: usize, csv: Option<PathBuf>) -> anyhow::Result<()> {
    let fetcher = FetchClient::new(endpoint)?;
    let outcome = fetcher.fetch_petitions().await?;
    report_warnings(&outcome.warnings);

    let Some(summary) = TableSummary::compute(outcome.table.records()) else {
        println!("The petition feed returned no records.");
        return Ok(());
    };
    display::print_summary(&summary, outcome.table.fetched_at());

    let rows: Vec<&PetitionRecord> = outcome.table.records().iter().collect();
    let shown = limit.min(rows.len());
    println!();
    println!("Top {shown} petitions by signatures");
    display::print_table(&rows[..shown]);
    println!();
    display::print_state_chart(&rows);

    if let Some(path) = csv {
        display::write_csv(&path, &rows)?;
        println!();
        println!("Wrote {} rows to {}", rows.len(), path.display());
    }
    Ok(())
}

async fn run_ask(
    endpoint: String,
    question: String,
    model: String,
    limit: usize,
    csv: Option<PathBuf>,
) -> anyhow::Result<()> {
    // The credential check comes before any network call, so a missing key
    // is reported without spending a fetch.
    let client = OpenAiClient::from_env(model)?;
    let interpreter = QueryInterpreter::new(client);

    let fetcher = FetchClient::new(endpoint)?;
    let outcome = fetcher.fetch_petitions().await?;
    report_warnings(&outcome.warnings);

    let result = interpreter.interpret(&question, &outcome.table).await?;

    println!("Interpretation: {}", result.interpreted_intent);
    println!();

    if result.matched_rows.is_empty() {
        println!("No petitions matched the question.");
    } else {
        display::print_metrics(&result.matched_rows);
        println!();
        let shown = limit.min(result.matched_rows.len());
        display::print_table(&result.matched_rows[..shown]);
        if shown < result.matched_rows.len() {
            println!(
                "  ({} more rows not shown; raise --limit to see them)",
                result.matched_rows.len() - shown
            );
        }
        println!();
        display::print_signature_chart(&result.matched_rows);
        display::print_state_chart(&result.matched_rows);
    }

    println!();
    println!("{}", result.narrative);

    if let Some(path) = csv {
        display::write_csv(&path, &result.matched_rows)?;
        println!();
        println!(
            "Wrote {} rows to {}",
            result.matched_rows.len(),
            path.display()
        );
    }
    Ok(())
}

fn report_warnings(warnings: &[CoercionWarning]) {
    if !warnings.is_empty() {
        eprintln!(
            "note: {} records had invalid signature counts recorded as 0",
            warnings.len()
        );
    }
}
