//! queryspeak: ask a SQLite database questions in plain language.
//!
//! # Usage
//!
//! ```bash
//! # Ask a question (needs GROQ_API_KEY)
//! queryspeak ask "Who are the five best paid employees?"
//!
//! # Repair or canonicalize SQL without a model
//! queryspeak fix "SELECT id name FROM employees"
//! queryspeak optimize "select * from employees"
//!
//! # Interactive session
//! queryspeak repl
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use queryspeak::engine::cell_to_string;
use queryspeak::prelude::*;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "queryspeak")]
#[command(version)]
#[command(about = "Ask a SQLite database questions in plain language", long_about = None)]
#[command(after_help = "EXAMPLES:
    queryspeak ask 'How many employees are in each department?'
    queryspeak fix 'SELECT FROM employees'
    queryspeak explain 'SELECT name FROM employees WHERE salary > 50000 LIMIT 5'")]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "QUERYSPEAK_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// API key for the query generator
    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a question into SQL and run it
    Ask {
        question: String,

        /// Normalize the repaired SQL before running it
        #[arg(long)]
        optimize: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Repair SQL against the live schema
    Fix { sql: String },
    /// Normalize SQL against the live schema
    Optimize { sql: String },
    /// Describe what a query does
    Explain { sql: String },
    /// Run SQL once and classify any failure
    Debug { sql: String },
    /// Print the database schema
    Schema,
    /// Interactive session
    Repl,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("queryspeak=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("queryspeak=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_overrides(cli.database_url, cli.api_key);

    if cli.verbose {
        eprintln!("{} {}", "Database:".dimmed(), config.database_url);
    }

    let provider = SqliteSchemaProvider::new(&config.database_url);
    let executor = SqliteExecutor::new(&config.database_url);

    match cli.command {
        Commands::Ask {
            question,
            optimize,
            format,
        } => {
            let mut options = PipelineOptions::from(&config.pipeline);
            options.normalize |= optimize;
            let generator = ChatGenerator::new(config.generator.clone())?;
            let pipeline = Pipeline::new(provider, generator, executor).with_options(options);

            let answer = pipeline.ask(&question).await?;
            print_answer(&answer, format)?;
        }
        Commands::Fix { sql } => {
            let schema = provider.schema().await?;
            print_rewrite(&repair(&sql, &schema), cli.verbose);
        }
        Commands::Optimize { sql } => {
            let schema = provider.schema().await?;
            print_rewrite(&normalize(&sql, &schema, config.pipeline.row_cap), cli.verbose);
        }
        Commands::Explain { sql } => print_explanation(&explain(&sql)),
        Commands::Debug { sql } => print_diagnostic(&debug(&executor, &sql).await),
        Commands::Schema => {
            let schema = provider.schema().await?;
            print_schema(&schema);
        }
        Commands::Repl => {
            let limit = config.pipeline.history_limit;
            let options = PipelineOptions::from(&config.pipeline);
            let generator = ChatGenerator::new(config.generator.clone())?;
            let pipeline = Pipeline::new(provider, generator, executor).with_options(options);
            run_repl(&pipeline, Session::new(limit)).await;
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct AnswerJson<'a> {
    question: &'a str,
    sql: &'a str,
    repaired: Vec<&'static str>,
    result: &'a Outcome,
}

fn print_answer(answer: &Answer, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let doc = AnswerJson {
                question: &answer.question,
                sql: &answer.sql,
                repaired: answer.repair.applied(),
                result: &answer.outcome,
            };
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Table => {
            println!("{}", "Generated SQL:".green().bold());
            println!("  {}", answer.sql.white());
            let applied = answer.repair.applied();
            if !applied.is_empty() {
                println!("  {} {}", "repaired:".dimmed(), applied.join(", ").dimmed());
            }
            println!();
            match &answer.outcome {
                Outcome::Rows(rows) => print_table(rows),
                Outcome::Failed(message) => {
                    println!("{} {}", "SQL Execution Error:".red().bold(), message);
                }
            }
        }
    }
    Ok(())
}

fn print_rewrite(rewrite: &Rewrite, verbose: bool) {
    println!("{}", rewrite.sql.white().bold());

    let applied = rewrite.applied();
    if applied.is_empty() {
        println!("{}", "(no changes)".dimmed());
    } else {
        println!("{} {}", "applied:".dimmed(), applied.join(", ").cyan());
    }

    if verbose {
        for report in &rewrite.rules {
            if let RuleOutcome::Skipped(reason) = &report.outcome {
                println!("  {} {}: {}", "skipped".dimmed(), report.rule, reason);
            }
        }
    }
}

fn print_explanation(explanation: &Explanation) {
    println!("{}", "Explanation:".cyan().bold());
    for line in explanation.lines() {
        println!("  • {}", line);
    }
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    match diagnostic {
        Diagnostic::Succeeded { rows } => {
            println!("{} {}", "✓".green(), diagnostic.to_string().green());
            println!();
            print_table(rows);
        }
        Diagnostic::Failed { .. } => println!("{} {}", "✗".red(), diagnostic.to_string().red()),
        Diagnostic::Severe { .. } => println!("{}", diagnostic.to_string().red().bold()),
    }
}

fn print_schema(schema: &SchemaModel) {
    if schema.is_empty() {
        println!("{}", "(no tables)".dimmed());
        return;
    }
    for table in schema.tables() {
        println!("{}", table.name.cyan().bold());
        for column in &table.columns {
            println!("  {:20} {}", column.name.white(), column.data_type.dimmed());
        }
    }
}

fn print_table(rows: &[Row]) {
    if rows.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    // Rows carry no column names, so headers are positional.
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let headers: Vec<String> = (1..=width).map(|i| format!("Column {}", i)).collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let header: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{:w$}", h, w = *w))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in &cells {
        let line: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:w$}", row.get(i).map(String::as_str).unwrap_or(""), w = *w))
            .collect();
        println!("{}", line.join(" │ "));
    }

    println!();
    println!("{} row(s) returned", rows.len().to_string().cyan());
}

async fn run_repl<P, G, E>(pipeline: &Pipeline<P, G, E>, mut session: Session)
where
    P: SchemaProvider,
    G: QueryGenerator,
    E: Executor,
{
    use rustyline::DefaultEditor;
    use rustyline::error::ReadlineError;

    println!("{}", "QuerySpeak REPL".cyan().bold());
    println!("{}", "Type a question, or .help for commands.".dimmed());
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{} {}", "Failed to initialize REPL:".red(), e);
            return;
        }
    };

    let history_path = dirs::home_dir()
        .map(|p| p.join(".queryspeak_history"))
        .unwrap_or_default();
    let _ = rl.load_history(&history_path);

    loop {
        let prompt = "queryspeak> ".cyan().bold().to_string();
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{} {:?}", "Error:".red(), err);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match command {
            ".exit" | ".quit" => break,
            ".help" => show_repl_help(),
            ".history" => show_history(&session),
            ".schema" => match pipeline.schema().await {
                Ok(schema) => print_schema(&schema),
                Err(e) => eprintln!("{} {}", "✗".red(), e.to_string().red()),
            },
            ".explain" | ".fix" | ".optimize" | ".debug" => {
                let Some(sql) = target_sql(arg, &session) else {
                    println!("{}", "Ask a question first, or pass SQL after the command.".yellow());
                    continue;
                };
                match command {
                    ".explain" => print_explanation(&pipeline.explain(&sql)),
                    ".debug" => print_diagnostic(&pipeline.debug(&sql).await),
                    ".fix" => match pipeline.fix(&sql).await {
                        Ok(rewrite) => print_rewrite(&rewrite, false),
                        Err(e) => eprintln!("{} {}", "✗".red(), e.to_string().red()),
                    },
                    _ => match pipeline.optimize(&sql).await {
                        Ok(rewrite) => print_rewrite(&rewrite, false),
                        Err(e) => eprintln!("{} {}", "✗".red(), e.to_string().red()),
                    },
                }
            }
            cmd if cmd.starts_with('.') => {
                println!("{} {}", "Unknown command:".yellow(), cmd);
            }
            _ => match pipeline.ask(line).await {
                Ok(answer) => {
                    if let Err(e) = print_answer(&answer, OutputFormat::Table) {
                        eprintln!("{} {}", "✗".red(), e);
                    }
                    session.record(answer);
                }
                Err(e) => eprintln!("{} {}", "✗".red(), e.to_string().red()),
            },
        }
        println!();
    }

    println!("{}", "Goodbye!".green());
    let _ = rl.save_history(&history_path);
}

/// SQL given after a dot-command, else the latest answer's SQL.
fn target_sql(arg: &str, session: &Session) -> Option<String> {
    if !arg.is_empty() {
        return Some(arg.to_string());
    }
    session.latest().map(|answer| answer.sql.clone())
}

fn show_history(session: &Session) {
    if session.history().is_empty() {
        println!("{}", "(no questions yet)".dimmed());
        return;
    }
    for entry in session.history().iter().rev() {
        println!("{} {}", format!("[{}]", entry.time).dimmed(), entry.question.white());
        println!("           {}", entry.sql.dimmed());
    }
}

fn show_repl_help() {
    println!("{}", "QuerySpeak REPL Commands:".cyan().bold());
    println!("  {}        - Ask a question", "<question>".yellow());
    println!("  {}   - Describe the latest (or given) SQL", ".explain [sql]".yellow());
    println!("  {}       - Repair the latest (or given) SQL", ".fix [sql]".yellow());
    println!("  {}  - Normalize the latest (or given) SQL", ".optimize [sql]".yellow());
    println!("  {}     - Run and diagnose the latest (or given) SQL", ".debug [sql]".yellow());
    println!("  {}          - Recent questions", ".history".yellow());
    println!("  {}           - Show the database schema", ".schema".yellow());
    println!("  {}             - Exit the REPL", ".exit".yellow());
}
