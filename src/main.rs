use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{info, warn};

use lotdb::{
    error::Result,
    loader, report, script,
    sql::{
        engine::{Engine as SqlEngine, Transaction, kv::KVEngine},
        executor::ResultSet,
    },
    storage::{disk::DiskEngine, engine::Engine as StorageEngine, memory::MemoryEngine},
};

/// Loads a used-car sales dataset and runs a SQL analysis script over it
#[derive(Parser, Debug)]
#[command(name = "lotdb")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Load a used-car sales CSV and run a SQL analysis script")]
struct Args {
    /// CSV dataset to load into the base table
    dataset: PathBuf,

    /// SQL script with the analysis statements
    script: PathBuf,

    /// Catalog file; omit to run fully in memory
    #[arg(long)]
    db: Option<PathBuf>,

    /// Base table name for the dataset
    #[arg(long, default_value = "car_prices")]
    table: String,

    /// Compact the catalog file after the run (drops overwritten entries)
    #[arg(long)]
    compact: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let outcome = match &args.db {
        Some(path) => run_disk(path.clone(), &args),
        None => {
            if args.compact {
                warn!("--compact has no effect without --db");
            }
            run(KVEngine::new(MemoryEngine::new()), &args)
        }
    };
    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(1)
        }
    }
}

fn run_disk(path: PathBuf, args: &Args) -> Result<bool> {
    let engine = KVEngine::new(DiskEngine::new(path)?);
    let ok = run(engine.clone(), args)?;
    if args.compact {
        engine.kv.lock()?.compact()?;
        info!("compacted catalog file");
    }
    Ok(ok)
}

/// Ensures the base table, loads the dataset, runs the script and prints
/// each result. Returns whether every statement succeeded.
fn run<E: StorageEngine + 'static>(engine: KVEngine<E>, args: &Args) -> Result<bool> {
    let mut txn = engine.begin()?;
    let table = loader::ensure_table(&mut txn, loader::car_prices_table(&args.table))?;
    let stats = loader::load_csv(&mut txn, &args.dataset, &table)?;
    txn.commit()?;
    println!(
        "loaded {} rows into {} ({} skipped)",
        stats.loaded, table.name, stats.skipped
    );

    let text = std::fs::read_to_string(&args.script)?;
    let mut session = engine.session()?;
    let summary = script::run_script(&mut session, &text);

    for outcome in &summary.outcomes {
        println!();
        println!("> {}", outcome.sql);
        match &outcome.result {
            Ok(ResultSet::Scan { columns, rows }) => {
                println!("{}", report::render(columns, rows));
            }
            Ok(ResultSet::CreateTable {
                table_name,
                created,
            }) => println!("{}", created_line("table", table_name, *created)),
            Ok(ResultSet::CreateView { view_name, created }) => {
                println!("{}", created_line("view", view_name, *created));
            }
            Ok(ResultSet::CreateIndex {
                index_name,
                created,
            }) => println!("{}", created_line("index", index_name, *created)),
            Ok(ResultSet::Insert { count }) => println!("{} rows inserted", count),
            Err(err) => println!("error: {}", err),
        }
    }

    println!();
    for (i, outcome) in summary.outcomes.iter().enumerate() {
        let status = if outcome.result.is_ok() { "ok" } else { "failed" };
        println!("[{:>2}] {:<6} {}", i + 1, status, first_line(&outcome.sql));
    }
    println!(
        "{} statements, {} failed",
        summary.outcomes.len(),
        summary.failed()
    );
    Ok(summary.all_ok())
}

fn created_line(kind: &str, name: &str, created: bool) -> String {
    if created {
        format!("created {} {}", kind, name)
    } else {
        format!("{} {} already exists, skipped", kind, name)
    }
}

fn first_line(sql: &str) -> &str {
    sql.lines().next().unwrap_or(sql)
}
