//! Docbench main program entry

use clap::Parser;
use docbench::{
    Args, DocumentStore, MemoryStore, OperationMode, Reporter, RoundCoordinator, RunConfig,
};
use std::sync::Arc;
use tracing::{error, info};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing();

    let config = match RunConfig::from_args(&args) {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };

    println!("Docbench Load Generator");
    println!("=======================");
    println!(
        "Modes: {}",
        config
            .modes
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Thread counts: {:?}", config.thread_counts);
    println!("Operation budgets: {:?}", config.op_budgets);
    println!("Max duration: {}s", config.max_duration.as_secs());
    println!("Target: {}.{}", config.database, config.collection);
    println!();

    let store = Arc::new(MemoryStore::new());

    if config.drop_db && config.modes.contains(&OperationMode::Insert) {
        info!("dropping database '{}' before inserting", config.database);
        if let Err(err) = store.drop_database(&config.database) {
            error!("failed to drop database '{}': {}", config.database, err);
            std::process::exit(1);
        }
    }

    let reporter = Arc::new(Reporter::new(config.csv_dir.clone(), true));
    let coordinator = RoundCoordinator::new(store, reporter);

    match coordinator.run(&config) {
        Ok(reports) => {
            println!();
            println!("Run statistics:");
            for report in &reports {
                println!(
                    "    {:<12} {:>10} ops ({:>10.1}/s), affected {:>10}, {:>8} ms [{}]",
                    report.spec.mode.to_string(),
                    report.operations,
                    report.cumulative.mean_rate,
                    report.affected_documents,
                    report.duration.as_millis(),
                    report.outcome
                );
            }
        }
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    }
}
