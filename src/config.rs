//! Run configuration
//!
//! Command-line surface and its validation, and the expansion of the
//! configured thread-count list into the ordered mode sequence the
//! coordinator partitions into rounds.

use crate::types::{DocbenchError, DocbenchResult, OperationMode, RunModeSpec};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_THREADS: usize = 10;
const DEFAULT_MAX_DURATION_SECONDS: u64 = 3600;

#[derive(Parser, Debug, Clone)]
#[command(name = "docbench")]
#[command(version)]
#[command(about = "Document store load-generation and benchmarking tool")]
#[command(long_about = "Document store load-generation and benchmarking tool.\n\
    Run mode INSERT first in order to have a non-empty collection to test on.\n\
    Modes defined together are executed simultaneously with their corresponding\n\
    number of threads; further thread counts restart all modes as the next round\n\
    as soon as every mode of the current round has terminated.")]
pub struct Args {
    /// Operation modes executed simultaneously (INSERT, UPDATE_ONE, UPDATE_MANY,
    /// COUNT_ONE, COUNT_MANY, FIND_ONE, FIND_MANY, DELETE_ONE, DELETE_MANY, WAIT)
    #[arg(short = 'm', long = "mode", num_args = 1.., default_values_t = [String::from("INSERT")])]
    pub modes: Vec<String>,

    /// Number of operations per mode; 0 relies purely on --duration.
    /// One value per mode, or a single value applied to every mode
    #[arg(short = 'o', long = "operationscount", num_args = 1..)]
    pub operations_counts: Vec<u64>,

    /// Worker threads per mode-run; values beyond the mode list form further rounds
    #[arg(short = 't', long = "threads", num_args = 1.., default_values_t = [DEFAULT_THREADS])]
    pub thread_counts: Vec<usize>,

    /// Maximum duration in seconds of each mode-run
    #[arg(short = 'd', long = "duration", default_value_t = DEFAULT_MAX_DURATION_SECONDS)]
    pub duration: u64,

    /// Drop the database before inserting documents
    #[arg(long = "dropdb")]
    pub drop_db: bool,

    /// Size in bytes of the random text field on inserted documents, absent if 0
    #[arg(short = 's', long = "randomtextsize", default_value_t = 0)]
    pub random_text_size: usize,

    /// Database on which the test is executed
    #[arg(long = "db", default_value = "test")]
    pub database: String,

    /// Collection on which the test is executed
    #[arg(short = 'c', long = "collection", default_value = "perf")]
    pub collection: String,

    /// Directory for CSV statistics; CSV output is disabled when omitted
    #[arg(long = "csv-dir")]
    pub csv_dir: Option<PathBuf>,

    /// Base seed for the per-worker random sources
    #[arg(long = "seed", default_value_t = 0)]
    pub seed: u64,
}

/// Validated run configuration
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub modes: Vec<OperationMode>,
    /// Operation budget per mode, same order as `modes`; 0 = unbounded
    pub op_budgets: Vec<u64>,
    /// One entry per mode-run; chunks of `modes.len()` form rounds
    pub thread_counts: Vec<usize>,
    pub max_duration: Duration,
    pub database: String,
    pub collection: String,
    pub drop_db: bool,
    pub random_text_len: usize,
    pub csv_dir: Option<PathBuf>,
    pub seed: u64,
}

impl RunConfig {
    pub fn from_args(args: &Args) -> DocbenchResult<Self> {
        if args.modes.is_empty() {
            return Err(DocbenchError::Config("at least one mode is required".into()));
        }
        let modes = args
            .modes
            .iter()
            .map(|s| s.parse())
            .collect::<DocbenchResult<Vec<OperationMode>>>()?;

        let op_budgets = match args.operations_counts.len() {
            0 => vec![0; modes.len()],
            1 => vec![args.operations_counts[0]; modes.len()],
            n if n == modes.len() => args.operations_counts.clone(),
            n => {
                return Err(DocbenchError::Config(format!(
                    "number of operations parameters (-o) must equal the number of \
                     mode parameters (-m) but was {} and {}",
                    n,
                    modes.len()
                )));
            }
        };

        if args.thread_counts.is_empty() {
            return Err(DocbenchError::Config(
                "at least one thread count is required".into(),
            ));
        }
        if let Some(bad) = args.thread_counts.iter().find(|&&t| t < 1) {
            return Err(DocbenchError::Config(format!(
                "threads must be >= 1, got {}",
                bad
            )));
        }

        if args.duration < 1 {
            return Err(DocbenchError::Config(
                "duration in seconds must be >= 1".into(),
            ));
        }

        if args.database.is_empty() {
            return Err(DocbenchError::Config("database name must not be empty".into()));
        }
        if args.collection.is_empty() {
            return Err(DocbenchError::Config(
                "collection name must not be empty".into(),
            ));
        }

        Ok(RunConfig {
            modes,
            op_budgets,
            thread_counts: args.thread_counts.clone(),
            max_duration: Duration::from_secs(args.duration),
            database: args.database.clone(),
            collection: args.collection.clone(),
            drop_db: args.drop_db,
            random_text_len: args.random_text_size,
            csv_dir: args.csv_dir.clone(),
            seed: args.seed,
        })
    }

    /// Expand the thread-count list into the ordered mode sequence: the i-th
    /// entry runs mode `i % modes.len()` with that thread count. Chunks of
    /// `modes.len()` consecutive entries form rounds.
    pub fn mode_sequence(&self) -> Vec<RunModeSpec> {
        self.thread_counts
            .iter()
            .enumerate()
            .map(|(i, &threads)| {
                let mode_index = i % self.modes.len();
                RunModeSpec {
                    mode: self.modes[mode_index],
                    threads,
                    op_budget: self.op_budgets[mode_index],
                    max_duration: self.max_duration,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            modes: vec!["INSERT".to_string()],
            operations_counts: vec![],
            thread_counts: vec![DEFAULT_THREADS],
            duration: DEFAULT_MAX_DURATION_SECONDS,
            drop_db: false,
            random_text_size: 0,
            database: "test".to_string(),
            collection: "perf".to_string(),
            csv_dir: None,
            seed: 0,
        }
    }

    #[test]
    fn test_defaults_build_one_insert_mode_run() {
        let config = RunConfig::from_args(&base_args()).unwrap();
        let specs = config.mode_sequence();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].mode, OperationMode::Insert);
        assert_eq!(specs[0].threads, DEFAULT_THREADS);
        assert_eq!(specs[0].op_budget, 0);
        assert_eq!(specs[0].max_duration, Duration::from_secs(3600));
    }

    #[test]
    fn test_modes_cycle_through_thread_counts() {
        let mut args = base_args();
        args.modes = vec!["UPDATE_ONE".to_string(), "COUNT_ONE".to_string()];
        args.operations_counts = vec![5, 7];
        args.thread_counts = vec![2, 4, 8, 16];
        let config = RunConfig::from_args(&args).unwrap();

        let specs = config.mode_sequence();
        assert_eq!(specs.len(), 4);
        assert_eq!(specs[0].mode, OperationMode::UpdateOne);
        assert_eq!(specs[1].mode, OperationMode::CountOne);
        assert_eq!(specs[2].mode, OperationMode::UpdateOne);
        assert_eq!(specs[3].mode, OperationMode::CountOne);
        assert_eq!(specs[2].threads, 8);
        assert_eq!(specs[0].op_budget, 5);
        assert_eq!(specs[3].op_budget, 7);
    }

    #[test]
    fn test_single_operations_count_broadcasts() {
        let mut args = base_args();
        args.modes = vec!["INSERT".to_string(), "DELETE_ONE".to_string()];
        args.operations_counts = vec![100];
        args.thread_counts = vec![1, 1];
        let config = RunConfig::from_args(&args).unwrap();
        assert_eq!(config.op_budgets, vec![100, 100]);
    }

    #[test]
    fn test_mismatched_operations_counts_are_rejected() {
        let mut args = base_args();
        args.modes = vec!["INSERT".to_string(), "DELETE_ONE".to_string()];
        args.operations_counts = vec![1, 2, 3];
        assert!(matches!(
            RunConfig::from_args(&args),
            Err(DocbenchError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let mut args = base_args();
        args.modes = vec!["TRUNCATE".to_string()];
        assert!(matches!(
            RunConfig::from_args(&args),
            Err(DocbenchError::Config(_))
        ));
    }

    #[test]
    fn test_mode_parsing_is_case_insensitive() {
        let mut args = base_args();
        args.modes = vec!["update_many".to_string()];
        let config = RunConfig::from_args(&args).unwrap();
        assert_eq!(config.modes, vec![OperationMode::UpdateMany]);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut args = base_args();
        args.thread_counts = vec![4, 0];
        assert!(matches!(
            RunConfig::from_args(&args),
            Err(DocbenchError::Config(_))
        ));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let mut args = base_args();
        args.duration = 0;
        assert!(matches!(
            RunConfig::from_args(&args),
            Err(DocbenchError::Config(_))
        ));
    }

    #[test]
    fn test_partial_final_round_is_allowed() {
        // three thread counts over two modes: the last group has one entry
        let mut args = base_args();
        args.modes = vec!["COUNT_ONE".to_string(), "COUNT_MANY".to_string()];
        args.thread_counts = vec![2, 2, 2];
        let config = RunConfig::from_args(&args).unwrap();
        assert_eq!(config.mode_sequence().len(), 3);
    }
}
