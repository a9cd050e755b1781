//! Stats command implementation

use crate::cli::logging::log;
use crate::cli::LogLevel;
use crate::config::cli::StatsArgs;
use crate::data::{read_annotated, DatasetStats};

pub fn run_stats(args: StatsArgs, level: LogLevel) -> Result<(), String> {
    let records = read_annotated(&args.fasta, args.key_format).map_err(|e| format!("Data error: {e}"))?;
    let stats = DatasetStats::from_records(&records, args.max_length);
    log(level, LogLevel::Normal, &format!("{}:", args.fasta.display()));
    log(level, LogLevel::Normal, &stats.to_string());
    Ok(())
}
