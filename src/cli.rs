use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::mempool_visibility::DEFAULT_NETWORK;

#[derive(Parser, Debug)]
#[command(
    name = "xatu-queries",
    version,
    about = "Mempool visibility and network overview extracts from Xatu ClickHouse"
)]
pub struct Cli {
    /// JSON config file with clickhouse_* settings (falls back to XATU_QUERIES_CONFIG_PATH).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Transaction counts per slot and type.
    TxPerSlot(FetchArgs),
    /// Hourly share of canonical transactions seen in the mempool.
    MempoolCoverage(FetchArgs),
    /// Per-sentry share of canonical transactions observed.
    SentryCoverage(FetchArgs),
    /// Per-slot availability with age/delay percentiles and histograms.
    MempoolAvailability(FetchArgs),
    /// Hourly heartbeat peers per client, written to Parquet.
    NetworkParticipants(PersistArgs),
    /// Hourly connected peers per client, written to Parquet.
    ConnectedPeers(PersistArgs),
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Target UTC day (YYYY-MM-DD).
    #[arg(long)]
    pub date: NaiveDate,
    #[arg(long, default_value = DEFAULT_NETWORK)]
    pub network: String,
    /// Write rows to this Parquet file instead of printing them as JSON lines.
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Print the issued query and its bound parameters to stderr.
    #[arg(long, default_value_t = false)]
    pub print_query: bool,
}

#[derive(Args, Debug)]
pub struct PersistArgs {
    #[arg(long)]
    pub date: NaiveDate,
    #[arg(long, default_value = DEFAULT_NETWORK)]
    pub network: String,
    #[arg(long)]
    pub output: PathBuf,
    #[arg(long, default_value_t = false)]
    pub print_query: bool,
}
