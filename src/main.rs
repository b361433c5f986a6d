use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufWriter, Write};
use xatu_queries::cli::{Cli, Commands, FetchArgs, PersistArgs};
use xatu_queries::config::ClickHouseConfig;
use xatu_queries::mempool_visibility::{self, Fetched};
use xatu_queries::network_overview::{self, Persisted};
use xatu_queries::ClickHouseClient;

fn emit(fetched: Fetched, args: &FetchArgs) -> Result<()> {
    if args.print_query {
        eprintln!("{}", fetched.query);
    }
    match &args.output {
        Some(path) => {
            let rows = fetched
                .persist(path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {rows} rows to {}", path.display());
        }
        None => {
            let mut out = BufWriter::new(std::io::stdout().lock());
            for row in fetched.table.row_objects() {
                serde_json::to_writer(&mut out, &row)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
        }
    }
    Ok(())
}

fn report(persisted: Persisted, args: &PersistArgs) {
    if args.print_query {
        eprintln!("{}", persisted.query);
    }
    println!(
        "Wrote {} rows to {}",
        persisted.rows,
        persisted.path.display()
    );
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ClickHouseConfig::load(cli.config.as_deref())?;
    let client = ClickHouseClient::new(&config).context("failed to build clickhouse client")?;

    match cli.command {
        Commands::TxPerSlot(args) => emit(
            mempool_visibility::fetch_tx_per_slot(&client, args.date, &args.network)?,
            &args,
        ),
        Commands::MempoolCoverage(args) => emit(
            mempool_visibility::fetch_mempool_coverage(&client, args.date, &args.network)?,
            &args,
        ),
        Commands::SentryCoverage(args) => emit(
            mempool_visibility::fetch_sentry_coverage(&client, args.date, &args.network)?,
            &args,
        ),
        Commands::MempoolAvailability(args) => emit(
            mempool_visibility::fetch_mempool_availability(&client, args.date, &args.network)?,
            &args,
        ),
        Commands::NetworkParticipants(args) => {
            let persisted = network_overview::fetch_unique_network_participants_per_client(
                &client,
                args.date,
                &args.output,
                &args.network,
            )?;
            report(persisted, &args);
            Ok(())
        }
        Commands::ConnectedPeers(args) => {
            let persisted = network_overview::fetch_connected_peers_per_client(
                &client,
                args.date,
                &args.output,
                &args.network,
            )?;
            report(persisted, &args);
            Ok(())
        }
    }
}
