//! How visible canonical transactions were in the public mempool before inclusion.
//!
//! Every fetch binds the network and the target day as query parameters, runs one query through
//! the supplied [`QueryClient`] and returns the rows together with the query that produced them.

use chrono::NaiveDate;
use serde_json::Value;
use std::path::Path;
use tracing::info;

use crate::client::QueryClient;
use crate::error::{Error, Result};
use crate::filters::{Interval, Window};
use crate::histogram::{hist_column_names, hist_columns, BUCKET_COUNT};
use crate::parquet;
use crate::query::{Params, Query};
use crate::table::{value_as_f64, Table};

pub const CANONICAL_TX_TABLE: &str = "canonical_beacon_block_execution_transaction";
pub const MEMPOOL_TX_TABLE: &str = "mempool_transaction";

pub const DEFAULT_NETWORK: &str = "mainnet";

/// Percentile points reported for both age and delay.
pub const PERCENTILES: [f64; 7] = [0.50, 0.75, 0.80, 0.85, 0.90, 0.95, 0.99];

/// First-seen timestamps at or before this date are placeholders, not observations. Unmatched
/// rows of a ClickHouse LEFT JOIN also carry the epoch default unless `join_use_nulls` is set.
const FIRST_SEEN_SENTINEL: &str = "2020-01-01";

const DAY_WINDOW: Window = Window::day();
const MEMPOOL_WINDOW: Window = Window::day().with_lookback(Interval::hours(1));
const FIRST_SEEN_WINDOW: Window = Window::day()
    .with_lookback(Interval::days(1))
    .with_span(Interval::days(2));

const AGE_MS: &str = "dateDiff('millisecond', m.first_event_time, c.slot_start_date_time)";
const DELAY_MS: &str = "dateDiff('millisecond', c.slot_start_date_time, m.first_event_time)";

/// Rows of one fetch plus the exact query that produced them.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub table: Table,
    pub query: Query,
}

impl Fetched {
    pub fn persist(&self, path: &Path) -> Result<u64> {
        parquet::write_parquet(&self.table, path)
    }
}

struct Bound {
    params: Params,
    network: String,
    day: String,
}

fn bind(date: NaiveDate, network: &str) -> Bound {
    let mut params = Params::new();
    let network = params.bind("network", network);
    let day = params.bind("target_date", date);
    Bound {
        params,
        network,
        day,
    }
}

fn run<C: QueryClient + ?Sized>(
    client: &C,
    fetch: &'static str,
    date: NaiveDate,
    network: &str,
    query: Query,
) -> Result<Fetched> {
    let table = client.query(&query)?;
    info!(fetch, %date, network, rows = table.len(), "fetched");
    Ok(Fetched { table, query })
}

/// Transactions per slot and type on the target day. No mempool join.
pub fn fetch_tx_per_slot<C: QueryClient + ?Sized>(
    client: &C,
    date: NaiveDate,
    network: &str,
) -> Result<Fetched> {
    let Bound {
        params,
        network: network_param,
        day,
    } = bind(date, network);
    let date_filter = DAY_WINDOW.predicate("slot_start_date_time", &day);

    let sql = format!(
        r#"
SELECT
    slot,
    slot_start_date_time,
    type AS tx_type,
    count() AS total_txs
FROM {CANONICAL_TX_TABLE}
WHERE meta_network_name = {network_param}
  AND {date_filter}
GROUP BY slot, slot_start_date_time, type
ORDER BY slot, type
"#
    );

    run(client, "tx_per_slot", date, network, Query::new(sql, params))
}

/// Hourly totals per type and how many of those hashes the mempool saw between one hour before
/// the day and the end of the day.
pub fn fetch_mempool_coverage<C: QueryClient + ?Sized>(
    client: &C,
    date: NaiveDate,
    network: &str,
) -> Result<Fetched> {
    let Bound {
        params,
        network: network_param,
        day,
    } = bind(date, network);
    let date_filter = DAY_WINDOW.predicate("slot_start_date_time", &day);
    let mempool_filter = MEMPOOL_WINDOW.predicate("event_date_time", &day);

    // GLOBAL IN ships the deduplicated hash set to every shard once.
    let sql = format!(
        r#"
SELECT
    toStartOfHour(slot_start_date_time) AS hour,
    type AS tx_type,
    count() AS total_txs,
    countIf(hash GLOBAL IN (
        SELECT DISTINCT hash
        FROM {MEMPOOL_TX_TABLE}
        WHERE meta_network_name = {network_param}
          AND {mempool_filter}
    )) AS seen_in_mempool
FROM {CANONICAL_TX_TABLE}
WHERE meta_network_name = {network_param}
  AND {date_filter}
GROUP BY hour, tx_type
ORDER BY hour, tx_type
"#
    );

    run(client, "mempool_coverage", date, network, Query::new(sql, params))
}

/// Distinct canonical hashes each sentry observed, and their share of all canonical hashes of
/// the day. The denominator is one CTE shared by every sentry row.
pub fn fetch_sentry_coverage<C: QueryClient + ?Sized>(
    client: &C,
    date: NaiveDate,
    network: &str,
) -> Result<Fetched> {
    let Bound {
        params,
        network: network_param,
        day,
    } = bind(date, network);
    let date_filter = DAY_WINDOW.predicate("slot_start_date_time", &day);
    let mempool_filter = MEMPOOL_WINDOW.predicate("event_date_time", &day);

    let sql = format!(
        r#"
WITH canonical_hashes AS (
    SELECT DISTINCT hash
    FROM {CANONICAL_TX_TABLE}
    WHERE meta_network_name = {network_param}
      AND {date_filter}
),
total_canonical AS (
    SELECT count() AS total FROM canonical_hashes
)
SELECT
    meta_client_name AS sentry,
    count(DISTINCT hash) AS txs_seen,
    round(count(DISTINCT hash) * 100.0 / (SELECT total FROM total_canonical), 2) AS coverage_pct
FROM {MEMPOOL_TX_TABLE}
WHERE meta_network_name = {network_param}
  AND {mempool_filter}
  AND hash GLOBAL IN (SELECT hash FROM canonical_hashes)
GROUP BY meta_client_name
ORDER BY txs_seen DESC
"#
    );

    run(client, "sentry_coverage", date, network, Query::new(sql, params))
}

/// First seen in the mempool strictly before the containing slot started.
pub(crate) fn seen_before_condition() -> String {
    format!(
        "m.first_event_time IS NOT NULL AND m.first_event_time > '{FIRST_SEEN_SENTINEL}' AND m.first_event_time < c.slot_start_date_time"
    )
}

/// First seen in the mempool at or after the containing slot started.
pub(crate) fn seen_after_condition() -> String {
    format!(
        "m.first_event_time IS NOT NULL AND m.first_event_time > '{FIRST_SEEN_SENTINEL}' AND m.first_event_time >= c.slot_start_date_time"
    )
}

fn quantiles_if(value_expr: &str, condition: &str) -> String {
    let levels = PERCENTILES
        .iter()
        .map(|level| format!("{level:.2}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("quantilesIf({levels})({value_expr}, {condition})")
}

/// Per slot and type: totals, seen-before/seen-after counts, age and delay percentiles and
/// log2 histograms. Transactions never seen in the mempool only count toward `total_txs`; see
/// [`SlotAvailability::unseen`].
pub fn fetch_mempool_availability<C: QueryClient + ?Sized>(
    client: &C,
    date: NaiveDate,
    network: &str,
) -> Result<Fetched> {
    let Bound {
        params,
        network: network_param,
        day,
    } = bind(date, network);
    let date_filter = DAY_WINDOW.predicate("c.slot_start_date_time", &day);
    let first_seen_filter = FIRST_SEEN_WINDOW.predicate("event_date_time", &day);

    let seen_before = seen_before_condition();
    let seen_after = seen_after_condition();
    let age_percentiles = quantiles_if(AGE_MS, &seen_before);
    let delay_percentiles = quantiles_if(DELAY_MS, &seen_after);
    let age_hist = hist_columns(AGE_MS, &seen_before, "age_hist").join(",\n    ");
    let delay_hist = hist_columns(DELAY_MS, &seen_after, "delay_hist").join(",\n    ");

    let sql = format!(
        r#"
WITH first_seen AS (
    SELECT
        hash,
        min(event_date_time) AS first_event_time
    FROM {MEMPOOL_TX_TABLE}
    WHERE meta_network_name = {network_param}
      AND {first_seen_filter}
    GROUP BY hash
)
SELECT
    c.slot,
    c.slot_start_date_time,
    c.type AS tx_type,
    count() AS total_txs,
    countIf({seen_before}) AS seen_before_slot,
    countIf({seen_after}) AS seen_after_slot,
    {age_percentiles} AS age_percentiles_ms,
    {delay_percentiles} AS delay_percentiles_ms,
    {age_hist},
    {delay_hist}
FROM {CANONICAL_TX_TABLE} c
GLOBAL LEFT JOIN first_seen m ON c.hash = m.hash
WHERE c.meta_network_name = {network_param}
  AND {date_filter}
GROUP BY c.slot, c.slot_start_date_time, c.type
ORDER BY c.slot, c.type
"#
    );

    run(
        client,
        "mempool_availability",
        date,
        network,
        Query::new(sql, params),
    )
}

/// One decoded row of [`fetch_mempool_availability`].
#[derive(Debug, Clone, PartialEq)]
pub struct SlotAvailability {
    pub slot: u64,
    pub slot_start_date_time: String,
    pub tx_type: u64,
    pub total_txs: u64,
    pub seen_before_slot: u64,
    pub seen_after_slot: u64,
    /// One entry per [`PERCENTILES`] level; `None` when no row qualified.
    pub age_percentiles_ms: Vec<Option<f64>>,
    pub delay_percentiles_ms: Vec<Option<f64>>,
    pub age_hist: [u64; BUCKET_COUNT],
    pub delay_hist: [u64; BUCKET_COUNT],
}

impl SlotAvailability {
    pub fn from_table(table: &Table) -> Result<Vec<Self>> {
        (0..table.len())
            .map(|row| {
                Ok(Self {
                    slot: table.u64(row, "slot")?,
                    slot_start_date_time: table.str(row, "slot_start_date_time")?.to_string(),
                    tx_type: table.u64(row, "tx_type")?,
                    total_txs: table.u64(row, "total_txs")?,
                    seen_before_slot: table.u64(row, "seen_before_slot")?,
                    seen_after_slot: table.u64(row, "seen_after_slot")?,
                    age_percentiles_ms: percentiles(table, row, "age_percentiles_ms")?,
                    delay_percentiles_ms: percentiles(table, row, "delay_percentiles_ms")?,
                    age_hist: histogram(table, row, "age_hist")?,
                    delay_hist: histogram(table, row, "delay_hist")?,
                })
            })
            .collect()
    }

    /// Transactions never observed in the mempool (fully private).
    pub fn unseen(&self) -> u64 {
        self.total_txs
            .saturating_sub(self.seen_before_slot.saturating_add(self.seen_after_slot))
    }
}

fn percentiles(table: &Table, row: usize, column: &str) -> Result<Vec<Option<f64>>> {
    match table.value(row, column) {
        Some(Value::Array(values)) => Ok(values.iter().map(value_as_f64).collect()),
        Some(other) => Err(Error::column(column, format!("not an array: {other}"))),
        None => Err(Error::column(column, format!("missing in row {row}"))),
    }
}

fn histogram(table: &Table, row: usize, prefix: &str) -> Result<[u64; BUCKET_COUNT]> {
    let mut counts = [0u64; BUCKET_COUNT];
    for (slot, name) in counts.iter_mut().zip(hist_column_names(prefix)) {
        *slot = table.u64(row, &name)?;
    }
    Ok(counts)
}
