//! Hourly peer observations from the libp2p telemetry tables, written straight to Parquet.

use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::client::QueryClient;
use crate::error::Result;
use crate::filters::Window;
use crate::parquet;
use crate::query::{Params, Query};

pub const HEARTBEAT_TABLE: &str = "libp2p_synthetic_heartbeat_local";
pub const CONNECTED_TABLE: &str = "libp2p_connected_local";

/// `BETWEEN` keeps events stamped exactly at the next midnight.
const EVENT_WINDOW: Window = Window::day().inclusive();

#[derive(Debug, Clone)]
pub struct Persisted {
    pub rows: u64,
    pub path: PathBuf,
    pub query: Query,
}

fn peers_per_client_query(source: &str, date: NaiveDate, network: &str) -> Query {
    let mut params = Params::new();
    let network = params.bind("network", network);
    let day = params.bind("target_date", date);
    let date_filter = EVENT_WINDOW.predicate("event_date_time", &day);

    let sql = format!(
        r#"
SELECT
    toStartOfInterval(event_date_time, INTERVAL 1 hour) AS hour_bucket,
    remote_peer_id_unique_key AS peer_id,
    remote_agent_implementation AS client_name,
    meta_client_name AS local_name
FROM {source}
WHERE
    meta_network_name LIKE {network}
  AND {date_filter}
ORDER BY hour_bucket ASC
"#
    );
    Query::new(sql, params)
}

fn fetch_to_parquet<C: QueryClient + ?Sized>(
    client: &C,
    source: &'static str,
    date: NaiveDate,
    output_path: &Path,
    network: &str,
) -> Result<Persisted> {
    let query = peers_per_client_query(source, date, network);
    let table = client.query(&query)?;
    let rows = parquet::write_parquet(&table, output_path)?;
    info!(source, %date, network, rows, path = %output_path.display(), "persisted");
    Ok(Persisted {
        rows,
        path: output_path.to_path_buf(),
        query,
    })
}

/// Peers seen in synthetic heartbeats, bucketed by hour, with their client implementation and
/// the sentry that saw them.
pub fn fetch_unique_network_participants_per_client<C: QueryClient + ?Sized>(
    client: &C,
    date: NaiveDate,
    output_path: &Path,
    network: &str,
) -> Result<Persisted> {
    fetch_to_parquet(client, HEARTBEAT_TABLE, date, output_path, network)
}

/// Same shape as [`fetch_unique_network_participants_per_client`], from connection events.
pub fn fetch_connected_peers_per_client<C: QueryClient + ?Sized>(
    client: &C,
    date: NaiveDate,
    output_path: &Path,
    network: &str,
) -> Result<Persisted> {
    fetch_to_parquet(client, CONNECTED_TABLE, date, output_path, network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::query::Param;
    use crate::table::{Column, Table};
    use crate::test_support::RecordingClient;
    use anyhow::Result;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()
    }

    fn peers() -> Table {
        Table::new(
            vec![
                Column::new("hour_bucket", "DateTime"),
                Column::new("peer_id", "String"),
                Column::new("client_name", "LowCardinality(String)"),
                Column::new("local_name", "LowCardinality(String)"),
            ],
            vec![
                vec![
                    json!("2025-02-01 00:00:00"),
                    json!("16Uiu2HAm-a"),
                    json!("lighthouse"),
                    json!("sentry-1"),
                ],
                vec![
                    json!("2025-02-01 00:00:00"),
                    json!("16Uiu2HAm-b"),
                    json!("prysm"),
                    json!("sentry-1"),
                ],
                vec![
                    json!("2025-02-01 01:00:00"),
                    json!("16Uiu2HAm-a"),
                    json!("lighthouse"),
                    json!("sentry-2"),
                ],
            ],
        )
    }

    #[test]
    fn heartbeat_extract_lands_on_disk() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("mainnet").join("participants.parquet");
        let client = RecordingClient::returning(peers());

        let persisted =
            fetch_unique_network_participants_per_client(&client, date(), &path, "mainnet")?;
        assert_eq!(persisted.rows, 3);
        assert_eq!(persisted.path, path);
        assert!(path.exists());

        let sql = persisted.query.sql();
        assert!(sql.contains(&format!("FROM {HEARTBEAT_TABLE}\n")));
        assert!(sql.contains("meta_network_name LIKE {network:String}"));
        assert!(sql.contains(
            "event_date_time BETWEEN {target_date:Date} AND {target_date:Date} + INTERVAL 1 DAY"
        ));
        assert_eq!(
            persisted.query.params().get("target_date"),
            Some(&Param::Date(date()))
        );
        assert_eq!(client.issued().len(), 1);
        Ok(())
    }

    #[test]
    fn connection_extract_shares_the_shape() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("connected.parquet");
        let client = RecordingClient::returning(peers());

        let persisted = fetch_connected_peers_per_client(&client, date(), &path, "hoodi")?;
        assert_eq!(persisted.rows, 3);
        let sql = persisted.query.sql();
        assert!(sql.contains(&format!("FROM {CONNECTED_TABLE}\n")));
        assert!(sql.contains("AS hour_bucket"));
        assert!(sql.contains("ORDER BY hour_bucket ASC"));
        assert_eq!(
            persisted.query.params().get("network"),
            Some(&Param::from("hoodi"))
        );
        Ok(())
    }

    #[test]
    fn failed_query_writes_nothing() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("out").join("participants.parquet");
        let client = RecordingClient::failing(Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));

        let err = fetch_unique_network_participants_per_client(&client, date(), &path, "mainnet")
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(!path.exists());
        Ok(())
    }
}
