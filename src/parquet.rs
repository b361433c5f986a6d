//! Persists a [`Table`] as a Parquet file through an in-memory DuckDB.
//!
//! Rows are staged as newline-delimited JSON and read back with explicit column types mapped
//! from the ClickHouse types, so the file keeps the server's schema even when it has no rows.

use duckdb::Connection;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Error, Result};
use crate::table::Table;

fn escape_single_quotes(input: &str) -> String {
    input.replace('\'', "''")
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn strip_wrapper<'a>(type_name: &'a str, wrapper: &str) -> Option<&'a str> {
    type_name
        .strip_prefix(wrapper)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// DuckDB column type for a ClickHouse type name. Unknown types fall back to `VARCHAR`.
pub(crate) fn duckdb_type(clickhouse_type: &str) -> String {
    let type_name = clickhouse_type.trim();
    if let Some(inner) = strip_wrapper(type_name, "Nullable") {
        return duckdb_type(inner);
    }
    if let Some(inner) = strip_wrapper(type_name, "LowCardinality") {
        return duckdb_type(inner);
    }
    if let Some(inner) = strip_wrapper(type_name, "Array") {
        return format!("{}[]", duckdb_type(inner));
    }
    if type_name.starts_with("DateTime") {
        return "TIMESTAMP".to_string();
    }
    if type_name.starts_with("Decimal") {
        return "DOUBLE".to_string();
    }
    let mapped = match type_name {
        "UInt8" => "UTINYINT",
        "UInt16" => "USMALLINT",
        "UInt32" => "UINTEGER",
        "UInt64" => "UBIGINT",
        "Int8" => "TINYINT",
        "Int16" => "SMALLINT",
        "Int32" => "INTEGER",
        "Int64" => "BIGINT",
        "Int128" => "HUGEINT",
        "Float32" => "FLOAT",
        "Float64" => "DOUBLE",
        "Bool" => "BOOLEAN",
        "Date" | "Date32" => "DATE",
        _ => "VARCHAR",
    };
    mapped.to_string()
}

fn staging_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `table` to `path`, creating parent directories and replacing any existing file.
/// Returns the number of rows written.
pub fn write_parquet(table: &Table, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let staging = tempfile::Builder::new()
        .prefix("xatu-rows-")
        .suffix(".ndjson")
        .tempfile()?;
    {
        let mut writer = BufWriter::new(staging.as_file());
        for row in table.row_objects() {
            serde_json::to_writer(&mut writer, &row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
    }

    let conn = Connection::open_in_memory()?;
    let _ = conn.execute("PRAGMA enable_progress_bar=false", []);

    let ddl = table
        .columns()
        .iter()
        .map(|column| {
            format!(
                "{} {}",
                quote_ident(&column.name),
                duckdb_type(&column.type_name)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute(&format!("CREATE TABLE t ({ddl})"), [])?;

    if !table.is_empty() {
        let json_columns = table
            .columns()
            .iter()
            .map(|column| {
                format!(
                    "'{}': '{}'",
                    escape_single_quotes(&column.name),
                    duckdb_type(&column.type_name)
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute(
            &format!(
                "INSERT INTO t SELECT * FROM read_json('{}', format = 'newline_delimited', columns = {{{json_columns}}})",
                escape_single_quotes(&staging.path().display().to_string())
            ),
            [],
        )?;
    }

    let tmp_out = staging_path_for(path);
    let copied = conn
        .execute(
            &format!(
                "COPY t TO '{}' (FORMAT PARQUET)",
                escape_single_quotes(&tmp_out.display().to_string())
            ),
            [],
        )
        .map_err(Error::from)
        .and_then(|_| fs::rename(&tmp_out, path).map_err(Error::from));
    if let Err(err) = copied {
        fs::remove_file(&tmp_out).ok();
        return Err(err);
    }

    let rows = table.len() as u64;
    info!(path = %path.display(), rows, "wrote parquet");
    Ok(rows)
}
