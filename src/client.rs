//! The one capability the query builders need: run a query, get a table back.

use reqwest::blocking::Client as HttpClient;
use std::time::Instant;
use tracing::{debug, error};
use url::Url;

use crate::config::ClickHouseConfig;
use crate::error::{Error, Result};
use crate::query::Query;
use crate::table::Table;

pub trait QueryClient {
    fn query(&self, query: &Query) -> Result<Table>;
}

/// ClickHouse over its HTTP interface. The query text is the POST body; bound parameters
/// travel as `param_<name>` URL parameters.
#[derive(Debug, Clone)]
pub struct ClickHouseClient {
    http: HttpClient,
    url: Url,
    user: String,
    password: Option<String>,
    database: Option<String>,
}

impl ClickHouseClient {
    pub fn new(config: &ClickHouseConfig) -> Result<Self> {
        let http = HttpClient::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
        })
    }

    fn request_url(&self, query: &Query) -> Url {
        let mut url = self.url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("default_format", "JSONCompact");
            pairs.append_pair("output_format_json_quote_64bit_integers", "0");
            if let Some(database) = &self.database {
                pairs.append_pair("database", database);
            }
            for (name, value) in query.params().iter() {
                pairs.append_pair(&format!("param_{name}"), &value.encoded());
            }
        }
        url
    }

    fn execute(&self, query: &Query) -> Result<Table> {
        let response = self
            .http
            .post(self.request_url(query))
            .basic_auth(&self.user, self.password.as_deref())
            .body(query.sql().to_string())
            .send()?;
        let status = response.status();
        let body = response.bytes()?;
        if !status.is_success() {
            return Err(Error::Server {
                status,
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
        Table::from_json_compact(&body)
    }
}

impl QueryClient for ClickHouseClient {
    fn query(&self, query: &Query) -> Result<Table> {
        let start = Instant::now();
        let result = self.execute(query);
        let duration_ms = start.elapsed().as_millis();
        match &result {
            Ok(table) => debug!(
                query = %query.sql(),
                duration_ms,
                rows = table.len(),
                "ClickHouse query executed"
            ),
            Err(err) => error!(
                query = %query.sql(),
                duration_ms,
                error = %err,
                "ClickHouse query failed"
            ),
        }
        result
    }
}
