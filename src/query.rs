//! Bound-parameter query construction for the ClickHouse HTTP interface.
//!
//! Caller-supplied values never enter the query text. Each one is registered in [`Params`],
//! which hands back a typed placeholder (`{network:String}`) to splice into the SQL; the value
//! itself travels separately as a `param_<name>` URL parameter.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    String(String),
    Date(NaiveDate),
}

impl Param {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "String",
            Self::Date(_) => "Date",
        }
    }

    /// Value as sent over HTTP. ClickHouse parses parameter values in its escaped text format,
    /// so backslashes and control characters must be escaped.
    pub fn encoded(&self) -> String {
        match self {
            Self::String(value) => escape_param(value),
            Self::Date(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDate> for Param {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => f.write_str(value),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

fn escape_param(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            other => out.push(other),
        }
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, Param>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `name` and returns the placeholder to use in the query text.
    /// Binding the same name again replaces the value; every occurrence of the placeholder
    /// refers to the one value.
    pub fn bind(&mut self, name: &str, value: impl Into<Param>) -> String {
        let value = value.into();
        let placeholder = format!("{{{}:{}}}", name, value.type_name());
        self.values.insert(name.to_string(), value);
        placeholder
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The exact query issued: text plus the values bound to its placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    sql: String,
    params: Params,
}

impl Query {
    pub fn new(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.params.iter() {
            writeln!(f, "-- param_{name} = {value}")?;
        }
        f.write_str(self.sql.trim())
    }
}
