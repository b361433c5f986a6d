//! Date window predicates around a target UTC day.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Hour,
    Day,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    amount: u32,
    unit: IntervalUnit,
}

impl Interval {
    pub const fn hours(amount: u32) -> Self {
        Self {
            amount,
            unit: IntervalUnit::Hour,
        }
    }

    pub const fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: IntervalUnit::Day,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            IntervalUnit::Hour => "HOUR",
            IntervalUnit::Day => "DAY",
        };
        write!(f, "INTERVAL {} {}", self.amount, unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBound {
    Exclusive,
    Inclusive,
}

/// A time window anchored at midnight UTC of the target day: it starts `lookback` before the
/// day and ends `span` after the day start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    lookback: Option<Interval>,
    span: Interval,
    end: EndBound,
}

impl Window {
    /// `[day, day + 1 DAY)`
    pub const fn day() -> Self {
        Self {
            lookback: None,
            span: Interval::days(1),
            end: EndBound::Exclusive,
        }
    }

    pub const fn with_lookback(self, lookback: Interval) -> Self {
        Self {
            lookback: Some(lookback),
            ..self
        }
    }

    pub const fn with_span(self, span: Interval) -> Self {
        Self { span, ..self }
    }

    pub const fn inclusive(self) -> Self {
        Self {
            end: EndBound::Inclusive,
            ..self
        }
    }

    /// Renders the predicate for `column`. `day` is the placeholder (or literal) standing for the
    /// target date.
    pub fn predicate(&self, column: &str, day: &str) -> String {
        let start = match self.lookback {
            Some(lookback) => format!("{day} - {lookback}"),
            None => day.to_string(),
        };
        let end = format!("{day} + {}", self.span);
        match self.end {
            EndBound::Exclusive => format!("{column} >= {start} AND {column} < {end}"),
            EndBound::Inclusive => format!("{column} BETWEEN {start} AND {end}"),
        }
    }
}
