use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::Record;

/// Column equality filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// A missing column matches a `null` filter value.
    pub fn matches(&self, record: &Record) -> bool {
        record.get(&self.column).unwrap_or(&Value::Null) == &self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// A select over one table: equality filters and an optional ordering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending,
        });
        self
    }

    /// The string value this query pins `column` to, if any.
    pub fn pinned(&self, column: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.column == column)
            .and_then(|f| f.value.as_str())
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(record))
    }

    /// Apply filters and ordering to an in-memory set of records.
    pub fn apply(&self, records: Vec<Record>) -> Vec<Record> {
        let mut selected: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(order) = &self.order {
            selected.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            });
        }
        selected
    }
}

/// Total order over JSON column values. Timestamps compare chronologically
/// (RFC 3339 strings with differing fractional precision do not sort
/// lexically); nulls sort first.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.unwrap_or(&Value::Null), b.unwrap_or(&Value::Null)) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => {
            match (
                x.parse::<DateTime<Utc>>().ok(),
                y.parse::<DateTime<Utc>>().ok(),
            ) {
                (Some(tx), Some(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (x, y) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn filters_require_every_column_to_match() {
        let query = Query::new().eq("subject_id", "s1").eq("is_approved", true);

        assert!(query.matches(&record(json!({"subject_id": "s1", "is_approved": true}))));
        assert!(!query.matches(&record(json!({"subject_id": "s1", "is_approved": false}))));
        assert!(!query.matches(&record(json!({"subject_id": "s2", "is_approved": true}))));
        assert!(!query.matches(&record(json!({"subject_id": "s1"}))));
    }

    #[test]
    fn timestamps_order_chronologically_across_precisions() {
        let records = vec![
            record(json!({"id": "whole", "created_at": "2024-03-01T10:00:00Z"})),
            record(json!({"id": "fraction", "created_at": "2024-03-01T10:00:00.500Z"})),
            record(json!({"id": "earlier", "created_at": "2024-02-28T23:59:59.999999Z"})),
        ];

        let ordered = Query::new().order_by("created_at", true).apply(records);
        let ids: Vec<&str> = ordered.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["fraction", "whole", "earlier"]);
    }

    #[test]
    fn pinned_returns_string_filter_value() {
        let query = Query::new().eq("subject_id", "s9").eq("is_approved", true);
        assert_eq!(query.pinned("subject_id"), Some("s9"));
        assert_eq!(query.pinned("is_approved"), None);
        assert_eq!(query.pinned("title"), None);
    }
}
