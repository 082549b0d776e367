// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Select/filter/order/limit query over a named record collection.
//!
//! A [`RecordQuery`] renders to PostgREST query parameters for the REST
//! provider and can be evaluated directly against JSON rows for the
//! in-memory provider, so both backends share one filter semantics.

use std::cmp::Ordering;

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    Eq,
    Neq,
}

impl FilterOp {
    fn prefix(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    column: String,
    op: FilterOp,
    value: String,
}

/// Query against one record collection (`events`, `registrations`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    table: String,
    columns: Vec<String>,
    filters: Vec<Filter>,
    order: Option<(String, SortOrder)>,
    limit: Option<usize>,
}

impl RecordQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    /// Restrict the returned columns. An empty selection returns every column.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.to_string(),
        });
        self
    }

    pub fn neq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            op: FilterOp::Neq,
            value: value.to_string(),
        });
        self
    }

    pub fn order(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Copy of this query without projection, ordering or limit; used to
    /// address the same rows for counts and deletes.
    pub fn filters_only(&self) -> Self {
        Self {
            table: self.table.clone(),
            columns: Vec::new(),
            filters: self.filters.clone(),
            order: None,
            limit: None,
        }
    }

    /// Render as PostgREST query parameters.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.filters.len() + 3);

        let select = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };
        params.push(("select".to_string(), select));

        for filter in &self.filters {
            params.push((
                filter.column.clone(),
                format!("{}.{}", filter.op.prefix(), filter.value),
            ));
        }

        if let Some((column, order)) = &self.order {
            let direction = match order {
                SortOrder::Ascending => "asc",
                SortOrder::Descending => "desc",
            };
            params.push(("order".to_string(), format!("{column}.{direction}")));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    /// Whether a row satisfies every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|filter| {
            let cell = row.get(&filter.column).map(scalar_text);
            let equal = cell.as_deref() == Some(filter.value.as_str());
            match filter.op {
                FilterOp::Eq => equal,
                FilterOp::Neq => cell.is_some() && !equal,
            }
        })
    }

    /// Evaluate the query against in-memory rows.
    pub fn apply(&self, rows: &[Value]) -> Vec<Value> {
        let mut selected: Vec<Value> = rows.iter().filter(|r| self.matches(r)).cloned().collect();

        if let Some((column, order)) = &self.order {
            selected.sort_by(|a, b| {
                let ordering = compare_cells(a.get(column), b.get(column));
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }

        if self.columns.is_empty() {
            return selected;
        }

        selected
            .into_iter()
            .map(|row| {
                let projected: Map<String, Value> = self
                    .columns
                    .iter()
                    .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
                    .collect();
                Value::Object(projected)
            })
            .collect()
    }
}

/// Text form of a cell as it would appear in a PostgREST filter.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Nulls sort first; numbers numerically; everything else by text.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        _ => scalar_text(a).cmp(&scalar_text(b)),
    }
}
