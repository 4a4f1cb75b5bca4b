//! Table query builder.
//!
//! Mirrors the chained `from(table).select().eq()...` style of hosted table
//! APIs. A query collects filters and options, then [`TableQuery::execute`]
//! reads the table's full row sequence from the store, applies them and, for
//! mutations, writes the sequence back.
//!
//! Tables are stored most-recent-first. `order` is accepted and ignored, so
//! results always come back in stored order.

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::ids;
use crate::local_db_model::{Row, RowSet};
use crate::storage::{read_json, write_json, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: JsonValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptions {
    /// Return only the count, no rows.
    #[serde(default)]
    pub head: bool,
    /// Report the number of matching rows alongside the data.
    #[serde(default)]
    pub count: bool,
}

impl SelectOptions {
    pub fn head_count() -> Self {
        Self { head: true, count: true }
    }

    pub fn with_count() -> Self {
        Self { head: false, count: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOptions {
    #[serde(default = "ascending_by_default")]
    pub ascending: bool,
}

fn ascending_by_default() -> bool {
    true
}

impl Default for OrderOptions {
    fn default() -> Self {
        Self { ascending: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Operation {
    Select,
    Insert(Vec<Row>),
    Update(Row),
    Delete,
}

pub struct TableQuery<'a, S: ?Sized> {
    store: &'a S,
    key: String,
    table: String,
    columns: String,
    options: SelectOptions,
    filters: Vec<Filter>,
    limit: Option<usize>,
    operation: Operation,
}

impl<'a, S: KeyValueStore + ?Sized> TableQuery<'a, S> {
    pub(crate) fn new(store: &'a S, key: String, table: impl Into<String>) -> Self {
        Self {
            store,
            key,
            table: table.into(),
            columns: "*".to_string(),
            options: SelectOptions::default(),
            filters: Vec::new(),
            limit: None,
            operation: Operation::Select,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns are recorded but not projected; full rows are returned.
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn select_with(mut self, columns: &str, options: SelectOptions) -> Self {
        self.columns = columns.to_string();
        self.options = options;
        self
    }

    /// Adds an equality filter. Filters combine with AND.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Accepted for call-site compatibility; has no effect on ordering.
    pub fn order(self, column: &str, options: OrderOptions) -> Self {
        debug!(
            "Ignoring order by {column} (ascending: {}) on {}",
            options.ascending, self.table
        );
        self
    }

    /// Keeps at most `n` matching rows of a select.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Rows missing an `id` get a fresh one. Each row is placed at the front
    /// of the table, so the last row of a batch ends up first.
    pub fn insert(mut self, rows: impl Into<RowSet>) -> Self {
        self.operation = Operation::Insert(rows.into().0);
        self
    }

    /// Shallow-merges `patch` into every row matching the filters.
    pub fn update(mut self, patch: Row) -> Self {
        self.operation = Operation::Update(patch);
        self
    }

    /// Removes every row matching the filters.
    pub fn delete(mut self) -> Self {
        self.operation = Operation::Delete;
        self
    }

    /// Runs the query.
    ///
    /// - select: matching rows (limited), or only a count with `head`.
    /// - insert: the inserted rows, ids included.
    /// - update: the affected rows after the patch.
    /// - delete: the removed rows.
    pub fn execute(self) -> Result<QueryResponse> {
        let mut rows = self.load();

        match self.operation {
            Operation::Select => {
                let matching: Vec<Row> = rows
                    .into_iter()
                    .filter(|row| matches_all(row, &self.filters))
                    .collect();
                let total = matching.len();

                if self.options.head {
                    return Ok(QueryResponse {
                        data: Vec::new(),
                        count: Some(total),
                    });
                }

                let data = match self.limit {
                    Some(n) => matching.into_iter().take(n).collect(),
                    None => matching,
                };
                debug!(
                    "select {} from {}: {} of {total} rows",
                    self.columns,
                    self.table,
                    data.len()
                );

                Ok(QueryResponse {
                    data,
                    count: self.options.count.then_some(total),
                })
            }
            Operation::Insert(new_rows) => {
                let mut inserted = Vec::with_capacity(new_rows.len());
                for mut row in new_rows {
                    if !row.has_id() {
                        row.set("id", ids::row_id());
                    }
                    rows.insert(0, row.clone());
                    inserted.push(row);
                }
                write_json(self.store, &self.key, &rows)?;
                debug!("Inserted {} rows into {}", inserted.len(), self.table);

                Ok(QueryResponse {
                    data: inserted,
                    count: None,
                })
            }
            Operation::Update(patch) => {
                let mut updated = Vec::new();
                for row in rows.iter_mut().filter(|row| matches_all(row, &self.filters)) {
                    row.merge(&patch);
                    updated.push(row.clone());
                }
                if !updated.is_empty() {
                    write_json(self.store, &self.key, &rows)?;
                }
                debug!("Updated {} rows in {}", updated.len(), self.table);

                Ok(QueryResponse {
                    data: updated,
                    count: None,
                })
            }
            Operation::Delete => {
                let (removed, kept): (Vec<Row>, Vec<Row>) = rows
                    .into_iter()
                    .partition(|row| matches_all(row, &self.filters));
                if !removed.is_empty() {
                    write_json(self.store, &self.key, &kept)?;
                }
                debug!("Deleted {} rows from {}", removed.len(), self.table);

                Ok(QueryResponse {
                    data: removed,
                    count: None,
                })
            }
        }
    }

    /// First matching row, or `None`. Several matches are not an error.
    pub fn single(mut self) -> Result<Option<Row>> {
        self.options.head = false;
        Ok(self.execute()?.data.into_iter().next())
    }

    fn load(&self) -> Vec<Row> {
        read_json(self.store, &self.key).unwrap_or_default()
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|filter| row.column_equals(&filter.column, &filter.value))
}

/// Rows for an insert given as one object or an array of objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsertPayload {
    One(Row),
    Many(Vec<Row>),
}

impl From<InsertPayload> for RowSet {
    fn from(payload: InsertPayload) -> Self {
        match payload {
            InsertPayload::One(row) => RowSet(vec![row]),
            InsertPayload::Many(rows) => RowSet(rows),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum QueryOperation {
    #[default]
    Select,
    Insert(InsertPayload),
    Update(Row),
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub options: OrderOptions,
}

/// A whole query as data, for callers on the far side of the C ABI.
///
/// ```json
/// {
///   "table": "notifications",
///   "head": true,
///   "filters": [{"column": "user_id", "value": "u1"}, {"column": "read", "value": false}]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table: String,
    #[serde(default = "all_columns")]
    pub columns: String,
    #[serde(default)]
    pub head: bool,
    #[serde(default)]
    pub count: bool,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub single: bool,
    #[serde(default)]
    pub operation: QueryOperation,
}

fn all_columns() -> String {
    "*".to_string()
}

impl QueryRequest {
    /// Replays this request onto `query`, which must target `self.table`.
    pub fn apply<S: KeyValueStore + ?Sized>(self, query: TableQuery<'_, S>) -> Result<QueryResponse> {
        let mut query = query.select_with(
            &self.columns,
            SelectOptions {
                head: self.head,
                count: self.count,
            },
        );

        for filter in self.filters {
            query = query.eq(filter.column, filter.value);
        }
        if let Some(order) = self.order {
            query = query.order(&order.column, order.options);
        }
        if let Some(n) = self.limit {
            query = query.limit(n);
        }

        query = match self.operation {
            QueryOperation::Select => query,
            QueryOperation::Insert(payload) => query.insert(payload),
            QueryOperation::Update(patch) => query.update(patch),
            QueryOperation::Delete => query.delete(),
        };

        if self.single {
            let data = query.single()?.into_iter().collect();
            return Ok(QueryResponse { data, count: None });
        }

        query.execute()
    }
}
