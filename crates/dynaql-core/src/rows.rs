//! Paged row reader.
//!
//! [`Rows`] drives `Query` pages through a [`Transport`] and turns each item
//! into one [`Row`] by extracting the projected columns. Pages that come back
//! empty but carry a cursor are skipped; the reader stops only when a page has
//! no cursor or the `LIMIT` budget is used up.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dynaql_model::{AttributeValue, Item, QueryInput, QueryOutput};
use futures::Stream;
use tracing::{debug, warn};

use crate::config::DynaQlConfig;
use crate::error::Error;
use crate::sql::{DocumentPath, ProjectionColumn};
use crate::transport::Transport;
use crate::value::Value;

/// Column name used for whole-item columns.
pub const DOCUMENT_COLUMN: &str = "document";

/// Per-reader options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowOptions {
    /// Convert list and map values into `serde_json::Value`.
    pub convert_collections: bool,
    /// Bound on each page fetch.
    pub page_timeout: Option<Duration>,
}

impl From<&DynaQlConfig> for RowOptions {
    fn from(config: &DynaQlConfig) -> Self {
        Self {
            convert_collections: config.convert_collections,
            page_timeout: config.page_timeout,
        }
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One result row. Values are in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    /// Value of the column at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A stream of rows over one bound query.
///
/// Not meant for concurrent use; open a new reader per consumer.
pub struct Rows {
    transport: Arc<dyn Transport>,
    request: QueryInput,
    columns: Vec<ProjectionColumn>,
    options: RowOptions,
    page: VecDeque<Item>,
    /// `None` once the store has reported the last page.
    cursor: Option<Item>,
    remaining: Option<u32>,
    pages_fetched: usize,
}

impl fmt::Debug for Rows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rows")
            .field("columns", &self.column_names())
            .field("buffered", &self.page.len())
            .field("remaining", &self.remaining)
            .field("pages_fetched", &self.pages_fetched)
            .finish_non_exhaustive()
    }
}

impl Rows {
    /// Open a reader. No request is sent until the first call to
    /// [`Rows::next`].
    ///
    /// `request.limit` doubles as the row budget. Any cursor already set in
    /// `request.exclusive_start_key` is used for the first page.
    #[must_use]
    pub fn open(
        transport: Arc<dyn Transport>,
        mut request: QueryInput,
        columns: Vec<ProjectionColumn>,
        options: RowOptions,
    ) -> Self {
        let remaining = request.limit.map(|limit| u32::try_from(limit).unwrap_or(0));
        let cursor = Some(std::mem::take(&mut request.exclusive_start_key));
        Self {
            transport,
            request,
            columns,
            options,
            page: VecDeque::new(),
            cursor,
            remaining,
            pages_fetched: 0,
        }
    }

    /// Output column names; whole-item columns are named `document`.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        column_names(&self.columns)
    }

    /// Number of pages requested so far.
    #[must_use]
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Next row, or `None` at the end of the result set.
    pub async fn next(&mut self) -> Result<Option<Row>, Error> {
        if self.remaining == Some(0) {
            return Ok(None);
        }

        loop {
            if let Some(item) = self.page.pop_front() {
                if let Some(remaining) = self.remaining.as_mut() {
                    *remaining -= 1;
                }
                return Ok(Some(self.extract(&item)));
            }
            if self.cursor.is_none() {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }

    /// Write the next row into `dest`. Returns `false` at the end of the
    /// result set.
    ///
    /// `dest` must have at least one slot per column; extra slots are left
    /// untouched.
    pub async fn next_into(&mut self, dest: &mut [Value]) -> Result<bool, Error> {
        let expected = self.columns.len().max(1);
        if dest.len() < expected {
            return Err(Error::ColumnCount {
                expected,
                got: dest.len(),
            });
        }

        let Some(row) = self.next().await? else {
            return Ok(false);
        };
        for (slot, value) in dest.iter_mut().zip(row.into_values()) {
            *slot = value;
        }
        Ok(true)
    }

    /// Collect the remaining rows.
    pub async fn collect(mut self) -> Result<Vec<Row>, Error> {
        let mut rows = Vec::new();
        while let Some(row) = self.next().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Turn the reader into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Row, Error>> + Send {
        futures::stream::try_unfold(self, |mut rows| async move {
            Ok(rows.next().await?.map(|row| (row, rows)))
        })
    }

    async fn fetch_page(&mut self) -> Result<(), Error> {
        let mut request = self.request.clone();
        request.exclusive_start_key = self.cursor.clone().unwrap_or_default();

        let fut = self.transport.query(request);
        let result: Result<QueryOutput, Error> = match self.options.page_timeout {
            Some(bound) => tokio::time::timeout(bound, fut).await.map_or(
                Err(Error::Timeout {
                    operation: "Query",
                    elapsed: bound,
                }),
                |output| output.map_err(Error::from),
            ),
            None => fut.await.map_err(Error::from),
        };
        let output = result.inspect_err(|err| {
            warn!(table = %self.request.table_name, error = %err, "query page failed");
        })?;

        self.pages_fetched += 1;
        debug!(
            page = self.pages_fetched,
            items = output.items.len(),
            has_more = output.has_more(),
            "fetched query page"
        );

        if output.items.is_empty() && output.has_more() {
            debug!(page = self.pages_fetched, "skipping empty page");
        }
        self.cursor = output.has_more().then_some(output.last_evaluated_key);
        self.page = output.items.into();
        Ok(())
    }

    fn extract(&self, item: &Item) -> Row {
        let values = if self.columns.is_empty() {
            vec![self.finish(Value::Map(item.clone()))]
        } else {
            self.columns
                .iter()
                .map(|column| match column {
                    ProjectionColumn::Function(_) => self.finish(Value::Map(item.clone())),
                    ProjectionColumn::Path(path) => {
                        self.finish(pluck(item, path).map_or(Value::Null, |av| Value::decode(&av)))
                    }
                })
                .collect()
        };
        Row { values }
    }

    fn finish(&self, value: Value) -> Value {
        if self.options.convert_collections {
            value.into_deep()
        } else {
            value
        }
    }
}

/// Output column names for a projection.
#[must_use]
pub fn column_names(columns: &[ProjectionColumn]) -> Vec<String> {
    if columns.is_empty() {
        return vec![DOCUMENT_COLUMN.to_owned()];
    }
    columns
        .iter()
        .map(|column| match column {
            ProjectionColumn::Function(_) => DOCUMENT_COLUMN.to_owned(),
            ProjectionColumn::Path(path) => path.to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Path navigation
// ---------------------------------------------------------------------------

/// Follow `path` into `item`.
///
/// Returns `None` when an attribute is missing, an index is out of range, or
/// a value cannot be descended into. Set elements are addressed by position
/// like list elements.
#[must_use]
pub fn pluck<'a>(item: &'a Item, path: &DocumentPath) -> Option<Cow<'a, AttributeValue>> {
    let mut fragments = path.fragments.iter();
    let first = fragments.next()?;
    let mut current = index_into(Cow::Borrowed(item.get(&first.symbol)?), &first.indexes)?;

    for fragment in fragments {
        current = match current {
            Cow::Borrowed(AttributeValue::M(map)) => Cow::Borrowed(map.get(&fragment.symbol)?),
            _ => return None,
        };
        current = index_into(current, &fragment.indexes)?;
    }
    Some(current)
}

fn index_into<'a>(
    mut current: Cow<'a, AttributeValue>,
    indexes: &[usize],
) -> Option<Cow<'a, AttributeValue>> {
    for &index in indexes {
        // Owned values are set elements, which are always scalars.
        current = match current {
            Cow::Borrowed(AttributeValue::L(list)) => Cow::Borrowed(list.get(index)?),
            Cow::Borrowed(AttributeValue::Ss(set)) => {
                Cow::Owned(AttributeValue::S(set.get(index)?.clone()))
            }
            Cow::Borrowed(AttributeValue::Ns(set)) => {
                Cow::Owned(AttributeValue::N(set.get(index)?.clone()))
            }
            Cow::Borrowed(AttributeValue::Bs(set)) => {
                Cow::Owned(AttributeValue::B(set.get(index)?.clone()))
            }
            _ => return None,
        };
    }
    Some(current)
}
