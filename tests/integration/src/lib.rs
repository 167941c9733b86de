//! End-to-end tests for dynaql.
//!
//! Statements go through the public [`Client`] against a [`ScriptedTransport`]
//! that serves canned table descriptions and query pages, and records every
//! request it receives.
//!
//! Run them with:
//! ```text
//! cargo test -p dynaql-integration
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use dynaql_core::{Client, DynaQlConfig, Transport};
use dynaql_model::{
    AttributeValue, DescribeTableInput, DescribeTableOutput, Item, QueryInput, QueryOutput,
    StoreError, store_error,
};
use parking_lot::Mutex;
use tracing::debug;

static INIT: Once = Once::new();

/// Initialize tracing (once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

/// In-memory transport that replays scripted responses.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    tables: HashMap<String, serde_json::Value>,
    pages: Mutex<VecDeque<Result<QueryOutput, StoreError>>>,
    requests: Mutex<Vec<QueryInput>>,
    describe_calls: AtomicUsize,
    describe_failures: AtomicUsize,
    describe_delay: Option<Duration>,
}

impl ScriptedTransport {
    /// Empty transport: no tables, no pages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `description` (a `DescribeTable` JSON response body) for `table`.
    #[must_use]
    pub fn with_table(mut self, table: &str, description: serde_json::Value) -> Self {
        self.tables.insert(table.to_owned(), description);
        self
    }

    /// Queue a page for the next `Query` call.
    #[must_use]
    pub fn with_page(self, items: Vec<Item>, cursor: Option<Item>) -> Self {
        self.pages
            .lock()
            .push_back(Ok(QueryOutput::page(items, cursor)));
        self
    }

    /// Queue a failure for the next `Query` call.
    #[must_use]
    pub fn with_query_error(self, error: StoreError) -> Self {
        self.pages.lock().push_back(Err(error));
        self
    }

    /// Fail the first `count` describe calls with a throttling error.
    #[must_use]
    pub fn with_failing_describes(self, count: usize) -> Self {
        self.describe_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Delay every describe call.
    #[must_use]
    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = Some(delay);
        self
    }

    /// Number of describe calls received.
    #[must_use]
    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Query requests received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<QueryInput> {
        self.requests.lock().clone()
    }

    /// Query pages not yet served.
    #[must_use]
    pub fn pending_pages(&self) -> usize {
        self.pages.lock().len()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, StoreError> {
        let call = self.describe_calls.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(table = %input.table_name, call, "scripted describe");
        if let Some(delay) = self.describe_delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .describe_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(store_error!(
                ThrottlingException,
                "Rate of requests exceeds the allowed throughput."
            ));
        }

        let body = self.tables.get(&input.table_name).ok_or_else(|| {
            store_error!(
                ResourceNotFoundException,
                format!("Requested resource not found: Table: {} not found", input.table_name)
            )
        })?;
        serde_json::from_value(body.clone())
            .map_err(|e| store_error!(ValidationException, e.to_string()))
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, StoreError> {
        debug!(table = %input.table_name, "scripted query");
        self.requests.lock().push(input);
        self.pages
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryOutput::default()))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// `gamescores`: partition key `UserId`, sort key `GameTitle`, a local index
/// on `Wins` and a global index on `GameTitle` / `TopScore`.
#[must_use]
pub fn gamescores_description() -> serde_json::Value {
    serde_json::json!({
        "Table": {
            "TableName": "gamescores",
            "TableStatus": "ACTIVE",
            "KeySchema": [
                {"AttributeName": "UserId", "KeyType": "HASH"},
                {"AttributeName": "GameTitle", "KeyType": "RANGE"}
            ],
            "AttributeDefinitions": [
                {"AttributeName": "UserId", "AttributeType": "S"},
                {"AttributeName": "GameTitle", "AttributeType": "S"},
                {"AttributeName": "TopScore", "AttributeType": "N"},
                {"AttributeName": "Wins", "AttributeType": "N"}
            ],
            "LocalSecondaryIndexes": [{
                "IndexName": "UserWinsIndex",
                "KeySchema": [
                    {"AttributeName": "UserId", "KeyType": "HASH"},
                    {"AttributeName": "Wins", "KeyType": "RANGE"}
                ],
                "Projection": {"ProjectionType": "ALL"}
            }],
            "GlobalSecondaryIndexes": [{
                "IndexName": "GameTitleIndex",
                "KeySchema": [
                    {"AttributeName": "GameTitle", "KeyType": "HASH"},
                    {"AttributeName": "TopScore", "KeyType": "RANGE"}
                ],
                "Projection": {"ProjectionType": "KEYS_ONLY"}
            }]
        }
    })
}

/// `movies`: partition key `title`, sort key `year` (a reserved word).
#[must_use]
pub fn movies_description() -> serde_json::Value {
    serde_json::json!({
        "Table": {
            "TableName": "movies",
            "KeySchema": [
                {"AttributeName": "title", "KeyType": "HASH"},
                {"AttributeName": "year", "KeyType": "RANGE"}
            ],
            "AttributeDefinitions": [
                {"AttributeName": "title", "AttributeType": "S"},
                {"AttributeName": "year", "AttributeType": "N"}
            ]
        }
    })
}

/// Transport serving both fixture tables.
#[must_use]
pub fn fixture_transport() -> ScriptedTransport {
    ScriptedTransport::new()
        .with_table("gamescores", gamescores_description())
        .with_table("movies", movies_description())
}

/// Client over `transport` with default configuration.
#[must_use]
pub fn client(transport: &Arc<ScriptedTransport>) -> Client {
    client_with_config(transport, DynaQlConfig::default())
}

/// Client over `transport` with `config`.
#[must_use]
pub fn client_with_config(transport: &Arc<ScriptedTransport>, config: DynaQlConfig) -> Client {
    init_tracing();
    Client::new(Arc::clone(transport) as Arc<dyn Transport>, config)
}

/// Build an item from attribute pairs.
#[must_use]
pub fn item<const N: usize>(attributes: [(&str, AttributeValue); N]) -> Item {
    attributes
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

/// A `gamescores` row.
#[must_use]
pub fn score(user: &str, title: &str, top_score: i64) -> Item {
    item([
        ("UserId", AttributeValue::string(user)),
        ("GameTitle", AttributeValue::string(title)),
        ("TopScore", AttributeValue::number(top_score)),
    ])
}

mod test_logging;
mod test_pagination;
mod test_schema_cache;
mod test_select;
