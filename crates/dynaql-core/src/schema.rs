//! Table key schemas and the process-wide schema cache.
//!
//! [`SchemaCache::get`] describes each table at most once. Concurrent first
//! requests for the same table share a single `DescribeTable` call; the
//! result, success or failure, is delivered to every waiter. Successes are
//! memoized, failures are not, so the next call retries.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dynaql_model::types::{KeySchemaElement, KeyType, TableDescription};
use dynaql_model::{DescribeTableInput, StoreError};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::sql::{CreateTable, CreateTableEntry};
use crate::transport::Transport;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A table schema could not be loaded.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchemaError {
    /// `DescribeTable` failed.
    #[error("describing table {table:?} failed: {source}")]
    Store {
        /// Table name.
        table: String,
        /// Store error, shared by every waiter of the same load.
        #[source]
        source: Arc<StoreError>,
    },
    /// `DescribeTable` returned no table.
    #[error("table {table:?} not found")]
    NotFound {
        /// Table name.
        table: String,
    },
    /// The description has no usable key schema.
    #[error("invalid schema for table {table:?}: {message}")]
    InvalidDescription {
        /// Table name.
        table: String,
        /// What is wrong.
        message: String,
    },
    /// The caller stopped waiting.
    #[error("timed out after {elapsed:?} waiting for the schema of table {table:?}")]
    Timeout {
        /// Table name.
        table: String,
        /// Configured bound.
        elapsed: Duration,
    },
    /// The load task ended without a result.
    #[error("loading the schema of table {table:?} was cancelled")]
    Cancelled {
        /// Table name.
        table: String,
    },
}

// ---------------------------------------------------------------------------
// Schema types
// ---------------------------------------------------------------------------

/// Key layout of a table and its secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: String,
    /// Partition (HASH) key attribute.
    pub partition_key: String,
    /// Sort (RANGE) key attribute.
    pub sort_key: Option<String>,
    /// Local indexes first, then global ones.
    pub indexes: Vec<IndexSchema>,
}

/// Key layout of a secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    /// Index name.
    pub name: String,
    /// Partition key attribute.
    pub partition_key: String,
    /// Sort key attribute.
    pub sort_key: Option<String>,
    /// `true` for a global secondary index.
    pub global: bool,
}

impl TableSchema {
    /// Build a schema from a `DescribeTable` description.
    pub fn from_description(name: &str, desc: &TableDescription) -> Result<Self, SchemaError> {
        let invalid = |message: String| SchemaError::InvalidDescription {
            table: name.to_owned(),
            message,
        };

        let (partition_key, sort_key) = parse_key_schema(&desc.key_schema);
        let partition_key =
            partition_key.ok_or_else(|| invalid("key schema has no HASH key".to_owned()))?;

        let mut indexes =
            Vec::with_capacity(desc.local_secondary_indexes.len() + desc.global_secondary_indexes.len());
        let local = desc
            .local_secondary_indexes
            .iter()
            .map(|index| (index.index_name.as_deref(), index.key_schema.as_slice(), false));
        let global = desc
            .global_secondary_indexes
            .iter()
            .map(|index| (index.index_name.as_deref(), index.key_schema.as_slice(), true));
        for (index_name, key_schema, is_global) in local.chain(global) {
            let index_name =
                index_name.ok_or_else(|| invalid("secondary index without a name".to_owned()))?;
            let (index_partition, index_sort) = parse_key_schema(key_schema);
            let index_partition = index_partition
                .ok_or_else(|| invalid(format!("index {index_name:?} has no HASH key")))?;
            indexes.push(IndexSchema {
                name: index_name.to_owned(),
                partition_key: index_partition,
                sort_key: index_sort,
                global: is_global,
            });
        }

        Ok(Self {
            name: name.to_owned(),
            partition_key,
            sort_key,
            indexes,
        })
    }

    /// Build a schema from a parsed `CREATE TABLE`.
    ///
    /// Local indexes share the table's partition key.
    pub fn from_create_table(create: &CreateTable) -> Result<Self, SchemaError> {
        let mut partition_key = None;
        let mut sort_key = None;
        for entry in &create.entries {
            if let CreateTableEntry::Attribute(attr) = entry {
                match attr.key {
                    Some(KeyType::Hash) => partition_key = Some(attr.name.clone()),
                    Some(KeyType::Range) => sort_key = Some(attr.name.clone()),
                    None => {}
                }
            }
        }
        let partition_key = partition_key.ok_or_else(|| SchemaError::InvalidDescription {
            table: create.table.clone(),
            message: "no attribute is declared HASH KEY".to_owned(),
        })?;

        let local = create.entries.iter().filter_map(|entry| match entry {
            CreateTableEntry::LocalIndex(index) => Some(IndexSchema {
                name: index.name.clone(),
                partition_key: partition_key.clone(),
                sort_key: Some(index.sort_key.clone()),
                global: false,
            }),
            _ => None,
        });
        let global = create.entries.iter().filter_map(|entry| match entry {
            CreateTableEntry::GlobalIndex(index) => Some(IndexSchema {
                name: index.name.clone(),
                partition_key: index.partition_key.clone(),
                sort_key: index.sort_key.clone(),
                global: true,
            }),
            _ => None,
        });
        let indexes = local.chain(global).collect();

        Ok(Self {
            name: create.table.clone(),
            partition_key,
            sort_key,
            indexes,
        })
    }

    /// Look up a secondary index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Returns `true` if `attribute` is the table's partition or sort key.
    #[must_use]
    pub fn is_key(&self, attribute: &str) -> bool {
        self.partition_key == attribute || self.sort_key.as_deref() == Some(attribute)
    }
}

fn parse_key_schema(key_schema: &[KeySchemaElement]) -> (Option<String>, Option<String>) {
    let mut hash = None;
    let mut range = None;
    for element in key_schema {
        match element.key_type {
            KeyType::Hash => hash = Some(element.attribute_name.clone()),
            KeyType::Range => range = Some(element.attribute_name.clone()),
        }
    }
    (hash, range)
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

type LoadResult = Result<Arc<TableSchema>, SchemaError>;
type LoadFuture = Shared<BoxFuture<'static, LoadResult>>;

/// Loading cache of table schemas, keyed by table name.
///
/// Cloning is cheap and clones share the cache.
#[derive(Clone)]
pub struct SchemaCache {
    inner: Arc<Inner>,
    timeout: Option<Duration>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    tables: DashMap<String, Arc<TableSchema>>,
    in_flight: Mutex<HashMap<String, LoadFuture>>,
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("cached", &self.inner.tables.len())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SchemaCache {
    /// Create an empty cache over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                tables: DashMap::new(),
                in_flight: Mutex::new(HashMap::new()),
            }),
            timeout: None,
        }
    }

    /// Bound how long [`SchemaCache::get`] waits. The load itself keeps
    /// running for other waiters.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the schema of `table`, describing it if it is not cached.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn get(&self, table: &str) -> Result<Arc<TableSchema>, SchemaError> {
        if let Some(schema) = self.cached(table) {
            trace!(table, "schema cache hit");
            return Ok(schema);
        }

        let load = {
            let mut in_flight = self.inner.in_flight.lock();
            // The loader memoizes before leaving the in-flight map.
            if let Some(schema) = self.cached(table) {
                return Ok(schema);
            }
            in_flight
                .entry(table.to_owned())
                .or_insert_with(|| {
                    debug!(table, "schema cache miss");
                    self.spawn_load(table)
                })
                .clone()
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, load)
                .await
                .map_err(|_| SchemaError::Timeout {
                    table: table.to_owned(),
                    elapsed: limit,
                })?,
            None => load.await,
        }
    }

    /// The cached schema of `table`, without loading.
    #[must_use]
    pub fn cached(&self, table: &str) -> Option<Arc<TableSchema>> {
        self.inner
            .tables
            .get(table)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Seed the cache, for example from a `CREATE TABLE` the caller just ran.
    pub fn insert(&self, schema: impl Into<Arc<TableSchema>>) {
        let schema = schema.into();
        self.inner.tables.insert(schema.name.clone(), schema);
    }

    /// Forget `table`. Returns `true` if it was cached.
    pub fn invalidate(&self, table: &str) -> bool {
        self.inner.tables.remove(table).is_some()
    }

    fn spawn_load(&self, table: &str) -> LoadFuture {
        let inner = Arc::clone(&self.inner);
        let name = table.to_owned();
        let handle = tokio::spawn(async move {
            let result = inner.load(&name).await;
            match &result {
                Ok(schema) => {
                    inner.tables.insert(name.clone(), Arc::clone(schema));
                }
                Err(err) => warn!(table = %name, error = %err, "schema load failed"),
            }
            inner.in_flight.lock().remove(&name);
            result
        });

        let name = table.to_owned();
        async move {
            handle
                .await
                .unwrap_or_else(|_| Err(SchemaError::Cancelled { table: name }))
        }
        .boxed()
        .shared()
    }
}

impl Inner {
    async fn load(&self, table: &str) -> LoadResult {
        debug!(table, "describing table");
        let output = self
            .transport
            .describe_table(DescribeTableInput::new(table))
            .await
            .map_err(|source| SchemaError::Store {
                table: table.to_owned(),
                source: Arc::new(source),
            })?;
        let description = output.table.ok_or_else(|| SchemaError::NotFound {
            table: table.to_owned(),
        })?;
        let schema = TableSchema::from_description(table, &description)?;
        debug!(
            table,
            partition_key = %schema.partition_key,
            sort_key = ?schema.sort_key,
            indexes = schema.indexes.len(),
            "loaded table schema"
        );
        Ok(Arc::new(schema))
    }
}
