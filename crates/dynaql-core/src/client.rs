//! Client facade over the parse, compile, bind and read stages.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::DynaQlConfig;
use crate::error::Error;
use crate::query::{Arg, PreparedQuery, compile};
use crate::rows::{RowOptions, Rows};
use crate::schema::{SchemaCache, TableSchema};
use crate::sql::{self, Statement};
use crate::transport::Transport;

/// Runs `SELECT` statements over a [`Transport`].
///
/// Cloning is cheap; clones share the schema cache.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use dynaql_core::{Arg, Client, DynaQlConfig, Transport};
/// use dynaql_model::{
///     DescribeTableInput, DescribeTableOutput, QueryInput, QueryOutput, StoreError,
/// };
///
/// struct Offline;
///
/// #[async_trait::async_trait]
/// impl Transport for Offline {
///     async fn describe_table(
///         &self,
///         input: DescribeTableInput,
///     ) -> Result<DescribeTableOutput, StoreError> {
///         Err(StoreError::resource_not_found(input.table_name))
///     }
///
///     async fn query(&self, _input: QueryInput) -> Result<QueryOutput, StoreError> {
///         Ok(QueryOutput::default())
///     }
/// }
///
/// tokio_test::block_on(async {
///     let client = Client::new(Arc::new(Offline), DynaQlConfig::default());
///     client
///         .define_table(
///             "CREATE TABLE gamescores (UserId STRING HASH KEY, GameTitle STRING RANGE KEY) \
///              PROVISIONED THROUGHPUT READ 1 WRITE 1",
///         )
///         .unwrap();
///
///     let prepared = client
///         .prepare("SELECT TopScore FROM gamescores WHERE UserId = :user")
///         .await
///         .unwrap();
///     assert_eq!(
///         prepared.request().key_condition_expression.as_deref(),
///         Some("UserId = :user")
///     );
///
///     let rows = client
///         .query(&prepared, &[Arg::named("user", "101")])
///         .unwrap()
///         .collect()
///         .await
///         .unwrap();
///     assert!(rows.is_empty());
/// });
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    schemas: SchemaCache,
    config: DynaQlConfig,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("schemas", &self.schemas)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client. The schema cache starts empty.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: DynaQlConfig) -> Self {
        let schemas = SchemaCache::new(Arc::clone(&transport)).with_timeout(config.describe_timeout);
        Self {
            transport,
            schemas,
            config,
        }
    }

    /// The schema cache used by [`Client::prepare`].
    #[must_use]
    pub fn schemas(&self) -> &SchemaCache {
        &self.schemas
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &DynaQlConfig {
        &self.config
    }

    /// Parse and compile a `SELECT`.
    ///
    /// The table schema is fetched on first use and cached.
    pub async fn prepare(&self, text: &str) -> Result<PreparedQuery, Error> {
        let select = match sql::parse(text)? {
            Statement::Select(select) => select,
            other => {
                return Err(Error::Unsupported {
                    statement: other.kind(),
                });
            }
        };

        let schema = self.schemas.get(&select.from).await?;
        let prepared = compile(&schema, &select)?;
        debug!(table = %select.from, "prepared select");
        Ok(prepared)
    }

    /// Bind `args` and open a row reader. No request is sent until the first
    /// row is read.
    pub fn query(&self, prepared: &PreparedQuery, args: &[Arg]) -> Result<Rows, Error> {
        let request = prepared.new_request(args)?;
        Ok(Rows::open(
            Arc::clone(&self.transport),
            request,
            prepared.columns().to_vec(),
            RowOptions::from(&self.config),
        ))
    }

    /// [`Client::prepare`] followed by [`Client::query`].
    pub async fn query_sql(&self, text: &str, args: &[Arg]) -> Result<Rows, Error> {
        let prepared = self.prepare(text).await?;
        self.query(&prepared, args)
    }

    /// Seed the schema cache from a `CREATE TABLE` statement instead of
    /// asking the store.
    pub fn define_table(&self, text: &str) -> Result<Arc<TableSchema>, Error> {
        let create = match sql::parse(text)? {
            Statement::CreateTable(create) => create,
            other => {
                return Err(Error::Unsupported {
                    statement: other.kind(),
                });
            }
        };

        let schema = Arc::new(TableSchema::from_create_table(&create)?);
        self.schemas.insert(Arc::clone(&schema));
        debug!(table = %create.table, "defined table schema");
        Ok(schema)
    }
}
