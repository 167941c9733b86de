//! Store transport boundary.
//!
//! The [`Transport`] trait uses `#[async_trait]` because it is held as
//! `Arc<dyn Transport>` by the schema cache and the row reader.

use dynaql_model::{DescribeTableInput, DescribeTableOutput, QueryInput, QueryOutput, StoreError};

/// The two DynamoDB operations this crate needs.
///
/// Implementations own networking, signing and retries; errors are passed to
/// the caller unchanged.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Describe a table. Called at most once per table name while the
    /// schema stays cached.
    async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> Result<DescribeTableOutput, StoreError>;

    /// Fetch one page of a query. `input.exclusive_start_key` carries the
    /// cursor from the previous page.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, StoreError>;
}
