//! Response shapes returned by the store.

use serde::{Deserialize, Serialize};

use crate::attribute_value::Item;
use crate::types::TableDescription;

/// Output for `DescribeTable`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableOutput {
    /// Table metadata; absent if the store returned none.
    #[serde(rename = "Table", skip_serializing_if = "Option::is_none")]
    pub table: Option<TableDescription>,
}

/// Output for one page of `Query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryOutput {
    /// Items that passed the filter on this page. May be empty even when more
    /// pages follow.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,

    /// Number of items on this page.
    #[serde(default)]
    pub count: i32,

    /// Number of items read before filtering.
    #[serde(default)]
    pub scanned_count: i32,

    /// Cursor for the next page; empty when the result set is exhausted.
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub last_evaluated_key: Item,
}

impl QueryOutput {
    /// Build a page from items and an optional cursor.
    #[must_use]
    pub fn page(items: Vec<Item>, last_evaluated_key: Option<Item>) -> Self {
        let count = i32::try_from(items.len()).unwrap_or(i32::MAX);
        Self {
            items,
            count,
            scanned_count: count,
            last_evaluated_key: last_evaluated_key.unwrap_or_default(),
        }
    }

    /// Returns `true` if the store reported a continuation cursor.
    #[must_use]
    pub fn has_more(&self) -> bool {
        !self.last_evaluated_key.is_empty()
    }
}
