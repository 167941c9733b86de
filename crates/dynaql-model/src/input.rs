//! Request shapes sent to the store.
//!
//! Optional fields are omitted when `None` and empty maps are omitted, so a
//! serialized request carries only what the compiler actually populated.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::attribute_value::{AttributeValue, Item};

/// Input for `DescribeTable`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeTableInput {
    /// Table to describe.
    pub table_name: String,
}

impl DescribeTableInput {
    /// Describe the named table.
    #[must_use]
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
        }
    }
}

/// Input for `Query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryInput {
    /// Table to query.
    pub table_name: String,

    /// Secondary index to query instead of the base table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// Condition on the partition key and, optionally, the sort key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_condition_expression: Option<String>,

    /// Post-read filter applied by the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_expression: Option<String>,

    /// Attributes to return; absent means the whole item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection_expression: Option<String>,

    /// `#name` substitutions for attribute names.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_names: HashMap<String, String>,

    /// `:value` substitutions for attribute values.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub expression_attribute_values: HashMap<String, AttributeValue>,

    /// `false` reads the sort key in descending order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_index_forward: Option<bool>,

    /// Maximum number of items to evaluate per page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,

    /// Continuation cursor from the previous page.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exclusive_start_key: Item,

    /// Request a strongly consistent read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistent_read: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_omit_unset_query_fields() {
        let input = QueryInput {
            table_name: "movies".to_owned(),
            key_condition_expression: Some("title = :_gen1".to_owned()),
            ..QueryInput::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "TableName": "movies",
                "KeyConditionExpression": "title = :_gen1",
            })
        );
    }

    #[test]
    fn test_should_serialize_cursor_and_direction() {
        let mut cursor = Item::new();
        cursor.insert("title".to_owned(), AttributeValue::string("Up"));
        let input = QueryInput {
            table_name: "movies".to_owned(),
            scan_index_forward: Some(false),
            exclusive_start_key: cursor,
            ..QueryInput::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["ScanIndexForward"], serde_json::json!(false));
        assert_eq!(json["ExclusiveStartKey"]["title"]["S"], "Up");
    }
}
