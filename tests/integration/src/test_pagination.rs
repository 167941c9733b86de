//! Paging and column extraction.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use dynaql_core::{Arg, DynaQlConfig, Error, Transport, Value};
    use dynaql_model::{AttributeValue, store_error};
    use futures::TryStreamExt;
    use serde_json::json;

    use crate::{ScriptedTransport, client, client_with_config, fixture_transport, item, score};

    const BY_USER: &str = "SELECT * FROM gamescores WHERE UserId = :user";

    fn cursor(user: &str, title: &str) -> Option<dynaql_model::Item> {
        Some(item([
            ("UserId", AttributeValue::string(user)),
            ("GameTitle", AttributeValue::string(title)),
        ]))
    }

    #[tokio::test]
    async fn test_should_skip_empty_pages_until_items_arrive() {
        let transport = Arc::new(
            fixture_transport()
                .with_page(Vec::new(), cursor("101", "A"))
                .with_page(Vec::new(), cursor("101", "B"))
                .with_page(
                    vec![score("101", "C", 10), score("101", "D", 20)],
                    None,
                ),
        );
        let client = client(&transport);

        let mut rows = client
            .query_sql(BY_USER, &[Arg::named("user", "101")])
            .await
            .unwrap();
        assert_eq!(rows.column_names(), vec!["document"]);

        let mut titles = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            let document = row.get(0).and_then(Value::as_map).unwrap();
            titles.push(document["GameTitle"].as_s().unwrap().to_owned());
        }
        assert_eq!(titles, vec!["C", "D"]);

        let sent = transport.requests();
        assert_eq!(sent.len(), 3);
        assert!(sent[0].exclusive_start_key.is_empty());
        assert_eq!(Some(sent[1].exclusive_start_key.clone()), cursor("101", "A"));
        assert_eq!(Some(sent[2].exclusive_start_key.clone()), cursor("101", "B"));
        assert!(
            sent.iter()
                .all(|request| request.expression_attribute_values[":user"]
                    == AttributeValue::string("101"))
        );
    }

    #[tokio::test]
    async fn test_should_follow_cursors_across_full_pages() {
        let transport = Arc::new(
            fixture_transport()
                .with_page(vec![score("101", "A", 1)], cursor("101", "A"))
                .with_page(Vec::new(), cursor("101", "B"))
                .with_page(vec![score("101", "C", 3)], None),
        );
        let client = client(&transport);

        let rows = client
            .query_sql(
                "SELECT GameTitle FROM gamescores WHERE UserId = :user",
                &[Arg::named("user", "101")],
            )
            .await
            .unwrap();
        let titles: Vec<Value> = rows
            .into_stream()
            .map_ok(|row| row.into_values().remove(0))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(
            titles,
            vec![Value::String("A".to_owned()), Value::String("C".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_should_honor_limit_across_pages() {
        let transport = Arc::new(
            fixture_transport()
                .with_page(vec![score("101", "A", 1)], cursor("101", "A"))
                .with_page(
                    vec![score("101", "B", 2), score("101", "C", 3)],
                    cursor("101", "C"),
                )
                .with_page(vec![score("101", "D", 4)], None),
        );
        let client = client(&transport);

        let rows = client
            .query_sql(
                "SELECT GameTitle FROM gamescores WHERE UserId = :user LIMIT 2",
                &[Arg::named("user", "101")],
            )
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(transport.pending_pages(), 1);
        assert!(transport.requests().iter().all(|r| r.limit == Some(2)));
    }

    #[tokio::test]
    async fn test_should_extract_nested_paths() {
        let document = item([
            ("UserId", AttributeValue::string("101")),
            (
                "a",
                AttributeValue::M(HashMap::from([(
                    "b".to_owned(),
                    AttributeValue::L(vec![
                        AttributeValue::number(10),
                        AttributeValue::M(HashMap::from([(
                            "c".to_owned(),
                            AttributeValue::L(vec![
                                AttributeValue::string("x"),
                                AttributeValue::string("y"),
                                AttributeValue::string("z"),
                            ]),
                        )])),
                    ]),
                )])),
            ),
            ("scores", AttributeValue::Ns(vec!["7".to_owned(), "9".to_owned()])),
            (
                "avatars",
                AttributeValue::Bs(vec![Bytes::from_static(b"\x89PNG")]),
            ),
        ]);
        let transport = Arc::new(fixture_transport().with_page(vec![document], None));
        let client = client(&transport);

        let mut rows = client
            .query_sql(
                "SELECT a.b[1].c[2], a.b[5], a.missing, scores[1], avatars[0], a.b[0] \
                 FROM gamescores WHERE UserId = :user",
                &[Arg::named("user", "101")],
            )
            .await
            .unwrap();
        assert_eq!(
            rows.column_names(),
            vec!["a.b[1].c[2]", "a.b[5]", "a.missing", "scores[1]", "avatars[0]", "a.b[0]"]
        );

        let mut dest = vec![Value::Null; 6];
        assert!(rows.next_into(&mut dest).await.unwrap());
        assert_eq!(
            dest,
            vec![
                Value::String("z".to_owned()),
                Value::Null,
                Value::Null,
                Value::Number("9".to_owned()),
                Value::Binary(Bytes::from_static(b"\x89PNG")),
                Value::Number("10".to_owned()),
            ]
        );
        assert!(!rows.next_into(&mut dest).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_deep_convert_documents_when_configured() {
        let document = item([
            ("UserId", AttributeValue::string("101")),
            (
                "tags",
                AttributeValue::L(vec![
                    AttributeValue::string("arcade"),
                    AttributeValue::Bool(true),
                ]),
            ),
        ]);
        let transport = Arc::new(fixture_transport().with_page(vec![document], None));
        let client = client_with_config(
            &transport,
            DynaQlConfig::default().with_convert_collections(true),
        );

        let rows = client
            .query_sql(
                "SELECT document(UserId, tags), tags FROM gamescores WHERE UserId = :user",
                &[Arg::named("user", "101")],
            )
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();
        let values = rows[0].values();
        assert_eq!(
            values[0],
            Value::Json(json!({"UserId": "101", "tags": ["arcade", true]}))
        );
        assert_eq!(values[1], Value::Json(json!(["arcade", true])));
        assert_eq!(
            transport.requests()[0].projection_expression.as_deref(),
            Some("UserId, tags, tags")
        );
    }

    #[tokio::test]
    async fn test_should_propagate_store_errors_verbatim() {
        let transport = Arc::new(
            fixture_transport()
                .with_page(vec![score("101", "A", 1)], cursor("101", "A"))
                .with_query_error(store_error!(
                    ProvisionedThroughputExceededException,
                    "The level of configured provisioned throughput for the table was exceeded."
                )),
        );
        let client = client(&transport);

        let mut rows = client
            .query_sql(BY_USER, &[Arg::named("user", "101")])
            .await
            .unwrap();
        assert!(rows.next().await.unwrap().is_some());
        match rows.next().await {
            Err(Error::Store(err)) => assert!(err.is_retryable()),
            other => panic!("expected Store error, got {other:?}"),
        }
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_should_bound_slow_pages() {
        struct Stalled;

        #[async_trait::async_trait]
        impl Transport for Stalled {
            async fn describe_table(
                &self,
                input: dynaql_model::DescribeTableInput,
            ) -> Result<dynaql_model::DescribeTableOutput, dynaql_model::StoreError> {
                ScriptedTransport::new()
                    .with_table("gamescores", crate::gamescores_description())
                    .describe_table(input)
                    .await
            }

            async fn query(
                &self,
                _input: dynaql_model::QueryInput,
            ) -> Result<dynaql_model::QueryOutput, dynaql_model::StoreError> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(dynaql_model::QueryOutput::default())
            }
        }

        crate::init_tracing();
        let client = dynaql_core::Client::new(
            Arc::new(Stalled),
            DynaQlConfig::default().with_page_timeout(Duration::from_millis(20)),
        );
        let mut rows = client
            .query_sql(BY_USER, &[Arg::named("user", "101")])
            .await
            .unwrap();
        match rows.next().await {
            Err(Error::Timeout { operation, elapsed }) => {
                assert_eq!(operation, "Query");
                assert_eq!(elapsed, Duration::from_millis(20));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}
