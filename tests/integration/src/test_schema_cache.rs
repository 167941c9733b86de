//! Schema loading through the client.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use dynaql_core::schema::SchemaError;
    use dynaql_core::{DynaQlConfig, Error};
    use dynaql_model::StoreErrorCode;
    use futures::future::join_all;

    use crate::{ScriptedTransport, client, client_with_config, fixture_transport};

    const BY_USER: &str = "SELECT * FROM gamescores WHERE UserId = :user";

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_should_describe_once_for_concurrent_prepares() {
        let transport =
            Arc::new(fixture_transport().with_describe_delay(Duration::from_millis(50)));
        let client = client(&transport);

        let results = join_all((0..16).map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.prepare(BY_USER).await })
        }))
        .await;

        for result in results {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(transport.describe_calls(), 1);

        client.prepare(BY_USER).await.unwrap();
        assert_eq!(transport.describe_calls(), 1);
        let schema = client.schemas().cached("gamescores").unwrap();
        assert_eq!(schema.sort_key.as_deref(), Some("GameTitle"));
        let names: Vec<&str> = schema.indexes.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["UserWinsIndex", "GameTitleIndex"]);
    }

    #[tokio::test]
    async fn test_should_share_failure_and_retry_later() {
        let transport = Arc::new(
            fixture_transport()
                .with_failing_describes(1)
                .with_describe_delay(Duration::from_millis(20)),
        );
        let client = client(&transport);

        let (first, second) = tokio::join!(client.prepare(BY_USER), client.prepare(BY_USER));
        for result in [first, second] {
            match result {
                Err(Error::Schema(SchemaError::Store { table, source })) => {
                    assert_eq!(table, "gamescores");
                    assert_eq!(source.code, StoreErrorCode::ThrottlingException);
                }
                other => panic!("expected Store error, got {other:?}"),
            }
        }
        assert_eq!(transport.describe_calls(), 1);
        assert!(client.schemas().cached("gamescores").is_none());

        client.prepare(BY_USER).await.unwrap();
        assert_eq!(transport.describe_calls(), 2);
    }

    #[tokio::test]
    async fn test_should_report_unknown_tables() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client(&transport);

        match client.prepare("SELECT * FROM nowhere WHERE id = 1").await {
            Err(Error::Schema(SchemaError::Store { source, .. })) => {
                assert_eq!(source.code, StoreErrorCode::ResourceNotFoundException);
                assert!(source.message.contains("nowhere"));
            }
            other => panic!("expected ResourceNotFoundException, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_reject_description_without_partition_key() {
        let transport = Arc::new(ScriptedTransport::new().with_table(
            "broken",
            serde_json::json!({"Table": {"TableName": "broken", "KeySchema": []}}),
        ));
        let broken = client(&transport);

        match broken.prepare("SELECT * FROM broken WHERE id = 1").await {
            Err(Error::Schema(SchemaError::InvalidDescription { table, .. })) => {
                assert_eq!(table, "broken");
            }
            other => panic!("expected InvalidDescription, got {other:?}"),
        }

        let missing = Arc::new(ScriptedTransport::new().with_table("ghost", serde_json::json!({})));
        let ghost = client(&missing);
        match ghost.prepare("SELECT * FROM ghost WHERE id = 1").await {
            Err(Error::Schema(SchemaError::NotFound { table })) => assert_eq!(table, "ghost"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_time_out_waiting_for_schema_and_keep_loading() {
        let transport =
            Arc::new(fixture_transport().with_describe_delay(Duration::from_millis(100)));
        let client = client_with_config(
            &transport,
            DynaQlConfig::default().with_describe_timeout(Duration::from_millis(10)),
        );

        match client.prepare(BY_USER).await {
            Err(Error::Schema(SchemaError::Timeout { table, elapsed })) => {
                assert_eq!(table, "gamescores");
                assert_eq!(elapsed, Duration::from_millis(10));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(client.schemas().cached("gamescores").is_some());
        client.prepare(BY_USER).await.unwrap();
        assert_eq!(transport.describe_calls(), 1);
    }

    #[tokio::test]
    async fn test_should_reload_after_invalidate() -> anyhow::Result<()> {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        client.prepare(BY_USER).await?;
        assert!(client.schemas().invalidate("gamescores"));
        assert!(!client.schemas().invalidate("gamescores"));
        client.prepare(BY_USER).await?;
        assert_eq!(transport.describe_calls(), 2);
        Ok(())
    }
}
