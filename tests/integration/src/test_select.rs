//! Statement compilation and binding through the client.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use dynaql_core::Error;
    use dynaql_core::query::{BindError, CompileError};
    use dynaql_core::sql::Literal;
    use dynaql_core::{Arg, Value};
    use dynaql_model::AttributeValue;

    use crate::{client, fixture_transport, score};

    // -----------------------------------------------------------------------
    // Key / filter classification
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_should_split_gamescores_key_and_filter() {
        let transport = Arc::new(fixture_transport().with_page(
            vec![score("101", "Meteor Blasters", 1000)],
            None,
        ));
        let client = client(&transport);

        let prepared = client
            .prepare(
                "SELECT UserId, TopScore FROM gamescores \
                 WHERE UserId = :UserId AND TopScore > \"Meteor\"",
            )
            .await
            .unwrap();
        let request = prepared.request();
        assert_eq!(request.table_name, "gamescores");
        assert_eq!(
            request.key_condition_expression.as_deref(),
            Some("UserId = :UserId")
        );
        assert_eq!(
            request.filter_expression.as_deref(),
            Some("TopScore > :_gen1")
        );
        assert_eq!(
            request.projection_expression.as_deref(),
            Some("UserId, TopScore")
        );
        assert!(request.expression_attribute_names.is_empty());
        assert_eq!(
            prepared.params().fixed.get(":_gen1"),
            Some(&Literal::String("Meteor".to_owned()))
        );

        let rows = client
            .query(&prepared, &[Arg::named("UserId", "101")])
            .unwrap()
            .collect()
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get(0), Some(&Value::String("101".to_owned())));
        assert_eq!(rows[0].get(1), Some(&Value::Number("1000".to_owned())));

        let sent = transport.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].expression_attribute_values,
            HashMap::from([
                (":UserId".to_owned(), AttributeValue::string("101")),
                (":_gen1".to_owned(), AttributeValue::string("Meteor")),
            ])
        );
    }

    #[tokio::test]
    async fn test_should_keep_parenthesized_or_as_filter() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        let prepared = client
            .prepare(
                "SELECT * FROM movies \
                 WHERE title = \"X\" AND (year BETWEEN 2009 AND 2015 OR actor = \"Y\")",
            )
            .await
            .unwrap();
        let request = prepared.request();
        assert_eq!(
            request.key_condition_expression.as_deref(),
            Some("title = :_gen1")
        );
        assert_eq!(
            request.filter_expression.as_deref(),
            Some("(#year BETWEEN :_gen2 AND :_gen3 OR actor = :_gen4)")
        );
        assert_eq!(
            request.expression_attribute_names,
            HashMap::from([("#year".to_owned(), "year".to_owned())])
        );
        assert!(request.projection_expression.is_none());
        assert_eq!(prepared.params().fixed.len(), 4);
    }

    #[tokio::test]
    async fn test_should_reject_partition_key_inside_parentheses() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        let moved = client
            .prepare(
                "SELECT * FROM movies \
                 WHERE (title = \"X\" AND year BETWEEN 2009 AND 2015 OR actor = \"Y\")",
            )
            .await;
        match moved {
            Err(Error::Compile(CompileError::InvalidPartitionKeyCondition { partition_key })) => {
                assert_eq!(partition_key, "title");
            }
            other => panic!("expected InvalidPartitionKeyCondition, got {other:?}"),
        }

        let repeated = client
            .prepare("SELECT * FROM movies WHERE title = \"X\" AND (title = \"Y\" OR actor = \"Z\")")
            .await;
        match repeated {
            Err(Error::Compile(CompileError::PartitionKeyInNestedExpression { key })) => {
                assert_eq!(key, "title");
            }
            other => panic!("expected PartitionKeyInNestedExpression, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_require_single_partition_key_equality() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        for sql in [
            "SELECT * FROM gamescores",
            "SELECT * FROM gamescores WHERE GameTitle = 'Galaxy Invaders'",
            "SELECT * FROM gamescores WHERE UserId > '1'",
            "SELECT * FROM gamescores WHERE UserId = '1' OR UserId = '2'",
            "SELECT * FROM gamescores WHERE begins_with(UserId, '1')",
        ] {
            match client.prepare(sql).await {
                Err(Error::Compile(CompileError::InvalidPartitionKeyCondition { .. })) => {}
                other => panic!("{sql}: expected InvalidPartitionKeyCondition, got {other:?}"),
            }
        }

        match client
            .prepare("SELECT * FROM gamescores WHERE UserId = '1' AND UserId = '2'")
            .await
        {
            Err(Error::Compile(CompileError::DuplicatePartitionKey { key })) => {
                assert_eq!(key, "UserId");
            }
            other => panic!("expected DuplicatePartitionKey, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_restrict_sort_key_operators() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        let prepared = client
            .prepare("SELECT * FROM gamescores WHERE UserId = :u AND begins_with(GameTitle, :p)")
            .await
            .unwrap();
        assert_eq!(
            prepared.request().key_condition_expression.as_deref(),
            Some("UserId = :u AND begins_with(GameTitle, :p)")
        );

        match client
            .prepare("SELECT * FROM gamescores WHERE UserId = :u AND GameTitle != :t")
            .await
        {
            Err(Error::Compile(CompileError::IllegalSortKeyOperator { key, operator })) => {
                assert_eq!(key, "GameTitle");
                assert_eq!(operator, "<>");
            }
            other => panic!("expected IllegalSortKeyOperator, got {other:?}"),
        }

        match client
            .prepare("SELECT * FROM gamescores WHERE UserId = :u AND contains(GameTitle, :t)")
            .await
        {
            Err(Error::Compile(CompileError::IllegalSortKeyFunction { function, .. })) => {
                assert_eq!(function, "contains");
            }
            other => panic!("expected IllegalSortKeyFunction, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_compile_against_index_keys() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        let prepared = client
            .prepare(
                "SELECT * FROM gamescores USE INDEX (GameTitleIndex) \
                 WHERE GameTitle = :t AND TopScore >= :min DESC LIMIT 5",
            )
            .await
            .unwrap();
        let request = prepared.request();
        assert_eq!(request.index_name.as_deref(), Some("GameTitleIndex"));
        assert_eq!(
            request.key_condition_expression.as_deref(),
            Some("GameTitle = :t AND TopScore >= :min")
        );
        assert_eq!(request.scan_index_forward, Some(false));
        assert_eq!(request.limit, Some(5));

        match client
            .prepare("SELECT * FROM gamescores USE INDEX (Nope) WHERE UserId = :u")
            .await
        {
            Err(Error::Compile(CompileError::UnknownIndex { index, table })) => {
                assert_eq!((index.as_str(), table.as_str()), ("Nope", "gamescores"));
            }
            other => panic!("expected UnknownIndex, got {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // Names and placeholders
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_should_reuse_substituted_names() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        let prepared = client
            .prepare(
                "SELECT year, `first-name`, info.`first-name` FROM movies \
                 WHERE title = :t AND (year > 1990 OR year < 1950) AND `first-name` <> 'x'",
            )
            .await
            .unwrap();
        let request = prepared.request();
        assert_eq!(
            request.filter_expression.as_deref(),
            Some("(#year > :_gen1 OR #year < :_gen2) AND #_gen1 <> :_gen3")
        );
        assert_eq!(
            request.projection_expression.as_deref(),
            Some("#year, #_gen1, info.#_gen1")
        );
        assert_eq!(
            request.expression_attribute_names,
            HashMap::from([
                ("#year".to_owned(), "year".to_owned()),
                ("#_gen1".to_owned(), "first-name".to_owned()),
            ])
        );
    }

    #[tokio::test]
    async fn test_should_reject_mixed_placeholders() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        match client
            .prepare("SELECT * FROM gamescores WHERE UserId = ? AND GameTitle = :x")
            .await
        {
            Err(Error::Compile(CompileError::MixedPlaceholders)) => {}
            other => panic!("expected MixedPlaceholders, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_bind_positional_arguments() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        let prepared = client
            .prepare("SELECT * FROM gamescores WHERE UserId = ? AND GameTitle = ? AND Wins > 10")
            .await
            .unwrap();
        let values = prepared
            .bind(&Arg::from_values(["101", "Galaxy Invaders"]))
            .unwrap();
        assert_eq!(values[":_pos1"], AttributeValue::string("101"));
        assert_eq!(values[":_pos2"], AttributeValue::string("Galaxy Invaders"));
        assert_eq!(values[":_gen1"], AttributeValue::number(10));

        match client.query(&prepared, &[Arg::named("UserId", "101")]) {
            Err(Error::Bind(BindError::WrongArgumentCount { expected, got })) => {
                assert_eq!((expected, got), (2, 1));
            }
            other => panic!("expected WrongArgumentCount, got {other:?}"),
        }
        match client.query(
            &prepared,
            &[Arg::positional(1, "101"), Arg::named("GameTitle", "x")],
        ) {
            Err(Error::Bind(BindError::NamedArgForPositionalQuery { name })) => {
                assert_eq!(name, "GameTitle");
            }
            other => panic!("expected NamedArgForPositionalQuery, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_reject_arguments_for_query_without_placeholders() {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        let prepared = client
            .prepare("SELECT * FROM gamescores WHERE UserId = '101'")
            .await
            .unwrap();
        match prepared.bind(&Arg::from_values(["extra"])) {
            Err(BindError::WrongArgumentCount { expected, got }) => {
                assert_eq!((expected, got), (0, 1));
            }
            other => panic!("expected WrongArgumentCount, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_should_round_trip_every_literal_kind() -> anyhow::Result<()> {
        let transport = Arc::new(fixture_transport());
        let client = client(&transport);

        for (literal, expected) in [
            ("42", AttributeValue::N("42".to_owned())),
            ("-1.5", AttributeValue::N("-1.5".to_owned())),
            ("'Meteor'", AttributeValue::string("Meteor")),
            ("true", AttributeValue::Bool(true)),
            ("null", AttributeValue::Null(true)),
        ] {
            let sql = format!("SELECT * FROM gamescores WHERE UserId = {literal}");
            let prepared = client.prepare(&sql).await?;
            let values = prepared.bind(&[])?;
            assert_eq!(values.len(), 1, "{sql}");
            assert_eq!(values.get(":_gen1"), Some(&expected), "{sql}");
        }
        Ok(())
    }
}
