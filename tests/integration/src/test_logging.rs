//! Diagnostic events emitted while preparing and paging.

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use dynaql_core::{Arg, Error};
    use dynaql_model::{AttributeValue, store_error};
    use parking_lot::Mutex;
    use tracing_subscriber::EnvFilter;

    use crate::{client, fixture_transport, item};

    const BY_USER: &str = "SELECT * FROM gamescores WHERE UserId = :user";

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_should_log_cache_and_page_events() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("dynaql_core=trace"))
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let cursor = item([
            ("UserId", AttributeValue::string("101")),
            ("GameTitle", AttributeValue::string("A")),
        ]);
        let transport = Arc::new(
            fixture_transport()
                .with_failing_describes(1)
                .with_page(Vec::new(), Some(cursor))
                .with_query_error(store_error!(InternalServerError, "boom")),
        );
        let client = client(&transport);

        assert!(client.prepare(BY_USER).await.is_err());
        let mut rows = client
            .query_sql(BY_USER, &[Arg::named("user", "101")])
            .await
            .unwrap();
        match rows.next().await {
            Err(Error::Store(_)) => {}
            other => panic!("expected Store error, got {other:?}"),
        }
        client.prepare(BY_USER).await.unwrap();

        let logs = captured.text();
        for event in [
            "schema cache miss",
            "schema load failed",
            "schema cache hit",
            "skipping empty page",
            "query page failed",
        ] {
            assert!(logs.contains(event), "missing {event:?} in:\n{logs}");
        }
    }
}
