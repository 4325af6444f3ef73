mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use common::{MockDriver, MockState};
use sql_dispatch::prelude::*;

fn replicated(max_connections: u32) -> (QueryManager<MockDriver>, Arc<MockState>) {
    let driver = MockDriver::new(Dialect::Postgres).with_delay(Duration::from_millis(50));
    let state = Arc::clone(&driver.state);
    let config = ConnectionConfig::builder(Dialect::Postgres)
        .database("app")
        .credentials("app", "secret")
        .max_connections(max_connections)
        .read_replica(Endpoint::new().host("replica-1"))
        .read_replica(Endpoint::new().host("replica-2"))
        .write_endpoint(Endpoint::new().host("primary"))
        .build()
        .unwrap();
    (QueryManager::new(driver, config).unwrap(), state)
}

#[tokio::test]
async fn concurrent_reads_use_every_replica() {
    let (manager, state) = replicated(2);

    let futures: Vec<QueryFuture> = (0..4)
        .map(|i| manager.dispatch(format!("SELECT {i}"), QueryOptions::new(), None))
        .collect();
    let handles: Vec<Arc<QueryHandle>> = futures.iter().map(|f| Arc::clone(f.handle())).collect();
    for future in futures {
        future.await.unwrap();
    }

    let replicas: BTreeSet<String> = state.executed().into_iter().map(|e| e.endpoint).collect();
    assert_eq!(
        replicas,
        BTreeSet::from(["replica-1".to_string(), "replica-2".to_string()])
    );
    for handle in handles {
        let binding = handle.binding().unwrap();
        assert_eq!(binding.role, ConnectionRole::Read);
        assert!(binding.endpoint.starts_with("replica-"), "{}", binding.endpoint);
        assert!(binding.endpoint.ends_with(":5432/app"), "{}", binding.endpoint);
    }
}

#[tokio::test]
async fn everything_but_plain_selects_goes_to_the_primary() {
    let (manager, state) = replicated(2);

    let writes = [
        "INSERT INTO t (a) VALUES (1);",
        "UPDATE t SET a = 2;",
        "DELETE FROM t;",
        "CREATE TABLE u (id INTEGER);",
    ];
    for sql in writes {
        let future = manager.dispatch(sql, QueryOptions::new(), None);
        let handle = Arc::clone(future.handle());
        future.await.unwrap();
        assert_eq!(handle.binding().unwrap().role, ConnectionRole::Write);
    }
    // an explicit kind overrides the text
    manager
        .submit("SELECT 1", QueryOptions::new().kind(QueryKind::Raw))
        .await
        .unwrap();

    assert!(state.executed().iter().all(|e| e.endpoint == "primary"));
}

#[tokio::test]
async fn disconnect_drains_both_pools() {
    let (manager, state) = replicated(2);
    manager.submit("SELECT 1", QueryOptions::new()).await.unwrap();
    manager.submit("UPDATE t SET a = 1;", QueryOptions::new()).await.unwrap();
    assert_eq!(manager.status(), ConnectionStatus::Connected);

    manager.disconnect().await;
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);

    manager.submit("SELECT 2", QueryOptions::new()).await.unwrap();
    assert_eq!(state.executed().len(), 3);
    assert_eq!(manager.status(), ConnectionStatus::Connected);
}

#[tokio::test]
async fn pooled_connect_failures_fail_the_query() {
    let (manager, state) = replicated(1);
    state
        .fail_connect
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let err = manager.submit("SELECT 1", QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, SqlDispatchError::ConnectionError(_)));
    assert!(manager.connect().await.is_err());
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
}
