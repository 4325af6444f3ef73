#![cfg(feature = "sqlite")]

use sql_dispatch::prelude::*;

fn manager_for(path: &std::path::Path, pooled: bool) -> QueryManager<SqliteDriver> {
    let mut builder = ConnectionConfig::builder(Dialect::Sqlite)
        .database(path.to_string_lossy().to_string())
        .max_concurrent_queries(4);
    builder = if pooled {
        builder.max_connections(2)
    } else {
        builder.no_pool()
    };
    QueryManager::new(SqliteDriver::new(), builder.build().unwrap()).unwrap()
}

fn row(pairs: &[(&str, RowValues)]) -> Vec<(String, RowValues)> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

#[tokio::test]
async fn generated_statements_run_end_to_end() -> Result<(), SqlDispatchError> {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_for(&dir.path().join("app.db"), false);
    let g = manager.generator().clone();

    let columns: ColumnMap = [
        ("id", "INTEGER PRIMARY KEY"),
        ("name", "TEXT NOT NULL"),
        ("active", "TINYINT(1) DEFAULT true"),
    ]
    .into_iter()
    .collect();
    manager
        .submit(
            g.create_table_query("users", &columns, &CreateTableOptions::default())?,
            QueryOptions::new(),
        )
        .await?;

    let inserted = manager
        .submit(
            g.insert_query(
                "users",
                &row(&[("name", RowValues::Text("O'Neil".into()))]),
                &InsertOptions::default(),
            )?,
            QueryOptions::new(),
        )
        .await?;
    assert_eq!(
        inserted,
        QueryOutcome::Inserted {
            id: Some(1),
            rows_affected: 1
        }
    );

    manager
        .submit(
            g.bulk_insert_query(
                "users",
                &[
                    row(&[
                        ("name", RowValues::Text("b".into())),
                        ("active", RowValues::Bool(true)),
                    ]),
                    row(&[
                        ("name", RowValues::Text("c".into())),
                        ("active", RowValues::Bool(false)),
                    ]),
                ],
                &InsertOptions::default(),
            )?,
            QueryOptions::new(),
        )
        .await?;

    let filter = WhereInput::column("active", true);
    let select = g.select_query(
        "users",
        &SelectOptions::new()
            .filter(filter.clone())
            .order_by("id", SortDirection::Asc),
    )?;
    let outcome = manager.submit(select, QueryOptions::new()).await?;
    let rows = outcome.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows.results[0].get("name"),
        Some(&RowValues::Text("O'Neil".into()))
    );

    let updated = manager
        .submit(
            g.update_query(
                "users",
                &row(&[("active", RowValues::Bool(false))]),
                Some(&filter),
                &UpdateOptions::default(),
            )?,
            QueryOptions::new(),
        )
        .await?;
    assert_eq!(updated, QueryOutcome::Affected(2));

    let deleted = manager
        .submit(
            g.delete_query(
                "users",
                Some(&WhereInput::column("active", false)),
                &DeleteOptions::default(),
            )?,
            QueryOptions::new(),
        )
        .await?;
    assert_eq!(deleted, QueryOutcome::Affected(1));

    assert_eq!(manager.show_tables().await?, vec!["users".to_string()]);
    assert!(manager.version().await?.is_some());
    Ok(())
}

#[tokio::test]
async fn column_migrations_rebuild_the_table() -> Result<(), SqlDispatchError> {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_for(&dir.path().join("migrate.db"), true);
    let g = manager.generator().clone();

    manager
        .submit(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, nickname TEXT);",
            QueryOptions::new(),
        )
        .await?;
    manager
        .submit(
            "INSERT INTO people (name, nickname) VALUES ('ann', 'a'), ('bob', 'b');",
            QueryOptions::new(),
        )
        .await?;

    // leftover from an earlier interrupted rebuild, with an unrelated shape
    manager
        .submit("CREATE TABLE people_backup (junk BLOB);", QueryOptions::new())
        .await?;

    let current = manager.column_map("people").await?;
    assert_eq!(current.names().collect::<Vec<_>>(), vec!["id", "name", "nickname"]);

    let plan = g.remove_column_query("people", "nickname", &current)?;
    assert_eq!(plan.len(), 7);
    let report = manager.run_plan(&plan).await;
    assert!(report.is_complete(), "{report:?}");

    let current = manager.column_map("people").await?;
    let plan = g.rename_column_query("people", "name", "full_name", &current)?;
    manager.run_plan(&plan).await.into_result()?;

    let outcome = manager
        .submit(
            "SELECT id, full_name FROM people ORDER BY id;",
            QueryOptions::new(),
        )
        .await?;
    let rows = outcome.rows().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        rows.results[1].get("full_name"),
        Some(&RowValues::Text("bob".into()))
    );
    assert!(rows.results[0].get("nickname").is_none());

    assert_eq!(manager.show_tables().await?, vec!["people".to_string()]);
    Ok(())
}

#[tokio::test]
async fn plans_stop_at_the_first_failing_step() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_for(&dir.path().join("partial.db"), false);

    let mut plan = MigrationPlan::single("CREATE TABLE a (id INTEGER);");
    plan.push("CREATE TABLE a (id INTEGER);");
    plan.push("CREATE TABLE b (id INTEGER);");

    let report = manager.run_plan(&plan).await;
    assert_eq!(report.applied, 1);
    assert_eq!(report.total, 3);
    assert!(matches!(report.error, Some(SqlDispatchError::SqliteError(_))));
    assert_eq!(manager.show_tables().await.unwrap(), vec!["a".to_string()]);
}
