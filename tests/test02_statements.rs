mod common;

use std::time::Duration;

use common::shared_manager;
use sql_dispatch::prelude::*;

#[test]
fn delete_defaults_to_one_row() {
    let my = QueryGenerator::new(Dialect::Mysql);
    let filter = WhereInput::column("id", 1);

    let sql = my
        .delete_query("t", Some(&filter), &DeleteOptions::default())
        .unwrap();
    assert_eq!(sql, "DELETE FROM `t` WHERE `id` = 1 LIMIT 1;");

    let sql = my
        .delete_query("t", Some(&filter), &DeleteOptions::limit(5))
        .unwrap();
    assert!(sql.contains("LIMIT 5"), "{sql}");

    let sql = my
        .delete_query("t", Some(&filter), &DeleteOptions::unbounded())
        .unwrap();
    assert!(!sql.contains("LIMIT"), "{sql}");

    for dialect in [Dialect::Postgres, Dialect::Sqlite] {
        let sql = QueryGenerator::new(dialect)
            .delete_query("t", Some(&filter), &DeleteOptions::default())
            .unwrap();
        assert!(sql.contains("LIMIT 1"), "{dialect}: {sql}");
    }
}

#[test]
fn create_table_moves_primary_keys_to_a_trailing_clause() {
    let columns: ColumnMap = [
        ("user_id", "INTEGER PRIMARY KEY"),
        ("role_id", "INTEGER PRIMARY KEY"),
        ("note", "TEXT"),
    ]
    .into_iter()
    .collect();

    let sql = QueryGenerator::new(Dialect::Postgres)
        .create_table_query("memberships", &columns, &CreateTableOptions::default())
        .unwrap();
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"memberships\" ("), "{sql}");
    assert!(sql.contains("PRIMARY KEY (\"user_id\", \"role_id\")"), "{sql}");
    assert!(!sql.contains("INTEGER PRIMARY KEY"), "{sql}");
    assert!(sql.ends_with(';'));

    let sql = QueryGenerator::new(Dialect::Mysql)
        .create_table_query("memberships", &columns, &CreateTableOptions::default())
        .unwrap();
    assert!(sql.contains("ENGINE=InnoDB"), "{sql}");
}

#[test]
fn every_generated_statement_is_terminated() {
    let columns: ColumnMap = [("id", "INTEGER PRIMARY KEY"), ("name", "TEXT")]
        .into_iter()
        .collect();
    for dialect in [Dialect::Postgres, Dialect::Mysql, Dialect::Mariadb, Dialect::Sqlite] {
        let g = QueryGenerator::new(dialect);
        let values = vec![("name".to_string(), RowValues::Text("x".into()))];
        let statements = vec![
            g.create_table_query("t", &columns, &CreateTableOptions::default())
                .unwrap(),
            g.drop_table_query("t", false),
            g.rename_table_query("t", "u"),
            g.add_column_query("t", "age", "INTEGER"),
            g.select_query("t", &SelectOptions::new()).unwrap(),
            g.insert_query("t", &values, &InsertOptions::default()).unwrap(),
            g.update_query("t", &values, None, &UpdateOptions::default())
                .unwrap(),
            g.delete_query("t", None, &DeleteOptions::default()).unwrap(),
            g.add_index_query("t", &IndexSpec::on(["name"])).unwrap(),
        ];
        for sql in statements {
            assert!(sql.ends_with(';'), "{dialect}: {sql}");
        }
    }
}

#[test]
fn recursive_cte_joins_against_itself() {
    let cte = CteSpec::new("tree", "nodes")
        .columns(["id", "parent_id"])
        .extra("depth", "0")
        .filter(WhereInput::column("id", 1))
        .recursive(
            CteRecursive::new()
                .next(CteJoin::new("nodes", "n").on("parent_id", "id"))
                .value("depth", "\"tree\".\"depth\" + 1"),
        );
    let sql = QueryGenerator::new(Dialect::Postgres)
        .select_query("tree", &SelectOptions::new().with_cte(cte))
        .unwrap();
    assert!(sql.starts_with("WITH RECURSIVE \"tree\"(\"id\",\"parent_id\",\"depth\") AS ("), "{sql}");
    assert!(sql.contains(" UNION "), "{sql}");
    assert!(sql.contains("INNER JOIN \"nodes\" AS \"n\""), "{sql}");
    assert!(sql.ends_with("SELECT * FROM \"tree\";"), "{sql}");
}

#[tokio::test]
async fn malformed_cte_sends_nothing() {
    let (manager, state) = shared_manager(4, Duration::ZERO);

    let broken = CteSpec::new("x", "nodes")
        .columns(["id"])
        .recursive(CteRecursive::new());
    let generated = manager
        .generator()
        .select_query("x", &SelectOptions::new().with_cte(broken));
    assert!(matches!(
        generated,
        Err(SqlDispatchError::MalformedStatementSpec(_))
    ));

    if let Ok(sql) = generated {
        manager.submit(sql, QueryOptions::new()).await.unwrap();
    }
    assert!(state.executed().is_empty());
    assert_eq!(manager.status(), ConnectionStatus::Disconnected);
}

#[test]
fn index_options_outside_the_dialect_fail_fast() {
    let concurrent = IndexSpec::on(["name"]).concurrently();
    assert!(QueryGenerator::new(Dialect::Postgres)
        .add_index_query("t", &concurrent)
        .unwrap()
        .contains("CONCURRENTLY"));
    assert!(matches!(
        QueryGenerator::new(Dialect::Mysql).add_index_query("t", &concurrent),
        Err(SqlDispatchError::MalformedStatementSpec(_))
    ));
    assert!(matches!(
        QueryGenerator::new(Dialect::Sqlite).add_index_query("t", &IndexSpec::on(Vec::<&str>::new())),
        Err(SqlDispatchError::MalformedStatementSpec(_))
    ));
}
