use std::collections::BTreeSet;

use serde_json::json;
use sql_dispatch::prelude::*;

fn compile(input: &WhereInput, dialect: Dialect) -> CompiledWhere {
    QueryGenerator::new(dialect).compile_where(input, None).unwrap()
}

/// Each `AND`-joined clause paired with its bound values.
fn clause_set(compiled: &CompiledWhere) -> BTreeSet<String> {
    compiled
        .inline(profile(Dialect::Mysql))
        .unwrap()
        .split(" AND ")
        .map(str::to_string)
        .collect()
}

#[test]
fn merging_units_is_order_independent() {
    let forward = WhereInput::All(vec![
        WhereInput::column("a", 1),
        WhereInput::column("b", 2),
    ]);
    let backward = WhereInput::All(vec![
        WhereInput::column("b", 2),
        WhereInput::column("a", 1),
    ]);

    let f = compile(&forward, Dialect::Mysql);
    let b = compile(&backward, Dialect::Mysql);
    assert_eq!(clause_set(&f), clause_set(&b));
    assert_eq!(
        clause_set(&f),
        BTreeSet::from(["`a` = 1".to_string(), "`b` = 2".to_string()])
    );
}

#[test]
fn in_lists_accumulate_across_units() {
    let input = WhereInput::All(vec![
        WhereInput::column(
            "col",
            ColumnFilter::op(
                WhereOperator::In,
                Operand::List(vec![RowValues::Int(1), RowValues::Int(2)]),
            ),
        ),
        WhereInput::column(
            "col",
            ColumnFilter::op(WhereOperator::In, Operand::List(vec![RowValues::Int(3)])),
        ),
    ]);
    let compiled = compile(&input, Dialect::Postgres);
    assert_eq!(compiled.sql, "\"col\" IN (?, ?, ?)");
    assert_eq!(
        compiled.bindings,
        vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)]
    );
}

#[test]
fn null_alone_compiles_to_nothing() {
    for dialect in [Dialect::Postgres, Dialect::Mysql, Dialect::Sqlite] {
        let compiled = compile(&WhereInput::column("col", RowValues::Null), dialect);
        assert!(compiled.is_empty(), "{dialect}: {}", compiled.sql);
        let sql = QueryGenerator::new(dialect)
            .select_query(
                "t",
                &SelectOptions::new().filter(WhereInput::column("col", RowValues::Null)),
            )
            .unwrap();
        assert!(!sql.contains("WHERE"), "{sql}");
        assert!(!sql.contains("= NULL"), "{sql}");
    }
}

#[test]
fn unknown_operators_are_rejected_unless_opted_in() {
    let input = WhereInput::column("age", ColumnFilter::op("greaterish", 5));

    let strict = QueryGenerator::new(Dialect::Postgres);
    assert!(matches!(
        strict.compile_where(&input, None),
        Err(SqlDispatchError::UnsupportedOperator(op)) if op.contains("greaterish")
    ));

    let lenient = QueryGenerator::new(Dialect::Postgres).with_options(GeneratorOptions {
        unknown_operators: UnknownOperatorPolicy::TreatAsEquality,
        ..GeneratorOptions::default()
    });
    let compiled = lenient.compile_where(&input, None).unwrap();
    assert_eq!(compiled.sql, "\"age\" = ?");
    assert_eq!(compiled.bindings, vec![RowValues::Int(5)]);
}

#[test]
fn json_shapes_compile_like_their_typed_forms() {
    let from_json = WhereInput::from_json(&json!({
        "status": "active",
        "$or": [{"a": 1}, {"b": {"gte": 2}}]
    }))
    .unwrap();
    let compiled = compile(&from_json, Dialect::Sqlite);
    assert_eq!(compiled.sql, "`status` = ? AND (`a` = ? OR `b` >= ?)");
    assert_eq!(
        compiled.bindings,
        vec![
            RowValues::Text("active".into()),
            RowValues::Int(1),
            RowValues::Int(2)
        ]
    );

    let pk_list = WhereInput::from_json(&json!([4, 5])).unwrap();
    assert_eq!(compile(&pk_list, Dialect::Mysql).sql, "`id` IN (?, ?)");

    let raw = WhereInput::from_json(&json!(["lower(name) = ?", "bob"])).unwrap();
    let compiled = compile(&raw, Dialect::Postgres);
    assert_eq!(compiled.inline(profile(Dialect::Postgres)).unwrap(), "lower(name) = 'bob'");
}

#[test]
fn bound_clauses_renumber_for_parameterized_drivers() {
    let input = WhereInput::columns([("a", 1), ("b", 2)]);
    let compiled = compile(&input, Dialect::Postgres);
    assert_eq!(
        compiled.numbered(PlaceholderStyle::Postgres),
        "\"a\" = $1 AND \"b\" = $2"
    );
    assert_eq!(
        compiled.numbered(PlaceholderStyle::Sqlite),
        "\"a\" = ?1 AND \"b\" = ?2"
    );
}

#[test]
fn malformed_or_is_a_spec_error() {
    assert!(matches!(
        WhereInput::from_json(&json!({"$or": {"a": 1}})),
        Err(SqlDispatchError::MalformedStatementSpec(_))
    ));
}

#[test]
fn or_groups_keep_their_parentheses_next_to_other_clauses() {
    let raw_or = WhereInput::All(vec![
        WhereInput::column("c", 3),
        WhereInput::Any(vec![WhereInput::raw(
            "a = ? OR b = ?",
            vec![RowValues::Int(1), RowValues::Int(2)],
        )]),
    ]);
    let out = compile(&raw_or, Dialect::Postgres);
    assert_eq!(out.sql, "\"c\" = ? AND (a = ? OR b = ?)");
    assert_eq!(
        out.bindings,
        vec![RowValues::Int(3), RowValues::Int(1), RowValues::Int(2)]
    );

    let nested = WhereInput::All(vec![
        WhereInput::column("c", 3),
        WhereInput::Any(vec![WhereInput::Any(vec![
            WhereInput::column("a", 1),
            WhereInput::column("b", 2),
        ])]),
    ]);
    assert_eq!(
        compile(&nested, Dialect::Postgres).sql,
        "\"c\" = ? AND (\"a\" = ? OR \"b\" = ?)"
    );
}

#[test]
fn single_branch_or_of_plain_columns_stays_flat() {
    let input = WhereInput::All(vec![
        WhereInput::column("c", 3),
        WhereInput::Any(vec![WhereInput::column("a", 1)]),
    ]);
    assert_eq!(compile(&input, Dialect::Sqlite).sql, "`c` = ? AND `a` = ?");
}
