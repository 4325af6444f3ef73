//! Criterion benchmarks for the where compiler and the dispatch path. The
//! dispatch group uses an in-process driver so only admission, logging and
//! result shaping are measured.

use std::hint::black_box;
use std::sync::LazyLock;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use sql_dispatch::prelude::*;
use tokio::runtime::Runtime;

static TOKIO_RUNTIME: LazyLock<Runtime> =
    LazyLock::new(|| Runtime::new().expect("create tokio runtime"));

struct EchoDriver;

#[async_trait]
impl Driver for EchoDriver {
    type Connection = ();

    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn connect(&self, _endpoint: &Endpoint) -> Result<(), SqlDispatchError> {
        Ok(())
    }

    async fn execute(&self, _conn: &mut (), sql: &str) -> Result<DriverOutput, SqlDispatchError> {
        Ok(DriverOutput::rows(
            vec!["sql".into()],
            vec![vec![RowValues::Text(sql.to_string())]],
        ))
    }
}

fn nested_filter() -> WhereInput {
    WhereInput::from_json(&json!({
        "status": "active",
        "age": { "$gte": 18, "$lt": 65 },
        "role": { "$in": ["admin", "owner", "member"] },
        "$or": [
            { "email": { "$like": "%@example.com" } },
            { "verified": true }
        ]
    }))
    .expect("valid filter")
}

fn bench_compile(c: &mut Criterion) {
    let filter = nested_filter();
    let mut group = c.benchmark_group("where_compile");
    for dialect in [Dialect::Postgres, Dialect::Mysql, Dialect::Sqlite] {
        let generator = QueryGenerator::new(dialect);
        group.bench_with_input(BenchmarkId::from_parameter(dialect), &filter, |b, filter| {
            b.iter(|| generator.compile_where(black_box(filter), None));
        });
    }
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let generator = QueryGenerator::new(Dialect::Postgres);
    let options = SelectOptions::new()
        .filter(nested_filter())
        .order_by("id", SortDirection::Desc)
        .limit(25);
    c.bench_function("select_query", |b| {
        b.iter(|| generator.select_query(black_box("users"), &options));
    });
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    for batch in [1_usize, 16, 64] {
        let config = ConnectionConfig::builder(Dialect::Postgres)
            .host("bench")
            .max_concurrent_queries(8)
            .max_connections(4)
            .build()
            .expect("valid config");
        let manager = QueryManager::new(EchoDriver, config).expect("manager");
        let options = QueryOptions::new().logging(Logging::Disabled);

        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.to_async(&*TOKIO_RUNTIME).iter(|| {
                let manager = manager.clone();
                let options = options.clone();
                async move {
                    let futures: Vec<_> = (0..batch)
                        .map(|_| manager.dispatch("SELECT 1", options.clone(), None))
                        .collect();
                    for future in futures {
                        black_box(future.await.expect("echo query"));
                    }
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_select, bench_dispatch);
criterion_main!(benches);
