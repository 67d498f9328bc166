use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use minirdb::{Database, Value};
use std::hint::black_box;

fn setup_populated_db(n: usize) -> Database {
    let mut db = Database::new();

    db.execute("CREATE TABLE users (id INT PRIMARY KEY, name TEXT, age INT, active BOOLEAN)")
        .unwrap();

    let rows = (0..n).map(|i| {
        vec![
            Value::Int(i as i64),
            Value::from(format!("user{i}").as_str()),
            Value::Int((i % 100) as i64),
            Value::Bool(i % 2 == 0),
        ]
    });
    db.insert_many("users", rows).unwrap();
    db
}

fn bench_insert_sql(c: &mut Criterion) {
    let mut group = c.benchmark_group("Insert_SQL_Pipeline");
    group.bench_function("insert_single_row_sql", |b| {
        // fresh table each time: every insert persists the whole table
        b.iter_with_setup(
            || {
                let mut db = Database::new();
                db.execute("CREATE TABLE tests (id INT)").unwrap();
                db
            },
            |mut db| {
                db.execute(black_box("INSERT INTO tests VALUES (42)"))
                    .unwrap();
                black_box(db);
            },
        );
    });
    group.finish();
}

fn bench_select_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("Select_Where_Performance");

    for n in [1000, 10000].iter() {
        let db = setup_populated_db(*n);
        group.bench_with_input(BenchmarkId::new("scan", n), n, |b, _| {
            b.iter(|| {
                let res = db.query("SELECT * FROM users WHERE age = 42").unwrap();
                black_box(res);
            });
        });
        group.bench_with_input(BenchmarkId::new("index", n), n, |b, _| {
            b.iter(|| {
                let res = db.query("SELECT * FROM users WHERE id = 42").unwrap();
                black_box(res);
            });
        });
    }
    group.finish();
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("Join_Performance");

    for n in [100, 1000].iter() {
        let mut db = setup_populated_db(*n);
        db.execute("CREATE TABLE ages (age INT PRIMARY KEY, label TEXT)")
            .unwrap();
        db.insert_many(
            "ages",
            (0..100).map(|a| vec![Value::Int(a), Value::from(format!("age{a}").as_str())]),
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, _| {
            b.iter(|| {
                let res = db
                    .query("SELECT name, label FROM users JOIN ages ON users.age = ages.age")
                    .unwrap();
                black_box(res);
            });
        });
    }
    group.finish();
}

fn bench_update_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("Update_Performance");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter_with_setup(
                || setup_populated_db(n),
                |mut db| {
                    db.execute("UPDATE users SET age = 99 WHERE active = TRUE")
                        .unwrap();
                    black_box(db);
                },
            );
        });
    }
    group.finish();
}

fn bench_delete_performance(c: &mut Criterion) {
    let mut group = c.benchmark_group("Delete_Performance");

    for n in [1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(n), n, |b, &n| {
            b.iter_with_setup(
                || setup_populated_db(n),
                |mut db| {
                    db.execute("DELETE FROM users WHERE age = 90").unwrap();
                    black_box(db);
                },
            );
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_insert_sql,
    bench_select_scaling,
    bench_join,
    bench_update_performance,
    bench_delete_performance
);
criterion_main!(benches);
