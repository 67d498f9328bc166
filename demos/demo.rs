use minirdb::database::QueryOutput;
use minirdb::{Database, DatabaseConfig, Predicate, Result};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("Mini Relational Database Demo\n");

    // Tables live in a scratch directory for the length of the demo
    let dir = tempfile::tempdir()?;
    let config = DatabaseConfig::with_data_dir(dir.path());
    let mut db = Database::open(&config)?;

    for sql in [
        "CREATE TABLE customers (id INT PRIMARY KEY, name VARCHAR(20) NOT NULL, \
         email TEXT UNIQUE, vip BOOLEAN)",
        "CREATE TABLE orders (id INT PRIMARY KEY, customer_id INT, amount DECIMAL(8,2), \
         weight FLOAT, placed DATE)",
        "INSERT INTO customers VALUES (1, 'Alice', alice@example.org, yes)",
        "INSERT INTO customers VALUES (2, 'Bob', 'bob@example.org', FALSE)",
        "INSERT INTO customers (name, id) VALUES ('Charlie', 3)",
        "INSERT INTO orders VALUES (10, 1, 19.99, 1.5, 2024-01-15)",
        "INSERT INTO orders VALUES (11, 1, 5, 0.25, '2024-02-01')",
        "INSERT INTO orders VALUES (12, 2, 42.5, 3, 2024-02-03)",
        "INSERT INTO orders VALUES (13, 3, 7.125, 0.5, 2024-03-10)",
        "SELECT * FROM customers",
        "SELECT name, email FROM customers WHERE id = 2",
        "SELECT customers.name, orders.amount FROM customers \
         INNER JOIN orders ON customers.id = orders.customer_id",
        "UPDATE customers SET email = 'charlie@example.org' WHERE name = 'Charlie'",
        "UPDATE customers SET name = 'Nobody' WHERE id = 99",
        // Failing commands
        "INSERT INTO customers VALUES (1, 'Duplicate', 'dup@example.org', FALSE)",
        "INSERT INTO customers VALUES (4, 'Dan')",
        "SELECT * FROM customers WHERE id > 1",
        "DELETE FROM orders WHERE id = 11",
        "SELECT * FROM orders",
    ] {
        println!("> {sql}");
        match db.execute(sql) {
            Ok(QueryOutput::Status(status)) => println!("{status}\n"),
            Ok(output) => println!("{output}\n"),
            Err(e) => println!("error: {e}\n"),
        }
    }

    drop(db);

    // Reopen to show the tables were persisted
    let db = Database::open(&config)?;
    println!("Tables after reopening {}:", config.data_dir.display());
    for table_name in db.list_tables() {
        println!("  - {} ({} rows)", table_name, db.row_count(table_name)?);
    }
    for info in db.show_indexes("customers")? {
        println!(
            "  index customers.{}: {} keys, {} entries",
            info.column, info.distinct_keys, info.entries
        );
    }


    println!("\nOrders per customer:");
    for customer in db.select_all("customers")? {
        let Some(id) = customer[0].as_int() else {
            continue;
        };
        let name = customer[1].as_str().unwrap_or("?");
        let vip = customer[3].as_bool().unwrap_or(false);
        let orders = db.select_where("orders", &Predicate::eq("customer_id", id))?;
        let total: Decimal = orders.iter().filter_map(|o| o[2].as_decimal()).sum();
        let weight: f64 = orders.iter().filter_map(|o| o[3].as_float()).sum();
        println!(
            "  {name}{}: {} order(s), total {total}, weight {weight}",
            if vip { " (vip)" } else { "" },
            orders.len()
        );
    }

    Ok(())
}
