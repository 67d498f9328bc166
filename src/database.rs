use std::fmt;

use tracing::debug;

use crate::{
    ColumnDef, Value,
    ast::{ColumnRef, ColumnsSelect, InsertInto, Join, Predicate, Select, Statement},
    catalog::Catalog,
    config::DatabaseConfig,
    error::{DbError, Result},
    parser::parse,
    schema::Schema,
    table::{Row, Table},
    tokenizer::fragment_of,
};

/// The main entry point of the engine.
/// It owns the [Catalog] and executes commands against it.
pub struct Database {
    catalog: Catalog,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

/// Represents the result of a successful `SELECT` query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Column labels, as written in the query. `SELECT *` over a join labels
    /// every column `table.column`.
    pub columns: Vec<String>,
    /// The rows, each one a vector of [Value] in `columns` order.
    pub rows: Vec<Row>,
}

/// What a command produced: rows for `SELECT`, a status line otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Rows(QueryResult),
    Status(String),
}

impl QueryOutput {
    pub fn rows(&self) -> Option<&QueryResult> {
        match self {
            Self::Rows(result) => Some(result),
            Self::Status(_) => None,
        }
    }

    pub fn status(&self) -> Option<&str> {
        match self {
            Self::Status(status) => Some(status),
            Self::Rows(_) => None,
        }
    }
}

impl fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "{status}"),
            Self::Rows(result) => {
                writeln!(f, "{}", result.columns.join(" | "))?;
                for row in &result.rows {
                    let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                    writeln!(f, "{}", cells.join(" | "))?;
                }
                write!(f, "({} row(s))", result.rows.len())
            }
        }
    }
}

/// Index statistics for one column, see [Database::show_indexes].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub column: String,
    pub distinct_keys: usize,
    pub entries: usize,
}

impl Database {
    /// Creates a new, empty database that never touches the file system.
    pub fn new() -> Self {
        Self {
            catalog: Catalog::in_memory(),
        }
    }

    /// Opens (or creates) the database stored in `config.data_dir`.
    pub fn open(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            catalog: Catalog::open(config)?,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Parses and runs one command.
    ///
    /// `SELECT` yields [QueryOutput::Rows]; every other command yields a
    /// short [QueryOutput::Status] such as `Updated 2 row(s)`.
    ///
    /// # Errors
    /// Any parse error, or the failure of the command itself. `CREATE TABLE`
    /// and `INSERT` change nothing when they fail. An `UPDATE` touching
    /// several rows commits them one by one, so rows before a failing one
    /// stay updated.
    ///
    /// # Example
    /// ```
    /// use minirdb::{Database, Value};
    /// use minirdb::database::QueryOutput;
    ///
    /// let mut db = Database::new();
    /// db.execute("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(3))").unwrap();
    /// db.execute("INSERT INTO users VALUES (1, 'Alice')").unwrap();
    ///
    /// let status = db.execute("UPDATE users SET name = 'Bo' WHERE id = 7").unwrap();
    /// assert_eq!(status, QueryOutput::Status("Updated 0 row(s)".into()));
    ///
    /// let result = db.query("SELECT name FROM users").unwrap();
    /// assert_eq!(result.rows, vec![vec![Value::from("Ali")]]);
    /// ```
    pub fn execute(&mut self, sql: &str) -> Result<QueryOutput> {
        let statement = parse(sql)?;
        debug!(kind = statement.kind(), table = statement.table(), "executing statement");

        let status = match statement {
            Statement::CreateTable(create) => {
                self.create_table(&create.name, Schema::new(create.columns))?;
                format!("Table '{}' created", create.name)
            }
            Statement::InsertInto(insert) => {
                let table = insert.table.clone();
                self.insert_into(insert)?;
                format!("Inserted into '{table}'")
            }
            Statement::Select(select) => return self.run_select(select).map(QueryOutput::Rows),
            Statement::Update(update) => {
                let count = self.update(
                    &update.table,
                    update.where_clause.as_ref(),
                    &update.assignments,
                )?;
                format!("Updated {count} row(s)")
            }
            Statement::Delete(delete) => {
                let count = self.delete(&delete.table, delete.where_clause.as_ref())?;
                format!("Deleted {count} row(s)")
            }
            Statement::DropTable(name) => {
                self.drop_table(&name)?;
                format!("Table '{name}' dropped")
            }
        };
        Ok(QueryOutput::Status(status))
    }

    /// Runs a `SELECT` and returns its rows.
    ///
    /// # Errors
    /// A syntax error when `sql` is any other command.
    pub fn query(&self, sql: &str) -> Result<QueryResult> {
        match parse(sql)? {
            Statement::Select(select) => {
                debug!(kind = "SELECT", table = %select.table, "executing query");
                self.run_select(select)
            }
            _ => Err(DbError::syntax(
                "expected a SELECT statement",
                fragment_of(&sql.trim_start().chars().collect::<Vec<_>>(), 0),
            )),
        }
    }

    // --- Engine API ---

    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<()> {
        self.catalog.create(name, schema)
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        self.catalog.drop(name)
    }

    /// Table names, sorted.
    pub fn list_tables(&self) -> Vec<&str> {
        self.catalog.list()
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.catalog.exists(name)
    }

    /// Metadata and contents of a table.
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.catalog.table(name)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.catalog.table(table)?.row_count())
    }

    /// Inserts one row given in column order.
    pub fn insert(&mut self, table: &str, values: Vec<Value>) -> Result<()> {
        self.catalog.mutate(table, |t| t.insert(values)).map(|_| ())
    }

    /// Inserts rows in order and persists once. Stops at the first failing
    /// row; the rows before it stay inserted.
    ///
    /// Returns how many rows were inserted.
    pub fn insert_many(
        &mut self,
        table: &str,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Result<usize> {
        self.catalog.mutate(table, |t| {
            let mut inserted = 0;
            for row in rows {
                t.insert(row)?;
                inserted += 1;
            }
            Ok(inserted)
        })
    }

    pub fn select_all(&self, table: &str) -> Result<Vec<Row>> {
        self.catalog.table(table)?.select(None)
    }

    /// Rows of `table` matching `predicate`, using an index when the column
    /// has one.
    pub fn select_where(&self, table: &str, predicate: &Predicate) -> Result<Vec<Row>> {
        self.catalog.table(table)?.select(Some(predicate))
    }

    /// Returns how many rows were updated. See [Table::update] for the
    /// row-by-row commit rule.
    pub fn update(
        &mut self,
        table: &str,
        predicate: Option<&Predicate>,
        assignments: &[(String, Value)],
    ) -> Result<usize> {
        self.catalog
            .mutate(table, |t| t.update(predicate, assignments))
    }

    /// Returns how many rows were deleted.
    pub fn delete(&mut self, table: &str, predicate: Option<&Predicate>) -> Result<usize> {
        self.catalog.mutate(table, |t| t.delete(predicate))
    }

    /// Removes every row, keeping the schema and the indexes.
    pub fn clear_table(&mut self, table: &str) -> Result<()> {
        self.catalog.mutate(table, |t| {
            t.clear();
            Ok(())
        })
    }

    pub fn create_index(&mut self, table: &str, column: &str) -> Result<()> {
        self.catalog.mutate(table, |t| t.create_index(column))
    }

    /// Statistics of every index of `table`, sorted by column name.
    pub fn show_indexes(&self, table: &str) -> Result<Vec<IndexInfo>> {
        let table = self.catalog.table(table)?;
        let mut infos: Vec<IndexInfo> = table
            .indexes()
            .iter()
            .map(|(column, index)| IndexInfo {
                column: column.clone(),
                distinct_keys: index.distinct_keys(),
                entries: index.len(),
            })
            .collect();
        infos.sort_by(|a, b| a.column.cmp(&b.column));
        Ok(infos)
    }

    // --- Executor ---

    /// Maps a named-column insert onto the schema order, filling the
    /// omitted columns with `NULL`.
    fn insert_into(&mut self, insert: InsertInto) -> Result<()> {
        let values = match insert.columns {
            None => insert.values,
            Some(columns) => {
                let table = self.catalog.table(&insert.table)?;
                if columns.len() != insert.values.len() {
                    return Err(DbError::ColumnCountMismatch {
                        table: insert.table,
                        expected: columns.len(),
                        found: insert.values.len(),
                        columns: columns.join(", "),
                    });
                }
                for (i, column) in columns.iter().enumerate() {
                    if table.schema().position(column).is_none() {
                        return Err(DbError::column_not_found(table.name(), column));
                    }
                    if columns[..i].contains(column) {
                        return Err(DbError::DuplicateColumn(column.clone()));
                    }
                }

                // Build the final row by following the schema's column order
                let mut provided: Vec<Option<Value>> = insert.values.into_iter().map(Some).collect();
                table
                    .columns()
                    .iter()
                    .map(|col| {
                        columns
                            .iter()
                            .position(|c| *c == col.name)
                            .and_then(|i| provided[i].take())
                            .unwrap_or(Value::Null)
                    })
                    .collect()
            }
        };
        self.insert(&insert.table, values)
    }

    fn run_select(&self, select: Select) -> Result<QueryResult> {
        let table = self.catalog.table(&select.table)?;
        if let Some(join) = &select.join {
            return self.run_join(table, join, &select);
        }

        // Resolve which columns need to be projected
        let (columns, positions) = match &select.columns {
            ColumnsSelect::Star => (
                table.column_names().to_vec(),
                (0..table.columns().len()).collect(),
            ),
            ColumnsSelect::ColumnsNames(refs) => {
                let positions = refs
                    .iter()
                    .map(|r| {
                        r.table
                            .as_ref()
                            .is_none_or(|t| t == table.name())
                            .then(|| table.schema().position(&r.column))
                            .flatten()
                            .ok_or_else(|| DbError::column_not_found(table.name(), &r.to_string()))
                    })
                    .collect::<Result<Vec<usize>>>()?;
                (refs.iter().map(ToString::to_string).collect(), positions)
            }
        };

        let rows = table
            .select(select.where_clause.as_ref())?
            .into_iter()
            .map(|row| project(&row, &positions))
            .collect();
        Ok(QueryResult { columns, rows })
    }

    /// Nested-loop equality join of `left` with `join.table`.
    ///
    /// Joined rows are the left columns followed by the right columns. Keys
    /// are compared in their canonical text form and `NULL` never matches.
    fn run_join(&self, left: &Table, join: &Join, select: &Select) -> Result<QueryResult> {
        let right = self.catalog.table(&join.table)?;
        let (left_col, right_col) = join_columns(left, right, join)?;

        let layout = Layout::new(left, right);
        let mut rows: Vec<Row> = Vec::new();
        for left_row in left.rows() {
            let Some(key) = left_row[left_col].key() else {
                continue;
            };
            for right_row in right.rows() {
                if right_row[right_col].key().as_ref() == Some(&key) {
                    rows.push(left_row.iter().chain(right_row).cloned().collect());
                }
            }
        }
        debug!(
            left = left.name(),
            right = right.name(),
            matches = rows.len(),
            "nested-loop join"
        );

        if let Some(predicate) = &select.where_clause {
            let position = layout.resolve(&predicate.column)?;
            let literal = layout.slots[position]
                .column
                .data_type
                .normalize_literal(&predicate.value)
                .and_then(|v| v.key());
            match literal {
                Some(key) => rows.retain(|row| row[position].key().as_ref() == Some(&key)),
                None => rows.clear(),
            }
        }

        let (columns, positions) = match &select.columns {
            ColumnsSelect::Star => (
                layout
                    .slots
                    .iter()
                    .map(|slot| format!("{}.{}", slot.table, slot.column.name))
                    .collect(),
                (0..layout.slots.len()).collect(),
            ),
            ColumnsSelect::ColumnsNames(refs) => (
                refs.iter().map(ToString::to_string).collect(),
                refs.iter()
                    .map(|r| layout.resolve(r))
                    .collect::<Result<Vec<usize>>>()?,
            ),
        };

        let rows = rows.iter().map(|row| project(row, &positions)).collect();
        Ok(QueryResult { columns, rows })
    }
}

fn project(row: &Row, positions: &[usize]) -> Row {
    positions.iter().map(|&i| row[i].clone()).collect()
}

/// Positions of the join columns in the left and right tables. The ON
/// condition may name the two tables in either order.
fn join_columns(left: &Table, right: &Table, join: &Join) -> Result<(usize, usize)> {
    let names = |r: &ColumnRef| r.table.as_deref() == Some(left.name());
    let (left_ref, right_ref) =
        if names(&join.left) && join.right.table.as_deref() == Some(right.name()) {
            (&join.left, &join.right)
        } else if names(&join.right) && join.left.table.as_deref() == Some(right.name()) {
            (&join.right, &join.left)
        } else {
            return Err(DbError::MalformedJoinCondition(format!(
                "'{} = {}' must compare a column of '{}' with a column of '{}'",
                join.left,
                join.right,
                left.name(),
                right.name()
            )));
        };

    let left_col = left
        .schema()
        .position(&left_ref.column)
        .ok_or_else(|| DbError::column_not_found(left.name(), &left_ref.column))?;
    let right_col = right
        .schema()
        .position(&right_ref.column)
        .ok_or_else(|| DbError::column_not_found(right.name(), &right_ref.column))?;
    Ok((left_col, right_col))
}

/// One column of a joined row.
struct Slot<'a> {
    table: &'a str,
    column: &'a ColumnDef,
}

/// Column layout of a joined row: the left table's columns, then the right
/// table's.
struct Layout<'a> {
    slots: Vec<Slot<'a>>,
    label: String,
}

impl<'a> Layout<'a> {
    fn new(left: &'a Table, right: &'a Table) -> Self {
        let slots = [left, right]
            .into_iter()
            .flat_map(|table| {
                table.columns().iter().map(move |column| Slot {
                    table: table.name(),
                    column,
                })
            })
            .collect();
        Self {
            slots,
            label: format!("{} JOIN {}", left.name(), right.name()),
        }
    }

    /// Position of a qualified or bare column. A bare name shared by both
    /// tables resolves to the left one.
    fn resolve(&self, r: &ColumnRef) -> Result<usize> {
        self.slots
            .iter()
            .position(|slot| {
                slot.column.name == r.column
                    && r.table.as_deref().is_none_or(|t| t == slot.table)
            })
            .ok_or_else(|| DbError::ColumnNotFound {
                table: r.table.clone().unwrap_or_else(|| self.label.clone()),
                column: r.column.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::schema::Constraint;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn status(db: &mut Database, sql: &str) -> String {
        match db.execute(sql) {
            Ok(QueryOutput::Status(status)) => status,
            other => panic!("Expected a status for {sql:?}, got {other:?}"),
        }
    }

    fn rows(db: &Database, sql: &str) -> Vec<Row> {
        db.query(sql).unwrap().rows
    }

    fn users_db() -> Database {
        let mut db = Database::new();
        db.execute("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(50) NOT NULL, age INT)")
            .unwrap();
        db.execute("INSERT INTO users VALUES (1, 'Alice', 25)").unwrap();
        db.execute("INSERT INTO users VALUES (2, 'Bob', 30)").unwrap();
        db.execute("INSERT INTO users VALUES (3, 'Charlie', NULL)").unwrap();
        db
    }

    #[test]
    fn test_status_messages() {
        let mut db = Database::new();
        assert_eq!(
            status(&mut db, "CREATE TABLE t (id INT, name TEXT)"),
            "Table 't' created"
        );
        assert_eq!(
            status(&mut db, "INSERT INTO t VALUES (1, 'a')"),
            "Inserted into 't'"
        );
        assert_eq!(
            status(&mut db, "UPDATE t SET name = 'b' WHERE id = 1"),
            "Updated 1 row(s)"
        );
        assert_eq!(status(&mut db, "DELETE FROM t"), "Deleted 1 row(s)");
        assert_eq!(status(&mut db, "DROP TABLE t"), "Table 't' dropped");
        assert!(db.list_tables().is_empty());
    }

    #[test]
    fn test_varchar_truncated_on_insert() {
        let mut db = Database::new();
        db.execute("CREATE TABLE t (id INT PRIMARY KEY, name VARCHAR(3))")
            .unwrap();
        db.execute("INSERT INTO t VALUES (1,'Alice')").unwrap();
        assert_eq!(
            rows(&db, "SELECT * FROM t"),
            vec![vec![Value::Int(1), Value::from("Ali")]]
        );
        // the full literal does not match the truncated value
        assert!(rows(&db, "SELECT * FROM t WHERE name = 'Alice'").is_empty());
        assert_eq!(rows(&db, "SELECT id FROM t WHERE name = 'Ali'"), vec![vec![Value::Int(1)]]);
    }

    #[test]
    fn test_select_projection_and_where() {
        let db = users_db();
        let result = db.query("SELECT name, age FROM users WHERE id = 2").unwrap();
        assert_eq!(result.columns, vec!["name", "age"]);
        assert_eq!(result.rows, vec![vec![Value::from("Bob"), Value::Int(30)]]);

        // literal normalised to the column type
        assert_eq!(rows(&db, "SELECT name FROM users WHERE id = '3'").len(), 1);
        // null never matches
        assert!(rows(&db, "SELECT * FROM users WHERE age = NULL").is_empty());
        // a literal that cannot be an INT matches nothing
        assert!(rows(&db, "SELECT * FROM users WHERE age = 'old'").is_empty());
    }

    #[test]
    fn test_unknown_projection_column_aborts() {
        let db = users_db();
        let err = db.query("SELECT name, email FROM users").unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound { ref column, .. } if column == "email"));
        let err = db.query("SELECT other.name FROM users").unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_where_on_unknown_column() {
        let db = users_db();
        let err = db.query("SELECT * FROM users WHERE email = 'x'").unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_update_without_match_is_success() {
        let mut db = users_db();
        db.execute("DELETE FROM users WHERE name = 'Alice'").unwrap();
        assert_eq!(
            status(&mut db, "UPDATE users SET age=26 WHERE name='Alice'"),
            "Updated 0 row(s)"
        );
    }

    #[test]
    fn test_update_changes_rows_and_index() {
        let mut db = users_db();
        assert_eq!(status(&mut db, "UPDATE users SET id = 10 WHERE name = 'Bob'"), "Updated 1 row(s)");
        assert!(rows(&db, "SELECT * FROM users WHERE id = 2").is_empty());
        assert_eq!(rows(&db, "SELECT name FROM users WHERE id = 10"), vec![vec![Value::from("Bob")]]);

        let err = db.execute("UPDATE users SET id = 1 WHERE id = 10").unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { .. }));
        let err = db.execute("UPDATE users SET name = NULL").unwrap_err();
        assert!(matches!(err, DbError::NullConstraintViolation(_)));
        let err = db.execute("UPDATE users SET email = 'x'").unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_delete_all_empties_indexes() {
        let mut db = users_db();
        db.create_index("users", "name").unwrap();
        assert_eq!(status(&mut db, "DELETE FROM users"), "Deleted 3 row(s)");
        assert_eq!(db.row_count("users").unwrap(), 0);
        let table = db.table("users").unwrap();
        assert!(table.indexes().values().all(|index| index.is_empty()));
        assert_eq!(table.indexed_columns().len(), 2);
    }

    #[test]
    fn test_delete_where_keeps_indexes_consistent() {
        let mut db = users_db();
        assert_eq!(status(&mut db, "DELETE FROM users WHERE id = 1"), "Deleted 1 row(s)");
        assert_eq!(rows(&db, "SELECT name FROM users WHERE id = 3"), vec![vec![Value::from("Charlie")]]);
        assert_eq!(db.table("users").unwrap().index("id").unwrap().lookup(&Value::Int(3)), &[1]);
    }

    #[test]
    fn test_failed_inserts_leave_table_unchanged() {
        let mut db = users_db();
        let err = db.execute("INSERT INTO users VALUES (1, 'Dup', 40)").unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { ref column, .. } if column == "id"));
        let err = db.execute("INSERT INTO users VALUES (4, 'Dan')").unwrap_err();
        assert!(matches!(
            err,
            DbError::ColumnCountMismatch { expected: 3, found: 2, .. }
        ));
        let err = db.execute("INSERT INTO users VALUES ('x', 'Dan', 1)").unwrap_err();
        assert!(matches!(err, DbError::TypeConversion { .. }));
        let err = db.execute("INSERT INTO users VALUES (4, NULL, 1)").unwrap_err();
        assert!(matches!(err, DbError::NullConstraintViolation(_)));

        assert_eq!(db.row_count("users").unwrap(), 3);
        assert_eq!(rows(&db, "SELECT name FROM users WHERE id = 1"), vec![vec![Value::from("Alice")]]);
    }

    #[test]
    fn test_insert_with_column_list() {
        let mut db = users_db();
        db.execute("INSERT INTO users (name, id) VALUES ('Dan', 4)").unwrap();
        assert_eq!(
            rows(&db, "SELECT * FROM users WHERE id = 4"),
            vec![vec![Value::Int(4), Value::from("Dan"), Value::Null]]
        );

        let err = db.execute("INSERT INTO users (id, age) VALUES (5, 1)").unwrap_err();
        assert!(matches!(err, DbError::NullConstraintViolation(ref c) if c == "name"));
        let err = db.execute("INSERT INTO users (id, email) VALUES (5, 'x')").unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound { .. }));
        let err = db.execute("INSERT INTO users (id, name) VALUES (5)").unwrap_err();
        assert!(matches!(err, DbError::ColumnCountMismatch { .. }));
        let err = db.execute("INSERT INTO users (id, id, name) VALUES (5, 6, 'x')").unwrap_err();
        assert!(matches!(err, DbError::DuplicateColumn(_)));
        assert_eq!(db.row_count("users").unwrap(), 4);
    }

    #[test]
    fn test_typed_values() {
        let mut db = Database::new();
        db.execute(
            "CREATE TABLE products (id INT PRIMARY KEY, price DECIMAL(10,2), in_stock BOOLEAN, rating FLOAT)",
        )
        .unwrap();
        db.execute("INSERT INTO products VALUES (1, 19.999, yes, 4)").unwrap();
        let row = &rows(&db, "SELECT * FROM products")[0];
        assert_eq!(row[1], Value::Decimal(Decimal::from_str("20.00").unwrap()));
        assert_eq!(row[1].to_string(), "20.00");
        assert_eq!(row[2], Value::Bool(true));
        assert_eq!(row[3], Value::Float(4.0));

        assert_eq!(rows(&db, "SELECT id FROM products WHERE price = 20").len(), 1);
        assert_eq!(rows(&db, "SELECT id FROM products WHERE in_stock = 'true'").len(), 1);
    }

    #[test]
    fn test_unquoted_date_and_text_values() {
        let mut db = Database::new();
        db.execute("CREATE TABLE ev (id INT PRIMARY KEY, day DATE, contact TEXT, score INT)")
            .unwrap();
        db.execute("INSERT INTO ev VALUES (1, 2024-01-15, alice@x.org, 7)").unwrap();
        assert_eq!(
            rows(&db, "SELECT day, contact FROM ev WHERE id = 1"),
            vec![vec![Value::from("2024-01-15"), Value::from("alice@x.org")]]
        );

        db.execute("UPDATE ev SET day = 2024-02-01 WHERE id = 1").unwrap();
        assert_eq!(
            rows(&db, "SELECT id FROM ev WHERE day = '2024-02-01'"),
            vec![vec![Value::Int(1)]]
        );

        // raw text reaches the type check instead of failing to parse
        let err = db.execute("UPDATE ev SET score = score+1").unwrap_err();
        assert!(matches!(err, DbError::TypeConversion { ref column, .. } if column == "score"));
    }

    #[test]
    fn test_keyword_column_names() {
        let mut db = Database::new();
        db.execute("CREATE TABLE kv (key TEXT PRIMARY KEY, value TEXT)").unwrap();
        db.execute("INSERT INTO kv (key, value) VALUES ('a', 'b')").unwrap();
        db.execute("UPDATE kv SET value = 'c' WHERE key = 'a'").unwrap();
        assert_eq!(
            rows(&db, "SELECT value FROM kv WHERE key = 'a'"),
            vec![vec![Value::from("c")]]
        );
    }

    #[test]
    fn test_insert_failing_to_persist_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("db");
        let mut db = Database::open(&DatabaseConfig::with_data_dir(&data_dir)).unwrap();
        db.execute("CREATE TABLE t (id INT PRIMARY KEY)").unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();
        let err = db.execute("INSERT INTO t VALUES (1)").unwrap_err();
        assert!(matches!(err, DbError::Io(_)));
        assert_eq!(db.row_count("t").unwrap(), 0);

        std::fs::create_dir_all(&data_dir).unwrap();
        assert_eq!(status(&mut db, "INSERT INTO t VALUES (1)"), "Inserted into 't'");
        assert_eq!(db.row_count("t").unwrap(), 1);
    }

    #[test]
    fn test_legacy_create_is_text() {
        let mut db = Database::new();
        db.execute("CREATE TABLE employees (id, name, department)").unwrap();
        db.execute("INSERT INTO employees VALUES (1, 'Ann', 'Ops')").unwrap();
        let table = db.table("employees").unwrap();
        assert!(table.columns().iter().all(|c| c.data_type == DataType::Text));
        assert_eq!(
            rows(&db, "SELECT name FROM employees WHERE id = 1"),
            vec![vec![Value::from("Ann")]]
        );
    }

    #[test]
    fn test_join_scenario() {
        let mut db = Database::new();
        db.execute("CREATE TABLE a (id INT)").unwrap();
        db.execute("CREATE TABLE b (aid INT)").unwrap();
        db.execute("INSERT INTO a VALUES (1)").unwrap();
        db.execute("INSERT INTO b VALUES (1)").unwrap();

        let result = db.query("SELECT * FROM a INNER JOIN b ON a.id = b.aid").unwrap();
        assert_eq!(result.columns, vec!["a.id", "b.aid"]);
        assert_eq!(result.rows, vec![vec![Value::Int(1), Value::Int(1)]]);

        // condition written the other way round
        assert_eq!(rows(&db, "SELECT * FROM a JOIN b ON b.aid = a.id").len(), 1);
    }

    fn shop_db() -> Database {
        let mut db = Database::new();
        db.execute("CREATE TABLE customers (id INT PRIMARY KEY, name TEXT)").unwrap();
        db.execute("CREATE TABLE orders (id INT PRIMARY KEY, customer_id INT, amount DECIMAL(8,2))")
            .unwrap();
        for sql in [
            "INSERT INTO customers VALUES (1, 'Alice')",
            "INSERT INTO customers VALUES (2, 'Bob')",
            "INSERT INTO customers VALUES (3, 'Carol')",
            "INSERT INTO orders VALUES (10, 1, 5)",
            "INSERT INTO orders VALUES (11, 1, 7.5)",
            "INSERT INTO orders VALUES (12, 2, 3)",
            "INSERT INTO orders VALUES (13, NULL, 9)",
        ] {
            db.execute(sql).unwrap();
        }
        db
    }

    #[test]
    fn test_join_with_where_and_projection() {
        let db = shop_db();
        let result = db
            .query(
                "SELECT customers.name, orders.amount FROM customers \
                 INNER JOIN orders ON customers.id = orders.customer_id \
                 WHERE orders.customer_id = 1",
            )
            .unwrap();
        assert_eq!(result.columns, vec!["customers.name", "orders.amount"]);
        assert_eq!(
            result.rows,
            vec![
                vec![Value::from("Alice"), Value::Decimal(Decimal::from_str("5.00").unwrap())],
                vec![Value::from("Alice"), Value::Decimal(Decimal::from_str("7.50").unwrap())],
            ]
        );

        // unmatched customers and null keys are left out
        let all = rows(&db, "SELECT name FROM customers JOIN orders ON customers.id = orders.customer_id");
        assert_eq!(all.len(), 3);

        let by_amount = rows(
            &db,
            "SELECT name FROM customers JOIN orders ON customers.id = orders.customer_id WHERE amount = 3",
        );
        assert_eq!(by_amount, vec![vec![Value::from("Bob")]]);
    }

    #[test]
    fn test_join_bare_name_prefers_left_table() {
        let db = shop_db();
        let result = db
            .query("SELECT id, orders.id FROM customers JOIN orders ON customers.id = orders.customer_id WHERE name = 'Bob'")
            .unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(2), Value::Int(12)]]);
    }

    #[test]
    fn test_join_errors() {
        let db = shop_db();
        let err = db
            .query("SELECT * FROM customers JOIN ghosts ON customers.id = ghosts.cid")
            .unwrap_err();
        assert!(matches!(err, DbError::TableNotFound(ref t) if t == "ghosts"));

        let err = db
            .query("SELECT * FROM customers JOIN orders ON customers.id = other.customer_id")
            .unwrap_err();
        assert!(matches!(err, DbError::MalformedJoinCondition(_)));

        let err = db
            .query("SELECT * FROM customers JOIN orders ON customers.id = orders.client")
            .unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound { ref column, .. } if column == "client"));

        let err = db
            .query("SELECT email FROM customers JOIN orders ON customers.id = orders.customer_id")
            .unwrap_err();
        assert!(matches!(err, DbError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_query_rejects_other_commands() {
        let db = users_db();
        let err = db.query("DELETE FROM users").unwrap_err();
        assert!(matches!(err, DbError::Syntax { ref fragment, .. } if fragment == "DELETE FROM users"));
        assert_eq!(db.row_count("users").unwrap(), 3);
    }

    #[test]
    fn test_table_errors() {
        let mut db = users_db();
        assert!(matches!(
            db.execute("CREATE TABLE users (id INT)"),
            Err(DbError::TableAlreadyExists(_))
        ));
        assert!(matches!(db.execute("DROP TABLE ghosts"), Err(DbError::TableNotFound(_))));
        assert!(matches!(db.query("SELECT * FROM ghosts"), Err(DbError::TableNotFound(_))));
        assert!(matches!(
            db.execute("INSERT INTO ghosts VALUES (1)"),
            Err(DbError::TableNotFound(_))
        ));
    }

    #[test]
    fn test_engine_api() {
        let mut db = Database::new();
        db.create_table(
            "users",
            Schema::new(vec![
                ColumnDef::new("id", DataType::Int).with_constraint(Constraint::PrimaryKey),
                ColumnDef::new("email", DataType::Text).with_constraint(Constraint::Unique),
                ColumnDef::new("city", DataType::Text),
            ]),
        )
        .unwrap();
        let inserted = db
            .insert_many(
                "users",
                (1..=4).map(|i| {
                    vec![
                        Value::Int(i),
                        Value::from(format!("u{i}@x.org").as_str()),
                        Value::from(if i % 2 == 0 { "Paris" } else { "Lyon" }),
                    ]
                }),
            )
            .unwrap();
        assert_eq!(inserted, 4);
        assert!(db.table_exists("users"));

        let lyon: Predicate = "city = 'Lyon'".parse().unwrap();
        assert_eq!(db.select_where("users", &lyon).unwrap().len(), 2);

        db.create_index("users", "city").unwrap();
        assert_eq!(
            db.show_indexes("users").unwrap(),
            vec![
                IndexInfo { column: "city".into(), distinct_keys: 2, entries: 4 },
                IndexInfo { column: "email".into(), distinct_keys: 4, entries: 4 },
                IndexInfo { column: "id".into(), distinct_keys: 4, entries: 4 },
            ]
        );

        assert_eq!(
            db.update("users", Some(&lyon), &[("city".into(), Value::from("Nice"))]).unwrap(),
            2
        );
        assert_eq!(db.delete("users", Some(&Predicate::eq("city", "Nice"))).unwrap(), 2);
        assert_eq!(db.select_all("users").unwrap().len(), 2);

        db.clear_table("users").unwrap();
        assert_eq!(db.row_count("users").unwrap(), 0);
        assert_eq!(db.show_indexes("users").unwrap().len(), 3);

        db.drop_table("users").unwrap();
        assert!(!db.table_exists("users"));
    }

    #[test]
    fn test_insert_many_stops_at_first_failure() {
        let mut db = users_db();
        let err = db
            .insert_many(
                "users",
                vec![
                    vec![Value::Int(4), Value::from("Dan"), Value::Null],
                    vec![Value::Int(1), Value::from("Dup"), Value::Null],
                    vec![Value::Int(5), Value::from("Eve"), Value::Null],
                ],
            )
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueConstraintViolation { .. }));
        assert_eq!(db.row_count("users").unwrap(), 4);
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig::with_data_dir(dir.path());
        {
            let mut db = Database::open(&config).unwrap();
            db.execute("CREATE TABLE users (id INT PRIMARY KEY, name VARCHAR(10))").unwrap();
            db.execute("INSERT INTO users VALUES (1, 'Alice')").unwrap();
            db.execute("INSERT INTO users VALUES (2, 'Bob')").unwrap();
            db.execute("UPDATE users SET name = 'Robert' WHERE id = 2").unwrap();
            db.execute("CREATE TABLE scratch (x INT)").unwrap();
            db.execute("DROP TABLE scratch").unwrap();
        }

        let db = Database::open(&config).unwrap();
        assert_eq!(db.list_tables(), vec!["users"]);
        assert_eq!(
            rows(&db, "SELECT name FROM users WHERE id = 2"),
            vec![vec![Value::from("Robert")]]
        );
        assert!(dir.path().join("users.json").is_file());
        assert!(!dir.path().join("scratch.json").exists());
    }

    #[test]
    fn test_display_output() {
        let mut db = users_db();
        let output = db.execute("SELECT id, name FROM users WHERE id = 1").unwrap();
        assert_eq!(output.to_string(), "id | name\n1 | Alice\n(1 row(s))");
        assert!(output.status().is_none());
        assert_eq!(output.rows().unwrap().rows.len(), 1);
    }
}
