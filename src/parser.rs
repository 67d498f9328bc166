use crate::ast::*;
use crate::data_type::DataType;
use crate::error::{DbError, Result};
use crate::schema::{ColumnDef, Constraint};
use crate::tokenizer::{Lexeme, Token, Tokenizer, fragment_of};
use crate::value::Value;

/// Parses one command into its descriptor.
///
/// # Example
/// ```
/// use minirdb::parser::parse;
/// use minirdb::ast::Statement;
///
/// let statement = parse("DROP TABLE users;").unwrap();
/// assert_eq!(statement, Statement::DropTable("users".into()));
/// ```
pub fn parse(sql: &str) -> Result<Statement> {
    let tokens = Tokenizer::new(sql).tokenize()?;
    Parser::new(sql, tokens).parse()
}

/// Parses the text of a WHERE clause on its own (`id = 2`, `t.name='x'`).
pub fn parse_predicate(text: &str) -> Result<Predicate> {
    let tokens = Tokenizer::new(text).tokenize()?;
    let mut parser = Parser::new(text, tokens);
    let predicate = parser.parse_predicate()?;
    parser.expect_end()?;
    Ok(predicate)
}

/// Recursive descent parser over the lexemes of one command.
pub struct Parser {
    source: Vec<char>,
    tokens: Vec<Lexeme>,
    position: usize,
}

impl Parser {
    /// `tokens` must come from tokenizing `source` and end with [Token::Eof].
    pub fn new(source: &str, tokens: Vec<Lexeme>) -> Self {
        Self {
            source: source.chars().collect(),
            tokens,
            position: 0,
        }
    }

    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.current_token() {
            Token::Create => self.parse_create_table(),
            Token::Insert => self.parse_insert(),
            Token::Select => self.parse_select(),
            Token::Update => self.parse_update(),
            Token::Delete => self.parse_delete(),
            Token::Drop => self.parse_drop_table(),
            Token::Eof => Err(self.error("empty command")),
            _ => Err(self.error("command not supported")),
        }?;
        self.expect_end()?;
        Ok(statement)
    }

    //helpers
    fn current_token(&self) -> &Token {
        &self.tokens[self.position].token
    }

    fn current_offset(&self) -> usize {
        self.tokens[self.position].offset
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current_token(), Token::Eof)
    }

    fn fragment(&self, offset: usize) -> String {
        fragment_of(&self.source, offset)
    }

    /// Syntax error quoting the input from the current token on.
    fn error(&self, message: impl Into<String>) -> DbError {
        DbError::syntax(message, self.fragment(self.current_offset()))
    }

    /// Consumes the optional trailing semicolon and checks nothing follows.
    fn expect_end(&mut self) -> Result<()> {
        // trailing semicolon is optional
        if matches!(self.current_token(), Token::Semicolon) {
            self.advance();
        }
        if !self.is_at_end() {
            return Err(self.error("unexpected input after statement"));
        }
        Ok(())
    }

    fn consume(&mut self, expected: Token, what: &str) -> Result<()> {
        if *self.current_token() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn consume_ident(&mut self, what: &str) -> Result<String> {
        match self.current_token() {
            Token::Ident(string) => {
                let string = string.clone(); // Get the name
                self.advance();
                Ok(string)
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    /// A table or column name. Soft keywords are accepted too, spelled as
    /// written in the source.
    fn consume_name(&mut self, what: &str) -> Result<String> {
        if !self.current_token().is_soft_keyword() {
            return self.consume_ident(what);
        }
        let name = self.source[self.current_offset()..]
            .iter()
            .take_while(|c| c.is_alphanumeric() || **c == '_')
            .collect();
        self.advance();
        Ok(name)
    }

    /// `name` or `table.name`.
    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.consume_name("column name")?;
        if matches!(self.current_token(), Token::Dot) {
            self.advance();
            let column = self.consume_name("column name after '.'")?;
            return Ok(ColumnRef::qualified(first, column));
        }
        Ok(ColumnRef::bare(first))
    }

    /// Quoted text, numbers and `NULL`. Any other bare word is kept as raw
    /// text so the column type gets to decide whether it is acceptable.
    fn parse_literal(&mut self) -> Result<Value> {
        let value = match self.current_token() {
            Token::String(s) => Value::text(s),
            Token::Number(n) => Value::Int(*n),
            Token::FloatNumber(f) => Value::Float(*f),
            Token::Null => Value::Null,
            Token::Ident(word) => Value::text(word),
            _ => return Err(self.error("expected a value")),
        };
        self.advance();
        Ok(value)
    }

    /// One value of a VALUES list or SET clause. It runs up to the first
    /// top-level `,`, or a token accepted by `stop`.
    ///
    /// A single literal lexeme is read by [Parser::parse_literal]. Anything
    /// else (`2024-01-15`, `alice@x.org`) is the raw source text, read as an
    /// integer, else a float, else kept as text for the column type to judge.
    fn parse_value(&mut self, stop: fn(&Token) -> bool) -> Result<Value> {
        let first = self.position;
        let mut depth = 0usize;
        loop {
            match self.current_token() {
                Token::Eof => break,
                Token::Comma if depth == 0 => break,
                Token::LeftParen => depth += 1,
                Token::RightParen if depth > 0 => depth -= 1,
                token if depth == 0 && stop(token) => break,
                _ => {}
            }
            self.advance();
        }
        let end = self.position;

        if end == first {
            return Err(self.error("expected a value"));
        }
        let single_literal = end - first == 1
            && matches!(
                self.tokens[first].token,
                Token::String(_)
                    | Token::Number(_)
                    | Token::FloatNumber(_)
                    | Token::Null
                    | Token::Ident(_)
            );
        if single_literal {
            self.position = first;
            return self.parse_literal();
        }

        let raw: String = self.source[self.tokens[first].offset..self.tokens[end].offset]
            .iter()
            .collect();
        Ok(raw_literal(raw.trim()))
    }

    // --- CREATE TABLE ---

    fn parse_create_table(&mut self) -> Result<Statement> {
        self.consume(Token::Create, "CREATE")?; // advance if CREATE
        self.consume(Token::Table, "TABLE after CREATE")?; // advance if TABLE
        let name = self.consume_name("table name")?;
        self.consume(Token::LeftParen, "'(' before column definitions")?;

        let mut decls = vec![];
        loop {
            decls.push(self.parse_column_decl()?);
            match self.current_token() {
                Token::RightParen => {
                    self.advance();
                    break;
                }
                Token::Comma => {
                    self.advance();
                    continue;
                }
                _ => return Err(self.error("expected ',' or ')' in column definitions")),
            }
        }

        // legacy form: only bare names, every column TEXT
        if decls.len() > 1 && decls.iter().all(|d| d.data_type.is_none()) {
            let columns = decls
                .into_iter()
                .map(|d| ColumnDef::new(d.name, DataType::Text))
                .collect();
            return Ok(Statement::CreateTable(CreateTable { name, columns }));
        }

        let mut columns = Vec::with_capacity(decls.len());
        for decl in decls {
            let Some(data_type) = decl.data_type else {
                return Err(DbError::syntax(
                    format!("missing data type for column '{}'", decl.name),
                    self.fragment(decl.offset),
                ));
            };
            let column = decl
                .constraints
                .into_iter()
                .fold(ColumnDef::new(decl.name, data_type), ColumnDef::with_constraint);
            columns.push(column);
        }
        Ok(Statement::CreateTable(CreateTable { name, columns }))
    }

    /// `name [type [(params)] [constraints...]]`
    fn parse_column_decl(&mut self) -> Result<ColumnDecl> {
        let offset = self.current_offset();
        let name = self.consume_name("column name")?;
        if matches!(self.current_token(), Token::Comma | Token::RightParen) {
            return Ok(ColumnDecl {
                name,
                offset,
                data_type: None,
                constraints: vec![],
            });
        }

        let type_offset = self.current_offset();
        let type_name = self.consume_ident(&format!("data type for column '{name}'"))?;
        let mut params = vec![];
        if matches!(self.current_token(), Token::LeftParen) {
            self.advance();
            loop {
                match self.current_token() {
                    Token::Number(n) if *n >= 0 => {
                        params.push(n.unsigned_abs());
                        self.advance();
                    }
                    _ => return Err(self.error("expected a non-negative type parameter")),
                }
                match self.current_token() {
                    Token::Comma => self.advance(),
                    Token::RightParen => {
                        self.advance();
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')' in type parameters")),
                }
            }
        }
        let data_type = DataType::from_sql(&type_name, &params)
            .map_err(|message| DbError::syntax(message, self.fragment(type_offset)))?;

        let mut constraints = vec![];
        loop {
            match self.current_token() {
                Token::Primary => {
                    self.advance();
                    self.consume(Token::Key, "KEY after PRIMARY")?;
                    constraints.push(Constraint::PrimaryKey);
                }
                Token::Unique => {
                    self.advance();
                    constraints.push(Constraint::Unique);
                }
                Token::Not => {
                    self.advance();
                    self.consume(Token::Null, "NULL after NOT")?;
                    constraints.push(Constraint::NotNull);
                }
                _ => break,
            }
        }

        Ok(ColumnDecl {
            name,
            offset,
            data_type: Some(data_type),
            constraints,
        })
    }

    // --- INSERT ---

    fn parse_insert(&mut self) -> Result<Statement> {
        self.consume(Token::Insert, "INSERT")?;
        self.consume(Token::Into, "INTO after INSERT")?;
        let table = self.consume_name("table name")?;

        let columns = if matches!(self.current_token(), Token::LeftParen) {
            self.advance();
            let mut names = vec![self.consume_name("column name")?];
            while matches!(self.current_token(), Token::Comma) {
                self.advance();
                names.push(self.consume_name("column name")?);
            }
            self.consume(Token::RightParen, "')' after column list")?;
            Some(names)
        } else {
            None
        };

        self.consume(Token::Values, "VALUES")?;
        self.consume(Token::LeftParen, "'(' after VALUES")?;
        let mut values = vec![];
        if !matches!(self.current_token(), Token::RightParen) {
            let stop = |t: &Token| matches!(t, Token::RightParen);
            values.push(self.parse_value(stop)?);
            while matches!(self.current_token(), Token::Comma) {
                self.advance();
                values.push(self.parse_value(stop)?);
            }
        }
        self.consume(Token::RightParen, "')' after values")?;

        Ok(Statement::InsertInto(InsertInto {
            table,
            columns,
            values,
        }))
    }

    // --- SELECT ---

    fn parse_select(&mut self) -> Result<Statement> {
        self.consume(Token::Select, "SELECT")?;

        let columns = if matches!(self.current_token(), Token::Star) {
            self.advance();
            ColumnsSelect::Star
        } else {
            let mut refs = vec![self.parse_column_ref()?];
            while matches!(self.current_token(), Token::Comma) {
                self.advance();
                refs.push(self.parse_column_ref()?);
            }
            ColumnsSelect::ColumnsNames(refs)
        };

        self.consume(Token::From, "FROM")?;
        let table = self.consume_name("table name")?;

        let join = match self.current_token() {
            Token::Inner => {
                self.advance();
                self.consume(Token::Join, "JOIN after INNER")?;
                Some(self.parse_join()?)
            }
            Token::Join => {
                self.advance();
                Some(self.parse_join()?)
            }
            _ => None,
        };

        let where_clause = self.parse_optional_where()?;
        Ok(Statement::Select(Select {
            columns,
            table,
            join,
            where_clause,
        }))
    }

    /// `table ON left.col = right.col`, after the JOIN keyword.
    fn parse_join(&mut self) -> Result<Join> {
        let table = self.consume_name("table name after JOIN")?;
        self.consume(Token::On, "ON after the joined table")?;

        let start = self.current_offset();
        let malformed = |parser: &Self| {
            DbError::MalformedJoinCondition(format!(
                "expected `left.column = right.column` near '{}'",
                parser.fragment(start)
            ))
        };
        let left = self.parse_column_ref().map_err(|_| malformed(self))?;
        if !matches!(self.current_token(), Token::Equal) {
            return Err(malformed(self));
        }
        self.advance();
        let right = self.parse_column_ref().map_err(|_| malformed(self))?;
        if left.table.is_none() || right.table.is_none() {
            return Err(malformed(self));
        }
        Ok(Join { table, left, right })
    }

    // --- WHERE ---

    fn parse_optional_where(&mut self) -> Result<Option<Predicate>> {
        if !matches!(self.current_token(), Token::Where) {
            return Ok(None);
        }
        self.advance();
        self.parse_predicate().map(Some)
    }

    /// `column = value`, the column optionally table-qualified.
    fn parse_predicate(&mut self) -> Result<Predicate> {
        let start = self.current_offset();
        let malformed = |parser: &Self| DbError::MalformedPredicate(parser.fragment(start));

        let column = self.parse_column_ref().map_err(|_| malformed(self))?;
        if !matches!(self.current_token(), Token::Equal) {
            return Err(malformed(self));
        }
        self.advance();
        let value = self.parse_literal().map_err(|_| malformed(self))?;
        if !matches!(self.current_token(), Token::Eof | Token::Semicolon) {
            return Err(malformed(self));
        }
        Ok(Predicate { column, value })
    }

    // --- UPDATE / DELETE / DROP ---

    fn parse_update(&mut self) -> Result<Statement> {
        self.consume(Token::Update, "UPDATE")?;
        let table = self.consume_name("table name")?;
        self.consume(Token::Set, "SET")?;

        let mut assignments = vec![self.parse_assignment()?];
        while matches!(self.current_token(), Token::Comma) {
            self.advance();
            assignments.push(self.parse_assignment()?);
        }

        let where_clause = self.parse_optional_where()?;
        Ok(Statement::Update(Update {
            table,
            assignments,
            where_clause,
        }))
    }

    fn parse_assignment(&mut self) -> Result<(String, Value)> {
        let column = self.consume_name("column name in SET")?;
        self.consume(Token::Equal, &format!("'=' after '{column}'"))?;
        let value = self.parse_value(|t| matches!(t, Token::Where | Token::Semicolon))?;
        Ok((column, value))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.consume(Token::Delete, "DELETE")?;
        self.consume(Token::From, "FROM after DELETE")?;
        let table = self.consume_name("table name")?;
        let where_clause = self.parse_optional_where()?;
        Ok(Statement::Delete(Delete {
            table,
            where_clause,
        }))
    }

    fn parse_drop_table(&mut self) -> Result<Statement> {
        self.consume(Token::Drop, "DROP")?;
        self.consume(Token::Table, "TABLE after DROP")?;
        let name = self.consume_name("table name")?;
        Ok(Statement::DropTable(name))
    }
}

/// Integer, else float, else text, as for an unquoted value.
fn raw_literal(text: &str) -> Value {
    if let Ok(int) = text.parse::<i64>() {
        return Value::Int(int);
    }
    match text.parse::<f64>() {
        Ok(float) if float.is_finite() => Value::Float(float),
        _ => Value::text(text),
    }
}

/// A column as written, before typed and legacy forms are told apart.
struct ColumnDecl {
    name: String,
    offset: usize,
    data_type: Option<DataType>,
    constraints: Vec<Constraint>,
}
