use crate::error::{DbError, Result};

/// Longest input excerpt quoted in a syntax error.
const FRAGMENT_LEN: usize = 40;

/// Represents the smallest meaningful units (atoms) of the SQL language.
///
/// Type names (`INT`, `VARCHAR`, ...) are plain identifiers; the parser
/// resolves them, so a column may still be called `date`.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // --- SQL Keywords ---
    Create,
    Table,
    Insert,
    Into,
    Values,
    Select,
    From,
    Where,
    Update,
    Set,
    Delete,
    Drop,
    Inner,
    Join,
    On,
    Primary,
    Key,
    Unique,
    Not,
    Null,

    // --- Identifiers & Literals ---
    /// A name representing a table or a column (e.g., `users`, `id`).
    Ident(String),
    /// A 64-bit integer literal (e.g., `42`).
    Number(i64),
    /// A string literal, between single or double quotes (e.g., `'Alice'`).
    String(String),
    /// A 64-bit floating-point literal (e.g., `3.14`).
    FloatNumber(f64),

    // --- Symbols ---
    /// Left parenthesis `(`
    LeftParen,
    /// Right parenthesis `)`
    RightParen,
    /// Comma `,`
    Comma,
    /// Semicolon `;`
    Semicolon,
    /// Multiplication or wildcard symbol `*`
    Star,
    /// Qualifier separator `.`
    Dot,
    /// Greater than
    Greater,
    /// Lower than
    Lower,
    /// Equal to
    Equal,
    /// Any other character. Only meaningful inside an unquoted value, where
    /// the parser keeps the raw text.
    Unknown(char),

    // --- Special ---
    /// Represents the End Of File/Input.
    Eof,
}

impl Token {
    /// Keywords that never open a clause, so they can still name a table or
    /// a column (`CREATE TABLE kv (key TEXT, ...)`).
    pub fn is_soft_keyword(&self) -> bool {
        matches!(
            self,
            Self::Table
                | Self::Into
                | Self::Values
                | Self::Set
                | Self::Inner
                | Self::Join
                | Self::On
                | Self::Primary
                | Self::Key
                | Self::Unique
                | Self::Not
                | Self::Null
        )
    }
}

/// A token and the character offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub offset: usize,
}

/// A lexical scanner (lexer) that converts a raw SQL string into a sequence of [Token]s.
pub struct Tokenizer {
    /// The input string stored as a vector of characters for easy iteration.
    input: Vec<char>,
    /// The current position in the character vector.
    position: usize,
}

impl Tokenizer {
    /// Creates a new Tokenizer for the given input string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
        }
    }

    /// Processes the entire input and returns a vector of lexemes, the last
    /// one being [Token::Eof].
    ///
    /// # Errors
    /// Returns a syntax error for an unterminated string. Characters outside
    /// the dialect become [Token::Unknown] and are left to the parser.
    ///
    /// # Example
    /// ```
    /// # use minirdb::tokenizer::{Tokenizer, Token};
    /// let mut t = Tokenizer::new("SELECT *");
    /// let lexemes = t.tokenize().unwrap();
    /// assert_eq!(lexemes[0].token, Token::Select);
    /// assert_eq!(lexemes[1].offset, 7);
    /// ```
    pub fn tokenize(&mut self) -> Result<Vec<Lexeme>> {
        let mut lexemes = Vec::new();

        while !self.is_at_end() {
            self.skip_whitespace();

            if self.is_at_end() {
                break;
            }

            let offset = self.position;
            let token = self.next_token()?;
            lexemes.push(Lexeme { token, offset });
        }

        lexemes.push(Lexeme {
            token: Token::Eof,
            offset: self.input.len(),
        });
        Ok(lexemes)
    }

    /// Identifies the next token based on the character at the current position.
    fn next_token(&mut self) -> Result<Token> {
        let ch = self.current_char();

        let symbol = match ch {
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            ',' => Some(Token::Comma),
            ';' => Some(Token::Semicolon),
            '*' => Some(Token::Star),
            '.' => Some(Token::Dot),
            '>' => Some(Token::Greater),
            '<' => Some(Token::Lower),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = symbol {
            self.advance();
            return Ok(token);
        }

        match ch {
            c if c.is_alphabetic() || c == '_' => Ok(self.read_identifier()),
            c if c.is_ascii_digit() => self.read_number(),
            '-' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '\'' | '"' => self.read_string(ch),
            _ => {
                self.advance();
                Ok(Token::Unknown(ch))
            }
        }
    }

    // --- Navigation Helpers ---

    /// Returns the character at the current position.
    fn current_char(&self) -> char {
        self.input[self.position]
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Moves the cursor forward by one character.
    fn advance(&mut self) {
        self.position += 1;
    }

    /// Checks if the cursor has reached the end of the input.
    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Consumes any whitespace characters (spaces, tabs, newlines).
    fn skip_whitespace(&mut self) {
        while !self.is_at_end() && self.current_char().is_whitespace() {
            self.advance();
        }
    }

    fn fragment(&self, from: usize) -> String {
        fragment_of(&self.input, from)
    }

    // --- Extraction Logic ---

    /// Reads a sequence of alphanumeric characters and determines if it's
    /// a reserved SQL keyword or a user-defined identifier.
    ///
    /// Keywords are matched case-insensitively.
    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();

        while !self.is_at_end()
            && (self.current_char().is_alphanumeric() || self.current_char() == '_')
        {
            ident.push(self.current_char());
            self.advance();
        }

        match ident.to_uppercase().as_str() {
            "CREATE" => Token::Create,
            "TABLE" => Token::Table,
            "INSERT" => Token::Insert,
            "INTO" => Token::Into,
            "VALUES" => Token::Values,
            "SELECT" => Token::Select,
            "FROM" => Token::From,
            "WHERE" => Token::Where,
            "UPDATE" => Token::Update,
            "SET" => Token::Set,
            "DELETE" => Token::Delete,
            "DROP" => Token::Drop,
            "INNER" => Token::Inner,
            "JOIN" => Token::Join,
            "ON" => Token::On,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "UNIQUE" => Token::Unique,
            "NOT" => Token::Not,
            "NULL" => Token::Null,
            _ => Token::Ident(ident),
        }
    }

    /// Reads a numeric literal, with an optional leading minus.
    ///
    /// A dot makes it a [Token::FloatNumber]; an integer too large for 64
    /// bits also falls back to a float. A second dot ends the number.
    fn read_number(&mut self) -> Result<Token> {
        let start = self.position;
        let mut number = String::new();
        let mut has_dot = false;

        if self.current_char() == '-' {
            number.push('-');
            self.advance();
        }

        while !self.is_at_end()
            && (self.current_char().is_ascii_digit() || (self.current_char() == '.' && !has_dot))
        {
            if self.current_char() == '.' {
                has_dot = true;
            }
            number.push(self.current_char());
            self.advance();
        }

        if !has_dot {
            if let Ok(int) = number.parse::<i64>() {
                return Ok(Token::Number(int));
            }
        }
        number
            .parse::<f64>()
            .map(Token::FloatNumber)
            .map_err(|e| DbError::syntax(e.to_string(), self.fragment(start)))
    }

    /// Reads a string literal enclosed in `quote`. There is no escaping: the
    /// literal ends at the next `quote`.
    fn read_string(&mut self, quote: char) -> Result<Token> {
        let start = self.position;
        self.advance(); // Skip the opening quote

        let mut string = String::new();
        while !self.is_at_end() && self.current_char() != quote {
            string.push(self.current_char());
            self.advance();
        }

        if self.is_at_end() {
            return Err(DbError::syntax("unterminated string", self.fragment(start)));
        }

        // Skip the closing quote
        self.advance();

        Ok(Token::String(string))
    }
}

/// Up to [FRAGMENT_LEN] characters of `input` from `from`, or `end of input`.
pub(crate) fn fragment_of(input: &[char], from: usize) -> String {
    if from >= input.len() {
        return "end of input".to_string();
    }
    input[from..].iter().take(FRAGMENT_LEN).collect()
}
