use std::str::Chars;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Literals
    Ident,
    Number,

    // Operators
    Plus,
    Minus,
    /// `<=`, `=<` or `<`
    Le,
    /// `>=`, `=>` or `>`
    Ge,
    /// `=`
    Eq,
    Colon,

    // Special
    Newline,
    Comment,
    Eof,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text: String,
    /// 1-based line the token starts on
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            span,
            text: text.into(),
            line,
        }
    }

    /// True for `<=`, `>=` and `=`.
    pub fn is_relation(&self) -> bool {
        matches!(self.kind, TokenKind::Le | TokenKind::Ge | TokenKind::Eq)
    }

    /// Case-insensitive keyword comparison for identifiers.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Ident && self.text.eq_ignore_ascii_case(keyword)
    }
}

/// Characters allowed anywhere in a name besides ASCII letters.
const NAME_SYMBOLS: &str = "!\"#$%&()/,;?`'{}|~_";

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || NAME_SYMBOLS.contains(c)
}

fn is_name_continue(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '.'
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Chars<'a>,
    pos: usize,
    line: usize,
    current: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut chars = source.chars();
        let current = chars.next();
        Self {
            source,
            chars,
            pos: 0,
            line: 1,
            current,
        }
    }

    pub fn tokenize(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current;
        self.current = self.chars.next();
        if let Some(c) = c {
            self.pos += c.len_utf8();
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.current
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.clone().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind, start: usize) -> Token {
        Token::new(kind, Span::new(start, self.pos), &self.source[start..self.pos], self.line)
    }

    fn skip_line_comment(&mut self) -> Token {
        let start = self.pos;
        self.advance(); // backslash
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
        self.token(TokenKind::Comment, start)
    }

    fn read_digits(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;

        // Integer part
        self.read_digits();

        // Decimal part
        if self.peek() == Some('.') {
            self.advance();
            self.read_digits();
        }

        // Exponent, only when digits follow: in `3e1x` the `e1` belongs to the
        // number, in `3ex` the `e` starts the variable name
        if matches!(self.peek(), Some('e' | 'E')) {
            let mut chars = self.chars.clone();
            let digit_follows = match chars.next() {
                Some('+' | '-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if digit_follows {
                self.advance(); // e
                if matches!(self.peek(), Some('+' | '-')) {
                    self.advance();
                }
                self.read_digits();
            }
        }

        self.token(TokenKind::Number, start)
    }

    fn read_ident(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        self.token(TokenKind::Ident, start)
    }

    fn read_relation(&mut self) -> Token {
        let start = self.pos;
        let kind = match (self.advance(), self.peek()) {
            (Some('<'), Some('=')) => {
                self.advance();
                TokenKind::Le
            }
            (Some('<'), _) => TokenKind::Le,
            (Some('>'), Some('=')) => {
                self.advance();
                TokenKind::Ge
            }
            (Some('>'), _) => TokenKind::Ge,
            (Some('='), Some('<')) => {
                self.advance();
                TokenKind::Le
            }
            (Some('='), Some('>')) => {
                self.advance();
                TokenKind::Ge
            }
            _ => TokenKind::Eq,
        };
        self.token(kind, start)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.pos;

        let Some(c) = self.peek() else {
            return self.token(TokenKind::Eof, start);
        };

        match c {
            '\n' => {
                let token = Token::new(TokenKind::Newline, Span::new(start, start + 1), "\n", self.line);
                self.advance();
                self.line += 1;
                token
            }
            '\\' => self.skip_line_comment(),
            '+' => {
                self.advance();
                self.token(TokenKind::Plus, start)
            }
            '-' => {
                self.advance();
                self.token(TokenKind::Minus, start)
            }
            ':' => {
                self.advance();
                self.token(TokenKind::Colon, start)
            }
            '<' | '>' | '=' => self.read_relation(),
            '.' if self.peek_next().is_some_and(|n| n.is_ascii_digit()) => self.read_number(),
            c if c.is_ascii_digit() => self.read_number(),
            c if is_name_start(c) => self.read_ident(),
            _ => {
                self.advance();
                self.token(TokenKind::Error, start)
            }
        }
    }
}
