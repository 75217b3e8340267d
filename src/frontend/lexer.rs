use crate::frontend::token::{Span, Token, TokenKind, lookup_ident};

/// Single-pass lexer over a source string.
///
/// The lexer never fails: characters that start no token come back as
/// `TokenKind::Illegal` and are rejected by the parser. Once the input is
/// exhausted every call to `next_token` returns `Eof`.
pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    finished: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            finished: false,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch == ' ' || ch == '\t' || ch == '\n' || ch == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Reads a string literal. The opening quote is the current character.
    ///
    /// Returns an `Illegal` token when EOF is reached before the closing quote.
    fn read_string(&mut self, span: Span) -> Token {
        self.advance();

        let mut string = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Token::new(TokenKind::String, string, span);
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => string.push('\n'),
                        Some('t') => string.push('\t'),
                        Some('r') => string.push('\r'),
                        Some('\\') => string.push('\\'),
                        Some('"') => string.push('"'),
                        Some(ch) => {
                            string.push('\\');
                            string.push(ch);
                        }
                        None => {
                            string.push('\\');
                            continue;
                        }
                    }
                    self.advance();
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
                None => {
                    return Token::new(TokenKind::Illegal, format!("\"{}", string), span);
                }
            }
        }
    }

    fn read_number(&mut self, span: Span) -> Token {
        let mut digits = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else if ch == '.' && !is_float {
                // Only a decimal point when a digit follows
                if self.peek().map(|c| c.is_ascii_digit()).unwrap_or(false) {
                    is_float = true;
                    digits.push('.');
                    self.advance();
                } else {
                    break;
                }
            } else {
                break;
            }
        }

        let kind = if is_float {
            TokenKind::Float
        } else {
            TokenKind::Int
        };
        Token::new(kind, digits, span)
    }

    fn read_identifier(&mut self, span: Span) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::new(lookup_ident(&ident), ident, span)
    }

    /// Operators and delimiters. Two-character operators win over their
    /// one-character prefixes.
    fn read_operator(&mut self, span: Span) -> Option<Token> {
        let ch = self.current()?;
        let next = self.peek();

        let (kind, len) = match (ch, next) {
            ('=', Some('=')) => (TokenKind::Eq, 2),
            ('!', Some('=')) => (TokenKind::NotEq, 2),
            ('*', Some('*')) => (TokenKind::Pow, 2),
            ('=', _) => (TokenKind::Assign, 1),
            ('!', _) => (TokenKind::Bang, 1),
            ('*', _) => (TokenKind::Asterisk, 1),
            ('+', _) => (TokenKind::Plus, 1),
            ('-', _) => (TokenKind::Minus, 1),
            ('/', _) => (TokenKind::Slash, 1),
            ('<', _) => (TokenKind::Lt, 1),
            ('>', _) => (TokenKind::Gt, 1),
            (',', _) => (TokenKind::Comma, 1),
            (';', _) => (TokenKind::Semicolon, 1),
            (':', _) => (TokenKind::Colon, 1),
            ('(', _) => (TokenKind::LParen, 1),
            (')', _) => (TokenKind::RParen, 1),
            ('{', _) => (TokenKind::LBrace, 1),
            ('}', _) => (TokenKind::RBrace, 1),
            ('[', _) => (TokenKind::LBracket, 1),
            (']', _) => (TokenKind::RBracket, 1),
            _ => return None,
        };

        let mut literal = String::with_capacity(len);
        for _ in 0..len {
            if let Some(c) = self.advance() {
                literal.push(c);
            }
        }

        Some(Token::new(kind, literal, span))
    }

    /// Consumes exactly one token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let span = self.span();

        match self.current() {
            None => Token::new(TokenKind::Eof, "", span),
            Some('"') => self.read_string(span),
            Some(ch) if ch.is_ascii_digit() => self.read_number(span),
            Some(ch) if ch.is_alphabetic() || ch == '_' => self.read_identifier(span),
            Some(ch) => match self.read_operator(span) {
                Some(token) => token,
                None => {
                    self.advance();
                    Token::new(TokenKind::Illegal, ch.to_string(), span)
                }
            },
        }
    }

    /// Lexes the whole input. The returned vector always ends with `Eof`.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        log::debug!("lexed {} tokens", tokens.len());
        tokens
    }
}

/// Yields tokens up to and including the first `Eof`.
impl Iterator for Lexer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.finished {
            return None;
        }
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            self.finished = true;
        }
        Some(token)
    }
}
