use std::fmt::Write;

use crate::frontend::token::{Token, TokenKind};

pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints kind and literal only
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const RED: &'static str = "\x1b[31m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Token]) {
        print!("{}", self.render(tokens));
    }

    pub fn render(&self, tokens: &[Token]) -> String {
        let mut out = String::new();
        for token in tokens {
            self.render_one(&mut out, token);
        }
        out
    }

    fn render_one(&self, out: &mut String, token: &Token) {
        let line = token.span.line;
        let col = token.span.col;

        let group = self.group(token.kind);
        let colr = if self.color { self.color(token.kind) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        let _ = if self.show_debug_repr {
            // Uniform: kind plus quoted literal
            writeln!(
                out,
                "[{:02}:{:02}] {}{:<8} {:?} {:?}{}",
                line, col, colr, group, token.kind, token.literal, reset
            )
        } else if token.kind == TokenKind::Eof {
            writeln!(out, "[{:02}:{:02}] {}{:<8}{}", line, col, colr, group, reset)
        } else {
            writeln!(
                out,
                "[{:02}:{:02}] {}{:<8} {}{}",
                line, col, colr, group, token.literal, reset
            )
        };
    }

    fn group(&self, kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            Illegal => "ILLEGAL",
            Eof => "EOF",

            // literals
            Int => "INT",
            Float => "FLOAT",
            String => "STRING",
            True | False => "BOOL",

            Ident => "IDENT",

            // structure
            LParen | RParen => "PAREN",
            LBrace | RBrace => "BRACE",
            LBracket | RBracket => "BRACKET",
            Comma | Semicolon | Colon => "DELIM",

            // ops / comparisons
            Assign | Plus | Minus | Bang | Asterisk | Slash | Pow => "OP",
            Eq | NotEq | Lt | Gt => "CMP",

            k if k.is_keyword() => "KEYWORD",
            _ => "OTHER",
        }
    }

    fn color(&self, kind: TokenKind) -> &'static str {
        use TokenKind::*;
        match kind {
            Eof => Self::DIM,
            Illegal => Self::RED,
            String => Self::GRN,
            Int | Float | True | False => Self::CYN,
            Ident => Self::YEL,
            Assign | Plus | Minus | Bang | Asterisk | Slash | Pow => Self::MAG,
            Eq | NotEq | Lt | Gt => Self::MAG,
            _ => Self::RESET,
        }
    }
}
