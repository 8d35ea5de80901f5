//! Tokenizer with Python-style indentation tracking.
//!
//! Newlines inside brackets are ignored, blank and comment-only lines never
//! produce tokens, and every indentation change becomes an explicit
//! `Indent`/`Dedent` token so the parser can stay context-free.

use super::ast::Pos;
use super::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(i64),
    Str(String),
    Def,
    Return,
    Pass,
    Break,
    Continue,
    If,
    Elif,
    Else,
    For,
    In,
    Not,
    And,
    Or,
    LParen,
    RParen,
    LBrack,
    RBrack,
    Comma,
    Colon,
    Assign,
    PlusEq,
    MinusEq,
    Plus,
    Minus,
    Star,
    SlashSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl Tok {
    /// Short description for "expected X, got Y" messages.
    pub fn describe(&self) -> String {
        match self {
            Tok::Name(n) => format!("name '{}'", n),
            Tok::Int(i) => format!("int {}", i),
            Tok::Str(_) => "string literal".to_string(),
            Tok::Newline => "newline".to_string(),
            Tok::Indent => "indent".to_string(),
            Tok::Dedent => "dedent".to_string(),
            Tok::Eof => "end of file".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Tok::Def => "def",
            Tok::Return => "return",
            Tok::Pass => "pass",
            Tok::Break => "break",
            Tok::Continue => "continue",
            Tok::If => "if",
            Tok::Elif => "elif",
            Tok::Else => "else",
            Tok::For => "for",
            Tok::In => "in",
            Tok::Not => "not",
            Tok::And => "and",
            Tok::Or => "or",
            Tok::LParen => "(",
            Tok::RParen => ")",
            Tok::LBrack => "[",
            Tok::RBrack => "]",
            Tok::Comma => ",",
            Tok::Colon => ":",
            Tok::Assign => "=",
            Tok::PlusEq => "+=",
            Tok::MinusEq => "-=",
            Tok::Plus => "+",
            Tok::Minus => "-",
            Tok::Star => "*",
            Tok::SlashSlash => "//",
            Tok::Percent => "%",
            Tok::EqEq => "==",
            Tok::NotEq => "!=",
            Tok::Lt => "<",
            Tok::Le => "<=",
            Tok::Gt => ">",
            Tok::Ge => ">=",
            _ => "?",
        }
    }
}

fn keyword(word: &str) -> Option<Tok> {
    Some(match word {
        "def" => Tok::Def,
        "return" => Tok::Return,
        "pass" => Tok::Pass,
        "break" => Tok::Break,
        "continue" => Tok::Continue,
        "if" => Tok::If,
        "elif" => Tok::Elif,
        "else" => Tok::Else,
        "for" => Tok::For,
        "in" => Tok::In,
        "not" => Tok::Not,
        "and" => Tok::And,
        "or" => Tok::Or,
        _ => return None,
    })
}

struct Lexer<'a> {
    filename: &'a str,
    chars: Vec<char>,
    index: usize,
    line: u32,
    col: u32,
    indents: Vec<u32>,
    depth: usize,
    at_line_start: bool,
    out: Vec<(Tok, Pos)>,
}

/// Split `src` into tokens, each tagged with its starting position.
pub fn tokenize(filename: &str, src: &str) -> Result<Vec<(Tok, Pos)>, SyntaxError> {
    let mut lexer = Lexer {
        filename,
        chars: src.chars().collect(),
        index: 0,
        line: 1,
        col: 1,
        indents: vec![0],
        depth: 0,
        at_line_start: true,
        out: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.out)
}

impl<'a> Lexer<'a> {
    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.index).copied()?;
        self.index += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn error(&self, pos: Pos, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(self.filename, pos.line, pos.col, message)
    }

    fn push(&mut self, tok: Tok, pos: Pos) {
        self.out.push((tok, pos));
    }

    fn last_is_newline(&self) -> bool {
        matches!(
            self.out.last(),
            None | Some((Tok::Newline, _)) | Some((Tok::Indent, _)) | Some((Tok::Dedent, _))
        )
    }

    fn run(&mut self) -> Result<(), SyntaxError> {
        loop {
            if self.at_line_start && self.depth == 0 && !self.indentation()? {
                break;
            }
            let Some(c) = self.peek() else { break };
            let pos = self.pos();
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '\n' => {
                    self.bump();
                    if self.depth == 0 {
                        if !self.last_is_newline() {
                            self.push(Tok::Newline, pos);
                        }
                        self.at_line_start = true;
                    }
                }
                '#' => self.skip_comment(),
                '0'..='9' => self.number(pos)?,
                c if c.is_alphabetic() || c == '_' => self.word(pos),
                '"' | '\'' => self.string(pos)?,
                _ => self.operator(pos)?,
            }
        }

        if self.depth > 0 {
            return Err(self.error(self.pos(), "unexpected end of file inside brackets"));
        }
        let pos = self.pos();
        if !self.last_is_newline() {
            self.push(Tok::Newline, pos);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent, pos);
        }
        self.push(Tok::Eof, pos);
        Ok(())
    }

    /// Measure leading whitespace of a logical line and emit indent changes.
    /// Returns false at end of input.
    fn indentation(&mut self) -> Result<bool, SyntaxError> {
        loop {
            let mut width = 0u32;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => width += 1,
                    '\t' => width += 8 - (width % 8),
                    '\r' => {}
                    _ => break,
                }
                self.bump();
            }
            match self.peek() {
                None => return Ok(false),
                Some('\n') => {
                    self.bump();
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {}
            }

            let pos = self.pos();
            let current = self.indents.last().copied().unwrap_or(0);
            if width > current {
                self.indents.push(width);
                self.push(Tok::Indent, pos);
            } else {
                while width < self.indents.last().copied().unwrap_or(0) {
                    self.indents.pop();
                    self.push(Tok::Dedent, pos);
                }
                if width != self.indents.last().copied().unwrap_or(0) {
                    return Err(self.error(
                        pos,
                        "unindent does not match any outer indentation level",
                    ));
                }
            }
            self.at_line_start = false;
            return Ok(true);
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn number(&mut self, pos: Pos) -> Result<(), SyntaxError> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    digits.push(c);
                }
                self.bump();
            } else {
                break;
            }
        }
        if self.peek().is_some_and(|c| c.is_alphabetic() || c == '.') {
            return Err(self.error(pos, "invalid number literal"));
        }
        let value = digits
            .parse::<i64>()
            .map_err(|_| self.error(pos, format!("integer literal {} out of range", digits)))?;
        self.push(Tok::Int(value), pos);
        Ok(())
    }

    fn word(&mut self, pos: Pos) {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let tok = keyword(&word).unwrap_or(Tok::Name(word));
        self.push(tok, pos);
    }

    fn string(&mut self, pos: Pos) -> Result<(), SyntaxError> {
        let quote = self.bump().unwrap_or('"');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error(pos, "unterminated string literal"));
            };
            match c {
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    value.push(c);
                }
                '\n' if !triple => {
                    return Err(self.error(pos, "unterminated string literal"));
                }
                '\\' => {
                    let Some(esc) = self.bump() else {
                        return Err(self.error(pos, "unterminated string literal"));
                    };
                    match esc {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' => value.push('\\'),
                        '\'' => value.push('\''),
                        '"' => value.push('"'),
                        '\n' => {}
                        other => {
                            value.push('\\');
                            value.push(other);
                        }
                    }
                }
                c => value.push(c),
            }
        }
        self.push(Tok::Str(value), pos);
        Ok(())
    }

    fn operator(&mut self, pos: Pos) -> Result<(), SyntaxError> {
        let c = self.bump().unwrap_or('\0');
        let next = self.peek();
        let tok = match (c, next) {
            ('(', _) => {
                self.depth += 1;
                Tok::LParen
            }
            ('[', _) => {
                self.depth += 1;
                Tok::LBrack
            }
            (')', _) | (']', _) => {
                if self.depth == 0 {
                    return Err(self.error(pos, format!("unbalanced '{}'", c)));
                }
                self.depth -= 1;
                if c == ')' {
                    Tok::RParen
                } else {
                    Tok::RBrack
                }
            }
            (',', _) => Tok::Comma,
            (':', _) => Tok::Colon,
            ('+', Some('=')) => {
                self.bump();
                Tok::PlusEq
            }
            ('-', Some('=')) => {
                self.bump();
                Tok::MinusEq
            }
            ('=', Some('=')) => {
                self.bump();
                Tok::EqEq
            }
            ('!', Some('=')) => {
                self.bump();
                Tok::NotEq
            }
            ('<', Some('=')) => {
                self.bump();
                Tok::Le
            }
            ('>', Some('=')) => {
                self.bump();
                Tok::Ge
            }
            ('/', Some('/')) => {
                self.bump();
                Tok::SlashSlash
            }
            ('+', _) => Tok::Plus,
            ('-', _) => Tok::Minus,
            ('*', _) => Tok::Star,
            ('%', _) => Tok::Percent,
            ('=', _) => Tok::Assign,
            ('<', _) => Tok::Lt,
            ('>', _) => Tok::Gt,
            _ => return Err(self.error(pos, format!("unexpected character {:?}", c))),
        };
        self.push(tok, pos);
        Ok(())
    }
}
