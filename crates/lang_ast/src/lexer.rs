use smol_str::SmolStr;

use crate::{ParseError, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(SmolStr),
    Number(f64),
    String(SmolStr),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Semi,
    Colon,
    Eq,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// The last `/** */` comment seen since the previous token.
    pub doc: Option<SmolStr>,
    /// A line break separates this token from the previous one.
    pub newline_before: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineComment {
    /// Text after the `//`.
    pub text: SmolStr,
    pub span: Span,
}

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    comments: Vec<LineComment>,
    pending_doc: Option<SmolStr>,
    newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            tokens: Vec::new(),
            comments: Vec::new(),
            pending_doc: None,
            newline: false,
        }
    }

    /// Lex the whole input. The last token is always `Eof`.
    pub fn lex(mut self) -> Result<(Vec<Token>, Vec<LineComment>), ParseError> {
        loop {
            self.skip_trivia()?;
            let start = self.pos;
            let Some(c) = self.peek() else {
                self.push(TokenKind::Eof, start);
                return Ok((self.tokens, self.comments));
            };
            let kind = match c {
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '.' if !self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.single(TokenKind::Dot)
                }
                ',' => self.single(TokenKind::Comma),
                ';' => self.single(TokenKind::Semi),
                ':' => self.single(TokenKind::Colon),
                '=' => self.single(TokenKind::Eq),
                '"' | '\'' => self.string(c)?,
                c if c.is_ascii_digit() || c == '.' => self.number()?,
                c if is_ident_start(c) => {
                    let text = self.take_while(is_ident_continue);
                    TokenKind::Ident(text.into())
                }
                other => {
                    return Err(ParseError::new(
                        format!("unexpected character `{other}`"),
                        Span::new(start, start + other.len_utf8()),
                    ))
                }
            };
            self.push(kind, start);
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.pos),
            doc: self.pending_doc.take(),
            newline_before: std::mem::take(&mut self.newline),
        });
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        &src[start..self.pos]
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        let src = self.src;
        loop {
            let rest = &src[self.pos..];
            if rest.starts_with("//") {
                let start = self.pos;
                self.pos += 2;
                let text = self.take_while(|c| c != '\n');
                self.comments.push(LineComment {
                    text: text.into(),
                    span: Span::new(start, self.pos),
                });
            } else if rest.starts_with("/*") {
                let start = self.pos;
                let Some(len) = rest[2..].find("*/") else {
                    return Err(ParseError::new(
                        "unterminated block comment",
                        Span::new(start, self.src.len()),
                    ));
                };
                let end = start + 2 + len + 2;
                let text = &src[start..end];
                if text.starts_with("/**") && text != "/**/" {
                    self.pending_doc = Some(text.into());
                }
                if text.contains('\n') {
                    self.newline = true;
                }
                self.pos = end;
            } else {
                match self.peek() {
                    Some('\n') => {
                        self.newline = true;
                        self.bump();
                    }
                    Some(c) if c.is_whitespace() => {
                        self.bump();
                    }
                    _ => return Ok(()),
                }
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(TokenKind::String(out.into())),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => out.push(c),
            }
        }
        Err(ParseError::new(
            "unterminated string literal",
            Span::new(start, self.pos),
        ))
    }

    fn number(&mut self) -> Result<TokenKind, ParseError> {
        let start = self.pos;
        let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == '.');
        let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16).ok().map(|v| v as f64),
            None => text.parse::<f64>().ok(),
        };
        value.map(TokenKind::Number).ok_or_else(|| {
            ParseError::new(
                format!("invalid number literal `{text}`"),
                Span::new(start, self.pos),
            )
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
