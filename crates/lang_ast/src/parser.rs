use ordered_float::OrderedFloat;
use smol_str::SmolStr;

use crate::{
    DeclKind, DocTarget, Expr, ExprId, FunctionDef, Literal, Module, ParseError, Property, Span,
    Stmt, StmtId, Token, TokenKind,
};

pub(crate) struct Parser<'t, 'm> {
    tokens: &'t [Token],
    pos: usize,
    module: &'m mut Module,
    claimed: Vec<bool>,
}

type PResult<T> = Result<T, ParseError>;

impl<'t, 'm> Parser<'t, 'm> {
    pub(crate) fn new(tokens: &'t [Token], module: &'m mut Module) -> Self {
        Self {
            tokens,
            pos: 0,
            module,
            claimed: vec![false; tokens.len()],
        }
    }

    pub(crate) fn parse_program(mut self) -> PResult<()> {
        let mut body = Vec::new();
        while !self.at(&TokenKind::Eof) {
            body.extend(self.parse_stmt()?);
        }
        self.module.body = body;

        for (idx, token) in self.tokens.iter().enumerate() {
            if let (Some(doc), false) = (&token.doc, self.claimed[idx]) {
                self.module.docs.orphan_docs.push(doc.clone());
            }
        }
        Ok(())
    }

    // ==============================================================================
    // Token helpers
    // ==============================================================================

    fn peek(&self) -> &'t Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn peek_nth(&self, n: usize) -> &'t TokenKind {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.pos + n).min(last)].kind
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == kw)
    }

    fn bump(&mut self) -> &'t Token {
        let token = self.peek();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> PResult<Span> {
        if self.at(kind) {
            Ok(self.bump().span)
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<(SmolStr, Span)> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                Ok((name, self.bump().span))
            }
            _ => Err(self.error(format!("expected {what}"))),
        }
    }

    fn error(&self, message: String) -> ParseError {
        let token = self.peek();
        let found = match &token.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("{:?}", token.kind),
        };
        ParseError::new(format!("{message}, found {found}"), token.span)
    }

    /// Take the doc comment in front of the current token.
    fn claim_doc(&mut self) -> Option<SmolStr> {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        let doc = self.tokens[idx].doc.clone()?;
        self.claimed[idx] = true;
        Some(doc)
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }

    /// `;`, or an implicit terminator: a line break, `}` or end of input.
    fn end_stmt(&mut self) -> PResult<()> {
        if self.eat(&TokenKind::Semi) {
            return Ok(());
        }
        let token = self.peek();
        if token.newline_before || matches!(token.kind, TokenKind::RBrace | TokenKind::Eof) {
            return Ok(());
        }
        Err(self.error("expected `;`".into()))
    }

    // ==============================================================================
    // Statements
    // ==============================================================================

    fn parse_stmt(&mut self) -> PResult<Vec<StmtId>> {
        let doc = self.claim_doc();
        let start = self.peek().span;

        let stmts = if self.at_keyword("var") || self.at_keyword("let") || self.at_keyword("const") {
            self.parse_var(start)?
        } else if self.at_keyword("function") && matches!(self.peek_nth(1), TokenKind::Ident(_)) {
            vec![self.parse_function_decl(start)?]
        } else if self.at_keyword("return") {
            self.bump();
            let token = self.peek();
            let value = if token.newline_before
                || matches!(token.kind, TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof)
            {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.end_stmt()?;
            vec![self.alloc_stmt(Stmt::Return(value), start)]
        } else if self.at(&TokenKind::LBrace) {
            self.bump();
            let body = self.parse_block_body()?;
            vec![self.alloc_stmt(Stmt::Block(body), start)]
        } else if self.eat(&TokenKind::Semi) {
            vec![self.alloc_stmt(Stmt::Empty, start)]
        } else {
            let expr = self.parse_expr()?;
            self.end_stmt()?;
            vec![self.alloc_stmt(Stmt::Expr(expr), start)]
        };

        if let (Some(doc), Some(first)) = (doc, stmts.first()) {
            self.module.docs.attach(DocTarget::Stmt(*first), doc);
        }
        Ok(stmts)
    }

    fn alloc_stmt(&mut self, stmt: Stmt, start: Span) -> StmtId {
        let span = start.cover(self.prev_span());
        self.module.alloc_stmt(stmt, span)
    }

    /// Statements up to and including the closing `}`.
    fn parse_block_body(&mut self) -> PResult<Vec<StmtId>> {
        let mut body = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return Err(self.error("expected `}`".into()));
            }
            body.extend(self.parse_stmt()?);
        }
        self.bump();
        Ok(body)
    }

    fn parse_var(&mut self, start: Span) -> PResult<Vec<StmtId>> {
        let kind = match &self.bump().kind {
            TokenKind::Ident(kw) if kw == "let" => DeclKind::Let,
            TokenKind::Ident(kw) if kw == "const" => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let mut stmts = Vec::new();
        loop {
            let (name, name_span) = self.expect_ident("a variable name")?;
            let init = if self.eat(&TokenKind::Eq) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let decl_start = if stmts.is_empty() { start } else { name_span };
            stmts.push(self.alloc_stmt(
                Stmt::Var {
                    kind: kind.clone(),
                    name,
                    init,
                },
                decl_start,
            ));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.end_stmt()?;
        Ok(stmts)
    }

    fn parse_function_decl(&mut self, start: Span) -> PResult<StmtId> {
        let func = self.parse_function()?;
        let name = match &self.module[func] {
            Expr::Function(FunctionDef { name: Some(name), .. }) => name.clone(),
            _ => return Err(ParseError::new("function declaration without a name", start)),
        };
        Ok(self.alloc_stmt(Stmt::FunctionDecl { name, func }, start))
    }

    // ==============================================================================
    // Expressions
    // ==============================================================================

    pub(crate) fn parse_expr(&mut self) -> PResult<ExprId> {
        let start = self.peek().span;
        let target = self.parse_postfix()?;
        if !self.at(&TokenKind::Eq) {
            return Ok(target);
        }
        if !matches!(self.module[target], Expr::Ident(_) | Expr::Member { .. }) {
            return Err(ParseError::new(
                "invalid assignment target",
                self.module.expr_span(target),
            ));
        }
        self.bump();
        let value = self.parse_expr()?;
        Ok(self.alloc_expr(Expr::Assign { target, value }, start))
    }

    fn alloc_expr(&mut self, expr: Expr, start: Span) -> ExprId {
        let span = start.cover(self.prev_span());
        self.module.alloc_expr(expr, span)
    }

    fn parse_postfix(&mut self) -> PResult<ExprId> {
        let start = self.peek().span;
        let mut expr = if self.at_keyword("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat(&TokenKind::Dot) {
                let (prop, _) = self.expect_ident("a property name")?;
                expr = self.alloc_expr(Expr::Member { object: expr, prop }, start);
            } else if self.at(&TokenKind::LParen) {
                let args = self.parse_args()?;
                expr = self.alloc_expr(Expr::Call { callee: expr, args }, start);
            } else {
                return Ok(expr);
            }
        }
    }

    /// `new Callee.path(args)`; the argument list is optional.
    fn parse_new(&mut self) -> PResult<ExprId> {
        let start = self.bump().span;
        let callee_start = self.peek().span;
        let mut callee = if self.at_keyword("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        while self.eat(&TokenKind::Dot) {
            let (prop, _) = self.expect_ident("a property name")?;
            callee = self.alloc_expr(Expr::Member { object: callee, prop }, callee_start);
        }
        let args = if self.at(&TokenKind::LParen) {
            self.parse_args()?
        } else {
            Vec::new()
        };
        Ok(self.alloc_expr(Expr::New { callee, args }, start))
    }

    fn parse_args(&mut self) -> PResult<Vec<ExprId>> {
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut args = Vec::new();
        while !self.at(&TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "`)`")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<ExprId> {
        let token = self.peek();
        let start = token.span;
        let expr = match &token.kind {
            TokenKind::Ident(name) => match name.as_str() {
                "function" => return self.parse_function(),
                "this" => Expr::This,
                "true" => Expr::Literal(Literal::Bool(true)),
                "false" => Expr::Literal(Literal::Bool(false)),
                "null" => Expr::Literal(Literal::Null),
                _ => Expr::Ident(name.clone()),
            },
            TokenKind::Number(value) => Expr::Literal(Literal::Number(OrderedFloat(*value))),
            TokenKind::String(value) => Expr::Literal(Literal::String(value.clone())),
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "`)`")?;
                return Ok(inner);
            }
            TokenKind::LBracket => return self.parse_array(),
            TokenKind::LBrace => return self.parse_object(),
            _ => return Err(self.error("expected an expression".into())),
        };
        self.bump();
        Ok(self.alloc_expr(expr, start))
    }

    fn parse_array(&mut self) -> PResult<ExprId> {
        let start = self.bump().span;
        let mut elems = Vec::new();
        while !self.at(&TokenKind::RBracket) {
            elems.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBracket, "`]`")?;
        Ok(self.alloc_expr(Expr::Array(elems), start))
    }

    fn parse_object(&mut self) -> PResult<ExprId> {
        let start = self.bump().span;
        let mut props = Vec::new();
        let mut docs = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let doc = self.claim_doc();
            let key = match &self.peek().kind {
                TokenKind::Ident(name) | TokenKind::String(name) => name.clone(),
                TokenKind::Number(value) => SmolStr::from(value.to_string()),
                _ => return Err(self.error("expected a property name".into())),
            };
            self.bump();
            self.expect(&TokenKind::Colon, "`:`")?;
            let value = self.parse_expr()?;
            if let Some(doc) = doc {
                docs.push((props.len(), doc));
            }
            props.push(Property { key, value });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "`}`")?;
        let id = self.alloc_expr(Expr::Object(props), start);
        for (index, doc) in docs {
            self.module.docs.attach(DocTarget::Property(id, index), doc);
        }
        Ok(id)
    }

    /// `function name?(params) { body }`
    fn parse_function(&mut self) -> PResult<ExprId> {
        let start = self.bump().span;
        let name = match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                Some(name)
            }
            _ => None,
        };
        self.expect(&TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let (param, _) = self.expect_ident("a parameter name")?;
            params.push(param);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "`)`")?;
        self.expect(&TokenKind::LBrace, "`{`")?;
        let body = self.parse_block_body()?;
        Ok(self.alloc_expr(Expr::Function(FunctionDef { name, params, body }), start))
    }
}
