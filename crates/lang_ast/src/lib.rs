mod comment;
mod lexer;
mod parser;


pub use comment::{DocCommentCtx, DocTarget};
pub use lexer::{LineComment, Token, TokenKind};

use std::ops;

use derive_more::Debug;
use la_arena::{Arena, ArenaMap, Idx};
use ordered_float::OrderedFloat;
use smol_str::SmolStr;

pub type ExprId = Idx<Expr>;
pub type StmtId = Idx<Stmt>;

/// Byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[debug("{start}..{end}")]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn cover(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        (span.start, span.end.saturating_sub(span.start)).into()
    }
}

#[derive(Debug, Clone, thiserror::Error, miette::Diagnostic)]
#[error("{message}")]
#[diagnostic(code(lang_ast::parse))]
pub struct ParseError {
    pub message: String,
    #[label("here")]
    pub span: miette::SourceSpan,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: span.into(),
        }
    }
}

pub fn parse_module(src: &str) -> Result<Module, ParseError> {
    let (tokens, comments) = lexer::Lexer::new(src).lex()?;
    let mut module = Module::new(src, comments);
    parser::Parser::new(&tokens, &mut module).parse_program()?;
    log::trace!(
        "parsed {} statements, {} doc comments",
        module.body.len(),
        module.docs.len()
    );
    Ok(module)
}

// ==============================================================================
// Module
// ==============================================================================

#[derive(Debug, Default)]
pub struct Module {
    exprs: Arena<Expr>,
    stmts: Arena<Stmt>,
    pub body: Vec<StmtId>,
    #[debug(skip)]
    expr_spans: ArenaMap<ExprId, Span>,
    #[debug(skip)]
    stmt_spans: ArenaMap<StmtId, Span>,
    pub docs: DocCommentCtx,
    pub line_comments: Vec<LineComment>,
    #[debug(skip)]
    line_starts: Vec<usize>,
}

impl ops::Index<ExprId> for Module {
    type Output = Expr;
    fn index(&self, index: ExprId) -> &Self::Output {
        &self.exprs[index]
    }
}

impl ops::Index<StmtId> for Module {
    type Output = Stmt;
    fn index(&self, index: StmtId) -> &Self::Output {
        &self.stmts[index]
    }
}

impl Module {
    fn new(src: &str, line_comments: Vec<LineComment>) -> Self {
        let line_starts = std::iter::once(0)
            .chain(src.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self {
            line_comments,
            line_starts,
            ..Default::default()
        }
    }

    pub(crate) fn alloc_expr(&mut self, expr: Expr, span: Span) -> ExprId {
        let id = self.exprs.alloc(expr);
        self.expr_spans.insert(id, span);
        id
    }

    pub(crate) fn alloc_stmt(&mut self, stmt: Stmt, span: Span) -> StmtId {
        let id = self.stmts.alloc(stmt);
        self.stmt_spans.insert(id, span);
        id
    }

    pub fn exprs(&self) -> impl Iterator<Item = (ExprId, &Expr)> + '_ {
        self.exprs.iter()
    }

    pub fn stmts(&self) -> impl Iterator<Item = (StmtId, &Stmt)> + '_ {
        self.stmts.iter()
    }

    pub fn expr_span(&self, id: ExprId) -> Span {
        self.expr_spans.get(id).copied().unwrap_or_default()
    }

    pub fn stmt_span(&self, id: StmtId) -> Span {
        self.stmt_spans.get(id).copied().unwrap_or_default()
    }

    /// Zero-based line of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|start| *start <= offset) - 1
    }

    /// The innermost expression whose span contains `offset`.
    pub fn expr_at(&self, offset: usize) -> Option<ExprId> {
        self.exprs
            .iter()
            .map(|(id, _)| (id, self.expr_span(id)))
            .filter(|(_, span)| span.contains(offset))
            .min_by_key(|(_, span)| span.end - span.start)
            .map(|(id, _)| id)
    }

    /// The dotted path of a chain of identifiers and member accesses
    /// (`a.b.C`), if the expression is one.
    pub fn static_path(&self, expr: ExprId) -> Option<String> {
        match &self[expr] {
            Expr::Ident(name) => Some(name.to_string()),
            Expr::Member { object, prop } => {
                let base = self.static_path(*object)?;
                Some(format!("{base}.{prop}"))
            }
            _ => None,
        }
    }
}

// ==============================================================================
// Syntax
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    #[debug("{_0}")]
    Number(OrderedFloat<f64>),
    #[debug("{_0:?}")]
    String(SmolStr),
    #[debug("{_0}")]
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: Option<SmolStr>,
    pub params: Vec<SmolStr>,
    pub body: Vec<StmtId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub key: SmolStr,
    pub value: ExprId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    #[debug("{_0}")]
    Ident(SmolStr),
    This,
    Literal(Literal),
    Array(Vec<ExprId>),
    Object(Vec<Property>),
    Function(FunctionDef),
    Member {
        object: ExprId,
        prop: SmolStr,
    },
    Call {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    New {
        callee: ExprId,
        args: Vec<ExprId>,
    },
    Assign {
        target: ExprId,
        value: ExprId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `var a = 1, b;` declarations are split, one statement per name.
    Var {
        kind: DeclKind,
        name: SmolStr,
        init: Option<ExprId>,
    },
    /// `function name(...) {...}`. The expression is always a
    /// [`Expr::Function`].
    FunctionDecl { name: SmolStr, func: ExprId },
    Expr(ExprId),
    Return(Option<ExprId>),
    Block(Vec<StmtId>),
    Empty,
}
